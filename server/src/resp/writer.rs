/*
 * Created on Fri Feb 17 2023
 *
 * This file is a part of Ferrite
 * Ferrite is a free and open-source Redis-compatible in-memory database
 * implemented in Rust, aiming to stay faithful to the Redis 1.0 wire
 * protocol while keeping the engine small and predictable.
 *
 * Copyright (c) 2023, the Ferrite developers
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

use crate::dbnet::{BufferedSocketStream, Connection};
use crate::IoResult;

#[derive(Debug)]
/// A writer for an array reply (`*<len>` followed by `len` elements), where
/// every element is either a bulk string or the null bulk
pub struct ArrayWriter<'a, T> {
    con: &'a mut Connection<T>,
}

impl<'a, T> ArrayWriter<'a, T>
where
    T: BufferedSocketStream,
{
    /// Initialize a new array writer. This writes out the tsymbol and the
    /// length of the array
    pub async fn new(con: &'a mut Connection<T>, len: usize) -> IoResult<ArrayWriter<'a, T>> {
        con.write_raw(b"*").await?;
        con.write_raw(len.to_string().as_bytes()).await?;
        con.write_raw(b"\r\n").await?;
        Ok(Self { con })
    }
    /// Write an element as a bulk string
    pub async fn write_element(&mut self, bytes: impl AsRef<[u8]>) -> IoResult<()> {
        let bytes = bytes.as_ref();
        self.con.write_raw(b"$").await?;
        self.con.write_raw(bytes.len().to_string().as_bytes()).await?;
        self.con.write_raw(b"\r\n").await?;
        self.con.write_raw(bytes).await?;
        self.con.write_raw(b"\r\n").await?;
        Ok(())
    }
    /// Write the null bulk
    pub async fn write_null(&mut self) -> IoResult<()> {
        self.con.write_raw(b"$-1\r\n").await
    }
}
