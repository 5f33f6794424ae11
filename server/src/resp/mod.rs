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

//! Utilities for generating responses, which are only used by the `server`
//!
//! Replies pick the narrowest RESP representation: status replies are simple
//! strings, counts are integers, returned values are bulk strings and
//! multi-value replies are arrays (see the [`writer`] module for the latter).

use crate::corestore::Data;
use crate::util::FutureResult;
use std::io::Error as IoError;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;

pub mod writer;

pub const TSYMBOL_INTEGER: u8 = b':';
pub const TSYMBOL_BULK_STRING: u8 = b'$';

type FutureIoResult<'s> = FutureResult<'s, Result<(), IoError>>;

/// # The `Writable` trait
/// All trait implementors are given access to an asynchronous stream to which
/// they must write a response.
///
/// Do note that a write **doesn't guarantee immediate completion** as the
/// underlying stream might use buffering. So, the best idea would be to use
/// the `flush()` call on the stream once the reply is assembled.
pub trait Writable {
    /*
     HACK: Since `async` is not supported in traits just yet, we will have to
     use explicit declarations for asynchronous functions
    */
    fn write<'s>(self, con: &'s mut impl IsConnection) -> FutureIoResult<'s>;
}

pub trait IsConnection: std::marker::Sync + std::marker::Send {
    fn write_lowlevel<'s>(&'s mut self, bytes: &'s [u8]) -> FutureIoResult<'s>;
}

impl<T> IsConnection for T
where
    T: AsyncWrite + Unpin + Send + Sync,
{
    fn write_lowlevel<'s>(&'s mut self, bytes: &'s [u8]) -> FutureIoResult<'s> {
        Box::pin(self.write_all(bytes))
    }
}

/// A `BytesWrapper` object wraps around a [`Data`] blob that might have been
/// pulled from a database; it is written out as a bulk string
#[derive(Debug, PartialEq)]
pub struct BytesWrapper(pub Data);

/// An `Integer64` is written out as an integer reply (`:...`)
#[derive(Debug, PartialEq)]
pub struct Integer64(pub i64);

impl Writable for BytesWrapper {
    fn write<'s>(self, con: &'s mut impl IsConnection) -> FutureIoResult<'s> {
        Box::pin(async move {
            con.write_lowlevel(&[TSYMBOL_BULK_STRING]).await?;
            let size = self.0.len().to_string().into_bytes();
            con.write_lowlevel(&size).await?;
            con.write_lowlevel(b"\r\n").await?;
            con.write_lowlevel(&self.0).await?;
            con.write_lowlevel(b"\r\n").await?;
            Ok(())
        })
    }
}

impl Writable for Integer64 {
    fn write<'s>(self, con: &'s mut impl IsConnection) -> FutureIoResult<'s> {
        Box::pin(async move {
            con.write_lowlevel(&[TSYMBOL_INTEGER]).await?;
            let value = self.0.to_string().into_bytes();
            con.write_lowlevel(&value).await?;
            con.write_lowlevel(b"\r\n").await?;
            Ok(())
        })
    }
}

impl Writable for Vec<u8> {
    fn write<'s>(self, con: &'s mut impl IsConnection) -> FutureIoResult<'s> {
        Box::pin(async move { con.write_lowlevel(&self).await })
    }
}

impl Writable for &'static [u8] {
    fn write<'s>(self, con: &'s mut impl IsConnection) -> FutureIoResult<'s> {
        Box::pin(async move { con.write_lowlevel(self).await })
    }
}
