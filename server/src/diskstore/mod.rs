/*
 * Created on Wed Mar 08 2023
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

//! # The append only file
//!
//! Every mutating command is appended to the AOF as two RESP arrays: a
//! `SELECT <db>` preamble followed by the command's own argument vector.
//! The resulting file is a valid RESP stream, byte-compatible with what a
//! live client would have sent, which is exactly how [`replay`] feeds it
//! back in on startup.

use crate::corestore::Data;
use crate::util::{Error, FerResult};
use crate::IoResult;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

mod replay;

pub use replay::replay;

/// When the AOF tells the OS to move its buffers to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// fsync after every single write. Slow and safe
    Always,
    /// fsync at most once a second, from a background service. At most one
    /// second of writes can be lost
    EverySecond,
    /// leave it entirely to the OS
    Never,
}

impl SyncPolicy {
    /// Parse the `appendfsync` directive value
    pub fn from_directive(value: &str) -> Option<Self> {
        match value {
            "always" => Some(Self::Always),
            "everysec" => Some(Self::EverySecond),
            "no" => Some(Self::Never),
            _ => None,
        }
    }
}

struct AofInner {
    file: File,
    /// set when a write has happened since the last fsync; only meaningful
    /// under [`SyncPolicy::EverySecond`]
    dirty: bool,
}

/// The append only file. Appends from different databases may race, so the
/// file handle sits behind its own (leaf) mutex
pub struct AppendOnlyFile {
    inner: Mutex<AofInner>,
    policy: SyncPolicy,
}

impl AppendOnlyFile {
    /// Open (or create) the AOF at `path` for appending
    pub fn open(path: &Path, policy: SyncPolicy) -> FerResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                Error::ioerror_extra(e, format!("opening the append only file '{}'", path.display()))
            })?;
        Ok(AppendOnlyFile {
            inner: Mutex::new(AofInner { file, dirty: false }),
            policy,
        })
    }
    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }
    /// Append one command, preceded by its `SELECT` preamble
    pub fn append(&self, db_index: usize, args: &[Data]) -> IoResult<()> {
        let mut buf = Vec::with_capacity(64);
        put_array_header(&mut buf, 2);
        put_bulk(&mut buf, b"SELECT");
        put_bulk(&mut buf, db_index.to_string().as_bytes());
        put_array_header(&mut buf, args.len());
        for arg in args {
            put_bulk(&mut buf, arg);
        }
        let mut inner = self.inner.lock();
        inner.file.write_all(&buf)?;
        match self.policy {
            SyncPolicy::Always => inner.file.sync_data()?,
            SyncPolicy::EverySecond => inner.dirty = true,
            SyncPolicy::Never => {}
        }
        Ok(())
    }
    /// fsync if anything was written since the last call. Driven by the
    /// once-a-second background service
    pub fn sync_if_dirty(&self) -> IoResult<()> {
        let mut inner = self.inner.lock();
        if inner.dirty {
            inner.file.sync_data()?;
            inner.dirty = false;
        }
        Ok(())
    }
    /// Unconditionally fsync; used on shutdown
    pub fn sync_now(&self) -> IoResult<()> {
        let mut inner = self.inner.lock();
        inner.file.sync_data()?;
        inner.dirty = false;
        Ok(())
    }
}

fn put_array_header(buf: &mut Vec<u8>, len: usize) {
    buf.push(b'*');
    buf.extend_from_slice(len.to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
}

fn put_bulk(buf: &mut Vec<u8>, payload: &[u8]) {
    buf.push(b'$');
    buf.extend_from_slice(payload.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(payload);
    buf.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_writes_the_select_preamble() {
        let dir = std::env::temp_dir().join(format!("ferrite-aoftest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.aof");
        let aof = AppendOnlyFile::open(&path, SyncPolicy::Always).unwrap();
        aof.append(
            3,
            &[
                Data::from_static(b"SET"),
                Data::from_static(b"k"),
                Data::from_static(b"v"),
            ],
        )
        .unwrap();
        let content = std::fs::read(&path).unwrap();
        assert_eq!(
            content,
            b"*2\r\n$6\r\nSELECT\r\n$1\r\n3\r\n*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n"
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}
