/*
 * Created on Wed Mar 01 2023
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

//! # Actions
//!
//! Actions are like shell commands, you provide arguments -- they return
//! output. This module contains the collection of commands supported by
//! Ferrite, grouped by family the way the command table groups them.
//!
//! Every action that touches a database does so under that database's lock,
//! and appends to the append only file *while still holding that lock* if
//! the command is a mutating one. No lock is ever held across an `.await`.

#[macro_use]
mod macros;
pub mod connection;
pub mod generic;
pub mod lists;
pub mod server;
pub mod strings;

use crate::corestore::{Corestore, Data, DbError};
use crate::protocol::responses::{self, groups};
use crate::queryengine;
use std::io::Error as IoError;

/// A generic result for actions
pub type ActionResult<T> = Result<T, ActionError>;

/// Errors that can occur while running actions
#[derive(Debug)]
pub enum ActionError {
    /// A fixed, pre-encoded error response
    ActionError(&'static [u8]),
    /// An error response carrying client-supplied text
    OwnedError(Vec<u8>),
    IoError(IoError),
}

impl From<&'static [u8]> for ActionError {
    fn from(e: &'static [u8]) -> Self {
        Self::ActionError(e)
    }
}

impl From<Vec<u8>> for ActionError {
    fn from(e: Vec<u8>) -> Self {
        Self::OwnedError(e)
    }
}

impl From<IoError> for ActionError {
    fn from(e: IoError) -> Self {
        Self::IoError(e)
    }
}

/// Fail with `wrong number of arguments` unless `is_valid` accepts the
/// argument count
pub fn ensure_length(cmd: &[u8], len: usize, is_valid: fn(usize) -> bool) -> ActionResult<()> {
    if is_valid(len) {
        Ok(())
    } else {
        Err(ActionError::OwnedError(responses::err_wrong_number_of_args(
            cmd,
        )))
    }
}

/// Map a storage error onto its wire response. `NotFound` has per-command
/// semantics and must be handled before calling this
pub fn map_db_error(e: DbError) -> ActionError {
    let payload: &'static [u8] = match e {
        DbError::WrongKind | DbError::ValueNotInt => groups::NOT_AN_INT,
        DbError::IndexOutOfRange => groups::INDEX_OUT_OF_RANGE,
        DbError::NotFound => groups::NIL_BULK,
    };
    ActionError::ActionError(payload)
}

/// Append the command to the AOF if one is installed and the command is
/// classified as a write. Callers invoke this while still holding the lock
/// of the database the command ran against
pub fn log_write(handle: &Corestore, db_index: usize, args: &[Data]) -> ActionResult<()> {
    if let Some(aof) = handle.aof() {
        let mut name = args[0].to_vec();
        name.make_ascii_uppercase();
        if queryengine::is_write_command(&name) {
            aof.append(db_index, args).map_err(ActionError::IoError)?;
        }
    }
    Ok(())
}

/// Parse an argument that must be a signed decimal integer
pub fn parse_int(raw: &[u8]) -> ActionResult<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(ActionError::ActionError(groups::NOT_AN_INT))
}
