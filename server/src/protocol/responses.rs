/*
 * Created on Thu Feb 16 2023
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

//! Pre-encoded RESP frames for the fixed responses, and builders for the
//! handful of responses that embed a client-supplied name

pub mod groups {
    //! Responses with a fixed wire representation
    pub const OKAY: &[u8] = b"+OK\r\n";
    pub const PONG: &[u8] = b"+PONG\r\n";
    /// The null bulk string: "no such value"
    pub const NIL_BULK: &[u8] = b"$-1\r\n";
    /// The zero-length bulk string
    pub const EMPTY_BULK: &[u8] = b"$0\r\n\r\n";
    pub const NOAUTH: &[u8] = b"-NOAUTH Authentication required\r\n";
    pub const WRONGPASS: &[u8] =
        b"-WRONGPASS invalid username-password pair or user is disabled.\r\n";
    pub const AUTH_WITHOUT_PASSWORD: &[u8] = b"-ERR AUTH <password> called without any password configured for the default user. Are you sure your configuration is correct?\r\n";
    pub const NOT_AN_INT: &[u8] = b"-ERR value is not an integer or out of range\r\n";
    pub const INDEX_OUT_OF_RANGE: &[u8] = b"-ERR index out of range\r\n";
    pub const DB_INDEX_OUT_OF_RANGE: &[u8] = b"-ERR DB index is out of range\r\n";
    pub const PROTOCOL_ERROR: &[u8] = b"-ERR Protocol error\r\n";
}

/// `wrong number of arguments` with the offending command name in lowercase
pub fn err_wrong_number_of_args(cmd: &[u8]) -> Vec<u8> {
    let name = String::from_utf8_lossy(cmd).to_lowercase();
    format!("-ERR wrong number of arguments for '{name}' command\r\n").into_bytes()
}

/// `unknown command` with the name exactly as the client sent it
pub fn err_unknown_command(cmd: &[u8]) -> Vec<u8> {
    let name = String::from_utf8_lossy(cmd);
    format!("-ERR unknown command '{name}'\r\n").into_bytes()
}

/// `unknown subcommand`, used by CONFIG
pub fn err_unknown_subcommand(sub: &[u8]) -> Vec<u8> {
    let name = String::from_utf8_lossy(sub);
    format!("-ERR unknown subcommand '{name}'.\r\n").into_bytes()
}
