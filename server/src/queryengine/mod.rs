/*
 * Created on Tue Feb 28 2023
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

//! # The query engine
//!
//! Dispatches a parsed [`Query`] to its action. The command name is matched
//! case-insensitively. Before dispatch, the authentication gate applies: with
//! a password configured, a session that has not authenticated may run
//! nothing but `AUTH`.

use crate::actions::{self, ActionResult};
use crate::corestore::{Corestore, Data};
use crate::dbnet::{BufferedSocketStream, Connection, Session};
use crate::protocol::responses::{self, groups};
use crate::protocol::Query;

/// An iterator over a query's arguments, excluding the command name
pub struct ActionIter<'a> {
    full: &'a [Data],
    cursor: usize,
}

impl<'a> ActionIter<'a> {
    pub fn new(query: &'a Query) -> Self {
        ActionIter {
            full: query.as_slice(),
            cursor: 1,
        }
    }
    /// The number of arguments that remain
    pub fn len(&self) -> usize {
        self.full.len() - self.cursor
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// The command name, exactly as the client sent it
    pub fn command(&self) -> &'a Data {
        &self.full[0]
    }
    /// The whole argument vector including the command name; this is what
    /// the append only file records
    pub fn full(&self) -> &'a [Data] {
        self.full
    }
    /// Returns the next argument without an arity check
    ///
    /// ## Safety
    /// The caller must have verified the arity beforehand (see
    /// [`crate::actions::ensure_length`])
    pub unsafe fn next_unchecked(&mut self) -> &'a Data {
        debug_assert!(self.cursor < self.full.len());
        let ret = self.full.get_unchecked(self.cursor);
        self.cursor += 1;
        ret
    }
}

impl<'a> Iterator for ActionIter<'a> {
    type Item = &'a Data;
    fn next(&mut self) -> Option<Self::Item> {
        let ret = self.full.get(self.cursor);
        self.cursor += ret.is_some() as usize;
        ret
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.len();
        (len, Some(len))
    }
}

#[derive(PartialEq)]
enum Operation {
    Read,
    Write,
}

/// Every command this server knows, classified by whether it mutates a
/// record. Only `Write` commands are recorded on the append only file
const COMMAND_TABLE: &[(&str, Operation)] = &[
    // connection
    ("AUTH", Operation::Read),
    ("PING", Operation::Read),
    ("ECHO", Operation::Read),
    ("QUIT", Operation::Read),
    ("SELECT", Operation::Read),
    // string
    ("GET", Operation::Read),
    ("SET", Operation::Write),
    ("SETNX", Operation::Write),
    ("MGET", Operation::Read),
    ("INCR", Operation::Write),
    ("INCRBY", Operation::Write),
    ("DECR", Operation::Write),
    ("DECRBY", Operation::Write),
    ("SUBSTR", Operation::Read),
    // generic
    ("DEL", Operation::Write),
    ("EXISTS", Operation::Read),
    ("RANDOMKEY", Operation::Read),
    ("RENAME", Operation::Write),
    ("MOVE", Operation::Write),
    ("EXPIRE", Operation::Write),
    ("TTL", Operation::Read),
    // server
    ("DBSIZE", Operation::Read),
    ("FLUSHDB", Operation::Write),
    ("FLUSHALL", Operation::Write),
    ("CONFIG", Operation::Read),
    // list
    ("LLEN", Operation::Read),
    ("LPUSH", Operation::Write),
    ("RPUSH", Operation::Write),
    ("LPOP", Operation::Write),
    ("RPOP", Operation::Write),
    ("LSET", Operation::Write),
    ("LINDEX", Operation::Read),
    ("LREM", Operation::Write),
    ("LRANGE", Operation::Read),
    ("LTRIM", Operation::Write),
];

/// Whether the (uppercase) command name is classified as a write. Unknown
/// names are treated as non-mutating
pub fn is_write_command(name: &[u8]) -> bool {
    COMMAND_TABLE
        .iter()
        .any(|(cmd, op)| cmd.as_bytes() == name && *op == Operation::Write)
}

/// Run a simple query
pub async fn execute_simple<T>(
    handle: &Corestore,
    con: &mut Connection<T>,
    sess: &mut Session,
    query: Query,
) -> ActionResult<()>
where
    T: BufferedSocketStream,
{
    if query.is_empty() {
        con.write_response(groups::PROTOCOL_ERROR).await?;
        return Ok(());
    }
    let mut name = query.as_slice()[0].to_vec();
    name.make_ascii_uppercase();
    // the authentication gate
    if sess.auth.provider().is_enabled()
        && !sess.auth.authenticated()
        && name != b"AUTH"
    {
        con.write_response(groups::NOAUTH).await?;
        return Ok(());
    }
    let act = ActionIter::new(&query);
    match name.as_slice() {
        // connection
        b"AUTH" => actions::connection::auth(handle, con, sess, act).await,
        b"PING" => actions::connection::ping(handle, con, sess, act).await,
        b"ECHO" => actions::connection::echo(handle, con, sess, act).await,
        b"QUIT" => actions::connection::quit(handle, con, sess, act).await,
        b"SELECT" => actions::connection::select(handle, con, sess, act).await,
        // string
        b"GET" => actions::strings::get(handle, con, sess, act).await,
        b"SET" => actions::strings::set(handle, con, sess, act).await,
        b"SETNX" => actions::strings::setnx(handle, con, sess, act).await,
        b"MGET" => actions::strings::mget(handle, con, sess, act).await,
        b"INCR" => actions::strings::incr(handle, con, sess, act).await,
        b"INCRBY" => actions::strings::incrby(handle, con, sess, act).await,
        b"DECR" => actions::strings::decr(handle, con, sess, act).await,
        b"DECRBY" => actions::strings::decrby(handle, con, sess, act).await,
        b"SUBSTR" => actions::strings::substr(handle, con, sess, act).await,
        // generic
        b"DEL" => actions::generic::del(handle, con, sess, act).await,
        b"EXISTS" => actions::generic::exists(handle, con, sess, act).await,
        b"RANDOMKEY" => actions::generic::randomkey(handle, con, sess, act).await,
        b"RENAME" => actions::generic::rename(handle, con, sess, act).await,
        b"MOVE" => actions::generic::mv(handle, con, sess, act).await,
        b"EXPIRE" => actions::generic::expire(handle, con, sess, act).await,
        b"TTL" => actions::generic::ttl(handle, con, sess, act).await,
        // server
        b"DBSIZE" => actions::server::dbsize(handle, con, sess, act).await,
        b"FLUSHDB" => actions::server::flushdb(handle, con, sess, act).await,
        b"FLUSHALL" => actions::server::flushall(handle, con, sess, act).await,
        b"CONFIG" => actions::server::config(handle, con, sess, act).await,
        // list
        b"LLEN" => actions::lists::llen(handle, con, sess, act).await,
        b"LPUSH" => actions::lists::lpush(handle, con, sess, act).await,
        b"RPUSH" => actions::lists::rpush(handle, con, sess, act).await,
        b"LPOP" => actions::lists::lpop(handle, con, sess, act).await,
        b"RPOP" => actions::lists::rpop(handle, con, sess, act).await,
        b"LSET" => actions::lists::lset(handle, con, sess, act).await,
        b"LINDEX" => actions::lists::lindex(handle, con, sess, act).await,
        b"LREM" => actions::lists::lrem(handle, con, sess, act).await,
        b"LRANGE" => actions::lists::lrange(handle, con, sess, act).await,
        b"LTRIM" => actions::lists::ltrim(handle, con, sess, act).await,
        _ => {
            con.write_response(responses::err_unknown_command(&query.as_slice()[0]))
                .await?;
            Ok(())
        }
    }
}
