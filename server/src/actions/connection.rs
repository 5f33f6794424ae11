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

//! The connection-level commands: `AUTH`, `PING`, `ECHO`, `QUIT` and
//! `SELECT`

use crate::actions::{ensure_length, parse_int};
use crate::corestore::Data;
use crate::protocol::responses::groups;
use crate::queryengine::ActionIter;
use crate::resp::BytesWrapper;

action! {
    /// Authenticate this session against the configured password
    fn auth(_handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 1)?;
        let password = unsafe { act.next_unchecked() };
        if !sess.auth.provider().is_enabled() {
            con.write_response(groups::AUTH_WITHOUT_PASSWORD).await?;
        } else if sess.auth.provider().verify(password) {
            sess.auth.set_auth();
            con.write_response(groups::OKAY).await?;
        } else {
            con.write_response(groups::WRONGPASS).await?;
        }
        Ok(())
    }
}

action! {
    /// Reply `+PONG`, or echo the arguments back as a bulk string
    fn ping(_handle: &Corestore, con: &mut Connection<T>, _sess: &mut Session, mut act: ActionIter<'_>) {
        if act.is_empty() {
            con.write_response(groups::PONG).await?;
        } else {
            let message = join_with_spaces(&mut act);
            con.write_response(BytesWrapper(Data::from_vec(message))).await?;
        }
        Ok(())
    }
}

action! {
    /// Echo the arguments back as a bulk string
    fn echo(_handle: &Corestore, con: &mut Connection<T>, _sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len >= 1)?;
        let message = join_with_spaces(&mut act);
        con.write_response(BytesWrapper(Data::from_vec(message))).await?;
        Ok(())
    }
}

action! {
    /// Close the connection once the `+OK` has been written out
    fn quit(_handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 0)?;
        sess.quit_requested = true;
        con.write_response(groups::OKAY).await?;
        Ok(())
    }
}

action! {
    /// Point this session at another database
    fn select(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 1)?;
        let index = parse_int(unsafe { act.next_unchecked() })?;
        if index < 0 || index as usize >= handle.db_count() {
            con.write_response(groups::DB_INDEX_OUT_OF_RANGE).await?;
            return Ok(());
        }
        sess.cur_db = index as usize;
        con.write_response(groups::OKAY).await?;
        Ok(())
    }
}

fn join_with_spaces(act: &mut ActionIter<'_>) -> Vec<u8> {
    let mut message = Vec::new();
    let mut first = true;
    for arg in act {
        if !first {
            message.push(b' ');
        }
        message.extend_from_slice(arg);
        first = false;
    }
    message
}
