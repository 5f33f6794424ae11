/*
 * Created on Mon Mar 06 2023
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

//! The list commands
//!
//! Push handlers create the list on demand; every handler that can leave a
//! list empty relies on the storage layer deleting the key, and drops the
//! key's deadline tracking when that happens.

use crate::actions::{ensure_length, log_write, map_db_error, parse_int, ActionResult};
use crate::corestore::{Corestore, Data, DbError};
use crate::dbnet::{BufferedSocketStream, Connection, Session};
use crate::protocol::responses::groups;
use crate::queryengine::ActionIter;
use crate::resp::writer::ArrayWriter;
use crate::resp::{BytesWrapper, Integer64};

action! {
    /// Run an `LPUSH` query
    fn lpush(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        push(handle, con, sess, &mut act, true).await
    }
}

action! {
    /// Run an `RPUSH` query
    fn rpush(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        push(handle, con, sess, &mut act, false).await
    }
}

async fn push<T>(
    handle: &Corestore,
    con: &mut Connection<T>,
    sess: &mut Session,
    act: &mut ActionIter<'_>,
    head: bool,
) -> ActionResult<()>
where
    T: BufferedSocketStream,
{
    ensure_length(act.command(), act.len(), |len| len >= 2)?;
    let full = act.full();
    let key = unsafe { act.next_unchecked() };
    let values: Vec<Data> = act.map(Data::clone).collect();
    let ret = {
        let mut db = handle.db(sess.cur_db).lock();
        let ret = if head {
            db.lpush(key, &values)
        } else {
            db.rpush(key, &values)
        };
        if ret.is_ok() {
            log_write(handle, sess.cur_db, full)?;
        }
        ret
    };
    match ret {
        Ok(new_len) => con.write_response(Integer64(new_len as i64)).await?,
        Err(e) => return Err(map_db_error(e)),
    }
    Ok(())
}

action! {
    /// Run an `LPOP` query
    fn lpop(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        pop(handle, con, sess, &mut act, true).await
    }
}

action! {
    /// Run an `RPOP` query
    fn rpop(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        pop(handle, con, sess, &mut act, false).await
    }
}

async fn pop<T>(
    handle: &Corestore,
    con: &mut Connection<T>,
    sess: &mut Session,
    act: &mut ActionIter<'_>,
    head: bool,
) -> ActionResult<()>
where
    T: BufferedSocketStream,
{
    ensure_length(act.command(), act.len(), |len| len == 1)?;
    let key = unsafe { act.next_unchecked() };
    let ret = {
        let mut db = handle.db(sess.cur_db).lock();
        let ret = if head { db.lpop(key) } else { db.rpop(key) };
        if ret.is_ok() {
            if !db.exists(key) {
                // the pop emptied the list and the key is gone
                handle.expiry().remove(sess.cur_db, key);
            }
            log_write(handle, sess.cur_db, act.full())?;
        }
        ret
    };
    match ret {
        Ok(value) => con.write_response(BytesWrapper(value)).await?,
        Err(DbError::NotFound) => con.write_response(groups::NIL_BULK).await?,
        Err(e) => return Err(map_db_error(e)),
    }
    Ok(())
}

action! {
    /// Run an `LLEN` query
    fn llen(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 1)?;
        let key = unsafe { act.next_unchecked() };
        let ret = handle.db(sess.cur_db).lock().llen(key);
        match ret {
            Ok(len) => con.write_response(Integer64(len as i64)).await?,
            Err(e) => return Err(map_db_error(e)),
        }
        Ok(())
    }
}

action! {
    /// Run an `LINDEX` query: zero-based, negative indexes from the tail
    fn lindex(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 2)?;
        let key = unsafe { act.next_unchecked() };
        let index = parse_int(unsafe { act.next_unchecked() })?;
        let ret = handle.db(sess.cur_db).lock().lindex(key, index);
        match ret {
            Ok(Some(value)) => con.write_response(BytesWrapper(value)).await?,
            Ok(None) => con.write_response(groups::NIL_BULK).await?,
            Err(e) => return Err(map_db_error(e)),
        }
        Ok(())
    }
}

action! {
    /// Run an `LSET` query
    fn lset(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 3)?;
        let key = unsafe { act.next_unchecked() };
        let index = parse_int(unsafe { act.next_unchecked() })?;
        let value = unsafe { act.next_unchecked() };
        let ret = {
            let mut db = handle.db(sess.cur_db).lock();
            let ret = db.lset(key, index, value.clone());
            if ret.is_ok() {
                log_write(handle, sess.cur_db, act.full())?;
            }
            ret
        };
        match ret {
            Ok(()) => con.write_response(groups::OKAY).await?,
            Err(DbError::NotFound) => con.write_response(groups::NIL_BULK).await?,
            Err(e) => return Err(map_db_error(e)),
        }
        Ok(())
    }
}

action! {
    /// Run an `LREM` query: positive counts remove from the head, negative
    /// from the tail, zero removes every occurrence
    fn lrem(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 3)?;
        let key = unsafe { act.next_unchecked() };
        let count = parse_int(unsafe { act.next_unchecked() })?;
        let value = unsafe { act.next_unchecked() };
        let ret = {
            let mut db = handle.db(sess.cur_db).lock();
            let ret = db.lrem(key, count, value);
            if ret.is_ok() {
                if !db.exists(key) {
                    handle.expiry().remove(sess.cur_db, key);
                }
                log_write(handle, sess.cur_db, act.full())?;
            }
            ret
        };
        match ret {
            Ok(removed) => con.write_response(Integer64(removed as i64)).await?,
            Err(e) => return Err(map_db_error(e)),
        }
        Ok(())
    }
}

action! {
    /// Run an `LRANGE` query: both offsets inclusive, clamped to the list
    fn lrange(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 3)?;
        let key = unsafe { act.next_unchecked() };
        let start = parse_int(unsafe { act.next_unchecked() })?;
        let stop = parse_int(unsafe { act.next_unchecked() })?;
        let ret = handle.db(sess.cur_db).lock().lrange(key, start, stop);
        match ret {
            Ok(values) => {
                let mut writer = ArrayWriter::new(con, values.len()).await?;
                for value in values {
                    writer.write_element(value).await?;
                }
            }
            Err(e) => return Err(map_db_error(e)),
        }
        Ok(())
    }
}

action! {
    /// Run an `LTRIM` query: retain only the inclusive range
    fn ltrim(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 3)?;
        let key = unsafe { act.next_unchecked() };
        let start = parse_int(unsafe { act.next_unchecked() })?;
        let stop = parse_int(unsafe { act.next_unchecked() })?;
        let ret = {
            let mut db = handle.db(sess.cur_db).lock();
            let ret = db.ltrim(key, start, stop);
            if ret.is_ok() {
                if !db.exists(key) {
                    handle.expiry().remove(sess.cur_db, key);
                }
                log_write(handle, sess.cur_db, act.full())?;
            }
            ret
        };
        match ret {
            Ok(()) => con.write_response(groups::OKAY).await?,
            Err(e) => return Err(map_db_error(e)),
        }
        Ok(())
    }
}
