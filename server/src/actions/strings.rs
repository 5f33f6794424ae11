/*
 * Created on Thu Mar 02 2023
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

//! The string commands: `GET`, `SET`, `SETNX`, `MGET`, the counter family
//! and `SUBSTR`

use crate::actions::{ensure_length, log_write, map_db_error, parse_int, ActionResult};
use crate::corestore::{Corestore, Data, DbError};
use crate::dbnet::{BufferedSocketStream, Connection, Session};
use crate::protocol::responses::groups;
use crate::queryengine::ActionIter;
use crate::resp::writer::ArrayWriter;
use crate::resp::{BytesWrapper, Integer64};

action! {
    /// Run a `GET` query
    fn get(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 1)?;
        let key = unsafe { act.next_unchecked() };
        let ret = handle.db(sess.cur_db).lock().get(key);
        match ret {
            Ok(value) => con.write_response(BytesWrapper(value)).await?,
            Err(DbError::NotFound) => con.write_response(groups::EMPTY_BULK).await?,
            Err(e) => return Err(map_db_error(e)),
        }
        Ok(())
    }
}

action! {
    /// Run a `SET` query
    fn set(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 2)?;
        let (key, value) = unsafe { (act.next_unchecked(), act.next_unchecked()) };
        {
            let mut db = handle.db(sess.cur_db).lock();
            db.set(key.clone(), value.clone());
            // a plain overwrite discards any pending deadline
            handle.expiry().remove(sess.cur_db, key);
            log_write(handle, sess.cur_db, act.full())?;
        }
        con.write_response(groups::OKAY).await?;
        Ok(())
    }
}

action! {
    /// Run a `SETNX` query: set only if the key does not exist yet
    fn setnx(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 2)?;
        let (key, value) = unsafe { (act.next_unchecked(), act.next_unchecked()) };
        let created = {
            let mut db = handle.db(sess.cur_db).lock();
            let created = db.set_nx(key.clone(), value.clone());
            log_write(handle, sess.cur_db, act.full())?;
            created
        };
        con.write_response(Integer64(created as i64)).await?;
        Ok(())
    }
}

action! {
    /// Run an `MGET` query. Any missing key aborts the multi-get with the
    /// missing-read outcome
    fn mget(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len >= 1)?;
        let ret: Result<Vec<Data>, DbError> = {
            let db = handle.db(sess.cur_db).lock();
            act.map(|key| db.get(key)).collect()
        };
        match ret {
            Ok(values) => {
                let mut writer = ArrayWriter::new(con, values.len()).await?;
                for value in values {
                    writer.write_element(value).await?;
                }
            }
            Err(DbError::NotFound) => con.write_response(groups::EMPTY_BULK).await?,
            Err(e) => return Err(map_db_error(e)),
        }
        Ok(())
    }
}

action! {
    /// Run an `INCR` query
    fn incr(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 1)?;
        let key = unsafe { act.next_unchecked() };
        incr_by(handle, con, sess, act.full(), key, 1).await
    }
}

action! {
    /// Run an `INCRBY` query
    fn incrby(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 2)?;
        let key = unsafe { act.next_unchecked() };
        let delta = parse_int(unsafe { act.next_unchecked() })?;
        incr_by(handle, con, sess, act.full(), key, delta).await
    }
}

action! {
    /// Run a `DECR` query
    fn decr(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 1)?;
        let key = unsafe { act.next_unchecked() };
        incr_by(handle, con, sess, act.full(), key, -1).await
    }
}

action! {
    /// Run a `DECRBY` query: decrement is increment by the negation
    fn decrby(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 2)?;
        let key = unsafe { act.next_unchecked() };
        let delta = parse_int(unsafe { act.next_unchecked() })?
            .checked_neg()
            .ok_or(groups::NOT_AN_INT)?;
        incr_by(handle, con, sess, act.full(), key, delta).await
    }
}

async fn incr_by<T>(
    handle: &Corestore,
    con: &mut Connection<T>,
    sess: &mut Session,
    full: &[Data],
    key: &Data,
    delta: i64,
) -> ActionResult<()>
where
    T: BufferedSocketStream,
{
    let ret = {
        let mut db = handle.db(sess.cur_db).lock();
        let ret = db.incr_by(key, delta);
        if ret.is_ok() {
            log_write(handle, sess.cur_db, full)?;
        }
        ret
    };
    match ret {
        Ok(new_value) => con.write_response(Integer64(new_value)).await?,
        Err(e) => return Err(map_db_error(e)),
    }
    Ok(())
}

action! {
    /// Run a `SUBSTR` query: both offsets are inclusive, negative offsets
    /// count from the end of the string
    fn substr(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 3)?;
        let key = unsafe { act.next_unchecked() };
        let start = parse_int(unsafe { act.next_unchecked() })?;
        let end = parse_int(unsafe { act.next_unchecked() })?;
        let ret = handle.db(sess.cur_db).lock().get(key);
        let value = match ret {
            Ok(value) => value,
            Err(DbError::NotFound) => {
                con.write_response(groups::EMPTY_BULK).await?;
                return Ok(());
            }
            Err(e) => return Err(map_db_error(e)),
        };
        let len = value.len() as i64;
        let mut start = if start < 0 { len + start } else { start };
        let mut end = if end < 0 { len + end } else { end };
        if start < 0 {
            start = 0;
        }
        if end >= len {
            end = len - 1;
        }
        if start > end || start >= len {
            con.write_response(groups::EMPTY_BULK).await?;
        } else {
            let slice = Data::copy_from_slice(&value.as_ref()[start as usize..=end as usize]);
            con.write_response(BytesWrapper(slice)).await?;
        }
        Ok(())
    }
}
