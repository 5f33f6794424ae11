/*
 * Created on Fri Mar 03 2023
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

//! The key-space commands: `DEL`, `EXISTS`, `RANDOMKEY`, `RENAME`, `MOVE`,
//! `EXPIRE` and `TTL`

use crate::actions::{ensure_length, log_write, parse_int};
use crate::expiry;
use crate::protocol::responses::groups;
use crate::resp::{BytesWrapper, Integer64};

action! {
    /// Run a `DEL` query: remove every named key, counting the ones that
    /// actually existed
    fn del(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len >= 1)?;
        let deleted = {
            let mut db = handle.db(sess.cur_db).lock();
            let mut deleted = 0i64;
            let full = act.full();
            for key in act {
                if db.del(key) {
                    handle.expiry().remove(sess.cur_db, key);
                    deleted += 1;
                }
            }
            log_write(handle, sess.cur_db, full)?;
            deleted
        };
        con.write_response(Integer64(deleted)).await?;
        Ok(())
    }
}

action! {
    /// Run an `EXISTS` query
    fn exists(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 1)?;
        let key = unsafe { act.next_unchecked() };
        let found = handle.db(sess.cur_db).lock().exists(key);
        con.write_response(Integer64(found as i64)).await?;
        Ok(())
    }
}

action! {
    /// Run a `RANDOMKEY` query: any key of the selected database
    fn randomkey(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 0)?;
        let key = handle.db(sess.cur_db).lock().random_key();
        match key {
            Some(key) => con.write_response(BytesWrapper(key)).await?,
            None => con.write_response(groups::NIL_BULK).await?,
        }
        Ok(())
    }
}

action! {
    /// Run a `RENAME` query
    fn rename(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 2)?;
        let (old, new) = unsafe { (act.next_unchecked(), act.next_unchecked()) };
        let ret = {
            let mut db = handle.db(sess.cur_db).lock();
            let ret = db.rename(old, new.clone());
            if ret.is_ok() {
                // the old name is gone and the new name was overwritten, so
                // neither keeps a deadline
                handle.expiry().remove(sess.cur_db, old);
                handle.expiry().remove(sess.cur_db, new);
                log_write(handle, sess.cur_db, act.full())?;
            }
            ret
        };
        match ret {
            Ok(()) => con.write_response(groups::OKAY).await?,
            Err(_) => con.write_response(groups::EMPTY_BULK).await?,
        }
        Ok(())
    }
}

action! {
    /// Run a `MOVE` query: move a key from the selected database into
    /// another one, unless the destination already holds it.
    ///
    /// This is the only multi-database operation, and it acquires the
    /// process-wide coordinator mutex before the two database locks so that
    /// two concurrent `MOVE`s can never deadlock on lock order.
    fn mv(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 2)?;
        let key = unsafe { act.next_unchecked() };
        let dest = parse_int(unsafe { act.next_unchecked() })?;
        if dest < 0 || dest as usize >= handle.db_count() {
            con.write_response(groups::DB_INDEX_OUT_OF_RANGE).await?;
            return Ok(());
        }
        let dest = dest as usize;
        if dest == sess.cur_db {
            // nothing to move; also keeps the two-guard acquisition below
            // strictly on distinct databases
            con.write_response(Integer64(0)).await?;
            return Ok(());
        }
        let moved = {
            let _coordinator = handle.movelock().lock();
            let mut src = handle.db(sess.cur_db).lock();
            let mut dst = handle.db(dest).lock();
            if dst.exists(key) {
                false
            } else {
                match src.remove_record(key) {
                    Some(record) => {
                        dst.put_record(key.clone(), record);
                        handle.expiry().remove(sess.cur_db, key);
                        log_write(handle, sess.cur_db, act.full())?;
                        true
                    }
                    None => false,
                }
            }
        };
        con.write_response(Integer64(moved as i64)).await?;
        Ok(())
    }
}

action! {
    /// Run an `EXPIRE` query: install or update the key's deadline
    fn expire(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 2)?;
        let key = unsafe { act.next_unchecked() };
        let seconds = parse_int(unsafe { act.next_unchecked() })?;
        let installed = {
            let db = handle.db(sess.cur_db).lock();
            if db.exists(key) {
                let deadline = expiry::unix_now().saturating_add(seconds);
                handle.expiry().add_update(sess.cur_db, key.clone(), deadline);
                log_write(handle, sess.cur_db, act.full())?;
                true
            } else {
                false
            }
        };
        con.write_response(Integer64(installed as i64)).await?;
        Ok(())
    }
}

action! {
    /// Run a `TTL` query: `-2` for a missing key, `-1` for a key without a
    /// deadline, else the remaining whole seconds
    fn ttl(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 1)?;
        let key = unsafe { act.next_unchecked() };
        let ttl = {
            let db = handle.db(sess.cur_db).lock();
            if !db.exists(key) {
                -2
            } else {
                match handle.expiry().ttl(sess.cur_db, key, expiry::unix_now()) {
                    Some(remaining) => remaining.max(0),
                    None => -1,
                }
            }
        };
        con.write_response(Integer64(ttl)).await?;
        Ok(())
    }
}
