/*
 * Created on Tue Mar 07 2023
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

//! The server-level commands: `DBSIZE`, `FLUSHDB`, `FLUSHALL` and `CONFIG`

use crate::actions::{ensure_length, log_write};
use crate::protocol::responses::{self, groups};
use crate::resp::writer::ArrayWriter;
use crate::resp::Integer64;

action! {
    /// Run a `DBSIZE` query: number of keys in the selected database
    fn dbsize(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 0)?;
        let size = handle.db(sess.cur_db).lock().len();
        con.write_response(Integer64(size as i64)).await?;
        Ok(())
    }
}

action! {
    /// Run a `FLUSHDB` query: clear the selected database
    fn flushdb(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 0)?;
        {
            let mut db = handle.db(sess.cur_db).lock();
            db.clear();
            handle.expiry().clear_db(sess.cur_db);
            log_write(handle, sess.cur_db, act.full())?;
        }
        con.write_response(groups::OKAY).await?;
        Ok(())
    }
}

action! {
    /// Run a `FLUSHALL` query: clear every database, one lock at a time.
    /// No two locks are ever held together, so the coordinator mutex is not
    /// needed here
    fn flushall(handle: &Corestore, con: &mut Connection<T>, sess: &mut Session, act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 0)?;
        for index in 0..handle.db_count() {
            handle.db(index).lock().clear();
        }
        handle.expiry().clear_all();
        log_write(handle, sess.cur_db, act.full())?;
        con.write_response(groups::OKAY).await?;
        Ok(())
    }
}

action! {
    /// Run a `CONFIG GET` query. `save` and `appendonly` return the values
    /// that redis-benchmark expects; everything else is looked up in the
    /// configuration snapshot
    fn config(handle: &Corestore, con: &mut Connection<T>, _sess: &mut Session, mut act: ActionIter<'_>) {
        ensure_length(act.command(), act.len(), |len| len == 2)?;
        let subcommand = unsafe { act.next_unchecked() };
        let mut sub_upper = subcommand.to_vec();
        sub_upper.make_ascii_uppercase();
        if sub_upper != b"GET" {
            con.write_response(responses::err_unknown_subcommand(subcommand)).await?;
            return Ok(());
        }
        let name = unsafe { act.next_unchecked() };
        let value: Vec<u8> = match name.as_ref() {
            b"save" => b"3600 1 300 100 60 10000".to_vec(),
            b"appendonly" => b"no".to_vec(),
            _ => {
                let name = String::from_utf8_lossy(name);
                handle
                    .cfg_value(&name)
                    .map(|value| value.as_bytes().to_vec())
                    .unwrap_or_default()
            }
        };
        let mut writer = ArrayWriter::new(con, 2).await?;
        writer.write_element(name.as_ref()).await?;
        writer.write_element(value).await?;
        Ok(())
    }
}
