/*
 * Created on Thu Mar 09 2023
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

//! # Background services
//!
//! Two once-a-second loops: the expiry reaper and (when `appendfsync
//! everysec` is configured) the AOF fsync scheduler. Both run until the
//! shutdown broadcast fires.

use crate::corestore::Corestore;
use crate::dbnet::Terminator;
use crate::diskstore::AppendOnlyFile;
use crate::expiry;
use std::sync::Arc;
use tokio::time::{self, Duration};

/// The reaper wakes up every second and deletes every key whose deadline has
/// passed. The expiry index lock is a leaf: each expired entry is popped
/// (and untracked) first, and only then is the owning database locked for
/// the deletion
pub async fn expiry_reaper(handle: Corestore, mut terminator: Terminator) {
    loop {
        tokio::select! {
            // Sleep until the next whole-second tick
            _ = time::sleep_until(time::Instant::now() + Duration::from_secs(1)) => {
                let now = expiry::unix_now();
                while let Some((db_index, key)) = handle.expiry().pop_expired(now) {
                    handle.db(db_index).lock().del(&key);
                }
            }
            // Otherwise wait for a notification
            _ = terminator.receive_signal() => {
                // we got a notification to quit; so break out
                break;
            }
        }
    }
    log::info!("Expiry reaper has exited");
}

/// The everysec fsync scheduler: once a second, flush the AOF's buffers to
/// disk iff something was appended since the last flush
pub async fn aof_sync_scheduler(aof: Arc<AppendOnlyFile>, mut terminator: Terminator) {
    loop {
        tokio::select! {
            _ = time::sleep_until(time::Instant::now() + Duration::from_secs(1)) => {
                if let Err(e) = aof.sync_if_dirty() {
                    log::error!("Failed to sync the append only file: {e}");
                }
            }
            _ = terminator.receive_signal() => break,
        }
    }
    log::info!("AOF sync service has exited");
}
