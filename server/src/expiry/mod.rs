/*
 * Created on Tue Feb 21 2023
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

//! # The expiry subsystem
//!
//! Keeps track of the keys that must be deleted at some point, across all
//! databases. The index is keyed by `(db_index, key)`, so two databases may
//! hold the same key name with independent deadlines.
//!
//! Lock ordering: the index's internal mutex is a leaf. It may be taken while
//! holding a database lock, but a database lock must never be acquired while
//! it is held. The reaper obeys this by popping under the index lock first
//! and only then locking the relevant database.

use crate::corestore::Data;
use parking_lot::Mutex;

mod heap;

use heap::DeadlineHeap;

/// The current wall clock, in whole unix seconds
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// The cross-database deadline index
pub struct ExpireIndex {
    inner: Mutex<DeadlineHeap>,
}

impl ExpireIndex {
    pub fn new() -> Self {
        ExpireIndex {
            inner: Mutex::new(DeadlineHeap::new()),
        }
    }
    /// Install or update the deadline for a key
    pub fn add_update(&self, db_index: usize, key: Data, deadline: i64) {
        self.inner.lock().push_or_update(db_index, key, deadline)
    }
    /// If the earliest tracked deadline is at or before `now`, stop tracking
    /// that entry and hand it to the caller for deletion
    pub fn pop_expired(&self, now: i64) -> Option<(usize, Data)> {
        let mut heap = self.inner.lock();
        match heap.peek() {
            Some(entry) if entry.deadline <= now => {}
            _ => return None,
        }
        heap.pop().map(|entry| (entry.db_index, entry.key))
    }
    /// Remaining whole seconds until the key's deadline, if it is tracked
    pub fn ttl(&self, db_index: usize, key: &Data, now: i64) -> Option<i64> {
        self.inner
            .lock()
            .deadline_of(&(db_index, key.clone()))
            .map(|deadline| deadline - now)
    }
    /// Stop tracking a key (it was deleted, overwritten or moved away)
    pub fn remove(&self, db_index: usize, key: &Data) -> bool {
        self.inner.lock().remove(&(db_index, key.clone()))
    }
    /// Stop tracking everything that lives in the given database
    pub fn clear_db(&self, db_index: usize) {
        self.inner.lock().retain(|entry| entry.db_index != db_index)
    }
    pub fn clear_all(&self) {
        self.inner.lock().clear()
    }
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> Data {
        Data::copy_from_slice(name.as_bytes())
    }

    #[test]
    fn nothing_expires_before_its_deadline() {
        let index = ExpireIndex::new();
        index.add_update(0, key("k"), 100);
        assert_eq!(index.pop_expired(99), None);
        assert_eq!(index.pop_expired(100), Some((0, key("k"))));
        // popping detached the entry
        assert_eq!(index.pop_expired(1000), None);
        assert_eq!(index.ttl(0, &key("k"), 100), None);
    }

    #[test]
    fn ttl_counts_down() {
        let index = ExpireIndex::new();
        index.add_update(2, key("k"), 60);
        assert_eq!(index.ttl(2, &key("k"), 10), Some(50));
        assert_eq!(index.ttl(0, &key("k"), 10), None);
        // an update replaces the previous deadline
        index.add_update(2, key("k"), 90);
        assert_eq!(index.ttl(2, &key("k"), 10), Some(80));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn clear_db_is_scoped() {
        let index = ExpireIndex::new();
        index.add_update(0, key("a"), 10);
        index.add_update(1, key("b"), 10);
        index.clear_db(0);
        assert_eq!(index.pop_expired(10), Some((1, key("b"))));
        assert_eq!(index.pop_expired(10), None);
    }
}
