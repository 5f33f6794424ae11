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

//! A binary min-heap of expiry deadlines that keeps a position index, so a
//! tracked key can be updated or removed in O(log n) instead of a scan.
//! `std::collections::BinaryHeap` has no decrease-key, which is why this is
//! hand-rolled.

use crate::corestore::Data;
use std::collections::HashMap;

/// What a tracked key is identified by: the database index and the key itself
pub type TrackId = (usize, Data);

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub db_index: usize,
    pub key: Data,
    /// unix timestamp (seconds) past which the key is expired
    pub deadline: i64,
}

impl Entry {
    fn track_id(&self) -> TrackId {
        (self.db_index, self.key.clone())
    }
}

#[derive(Default)]
pub struct DeadlineHeap {
    entries: Vec<Entry>,
    // invariant: `pos[id] == i` iff `entries[i].track_id() == id`
    pos: HashMap<TrackId, usize>,
}

impl DeadlineHeap {
    pub fn new() -> Self {
        DeadlineHeap {
            entries: Vec::new(),
            pos: HashMap::new(),
        }
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    /// Install a deadline for the key, or update it in place if the key is
    /// already tracked
    pub fn push_or_update(&mut self, db_index: usize, key: Data, deadline: i64) {
        let id = (db_index, key);
        if let Some(&slot) = self.pos.get(&id) {
            self.entries[slot].deadline = deadline;
            self.sift_up(slot);
            self.sift_down(slot);
        } else {
            let slot = self.entries.len();
            self.entries.push(Entry {
                db_index: id.0,
                key: id.1.clone(),
                deadline,
            });
            self.pos.insert(id, slot);
            self.sift_up(slot);
        }
    }
    /// The entry with the earliest deadline
    pub fn peek(&self) -> Option<&Entry> {
        self.entries.first()
    }
    /// Pop the entry with the earliest deadline
    pub fn pop(&mut self) -> Option<Entry> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.swap_slots(0, last);
        let entry = match self.entries.pop() {
            Some(entry) => entry,
            None => return None,
        };
        self.pos.remove(&entry.track_id());
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        Some(entry)
    }
    /// Stop tracking the given key. Returns whether it was tracked
    pub fn remove(&mut self, id: &TrackId) -> bool {
        let slot = match self.pos.remove(id) {
            Some(slot) => slot,
            None => return false,
        };
        let last = self.entries.len() - 1;
        if slot != last {
            self.entries.swap(slot, last);
            self.pos.insert(self.entries[slot].track_id(), slot);
        }
        self.entries.pop();
        if slot < self.entries.len() {
            self.sift_up(slot);
            self.sift_down(slot);
        }
        true
    }
    pub fn deadline_of(&self, id: &TrackId) -> Option<i64> {
        self.pos.get(id).map(|&slot| self.entries[slot].deadline)
    }
    /// Drop every entry for which `decide` returns false and re-heapify
    pub fn retain(&mut self, decide: impl Fn(&Entry) -> bool) {
        self.entries.retain(&decide);
        self.pos.clear();
        for (slot, entry) in self.entries.iter().enumerate() {
            self.pos.insert(entry.track_id(), slot);
        }
        if self.entries.len() > 1 {
            for slot in (0..self.entries.len() / 2).rev() {
                self.sift_down(slot);
            }
        }
    }
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pos.clear();
    }
    fn swap_slots(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.entries.swap(a, b);
        self.pos.insert(self.entries[a].track_id(), a);
        self.pos.insert(self.entries[b].track_id(), b);
    }
    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.entries[slot].deadline < self.entries[parent].deadline {
                self.swap_slots(slot, parent);
                slot = parent;
            } else {
                break;
            }
        }
    }
    fn sift_down(&mut self, mut slot: usize) {
        loop {
            let left = slot * 2 + 1;
            let right = slot * 2 + 2;
            let mut smallest = slot;
            if left < self.entries.len()
                && self.entries[left].deadline < self.entries[smallest].deadline
            {
                smallest = left;
            }
            if right < self.entries.len()
                && self.entries[right].deadline < self.entries[smallest].deadline
            {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap_slots(slot, smallest);
            slot = smallest;
        }
    }
}
