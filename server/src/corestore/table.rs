/*
 * Created on Mon Feb 20 2023
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

//! A single logical database: a mapping from keys to typed records behind a
//! mutex
//!
//! The record tag never changes for the lifetime of a key; any operation that
//! expects the other tag fails with [`DbError::WrongKind`]. Reassignment
//! (`SET` over a list, `RENAME` onto an existing key) replaces the record
//! wholesale. Whenever a list operation leaves a list empty, the key is
//! removed from the mapping so that `EXISTS`, `TTL` and `RANDOMKEY` observe
//! the key as absent.

use super::Data;
use parking_lot::{Mutex, MutexGuard};
use rand::Rng;
use std::collections::{HashMap, VecDeque};

pub type DbResult<T> = Result<T, DbError>;

/// Errors produced by database operations. The action layer maps these onto
/// wire responses
#[derive(Debug, PartialEq)]
pub enum DbError {
    NotFound,
    WrongKind,
    ValueNotInt,
    IndexOutOfRange,
}

/// A stored value. The tag is fixed at creation
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Str(Data),
    List(VecDeque<Data>),
}

/// One logical database. All reads and mutations go through [`Database::lock`]
#[derive(Default)]
pub struct Database {
    table: Mutex<HashMap<Data, Record>>,
}

impl Database {
    pub fn new() -> Self {
        Database {
            table: Mutex::new(HashMap::new()),
        }
    }
    /// Acquire this database's lock. The returned guard carries the whole
    /// operation set; it must stay alive for the logical operation *and* the
    /// append-only-file write of the command that performed it
    pub fn lock(&self) -> DbGuard<'_> {
        DbGuard {
            table: self.table.lock(),
        }
    }
}

/// An exclusive handle on a locked database
pub struct DbGuard<'a> {
    table: MutexGuard<'a, HashMap<Data, Record>>,
}

impl<'a> DbGuard<'a> {
    // generic operations

    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn exists(&self, key: &[u8]) -> bool {
        self.table.contains_key(key)
    }
    pub fn del(&mut self, key: &[u8]) -> bool {
        self.table.remove(key).is_some()
    }
    pub fn clear(&mut self) {
        self.table.clear()
    }
    /// Any one key, or `None` on an empty database
    pub fn random_key(&self) -> Option<Data> {
        if self.table.is_empty() {
            return None;
        }
        let nth = rand::thread_rng().gen_range(0..self.table.len());
        self.table.keys().nth(nth).cloned()
    }
    pub fn rename(&mut self, old: &[u8], new: Data) -> DbResult<()> {
        match self.table.remove(old) {
            Some(record) => {
                self.table.insert(new, record);
                Ok(())
            }
            None => Err(DbError::NotFound),
        }
    }
    /// Detach a record (used by MOVE)
    pub fn remove_record(&mut self, key: &[u8]) -> Option<Record> {
        self.table.remove(key)
    }
    /// Attach a record under a key (used by MOVE)
    pub fn put_record(&mut self, key: Data, record: Record) {
        self.table.insert(key, record);
    }

    // string operations

    pub fn get(&self, key: &[u8]) -> DbResult<Data> {
        match self.table.get(key) {
            Some(Record::Str(data)) => Ok(data.clone()),
            Some(Record::List(_)) => Err(DbError::WrongKind),
            None => Err(DbError::NotFound),
        }
    }
    /// Store or overwrite, regardless of the previous record's tag
    pub fn set(&mut self, key: Data, value: Data) {
        self.table.insert(key, Record::Str(value));
    }
    /// Store only if the key does not exist. Returns whether it stored
    pub fn set_nx(&mut self, key: Data, value: Data) -> bool {
        if self.table.contains_key(key.as_ref()) {
            false
        } else {
            self.table.insert(key, Record::Str(value));
            true
        }
    }
    /// Add `delta` to the integer stored at `key`, creating it from zero if
    /// missing. Returns the new value
    pub fn incr_by(&mut self, key: &[u8], delta: i64) -> DbResult<i64> {
        let current = match self.table.get(key) {
            Some(Record::Str(data)) => std::str::from_utf8(data)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or(DbError::ValueNotInt)?,
            Some(Record::List(_)) => return Err(DbError::WrongKind),
            None => 0,
        };
        let new = current.checked_add(delta).ok_or(DbError::ValueNotInt)?;
        self.table.insert(
            Data::copy_from_slice(key),
            Record::Str(Data::from_string(new.to_string())),
        );
        Ok(new)
    }

    // list operations

    pub fn lpush(&mut self, key: &[u8], values: &[Data]) -> DbResult<usize> {
        match self.table.get_mut(key) {
            Some(Record::List(list)) => {
                for value in values {
                    list.push_front(value.clone());
                }
                Ok(list.len())
            }
            Some(Record::Str(_)) => Err(DbError::WrongKind),
            None => {
                let mut list = VecDeque::with_capacity(values.len());
                for value in values {
                    list.push_front(value.clone());
                }
                let len = list.len();
                self.table
                    .insert(Data::copy_from_slice(key), Record::List(list));
                Ok(len)
            }
        }
    }
    pub fn rpush(&mut self, key: &[u8], values: &[Data]) -> DbResult<usize> {
        match self.table.get_mut(key) {
            Some(Record::List(list)) => {
                list.extend(values.iter().cloned());
                Ok(list.len())
            }
            Some(Record::Str(_)) => Err(DbError::WrongKind),
            None => {
                let list: VecDeque<Data> = values.iter().cloned().collect();
                let len = list.len();
                self.table
                    .insert(Data::copy_from_slice(key), Record::List(list));
                Ok(len)
            }
        }
    }
    pub fn lpop(&mut self, key: &[u8]) -> DbResult<Data> {
        self.pop_end(key, true)
    }
    pub fn rpop(&mut self, key: &[u8]) -> DbResult<Data> {
        self.pop_end(key, false)
    }
    fn pop_end(&mut self, key: &[u8], head: bool) -> DbResult<Data> {
        let popped = match self.table.get_mut(key) {
            Some(Record::List(list)) => {
                let value = if head {
                    list.pop_front()
                } else {
                    list.pop_back()
                };
                value.map(|value| (value, list.is_empty()))
            }
            Some(Record::Str(_)) => return Err(DbError::WrongKind),
            None => return Err(DbError::NotFound),
        };
        match popped {
            Some((value, emptied)) => {
                if emptied {
                    self.table.remove(key);
                }
                Ok(value)
            }
            None => {
                // an empty list must never linger in the mapping
                self.table.remove(key);
                Err(DbError::NotFound)
            }
        }
    }
    pub fn llen(&self, key: &[u8]) -> DbResult<usize> {
        match self.table.get(key) {
            Some(Record::List(list)) => Ok(list.len()),
            Some(Record::Str(_)) => Err(DbError::WrongKind),
            None => Ok(0),
        }
    }
    pub fn lindex(&self, key: &[u8], index: i64) -> DbResult<Option<Data>> {
        match self.table.get(key) {
            Some(Record::List(list)) => Ok(normalize_index(list.len(), index)
                .and_then(|idx| list.get(idx))
                .cloned()),
            Some(Record::Str(_)) => Err(DbError::WrongKind),
            None => Ok(None),
        }
    }
    pub fn lset(&mut self, key: &[u8], index: i64, value: Data) -> DbResult<()> {
        match self.table.get_mut(key) {
            Some(Record::List(list)) => match normalize_index(list.len(), index) {
                Some(idx) => {
                    list[idx] = value;
                    Ok(())
                }
                None => Err(DbError::IndexOutOfRange),
            },
            Some(Record::Str(_)) => Err(DbError::WrongKind),
            None => Err(DbError::NotFound),
        }
    }
    /// Remove occurrences of `value`: from the head when `count > 0` (at most
    /// `count`), from the tail when `count < 0` (at most `|count|`), all of
    /// them when `count == 0`. Returns how many were removed
    pub fn lrem(&mut self, key: &[u8], count: i64, value: &[u8]) -> DbResult<usize> {
        let (removed, emptied) = match self.table.get_mut(key) {
            Some(Record::List(list)) => {
                let removed = remove_occurrences(list, count, value);
                (removed, list.is_empty())
            }
            Some(Record::Str(_)) => return Err(DbError::WrongKind),
            None => return Ok(0),
        };
        if emptied {
            self.table.remove(key);
        }
        Ok(removed)
    }
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> DbResult<Vec<Data>> {
        match self.table.get(key) {
            Some(Record::List(list)) => Ok(match normalize_range(list.len(), start, stop) {
                Some((start, stop)) => list
                    .iter()
                    .skip(start)
                    .take(stop - start + 1)
                    .cloned()
                    .collect(),
                None => Vec::new(),
            }),
            Some(Record::Str(_)) => Err(DbError::WrongKind),
            None => Ok(Vec::new()),
        }
    }
    /// Retain only the inclusive `[start, stop]` range; the key is removed if
    /// nothing survives
    pub fn ltrim(&mut self, key: &[u8], start: i64, stop: i64) -> DbResult<()> {
        let emptied = match self.table.get_mut(key) {
            Some(Record::List(list)) => match normalize_range(list.len(), start, stop) {
                Some((start, stop)) => {
                    list.truncate(stop + 1);
                    list.drain(..start);
                    list.is_empty()
                }
                None => {
                    list.clear();
                    true
                }
            },
            Some(Record::Str(_)) => return Err(DbError::WrongKind),
            None => return Ok(()),
        };
        if emptied {
            self.table.remove(key);
        }
        Ok(())
    }
}

/// Resolve a possibly-negative index against a list of length `len`.
/// `None` means out of range
fn normalize_index(len: usize, index: i64) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { len + index } else { index };
    if index < 0 || index >= len {
        None
    } else {
        Some(index as usize)
    }
}

/// Resolve an inclusive, possibly-negative range, clamping both ends to the
/// list bounds. `None` means the range selects nothing
fn normalize_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len_i = len as i64;
    let mut start = if start < 0 { len_i + start } else { start };
    let mut stop = if stop < 0 { len_i + stop } else { stop };
    if start < 0 {
        start = 0;
    }
    if stop >= len_i {
        stop = len_i - 1;
    }
    if len == 0 || start >= len_i || start > stop {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

fn remove_occurrences(list: &mut VecDeque<Data>, count: i64, value: &[u8]) -> usize {
    let mut removed = 0usize;
    if count >= 0 {
        let limit = if count == 0 { usize::MAX } else { count as usize };
        list.retain(|item| {
            if removed < limit && item.as_ref() == value {
                removed += 1;
                false
            } else {
                true
            }
        });
    } else {
        let limit = count.unsigned_abs() as usize;
        let items: Vec<Data> = list.drain(..).collect();
        let mut keep = vec![true; items.len()];
        for idx in (0..items.len()).rev() {
            if removed < limit && items[idx].as_ref() == value {
                keep[idx] = false;
                removed += 1;
            }
        }
        *list = items
            .into_iter()
            .zip(keep)
            .filter_map(|(item, kept)| kept.then_some(item))
            .collect();
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(payload: &str) -> Data {
        Data::copy_from_slice(payload.as_bytes())
    }

    #[test]
    fn set_get_del_roundtrip() {
        let db = Database::new();
        let mut guard = db.lock();
        guard.set(data("hello"), data("world"));
        assert_eq!(guard.get(b"hello").unwrap(), data("world"));
        assert_eq!(guard.len(), 1);
        assert!(guard.del(b"hello"));
        assert_eq!(guard.get(b"hello").unwrap_err(), DbError::NotFound);
        assert!(!guard.del(b"hello"));
        assert_eq!(guard.len(), 0);
    }

    #[test]
    fn set_overwrites_any_kind() {
        let db = Database::new();
        let mut guard = db.lock();
        guard.lpush(b"k", &[data("a")]).unwrap();
        assert_eq!(guard.get(b"k").unwrap_err(), DbError::WrongKind);
        guard.set(data("k"), data("v"));
        assert_eq!(guard.get(b"k").unwrap(), data("v"));
    }

    #[test]
    fn set_nx_only_creates() {
        let db = Database::new();
        let mut guard = db.lock();
        assert!(guard.set_nx(data("k"), data("one")));
        assert!(!guard.set_nx(data("k"), data("two")));
        assert_eq!(guard.get(b"k").unwrap(), data("one"));
    }

    #[test]
    fn incr_by_creates_from_zero() {
        let db = Database::new();
        let mut guard = db.lock();
        assert_eq!(guard.incr_by(b"counter", 1).unwrap(), 1);
        assert_eq!(guard.incr_by(b"counter", 1).unwrap(), 2);
        assert_eq!(guard.incr_by(b"counter", -5).unwrap(), -3);
        assert_eq!(guard.get(b"counter").unwrap(), data("-3"));
    }

    #[test]
    fn incr_by_rejects_non_integers() {
        let db = Database::new();
        let mut guard = db.lock();
        guard.set(data("k"), data("not a number"));
        assert_eq!(guard.incr_by(b"k", 1).unwrap_err(), DbError::ValueNotInt);
        guard.lpush(b"l", &[data("x")]).unwrap();
        assert_eq!(guard.incr_by(b"l", 1).unwrap_err(), DbError::WrongKind);
        // overflow is rejected, not wrapped
        guard.set(data("max"), data(&i64::MAX.to_string()));
        assert_eq!(guard.incr_by(b"max", 1).unwrap_err(), DbError::ValueNotInt);
    }

    #[test]
    fn push_ordering() {
        let db = Database::new();
        let mut guard = db.lock();
        guard.lpush(b"l", &[data("c"), data("b"), data("a")]).unwrap();
        let range = guard.lrange(b"l", 0, -1).unwrap();
        assert_eq!(range, vec![data("a"), data("b"), data("c")]);
        guard.rpush(b"r", &[data("a"), data("b"), data("c")]).unwrap();
        let range = guard.lrange(b"r", 0, -1).unwrap();
        assert_eq!(range, vec![data("a"), data("b"), data("c")]);
    }

    #[test]
    fn pop_on_singleton_removes_the_key() {
        let db = Database::new();
        let mut guard = db.lock();
        guard.rpush(b"l", &[data("only")]).unwrap();
        assert_eq!(guard.lpop(b"l").unwrap(), data("only"));
        assert!(!guard.exists(b"l"));
        assert_eq!(guard.rpop(b"l").unwrap_err(), DbError::NotFound);
    }

    #[test]
    fn lindex_negative_wraps_from_tail() {
        let db = Database::new();
        let mut guard = db.lock();
        guard.rpush(b"l", &[data("a"), data("b"), data("c")]).unwrap();
        assert_eq!(guard.lindex(b"l", -1).unwrap(), Some(data("c")));
        assert_eq!(guard.lindex(b"l", -3).unwrap(), Some(data("a")));
        assert_eq!(guard.lindex(b"l", 2).unwrap(), Some(data("c")));
        assert_eq!(guard.lindex(b"l", 3).unwrap(), None);
        assert_eq!(guard.lindex(b"l", -4).unwrap(), None);
        assert_eq!(guard.lindex(b"missing", 0).unwrap(), None);
    }

    #[test]
    fn lset_bounds() {
        let db = Database::new();
        let mut guard = db.lock();
        guard.rpush(b"l", &[data("a"), data("b")]).unwrap();
        guard.lset(b"l", -1, data("z")).unwrap();
        assert_eq!(guard.lindex(b"l", 1).unwrap(), Some(data("z")));
        assert_eq!(
            guard.lset(b"l", 2, data("x")).unwrap_err(),
            DbError::IndexOutOfRange
        );
        assert_eq!(
            guard.lset(b"missing", 0, data("x")).unwrap_err(),
            DbError::NotFound
        );
    }

    #[test]
    fn lrem_directions() {
        let db = Database::new();
        let mut guard = db.lock();
        let items = ["a", "b", "a", "c", "a"].map(data);
        guard.rpush(b"l", &items).unwrap();
        // from the head, at most 2
        assert_eq!(guard.lrem(b"l", 2, b"a").unwrap(), 2);
        assert_eq!(
            guard.lrange(b"l", 0, -1).unwrap(),
            vec![data("b"), data("c"), data("a")]
        );
        // from the tail
        assert_eq!(guard.lrem(b"l", -1, b"a").unwrap(), 1);
        assert_eq!(guard.lrange(b"l", 0, -1).unwrap(), vec![data("b"), data("c")]);
        // all occurrences
        guard.rpush(b"l", &[data("b")]).unwrap();
        assert_eq!(guard.lrem(b"l", 0, b"b").unwrap(), 2);
        assert_eq!(guard.lrange(b"l", 0, -1).unwrap(), vec![data("c")]);
        assert_eq!(guard.lrem(b"missing", 0, b"x").unwrap(), 0);
    }

    #[test]
    fn lrem_emptying_removes_the_key() {
        let db = Database::new();
        let mut guard = db.lock();
        guard.rpush(b"l", &[data("x"), data("x")]).unwrap();
        assert_eq!(guard.lrem(b"l", 0, b"x").unwrap(), 2);
        assert!(!guard.exists(b"l"));
    }

    #[test]
    fn lrange_clamps() {
        let db = Database::new();
        let mut guard = db.lock();
        guard.rpush(b"l", &[data("a"), data("b"), data("c")]).unwrap();
        assert_eq!(guard.lrange(b"l", 0, 100).unwrap().len(), 3);
        assert_eq!(guard.lrange(b"l", -100, -1).unwrap().len(), 3);
        assert!(guard.lrange(b"l", 2, 1).unwrap().is_empty());
        assert!(guard.lrange(b"l", 3, 5).unwrap().is_empty());
        assert!(guard.lrange(b"missing", 0, -1).unwrap().is_empty());
    }

    #[test]
    fn ltrim_retains_inclusive_range() {
        let db = Database::new();
        let mut guard = db.lock();
        let items = ["a", "b", "c", "d"].map(data);
        guard.rpush(b"l", &items).unwrap();
        guard.ltrim(b"l", 1, -2).unwrap();
        assert_eq!(guard.lrange(b"l", 0, -1).unwrap(), vec![data("b"), data("c")]);
        // a trim that selects nothing deletes the key
        guard.ltrim(b"l", 5, 10).unwrap();
        assert!(!guard.exists(b"l"));
    }

    #[test]
    fn rename_moves_the_record() {
        let db = Database::new();
        let mut guard = db.lock();
        guard.set(data("old"), data("v"));
        guard.rename(b"old", data("new")).unwrap();
        assert!(!guard.exists(b"old"));
        assert_eq!(guard.get(b"new").unwrap(), data("v"));
        assert_eq!(
            guard.rename(b"missing", data("x")).unwrap_err(),
            DbError::NotFound
        );
    }

    #[test]
    fn random_key_on_empty_is_none() {
        let db = Database::new();
        let mut guard = db.lock();
        assert_eq!(guard.random_key(), None);
        guard.set(data("only"), data("v"));
        assert_eq!(guard.random_key(), Some(data("only")));
    }
}
