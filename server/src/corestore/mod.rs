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

//! # The core in-memory engine
//!
//! A [`Corestore`] is an atomically shared handle to the fixed sequence of
//! [`Database`]s, the cross-database expiry index, the coordinator mutex used
//! by multi-database operations and the (optional) append only file. Cloning
//! a `Corestore` is cheap: every connection task owns one.

use crate::diskstore::AppendOnlyFile;
use crate::expiry::ExpireIndex;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::borrow::Borrow;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

mod table;

pub use table::{Database, DbError, DbGuard, DbResult, Record};

/// A binary-safe blob: the key and value type of the engine
///
/// `Data` is a thin wrapper over [`Bytes`], so cloning one is a reference
/// count bump and not a copy of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    blob: Bytes,
}

impl Data {
    pub fn copy_from_slice(slice: &[u8]) -> Self {
        Data {
            blob: Bytes::copy_from_slice(slice),
        }
    }
    pub fn from_static(blob: &'static [u8]) -> Self {
        Data {
            blob: Bytes::from_static(blob),
        }
    }
    pub fn from_string(string: String) -> Self {
        Data {
            blob: Bytes::from(string.into_bytes()),
        }
    }
    pub fn from_vec(blob: Vec<u8>) -> Self {
        Data { blob: Bytes::from(blob) }
    }
    pub fn len(&self) -> usize {
        self.blob.len()
    }
}

impl Deref for Data {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.blob
    }
}

impl AsRef<[u8]> for Data {
    fn as_ref(&self) -> &[u8] {
        &self.blob
    }
}

impl Borrow<[u8]> for Data {
    fn borrow(&self) -> &[u8] {
        &self.blob
    }
}

// Hash as the raw slice so that lookups keyed by `&[u8]` stay consistent
// with the `Borrow` impl above
impl Hash for Data {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.blob.as_ref().hash(state)
    }
}

/// An atomic reference to the shared in-memory engine
pub struct Corestore {
    shared: Arc<Shared>,
}

impl Clone for Corestore {
    fn clone(&self) -> Self {
        Corestore {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared {
    /// the fixed sequence of databases; the length never changes after boot
    dbs: Vec<Database>,
    /// the cross-database expiry index
    expiry: ExpireIndex,
    /// the coordinator mutex: taken before locking two databases at once
    movelock: Mutex<()>,
    /// the append only file, installed after a successful replay
    aof: RwLock<Option<Arc<AppendOnlyFile>>>,
    /// the raw configuration directives, retained for `CONFIG GET`
    cfg_snapshot: Vec<(String, String)>,
}

impl Corestore {
    pub fn new(databases: usize, cfg_snapshot: Vec<(String, String)>) -> Self {
        let dbs = (0..databases).map(|_| Database::new()).collect();
        Corestore {
            shared: Arc::new(Shared {
                dbs,
                expiry: ExpireIndex::new(),
                movelock: Mutex::new(()),
                aof: RwLock::new(None),
                cfg_snapshot,
            }),
        }
    }
    /// Returns the database at `index`. The caller is responsible for having
    /// validated the index against [`Self::db_count`]
    pub fn db(&self, index: usize) -> &Database {
        &self.shared.dbs[index]
    }
    pub fn db_count(&self) -> usize {
        self.shared.dbs.len()
    }
    pub fn expiry(&self) -> &ExpireIndex {
        &self.shared.expiry
    }
    pub fn movelock(&self) -> &Mutex<()> {
        &self.shared.movelock
    }
    pub fn install_aof(&self, aof: Arc<AppendOnlyFile>) {
        *self.shared.aof.write() = Some(aof);
    }
    pub fn aof(&self) -> Option<Arc<AppendOnlyFile>> {
        self.shared.aof.read().clone()
    }
    /// The first configured value for the given directive, if any
    pub fn cfg_value(&self, name: &str) -> Option<&str> {
        self.shared
            .cfg_snapshot
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}
