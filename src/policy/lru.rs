//! # Least Recently Used (LRU)
//!
//! One recency queue threaded through the object store. Hits move the object
//! to the head; the victim is the tail.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                           LruCache                               │
//!   │                                                                  │
//!   │   CacheCore ── ObjectStore (obj_id -> CacheObject, chained)      │
//!   │                     │                                            │
//!   │                     │ links live in each CacheObject             │
//!   │                     ▼                                            │
//!   │   ObjectQueue                                                    │
//!   │     head ──► [A] ◄──► [B] ◄──► [C] ◄── tail                      │
//!   │              MRU                LRU                              │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## LRU Operations Flow
//!
//! ```text
//!   MISS (cache full), request D
//!     head ──► [A] ◄──► [B] ◄──► [C] ◄── tail
//!     1. evict tail C
//!     2. insert D at head
//!     head ──► [D] ◄──► [A] ◄──► [B] ◄── tail
//!
//!   HIT on B
//!     head ──► [B] ◄──► [D] ◄──► [A] ◄── tail
//!
//!   CHECK without promote leaves the order unchanged.
//! ```
//!
//! ## Operations
//!
//! | Operation  | Time  | Notes                                 |
//! |------------|-------|---------------------------------------|
//! | `check`    | O(1)* | *chain walk in the store              |
//! | `insert`   | O(1)* | push at head                          |
//! | `evict`    | O(1)  | unlink tail                           |
//! | `remove`   | O(1)* | unlink anywhere                       |
//!
//! ## Example Usage
//!
//! ```rust
//! use cachesim::builder::CommonCacheParams;
//! use cachesim::policy::lru::LruCache;
//! use cachesim::request::Request;
//! use cachesim::traits::Cache;
//!
//! let mut cache = LruCache::new(&CommonCacheParams::new(2)).unwrap();
//! for id in [1, 2, 1, 3] {
//!     cache.get(&Request::new(id, 1)).unwrap();
//! }
//! assert_eq!(cache.recency_order(), vec![3, 1]);
//! ```
use crate::base::{CacheCore, CheckResult, Lookup};
use crate::builder::CommonCacheParams;
use crate::ds::slot_arena::SlotId;
use crate::error::{CacheError, ConfigError, InvariantError};
use crate::object::{CacheObject, PolicyExt};
use crate::request::{ObjId, Request};
use crate::store::ObjectQueue;
use crate::traits::Cache;

#[derive(Debug)]
pub struct LruCache {
    core: CacheCore,
    queue: ObjectQueue,
}

impl LruCache {
    /// Per-object metadata: two queue links.
    pub const METADATA_SIZE: u64 = 16;

    pub fn new(params: &CommonCacheParams) -> Result<Self, ConfigError> {
        Self::named("LRU", params)
    }

    pub(crate) fn named(
        name: impl Into<String>,
        params: &CommonCacheParams,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            core: CacheCore::new(name, params, Self::METADATA_SIZE)?,
            queue: ObjectQueue::new(),
        })
    }

    /// Resident ids from most to least recently used.
    pub fn recency_order(&self) -> Vec<ObjId> {
        self.queue.ids(self.core.store())
    }

    /// Tags a resident object with policy state owned by a composite policy.
    pub(crate) fn set_ext(&mut self, obj_id: ObjId, ext: PolicyExt) -> bool {
        let store = self.core.store_mut();
        match store.find(obj_id).and_then(|slot| store.get_mut(slot)) {
            Some(obj) => {
                obj.ext = ext;
                true
            },
            None => false,
        }
    }

    fn unlink_and_remove(&mut self, slot: SlotId) -> Result<CacheObject, CacheError> {
        if !self.queue.unlink(self.core.store_mut(), slot) {
            return Err(CacheError::invariant(format!(
                "{}: resident slot {slot:?} not in the recency queue",
                self.core.name()
            )));
        }
        self.core.remove_base(slot)
    }
}

impl Cache for LruCache {
    fn core(&self) -> &CacheCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CacheCore {
        &mut self.core
    }

    fn check(&mut self, req: &Request, promote: bool) -> Result<CheckResult, CacheError> {
        match self.core.check_base(req, promote) {
            Lookup::Hit(slot) => {
                if promote {
                    self.queue.move_to_head(self.core.store_mut(), slot);
                }
                Ok(CheckResult::Hit)
            },
            Lookup::Expired(slot) => {
                if promote {
                    self.unlink_and_remove(slot)?;
                }
                Ok(CheckResult::Expired)
            },
            Lookup::Miss => Ok(CheckResult::Miss),
        }
    }

    fn insert(&mut self, req: &Request) -> Result<CacheObject, CacheError> {
        let slot = self.core.insert_base(req)?;
        self.queue.push_head(self.core.store_mut(), slot);
        self.core.snapshot(slot)
    }

    fn to_evict(&mut self, _req: &Request) -> Option<CacheObject> {
        self.queue
            .tail()
            .and_then(|slot| self.core.store().get(slot))
            .map(CacheObject::detached)
    }

    fn evict(&mut self, _req: &Request) -> Result<CacheObject, CacheError> {
        let slot = self.queue.tail().ok_or_else(|| {
            CacheError::invariant(format!("{}: evict from an empty cache", self.core.name()))
        })?;
        self.unlink_and_remove(slot)
    }

    fn remove(&mut self, obj_id: ObjId) -> Result<Option<CacheObject>, CacheError> {
        match self.core.store().find(obj_id) {
            Some(slot) => self.unlink_and_remove(slot).map(Some),
            None => Ok(None),
        }
    }

    fn with_capacity(&self, capacity: u64) -> Result<Box<dyn Cache>, ConfigError> {
        let params = self.core.params().with_capacity(capacity);
        Ok(Box::new(Self::named(self.core.name(), &params)?))
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        self.core.verify_occupancy()?;
        self.queue.validate(self.core.store())?;
        if self.queue.len() != self.core.store().len() {
            return Err(InvariantError::new(format!(
                "{}: queue holds {} objects, store holds {}",
                self.core.name(),
                self.queue.len(),
                self.core.store().len()
            )));
        }
        Ok(())
    }
}
