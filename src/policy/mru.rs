//! # Most Recently Used (MRU)
//!
//! Same recency queue as LRU, but the victim is the head: the object touched
//! most recently leaves first. Useful as a baseline for cyclic scans larger
//! than the cache, where LRU misses on every request.
//!
//! ```text
//!   head ──► [C] ◄──► [B] ◄──► [A] ◄── tail
//!            MRU ▲
//!                └── victim
//! ```
//!
//! | Operation  | Effect                                      |
//! |------------|---------------------------------------------|
//! | hit        | move to head                                |
//! | insert     | push at head                                |
//! | evict      | unlink head                                 |
use crate::base::{CacheCore, CheckResult, Lookup};
use crate::builder::CommonCacheParams;
use crate::ds::slot_arena::SlotId;
use crate::error::{CacheError, ConfigError, InvariantError};
use crate::object::CacheObject;
use crate::request::{ObjId, Request};
use crate::store::ObjectQueue;
use crate::traits::Cache;

#[derive(Debug)]
pub struct MruCache {
    core: CacheCore,
    queue: ObjectQueue,
}

impl MruCache {
    pub const METADATA_SIZE: u64 = 16;

    pub fn new(params: &CommonCacheParams) -> Result<Self, ConfigError> {
        Ok(Self {
            core: CacheCore::new("MRU", params, Self::METADATA_SIZE)?,
            queue: ObjectQueue::new(),
        })
    }

    /// Resident ids from most to least recently used.
    pub fn recency_order(&self) -> Vec<ObjId> {
        self.queue.ids(self.core.store())
    }

    fn unlink_and_remove(&mut self, slot: SlotId) -> Result<CacheObject, CacheError> {
        if !self.queue.unlink(self.core.store_mut(), slot) {
            return Err(CacheError::invariant(format!(
                "MRU: resident slot {slot:?} not in the recency queue"
            )));
        }
        self.core.remove_base(slot)
    }
}

impl Cache for MruCache {
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
            .head()
            .and_then(|slot| self.core.store().get(slot))
            .map(CacheObject::detached)
    }

    fn evict(&mut self, _req: &Request) -> Result<CacheObject, CacheError> {
        let slot = self
            .queue
            .head()
            .ok_or_else(|| CacheError::invariant("MRU: evict from an empty cache"))?;
        self.unlink_and_remove(slot)
    }

    fn remove(&mut self, obj_id: ObjId) -> Result<Option<CacheObject>, CacheError> {
        match self.core.store().find(obj_id) {
            Some(slot) => self.unlink_and_remove(slot).map(Some),
            None => Ok(None),
        }
    }

    fn with_capacity(&self, capacity: u64) -> Result<Box<dyn Cache>, ConfigError> {
        Ok(Box::new(Self::new(&self.core.params().with_capacity(capacity))?))
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        self.core.verify_occupancy()?;
        self.queue.validate(self.core.store())?;
        if self.queue.len() != self.core.store().len() {
            return Err(InvariantError::new(format!(
                "MRU: queue holds {} objects, store holds {}",
                self.queue.len(),
                self.core.store().len()
            )));
        }
        Ok(())
    }
}
