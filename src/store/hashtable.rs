//! Chained object hashtable.
//!
//! ## Architecture
//! - A fixed array of `2^hash_power` bucket heads; each bucket is a singly
//!   linked chain threaded through `CacheObject::hash_next`.
//! - Objects live in a store-owned [`SlotArena`]; chains and policy queues
//!   link by `SlotId`, never by address.
//! - Bucket index = the top `hash_power` bits of the Fx hash of the id.
//!
//! ```text
//!   buckets                       arena (SlotArena<CacheObject>)
//!   ┌────┐
//!   │ 0  │──► id_4 ──► id_1 ──► ∅    id_1 { obj 17, hash_next: None }
//!   │ 1  │──► ∅                      id_4 { obj 93, hash_next: Some(id_1) }
//!   │ 2  │──► id_2 ──► ∅             id_2 { obj 5,  hash_next: None }
//!   └────┘
//! ```
//!
//! ## Core Operations
//! - `find`: walk one chain.
//! - `insert`: push at the chain head; a duplicate id is an invariant error.
//! - `delete`: unlink from the chain and free the slot.
//! - `sample_random`: uniform pick among resident objects.
//!
//! ## Performance Trade-offs
//! - The table never resizes. An undersized `hash_power` degrades lookups to
//!   chain length but never fails.
//! - `hash_power` is capped at [`MAX_HASH_POWER`]; the bucket array is
//!   allocated fallibly so an allocation failure surfaces as a `ConfigError`.
//!
//! ## Example Usage
//! ```rust
//! use cachesim::object::CacheObject;
//! use cachesim::request::Request;
//! use cachesim::store::ObjectStore;
//!
//! let mut store = ObjectStore::new(4).unwrap();
//! let slot = store.insert(CacheObject::from_request(&Request::new(7, 100))).unwrap();
//! assert_eq!(store.find(7), Some(slot));
//! assert_eq!(store.delete(7).map(|o| o.obj_size), Some(100));
//! assert!(store.is_empty());
//! ```
//!
//! ## Thread Safety
//! - Single-threaded; every store is owned by exactly one cache.
use std::hash::Hasher;

use rand::Rng;
use rustc_hash::FxHasher;

use crate::ds::slot_arena::{SlotArena, SlotId};
use crate::error::{ConfigError, InvariantError};
use crate::object::CacheObject;
use crate::request::ObjId;

pub const MIN_HASH_POWER: u8 = 1;
pub const MAX_HASH_POWER: u8 = 28;
pub const DEFAULT_HASH_POWER: u8 = 16;

pub struct ObjectStore {
    arena: SlotArena<CacheObject>,
    buckets: Vec<Option<SlotId>>,
    hash_power: u8,
}

impl ObjectStore {
    /// Creates a store with `2^hash_power` buckets.
    pub fn new(hash_power: u8) -> Result<Self, ConfigError> {
        if !(MIN_HASH_POWER..=MAX_HASH_POWER).contains(&hash_power) {
            return Err(ConfigError::new(format!(
                "hash_power must be in {MIN_HASH_POWER}..={MAX_HASH_POWER}, got {hash_power}"
            )));
        }
        let n_buckets = 1usize << hash_power;
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(n_buckets).map_err(|err| {
            ConfigError::new(format!(
                "cannot allocate {n_buckets} buckets for hash_power {hash_power}: {err}"
            ))
        })?;
        buckets.resize(n_buckets, None);
        Ok(Self {
            arena: SlotArena::new(),
            buckets,
            hash_power,
        })
    }

    #[inline]
    fn bucket_of(&self, obj_id: ObjId) -> usize {
        let mut hasher = FxHasher::default();
        hasher.write_u64(obj_id);
        (hasher.finish() >> (64 - u32::from(self.hash_power))) as usize
    }

    pub fn find(&self, obj_id: ObjId) -> Option<SlotId> {
        let mut current = self.buckets[self.bucket_of(obj_id)];
        while let Some(id) = current {
            let obj = self.arena.get(id)?;
            if obj.obj_id == obj_id {
                return Some(id);
            }
            current = obj.hash_next;
        }
        None
    }

    #[inline]
    pub fn contains(&self, obj_id: ObjId) -> bool {
        self.find(obj_id).is_some()
    }

    /// Registers `obj`. Inserting an id that is already present is a caller
    /// bug and leaves the store unchanged.
    pub fn insert(&mut self, mut obj: CacheObject) -> Result<SlotId, InvariantError> {
        if self.contains(obj.obj_id) {
            return Err(InvariantError::new(format!(
                "object {} is already in the store",
                obj.obj_id
            )));
        }
        let bucket = self.bucket_of(obj.obj_id);
        obj.hash_next = self.buckets[bucket];
        let id = self.arena.insert(obj);
        self.buckets[bucket] = Some(id);
        Ok(id)
    }

    /// Removes `obj_id` and returns the owned object with its chain link
    /// cleared. Queue links are left as they were; callers unlink from their
    /// policy queues first.
    pub fn delete(&mut self, obj_id: ObjId) -> Option<CacheObject> {
        let bucket = self.bucket_of(obj_id);
        let mut prev: Option<SlotId> = None;
        let mut current = self.buckets[bucket];
        while let Some(id) = current {
            let obj = self.arena.get(id)?;
            if obj.obj_id == obj_id {
                break;
            }
            prev = Some(id);
            current = obj.hash_next;
        }

        let id = current?;
        let next = self.arena.get(id)?.hash_next;
        match prev.and_then(|p| self.arena.get_mut(p)) {
            Some(prev_obj) => prev_obj.hash_next = next,
            None => self.buckets[bucket] = next,
        }
        let mut obj = self.arena.remove(id)?;
        obj.hash_next = None;
        Some(obj)
    }

    /// Picks a resident object uniformly at random.
    #[inline]
    pub fn sample_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<SlotId> {
        self.arena.sample(rng)
    }

    #[inline]
    pub fn get(&self, id: SlotId) -> Option<&CacheObject> {
        self.arena.get(id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut CacheObject> {
        self.arena.get_mut(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &CacheObject)> {
        self.arena.iter()
    }

    #[inline]
    pub fn hash_power(&self) -> u8 {
        self.hash_power
    }

    #[inline]
    pub fn n_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Length of the longest bucket chain.
    pub fn longest_chain(&self) -> usize {
        self.buckets
            .iter()
            .map(|head| {
                let mut len = 0;
                let mut current = *head;
                while let Some(obj) = current.and_then(|id| self.arena.get(id)) {
                    len += 1;
                    current = obj.hash_next;
                }
                len
            })
            .max()
            .unwrap_or(0)
    }

    #[inline]
    pub(crate) fn arena(&self) -> &SlotArena<CacheObject> {
        &self.arena
    }

    #[inline]
    pub(crate) fn arena_mut(&mut self) -> &mut SlotArena<CacheObject> {
        &mut self.arena
    }

    /// Checks that every chain entry hashes to its bucket and that the chains
    /// cover the whole arena.
    pub fn validate(&self) -> Result<(), InvariantError> {
        let mut chained = 0usize;
        for (bucket, head) in self.buckets.iter().enumerate() {
            let mut current = *head;
            while let Some(id) = current {
                let obj = self.arena.get(id).ok_or_else(|| {
                    InvariantError::new(format!("bucket {bucket} chains a freed slot {id:?}"))
                })?;
                if self.bucket_of(obj.obj_id) != bucket {
                    return Err(InvariantError::new(format!(
                        "object {} chained in bucket {bucket}",
                        obj.obj_id
                    )));
                }
                chained += 1;
                if chained > self.arena.len() {
                    return Err(InvariantError::new("hash chains contain a cycle"));
                }
                current = obj.hash_next;
            }
        }
        if chained != self.arena.len() {
            return Err(InvariantError::new(format!(
                "{chained} chained objects but {} in the arena",
                self.arena.len()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("len", &self.len())
            .field("hash_power", &self.hash_power)
            .finish_non_exhaustive()
    }
}
