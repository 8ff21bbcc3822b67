//! Policy-independent cache state and the shared request algorithm.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────── Cache (policy) ───────────────────────────┐
//!   │                                                                       │
//!   │   eviction order (queues, segments, ghosts)                           │
//!   │                                                                       │
//!   │   ┌──────────────────────── CacheCore ──────────────────────────┐     │
//!   │   │ name, capacity, occupied_size, per_obj_overhead, n_req       │     │
//!   │   │ ObjectStore { obj_id -> CacheObject }                        │     │
//!   │   └──────────────────────────────────────────────────────────────┘     │
//!   └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Policies own a [`CacheCore`] and build their `check`/`insert`/`evict` on
//! its primitives. [`get_base`] is the request algorithm every policy shares:
//!
//! ```text
//!   get(req)
//!     ├─ check(req, promote) ── hit ──► evict while over capacity, return Hit
//!     ├─ !admit(req) ────────────────► return Miss (rejected by admission)
//!     ├─ !can_insert(req) ───────────► return Miss (oversized, not admitted)
//!     ├─ while occupied + size + overhead > capacity: evict
//!     └─ insert(req), return Miss
//! ```
//!
//! ## Accounting
//!
//! Every resident object is charged `obj_size + per_obj_overhead` bytes.
//! `occupied_size` equals the sum of charges after every operation; the
//! [`CacheCore::verify_occupancy`] walk recomputes it. A request whose charge
//! does not fit in a `u64` can never be admitted.
use log::{debug, trace};

use crate::admission::Admission;
use crate::builder::CommonCacheParams;
use crate::ds::slot_arena::SlotId;
use crate::error::{CacheError, ConfigError, InvariantError};
use crate::object::CacheObject;
use crate::request::{ObjId, Request};
use crate::store::ObjectStore;
use crate::traits::Cache;

/// Outcome of a store lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Hit(SlotId),
    Miss,
    /// Resident but past its expiry time. Still in the store.
    Expired(SlotId),
}

/// Outcome of a cache access as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckResult {
    Hit,
    Miss,
    /// The object was resident but expired; counts as a miss.
    Expired,
}

impl CheckResult {
    #[inline]
    pub fn is_hit(self) -> bool {
        matches!(self, Self::Hit)
    }

    #[inline]
    pub fn is_miss(self) -> bool {
        !self.is_hit()
    }
}

pub struct CacheCore {
    name: String,
    params: CommonCacheParams,
    per_obj_overhead: u64,
    occupied_size: u64,
    n_req: u64,
    store: ObjectStore,
    admission: Option<Box<dyn Admission>>,
}

impl CacheCore {
    /// Builds the core for a policy whose per-object metadata is
    /// `metadata_size` bytes. The metadata is charged only when
    /// `params.consider_obj_metadata` is set.
    pub fn new(
        name: impl Into<String>,
        params: &CommonCacheParams,
        metadata_size: u64,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        let per_obj_overhead = params.per_obj_overhead
            + if params.consider_obj_metadata {
                metadata_size
            } else {
                0
            };
        Ok(Self {
            name: name.into(),
            params: *params,
            per_obj_overhead,
            occupied_size: 0,
            n_req: 0,
            store: ObjectStore::new(params.hash_power)?,
            admission: params.admission.map(|a| a.build()).transpose()?,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn params(&self) -> &CommonCacheParams {
        &self.params
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.params.capacity
    }

    #[inline]
    pub fn occupied_size(&self) -> u64 {
        self.occupied_size
    }

    #[inline]
    pub fn per_obj_overhead(&self) -> u64 {
        self.per_obj_overhead
    }

    #[inline]
    pub fn n_obj(&self) -> u64 {
        self.store.len() as u64
    }

    /// Requests seen through [`get_base`].
    #[inline]
    pub fn n_req(&self) -> u64 {
        self.n_req
    }

    #[inline]
    pub(crate) fn record_request(&mut self) {
        self.n_req += 1;
    }

    #[inline]
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    #[inline]
    pub fn store_mut(&mut self) -> &mut ObjectStore {
        &mut self.store
    }

    /// Bytes an object of `obj_size` occupies once resident. Saturates; only
    /// sizes that passed [`can_insert`](Self::can_insert) are exact.
    #[inline]
    pub fn charge(&self, obj_size: u64) -> u64 {
        obj_size.saturating_add(self.per_obj_overhead)
    }

    #[inline]
    pub fn checked_charge(&self, obj_size: u64) -> Option<u64> {
        obj_size.checked_add(self.per_obj_overhead)
    }

    /// Current charge of a resident object.
    pub fn resident_charge(&self, obj_id: ObjId) -> Option<u64> {
        let slot = self.store.find(obj_id)?;
        self.store.get(slot).map(|obj| self.charge(obj.obj_size))
    }

    /// Whether `req` could ever be admitted into an empty cache.
    #[inline]
    pub fn can_insert(&self, req: &Request) -> bool {
        self.checked_charge(req.obj_size)
            .is_some_and(|charge| charge <= self.capacity())
    }

    /// Asks the admission filter about a missed request; always `true`
    /// without one.
    pub fn admit(&mut self, req: &Request) -> bool {
        self.admission.as_mut().is_none_or(|admission| admission.admit(req))
    }

    pub fn admission(&self) -> Option<&dyn Admission> {
        self.admission.as_deref()
    }

    /// Looks `req` up in the store.
    ///
    /// With `promote` set a hit refreshes `last_access_time` and, when the
    /// request carries a different size, resizes the object and the
    /// occupancy. A resize whose occupancy would overflow `u64` is ignored.
    /// Expiry is only reported when TTL support is on.
    pub fn check_base(&mut self, req: &Request, promote: bool) -> Lookup {
        let Some(slot) = self.store.find(req.obj_id) else {
            return Lookup::Miss;
        };
        let Some(obj) = self.store.get_mut(slot) else {
            return Lookup::Miss;
        };
        if self.params.support_ttl && obj.is_expired(req.clock_time) {
            return Lookup::Expired(slot);
        }
        if promote {
            obj.last_access_time = req.clock_time;
            if obj.obj_size != req.obj_size {
                match self.occupied_size.saturating_sub(obj.obj_size).checked_add(req.obj_size) {
                    Some(occupied) => {
                        trace!(
                            "{}: object {} resized {} -> {}",
                            self.name, req.obj_id, obj.obj_size, req.obj_size
                        );
                        self.occupied_size = occupied;
                        obj.obj_size = req.obj_size;
                    },
                    None => debug!(
                        "{}: object {} resize to {} bytes overflows occupancy, ignored",
                        self.name, req.obj_id, req.obj_size
                    ),
                }
            }
        }
        Lookup::Hit(slot)
    }

    /// Registers a new resident object for `req`.
    pub fn insert_base(&mut self, req: &Request) -> Result<SlotId, CacheError> {
        let occupied = self
            .checked_charge(req.obj_size)
            .and_then(|charge| self.occupied_size.checked_add(charge))
            .ok_or_else(|| {
                CacheError::invariant(format!(
                    "{}: admitting object {} ({} bytes) overflows occupancy {}",
                    self.name, req.obj_id, req.obj_size, self.occupied_size
                ))
            })?;
        let mut obj = CacheObject::from_request(req);
        if self.params.support_ttl {
            let ttl = req.ttl.or(self.params.fallback_ttl());
            obj.exp_time = ttl.map(|ttl| req.clock_time.saturating_add(ttl));
        }
        let slot = self.store.insert(obj)?;
        self.occupied_size = occupied;
        Ok(slot)
    }

    /// Removes a resident object from the store and the occupancy. The
    /// caller must already have unlinked it from its eviction order.
    pub fn remove_base(&mut self, slot: SlotId) -> Result<CacheObject, CacheError> {
        let obj_id = self
            .store
            .get(slot)
            .map(|obj| obj.obj_id)
            .ok_or_else(|| CacheError::invariant(format!("{}: stale slot {slot:?}", self.name)))?;
        let obj = self.store.delete(obj_id).ok_or_else(|| {
            CacheError::invariant(format!("{}: object {obj_id} missing from store", self.name))
        })?;
        let charge = self.charge(obj.obj_size);
        self.occupied_size = self.occupied_size.checked_sub(charge).ok_or_else(|| {
            CacheError::invariant(format!(
                "{}: occupancy {} underflows removing {charge} bytes",
                self.name, self.occupied_size
            ))
        })?;
        Ok(obj)
    }

    /// Owned, link-free copy of a resident object.
    pub fn snapshot(&self, slot: SlotId) -> Result<CacheObject, CacheError> {
        self.store
            .get(slot)
            .map(CacheObject::detached)
            .ok_or_else(|| CacheError::invariant(format!("{}: stale slot {slot:?}", self.name)))
    }

    /// Recomputes the occupancy from the store and compares.
    pub fn verify_occupancy(&self) -> Result<(), InvariantError> {
        let actual = self
            .store
            .iter()
            .try_fold(0u64, |sum, (_, obj)| {
                self.checked_charge(obj.obj_size)
                    .and_then(|charge| sum.checked_add(charge))
            })
            .ok_or_else(|| {
                InvariantError::new(format!("{}: resident charges overflow u64", self.name))
            })?;
        if actual != self.occupied_size {
            return Err(InvariantError::new(format!(
                "{}: occupied_size {} but resident charges sum to {actual}",
                self.name, self.occupied_size
            )));
        }
        self.store.validate()
    }
}

impl std::fmt::Debug for CacheCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCore")
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .field("occupied_size", &self.occupied_size)
            .field("n_obj", &self.n_obj())
            .field("admission", &self.admission)
            .finish_non_exhaustive()
    }
}

/// The request algorithm shared by every policy; the default
/// [`Cache::get`].
pub fn get_base<C: Cache + ?Sized>(cache: &mut C, req: &Request) -> Result<CheckResult, CacheError> {
    cache.core_mut().record_request();

    let result = cache.check(req, true)?;
    if result.is_hit() {
        // a hit may have grown the object
        while cache.occupied_size() > cache.capacity() {
            cache.evict(req)?;
        }
        return Ok(result);
    }

    if !cache.admit(req) {
        trace!("{}: object {} rejected by admission", cache.name(), req.obj_id);
        return Ok(result);
    }

    if !cache.can_insert(req) {
        trace!(
            "{}: object {} ({} bytes) cannot fit, not admitted",
            cache.name(),
            req.obj_id,
            req.obj_size
        );
        return Ok(result);
    }

    let needed = req.obj_size.saturating_add(cache.per_obj_overhead());
    while cache.occupied_size().saturating_add(needed) > cache.capacity() {
        cache.evict(req)?;
    }
    cache.insert(req)?;
    Ok(result)
}
