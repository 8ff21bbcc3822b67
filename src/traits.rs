//! # Cache Trait
//!
//! [`Cache`] is the capability set every simulated eviction policy provides.
//! The simulator only ever sees `Box<dyn Cache>`, so adding a policy means
//! implementing this trait and registering it in the
//! [builder](crate::builder).
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────┐
//!   │                           Cache                               │
//!   │                                                               │
//!   │  required                        provided (via CacheCore)     │
//!   │  ─────────                       ────────────────────────     │
//!   │  core / core_mut                 get      (get_base)          │
//!   │  check(req, promote)             name, capacity               │
//!   │  insert(req)                     occupied_size, n_obj         │
//!   │  to_evict(req)                   per_obj_overhead             │
//!   │  evict(req)                      admit, can_insert, contains  │
//!   │  remove(obj_id)                  resident_ids                 │
//!   │  with_capacity(capacity)                                      │
//!   │  check_invariants()                                           │
//!   └───────────────────────────────────────────────────────────────┘
//!            ▲          ▲          ▲          ▲         ▲       ▲
//!           LRU        MRU       FIFO      Random     SLRU     ARC
//! ```
//!
//! ## Operation Contracts
//!
//! | Method       | Mutates | Contract                                          |
//! |--------------|---------|---------------------------------------------------|
//! | `check`      | promote | Hit/Miss/Expired; promote may reorder and resize  |
//! | `get`        | yes     | check, admit on miss, evict to fit                |
//! | `insert`     | yes     | admit a non-resident object, no eviction          |
//! | `to_evict`   | memo    | next victim; agrees with the following `evict`    |
//! | `evict`      | yes     | remove the victim; empty cache is an error        |
//! | `remove`     | yes     | remove by id; `None` if not resident              |
//!
//! Composite policies (SLRU) hold their objects in sub-caches and override
//! the provided accounting methods.
//!
//! ## Thread Safety
//!
//! Caches are `Send` but not shared: each simulation worker owns the caches
//! it runs.
use std::fmt;

use crate::base::{CacheCore, CheckResult, get_base};
use crate::error::{CacheError, ConfigError, InvariantError};
use crate::object::CacheObject;
use crate::request::{ObjId, Request};

pub trait Cache: Send + fmt::Debug {
    fn core(&self) -> &CacheCore;

    fn core_mut(&mut self) -> &mut CacheCore;

    /// Looks `req` up. With `promote` set a hit updates the eviction order
    /// and an expired object is removed.
    fn check(&mut self, req: &Request, promote: bool) -> Result<CheckResult, CacheError>;

    /// Serves one request: hit, or miss followed by admission and eviction.
    fn get(&mut self, req: &Request) -> Result<CheckResult, CacheError> {
        get_base(self, req)
    }

    /// Admits `req` without evicting. The caller guarantees room and that
    /// the object is not resident.
    fn insert(&mut self, req: &Request) -> Result<CacheObject, CacheError>;

    /// The object the next `evict(req)` would remove, if any.
    fn to_evict(&mut self, req: &Request) -> Option<CacheObject>;

    /// Removes and returns the next victim.
    fn evict(&mut self, req: &Request) -> Result<CacheObject, CacheError>;

    /// Removes `obj_id` if resident.
    fn remove(&mut self, obj_id: ObjId) -> Result<Option<CacheObject>, CacheError>;

    /// A fresh, empty cache with the same policy and parameters but a
    /// different capacity.
    fn with_capacity(&self, capacity: u64) -> Result<Box<dyn Cache>, ConfigError>;

    /// Walks every internal structure and checks accounting and ordering.
    fn check_invariants(&self) -> Result<(), InvariantError>;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn capacity(&self) -> u64 {
        self.core().capacity()
    }

    fn occupied_size(&self) -> u64 {
        self.core().occupied_size()
    }

    fn n_obj(&self) -> u64 {
        self.core().n_obj()
    }

    fn per_obj_overhead(&self) -> u64 {
        self.core().per_obj_overhead()
    }

    /// Consults the admission filter on a miss.
    fn admit(&mut self, req: &Request) -> bool {
        self.core_mut().admit(req)
    }

    fn can_insert(&self, req: &Request) -> bool {
        self.core().can_insert(req)
    }

    fn contains(&self, obj_id: ObjId) -> bool {
        self.core().store().contains(obj_id)
    }

    /// Resident ids in unspecified order.
    fn resident_ids(&self) -> Vec<ObjId> {
        self.core()
            .store()
            .iter()
            .map(|(_, obj)| obj.obj_id)
            .collect()
    }
}
