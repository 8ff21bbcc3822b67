//! Random cache replacement policy.
//!
//! Victims are drawn uniformly at random from the resident objects. No access
//! order is tracked, so hits cost nothing beyond the lookup. This is the
//! baseline every ordered policy should beat.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           RandomCache                               │
//! │                                                                     │
//! │   CacheCore ── ObjectStore ── SlotArena<CacheObject>                │
//! │                                   │                                 │
//! │                                   ▼ rejection sampling              │
//! │                 ┌─────┬─────┬─────┬─────┬─────┐                     │
//! │                 │  A  │  -  │  C  │  D  │  -  │   slots             │
//! │                 └─────┴─────┴─────┴─────┴─────┘                     │
//! │                                                                     │
//! │   rng: SmallRng (seeded)        candidate: Option<SlotId> (memo)    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Victim Selection
//!
//! `to_evict` draws a candidate and remembers it; the next `evict` removes
//! exactly that object. Because slot ids carry a generation, a remembered
//! candidate that has since been removed is detected and redrawn.
//!
//! ## Determinism
//!
//! The generator is seeded from the `seed` policy parameter (default 0), so
//! two caches built with the same parameters evict identically on the same
//! trace regardless of which worker thread runs them.
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::base::{CacheCore, CheckResult, Lookup};
use crate::builder::CommonCacheParams;
use crate::ds::slot_arena::SlotId;
use crate::error::{CacheError, ConfigError, InvariantError};
use crate::object::CacheObject;
use crate::request::{ObjId, Request};
use crate::traits::Cache;

pub struct RandomCache {
    core: CacheCore,
    seed: u64,
    rng: SmallRng,
    candidate: Option<SlotId>,
}

impl RandomCache {
    pub const METADATA_SIZE: u64 = 0;
    pub const DEFAULT_SEED: u64 = 0;

    pub fn new(params: &CommonCacheParams) -> Result<Self, ConfigError> {
        Self::with_seed(params, Self::DEFAULT_SEED)
    }

    pub fn with_seed(params: &CommonCacheParams, seed: u64) -> Result<Self, ConfigError> {
        Ok(Self {
            core: CacheCore::new("Random", params, Self::METADATA_SIZE)?,
            seed,
            rng: SmallRng::seed_from_u64(seed),
            candidate: None,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The remembered candidate if still resident, else a fresh draw.
    fn pick(&mut self) -> Option<SlotId> {
        if let Some(slot) = self.candidate
            && self.core.store().get(slot).is_some()
        {
            return Some(slot);
        }
        let slot = self.core.store().sample_random(&mut self.rng);
        self.candidate = slot;
        slot
    }

    fn forget(&mut self, slot: SlotId) {
        if self.candidate == Some(slot) {
            self.candidate = None;
        }
    }
}

impl Cache for RandomCache {
    fn core(&self) -> &CacheCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CacheCore {
        &mut self.core
    }

    fn check(&mut self, req: &Request, promote: bool) -> Result<CheckResult, CacheError> {
        match self.core.check_base(req, promote) {
            Lookup::Hit(_) => Ok(CheckResult::Hit),
            Lookup::Expired(slot) => {
                if promote {
                    self.forget(slot);
                    self.core.remove_base(slot)?;
                }
                Ok(CheckResult::Expired)
            },
            Lookup::Miss => Ok(CheckResult::Miss),
        }
    }

    fn insert(&mut self, req: &Request) -> Result<CacheObject, CacheError> {
        let slot = self.core.insert_base(req)?;
        self.candidate = None;
        self.core.snapshot(slot)
    }

    fn to_evict(&mut self, _req: &Request) -> Option<CacheObject> {
        let slot = self.pick()?;
        self.core.store().get(slot).map(CacheObject::detached)
    }

    fn evict(&mut self, _req: &Request) -> Result<CacheObject, CacheError> {
        let slot = self
            .pick()
            .ok_or_else(|| CacheError::invariant("Random: evict from an empty cache"))?;
        self.candidate = None;
        self.core.remove_base(slot)
    }

    fn remove(&mut self, obj_id: ObjId) -> Result<Option<CacheObject>, CacheError> {
        let Some(slot) = self.core.store().find(obj_id) else {
            return Ok(None);
        };
        self.forget(slot);
        self.core.remove_base(slot).map(Some)
    }

    fn with_capacity(&self, capacity: u64) -> Result<Box<dyn Cache>, ConfigError> {
        let params = self.core.params().with_capacity(capacity);
        Ok(Box::new(Self::with_seed(&params, self.seed)?))
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        self.core.verify_occupancy()
    }
}

impl std::fmt::Debug for RandomCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomCache")
            .field("core", &self.core)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}
