//! Adaptive Replacement Cache (ARC) replacement policy.
//!
//! ARC balances recency against frequency with two resident lists and two
//! ghost lists, and moves a target `p` (bytes of T1) toward whichever side
//! the workload rewards. All sizes are in bytes, so variable-sized objects
//! are handled by the same rules as unit-sized pages.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                               ArcCache                                      │
//! │                                                                             │
//! │   CacheCore ── ObjectStore (resident objects, ext = Arc(T1 | T2))           │
//! │                                                                             │
//! │   T1 (seen once)                         T2 (seen at least twice)           │
//! │   ┌─────────────────────────┐            ┌─────────────────────────┐        │
//! │   │ MRU               LRU   │            │ MRU               LRU   │        │
//! │   │ [A] ◄──► [B] ◄──► [C]   │            │ [X] ◄──► [Y] ◄──► [Z]   │        │
//! │   └───────────────────┬─────┘            └───────────────────┬─────┘        │
//! │                       │ evict                                │ evict        │
//! │                       ▼                                      ▼              │
//! │   B1 ghost ids + bytes                    B2 ghost ids + bytes              │
//! │                                                                             │
//! │   p: target bytes for T1                                                    │
//! │     ghost hit in B1 → p += max(|B2| / |B1|, 1)   (favor recency)            │
//! │     ghost hit in B2 → p -= max(|B1| / |B2|, 1)   (favor frequency)          │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Flows
//!
//! ```text
//!   hit in T1 or T2        move to T2 head
//!   ghost hit (B1 or B2)   adapt p, drop the ghost, make room with REPLACE,
//!                          admit into T2
//!   plain miss             if T1 + B1 + incoming > capacity:
//!                              B1 non-empty: drop B1's LRU, REPLACE
//!                              otherwise:    evict T1's LRU, no ghost
//!                          else:
//!                              if T1 + B1 + T2 + B2 >= 2 * capacity: drop B2's LRU
//!                              REPLACE
//!                          admit into T1
//!
//!   REPLACE: if T1 > 0 and (T1 > p or (T1 == p and the ghost hit was in B2))
//!            or T2 == 0:  T1's LRU → B1
//!            else:        T2's LRU → B2
//! ```
//!
//! Ghost entries never count toward occupancy and never shadow a resident
//! object.
use crate::base::{CacheCore, CheckResult, Lookup};
use crate::builder::CommonCacheParams;
use crate::ds::ghost_list::GhostList;
use crate::ds::slot_arena::SlotId;
use crate::error::{CacheError, ConfigError, InvariantError};
use crate::object::{ArcList, CacheObject, PolicyExt};
use crate::request::{ObjId, Request};
use crate::store::ObjectQueue;
use crate::traits::Cache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GhostHit {
    B1,
    B2,
}

/// What one `evict` call will do. Computed without side effects so
/// `to_evict` and `evict` agree.
#[derive(Debug, Clone, Copy)]
struct EvictPlan {
    drop_b1: bool,
    drop_b2: bool,
    victim: ArcList,
    ghost: bool,
}

#[derive(Debug)]
pub struct ArcCache {
    core: CacheCore,
    t1: ObjectQueue,
    t2: ObjectQueue,
    b1: GhostList,
    b2: GhostList,
    t1_bytes: u64,
    t2_bytes: u64,
    p: f64,
    ghost_hit: Option<GhostHit>,
}

fn debit(total: &mut u64, amount: u64, what: &str) -> Result<(), CacheError> {
    let Some(rest) = total.checked_sub(amount) else {
        return Err(CacheError::invariant(format!(
            "ARC: {what} bytes {total} underflow by {amount}"
        )));
    };
    *total = rest;
    Ok(())
}

impl ArcCache {
    /// Two queue links plus ghost bookkeeping.
    pub const METADATA_SIZE: u64 = 40;

    pub fn new(params: &CommonCacheParams) -> Result<Self, ConfigError> {
        Ok(Self {
            core: CacheCore::new("ARC", params, Self::METADATA_SIZE)?,
            t1: ObjectQueue::new(),
            t2: ObjectQueue::new(),
            b1: GhostList::new(),
            b2: GhostList::new(),
            t1_bytes: 0,
            t2_bytes: 0,
            p: 0.0,
            ghost_hit: None,
        })
    }

    /// Current target size of T1 in bytes.
    #[inline]
    pub fn p(&self) -> f64 {
        self.p
    }

    #[inline]
    pub fn t1_bytes(&self) -> u64 {
        self.t1_bytes
    }

    #[inline]
    pub fn t2_bytes(&self) -> u64 {
        self.t2_bytes
    }

    #[inline]
    pub fn b1_bytes(&self) -> u64 {
        self.b1.bytes()
    }

    #[inline]
    pub fn b2_bytes(&self) -> u64 {
        self.b2.bytes()
    }

    /// T1 ids from MRU to LRU.
    pub fn t1_ids(&self) -> Vec<ObjId> {
        self.t1.ids(self.core.store())
    }

    /// T2 ids from MRU to LRU.
    pub fn t2_ids(&self) -> Vec<ObjId> {
        self.t2.ids(self.core.store())
    }

    /// B1 ghost ids from most to least recent.
    pub fn b1_ids(&self) -> Vec<ObjId> {
        self.b1.ids().collect()
    }

    /// B2 ghost ids from most to least recent.
    pub fn b2_ids(&self) -> Vec<ObjId> {
        self.b2.ids().collect()
    }

    /// Resident list of `obj_id`, if resident.
    pub fn list_of(&self, obj_id: ObjId) -> Option<ArcList> {
        let store = self.core.store();
        match store.find(obj_id).and_then(|slot| store.get(slot))?.ext {
            PolicyExt::Arc(list) => Some(list),
            _ => None,
        }
    }

    fn queue(&self, list: ArcList) -> &ObjectQueue {
        match list {
            ArcList::T1 => &self.t1,
            ArcList::T2 => &self.t2,
        }
    }

    fn set_list(&mut self, slot: SlotId, list: ArcList) {
        if let Some(obj) = self.core.store_mut().get_mut(slot) {
            obj.ext = PolicyExt::Arc(list);
        }
    }

    fn adapt_on_ghost(&mut self, obj_id: ObjId) {
        if self.b1.contains(obj_id) {
            let delta = (self.b2.bytes() as f64 / self.b1.bytes() as f64).max(1.0);
            self.p = (self.p + delta).min(self.core.capacity() as f64);
            self.b1.remove(obj_id);
            self.ghost_hit = Some(GhostHit::B1);
        } else if self.b2.contains(obj_id) {
            let delta = (self.b1.bytes() as f64 / self.b2.bytes() as f64).max(1.0);
            self.p = (self.p - delta).max(0.0);
            self.b2.remove(obj_id);
            self.ghost_hit = Some(GhostHit::B2);
        }
    }

    /// Moves a hit object to the head of T2. `before` is its charge prior to
    /// any resize done by the lookup.
    fn promote_hit(&mut self, slot: SlotId, before: u64) -> Result<(), CacheError> {
        let (ext, after) = {
            let obj = self.core.store().get(slot).ok_or_else(|| {
                CacheError::invariant(format!("ARC: hit slot {slot:?} vanished"))
            })?;
            (obj.ext, self.core.charge(obj.obj_size))
        };
        match ext {
            PolicyExt::Arc(ArcList::T1) => {
                self.t1.unlink(self.core.store_mut(), slot);
                debit(&mut self.t1_bytes, before, "T1")?;
                self.t2.push_head(self.core.store_mut(), slot);
                self.t2_bytes += after;
                self.set_list(slot, ArcList::T2);
            },
            PolicyExt::Arc(ArcList::T2) => {
                self.t2.move_to_head(self.core.store_mut(), slot);
                debit(&mut self.t2_bytes, before, "T2")?;
                self.t2_bytes += after;
            },
            other => {
                return Err(CacheError::invariant(format!(
                    "ARC: resident slot {slot:?} tagged {other:?}"
                )));
            },
        }
        Ok(())
    }

    fn replace_target(&self, hit_in_b2: bool) -> ArcList {
        let t1 = self.t1_bytes as f64;
        if (self.t1_bytes > 0 && (t1 > self.p || (t1 == self.p && hit_in_b2))) || self.t2_bytes == 0
        {
            ArcList::T1
        } else {
            ArcList::T2
        }
    }

    fn plan(&self, req: &Request) -> EvictPlan {
        if let Some(hit) = self.ghost_hit {
            return EvictPlan {
                drop_b1: false,
                drop_b2: false,
                victim: self.replace_target(hit == GhostHit::B2),
                ghost: true,
            };
        }

        let capacity = self.core.capacity();
        let incoming = self.core.charge(req.obj_size);
        if self.t1_bytes.saturating_add(self.b1.bytes()).saturating_add(incoming) > capacity {
            if self.b1.is_empty() {
                EvictPlan {
                    drop_b1: false,
                    drop_b2: false,
                    victim: ArcList::T1,
                    ghost: false,
                }
            } else {
                EvictPlan {
                    drop_b1: true,
                    drop_b2: false,
                    victim: self.replace_target(false),
                    ghost: true,
                }
            }
        } else {
            let total = [self.b1.bytes(), self.t2_bytes, self.b2.bytes()]
                .into_iter()
                .fold(self.t1_bytes, u64::saturating_add);
            EvictPlan {
                drop_b1: false,
                drop_b2: total >= capacity.saturating_mul(2) && !self.b2.is_empty(),
                victim: self.replace_target(false),
                ghost: true,
            }
        }
    }

    /// Tail of the planned list, or of the other list when it is empty.
    fn resolve(&self, list: ArcList) -> Option<(ArcList, SlotId)> {
        let other = match list {
            ArcList::T1 => ArcList::T2,
            ArcList::T2 => ArcList::T1,
        };
        self.queue(list)
            .tail()
            .map(|slot| (list, slot))
            .or_else(|| self.queue(other).tail().map(|slot| (other, slot)))
    }

    fn unlink_and_remove(&mut self, slot: SlotId) -> Result<(ArcList, CacheObject), CacheError> {
        let (ext, charge) = {
            let obj = self.core.store().get(slot).ok_or_else(|| {
                CacheError::invariant(format!("ARC: stale slot {slot:?}"))
            })?;
            (obj.ext, self.core.charge(obj.obj_size))
        };
        let list = match ext {
            PolicyExt::Arc(list) => list,
            other => {
                return Err(CacheError::invariant(format!(
                    "ARC: resident slot {slot:?} tagged {other:?}"
                )));
            },
        };
        let unlinked = match list {
            ArcList::T1 => {
                debit(&mut self.t1_bytes, charge, "T1")?;
                self.t1.unlink(self.core.store_mut(), slot)
            },
            ArcList::T2 => {
                debit(&mut self.t2_bytes, charge, "T2")?;
                self.t2.unlink(self.core.store_mut(), slot)
            },
        };
        if !unlinked {
            return Err(CacheError::invariant(format!(
                "ARC: slot {slot:?} not linked into {list:?}"
            )));
        }
        Ok((list, self.core.remove_base(slot)?))
    }
}

impl Cache for ArcCache {
    fn core(&self) -> &CacheCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CacheCore {
        &mut self.core
    }

    fn check(&mut self, req: &Request, promote: bool) -> Result<CheckResult, CacheError> {
        if !promote {
            return Ok(match self.core.check_base(req, false) {
                Lookup::Hit(_) => CheckResult::Hit,
                Lookup::Expired(_) => CheckResult::Expired,
                Lookup::Miss => CheckResult::Miss,
            });
        }

        self.ghost_hit = None;
        let before = self.core.resident_charge(req.obj_id).unwrap_or(0);
        match self.core.check_base(req, true) {
            Lookup::Hit(slot) => {
                self.promote_hit(slot, before)?;
                Ok(CheckResult::Hit)
            },
            Lookup::Expired(slot) => {
                self.unlink_and_remove(slot)?;
                Ok(CheckResult::Expired)
            },
            Lookup::Miss => {
                self.adapt_on_ghost(req.obj_id);
                Ok(CheckResult::Miss)
            },
        }
    }

    fn insert(&mut self, req: &Request) -> Result<CacheObject, CacheError> {
        let slot = self.core.insert_base(req)?;
        self.b1.remove(req.obj_id);
        self.b2.remove(req.obj_id);

        let charge = self.core.charge(req.obj_size);
        let list = if self.ghost_hit.take().is_some() {
            self.t2.push_head(self.core.store_mut(), slot);
            self.t2_bytes += charge;
            ArcList::T2
        } else {
            self.t1.push_head(self.core.store_mut(), slot);
            self.t1_bytes += charge;
            ArcList::T1
        };
        self.set_list(slot, list);
        self.core.snapshot(slot)
    }

    fn to_evict(&mut self, req: &Request) -> Option<CacheObject> {
        let plan = self.plan(req);
        let (_, slot) = self.resolve(plan.victim)?;
        self.core.store().get(slot).map(CacheObject::detached)
    }

    fn evict(&mut self, req: &Request) -> Result<CacheObject, CacheError> {
        let plan = self.plan(req);
        let (_, slot) = self
            .resolve(plan.victim)
            .ok_or_else(|| CacheError::invariant("ARC: evict from an empty cache"))?;
        if plan.drop_b1 {
            self.b1.pop_lru();
        }
        if plan.drop_b2 {
            self.b2.pop_lru();
        }

        let (list, obj) = self.unlink_and_remove(slot)?;
        if plan.ghost {
            let charge = self.core.charge(obj.obj_size);
            match list {
                ArcList::T1 => self.b1.record(obj.obj_id, charge),
                ArcList::T2 => self.b2.record(obj.obj_id, charge),
            }
        }
        Ok(obj)
    }

    fn remove(&mut self, obj_id: ObjId) -> Result<Option<CacheObject>, CacheError> {
        self.b1.remove(obj_id);
        self.b2.remove(obj_id);
        match self.core.store().find(obj_id) {
            Some(slot) => self.unlink_and_remove(slot).map(|(_, obj)| Some(obj)),
            None => Ok(None),
        }
    }

    fn with_capacity(&self, capacity: u64) -> Result<Box<dyn Cache>, ConfigError> {
        Ok(Box::new(Self::new(&self.core.params().with_capacity(capacity))?))
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        self.core.verify_occupancy()?;
        let store = self.core.store();

        for (list, queue, recorded) in [
            (ArcList::T1, &self.t1, self.t1_bytes),
            (ArcList::T2, &self.t2, self.t2_bytes),
        ] {
            queue.validate(store)?;
            let mut bytes = 0;
            for (_, obj) in queue.iter(store) {
                if obj.ext != PolicyExt::Arc(list) {
                    return Err(InvariantError::new(format!(
                        "ARC: object {} in {list:?} tagged {:?}",
                        obj.obj_id, obj.ext
                    )));
                }
                bytes += self.core.charge(obj.obj_size);
            }
            if bytes != recorded {
                return Err(InvariantError::new(format!(
                    "ARC: {list:?} records {recorded} bytes, holds {bytes}"
                )));
            }
        }

        if self.t1.len() + self.t2.len() != store.len() {
            return Err(InvariantError::new(format!(
                "ARC: T1 {} + T2 {} objects, store holds {}",
                self.t1.len(),
                self.t2.len(),
                store.len()
            )));
        }

        self.b1.validate()?;
        self.b2.validate()?;
        if let Some(id) = self.b1.ids().chain(self.b2.ids()).find(|&id| store.contains(id)) {
            return Err(InvariantError::new(format!(
                "ARC: object {id} is both resident and a ghost"
            )));
        }
        if let Some(id) = self.b1.ids().find(|&id| self.b2.contains(id)) {
            return Err(InvariantError::new(format!("ARC: ghost {id} in both B1 and B2")));
        }

        if !(0.0..=self.core.capacity() as f64).contains(&self.p) {
            return Err(InvariantError::new(format!(
                "ARC: p = {} outside [0, {}]",
                self.p,
                self.core.capacity()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arc(capacity: u64) -> ArcCache {
        ArcCache::new(&CommonCacheParams::new(capacity).with_hash_power(6)).unwrap()
    }

    fn get(cache: &mut ArcCache, id: ObjId) -> bool {
        let hit = cache.get(&Request::new(id, 1)).unwrap().is_hit();
        cache.check_invariants().unwrap();
        assert!(cache.occupied_size() <= cache.capacity());
        hit
    }

    fn sorted(mut ids: Vec<ObjId>) -> Vec<ObjId> {
        ids.sort_unstable();
        ids
    }

    // ==============================================
    // Basic Behavior
    // ==============================================

    mod basic_behavior {
        use super::*;

        #[test]
        fn first_access_t1_second_access_t2() {
            let mut cache = arc(4);
            assert!(!get(&mut cache, 1));
            assert_eq!(cache.list_of(1), Some(ArcList::T1));
            assert!(get(&mut cache, 1));
            assert_eq!(cache.list_of(1), Some(ArcList::T2));
            assert!(get(&mut cache, 1));
            assert_eq!(cache.t2_ids(), vec![1]);
            assert_eq!(cache.t1_bytes(), 0);
            assert_eq!(cache.t2_bytes(), 1);
        }

        #[test]
        fn full_t1_without_ghosts_evicts_t1_lru() {
            let mut cache = arc(3);
            for id in 1..=4 {
                get(&mut cache, id);
            }
            assert_eq!(cache.t1_ids(), vec![4, 3, 2]);
            assert!(cache.b1_ids().is_empty());
        }

        #[test]
        fn check_without_promote_is_side_effect_free() {
            let mut cache = arc(4);
            get(&mut cache, 1);
            assert_eq!(cache.check(&Request::new(1, 1), false).unwrap(), CheckResult::Hit);
            assert_eq!(cache.list_of(1), Some(ArcList::T1));
        }
    }

    // ==============================================
    // Adaptation
    // ==============================================

    mod adaptation {
        use super::*;

        /// T1 = [4], T2 = [2, 1], B1 = [3], p = 1.
        fn after_b1_ghost_hit() -> ArcCache {
            let mut cache = arc(3);
            for id in [1, 2, 1, 3, 4] {
                get(&mut cache, id);
            }
            assert_eq!(cache.b1_ids(), vec![2]);
            assert!(!get(&mut cache, 2));
            cache
        }

        #[test]
        fn ghost_hit_in_b1_grows_p_and_admits_into_t2() {
            let cache = after_b1_ghost_hit();
            assert_eq!(cache.p(), 1.0);
            assert_eq!(cache.t2_ids(), vec![2, 1]);
            assert_eq!(cache.t1_ids(), vec![4]);
            assert_eq!(cache.b1_ids(), vec![3]);
            assert_eq!(sorted(cache.resident_ids()), vec![1, 2, 4]);
        }

        #[test]
        fn ghost_hit_in_b2_shrinks_p() {
            let mut cache = after_b1_ghost_hit();
            // T1 == p, so REPLACE takes T2's LRU
            get(&mut cache, 5);
            assert_eq!(cache.b2_ids(), vec![1]);
            assert_eq!(cache.t1_ids(), vec![5, 4]);

            assert!(!get(&mut cache, 1));
            assert_eq!(cache.p(), 0.0);
            assert_eq!(cache.list_of(1), Some(ArcList::T2));
            assert_eq!(cache.t2_ids(), vec![1, 2]);
            assert_eq!(cache.t1_ids(), vec![5]);
            assert_eq!(cache.b1_ids(), vec![4, 3]);
            assert!(cache.b2_ids().is_empty());
        }

        #[test]
        fn to_evict_agrees_with_evict() {
            let mut cache = after_b1_ghost_hit();
            let req = Request::new(77, 1);
            let b1_before = cache.b1_ids();
            let candidate = cache.to_evict(&req).unwrap();
            assert_eq!(cache.b1_ids(), b1_before);
            assert_eq!(cache.evict(&req).unwrap(), candidate);
            assert_eq!(cache.b2_ids(), vec![candidate.obj_id]);
        }
    }

    // ==============================================
    // Scan Resistance
    // ==============================================

    mod scan_resistance {
        use super::*;

        #[test]
        fn frequent_set_survives_a_scan() {
            let mut cache = arc(10);
            for _ in 0..2 {
                for id in 0..5 {
                    get(&mut cache, id);
                }
            }
            for id in 100..300 {
                get(&mut cache, id);
            }
            for id in 0..5 {
                assert_eq!(cache.list_of(id), Some(ArcList::T2), "hot object {id} lost");
            }
        }

        #[test]
        fn variable_sizes_keep_invariants() {
            let mut cache = arc(64);
            for step in 0..3_000u64 {
                let id = (step * 13 + step / 7) % 97;
                let size = 1 + (id * 7) % 11;
                cache.get(&Request::new(id, size).at(step)).unwrap();
                assert!(cache.occupied_size() <= cache.capacity());
            }
            cache.check_invariants().unwrap();
        }
    }

    // ==============================================
    // Removal
    // ==============================================

    #[test]
    fn remove_resident_and_ghost() {
        let mut cache = arc(3);
        for id in [1, 2, 1, 3, 4] {
            get(&mut cache, id);
        }
        assert_eq!(cache.remove(1).unwrap().map(|o| o.obj_id), Some(1));
        assert_eq!(cache.remove(2).unwrap(), None);
        assert!(cache.b1_ids().is_empty());
        cache.check_invariants().unwrap();
        assert_eq!(cache.occupied_size(), 2);
    }
}
