//! Segmented LRU (SLRU) cache replacement policy.
//!
//! The cache is split into `n_seg` equally sized LRU segments ordered from
//! cold (segment 0) to hot (segment `n_seg - 1`). Objects are admitted low
//! and climb one segment per hit; when a segment overflows its LRU object is
//! *cooled* into the segment below, and objects cooled out of segment 0 leave
//! the cache. One-time accesses therefore never displace objects that have
//! proven themselves with repeated hits.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              SlruCache                                  │
//! │                                                                         │
//! │   CacheCore (name, capacity, overhead, request counter)                 │
//! │                                                                         │
//! │   segments: Vec<LruCache>, each capacity / n_seg                        │
//! │                                                                         │
//! │    seg 3 (hot)   [ MRU ..................... LRU ]                      │
//! │        ▲ hit              cool │                                        │
//! │    seg 2         [ MRU ..................... LRU ]                      │
//! │        ▲ hit              cool │                                        │
//! │    seg 1         [ MRU ..................... LRU ]                      │
//! │        ▲ hit              cool │                                        │
//! │    seg 0 (cold)  [ MRU ..................... LRU ] ──► leaves cache     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Flows
//!
//! ```text
//!   miss:   insert into the lowest segment with room; if none, evict from
//!           the lowest non-empty segment until segment 0 has room
//!   hit i:  remove from segment i, cool segment i+1 until it fits,
//!           insert at the head of segment i+1 (top segment: move to head)
//!   evict:  LRU of the lowest non-empty segment
//! ```
//!
//! Every resident object carries `PolicyExt::Segment(i)`.
//!
//! ## Example Usage
//!
//! ```
//! use cachesim::builder::CommonCacheParams;
//! use cachesim::policy::slru::SlruCache;
//! use cachesim::request::Request;
//! use cachesim::traits::Cache;
//!
//! let mut cache = SlruCache::new(&CommonCacheParams::new(4), 2).unwrap();
//! cache.get(&Request::new(1, 1)).unwrap();
//! cache.get(&Request::new(1, 1)).unwrap();
//! assert_eq!(cache.segment_of(1), Some(1));
//! ```
use log::trace;
use rustc_hash::FxHashSet;

use crate::base::{CacheCore, CheckResult};
use crate::builder::CommonCacheParams;
use crate::error::{CacheError, ConfigError, InvariantError};
use crate::object::{CacheObject, PolicyExt};
use crate::policy::lru::LruCache;
use crate::request::{ObjId, Request};
use crate::traits::Cache;

#[derive(Debug)]
pub struct SlruCache {
    core: CacheCore,
    params: CommonCacheParams,
    segments: Vec<LruCache>,
}

impl SlruCache {
    pub const METADATA_SIZE: u64 = 16;
    pub const DEFAULT_SEGMENTS: usize = 4;
    pub const MAX_SEGMENTS: usize = u8::MAX as usize;

    pub fn new(params: &CommonCacheParams, n_seg: usize) -> Result<Self, ConfigError> {
        if n_seg == 0 || n_seg > Self::MAX_SEGMENTS {
            return Err(ConfigError::new(format!(
                "SLRU: n-seg must be in 1..={}, got {n_seg}",
                Self::MAX_SEGMENTS
            )));
        }
        let seg_capacity = params.capacity / n_seg as u64;
        if seg_capacity == 0 {
            return Err(ConfigError::new(format!(
                "SLRU: capacity {} too small for {n_seg} segments",
                params.capacity
            )));
        }

        // the bookkeeping core never stores objects
        let core = CacheCore::new("SLRU", &params.with_hash_power(1), Self::METADATA_SIZE)?;

        let seg_bits = usize::BITS - (n_seg - 1).leading_zeros();
        let seg_hash_power = params.hash_power.saturating_sub(seg_bits as u8).max(1);
        // admission runs once, on the outer core
        let seg_params = params
            .with_capacity(seg_capacity)
            .with_hash_power(seg_hash_power)
            .with_admission(None);
        let segments = (0..n_seg)
            .map(|i| LruCache::named(format!("SLRU[{i}]"), &seg_params))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            core,
            params: *params,
            segments,
        })
    }

    pub fn n_segments(&self) -> usize {
        self.segments.len()
    }

    /// Capacity of one segment.
    pub fn segment_capacity(&self) -> u64 {
        self.segments.first().map_or(0, |seg| seg.capacity())
    }

    pub fn segment_of(&self, obj_id: ObjId) -> Option<usize> {
        self.segments.iter().position(|seg| seg.contains(obj_id))
    }

    /// Ids of segment `i` from most to least recently used.
    pub fn segment_ids(&self, i: usize) -> Vec<ObjId> {
        self.segments
            .get(i)
            .map(LruCache::recency_order)
            .unwrap_or_default()
    }

    fn insert_into(&mut self, i: usize, req: &Request) -> Result<CacheObject, CacheError> {
        let mut obj = self.segments[i].insert(req)?;
        let ext = PolicyExt::Segment(i as u8);
        self.segments[i].set_ext(req.obj_id, ext);
        obj.ext = ext;
        Ok(obj)
    }

    /// Moves a hit object from segment `i` to the head of segment `i + 1`.
    fn promote(&mut self, i: usize, req: &Request) -> Result<(), CacheError> {
        let upper = i + 1;
        if self.core.charge(req.obj_size) > self.segments[upper].capacity() {
            return Ok(());
        }
        let obj = self.segments[i].remove(req.obj_id)?.ok_or_else(|| {
            CacheError::invariant(format!("SLRU: hit object {} vanished from segment {i}", req.obj_id))
        })?;
        let charge = self.core.charge(obj.obj_size);
        while self.segments[upper].occupied_size() + charge > self.segments[upper].capacity() {
            self.cool(upper, req.clock_time)?;
        }
        self.insert_into(upper, &obj.to_request(req.clock_time))?;
        Ok(())
    }

    /// Demotes the LRU object of segment `i` into segment `i - 1`, cooling
    /// lower segments as needed. Objects cooled out of segment 0 leave.
    fn cool(&mut self, i: usize, now: u64) -> Result<(), CacheError> {
        let victim = self.segments[i].evict(&Request::new(0, 0).at(now))?;
        if i == 0 {
            trace!("SLRU: object {} cooled out of the cache", victim.obj_id);
            return Ok(());
        }
        let lower = i - 1;
        let charge = self.core.charge(victim.obj_size);
        if charge > self.segments[lower].capacity() {
            return Ok(());
        }
        while self.segments[lower].occupied_size() + charge > self.segments[lower].capacity() {
            self.cool(lower, now)?;
        }
        self.insert_into(lower, &victim.to_request(now))?;
        Ok(())
    }

    fn lowest_non_empty(&self) -> Option<usize> {
        self.segments.iter().position(|seg| seg.n_obj() > 0)
    }
}

impl Cache for SlruCache {
    fn core(&self) -> &CacheCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CacheCore {
        &mut self.core
    }

    fn check(&mut self, req: &Request, promote: bool) -> Result<CheckResult, CacheError> {
        let n_seg = self.segments.len();
        for i in 0..n_seg {
            match self.segments[i].check(req, promote)? {
                CheckResult::Miss => continue,
                CheckResult::Expired => return Ok(CheckResult::Expired),
                CheckResult::Hit => {
                    if promote && i + 1 < n_seg {
                        self.promote(i, req)?;
                    }
                    return Ok(CheckResult::Hit);
                },
            }
        }
        Ok(CheckResult::Miss)
    }

    fn insert(&mut self, req: &Request) -> Result<CacheObject, CacheError> {
        if self.contains(req.obj_id) {
            return Err(CacheError::invariant(format!(
                "SLRU: object {} is already resident",
                req.obj_id
            )));
        }
        let charge = self.core.charge(req.obj_size);
        if let Some(i) = self
            .segments
            .iter()
            .position(|seg| seg.occupied_size() + charge <= seg.capacity())
        {
            return self.insert_into(i, req);
        }
        while self.segments[0].occupied_size() + charge > self.segments[0].capacity() {
            self.evict(req)?;
        }
        self.insert_into(0, req)
    }

    fn to_evict(&mut self, req: &Request) -> Option<CacheObject> {
        let i = self.lowest_non_empty()?;
        self.segments[i].to_evict(req)
    }

    fn evict(&mut self, req: &Request) -> Result<CacheObject, CacheError> {
        let i = self
            .lowest_non_empty()
            .ok_or_else(|| CacheError::invariant("SLRU: evict from an empty cache"))?;
        self.segments[i].evict(req)
    }

    fn remove(&mut self, obj_id: ObjId) -> Result<Option<CacheObject>, CacheError> {
        for seg in &mut self.segments {
            if let Some(obj) = seg.remove(obj_id)? {
                return Ok(Some(obj));
            }
        }
        Ok(None)
    }

    fn with_capacity(&self, capacity: u64) -> Result<Box<dyn Cache>, ConfigError> {
        let params = self.params.with_capacity(capacity);
        Ok(Box::new(Self::new(&params, self.segments.len())?))
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        let mut seen = FxHashSet::default();
        for (i, seg) in self.segments.iter().enumerate() {
            seg.check_invariants()?;
            for (_, obj) in seg.core().store().iter() {
                if obj.ext != PolicyExt::Segment(i as u8) {
                    return Err(InvariantError::new(format!(
                        "SLRU: object {} in segment {i} tagged {:?}",
                        obj.obj_id, obj.ext
                    )));
                }
                if !seen.insert(obj.obj_id) {
                    return Err(InvariantError::new(format!(
                        "SLRU: object {} resident in two segments",
                        obj.obj_id
                    )));
                }
            }
        }
        Ok(())
    }

    fn occupied_size(&self) -> u64 {
        self.segments
            .iter()
            .map(|seg| seg.occupied_size())
            .fold(0, u64::saturating_add)
    }

    fn n_obj(&self) -> u64 {
        self.segments.iter().map(|seg| seg.n_obj()).sum()
    }

    fn can_insert(&self, req: &Request) -> bool {
        self.core.can_insert(req) && self.core.charge(req.obj_size) <= self.segment_capacity()
    }

    fn contains(&self, obj_id: ObjId) -> bool {
        self.segment_of(obj_id).is_some()
    }

    fn resident_ids(&self) -> Vec<ObjId> {
        self.segments
            .iter()
            .flat_map(|seg| seg.resident_ids())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slru(capacity: u64, n_seg: usize) -> SlruCache {
        SlruCache::new(&CommonCacheParams::new(capacity).with_hash_power(6), n_seg).unwrap()
    }

    fn get(cache: &mut SlruCache, id: ObjId) -> bool {
        cache.get(&Request::new(id, 1)).unwrap().is_hit()
    }

    // ==============================================
    // Construction
    // ==============================================

    mod construction {
        use super::*;

        #[test]
        fn splits_capacity_evenly() {
            let cache = slru(100, 4);
            assert_eq!(cache.n_segments(), 4);
            assert_eq!(cache.segment_capacity(), 25);
            assert_eq!(cache.capacity(), 100);
            assert_eq!(cache.name(), "SLRU");
        }

        #[test]
        fn rejects_bad_segment_counts() {
            let params = CommonCacheParams::new(10);
            assert!(SlruCache::new(&params, 0).is_err());
            assert!(SlruCache::new(&params, 11).is_err());
            assert!(SlruCache::new(&params, 256).is_err());
        }

        #[test]
        fn can_insert_requires_segment_fit() {
            let cache = slru(100, 4);
            assert!(cache.can_insert(&Request::new(1, 25)));
            assert!(!cache.can_insert(&Request::new(1, 26)));
        }
    }

    // ==============================================
    // Promotion and Cooling
    // ==============================================

    mod promotion {
        use super::*;

        #[test]
        fn hits_climb_one_segment_at_a_time() {
            let mut cache = slru(8, 4);
            get(&mut cache, 1);
            assert_eq!(cache.segment_of(1), Some(0));
            for expected in 1..4 {
                assert!(get(&mut cache, 1));
                assert_eq!(cache.segment_of(1), Some(expected));
            }
            assert!(get(&mut cache, 1));
            assert_eq!(cache.segment_of(1), Some(3));
            cache.check_invariants().unwrap();
        }

        #[test]
        fn misses_fill_lowest_segment_with_room() {
            let mut cache = slru(4, 2);
            for id in 1..=4 {
                get(&mut cache, id);
            }
            assert_eq!(cache.segment_ids(0), vec![2, 1]);
            assert_eq!(cache.segment_ids(1), vec![4, 3]);
        }

        #[test]
        fn promotion_cools_the_upper_segment() {
            let mut cache = slru(4, 2);
            for id in 1..=4 {
                get(&mut cache, id);
            }
            // 1 climbs to segment 1, whose LRU (3) is cooled into segment 0
            assert!(get(&mut cache, 1));
            assert_eq!(cache.segment_ids(1), vec![1, 4]);
            assert_eq!(cache.segment_of(3), Some(0));
            assert_eq!(cache.n_obj(), 4);
            assert!(cache.occupied_size() <= cache.capacity());
            cache.check_invariants().unwrap();
        }

        #[test]
        fn victim_is_lru_of_lowest_segment() {
            let mut cache = slru(4, 2);
            for id in 1..=4 {
                get(&mut cache, id);
            }
            let req = Request::new(9, 1);
            assert_eq!(cache.to_evict(&req).map(|o| o.obj_id), Some(1));
            get(&mut cache, 9);
            assert!(!cache.contains(1));
            assert_eq!(cache.segment_of(9), Some(0));
            cache.check_invariants().unwrap();
        }
    }

    // ==============================================
    // State Consistency
    // ==============================================

    mod state_consistency {
        use super::*;

        #[test]
        fn mixed_workload_keeps_invariants() {
            let mut cache = slru(40, 4);
            for step in 0..2_000u64 {
                let id = (step * 7 + step / 3) % 53;
                let size = 1 + id % 5;
                cache.get(&Request::new(id, size).at(step)).unwrap();
                assert!(cache.occupied_size() <= cache.capacity());
            }
            cache.check_invariants().unwrap();
        }

        #[test]
        fn remove_finds_any_segment() {
            let mut cache = slru(8, 2);
            get(&mut cache, 1);
            get(&mut cache, 1);
            get(&mut cache, 2);
            assert_eq!(cache.remove(1).unwrap().map(|o| o.obj_id), Some(1));
            assert_eq!(cache.remove(2).unwrap().map(|o| o.obj_id), Some(2));
            assert_eq!(cache.remove(3).unwrap(), None);
            assert_eq!(cache.n_obj(), 0);
            assert!(cache.evict(&Request::new(0, 1)).is_err());
        }

        #[test]
        fn double_insert_is_rejected() {
            let mut cache = slru(8, 2);
            cache.insert(&Request::new(1, 1)).unwrap();
            assert!(cache.insert(&Request::new(1, 1)).is_err());
        }
    }
}
