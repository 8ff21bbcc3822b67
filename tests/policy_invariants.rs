// ==============================================
// CROSS-POLICY INVARIANT TESTS (integration)
// ==============================================
//
// Tests that verify library-wide behavioral consistency across all cache
// policies. These span multiple modules and belong here rather than in any
// single source file.

use cachesim::builder::{CommonCacheParams, create_cache};
use cachesim::request::Request;
use cachesim::traits::Cache;

const POLICIES: [&str; 6] = ["lru", "mru", "fifo", "random", "slru", "arc"];

fn build(name: &str, params: CommonCacheParams) -> Box<dyn Cache> {
    create_cache(name, params, None).unwrap()
}

fn residents(cache: &dyn Cache) -> Vec<u64> {
    let mut ids = cache.resident_ids();
    ids.sort_unstable();
    ids
}

// ==============================================
// Reference Scenarios
// ==============================================

mod scenarios {
    use super::*;

    const A: u64 = 1;
    const B: u64 = 2;
    const C: u64 = 3;

    fn replay(name: &str) -> Box<dyn Cache> {
        let mut cache = build(name, CommonCacheParams::new(2).with_hash_power(4));
        for id in [A, B, A, C] {
            cache.get(&Request::new(id, 1)).unwrap();
        }
        cache.check_invariants().unwrap();
        cache
    }

    #[test]
    fn lru_and_fifo_diverge_on_reuse() {
        assert_eq!(residents(replay("lru").as_ref()), vec![A, C]);
        assert_eq!(residents(replay("fifo").as_ref()), vec![B, C]);
    }

    #[test]
    fn mru_evicts_the_last_hit() {
        assert_eq!(residents(replay("mru").as_ref()), vec![B, C]);
    }

    #[test]
    fn oversized_objects_are_never_resident() {
        for name in POLICIES {
            let mut cache = build(name, CommonCacheParams::new(100).with_hash_power(4));
            cache.get(&Request::new(1, 10)).unwrap();
            assert!(cache.get(&Request::new(2, 101)).unwrap().is_miss());
            assert!(!cache.contains(2), "{name} admitted an oversized object");
            assert!(cache.contains(1), "{name} evicted for an oversized object");
        }
    }

    #[test]
    fn expired_objects_miss_and_are_readmitted() {
        for name in POLICIES {
            let params = CommonCacheParams::new(100)
                .with_hash_power(4)
                .with_ttl_support(true);
            let mut cache = build(name, params);
            cache.get(&Request::new(1, 10).at(0).with_ttl(5)).unwrap();
            assert!(cache.get(&Request::new(1, 10).at(5)).unwrap().is_hit(), "{name}");
            assert!(cache.get(&Request::new(1, 10).at(6)).unwrap().is_miss(), "{name}");
            assert_eq!(cache.n_obj(), 1, "{name}");
            assert_eq!(cache.occupied_size(), 10, "{name}");
            cache.check_invariants().unwrap();
        }
    }

    #[test]
    fn overflowing_size_is_never_resident() {
        for name in POLICIES {
            let params = CommonCacheParams::new(100)
                .with_hash_power(4)
                .with_per_obj_overhead(1);
            let mut cache = build(name, params);
            cache.get(&Request::new(7, 10)).unwrap();
            assert!(cache.get(&Request::new(1, u64::MAX)).unwrap().is_miss(), "{name}");
            assert!(!cache.contains(1), "{name} admitted a wrapping size");
            assert!(cache.contains(7), "{name} evicted for a wrapping size");
            assert_eq!(cache.occupied_size(), 11, "{name}");
            cache.check_invariants().unwrap();
        }
    }

    #[test]
    fn overflowing_grown_hit_keeps_accounting() {
        for name in POLICIES {
            let mut cache = build(name, CommonCacheParams::new(u64::MAX).with_hash_power(4));
            cache.get(&Request::new(1, 10)).unwrap();
            cache.get(&Request::new(2, 10)).unwrap();
            cache.get(&Request::new(1, u64::MAX)).unwrap();
            assert!(cache.occupied_size() <= cache.capacity(), "{name}");
            cache.check_invariants().unwrap();
        }
    }

    #[test]
    fn grown_hit_keeps_capacity() {
        for name in POLICIES {
            let mut cache = build(name, CommonCacheParams::new(100).with_hash_power(4));
            for id in 0..4 {
                cache.get(&Request::new(id, 20)).unwrap();
            }
            cache.get(&Request::new(0, 60)).unwrap();
            assert!(cache.occupied_size() <= 100, "{name}: {}", cache.occupied_size());
            cache.check_invariants().unwrap();
        }
    }
}

// ==============================================
// Random Victim Distribution
// ==============================================

mod random_distribution {
    use super::*;

    #[test]
    fn victims_are_roughly_uniform() {
        let mut counts = [0u32; 4];
        for seed in 0..4_000 {
            let params = CommonCacheParams::new(4).with_hash_power(3);
            let mut cache = create_cache("random", params, Some(&format!("seed={seed}"))).unwrap();
            for id in 0..4 {
                cache.get(&Request::new(id, 1)).unwrap();
            }
            let victim = cache.to_evict(&Request::new(9, 1)).unwrap();
            counts[victim.obj_id as usize] += 1;
        }
        for (id, &n) in counts.iter().enumerate() {
            assert!((800..1_200).contains(&n), "object {id} chosen {n} times");
        }
    }
}

// ==============================================
// Property Tests
// ==============================================

mod properties {
    use proptest::prelude::*;

    use super::*;

    #[derive(Debug, Clone)]
    enum Operation {
        Get(u64, u64),
        Remove(u64),
        Evict,
    }

    fn operation_strategy() -> impl Strategy<Value = Operation> {
        prop_oneof![
            6 => (0u64..64, 1u64..16).prop_map(|(id, size)| Operation::Get(id, size)),
            1 => (0u64..64).prop_map(Operation::Remove),
            1 => Just(Operation::Evict),
        ]
    }

    fn params(capacity: u64, overhead: u64) -> CommonCacheParams {
        CommonCacheParams::new(capacity)
            .with_hash_power(6)
            .with_per_obj_overhead(overhead)
    }

    proptest! {
        /// Accounting, ordering and capacity hold after every operation.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_arbitrary_ops_maintain_invariants(
            policy in 0usize..POLICIES.len(),
            capacity in 16u64..256,
            overhead in 0u64..4,
            ops in prop::collection::vec(operation_strategy(), 0..200)
        ) {
            let name = POLICIES[policy];
            let mut cache = build(name, params(capacity, overhead));

            for (time, op) in ops.into_iter().enumerate() {
                match op {
                    Operation::Get(id, size) => {
                        cache.get(&Request::new(id, size).at(time as u64)).unwrap();
                    },
                    Operation::Remove(id) => {
                        let removed = cache.remove(id).unwrap();
                        prop_assert!(!cache.contains(id));
                        if let Some(obj) = removed {
                            prop_assert_eq!(obj.obj_id, id);
                        }
                    },
                    Operation::Evict => {
                        if cache.n_obj() > 0 {
                            let victim = cache.evict(&Request::new(1_000, 1)).unwrap();
                            prop_assert!(!cache.contains(victim.obj_id));
                        }
                    },
                }
                prop_assert!(cache.check_invariants().is_ok(), "{}: {:?}", name, cache.check_invariants());
                prop_assert!(cache.occupied_size() <= cache.capacity());
                prop_assert_eq!(cache.resident_ids().len() as u64, cache.n_obj());
            }
        }

        /// `to_evict` names exactly the object the next `evict` removes.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_to_evict_agrees_with_evict(
            policy in 0usize..POLICIES.len(),
            ids in prop::collection::vec(0u64..40, 1..150)
        ) {
            let name = POLICIES[policy];
            let mut cache = build(name, params(32, 0));
            for id in ids {
                cache.get(&Request::new(id, 1)).unwrap();
            }
            let req = Request::new(999, 1);
            while cache.n_obj() > 0 {
                let candidate = cache.to_evict(&req);
                let again = cache.to_evict(&req);
                prop_assert_eq!(candidate.as_ref(), again.as_ref());
                let victim = cache.evict(&req).unwrap();
                prop_assert_eq!(candidate.map(|o| o.obj_id), Some(victim.obj_id));
            }
            prop_assert!(cache.evict(&req).is_err());
            prop_assert_eq!(cache.occupied_size(), 0);
        }

        /// Unit-sized LRU matches a plain recency list.
        #[cfg_attr(miri, ignore)]
        #[test]
        fn prop_lru_matches_reference_model(
            capacity in 1u64..20,
            ids in prop::collection::vec(0u64..30, 0..300)
        ) {
            let mut cache = build("lru", params(capacity, 0));
            let mut model: Vec<u64> = Vec::new();
            for id in ids {
                let hit = cache.get(&Request::new(id, 1)).unwrap().is_hit();
                let pos = model.iter().position(|&x| x == id);
                prop_assert_eq!(hit, pos.is_some());
                if let Some(pos) = pos {
                    model.remove(pos);
                } else if model.len() as u64 == capacity {
                    model.pop();
                }
                model.insert(0, id);
            }
            let mut expected = model.clone();
            expected.sort_unstable();
            prop_assert_eq!(residents(cache.as_ref()), expected);
        }
    }
}
