//! Cache configuration and the policy factory.
//!
//! Every simulated cache is built from a [`CommonCacheParams`] (capacity,
//! hash table size, overhead, TTL handling) plus a [`CachePolicy`]. Callers
//! either use the typed [`CacheBuilder`] or the string-driven
//! [`create_cache`], which accepts case-insensitive policy names and
//! `key=value` policy parameters.
//!
//! ## Example
//!
//! ```rust
//! use cachesim::builder::{CacheBuilder, CachePolicy};
//! use cachesim::request::Request;
//!
//! let mut cache = CacheBuilder::new(1024)
//!     .per_obj_overhead(8)
//!     .try_build(CachePolicy::Slru { n_seg: 2 })
//!     .unwrap();
//! cache.get(&Request::new(1, 100)).unwrap();
//! assert!(cache.contains(1));
//! ```
//!
//! ## Policy Parameters
//!
//! | Policy   | Keys              | Default |
//! |----------|-------------------|---------|
//! | `random` | `seed=<u64>`      | 0       |
//! | `slru`   | `n-seg=<1..=255>` | 4       |
//!
//! Other policies take no parameters; passing any is an error.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::admission::AdmissionPolicy;
use crate::error::ConfigError;
use crate::policy::arc::ArcCache;
use crate::policy::fifo::FifoCache;
use crate::policy::lru::LruCache;
use crate::policy::mru::MruCache;
use crate::policy::random::RandomCache;
use crate::policy::slru::SlruCache;
use crate::store::{DEFAULT_HASH_POWER, MAX_HASH_POWER, MIN_HASH_POWER};
use crate::traits::Cache;

/// Parameters shared by every policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonCacheParams {
    /// Capacity in bytes.
    pub capacity: u64,
    /// The object store has `2^hash_power` buckets.
    pub hash_power: u8,
    /// Bytes charged per resident object on top of its size.
    pub per_obj_overhead: u64,
    /// TTL applied to requests without one; 0 disables it.
    pub default_ttl: u64,
    pub support_ttl: bool,
    /// Also charge the policy's own per-object metadata.
    pub consider_obj_metadata: bool,
    /// Admission filter consulted on every miss; `None` admits everything
    /// that fits.
    pub admission: Option<AdmissionPolicy>,
}

impl Default for CommonCacheParams {
    fn default() -> Self {
        Self {
            capacity: 0,
            hash_power: DEFAULT_HASH_POWER,
            per_obj_overhead: 0,
            default_ttl: 0,
            support_ttl: false,
            consider_obj_metadata: false,
            admission: None,
        }
    }
}

impl CommonCacheParams {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_hash_power(mut self, hash_power: u8) -> Self {
        self.hash_power = hash_power;
        self
    }

    pub fn with_per_obj_overhead(mut self, overhead: u64) -> Self {
        self.per_obj_overhead = overhead;
        self
    }

    pub fn with_default_ttl(mut self, ttl: u64) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_ttl_support(mut self, enabled: bool) -> Self {
        self.support_ttl = enabled;
        self
    }

    pub fn with_obj_metadata(mut self, enabled: bool) -> Self {
        self.consider_obj_metadata = enabled;
        self
    }

    pub fn with_admission(mut self, admission: Option<AdmissionPolicy>) -> Self {
        self.admission = admission;
        self
    }

    /// TTL for requests that carry none.
    #[inline]
    pub fn fallback_ttl(&self) -> Option<u64> {
        (self.default_ttl > 0).then_some(self.default_ttl)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::new("cache capacity must be greater than zero"));
        }
        if !(MIN_HASH_POWER..=MAX_HASH_POWER).contains(&self.hash_power) {
            return Err(ConfigError::new(format!(
                "hash_power {} outside {MIN_HASH_POWER}..={MAX_HASH_POWER}",
                self.hash_power
            )));
        }
        if let Some(admission) = &self.admission {
            admission.validate()?;
        }
        Ok(())
    }
}

/// Available eviction policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Least Recently Used.
    Lru,
    /// Most Recently Used.
    Mru,
    /// First In, First Out.
    Fifo,
    /// Uniformly random victim from a seeded generator.
    Random { seed: u64 },
    /// Segmented LRU with `n_seg` segments.
    Slru { n_seg: usize },
    /// Adaptive Replacement Cache.
    Arc,
}

impl CachePolicy {
    pub const NAMES: [&'static str; 6] = ["lru", "mru", "fifo", "random", "slru", "arc"];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Mru => "mru",
            Self::Fifo => "fifo",
            Self::Random { .. } => "random",
            Self::Slru { .. } => "slru",
            Self::Arc => "arc",
        }
    }

    /// Resolves a case-insensitive policy name and its optional
    /// comma-separated `key=value` parameters.
    pub fn parse(name: &str, params: Option<&str>) -> Result<Self, ConfigError> {
        let mut policy = match name.trim().to_ascii_lowercase().as_str() {
            "lru" => Self::Lru,
            "mru" => Self::Mru,
            "fifo" => Self::Fifo,
            "random" => Self::Random {
                seed: RandomCache::DEFAULT_SEED,
            },
            "slru" => Self::Slru {
                n_seg: SlruCache::DEFAULT_SEGMENTS,
            },
            "arc" => Self::Arc,
            other => {
                return Err(ConfigError::new(format!(
                    "unknown eviction policy '{other}', expected one of {}",
                    Self::NAMES.join(", ")
                )));
            },
        };

        for (key, value) in parse_policy_params(params.unwrap_or(""))? {
            match (&mut policy, key) {
                (Self::Random { seed }, "seed") => *seed = parse_value(key, value)?,
                (Self::Slru { n_seg }, "n-seg") => *n_seg = parse_value(key, value)?,
                (policy, key) => {
                    return Err(ConfigError::new(format!(
                        "{} does not take parameter '{key}'",
                        policy.name()
                    )));
                },
            }
        }
        Ok(policy)
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random { seed } => write!(f, "random(seed={seed})"),
            Self::Slru { n_seg } => write!(f, "slru(n-seg={n_seg})"),
            other => f.write_str(other.name()),
        }
    }
}

pub(crate) fn parse_policy_params(params: &str) -> Result<Vec<(&str, &str)>, ConfigError> {
    params
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .ok_or_else(|| {
                    ConfigError::new(format!("policy parameter '{pair}' is not key=value"))
                })
        })
        .collect()
}

pub(crate) fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::new(format!("invalid value '{value}' for '{key}'")))
}

/// Builder for cache instances.
#[derive(Debug, Clone, Copy)]
pub struct CacheBuilder {
    params: CommonCacheParams,
}

impl CacheBuilder {
    /// Create a builder for a cache of `capacity` bytes.
    pub fn new(capacity: u64) -> Self {
        Self {
            params: CommonCacheParams::new(capacity),
        }
    }

    pub fn from_params(params: CommonCacheParams) -> Self {
        Self { params }
    }

    pub fn hash_power(mut self, hash_power: u8) -> Self {
        self.params.hash_power = hash_power;
        self
    }

    pub fn per_obj_overhead(mut self, overhead: u64) -> Self {
        self.params.per_obj_overhead = overhead;
        self
    }

    pub fn default_ttl(mut self, ttl: u64) -> Self {
        self.params.default_ttl = ttl;
        self
    }

    pub fn support_ttl(mut self, enabled: bool) -> Self {
        self.params.support_ttl = enabled;
        self
    }

    pub fn consider_obj_metadata(mut self, enabled: bool) -> Self {
        self.params.consider_obj_metadata = enabled;
        self
    }

    pub fn admission(mut self, admission: AdmissionPolicy) -> Self {
        self.params.admission = Some(admission);
        self
    }

    pub fn params(&self) -> &CommonCacheParams {
        &self.params
    }

    /// Build a cache with the specified policy.
    ///
    /// # Example
    ///
    /// ```rust
    /// use cachesim::builder::{CacheBuilder, CachePolicy};
    ///
    /// let lru = CacheBuilder::new(100).try_build(CachePolicy::Lru).unwrap();
    /// let arc = CacheBuilder::new(100).hash_power(10).try_build(CachePolicy::Arc).unwrap();
    /// assert_eq!(lru.name(), "LRU");
    /// assert_eq!(arc.name(), "ARC");
    ///
    /// assert!(CacheBuilder::new(0).try_build(CachePolicy::Fifo).is_err());
    /// ```
    pub fn try_build(self, policy: CachePolicy) -> Result<Box<dyn Cache>, ConfigError> {
        let params = &self.params;
        Ok(match policy {
            CachePolicy::Lru => Box::new(LruCache::new(params)?),
            CachePolicy::Mru => Box::new(MruCache::new(params)?),
            CachePolicy::Fifo => Box::new(FifoCache::new(params)?),
            CachePolicy::Random { seed } => Box::new(RandomCache::with_seed(params, seed)?),
            CachePolicy::Slru { n_seg } => Box::new(SlruCache::new(params, n_seg)?),
            CachePolicy::Arc => Box::new(ArcCache::new(params)?),
        })
    }
}

/// Builds a cache from a policy name, the common parameters and optional
/// policy parameters such as `"n-seg=4"` or `"seed=7"`.
pub fn create_cache(
    policy_name: &str,
    params: CommonCacheParams,
    policy_params: Option<&str>,
) -> Result<Box<dyn Cache>, ConfigError> {
    let policy = CachePolicy::parse(policy_name, policy_params)?;
    match params.admission {
        Some(admission) => log::debug!(
            "creating {policy} cache, capacity {}, admission {admission}",
            params.capacity
        ),
        None => log::debug!("creating {policy} cache, capacity {}", params.capacity),
    }
    CacheBuilder::from_params(params).try_build(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    // ==============================================
    // CommonCacheParams
    // ==============================================

    mod params {
        use super::*;

        #[test]
        fn validate_rejects_zero_capacity_and_bad_hash_power() {
            assert!(CommonCacheParams::new(0).validate().is_err());
            assert!(CommonCacheParams::new(1).with_hash_power(0).validate().is_err());
            assert!(CommonCacheParams::new(1).with_hash_power(29).validate().is_err());
            assert!(CommonCacheParams::new(1).with_hash_power(1).validate().is_ok());
            assert!(CommonCacheParams::new(1).with_hash_power(MAX_HASH_POWER).validate().is_ok());
        }

        #[test]
        fn validate_checks_admission() {
            let bad = AdmissionPolicy::Probabilistic { prob: 0.0, seed: 0 };
            assert!(CommonCacheParams::new(1).with_admission(Some(bad)).validate().is_err());
            let good = AdmissionPolicy::Probabilistic { prob: 0.5, seed: 0 };
            assert!(CommonCacheParams::new(1).with_admission(Some(good)).validate().is_ok());
        }

        #[test]
        fn zero_default_ttl_means_none() {
            assert_eq!(CommonCacheParams::new(1).fallback_ttl(), None);
            assert_eq!(CommonCacheParams::new(1).with_default_ttl(9).fallback_ttl(), Some(9));
        }

        #[test]
        fn serde_fills_missing_fields_from_default() {
            let params: CommonCacheParams =
                serde_json::from_str(r#"{"capacity": 4096, "support_ttl": true}"#).unwrap();
            assert_eq!(params.capacity, 4096);
            assert_eq!(params.hash_power, DEFAULT_HASH_POWER);
            assert!(params.support_ttl);
            assert_eq!(params.admission, None);

            let params: CommonCacheParams = serde_json::from_str(
                r#"{"capacity": 10, "admission": {"probabilistic": {"prob": 0.2, "seed": 1}}}"#,
            )
            .unwrap();
            assert_eq!(
                params.admission,
                Some(AdmissionPolicy::Probabilistic { prob: 0.2, seed: 1 })
            );
        }
    }

    // ==============================================
    // Policy Parsing
    // ==============================================

    mod parsing {
        use super::*;

        #[test]
        fn names_are_case_insensitive() {
            assert_eq!(CachePolicy::parse("LRU", None).unwrap(), CachePolicy::Lru);
            assert_eq!(CachePolicy::parse(" Arc ", None).unwrap(), CachePolicy::Arc);
            assert_eq!(
                CachePolicy::parse("Random", None).unwrap(),
                CachePolicy::Random { seed: 0 }
            );
            assert!(CachePolicy::parse("lfu", None).is_err());
        }

        #[test]
        fn policy_params_are_applied() {
            assert_eq!(
                CachePolicy::parse("slru", Some("n-seg=2")).unwrap(),
                CachePolicy::Slru { n_seg: 2 }
            );
            assert_eq!(
                CachePolicy::parse("random", Some(" seed = 7 ,")).unwrap(),
                CachePolicy::Random { seed: 7 }
            );
        }

        #[test]
        fn bad_params_are_rejected() {
            assert!(CachePolicy::parse("lru", Some("seed=1")).is_err());
            assert!(CachePolicy::parse("slru", Some("n-seg")).is_err());
            assert!(CachePolicy::parse("slru", Some("n-seg=two")).is_err());
            assert!(CachePolicy::parse("random", Some("=3")).is_err());
        }

        #[test]
        fn display_includes_params() {
            assert_eq!(CachePolicy::Slru { n_seg: 3 }.to_string(), "slru(n-seg=3)");
            assert_eq!(CachePolicy::Mru.to_string(), "mru");
        }
    }

    // ==============================================
    // Factory
    // ==============================================

    mod factory {
        use super::*;

        #[test]
        fn test_all_policies_basic_ops() {
            for name in CachePolicy::NAMES {
                let mut cache = create_cache(name, CommonCacheParams::new(64), None).unwrap();
                assert!(cache.get(&Request::new(1, 4)).unwrap().is_miss());
                assert!(cache.get(&Request::new(1, 4)).unwrap().is_hit());
                assert!(cache.contains(1));
                for id in 2..100 {
                    cache.get(&Request::new(id, 4)).unwrap();
                    assert!(cache.occupied_size() <= 64, "{name} over capacity");
                }
                cache.check_invariants().unwrap();
            }
        }

        #[test]
        fn metadata_is_charged_only_when_requested() {
            let params = CommonCacheParams::new(1_000).with_per_obj_overhead(2);
            let plain = create_cache("arc", params, None).unwrap();
            let charged = create_cache("arc", params.with_obj_metadata(true), None).unwrap();
            assert_eq!(plain.per_obj_overhead(), 2);
            assert_eq!(charged.per_obj_overhead(), 2 + ArcCache::METADATA_SIZE);

            let random = create_cache("random", params.with_obj_metadata(true), None).unwrap();
            assert_eq!(random.per_obj_overhead(), 2);
        }

        #[test]
        fn test_capacity_enforcement() {
            let mut cache = CacheBuilder::new(2).try_build(CachePolicy::Lru).unwrap();
            for id in 1..=3 {
                cache.get(&Request::new(id, 1)).unwrap();
            }
            assert_eq!(cache.n_obj(), 2);
            assert!(!cache.contains(1));
            assert!(cache.contains(2));
            assert!(cache.contains(3));
        }

        #[test]
        fn invalid_configuration_is_an_error() {
            assert!(create_cache("lru", CommonCacheParams::new(0), None).is_err());
            assert!(create_cache("slru", CommonCacheParams::new(3), Some("n-seg=4")).is_err());
            assert!(
                CacheBuilder::new(10)
                    .hash_power(0)
                    .try_build(CachePolicy::Fifo)
                    .is_err()
            );
        }

        #[test]
        fn oversized_hash_power_is_an_error_not_an_abort() {
            for name in CachePolicy::NAMES {
                let params = CommonCacheParams::new(100).with_hash_power(40);
                assert!(create_cache(name, params, None).is_err(), "{name}");
            }
            let err = CacheBuilder::new(100)
                .hash_power(MAX_HASH_POWER + 1)
                .try_build(CachePolicy::Lru)
                .unwrap_err();
            assert!(err.to_string().contains("hash_power"));
        }
    }
}
