//! Admission control.
//!
//! An admitter decides whether a missed object may enter the cache at all.
//! It runs before the size check in [`get_base`](crate::base::get_base); an
//! object it rejects is counted as a miss and never becomes resident, so no
//! eviction happens on its behalf.
//!
//! Admitters are configured per cache through
//! [`CommonCacheParams::admission`](crate::builder::CommonCacheParams) and
//! rebuilt from that configuration whenever a cache is cloned at a new
//! capacity, so every configuration of a multi-size run starts from the same
//! generator state.
//!
//! ## Example Usage
//!
//! ```rust
//! use cachesim::admission::AdmissionPolicy;
//! use cachesim::builder::{CacheBuilder, CachePolicy};
//! use cachesim::request::Request;
//!
//! let admission = AdmissionPolicy::parse("prob", Some("prob=0.25,seed=3")).unwrap();
//! let mut cache = CacheBuilder::new(1_000)
//!     .admission(admission)
//!     .try_build(CachePolicy::Lru)
//!     .unwrap();
//! for id in 0..100 {
//!     cache.get(&Request::new(id, 1)).unwrap();
//! }
//! assert!(cache.n_obj() < 50);
//! ```
use std::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::builder::{parse_policy_params, parse_value};
use crate::error::ConfigError;
use crate::request::Request;

/// Decides whether a missed request is admitted.
pub trait Admission: Send + fmt::Debug {
    fn name(&self) -> &str;

    fn admit(&mut self, req: &Request) -> bool;
}

/// Serializable admission configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionPolicy {
    /// Admit each miss independently with probability `prob`.
    Probabilistic { prob: f64, seed: u64 },
}

impl AdmissionPolicy {
    pub const DEFAULT_PROB: f64 = 0.5;

    /// Resolves a case-insensitive admitter name (`prob` or `probabilistic`)
    /// and its `key=value` parameters (`prob`, `seed`).
    pub fn parse(name: &str, params: Option<&str>) -> Result<Self, ConfigError> {
        let mut policy = match name.trim().to_ascii_lowercase().as_str() {
            "prob" | "probabilistic" => Self::Probabilistic {
                prob: Self::DEFAULT_PROB,
                seed: 0,
            },
            other => {
                return Err(ConfigError::new(format!(
                    "unknown admission algorithm '{other}'"
                )));
            },
        };
        for (key, value) in parse_policy_params(params.unwrap_or(""))? {
            match (&mut policy, key) {
                (Self::Probabilistic { prob, .. }, "prob") => *prob = parse_value(key, value)?,
                (Self::Probabilistic { seed, .. }, "seed") => *seed = parse_value(key, value)?,
                (_, key) => {
                    return Err(ConfigError::new(format!(
                        "admission does not take parameter '{key}'"
                    )));
                },
            }
        }
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Probabilistic { prob, .. } if prob > 0.0 && prob <= 1.0 => Ok(()),
            Self::Probabilistic { prob, .. } => Err(ConfigError::new(format!(
                "admission probability must be in (0, 1], got {prob}"
            ))),
        }
    }

    /// A fresh admitter in its initial state.
    pub fn build(&self) -> Result<Box<dyn Admission>, ConfigError> {
        self.validate()?;
        Ok(match *self {
            Self::Probabilistic { prob, seed } => Box::new(ProbabilisticAdmission::new(prob, seed)),
        })
    }
}

impl fmt::Display for AdmissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probabilistic { prob, seed } => write!(f, "prob(prob={prob},seed={seed})"),
        }
    }
}

/// Admits with a fixed probability drawn from a seeded generator.
#[derive(Debug, Clone)]
pub struct ProbabilisticAdmission {
    prob: f64,
    rng: SmallRng,
}

impl ProbabilisticAdmission {
    pub fn new(prob: f64, seed: u64) -> Self {
        Self {
            prob,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn prob(&self) -> f64 {
        self.prob
    }
}

impl Admission for ProbabilisticAdmission {
    fn name(&self) -> &str {
        "prob"
    }

    #[inline]
    fn admit(&mut self, _req: &Request) -> bool {
        self.rng.random::<f64>() < self.prob
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==============================================
    // Configuration
    // ==============================================

    mod configuration {
        use super::*;

        #[test]
        fn parse_defaults_and_params() {
            assert_eq!(
                AdmissionPolicy::parse("Prob", None).unwrap(),
                AdmissionPolicy::Probabilistic { prob: 0.5, seed: 0 }
            );
            assert_eq!(
                AdmissionPolicy::parse("probabilistic", Some("prob=0.1, seed=9")).unwrap(),
                AdmissionPolicy::Probabilistic { prob: 0.1, seed: 9 }
            );
        }

        #[test]
        fn bad_configuration_is_rejected() {
            assert!(AdmissionPolicy::parse("adaptsize", None).is_err());
            assert!(AdmissionPolicy::parse("prob", Some("prob=0")).is_err());
            assert!(AdmissionPolicy::parse("prob", Some("prob=1.5")).is_err());
            assert!(AdmissionPolicy::parse("prob", Some("size=3")).is_err());
            assert!(AdmissionPolicy::Probabilistic { prob: -1.0, seed: 0 }.build().is_err());
        }

        #[test]
        fn serde_round_trip() {
            let policy = AdmissionPolicy::Probabilistic { prob: 0.3, seed: 4 };
            let json = serde_json::to_string(&policy).unwrap();
            assert_eq!(serde_json::from_str::<AdmissionPolicy>(&json).unwrap(), policy);
        }
    }

    // ==============================================
    // Probabilistic Admission
    // ==============================================

    mod probabilistic {
        use super::*;

        fn admitted(admitter: &mut dyn Admission, n: u64) -> usize {
            (0..n).filter(|&id| admitter.admit(&Request::new(id, 1))).count()
        }

        #[test]
        fn admission_rate_tracks_probability() {
            let mut admitter = ProbabilisticAdmission::new(0.3, 1);
            let n = admitted(&mut admitter, 10_000);
            assert!((2_700..3_300).contains(&n), "admitted {n}");
        }

        #[test]
        fn probability_one_admits_everything() {
            let mut admitter = ProbabilisticAdmission::new(1.0, 1);
            assert_eq!(admitted(&mut admitter, 1_000), 1_000);
        }

        #[test]
        fn same_seed_same_decisions() {
            let policy = AdmissionPolicy::Probabilistic { prob: 0.5, seed: 11 };
            let mut a = policy.build().unwrap();
            let mut b = policy.build().unwrap();
            let req = Request::new(1, 1);
            let left: Vec<_> = (0..200).map(|_| a.admit(&req)).collect();
            let right: Vec<_> = (0..200).map(|_| b.admit(&req)).collect();
            assert_eq!(left, right);
            assert_eq!(a.name(), "prob");
        }
    }
}
