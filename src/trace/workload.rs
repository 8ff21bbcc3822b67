//! Synthetic request streams.
//!
//! Deterministic generators for tests, benchmarks and quick experiments
//! when no recorded trace is at hand. The same spec and seed always produce
//! the same stream.
//!
//! ```
//! use cachesim::trace::TraceReader;
//! use cachesim::trace::workload::{ObjectSize, Workload, WorkloadSpec};
//!
//! let spec = WorkloadSpec {
//!     universe: 1_000,
//!     workload: Workload::Zipfian { theta: 0.99 },
//!     seed: 42,
//!     size: ObjectSize::Fixed(4096),
//! };
//! let trace = spec.into_trace(10_000);
//! assert_eq!(trace.count(), 10_000);
//! ```
use std::hash::Hasher;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use super::MemoryTrace;
use crate::request::{ObjId, Request};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Workload {
    /// Uniform random ids in `[0, universe)`.
    Uniform,
    /// Hot/cold split with a configurable hot fraction and hot access probability.
    Hotset { hot_fraction: f64, hot_prob: f64 },
    /// Sequential scan in `[0, universe)`, wrapping around.
    Scan,
    /// Zipfian distribution - models real-world skewed access patterns.
    /// `theta` controls skew: 0.0 = uniform, 0.99 = highly skewed (YCSB default).
    Zipfian { theta: f64 },
}

/// How large each object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectSize {
    Fixed(u64),
    /// Per-object size in `[min, max]`, stable for the object across the
    /// stream.
    Range { min: u64, max: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    pub universe: u64,
    pub workload: Workload,
    pub seed: u64,
    pub size: ObjectSize,
}

impl WorkloadSpec {
    pub fn generator(self) -> WorkloadGenerator {
        WorkloadGenerator::new(self)
    }

    /// Materializes the first `n` requests.
    pub fn into_trace(self, n: usize) -> MemoryTrace {
        let mut generator = self.generator();
        (0..n).map(|_| generator.next_request()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct WorkloadGenerator {
    spec: WorkloadSpec,
    universe: u64,
    rng: SmallRng,
    scan_pos: u64,
    clock: u64,
    zipfian: Option<ZipfianState>,
}

impl WorkloadGenerator {
    pub fn new(spec: WorkloadSpec) -> Self {
        let universe = spec.universe.max(1);
        let zipfian = match spec.workload {
            Workload::Zipfian { theta } => Some(ZipfianState::new(universe, theta)),
            _ => None,
        };
        Self {
            spec,
            universe,
            rng: SmallRng::seed_from_u64(spec.seed),
            scan_pos: 0,
            clock: 0,
            zipfian,
        }
    }

    pub fn next_id(&mut self) -> ObjId {
        match self.spec.workload {
            Workload::Uniform => self.rng.random_range(0..self.universe),
            Workload::Hotset {
                hot_fraction,
                hot_prob,
            } => {
                let hot_fraction = hot_fraction.clamp(0.0, 1.0);
                let hot_prob = hot_prob.clamp(0.0, 1.0);
                let hot_size = ((self.universe as f64) * hot_fraction).round() as u64;
                let hot_size = hot_size.clamp(1, self.universe);
                if self.rng.random::<f64>() < hot_prob || hot_size == self.universe {
                    self.rng.random_range(0..hot_size)
                } else {
                    self.rng.random_range(hot_size..self.universe)
                }
            },
            Workload::Scan => {
                let id = self.scan_pos;
                self.scan_pos = (self.scan_pos + 1) % self.universe;
                id
            },
            Workload::Zipfian { .. } => {
                let u = self.rng.random::<f64>();
                match &self.zipfian {
                    Some(zipf) => zipf.sample(u),
                    None => 0,
                }
            },
        }
    }

    /// Next request; timestamps advance by one per request.
    pub fn next_request(&mut self) -> Request {
        let id = self.next_id();
        let req = Request::new(id, self.size_of(id)).at(self.clock);
        self.clock += 1;
        req
    }

    fn size_of(&self, id: ObjId) -> u64 {
        match self.spec.size {
            ObjectSize::Fixed(size) => size,
            ObjectSize::Range { min, max } if max > min => {
                let mut hasher = FxHasher::default();
                hasher.write_u64(self.spec.seed);
                hasher.write_u64(id);
                min + hasher.finish() % (max - min + 1)
            },
            ObjectSize::Range { min, .. } => min,
        }
    }
}

impl Iterator for WorkloadGenerator {
    type Item = Request;

    fn next(&mut self) -> Option<Request> {
        Some(self.next_request())
    }
}

/// Zipfian distribution state for inverse CDF sampling.
///
/// Uses the algorithm from YCSB (Yahoo Cloud Serving Benchmark).
/// Pre-computes zeta values for efficient sampling.
#[derive(Debug, Clone)]
struct ZipfianState {
    n: u64,
    theta: f64,
    zeta_n: f64,
    alpha: f64,
    eta: f64,
}

impl ZipfianState {
    fn new(n: u64, theta: f64) -> Self {
        let theta = theta.clamp(0.0, 0.9999);
        let zeta_2 = Self::zeta(2, theta);
        let zeta_n = Self::zeta(n, theta);
        let alpha = 1.0 / (1.0 - theta);
        let eta = (1.0 - (2.0 / n as f64).powf(1.0 - theta)) / (1.0 - zeta_2 / zeta_n);

        Self {
            n,
            theta,
            zeta_n,
            alpha,
            eta,
        }
    }

    /// zeta(n, theta) = sum(1/i^theta for i in 1..=n)
    fn zeta(n: u64, theta: f64) -> f64 {
        (1..=n).map(|i| 1.0 / (i as f64).powf(theta)).sum()
    }

    /// Sample given uniform `u` in [0, 1).
    fn sample(&self, u: f64) -> u64 {
        let uz = u * self.zeta_n;

        if uz < 1.0 {
            return 0;
        }

        if uz < 1.0 + 0.5_f64.powf(self.theta) {
            return 1.min(self.n - 1);
        }

        let spread = (self.n as f64) * (self.eta * u - self.eta + 1.0).powf(self.alpha);
        (spread as u64).min(self.n - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceReader;

    fn spec(workload: Workload) -> WorkloadSpec {
        WorkloadSpec {
            universe: 100,
            workload,
            seed: 7,
            size: ObjectSize::Fixed(1),
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let a: Vec<_> = spec(Workload::Uniform).generator().take(500).collect();
        let b: Vec<_> = spec(Workload::Uniform).generator().take(500).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|r| r.obj_id < 100));
    }

    #[test]
    fn scan_wraps_around() {
        let ids: Vec<_> = spec(Workload::Scan)
            .generator()
            .take(205)
            .map(|r| r.obj_id)
            .collect();
        assert_eq!(&ids[..3], &[0, 1, 2]);
        assert_eq!(ids[100], 0);
        assert_eq!(ids[204], 4);
    }

    #[test]
    fn hotset_concentrates_accesses() {
        let hot = spec(Workload::Hotset {
            hot_fraction: 0.1,
            hot_prob: 0.9,
        })
        .generator()
        .take(10_000)
        .filter(|r| r.obj_id < 10)
        .count();
        assert!(hot > 8_000, "hot accesses: {hot}");
    }

    #[test]
    fn zipfian_favors_low_ids() {
        let reqs: Vec<_> = spec(Workload::Zipfian { theta: 0.99 })
            .generator()
            .take(10_000)
            .collect();
        let head = reqs.iter().filter(|r| r.obj_id < 10).count();
        assert!(head > 4_000, "head accesses: {head}");
        assert!(reqs.iter().all(|r| r.obj_id < 100));
    }

    #[test]
    fn ranged_sizes_are_stable_per_object() {
        let mut generator = WorkloadSpec {
            size: ObjectSize::Range { min: 10, max: 20 },
            ..spec(Workload::Uniform)
        }
        .generator();
        let mut seen = std::collections::HashMap::new();
        for _ in 0..2_000 {
            let req = generator.next_request();
            assert!((10..=20).contains(&req.obj_size));
            assert_eq!(*seen.entry(req.obj_id).or_insert(req.obj_size), req.obj_size);
        }
    }

    #[test]
    fn into_trace_timestamps_by_position() {
        let trace = spec(Workload::Uniform).into_trace(50);
        assert_eq!(trace.count(), 50);
        let times: Vec<_> = trace.requests().iter().map(|r| r.clock_time).collect();
        assert_eq!(times, (0..50).collect::<Vec<_>>());
    }
}
