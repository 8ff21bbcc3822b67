//! Trace replay engine.
//!
//! Replays a trace against one or many caches and reports per-cache request
//! and byte miss statistics. Multi-cache runs fan out over a fixed pool of
//! scoped worker threads.
//!
//! ## Architecture
//!
//! ```text
//!   trace ──clone_reader()──► reader per worker
//!
//!   jobs:    [ Mutex<Option<Box<dyn Cache>>> ; n ]   taken once
//!   cursor:  AtomicUsize                             next job index
//!   results: [ OnceLock<SimulationResult> ; n ]      written once
//!
//!   ┌──────────── worker k ────────────┐
//!   │ loop {                           │
//!   │   i = cursor.fetch_add(1)        │
//!   │   cache = jobs[i].take()         │
//!   │   reader.reset()                 │
//!   │   results[i] = replay(cache)     │   panic → WorkerPanicked in slot i
//!   │ }                                │
//!   └──────────────────────────────────┘
//! ```
//!
//! Requests are replayed in trace order within a configuration; nothing is
//! ordered between configurations. Timestamps are rewritten relative to the
//! first request before they reach the cache.
//!
//! ## Warm-up
//!
//! Warm-up requests go through the cache but are excluded from the counters.
//! The warm-up phase lasts while the request index is below the request
//! budget or the normalised timestamp is below the duration.
//! [`Warmup::Trace`] instead replays a separate trace in full before the
//! measured trace starts; its timestamps are normalised to its own first
//! request.
//!
//! ## Example
//!
//! ```
//! use cachesim::builder::{CacheBuilder, CachePolicy};
//! use cachesim::simulator::{Warmup, linear_capacities, simulate_at_multi_sizes};
//! use cachesim::trace::MemoryTrace;
//!
//! let trace = MemoryTrace::from_ids((0..1_000).map(|i| i % 50));
//! let lru = CacheBuilder::new(10).try_build(CachePolicy::Lru).unwrap();
//! let sizes = linear_capacities(10, 60, 6).unwrap();
//! let results = simulate_at_multi_sizes(&trace, lru.as_ref(), &sizes, Warmup::None, 2).unwrap();
//!
//! // everything fits from 50 bytes on
//! assert_eq!(results[5].n_miss, 50);
//! assert!(results[0].miss_ratio() > results[5].miss_ratio());
//! ```
use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use log::{debug, error, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SimError};
use crate::trace::TraceReader;
use crate::traits::Cache;

/// Portion of the trace used to warm caches before counting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Warmup {
    #[default]
    None,
    /// The first `n` requests.
    Requests(u64),
    /// This fraction of the trace's request count.
    Fraction(f64),
    /// Requests within this much logical time of the first request.
    Duration(u64),
    /// Every request of a separate trace, replayed before the measured one.
    #[serde(skip)]
    Trace(Arc<dyn TraceReader + Sync>),
}

impl Warmup {
    pub fn trace<R: TraceReader + Sync + 'static>(reader: R) -> Self {
        Self::Trace(Arc::new(reader))
    }

    /// (request budget, time budget) within a measured trace of `n_req`
    /// requests.
    fn budgets(&self, n_req: u64) -> (u64, u64) {
        match *self {
            Self::None | Self::Trace(_) => (0, 0),
            Self::Requests(n) => (n, 0),
            Self::Fraction(f) if f > 1e-6 => (((n_req as f64) * f.min(1.0)) as u64, 0),
            Self::Fraction(_) => (0, 0),
            Self::Duration(t) => (0, t),
        }
    }
}

/// Outcome of replaying a trace against one cache.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulationResult {
    pub cache_name: String,
    pub capacity: u64,
    /// Counted requests; excludes warm-up.
    pub n_req: u64,
    pub n_miss: u64,
    pub n_req_byte: u64,
    pub n_miss_byte: u64,
    pub n_warmup_req: u64,
    /// Resident objects at the end of the run.
    pub n_obj: u64,
    pub occupied_size: u64,
    /// Normalised timestamp of the last replayed request.
    pub clock_time: u64,
    /// Set when the run was cut short.
    pub error: Option<SimError>,
}

impl SimulationResult {
    fn empty(cache_name: impl Into<String>, capacity: u64) -> Self {
        Self {
            cache_name: cache_name.into(),
            capacity,
            ..Self::default()
        }
    }

    fn failed(cache_name: impl Into<String>, capacity: u64, err: SimError) -> Self {
        Self {
            error: Some(err),
            ..Self::empty(cache_name, capacity)
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn miss_ratio(&self) -> f64 {
        ratio(self.n_miss, self.n_req)
    }

    pub fn byte_miss_ratio(&self) -> f64 {
        ratio(self.n_miss_byte, self.n_req_byte)
    }

    pub fn hit_ratio(&self) -> f64 {
        if self.n_req == 0 {
            0.0
        } else {
            1.0 - self.miss_ratio()
        }
    }

    pub fn byte_hit_ratio(&self) -> f64 {
        if self.n_req_byte == 0 {
            0.0
        } else {
            1.0 - self.byte_miss_ratio()
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Replays `reader` from its first request against `cache` on the calling
/// thread. Errors end the run and are recorded in the result.
pub fn simulate(
    reader: &mut dyn TraceReader,
    cache: &mut dyn Cache,
    warmup: Warmup,
) -> SimulationResult {
    let mut result = SimulationResult::empty(cache.name(), cache.capacity());
    if let Err(err) = replay(reader, cache, &warmup, &mut result) {
        error!(
            "{} @ {} aborted after {} requests: {err}",
            result.cache_name,
            result.capacity,
            result.n_warmup_req + result.n_req
        );
        result.error = Some(err);
    }
    result.n_obj = cache.n_obj();
    result.occupied_size = cache.occupied_size();
    result
}

fn replay(
    reader: &mut dyn TraceReader,
    cache: &mut dyn Cache,
    warmup: &Warmup,
    result: &mut SimulationResult,
) -> Result<(), SimError> {
    if let Warmup::Trace(trace) = warmup {
        let mut warm = trace.clone_reader();
        replay_warmup_trace(warm.as_mut(), cache, result)?;
    }

    reader.reset();
    let (warmup_req, warmup_time) = warmup.budgets(reader.count());

    let mut start_ts = None;
    let mut warming = warmup_req > 0 || warmup_time > 0;
    while let Some(mut req) = reader.read_one()? {
        let start = *start_ts.get_or_insert(req.clock_time);
        req.clock_time = req.clock_time.saturating_sub(start);
        result.clock_time = req.clock_time;

        if warming {
            warming = result.n_warmup_req < warmup_req || req.clock_time < warmup_time;
            if !warming {
                debug!(
                    "{} @ {} warmed up with {} requests",
                    result.cache_name, result.capacity, result.n_warmup_req
                );
            }
        }

        let outcome = cache.get(&req)?;
        if warming {
            result.n_warmup_req += 1;
            continue;
        }
        result.n_req += 1;
        result.n_req_byte += req.obj_size;
        if outcome.is_miss() {
            result.n_miss += 1;
            result.n_miss_byte += req.obj_size;
        }
    }
    Ok(())
}

fn replay_warmup_trace(
    reader: &mut dyn TraceReader,
    cache: &mut dyn Cache,
    result: &mut SimulationResult,
) -> Result<(), SimError> {
    let mut start_ts = None;
    while let Some(mut req) = reader.read_one()? {
        let start = *start_ts.get_or_insert(req.clock_time);
        req.clock_time = req.clock_time.saturating_sub(start);
        cache.get(&req)?;
        result.n_warmup_req += 1;
    }
    debug!(
        "{} @ {} warmed up from a separate trace with {} requests",
        result.cache_name, result.capacity, result.n_warmup_req
    );
    Ok(())
}

/// Replays the trace once per capacity, each against a fresh copy of
/// `prototype` resized with [`Cache::with_capacity`]. Results are in
/// `capacities` order.
pub fn simulate_at_multi_sizes(
    trace: &dyn TraceReader,
    prototype: &dyn Cache,
    capacities: &[u64],
    warmup: Warmup,
    threads: usize,
) -> Result<Vec<SimulationResult>, ConfigError> {
    if capacities.is_empty() {
        return Err(ConfigError::new("no cache capacities to simulate"));
    }
    let caches = capacities
        .iter()
        .map(|&capacity| prototype.with_capacity(capacity))
        .collect::<Result<Vec<_>, _>>()?;
    info!(
        "simulating {} at {} sizes ({} .. {})",
        prototype.name(),
        capacities.len(),
        capacities[0],
        capacities[capacities.len() - 1]
    );
    Ok(run_pool(trace, caches, warmup, threads))
}

/// Replays the trace against every cache in `caches`. Results are in
/// input order.
pub fn simulate_with_multi_caches(
    trace: &dyn TraceReader,
    caches: Vec<Box<dyn Cache>>,
    warmup: Warmup,
    threads: usize,
) -> Result<Vec<SimulationResult>, ConfigError> {
    if caches.is_empty() {
        return Err(ConfigError::new("no caches to simulate"));
    }
    info!("simulating {} caches", caches.len());
    Ok(run_pool(trace, caches, warmup, threads))
}

/// Worker count for `n_jobs` configurations; `0` asks for the hardware
/// concurrency.
pub fn effective_threads(threads: usize, n_jobs: usize) -> usize {
    let threads = if threads == 0 {
        thread::available_parallelism().map_or(1, NonZeroUsize::get)
    } else {
        threads
    };
    threads.min(n_jobs).max(1)
}

fn run_pool(
    trace: &dyn TraceReader,
    caches: Vec<Box<dyn Cache>>,
    warmup: Warmup,
    threads: usize,
) -> Vec<SimulationResult> {
    let n_jobs = caches.len();
    let labels: Vec<(String, u64)> = caches
        .iter()
        .map(|cache| (cache.name().to_owned(), cache.capacity()))
        .collect();
    let jobs: Vec<Mutex<Option<Box<dyn Cache>>>> =
        caches.into_iter().map(|cache| Mutex::new(Some(cache))).collect();
    let slots: Vec<OnceLock<SimulationResult>> = (0..n_jobs).map(|_| OnceLock::new()).collect();
    let cursor = AtomicUsize::new(0);
    let finished = AtomicUsize::new(0);

    let n_threads = effective_threads(threads, n_jobs);
    let readers: Vec<Box<dyn TraceReader>> =
        (0..n_threads).map(|_| trace.clone_reader()).collect();
    debug!("starting {n_threads} workers for {n_jobs} configurations");

    thread::scope(|scope| {
        for (worker, mut reader) in readers.into_iter().enumerate() {
            let (jobs, slots, labels) = (&jobs, &slots, &labels);
            let (cursor, finished, warmup) = (&cursor, &finished, &warmup);
            scope.spawn(move || {
                loop {
                    let idx = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(job) = jobs.get(idx) else {
                        break;
                    };
                    let Some(mut cache) = job.lock().take() else {
                        continue;
                    };
                    let (name, capacity) = &labels[idx];

                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        simulate(reader.as_mut(), cache.as_mut(), warmup.clone())
                    }));
                    let result = outcome.unwrap_or_else(|payload| {
                        let msg = panic_message(payload.as_ref());
                        error!("worker {worker}: {name} @ {capacity} panicked: {msg}");
                        SimulationResult::failed(
                            name.as_str(),
                            *capacity,
                            SimError::WorkerPanicked(msg),
                        )
                    });
                    let _ = slots[idx].set(result);

                    let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                    info!("{name} @ {capacity} done ({done}/{n_jobs})");
                }
            });
        }
    });

    slots
        .into_iter()
        .zip(labels)
        .map(|(slot, (name, capacity))| {
            slot.into_inner().unwrap_or_else(|| {
                SimulationResult::failed(
                    name,
                    capacity,
                    SimError::WorkerPanicked("no result recorded".to_owned()),
                )
            })
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// `n` capacities evenly spaced from `min` to `max` inclusive.
pub fn linear_capacities(min: u64, max: u64, n: usize) -> Result<Vec<u64>, ConfigError> {
    if n == 0 || min == 0 || min > max {
        return Err(ConfigError::new(format!(
            "invalid capacity range {min}..={max} with {n} points"
        )));
    }
    if n == 1 {
        return Ok(vec![max]);
    }
    let span = (max - min) as u128;
    let steps = (n - 1) as u128;
    Ok((0..n as u128)
        .map(|i| min + (span * i / steps) as u64)
        .collect())
}

/// `step, 2*step, ...` until `max` is covered.
pub fn step_capacities(max: u64, step: u64) -> Result<Vec<u64>, ConfigError> {
    if step == 0 || max == 0 {
        return Err(ConfigError::new(format!(
            "invalid step curve: max {max}, step {step}"
        )));
    }
    Ok((1..=max.div_ceil(step)).map(|i| i * step).collect())
}
