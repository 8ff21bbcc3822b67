//! cachesim: trace-driven cache simulation.
//!
//! Replays request traces against simulated caches (LRU, MRU, FIFO, Random,
//! SLRU, ARC) and reports request and byte miss ratios, one configuration
//! at a time or as miss-ratio curves computed on a worker pool.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod admission;
pub mod base;
pub mod builder;
pub mod ds;
pub mod error;
pub mod logging;
pub mod object;
pub mod policy;
pub mod prelude;
pub mod request;
pub mod simulator;
pub mod store;
pub mod trace;
pub mod traits;
