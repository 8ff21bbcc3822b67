//! Error types for the cachesim library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: invalid cache or simulation configuration (zero
//!   capacity, unknown policy, bad policy parameters). Recoverable: returned
//!   before any work starts.
//! - [`InvariantError`]: an internal accounting or structural invariant was
//!   violated (occupancy drift, evicting from an empty cache, double insert).
//! - [`CacheError`]: error type of every fallible [`Cache`](crate::traits::Cache)
//!   operation.
//! - [`TraceError`]: the trace source failed to produce a request.
//! - [`SimError`]: per-configuration failure recorded in a
//!   [`SimulationResult`](crate::simulator::SimulationResult) slot.
//!
//! ## Example Usage
//!
//! ```
//! use cachesim::builder::{CacheBuilder, CachePolicy};
//! use cachesim::error::ConfigError;
//!
//! let bad: Result<_, ConfigError> = CacheBuilder::new(0).try_build(CachePolicy::Lru);
//! assert!(bad.unwrap_err().to_string().contains("capacity"));
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{0}")]
pub struct InvariantError(String);

impl InvariantError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`create_cache`](crate::builder::create_cache),
/// [`CacheBuilder::try_build`](crate::builder::CacheBuilder::try_build) and
/// policy constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{0}")]
pub struct ConfigError(String);

impl ConfigError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CacheError {
    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] InvariantError),
}

impl CacheError {
    /// Shorthand for an [`InvariantViolation`](CacheError::InvariantViolation).
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(InvariantError::new(msg))
    }
}

// ---------------------------------------------------------------------------
// TraceError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TraceError {
    #[error("malformed record {index}: {reason}")]
    Malformed { index: u64, reason: String },
    #[error("trace truncated after {index} records")]
    Truncated { index: u64 },
    #[error("trace i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TraceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// SimError
// ---------------------------------------------------------------------------

/// Failure of one simulation configuration. Sibling configurations are
/// unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SimError {
    #[error(transparent)]
    Invariant(#[from] CacheError),
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
