//! Trace request records.
//!
//! A [`Request`] is one access in a trace: which object, how many bytes, and
//! when. Requests are produced lazily by a
//! [`TraceReader`](crate::trace::TraceReader) and consumed by a cache; the
//! engine never keeps them beyond a single pass.
//!
//! ```
//! use cachesim::request::Request;
//!
//! let req = Request::new(42, 4096).at(1_000).with_ttl(60);
//! assert_eq!(req.obj_id, 42);
//! assert_eq!(req.ttl, Some(60));
//! assert!(req.valid);
//! ```
use serde::{Deserialize, Serialize};

/// Object identifier.
pub type ObjId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    pub obj_id: ObjId,
    pub obj_size: u64,
    /// Logical or physical timestamp. The simulator rewrites it relative to
    /// the first request of the trace.
    pub clock_time: u64,
    /// An invalid request marks the end of the trace.
    pub valid: bool,
    pub ttl: Option<u64>,
    /// Virtual time of the next access to the same object, when the trace
    /// carries it.
    pub next_access_vtime: Option<u64>,
}

impl Request {
    pub fn new(obj_id: ObjId, obj_size: u64) -> Self {
        Self {
            obj_id,
            obj_size,
            clock_time: 0,
            valid: true,
            ttl: None,
            next_access_vtime: None,
        }
    }

    /// End-of-trace marker.
    pub fn invalid() -> Self {
        Self {
            valid: false,
            ..Self::new(0, 0)
        }
    }

    #[must_use]
    pub fn at(mut self, clock_time: u64) -> Self {
        self.clock_time = clock_time;
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_next_access(mut self, vtime: u64) -> Self {
        self.next_access_vtime = Some(vtime);
        self
    }
}
