//! Trace sources.
//!
//! The simulator pulls requests through [`TraceReader`]. Parsing on-disk
//! trace formats is left to external readers; this crate ships
//! [`MemoryTrace`], a shared in-memory request sequence, and synthetic
//! [workloads](workload).
//!
//! ```
//! use cachesim::request::Request;
//! use cachesim::trace::{MemoryTrace, TraceReader};
//!
//! let mut trace = MemoryTrace::new(vec![Request::new(1, 10), Request::new(2, 20)]);
//! let mut copy = trace.clone_reader();
//! assert_eq!(trace.read_one().unwrap().map(|r| r.obj_id), Some(1));
//! assert_eq!(copy.count(), 2);
//! ```
use std::fmt;
use std::sync::Arc;

use crate::error::TraceError;
use crate::request::Request;

pub mod workload;

/// A resettable, clonable request stream.
///
/// `read_one` yields `Ok(None)` at the end of the trace; a request with
/// `valid == false` also ends it. Each simulation worker owns its own
/// reader obtained from [`clone_reader`](TraceReader::clone_reader).
pub trait TraceReader: Send + fmt::Debug {
    fn read_one(&mut self) -> Result<Option<Request>, TraceError>;

    /// Rewinds to the first request.
    fn reset(&mut self);

    /// Number of requests `read_one` yields from the start, stopping at the
    /// first invalid record.
    fn count(&self) -> u64;

    /// An independent reader over the same trace, positioned at the start.
    fn clone_reader(&self) -> Box<dyn TraceReader>;
}

/// Requests held in memory and shared between readers.
#[derive(Clone)]
pub struct MemoryTrace {
    requests: Arc<[Request]>,
    /// Records before the first invalid one.
    readable: usize,
    pos: usize,
}

impl MemoryTrace {
    pub fn new(requests: impl Into<Arc<[Request]>>) -> Self {
        let requests: Arc<[Request]> = requests.into();
        let readable = requests.iter().take_while(|req| req.valid).count();
        Self {
            requests,
            readable,
            pos: 0,
        }
    }

    /// Unit-sized requests for `ids`, timestamped by position.
    pub fn from_ids(ids: impl IntoIterator<Item = u64>) -> Self {
        let requests: Vec<Request> = ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| Request::new(id, 1).at(i as u64))
            .collect();
        Self::new(requests)
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Stored records, including any after an invalid one.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl TraceReader for MemoryTrace {
    fn read_one(&mut self) -> Result<Option<Request>, TraceError> {
        if self.pos >= self.readable {
            return Ok(None);
        }
        let req = self.requests.get(self.pos).copied();
        self.pos += 1;
        Ok(req)
    }

    fn reset(&mut self) {
        self.pos = 0;
    }

    fn count(&self) -> u64 {
        self.readable as u64
    }

    fn clone_reader(&self) -> Box<dyn TraceReader> {
        Box::new(Self {
            requests: Arc::clone(&self.requests),
            readable: self.readable,
            pos: 0,
        })
    }
}

impl fmt::Debug for MemoryTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTrace")
            .field("len", &self.requests.len())
            .field("readable", &self.readable)
            .field("pos", &self.pos)
            .finish()
    }
}

impl FromIterator<Request> for MemoryTrace {
    fn from_iter<I: IntoIterator<Item = Request>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect::<Vec<_>>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(reader: &mut dyn TraceReader) -> Vec<u64> {
        let mut ids = Vec::new();
        while let Some(req) = reader.read_one().unwrap() {
            ids.push(req.obj_id);
        }
        ids
    }

    #[test]
    fn reads_in_order_then_ends() {
        let mut trace = MemoryTrace::from_ids([3, 1, 2]);
        assert_eq!(drain(&mut trace), vec![3, 1, 2]);
        assert!(trace.read_one().unwrap().is_none());
        trace.reset();
        assert_eq!(drain(&mut trace), vec![3, 1, 2]);
    }

    #[test]
    fn invalid_request_ends_the_trace() {
        let mut trace = MemoryTrace::new(vec![
            Request::new(1, 1),
            Request::invalid(),
            Request::new(2, 1),
        ]);
        assert_eq!(drain(&mut trace), vec![1]);
        assert_eq!(trace.count(), 1);
        assert_eq!(trace.len(), 3);
    }

    #[test]
    fn count_matches_replayable_requests() {
        let mut requests: Vec<Request> = (0..10).map(|id| Request::new(id, 1)).collect();
        requests[6] = Request::invalid();
        let mut trace = MemoryTrace::new(requests);
        let replayed = drain(&mut trace).len() as u64;
        assert_eq!(trace.count(), replayed);
        assert_eq!(trace.clone_reader().count(), 6);
        assert_eq!(MemoryTrace::new(vec![Request::invalid()]).count(), 0);
    }

    #[test]
    fn cloned_readers_are_independent() {
        let mut trace = MemoryTrace::from_ids(0..5);
        trace.read_one().unwrap();
        let mut copy = trace.clone_reader();
        assert_eq!(drain(copy.as_mut()), vec![0, 1, 2, 3, 4]);
        assert_eq!(drain(&mut trace), vec![1, 2, 3, 4]);
    }
}
