//! Object storage: the chained hashtable that owns resident objects and the
//! eviction-order queues threaded through it.

pub mod hashtable;
pub mod queue;

pub use hashtable::{DEFAULT_HASH_POWER, MAX_HASH_POWER, MIN_HASH_POWER, ObjectStore};
pub use queue::ObjectQueue;
