//! Eviction policies. Each one implements [`Cache`](crate::traits::Cache)
//! on top of a [`CacheCore`](crate::base::CacheCore).

pub mod arc;
pub mod fifo;
pub mod lru;
pub mod mru;
pub mod random;
pub mod slru;

pub use arc::ArcCache;
pub use fifo::FifoCache;
pub use lru::LruCache;
pub use mru::MruCache;
pub use random::RandomCache;
pub use slru::SlruCache;
