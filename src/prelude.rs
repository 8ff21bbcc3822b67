pub use crate::admission::{Admission, AdmissionPolicy, ProbabilisticAdmission};
pub use crate::base::CheckResult;
pub use crate::builder::{CacheBuilder, CachePolicy, CommonCacheParams, create_cache};
pub use crate::error::{CacheError, ConfigError, InvariantError, SimError, TraceError};
pub use crate::object::CacheObject;
pub use crate::policy::{ArcCache, FifoCache, LruCache, MruCache, RandomCache, SlruCache};
pub use crate::request::{ObjId, Request};
pub use crate::simulator::{
    SimulationResult, Warmup, linear_capacities, simulate, simulate_at_multi_sizes,
    simulate_with_multi_caches, step_capacities,
};
pub use crate::trace::{MemoryTrace, TraceReader};
pub use crate::traits::Cache;
