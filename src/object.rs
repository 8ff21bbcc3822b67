//! Resident object metadata.
//!
//! A [`CacheObject`] exists for every object currently resident in a cache.
//! It lives in the [`ObjectStore`](crate::store::ObjectStore) arena and is
//! threaded onto two kinds of lists at once:
//!
//! ```text
//!   bucket[h] ─► obj ─hash_next─► obj ─► None        (store chain)
//!   queue.head ─► obj ◄─links─► obj ◄─► obj ◄─ tail   (policy order)
//! ```
//!
//! Both links are arena `SlotId`s. Policies keep their per-object state in
//! the typed [`PolicyExt`] instead of an untyped blob.
//!
//! Values handed out by `evict`/`to_evict`/`insert` are owned copies with all
//! links cleared ([`CacheObject::detached`]).
use crate::ds::intrusive_list::{Linked, Links};
use crate::ds::slot_arena::SlotId;
use crate::request::{ObjId, Request};

/// Which ARC resident list an object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArcList {
    /// Seen once since admission.
    T1,
    /// Seen at least twice.
    T2,
}

/// Per-policy object state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PolicyExt {
    #[default]
    None,
    /// Segment index for segmented policies.
    Segment(u8),
    Arc(ArcList),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheObject {
    pub obj_id: ObjId,
    pub obj_size: u64,
    pub create_time: u64,
    pub last_access_time: u64,
    /// Absolute expiry time; `None` never expires.
    pub exp_time: Option<u64>,
    pub ext: PolicyExt,
    pub(crate) hash_next: Option<SlotId>,
    pub(crate) links: Links,
}

impl CacheObject {
    pub fn from_request(req: &Request) -> Self {
        Self {
            obj_id: req.obj_id,
            obj_size: req.obj_size,
            create_time: req.clock_time,
            last_access_time: req.clock_time,
            exp_time: None,
            ext: PolicyExt::None,
            hash_next: None,
            links: Links::default(),
        }
    }

    /// An expired object is one whose expiry time lies strictly in the past.
    #[inline]
    pub fn is_expired(&self, now: u64) -> bool {
        self.exp_time.is_some_and(|exp| exp < now)
    }

    /// Owned copy with store and queue links cleared.
    pub fn detached(&self) -> Self {
        Self {
            hash_next: None,
            links: Links::default(),
            ..self.clone()
        }
    }

    /// Rebuilds a request that re-admits this object at `now`, keeping the
    /// remaining lifetime. Used when segmented policies move objects between
    /// sub-caches.
    pub fn to_request(&self, now: u64) -> Request {
        let mut req = Request::new(self.obj_id, self.obj_size).at(now);
        req.ttl = self.exp_time.map(|exp| exp.saturating_sub(now));
        req
    }
}

impl Linked for CacheObject {
    #[inline]
    fn links(&self) -> &Links {
        &self.links
    }

    #[inline]
    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}
