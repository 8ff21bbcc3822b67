//! Eviction-order queues threaded through the object store.
//!
//! An [`ObjectQueue`] is a doubly linked list whose nodes are the resident
//! `CacheObject`s themselves: the links live in each object and the queue
//! only remembers head, tail and length. Several queues can share one store
//! (ARC keeps T1 and T2 this way); each object is linked into at most one.
//!
//! ```text
//!   head (MRU / newest)                            tail (LRU / oldest)
//!     │                                                │
//!     ▼                                                ▼
//!   [obj 9] ◄──► [obj 2] ◄──► [obj 7] ◄──► [obj 4]
//! ```
//!
//! Every mutating method borrows the store mutably for the duration of the
//! call, so a queue never holds references into it.
use crate::ds::intrusive_list::ListAnchor;
use crate::ds::slot_arena::SlotId;
use crate::error::InvariantError;
use crate::object::CacheObject;
use crate::request::ObjId;
use crate::store::hashtable::ObjectStore;

#[derive(Debug, Default)]
pub struct ObjectQueue {
    anchor: ListAnchor,
}

impl ObjectQueue {
    pub fn new() -> Self {
        Self {
            anchor: ListAnchor::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.anchor.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.anchor.is_empty()
    }

    /// Most recently inserted or promoted object.
    #[inline]
    pub fn head(&self) -> Option<SlotId> {
        self.anchor.front()
    }

    /// Oldest object.
    #[inline]
    pub fn tail(&self) -> Option<SlotId> {
        self.anchor.back()
    }

    #[inline]
    pub fn push_head(&mut self, store: &mut ObjectStore, id: SlotId) -> bool {
        self.anchor.push_front(store.arena_mut(), id)
    }

    #[inline]
    pub fn push_tail(&mut self, store: &mut ObjectStore, id: SlotId) -> bool {
        self.anchor.push_back(store.arena_mut(), id)
    }

    #[inline]
    pub fn unlink(&mut self, store: &mut ObjectStore, id: SlotId) -> bool {
        self.anchor.unlink(store.arena_mut(), id)
    }

    #[inline]
    pub fn move_to_head(&mut self, store: &mut ObjectStore, id: SlotId) -> bool {
        self.anchor.move_to_front(store.arena_mut(), id)
    }

    #[inline]
    pub fn contains(&self, store: &ObjectStore, id: SlotId) -> bool {
        self.anchor.is_linked(store.arena(), id)
    }

    /// Objects from head to tail.
    pub fn iter<'a>(
        &self,
        store: &'a ObjectStore,
    ) -> impl Iterator<Item = (SlotId, &'a CacheObject)> + 'a {
        self.anchor.iter(store.arena())
    }

    /// Object ids from head to tail.
    pub fn ids(&self, store: &ObjectStore) -> Vec<ObjId> {
        self.iter(store).map(|(_, obj)| obj.obj_id).collect()
    }

    pub fn validate(&self, store: &ObjectStore) -> Result<(), InvariantError> {
        self.anchor.validate(store.arena())
    }
}
