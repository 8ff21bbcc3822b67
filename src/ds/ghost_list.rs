//! Byte-weighted recency list for ghost entries.
//!
//! Used by adaptive policies (ARC) to remember recently evicted objects
//! without keeping them resident. Each entry carries the byte charge the
//! object had when it left the cache; the list tracks the total so the policy
//! can balance ghost bytes against resident bytes. Implemented as an
//! `IntrusiveList` plus an index.
//!
//! ## Architecture
//!
//! ```text
//!   index: FxHashMap<ObjId, SlotId>    list: IntrusiveList<Ghost>
//!   ┌─────────┬─────────┐              head ─► [A,40] ◄──► [B,10] ◄── tail
//!   │  obj A  │  id_1   │                 MRU                  LRU
//!   │  obj B  │  id_2   │
//!   └─────────┴─────────┘              bytes = 50
//! ```
//!
//! ## Behavior
//! - `record(id, bytes)`: pushes at MRU (replacing an existing entry)
//! - `remove(id)`: deletes from list and index, returns the recorded bytes
//! - `pop_lru()`: drops the oldest entry
//!
//! The list is unbounded; the owning policy decides when to trim it.
use rustc_hash::FxHashMap;

use crate::ds::intrusive_list::IntrusiveList;
use crate::ds::slot_arena::SlotId;
use crate::error::InvariantError;
use crate::request::ObjId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ghost {
    pub obj_id: ObjId,
    pub bytes: u64,
}

#[derive(Debug, Default)]
pub struct GhostList {
    list: IntrusiveList<Ghost>,
    index: FxHashMap<ObjId, SlotId>,
    bytes: u64,
}

impl GhostList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ghost entries.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Sum of the recorded byte charges.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn contains(&self, obj_id: ObjId) -> bool {
        self.index.contains_key(&obj_id)
    }

    /// Records `obj_id` as the most recent ghost.
    pub fn record(&mut self, obj_id: ObjId, bytes: u64) {
        self.remove(obj_id);
        let id = self.list.push_front(Ghost { obj_id, bytes });
        self.index.insert(obj_id, id);
        self.bytes += bytes;
    }

    /// Removes `obj_id`; returns its recorded bytes if it was present.
    pub fn remove(&mut self, obj_id: ObjId) -> Option<u64> {
        let id = self.index.remove(&obj_id)?;
        let ghost = self.list.remove(id)?;
        self.bytes -= ghost.bytes;
        Some(ghost.bytes)
    }

    /// Drops the least recently recorded ghost.
    pub fn pop_lru(&mut self) -> Option<Ghost> {
        let ghost = self.list.pop_back()?;
        self.index.remove(&ghost.obj_id);
        self.bytes -= ghost.bytes;
        Some(ghost)
    }

    pub fn clear(&mut self) {
        self.list.clear();
        self.index.clear();
        self.bytes = 0;
    }

    /// Ghost ids from most to least recent.
    pub fn ids(&self) -> impl Iterator<Item = ObjId> + '_ {
        self.list.iter().map(|ghost| ghost.obj_id)
    }

    pub fn validate(&self) -> Result<(), InvariantError> {
        self.list.validate()?;
        if self.list.len() != self.index.len() {
            return Err(InvariantError::new(format!(
                "ghost list has {} entries but index has {}",
                self.list.len(),
                self.index.len()
            )));
        }
        let total: u64 = self.list.iter().map(|ghost| ghost.bytes).sum();
        if total != self.bytes {
            return Err(InvariantError::new(format!(
                "ghost bytes drifted: recorded {}, actual {total}",
                self.bytes
            )));
        }
        for (obj_id, &id) in &self.index {
            match self.list.get(id) {
                Some(ghost) if ghost.obj_id == *obj_id => {},
                _ => {
                    return Err(InvariantError::new(format!(
                        "ghost index entry {obj_id} points at a foreign node"
                    )));
                },
            }
        }
        Ok(())
    }
}
