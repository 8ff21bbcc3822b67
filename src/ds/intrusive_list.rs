//! Intrusive doubly linked lists over a `SlotArena`.
//!
//! Nodes carry their own [`Links`] and are addressed by `SlotId`, so a list
//! is nothing more than a [`ListAnchor`] (head, tail, length) plus an arena the
//! caller lends to every operation. Several anchors may thread disjoint subsets
//! of one arena; this is how the object store hosts both ARC resident lists.
//! Every anchor carries a process-unique tag that linked nodes record, so an
//! anchor never mistakes another anchor's node for its own.
//!
//! ## Architecture
//!
//! ```text
//!   arena (SlotArena<N: Linked>)
//!   ┌────────┬─────────────────────────────────────────────┐
//!   │ SlotId │ N { .., links: { prev, next } }             │
//!   ├────────┼─────────────────────────────────────────────┤
//!   │ id_1   │ { value: A, prev: None, next: Some(id_2) }  │
//!   │ id_2   │ { value: B, prev: Some(id_1), next: id_3 }  │
//!   │ id_3   │ { value: C, prev: Some(id_2), next: None }  │
//!   └────────┴─────────────────────────────────────────────┘
//!
//!   anchor.head ─► [id_1] ◄──► [id_2] ◄──► [id_3] ◄── anchor.tail
//! ```
//!
//! [`IntrusiveList`] bundles an anchor with an owned arena for callers that
//! just want a list of values (ghost lists).
//!
//! ## Operations
//! - `push_front` / `push_back`: attach an unlinked node
//! - `unlink(id)`: detach, the node stays in the arena
//! - `move_to_front(id)` / `move_to_back(id)`: detach + attach
//!
//! All operations are O(1) except iteration and `validate`.
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ds::slot_arena::{SlotArena, SlotId};
use crate::error::InvariantError;

/// Prev/next links embedded in a list node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Links {
    pub prev: Option<SlotId>,
    pub next: Option<SlotId>,
    /// Tag of the owning anchor; 0 when unlinked.
    owner: u32,
}

impl Links {
    #[inline]
    pub fn is_unlinked(&self) -> bool {
        self.owner == 0
    }
}

static NEXT_ANCHOR_TAG: AtomicU32 = AtomicU32::new(1);

/// A value that can be threaded onto a [`ListAnchor`].
pub trait Linked {
    fn links(&self) -> &Links;
    fn links_mut(&mut self) -> &mut Links;
}

/// Head/tail/length of one list threaded through a shared arena.
#[derive(Debug)]
pub struct ListAnchor {
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
    tag: u32,
}

impl ListAnchor {
    pub fn new() -> Self {
        // tag 0 marks unlinked nodes
        let mut tag = NEXT_ANCHOR_TAG.fetch_add(1, Ordering::Relaxed);
        if tag == 0 {
            tag = NEXT_ANCHOR_TAG.fetch_add(1, Ordering::Relaxed);
        }
        Self {
            head: None,
            tail: None,
            len: 0,
            tag,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn front(&self) -> Option<SlotId> {
        self.head
    }

    #[inline]
    pub fn back(&self) -> Option<SlotId> {
        self.tail
    }

    /// Returns `true` if `id` is linked into this list, as opposed to being
    /// unlinked or a member of another anchor over the same arena.
    #[inline]
    pub fn is_linked<N: Linked>(&self, arena: &SlotArena<N>, id: SlotId) -> bool {
        arena.get(id).is_some_and(|node| node.links().owner == self.tag)
    }

    /// Attaches an unlinked node at the head. Returns `false` if `id` is not
    /// in the arena.
    pub fn push_front<N: Linked>(&mut self, arena: &mut SlotArena<N>, id: SlotId) -> bool {
        let old_head = self.head;
        match arena.get_mut(id) {
            Some(node) => {
                *node.links_mut() = Links {
                    prev: None,
                    next: old_head,
                    owner: self.tag,
                }
            },
            None => return false,
        }
        match old_head.and_then(|h| arena.get_mut(h)) {
            Some(head) => head.links_mut().prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        self.len += 1;
        true
    }

    /// Attaches an unlinked node at the tail.
    pub fn push_back<N: Linked>(&mut self, arena: &mut SlotArena<N>, id: SlotId) -> bool {
        let old_tail = self.tail;
        match arena.get_mut(id) {
            Some(node) => {
                *node.links_mut() = Links {
                    prev: old_tail,
                    next: None,
                    owner: self.tag,
                }
            },
            None => return false,
        }
        match old_tail.and_then(|t| arena.get_mut(t)) {
            Some(tail) => tail.links_mut().next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
        true
    }

    /// Detaches `id` from this list, clearing its links. Returns `false` if
    /// the node is not a member.
    pub fn unlink<N: Linked>(&mut self, arena: &mut SlotArena<N>, id: SlotId) -> bool {
        if !self.is_linked(arena, id) {
            return false;
        }
        let Links { prev, next, .. } = match arena.get_mut(id) {
            Some(node) => std::mem::take(node.links_mut()),
            None => return false,
        };

        match prev.and_then(|p| arena.get_mut(p)) {
            Some(prev_node) => prev_node.links_mut().next = next,
            None => self.head = next,
        }
        match next.and_then(|n| arena.get_mut(n)) {
            Some(next_node) => next_node.links_mut().prev = prev,
            None => self.tail = prev,
        }
        self.len -= 1;
        true
    }

    pub fn move_to_front<N: Linked>(&mut self, arena: &mut SlotArena<N>, id: SlotId) -> bool {
        if self.head == Some(id) {
            return true;
        }
        self.unlink(arena, id) && self.push_front(arena, id)
    }

    pub fn move_to_back<N: Linked>(&mut self, arena: &mut SlotArena<N>, id: SlotId) -> bool {
        if self.tail == Some(id) {
            return true;
        }
        self.unlink(arena, id) && self.push_back(arena, id)
    }

    /// Iterates ids from head to tail.
    pub fn iter<'a, N: Linked>(&self, arena: &'a SlotArena<N>) -> AnchorIter<'a, N> {
        AnchorIter {
            arena,
            current: self.head,
            remaining: self.len,
        }
    }

    /// Walks the list and checks link symmetry, ownership, tail position and
    /// length.
    pub fn validate<N: Linked>(&self, arena: &SlotArena<N>) -> Result<(), InvariantError> {
        if self.head.is_none() || self.tail.is_none() {
            if self.head.is_some() || self.tail.is_some() || self.len != 0 {
                return Err(InvariantError::new(format!(
                    "list anchor half empty: head={:?} tail={:?} len={}",
                    self.head, self.tail, self.len
                )));
            }
            return Ok(());
        }

        let mut count = 0usize;
        let mut prev = None;
        let mut current = self.head;
        while let Some(id) = current {
            let node = arena
                .get(id)
                .ok_or_else(|| InvariantError::new(format!("list node {id:?} missing from arena")))?;
            if node.links().owner != self.tag {
                return Err(InvariantError::new(format!(
                    "list node {id:?} is tagged for another list"
                )));
            }
            if node.links().prev != prev {
                return Err(InvariantError::new(format!(
                    "list node {id:?} has prev {:?}, expected {prev:?}",
                    node.links().prev
                )));
            }
            count += 1;
            if count > self.len {
                return Err(InvariantError::new(format!(
                    "list longer than recorded length {}",
                    self.len
                )));
            }
            prev = Some(id);
            current = node.links().next;
        }

        if prev != self.tail {
            return Err(InvariantError::new(format!(
                "list walk ended at {prev:?}, tail is {:?}",
                self.tail
            )));
        }
        if count != self.len {
            return Err(InvariantError::new(format!(
                "list walk counted {count} nodes, recorded length {}",
                self.len
            )));
        }
        Ok(())
    }
}

impl Default for ListAnchor {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the ids of one anchor, head to tail.
pub struct AnchorIter<'a, N> {
    arena: &'a SlotArena<N>,
    current: Option<SlotId>,
    remaining: usize,
}

impl<'a, N: Linked> Iterator for AnchorIter<'a, N> {
    type Item = (SlotId, &'a N);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.current?;
        let node = self.arena.get(id)?;
        self.current = node.links().next;
        self.remaining -= 1;
        Some((id, node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[derive(Debug)]
struct Node<T> {
    value: T,
    links: Links,
}

impl<T> Linked for Node<T> {
    fn links(&self) -> &Links {
        &self.links
    }

    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

/// Self-contained list of values: an anchor plus its own arena.
pub struct IntrusiveList<T> {
    arena: SlotArena<Node<T>>,
    anchor: ListAnchor,
}

impl<T> IntrusiveList<T> {
    pub fn new() -> Self {
        Self {
            arena: SlotArena::new(),
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

    pub fn contains(&self, id: SlotId) -> bool {
        self.arena.contains(id)
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.arena.get(id).map(|node| &node.value)
    }

    pub fn front(&self) -> Option<&T> {
        self.anchor.front().and_then(|id| self.get(id))
    }

    pub fn back(&self) -> Option<&T> {
        self.anchor.back().and_then(|id| self.get(id))
    }

    pub fn push_front(&mut self, value: T) -> SlotId {
        let id = self.arena.insert(Node {
            value,
            links: Links::default(),
        });
        self.anchor.push_front(&mut self.arena, id);
        id
    }

    pub fn push_back(&mut self, value: T) -> SlotId {
        let id = self.arena.insert(Node {
            value,
            links: Links::default(),
        });
        self.anchor.push_back(&mut self.arena, id);
        id
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let id = self.anchor.front()?;
        self.remove(id)
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let id = self.anchor.back()?;
        self.remove(id)
    }

    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        if !self.anchor.unlink(&mut self.arena, id) {
            return None;
        }
        self.arena.remove(id).map(|node| node.value)
    }

    pub fn move_to_front(&mut self, id: SlotId) -> bool {
        self.anchor.move_to_front(&mut self.arena, id)
    }

    pub fn clear(&mut self) {
        self.arena = SlotArena::new();
        self.anchor = ListAnchor::new();
    }

    /// Values from front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.anchor.iter(&self.arena).map(|(_, node)| &node.value)
    }

    pub fn validate(&self) -> Result<(), InvariantError> {
        self.anchor.validate(&self.arena)?;
        if self.arena.len() != self.anchor.len() {
            return Err(InvariantError::new(format!(
                "list arena holds {} nodes but {} are linked",
                self.arena.len(),
                self.anchor.len()
            )));
        }
        Ok(())
    }
}

impl<T> Default for IntrusiveList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for IntrusiveList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
