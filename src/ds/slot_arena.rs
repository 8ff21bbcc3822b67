//! Generational slot arena.
//!
//! Values live in a contiguous `Vec` of slots and are addressed by [`SlotId`]
//! (index + generation). Freed slots go on a free list and are recycled by the
//! next insert; recycling bumps the slot generation so a stale id held across
//! a remove can never alias the new occupant.
//!
//! ```text
//!   slots: [ {gen 0, A} | {gen 3, -} | {gen 1, C} ]      free_list: [1]
//!
//!   SlotId { index: 1, generation: 2 }  -> stale, get() returns None
//! ```
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

impl SlotId {
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    generation: u32,
}

#[derive(Debug)]
pub struct SlotArena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: usize,
}

impl<T> SlotArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> SlotId {
        let id = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.value.is_none());
            slot.value = Some(value);
            SlotId {
                index,
                generation: slot.generation,
            }
        } else {
            debug_assert!(self.slots.len() < u32::MAX as usize);
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                value: Some(value),
                generation: 0,
            });
            SlotId {
                index,
                generation: 0,
            }
        };
        self.len += 1;
        id
    }

    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, id: SlotId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever allocated, occupied or free.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Picks an occupied slot uniformly at random.
    ///
    /// Rejection sampling over the slot vector: every occupied slot has the
    /// same probability per draw, so the result is exactly uniform over live
    /// values. Expected draws are `slot_count / len`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<SlotId> {
        if self.len == 0 {
            return None;
        }
        loop {
            let index = rng.random_range(0..self.slots.len());
            let slot = &self.slots[index];
            if slot.value.is_some() {
                return Some(SlotId {
                    index: index as u32,
                    generation: slot.generation,
                });
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    SlotId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}
