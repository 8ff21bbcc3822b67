pub mod ghost_list;
pub mod intrusive_list;
pub mod slot_arena;

pub use ghost_list::{Ghost, GhostList};
pub use intrusive_list::{IntrusiveList, Linked, Links, ListAnchor};
pub use slot_arena::{SlotArena, SlotId};
