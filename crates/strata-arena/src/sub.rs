//! Sub-arenas: arenas carved out of a parent's buffer.
//!
//! A sub-arena never owns its bytes. It holds a weak reference to the
//! parent and resolves its window through the parent's lock on every
//! access, always locking child before parent. Destroying or resetting a
//! sub-arena leaves the parent untouched; once the parent is destroyed or
//! dropped, the sub-arena reports [`ArenaError::ParentGone`].

use std::sync::Arc;

use tracing::debug;

use crate::arena::Arena;
use crate::backing::{Backing, BackingKind};
use crate::config::DEFAULT_ALIGNMENT;
use crate::debug::ArenaId;
use crate::error::ArenaError;

/// Hook label for carving a sub-arena.
pub const SUB_ARENA_LABEL: &str = "alloc_sub";

/// Hook label (on the parent) when a sub-arena extends its window.
pub const SUB_ARENA_GROW_LABEL: &str = "alloc_sub (grow)";

impl Arena {
    /// Carve a `size`-byte sub-arena from this arena.
    ///
    /// The sub-arena inherits [`can_grow`](Self::can_grow), but can only
    /// grow while its window is the parent's most recent allocation.
    pub fn alloc_sub(&self, size: usize) -> Result<Arena, ArenaError> {
        self.alloc_sub_aligned_labeled(size, DEFAULT_ALIGNMENT, SUB_ARENA_LABEL)
    }

    /// [`alloc_sub`](Self::alloc_sub) with an explicit window alignment.
    pub fn alloc_sub_aligned(&self, size: usize, alignment: usize) -> Result<Arena, ArenaError> {
        self.alloc_sub_aligned_labeled(size, alignment, SUB_ARENA_LABEL)
    }

    /// [`alloc_sub`](Self::alloc_sub) with a hook label.
    pub fn alloc_sub_labeled(&self, size: usize, label: &str) -> Result<Arena, ArenaError> {
        self.alloc_sub_aligned_labeled(size, DEFAULT_ALIGNMENT, label)
    }

    /// Carve a sub-arena with explicit alignment and label.
    pub fn alloc_sub_aligned_labeled(
        &self,
        size: usize,
        alignment: usize,
        label: &str,
    ) -> Result<Arena, ArenaError> {
        let window = self.alloc_aligned_labeled(size, alignment, label)?;
        let name = format!("{}.{}", self.name(), self.shared.debug.next_sub_seq());
        let backing = Backing::Carved {
            parent: Arc::downgrade(&self.shared),
            base: window.offset(),
            len: window.len(),
        };
        let child = Arena::from_parts(ArenaId::next(), name, backing, self.can_grow());
        debug!(parent = %self.name(), child = %child.name(), size, "sub-arena carved");
        Ok(child)
    }

    /// The arena this one was carved from, if it is a sub-arena whose
    /// parent is still alive.
    pub fn parent(&self) -> Option<Arena> {
        match &self.shared.state.lock().backing {
            Backing::Carved { parent, .. } => Arena::upgrade(parent).ok(),
            _ => None,
        }
    }

    /// Whether this arena is carved from another.
    pub fn is_sub_arena(&self) -> bool {
        self.shared.state.lock().backing.kind() == BackingKind::Carved
    }
}
