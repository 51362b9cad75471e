//! Resizing the most recent allocation.
//!
//! A bump allocator can only resize in place at the tail. Older blocks are
//! copied into a fresh block; the old copy keeps occupying its space until
//! the next reset or pop.

use crate::arena::{Arena, ArenaState, Block, Fill, Placement};
use crate::config::{DEFAULT_ALIGNMENT, MAX_CAPACITY};
use crate::debug;
use crate::error::ArenaError;

/// Hook label for a resize that kept the block where it was.
pub const REALLOC_IN_PLACE_LABEL: &str = "realloc_last (in-place)";

/// Hook label for a resize that copied the block.
pub const REALLOC_FALLBACK_LABEL: &str = "realloc_last (fallback)";

impl Arena {
    /// Resize `block` to `new_size` bytes.
    ///
    /// If `block` is the most recent allocation it is resized in place,
    /// growing the arena if needed, and the returned block has the same
    /// offset. Otherwise a new block is allocated, the first
    /// `min(old, new)` bytes are copied, and the old block is poisoned but
    /// not reclaimed.
    pub fn realloc_last(&self, block: Block, new_size: usize) -> Result<Block, ArenaError> {
        let result = self.realloc_inner(block, new_size);
        self.report_alloc("realloc_last", result)
    }

    fn realloc_inner(&self, block: Block, new_size: usize) -> Result<Block, ArenaError> {
        if new_size == 0 {
            return Err(ArenaError::ZeroSize);
        }
        if new_size > MAX_CAPACITY {
            return Err(ArenaError::TooLarge {
                requested: new_size,
                limit: MAX_CAPACITY,
            });
        }
        let mut state = self.lock_live()?;
        self.verify(&state)?;
        state.check_block(self.id(), block)?;
        if block.end() == state.cursor {
            return self.resize_tail(&mut state, block, new_size, REALLOC_IN_PLACE_LABEL);
        }

        let placed = self.bump(&mut state, new_size, DEFAULT_ALIGNMENT, Fill::Poison)?;
        let keep = block.len().min(new_size);
        let old = block.range();
        let dst = placed.block.offset();
        state.backing.with_bytes(|bytes| {
            bytes.copy_within(old.start..old.start + keep, dst);
            debug::poison(&mut bytes[old]);
        })?;
        state.stats.reallocations += 1;
        self.notify(&placed, REALLOC_FALLBACK_LABEL);
        Ok(placed.block)
    }

    /// Resize `block` in place if it is still the tail of this arena.
    ///
    /// Used by sub-arenas to extend their window inside the parent.
    pub(crate) fn extend_tail(
        &self,
        block: Block,
        new_size: usize,
        label: &str,
    ) -> Result<Block, ArenaError> {
        let mut state = self.lock_live()?;
        state.check_block(self.id(), block)?;
        if block.end() != state.cursor {
            return Err(ArenaError::NotLastBlock {
                offset: block.offset(),
            });
        }
        self.resize_tail(&mut state, block, new_size, label)
    }

    /// Move the cursor to `block.offset + new_size`, growing as needed and
    /// poisoning a shrunk tail. The caller has checked that `block` ends at
    /// the cursor.
    fn resize_tail(
        &self,
        state: &mut ArenaState,
        block: Block,
        new_size: usize,
        label: &str,
    ) -> Result<Block, ArenaError> {
        let offset = block.offset();
        let new_end = offset
            .checked_add(new_size)
            .filter(|end| *end <= MAX_CAPACITY)
            .ok_or(ArenaError::TooLarge {
                requested: new_size,
                limit: MAX_CAPACITY,
            })?;
        self.grow_to(state, new_end)?;
        if new_size < block.len() {
            state.poison_range(new_end, block.end())?;
        }
        state.cursor = new_end;
        let id = state.stats.record_resize(block.len(), new_size, offset, new_end);
        let resized = Block::new(self.id(), offset, new_size);
        self.notify(
            &Placement {
                block: resized,
                id,
                waste: 0,
            },
            label,
        );
        Ok(resized)
    }
}
