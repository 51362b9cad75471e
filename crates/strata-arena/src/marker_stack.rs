//! Unbounded stack of markers whose frames live in the arena itself.
//!
//! Each [`MarkerStack::push`] allocates a 16-byte frame holding the
//! captured cursor and a link to the previous frame. Because the frame is
//! allocated after the cursor is captured, popping rewinds over the frame
//! as well as everything allocated above it.
//!
//! Frame layout (native endian):
//!
//! ```text
//! [0..8)   captured cursor (u64)
//! [8..16)  previous frame offset + 1, or 0 for the bottom frame (u64)
//! ```

use crate::arena::{Arena, Block, Marker};
use crate::error::ArenaError;

/// Hook label for marker frames.
pub const MARKER_FRAME_LABEL: &str = "marker_stack";

const FRAME_SIZE: usize = 16;
const FRAME_ALIGN: usize = 8;

/// Nested scopes over one arena, without a fixed depth limit.
#[derive(Debug)]
pub struct MarkerStack {
    arena: Arena,
    top: Option<Block>,
    depth: usize,
}

impl MarkerStack {
    /// An empty stack over `arena`.
    pub fn new(arena: &Arena) -> Self {
        Self {
            arena: arena.clone(),
            top: None,
            depth: 0,
        }
    }

    /// The arena the frames live in.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Number of frames.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether the stack has no frames.
    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    /// Capture the cursor and push a frame for it.
    ///
    /// If the frame cannot be allocated the stack is unchanged.
    pub fn push(&mut self) -> Result<Marker, ArenaError> {
        let marker = self.arena.mark();
        let frame = self
            .arena
            .alloc_aligned_labeled(FRAME_SIZE, FRAME_ALIGN, MARKER_FRAME_LABEL)?;
        let link = self.top.map_or(0, |top| top.offset() as u64 + 1);
        let mut bytes = [0u8; FRAME_SIZE];
        bytes[..8].copy_from_slice(&(marker.offset() as u64).to_ne_bytes());
        bytes[8..].copy_from_slice(&link.to_ne_bytes());
        self.arena.write(frame, &bytes)?;
        self.top = Some(frame);
        self.depth += 1;
        Ok(marker)
    }

    /// Pop the top frame and rewind the arena to its marker.
    pub fn pop(&mut self) -> Result<Marker, ArenaError> {
        let frame = self.top.ok_or(ArenaError::MarkerStackEmpty)?;
        let (offset, link) = self.arena.with_slice(frame, |bytes| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[..8]);
            let offset = u64::from_ne_bytes(word);
            word.copy_from_slice(&bytes[8..16]);
            (offset, u64::from_ne_bytes(word))
        })?;
        let marker = Marker::new(self.arena.id(), offset as usize);
        self.arena.pop(marker)?;
        self.top = link
            .checked_sub(1)
            .map(|prev| Block::new(self.arena.id(), prev as usize, FRAME_SIZE));
        self.depth -= 1;
        Ok(marker)
    }

    /// Forget every frame without rewinding the arena.
    pub fn clear(&mut self) {
        self.top = None;
        self.depth = 0;
    }
}
