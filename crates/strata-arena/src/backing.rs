//! Backing storage of an arena.
//!
//! Ownership is encoded in the variant instead of a flag: only
//! [`Backing::Owned`] is ever freed or reallocated by the arena.

use std::sync::atomic::Ordering;
use std::sync::Weak;

use crate::arena::ArenaShared;
use crate::error::ArenaError;
use crate::raw::RawBuffer;

/// Where an arena's bytes live.
pub(crate) enum Backing {
    /// Heap buffer owned by the arena; may grow and shrink.
    Owned(RawBuffer),
    /// Caller-provided buffer; never freed or resized.
    Borrowed(&'static mut [u8]),
    /// Window `[base, base + len)` of a parent arena's buffer.
    Carved {
        /// Non-owning back-reference to the parent.
        parent: Weak<ArenaShared>,
        /// Offset of the window in the parent buffer.
        base: usize,
        /// Window length.
        len: usize,
    },
    /// Storage released by `destroy`.
    Released,
}

/// Variant tag of a [`Backing`], for dispatch without holding a borrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BackingKind {
    Owned,
    Borrowed,
    Carved,
    Released,
}

impl Backing {
    pub(crate) fn kind(&self) -> BackingKind {
        match self {
            Self::Owned(_) => BackingKind::Owned,
            Self::Borrowed(_) => BackingKind::Borrowed,
            Self::Carved { .. } => BackingKind::Carved,
            Self::Released => BackingKind::Released,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        match self {
            Self::Owned(buf) => buf.len(),
            Self::Borrowed(buf) => buf.len(),
            Self::Carved { len, .. } => *len,
            Self::Released => 0,
        }
    }

    /// Whether destroy releases the bytes back to the host allocator.
    pub(crate) fn owns(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    /// Whether storage was released by `destroy`.
    pub(crate) fn is_released(&self) -> bool {
        matches!(self, Self::Released)
    }

    /// Run `f` over the full backing window.
    ///
    /// For a carved window this locks the parent (child-then-parent order)
    /// and resolves the window against the parent's current buffer.
    pub(crate) fn with_bytes<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R, ArenaError> {
        let mut f = Some(f);
        let mut out = None;
        self.visit(&mut |bytes| {
            if let Some(f) = f.take() {
                out = Some(f(bytes));
            }
        })?;
        out.ok_or_else(|| ArenaError::Corrupted {
            detail: "backing window was not resolved".into(),
        })
    }

    /// Non-generic walk up the parent chain. Nested sub-arenas recurse
    /// through the same instantiation however deep they go.
    fn visit(&mut self, f: &mut dyn FnMut(&mut [u8])) -> Result<(), ArenaError> {
        match self {
            Self::Owned(buf) => f(buf.as_mut_slice()),
            Self::Borrowed(buf) => f(&mut buf[..]),
            Self::Carved { parent, base, len } => {
                let parent = parent.upgrade().ok_or(ArenaError::ParentGone)?;
                if parent.destroying.load(Ordering::Acquire) {
                    return Err(ArenaError::ParentGone);
                }
                let start = *base;
                let end = start.checked_add(*len).ok_or_else(|| ArenaError::Corrupted {
                    detail: "sub-arena window overflows".into(),
                })?;
                let mut inside = false;
                let mut state = parent.state.lock();
                state.backing.visit(&mut |bytes| {
                    if let Some(window) = bytes.get_mut(start..end) {
                        inside = true;
                        f(window);
                    }
                })?;
                if !inside {
                    return Err(ArenaError::Corrupted {
                        detail: format!("sub-arena window [{start}, {end}) outside parent buffer"),
                    });
                }
            }
            Self::Released => return Err(ArenaError::Destroyed),
        }
        Ok(())
    }

    /// Address of the first byte of the window, as seen right now.
    ///
    /// An empty window reports 0 so padding is computed as for an aligned
    /// base.
    pub(crate) fn base_addr(&mut self) -> Result<usize, ArenaError> {
        if self.capacity() == 0 {
            return Ok(0);
        }
        match self {
            Self::Owned(buf) => Ok(buf.addr()),
            Self::Borrowed(buf) => Ok(buf.as_ptr() as usize),
            _ => self.with_bytes(|bytes| bytes.as_ptr() as usize),
        }
    }
}
