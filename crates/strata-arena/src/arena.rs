//! The arena: lifecycle, bump allocation, growth, shrink and rewinding.
//!
//! [`Arena`] is a cheap, cloneable handle over shared state. Every mutating
//! operation takes the per-arena lock; the destroy latch, the growth flag
//! and the ownership flag are atomics so they can be read without it.
//!
//! Allocation returns a [`Block`] rather than a pointer. A block is
//! resolved against the arena's current buffer on every access, so a grow
//! that moves the buffer leaves existing handles valid.

use std::fmt;
use std::io;
use std::ops::{Deref, Range};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::backing::{Backing, BackingKind};
use crate::config::{
    ArenaConfig, BUFFER_ALIGN, CALLOC_LABEL, DEFAULT_ALIGNMENT, DEFAULT_LABEL, MAX_ALIGNMENT,
    MAX_CAPACITY, MAX_MARKER_DEPTH, MIN_SHRINK_RATIO, SHRINK_PADDING,
};
use crate::debug::{self, ArenaId, DebugInfo, ErrorCallback, InvariantView};
use crate::error::ArenaError;
use crate::growth::{DoublingGrowth, GrowthPolicy};
use crate::hooks::{AllocEvent, AllocationHook, HookSlot};
use crate::math;
use crate::raw::RawBuffer;
use crate::stats::ArenaStats;

// ── Handles ─────────────────────────────────────────────────────

/// Handle to one allocation: the issuing arena, an offset and a length.
///
/// Blocks are `Copy` and carry no borrow of the arena. They stay valid
/// until the arena is reset, destroyed, or rewound past their offset;
/// after that, access through the arena reports
/// [`ArenaError::InvalidBlock`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Block {
    arena: ArenaId,
    offset: usize,
    len: usize,
}

impl Block {
    pub(crate) fn new(arena: ArenaId, offset: usize, len: usize) -> Self {
        Self { arena, offset, len }
    }

    /// The arena that issued this block.
    pub fn arena(&self) -> ArenaId {
        self.arena
    }

    /// Offset from the start of the arena buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the block has no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset one past the last byte.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// The byte range `[offset, end)`.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}[{}..{}]", self.arena, self.offset, self.end())
    }
}

/// A saved cursor position.
///
/// Only meaningful for the arena it was taken from, and only until that
/// arena is reset or rewound below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Marker {
    arena: ArenaId,
    offset: usize,
}

impl Marker {
    pub(crate) fn new(arena: ArenaId, offset: usize) -> Self {
        Self { arena, offset }
    }

    /// The arena this marker belongs to.
    pub fn arena(&self) -> ArenaId {
        self.arena
    }

    /// The captured cursor value.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

// ── Shared state ────────────────────────────────────────────────

/// How freshly bumped bytes are initialised.
pub(crate) enum Fill<'a> {
    Zero,
    Poison,
    Copy(&'a [u8]),
}

/// Outcome of one bump, kept for the hook call.
pub(crate) struct Placement {
    pub(crate) block: Block,
    pub(crate) id: u64,
    pub(crate) waste: usize,
}

/// Everything guarded by the arena lock.
pub(crate) struct ArenaState {
    pub(crate) backing: Backing,
    pub(crate) cursor: usize,
    pub(crate) growth: Arc<dyn GrowthPolicy>,
    pub(crate) markers: SmallVec<[usize; MAX_MARKER_DEPTH]>,
    pub(crate) stats: ArenaStats,
}

impl ArenaState {
    fn new(backing: Backing) -> Self {
        let stats = ArenaStats::new(backing.capacity());
        Self {
            backing,
            cursor: 0,
            growth: Arc::new(DoublingGrowth),
            markers: SmallVec::new(),
            stats,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.backing.capacity()
    }

    /// Check that `block` was issued by arena `id` and is still live.
    pub(crate) fn check_block(&self, id: ArenaId, block: Block) -> Result<(), ArenaError> {
        if block.arena != id {
            return Err(ArenaError::ForeignHandle {
                expected: id,
                found: block.arena,
            });
        }
        match block.offset.checked_add(block.len) {
            Some(end) if end <= self.cursor => Ok(()),
            _ => Err(ArenaError::InvalidBlock {
                offset: block.offset,
                len: block.len,
                cursor: self.cursor,
            }),
        }
    }

    pub(crate) fn poison_range(&mut self, start: usize, end: usize) -> Result<(), ArenaError> {
        if start >= end {
            return Ok(());
        }
        self.backing
            .with_bytes(|bytes| debug::poison(&mut bytes[start..end]))
    }

    /// Move the cursor back to `offset`, poisoning what it leaves behind.
    fn rewind(&mut self, offset: usize) -> Result<(), ArenaError> {
        self.poison_range(offset, self.cursor)?;
        self.cursor = offset;
        self.markers.retain(|m| *m <= offset);
        Ok(())
    }
}

/// State shared by every clone of an [`Arena`] handle.
pub(crate) struct ArenaShared {
    pub(crate) id: ArenaId,
    pub(crate) state: Mutex<ArenaState>,
    pub(crate) destroying: AtomicBool,
    pub(crate) can_grow: AtomicBool,
    pub(crate) owns_buffer: AtomicBool,
    pub(crate) debug: DebugInfo,
    pub(crate) hooks: HookSlot,
}

// ── Arena ───────────────────────────────────────────────────────

/// A region allocator over one contiguous buffer.
///
/// Cloning an `Arena` produces another handle to the same arena. The
/// buffer is released by [`destroy`](Self::destroy) or when the last
/// handle is dropped.
///
/// # Examples
///
/// ```
/// use strata_arena::Arena;
///
/// let arena = Arena::new(1024, false).unwrap();
/// let block = arena.alloc(64).unwrap();
/// arena.write(block, b"hello").unwrap();
/// assert_eq!(&arena.read(block).unwrap()[..5], b"hello");
///
/// let marker = arena.mark();
/// arena.alloc(128).unwrap();
/// arena.pop(marker).unwrap();
/// assert_eq!(arena.used(), 64);
/// ```
#[derive(Clone)]
pub struct Arena {
    pub(crate) shared: Arc<ArenaShared>,
}

impl Arena {
    // ── Construction ────────────────────────────────────────────

    /// Create an arena owning a zeroed buffer of `capacity` bytes.
    pub fn new(capacity: usize, allow_grow: bool) -> Result<Self, ArenaError> {
        Self::with_config(ArenaConfig::new(capacity).growable(allow_grow))
    }

    /// Create an arena from a full configuration.
    pub fn with_config(config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        let buffer = Self::allocate_buffer(config.capacity)?;
        let id = ArenaId::next();
        let arena = Self::from_parts(id, id.root_name(), Backing::Owned(buffer), config.allow_grow);
        arena.shared.debug.set_label(config.label);
        debug!(
            arena = %arena.name(),
            capacity = config.capacity,
            allow_grow = config.allow_grow,
            "arena created"
        );
        Ok(arena)
    }

    /// Create an arena over a caller-provided buffer, or an owned one when
    /// `buffer` is `None`.
    ///
    /// Only the first `capacity` bytes of a provided buffer are used. The
    /// arena never frees or resizes it, so `allow_grow` has no effect on
    /// capacity, only on [`can_grow`](Self::can_grow).
    pub fn with_buffer(
        buffer: Option<&'static mut [u8]>,
        capacity: usize,
        allow_grow: bool,
    ) -> Result<Self, ArenaError> {
        let Some(buffer) = buffer else {
            return Self::new(capacity, allow_grow);
        };
        let backing = Self::borrowed_backing(buffer, capacity)?;
        let id = ArenaId::next();
        let arena = Self::from_parts(id, id.root_name(), backing, allow_grow);
        debug!(arena = %arena.name(), capacity, "arena created over caller buffer");
        Ok(arena)
    }

    /// Re-initialise this arena in place with a fresh owned buffer.
    ///
    /// Any previous buffer is released and all counters start over. Also
    /// clears the destroy latch, so a destroyed arena can be reused.
    pub fn init(&self, capacity: usize, allow_grow: bool) -> Result<(), ArenaError> {
        self.reinit_with_buffer(None, capacity, allow_grow)
    }

    /// Re-initialise this arena in place over `buffer` (or an owned buffer
    /// when `None`).
    pub fn reinit_with_buffer(
        &self,
        buffer: Option<&'static mut [u8]>,
        capacity: usize,
        allow_grow: bool,
    ) -> Result<(), ArenaError> {
        let result = self.reinit_inner(buffer, capacity, allow_grow);
        self.report("init", result)
    }

    fn reinit_inner(
        &self,
        buffer: Option<&'static mut [u8]>,
        capacity: usize,
        allow_grow: bool,
    ) -> Result<(), ArenaError> {
        let backing = match buffer {
            Some(buffer) => Self::borrowed_backing(buffer, capacity)?,
            None => {
                ArenaConfig::new(capacity).growable(allow_grow).validate()?;
                Backing::Owned(Self::allocate_buffer(capacity)?)
            }
        };
        let previous = {
            let mut state = self.shared.state.lock();
            let previous = std::mem::replace(&mut *state, ArenaState::new(backing));
            self.shared
                .owns_buffer
                .store(state.backing.owns(), Ordering::Release);
            self.shared.can_grow.store(allow_grow, Ordering::Release);
            self.shared.destroying.store(false, Ordering::Release);
            previous
        };
        drop(previous);
        debug!(arena = %self.name(), capacity, allow_grow, "arena re-initialised");
        Ok(())
    }

    pub(crate) fn from_parts(id: ArenaId, name: String, backing: Backing, allow_grow: bool) -> Self {
        let owns = backing.owns();
        Self {
            shared: Arc::new(ArenaShared {
                id,
                state: Mutex::new(ArenaState::new(backing)),
                destroying: AtomicBool::new(false),
                can_grow: AtomicBool::new(allow_grow),
                owns_buffer: AtomicBool::new(owns),
                debug: DebugInfo::new(name),
                hooks: HookSlot::default(),
            }),
        }
    }

    pub(crate) fn upgrade(parent: &Weak<ArenaShared>) -> Result<Self, ArenaError> {
        parent
            .upgrade()
            .map(|shared| Self { shared })
            .ok_or(ArenaError::ParentGone)
    }

    fn allocate_buffer(capacity: usize) -> Result<RawBuffer, ArenaError> {
        RawBuffer::zeroed(capacity).ok_or(ArenaError::OutOfMemory {
            required: capacity,
            capacity: 0,
        })
    }

    fn borrowed_backing(buffer: &'static mut [u8], capacity: usize) -> Result<Backing, ArenaError> {
        if capacity == 0 || capacity > buffer.len() || capacity > MAX_CAPACITY {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "capacity {capacity} does not fit a caller buffer of {} bytes",
                    buffer.len()
                ),
            });
        }
        let (window, _) = buffer.split_at_mut(capacity);
        Ok(Backing::Borrowed(window))
    }

    // ── Teardown ────────────────────────────────────────────────

    /// Release the buffer (if owned) and zero all metadata.
    ///
    /// Idempotent: the first caller wins the latch, later calls return
    /// immediately. Every operation on a destroyed arena reports
    /// [`ArenaError::Destroyed`] until it is re-initialised.
    pub fn destroy(&self) {
        if self
            .shared
            .destroying
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let released = {
            let mut state = self.shared.state.lock();
            let released = std::mem::replace(&mut state.backing, Backing::Released);
            state.cursor = 0;
            state.markers.clear();
            state.stats = ArenaStats::default();
            self.shared.owns_buffer.store(false, Ordering::Release);
            released
        };
        drop(released);
        debug!(arena = %self.name(), "arena destroyed");
    }

    /// Destroy the arena and drop this handle.
    pub fn delete(self) {
        self.destroy();
    }

    /// Whether the arena has not been destroyed.
    pub fn is_valid(&self) -> bool {
        !self.is_destroying()
    }

    /// Whether destruction has started.
    pub fn is_destroying(&self) -> bool {
        self.shared.destroying.load(Ordering::Acquire)
    }

    // ── Allocation ──────────────────────────────────────────────

    /// Allocate `size` bytes at the default alignment.
    pub fn alloc(&self, size: usize) -> Result<Block, ArenaError> {
        self.alloc_aligned_labeled(size, DEFAULT_ALIGNMENT, DEFAULT_LABEL)
    }

    /// Allocate `size` bytes at `alignment` (a power of two up to 4096).
    pub fn alloc_aligned(&self, size: usize, alignment: usize) -> Result<Block, ArenaError> {
        self.alloc_aligned_labeled(size, alignment, DEFAULT_LABEL)
    }

    /// Allocate `size` bytes, tagging the hook event with `label`.
    pub fn alloc_labeled(&self, size: usize, label: &str) -> Result<Block, ArenaError> {
        self.alloc_aligned_labeled(size, DEFAULT_ALIGNMENT, label)
    }

    /// The general allocation entry point.
    ///
    /// Fresh bytes are poisoned, except under [`CALLOC_LABEL`] where they
    /// are zeroed.
    pub fn alloc_aligned_labeled(
        &self,
        size: usize,
        alignment: usize,
        label: &str,
    ) -> Result<Block, ArenaError> {
        let fill = if label == CALLOC_LABEL {
            Fill::Zero
        } else {
            Fill::Poison
        };
        let result = self.allocate(size, alignment, label, fill);
        self.report_alloc("alloc", result)
    }

    /// Allocate `count * size` zeroed bytes.
    pub fn calloc(&self, count: usize, size: usize) -> Result<Block, ArenaError> {
        self.calloc_aligned_labeled(count, size, DEFAULT_ALIGNMENT, CALLOC_LABEL)
    }

    /// [`calloc`](Self::calloc) at an explicit alignment.
    pub fn calloc_aligned(
        &self,
        count: usize,
        size: usize,
        alignment: usize,
    ) -> Result<Block, ArenaError> {
        self.calloc_aligned_labeled(count, size, alignment, CALLOC_LABEL)
    }

    /// [`calloc`](Self::calloc) with a hook label.
    pub fn calloc_labeled(&self, count: usize, size: usize, label: &str) -> Result<Block, ArenaError> {
        self.calloc_aligned_labeled(count, size, DEFAULT_ALIGNMENT, label)
    }

    /// Zeroed allocation with explicit alignment and label. Fails with
    /// [`ArenaError::SizeOverflow`] when `count * size` overflows.
    pub fn calloc_aligned_labeled(
        &self,
        count: usize,
        size: usize,
        alignment: usize,
        label: &str,
    ) -> Result<Block, ArenaError> {
        let result = math::checked_size(count, size)
            .ok_or(ArenaError::SizeOverflow { count, size })
            .and_then(|total| self.allocate(total, alignment, label, Fill::Zero));
        self.report_alloc("calloc", result)
    }

    /// Allocate a block holding a copy of `bytes`.
    pub fn alloc_copy(&self, bytes: &[u8]) -> Result<Block, ArenaError> {
        self.alloc_copy_labeled(bytes, DEFAULT_LABEL)
    }

    /// [`alloc_copy`](Self::alloc_copy) with a hook label.
    pub fn alloc_copy_labeled(&self, bytes: &[u8], label: &str) -> Result<Block, ArenaError> {
        let result = self.allocate(bytes.len(), DEFAULT_ALIGNMENT, label, Fill::Copy(bytes));
        self.report_alloc("alloc_copy", result)
    }

    fn allocate(
        &self,
        size: usize,
        alignment: usize,
        label: &str,
        fill: Fill<'_>,
    ) -> Result<Block, ArenaError> {
        validate_request(size, alignment)?;
        let mut state = self.lock_live()?;
        self.verify(&state)?;
        let placed = self.bump(&mut state, size, alignment, fill)?;
        self.notify(&placed, label);
        Ok(placed.block)
    }

    /// Place, initialise and account for one block. The caller holds the
    /// lock and fires the hook.
    pub(crate) fn bump(
        &self,
        state: &mut ArenaState,
        size: usize,
        alignment: usize,
        fill: Fill<'_>,
    ) -> Result<Placement, ArenaError> {
        let (start, waste) = self.place(state, size, alignment)?;
        let end = start + size;
        state.backing.with_bytes(|bytes| {
            let region = &mut bytes[start..end];
            match fill {
                Fill::Zero => region.fill(0),
                Fill::Poison => debug::poison(region),
                Fill::Copy(src) => region.copy_from_slice(src),
            }
        })?;
        state.cursor = end;
        let id = state.stats.record_alloc(size, start, waste, end);
        trace!(arena = %self.name(), id, size, offset = start, waste, "alloc");
        Ok(Placement {
            block: Block::new(self.id(), start, size),
            id,
            waste,
        })
    }

    /// Find the aligned start for `size` bytes, growing if needed.
    /// Returns `(start, padding)`; `start + size` fits the capacity.
    fn place(
        &self,
        state: &mut ArenaState,
        size: usize,
        alignment: usize,
    ) -> Result<(usize, usize), ArenaError> {
        let too_large = ArenaError::TooLarge {
            requested: size,
            limit: MAX_CAPACITY,
        };
        let (start, waste) = align_cursor(state, alignment)?;
        let end = start.checked_add(size).ok_or_else(|| too_large.clone())?;
        if end <= state.capacity() {
            return Ok((start, waste));
        }
        // The buffer may move on growth; over-aligned requests need slack
        // because the new base is only guaranteed BUFFER_ALIGN alignment.
        let slack = if alignment > BUFFER_ALIGN { alignment } else { 0 };
        let required = end
            .checked_add(slack)
            .filter(|r| *r <= MAX_CAPACITY)
            .ok_or_else(|| too_large.clone())?;
        self.grow_to(state, required)?;
        let (start, waste) = align_cursor(state, alignment)?;
        let end = start.checked_add(size).ok_or(too_large)?;
        if end > state.capacity() {
            return Err(ArenaError::OutOfMemory {
                required: end,
                capacity: state.capacity(),
            });
        }
        Ok((start, waste))
    }

    // ── Growth and shrink ───────────────────────────────────────

    /// Grow capacity by at least `additional` bytes. Returns the new
    /// capacity.
    pub fn grow(&self, additional: usize) -> Result<usize, ArenaError> {
        let result = self.lock_live().and_then(|mut state| {
            let current = state.capacity();
            if additional == 0 {
                return Ok(current);
            }
            let required = current
                .checked_add(additional)
                .filter(|r| *r <= MAX_CAPACITY)
                .ok_or(ArenaError::TooLarge {
                    requested: additional,
                    limit: MAX_CAPACITY,
                })?;
            self.grow_to(&mut state, required)
        });
        self.report("grow", result)
    }

    /// Ensure capacity is at least `required`. Returns the new capacity.
    pub(crate) fn grow_to(&self, state: &mut ArenaState, required: usize) -> Result<usize, ArenaError> {
        let current = state.capacity();
        if required <= current {
            return Ok(current);
        }
        if !self.can_grow() {
            return Err(ArenaError::OutOfMemory {
                required,
                capacity: current,
            });
        }
        match state.backing.kind() {
            BackingKind::Owned => self.grow_owned(state, required),
            BackingKind::Carved => self.grow_carved(state, required),
            BackingKind::Borrowed => Err(ArenaError::OutOfMemory {
                required,
                capacity: current,
            }),
            BackingKind::Released => Err(ArenaError::Destroyed),
        }
    }

    fn next_capacity(state: &ArenaState, required: usize) -> Option<usize> {
        let current = state.capacity();
        state
            .growth
            .next_capacity(current, required - current)
            .filter(|c| *c >= required && *c <= MAX_CAPACITY)
    }

    fn grow_owned(&self, state: &mut ArenaState, required: usize) -> Result<usize, ArenaError> {
        let current = state.capacity();
        let failed = ArenaError::GrowthFailed {
            from: current,
            required,
        };
        let Some(target) = Self::next_capacity(state, required) else {
            return Err(failed);
        };
        let Backing::Owned(buffer) = &mut state.backing else {
            return Err(failed);
        };
        if !buffer.resize(target) {
            return Err(failed);
        }
        state.stats.record_growth(current, target);
        debug!(arena = %self.name(), from = current, to = target, "arena grew");
        Ok(target)
    }

    /// A sub-arena grows by extending its window, which only works while
    /// the window is the parent's most recent block.
    fn grow_carved(&self, state: &mut ArenaState, required: usize) -> Result<usize, ArenaError> {
        let current = state.capacity();
        let denied = ArenaError::OutOfMemory {
            required,
            capacity: current,
        };
        let (parent, base) = match &state.backing {
            Backing::Carved { parent, base, .. } => (Self::upgrade(parent)?, *base),
            _ => return Err(denied),
        };
        let Some(target) = Self::next_capacity(state, required) else {
            return Err(ArenaError::GrowthFailed {
                from: current,
                required,
            });
        };
        let window = Block::new(parent.id(), base, current);
        parent
            .extend_tail(window, target, crate::sub::SUB_ARENA_GROW_LABEL)
            .map_err(|_| denied)?;
        if let Backing::Carved { len, .. } = &mut state.backing {
            *len = target;
        }
        state.stats.record_growth(current, target);
        debug!(arena = %self.name(), from = current, to = target, "sub-arena grew");
        Ok(target)
    }

    /// Lower capacity to `new_size`. Returns whether the buffer shrank.
    ///
    /// Only owned, growable buffers shrink, never below the cursor, and
    /// only when the cut is worth it (`new_size == used` or the new size
    /// is at most 95% of capacity).
    pub fn shrink(&self, new_size: usize) -> bool {
        match self.lock_live() {
            Ok(mut state) => self.shrink_locked(&mut state, new_size),
            Err(_) => false,
        }
    }

    /// Shrink to `used + 64` bytes when less than 95% of capacity is used.
    pub fn might_shrink(&self) -> bool {
        let Ok(mut state) = self.lock_live() else {
            return false;
        };
        let capacity = state.capacity();
        if capacity == 0 || state.cursor as f64 / capacity as f64 >= MIN_SHRINK_RATIO {
            return false;
        }
        let target = state.cursor.saturating_add(SHRINK_PADDING);
        self.shrink_locked(&mut state, target)
    }

    fn shrink_locked(&self, state: &mut ArenaState, new_size: usize) -> bool {
        let capacity = state.capacity();
        if !self.can_grow() || new_size < state.cursor || new_size >= capacity {
            return false;
        }
        if new_size != state.cursor && new_size as f64 / capacity as f64 > MIN_SHRINK_RATIO {
            return false;
        }
        let Backing::Owned(buffer) = &mut state.backing else {
            return false;
        };
        if !buffer.resize(new_size) {
            return false;
        }
        state.stats.shrink_count += 1;
        debug!(arena = %self.name(), from = capacity, to = new_size, "arena shrank");
        true
    }

    // ── Rewinding ───────────────────────────────────────────────

    /// Rewind the cursor to zero, keeping the buffer.
    ///
    /// Peak usage and cumulative counters survive; live allocations and the
    /// built-in marker stack are cleared.
    pub fn reset(&self) -> Result<(), ArenaError> {
        let result = self.lock_live().and_then(|mut state| {
            state.rewind(0)?;
            state.markers.clear();
            state.stats.live_allocations = 0;
            trace!(arena = %self.name(), "reset");
            Ok(())
        });
        self.report("reset", result)
    }

    /// Capture the current cursor.
    pub fn mark(&self) -> Marker {
        Marker::new(self.id(), self.shared.state.lock().cursor)
    }

    /// Rewind to `marker`, poisoning everything allocated after it.
    ///
    /// A marker beyond the cursor is reported and leaves the arena
    /// unchanged.
    pub fn pop(&self, marker: Marker) -> Result<(), ArenaError> {
        let result = self.lock_live().and_then(|mut state| {
            self.check_marker(&state, marker)?;
            state.rewind(marker.offset)
        });
        self.report("pop", result)
    }

    fn check_marker(&self, state: &ArenaState, marker: Marker) -> Result<(), ArenaError> {
        if marker.arena != self.id() {
            return Err(ArenaError::ForeignHandle {
                expected: self.id(),
                found: marker.arena,
            });
        }
        if marker.offset > state.cursor {
            return Err(ArenaError::InvalidMarker {
                marker: marker.offset,
                cursor: state.cursor,
            });
        }
        Ok(())
    }

    /// Push the current cursor onto the built-in marker stack
    /// (at most [`MAX_MARKER_DEPTH`] deep).
    pub fn push_marker(&self) -> Result<Marker, ArenaError> {
        let result = self.lock_live().and_then(|mut state| {
            if state.markers.len() >= MAX_MARKER_DEPTH {
                return Err(ArenaError::MarkerStackFull {
                    depth: MAX_MARKER_DEPTH,
                });
            }
            let cursor = state.cursor;
            state.markers.push(cursor);
            Ok(Marker::new(self.id(), cursor))
        });
        self.report("push_marker", result)
    }

    /// Pop the built-in marker stack and rewind to the popped marker.
    pub fn pop_marker(&self) -> Result<Marker, ArenaError> {
        let result = self.lock_live().and_then(|mut state| {
            let offset = state.markers.pop().ok_or(ArenaError::MarkerStackEmpty)?;
            let marker = Marker::new(self.id(), offset);
            self.check_marker(&state, marker)?;
            state.rewind(offset)?;
            Ok(marker)
        });
        self.report("pop_marker", result)
    }

    /// Number of markers on the built-in stack.
    pub fn marker_depth(&self) -> usize {
        self.shared.state.lock().markers.len()
    }

    /// Open a scope that rewinds to the current cursor when dropped.
    ///
    /// ```
    /// use strata_arena::Arena;
    ///
    /// let arena = Arena::new(256, false).unwrap();
    /// {
    ///     let scope = arena.scope();
    ///     scope.alloc(100).unwrap();
    /// }
    /// assert_eq!(arena.used(), 0);
    /// ```
    pub fn scope(&self) -> ArenaScope<'_> {
        ArenaScope {
            arena: self,
            marker: self.mark(),
        }
    }

    fn rewind_quietly(&self, marker: Marker) {
        if let Ok(mut state) = self.lock_live() {
            if marker.offset <= state.cursor {
                let _ = state.rewind(marker.offset);
            }
        }
    }

    // ── Byte access ─────────────────────────────────────────────

    /// Run `f` over the bytes of `block`.
    ///
    /// The arena lock is held while `f` runs, along with the locks of every
    /// parent when this is a sub-arena. Calling back into this arena (or
    /// an ancestor) from `f` deadlocks; other arenas are fine.
    pub fn with_slice<R>(&self, block: Block, f: impl FnOnce(&[u8]) -> R) -> Result<R, ArenaError> {
        let mut state = self.lock_live()?;
        state.check_block(self.id(), block)?;
        state.backing.with_bytes(|bytes| f(&bytes[block.range()]))
    }

    /// Run `f` over the bytes of `block`, mutably.
    ///
    /// The arena lock is held while `f` runs, along with the locks of every
    /// parent when this is a sub-arena. Calling back into this arena (or
    /// an ancestor) from `f` deadlocks; other arenas are fine.
    pub fn with_slice_mut<R>(
        &self,
        block: Block,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, ArenaError> {
        let mut state = self.lock_live()?;
        state.check_block(self.id(), block)?;
        state.backing.with_bytes(|bytes| f(&mut bytes[block.range()]))
    }

    /// Copy `data` into the start of `block`.
    pub fn write(&self, block: Block, data: &[u8]) -> Result<(), ArenaError> {
        if data.len() > block.len() {
            return Err(ArenaError::TooLarge {
                requested: data.len(),
                limit: block.len(),
            });
        }
        self.with_slice_mut(block, |bytes| bytes[..data.len()].copy_from_slice(data))
    }

    /// Copy the bytes of `block` out.
    pub fn read(&self, block: Block) -> Result<Vec<u8>, ArenaError> {
        self.with_slice(block, <[u8]>::to_vec)
    }

    /// Set every byte of `block` to `byte`.
    pub fn fill(&self, block: Block, byte: u8) -> Result<(), ArenaError> {
        self.with_slice_mut(block, |bytes| bytes.fill(byte))
    }

    /// Run `f` over the used region `[0, used)`.
    ///
    /// The arena lock is held while `f` runs, along with the locks of every
    /// parent when this is a sub-arena. Calling back into this arena (or
    /// an ancestor) from `f` deadlocks; other arenas are fine.
    pub fn with_used_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, ArenaError> {
        let mut state = self.lock_live()?;
        let cursor = state.cursor;
        state.backing.with_bytes(|bytes| f(&bytes[..cursor]))
    }

    /// Replace the arena contents with `bytes`, as one block at offset 0.
    ///
    /// Grows when allowed; otherwise `bytes` must fit the capacity.
    pub fn restore(&self, bytes: &[u8]) -> Result<Block, ArenaError> {
        let result = self.restore_inner(bytes);
        self.report("restore", result)
    }

    fn restore_inner(&self, bytes: &[u8]) -> Result<Block, ArenaError> {
        if bytes.len() > MAX_CAPACITY {
            return Err(ArenaError::TooLarge {
                requested: bytes.len(),
                limit: MAX_CAPACITY,
            });
        }
        let mut state = self.lock_live()?;
        self.grow_to(&mut state, bytes.len())?;
        state.rewind(0)?;
        state.markers.clear();
        state.stats.live_allocations = 0;
        state
            .backing
            .with_bytes(|dst| dst[..bytes.len()].copy_from_slice(bytes))?;
        state.cursor = bytes.len();
        state.stats.note_cursor(bytes.len());
        debug!(arena = %self.name(), bytes = bytes.len(), "arena restored");
        Ok(Block::new(self.id(), 0, bytes.len()))
    }

    // ── Accessors ───────────────────────────────────────────────

    /// Process-unique id.
    pub fn id(&self) -> ArenaId {
        self.shared.id
    }

    /// Display name, e.g. `A#000003` or `A#000003.1` for a sub-arena.
    pub fn name(&self) -> &str {
        self.shared.debug.name()
    }

    /// Debug label, if set.
    pub fn label(&self) -> Option<String> {
        self.shared.debug.label()
    }

    /// Attach a debug label shown in error reports and stats output.
    pub fn set_debug_label(&self, label: impl Into<String>) {
        self.shared.debug.set_label(Some(label.into()));
    }

    /// Remove the debug label.
    pub fn clear_debug_label(&self) {
        self.shared.debug.set_label(None);
    }

    /// Bytes currently in use (the cursor).
    pub fn used(&self) -> usize {
        self.shared.state.lock().cursor
    }

    /// Bytes left before the next grow.
    pub fn remaining(&self) -> usize {
        let state = self.shared.state.lock();
        state.capacity() - state.cursor
    }

    /// Current buffer size.
    pub fn capacity(&self) -> usize {
        self.shared.state.lock().capacity()
    }

    /// Highest cursor value ever reached.
    pub fn peak(&self) -> usize {
        self.shared.state.lock().stats.peak_usage
    }

    /// Whether the arena may grow.
    pub fn can_grow(&self) -> bool {
        self.shared.can_grow.load(Ordering::Acquire)
    }

    /// Allow or forbid growth (and shrink).
    pub fn set_can_grow(&self, allow: bool) {
        self.shared.can_grow.store(allow, Ordering::Release);
    }

    /// Whether destroy releases the buffer to the host allocator.
    pub fn owns_buffer(&self) -> bool {
        self.shared.owns_buffer.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same arena.
    pub fn ptr_eq(&self, other: &Arena) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // ── Instrumentation ─────────────────────────────────────────

    /// Copy of the current counters.
    pub fn stats(&self) -> ArenaStats {
        self.shared.state.lock().stats.clone()
    }

    /// Write a human-readable summary to `out`.
    pub fn print_stats(&self, out: &mut dyn io::Write) -> io::Result<()> {
        let (capacity, used, stats) = {
            let state = self.shared.state.lock();
            (state.capacity(), state.cursor, state.stats.clone())
        };
        match self.label() {
            Some(label) => writeln!(out, "arena {} ({label})", self.name())?,
            None => writeln!(out, "arena {}", self.name())?,
        }
        writeln!(out, "  capacity:         {capacity}")?;
        writeln!(out, "  used:             {used}")?;
        writeln!(out, "{stats}")
    }

    /// Replace the growth policy.
    pub fn set_growth_policy(&self, policy: impl GrowthPolicy + 'static) {
        self.shared.state.lock().growth = Arc::new(policy);
    }

    /// Install an observer called after every successful allocation.
    pub fn set_allocation_hook(&self, hook: impl AllocationHook + 'static) {
        self.shared.hooks.store(Some(Arc::new(hook)));
    }

    /// Remove the allocation observer.
    pub fn clear_allocation_hook(&self) {
        self.shared.hooks.store(None);
    }

    /// Route errors to `callback` instead of stderr.
    pub fn set_error_callback(&self, callback: impl ErrorCallback + 'static) {
        self.shared.debug.set_callback(Some(Arc::new(callback)));
    }

    /// Restore the default stderr error sink.
    pub fn clear_error_callback(&self) {
        self.shared.debug.set_callback(None);
    }

    /// Verify structural invariants, reporting the first violation.
    ///
    /// Never blocks: if another thread holds the lock, or the arena is being
    /// destroyed, the check is skipped and `Ok` is returned.
    pub fn check_integrity(&self) -> Result<(), ArenaError> {
        if self.is_destroying() {
            return Ok(());
        }
        let Some(state) = self.shared.state.try_lock() else {
            return Ok(());
        };
        if self.is_destroying() {
            return Ok(());
        }
        let result = self.verify(&state);
        drop(state);
        self.report("check_integrity", result)
    }

    // ── Internals shared with realloc / sub ─────────────────────

    /// Lock the state, failing if destruction has started.
    pub(crate) fn lock_live(&self) -> Result<MutexGuard<'_, ArenaState>, ArenaError> {
        if self.is_destroying() {
            return Err(ArenaError::Destroyed);
        }
        let state = self.shared.state.lock();
        if self.is_destroying() {
            return Err(ArenaError::Destroyed);
        }
        Ok(state)
    }

    pub(crate) fn verify(&self, state: &ArenaState) -> Result<(), ArenaError> {
        debug::check_invariants(&InvariantView {
            cursor: state.cursor,
            capacity: state.capacity(),
            released: state.backing.is_released(),
            owns_flag: self.owns_buffer(),
            owns_backing: state.backing.owns(),
            carved: state.backing.kind() == BackingKind::Carved,
            stats: &state.stats,
        })?;
        self.verify_window(state)
    }

    /// A sub-arena window must still be allocated in a live parent. The
    /// window check is skipped when the parent lock is contended.
    fn verify_window(&self, state: &ArenaState) -> Result<(), ArenaError> {
        let Backing::Carved { parent, base, len } = &state.backing else {
            return Ok(());
        };
        let parent = Self::upgrade(parent)?;
        if parent.is_destroying() {
            return Err(ArenaError::ParentGone);
        }
        let Some(parent_state) = parent.shared.state.try_lock() else {
            return Ok(());
        };
        let end = base.saturating_add(*len);
        if end > parent_state.cursor {
            return Err(ArenaError::Corrupted {
                detail: format!(
                    "sub-arena window [{base}, {end}) beyond parent cursor {}",
                    parent_state.cursor
                ),
            });
        }
        Ok(())
    }

    /// Fire the allocation hook. Called with the lock held.
    pub(crate) fn notify(&self, placed: &Placement, label: &str) {
        let block = placed.block;
        self.shared.hooks.fire(&AllocEvent {
            arena: self.id(),
            arena_name: self.name(),
            id: placed.id,
            block,
            size: block.len(),
            offset: block.offset(),
            alignment_waste: placed.waste,
            label,
        });
    }

    /// Dispatch an error, if any, to the error callback.
    pub(crate) fn report<T>(
        &self,
        operation: &'static str,
        result: Result<T, ArenaError>,
    ) -> Result<T, ArenaError> {
        if let Err(err) = &result {
            self.shared.debug.dispatch(operation, err);
        }
        result
    }

    /// Like [`report`](Self::report), also counting a failed allocation.
    pub(crate) fn report_alloc<T>(
        &self,
        operation: &'static str,
        result: Result<T, ArenaError>,
    ) -> Result<T, ArenaError> {
        if result.is_err() {
            self.shared.state.lock().stats.failed_allocations += 1;
        }
        self.report(operation, result)
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Arena");
        s.field("name", &self.name());
        if let Some(state) = self.shared.state.try_lock() {
            s.field("used", &state.cursor)
                .field("capacity", &state.capacity());
        }
        s.field("destroying", &self.is_destroying()).finish()
    }
}

/// Reject zero sizes, bad alignments and sizes beyond the global limit.
pub(crate) fn validate_request(size: usize, alignment: usize) -> Result<(), ArenaError> {
    if size == 0 {
        return Err(ArenaError::ZeroSize);
    }
    if !math::is_power_of_two(alignment) || alignment > MAX_ALIGNMENT {
        return Err(ArenaError::InvalidAlignment { alignment });
    }
    if size > MAX_CAPACITY {
        return Err(ArenaError::TooLarge {
            requested: size,
            limit: MAX_CAPACITY,
        });
    }
    Ok(())
}

/// Round the cursor up so the absolute address is `alignment`-aligned.
/// Returns `(start, padding)`.
fn align_cursor(state: &mut ArenaState, alignment: usize) -> Result<(usize, usize), ArenaError> {
    let cursor = state.cursor;
    let overflow = || ArenaError::TooLarge {
        requested: cursor,
        limit: MAX_CAPACITY,
    };
    let base = state.backing.base_addr()?;
    let addr = base.checked_add(cursor).ok_or_else(overflow)?;
    let padding = math::padding_for(addr, alignment).ok_or_else(overflow)?;
    Ok((cursor + padding, padding))
}

// ── Scope guard ─────────────────────────────────────────────────

/// RAII scope: rewinds the arena to where it was when the scope opened.
///
/// Derefs to the [`Arena`], so allocations go through the guard.
#[must_use = "the scope rewinds immediately if dropped"]
pub struct ArenaScope<'a> {
    arena: &'a Arena,
    marker: Marker,
}

impl ArenaScope<'_> {
    /// The marker the scope will rewind to.
    pub fn marker(&self) -> Marker {
        self.marker
    }
}

impl Deref for ArenaScope<'_> {
    type Target = Arena;

    fn deref(&self) -> &Arena {
        self.arena
    }
}

impl Drop for ArenaScope<'_> {
    fn drop(&mut self) {
        self.arena.rewind_quietly(self.marker);
    }
}
