//! Fixed pool of reusable scratch arenas.
//!
//! Each slot pairs an arena with an atomic in-use flag. [`ScratchPool::acquire`]
//! claims the first idle slot with a compare-exchange, resets its arena and
//! hands out a handle; [`ScratchPool::release`] clears the flag again. Slot
//! arenas live until the pool is destroyed or dropped.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::arena::Arena;
use crate::config::SCRATCH_SLOTS;
use crate::error::ArenaError;

/// Label attached to every slot arena.
pub const SCRATCH_LABEL: &str = "scratch";

/// Pool construction parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScratchPoolConfig {
    /// Number of slots.
    pub slots: usize,
    /// Initial capacity of each slot arena. Slot arenas are growable.
    pub slot_size: usize,
    /// Serialize the slot scan behind a pool-wide mutex.
    pub serialize_scan: bool,
}

impl ScratchPoolConfig {
    /// Default initial capacity of a slot arena.
    pub const DEFAULT_SLOT_SIZE: usize = 1024;
}

impl Default for ScratchPoolConfig {
    fn default() -> Self {
        Self {
            slots: SCRATCH_SLOTS,
            slot_size: Self::DEFAULT_SLOT_SIZE,
            serialize_scan: false,
        }
    }
}

struct Slot {
    arena: Arena,
    in_use: AtomicBool,
}

/// A fixed set of scratch arenas shared between threads.
///
/// ```
/// use strata_arena::ScratchPool;
///
/// let pool = ScratchPool::new(1024).unwrap();
/// {
///     let scratch = pool.lease().unwrap();
///     scratch.alloc(100).unwrap();
/// }
/// assert_eq!(pool.in_use(), 0);
/// ```
pub struct ScratchPool {
    slots: Box<[Slot]>,
    slot_size: usize,
    scan_lock: Option<Mutex<()>>,
    destroyed: AtomicBool,
}

impl ScratchPool {
    /// A pool of [`SCRATCH_SLOTS`] slots of `slot_size` bytes each.
    pub fn new(slot_size: usize) -> Result<Self, ArenaError> {
        Self::with_config(ScratchPoolConfig {
            slot_size,
            ..ScratchPoolConfig::default()
        })
    }

    /// Build a pool from a full configuration.
    pub fn with_config(config: ScratchPoolConfig) -> Result<Self, ArenaError> {
        if config.slots == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "a scratch pool needs at least one slot".into(),
            });
        }
        let slots = (0..config.slots)
            .map(|_| {
                let arena = Arena::new(config.slot_size, true)?;
                arena.set_debug_label(SCRATCH_LABEL);
                Ok(Slot {
                    arena,
                    in_use: AtomicBool::new(false),
                })
            })
            .collect::<Result<Vec<_>, ArenaError>>()?
            .into_boxed_slice();
        debug!(
            slots = config.slots,
            slot_size = config.slot_size,
            "scratch pool created"
        );
        Ok(Self {
            slots,
            slot_size: config.slot_size,
            scan_lock: config.serialize_scan.then(|| Mutex::new(())),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Claim an idle slot and return its arena, freshly reset.
    ///
    /// Fails with [`ArenaError::PoolExhausted`] when every slot is held.
    pub fn acquire(&self) -> Result<Arena, ArenaError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(ArenaError::Destroyed);
        }
        let claimed = {
            let _scan = self.scan_lock.as_ref().map(|lock| lock.lock());
            self.slots.iter().find(|slot| {
                slot.in_use
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            })
        };
        let Some(slot) = claimed else {
            warn!(slots = self.slots.len(), "scratch pool exhausted");
            return Err(ArenaError::PoolExhausted {
                slots: self.slots.len(),
            });
        };
        if let Err(err) = self.prepare(&slot.arena) {
            slot.in_use.store(false, Ordering::Release);
            return Err(err);
        }
        Ok(slot.arena.clone())
    }

    /// Rewind a claimed slot arena, rebuilding it if a holder destroyed it.
    fn prepare(&self, arena: &Arena) -> Result<(), ArenaError> {
        if !arena.is_valid() {
            debug!(arena = %arena.name(), "rebuilding destroyed scratch slot");
            return arena.init(self.slot_size, true);
        }
        arena.reset()
    }

    /// Return a slot arena to the pool.
    ///
    /// Returns `false` (and logs) if `arena` did not come from this pool or
    /// was not checked out.
    pub fn release(&self, arena: &Arena) -> bool {
        let Some(slot) = self.slots.iter().find(|slot| slot.arena.ptr_eq(arena)) else {
            warn!(arena = %arena.name(), "release of an arena that is not in this pool");
            return false;
        };
        if slot.in_use.swap(false, Ordering::AcqRel) {
            true
        } else {
            warn!(arena = %arena.name(), "release of an idle scratch slot");
            false
        }
    }

    /// Acquire a slot that is released when the lease is dropped.
    pub fn lease(&self) -> Result<ScratchLease<'_>, ArenaError> {
        let arena = self.acquire()?;
        Ok(ScratchLease { pool: self, arena })
    }

    /// Destroy every slot arena. Later acquires fail with
    /// [`ArenaError::Destroyed`].
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        for slot in self.slots.iter() {
            slot.arena.destroy();
            slot.in_use.store(false, Ordering::Release);
        }
        debug!(slots = self.slots.len(), "scratch pool destroyed");
    }

    /// Number of slots currently checked out.
    pub fn in_use(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.in_use.load(Ordering::Acquire))
            .count()
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Initial capacity of each slot arena.
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }
}

impl fmt::Debug for ScratchPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScratchPool")
            .field("slots", &self.slots.len())
            .field("in_use", &self.in_use())
            .field("slot_size", &self.slot_size)
            .finish()
    }
}

/// A checked-out scratch arena, released back to its pool on drop.
pub struct ScratchLease<'a> {
    pool: &'a ScratchPool,
    arena: Arena,
}

impl ScratchLease<'_> {
    /// The leased arena.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }
}

impl Deref for ScratchLease<'_> {
    type Target = Arena;

    fn deref(&self) -> &Arena {
        &self.arena
    }
}

impl Drop for ScratchLease<'_> {
    fn drop(&mut self) {
        self.pool.release(&self.arena);
    }
}
