//! Post-allocation observer hooks.
//!
//! A hook sees every successful allocation after the cursor and counters
//! have been updated. Hooks for one arena are serialized by the arena
//! lock, which is still held while the hook runs: a hook must not call
//! back into the arena it observes.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::arena::Block;
use crate::debug::ArenaId;

/// Description of one successful allocation.
#[derive(Clone, Copy, Debug)]
pub struct AllocEvent<'a> {
    /// Arena that served the request.
    pub arena: ArenaId,
    /// Display name of that arena.
    pub arena_name: &'a str,
    /// Allocation id (monotonic per arena).
    pub id: u64,
    /// Handle to the allocated block.
    pub block: Block,
    /// Size in bytes.
    pub size: usize,
    /// Offset of the block from the start of the arena buffer.
    pub offset: usize,
    /// Padding skipped in front of the block.
    pub alignment_waste: usize,
    /// Caller-supplied label.
    pub label: &'a str,
}

/// Observer invoked after each successful allocation.
///
/// Implemented for any `Fn(&AllocEvent<'_>) + Send + Sync`.
pub trait AllocationHook: Send + Sync {
    /// Called once per allocation.
    fn on_alloc(&self, event: &AllocEvent<'_>);
}

impl<F> AllocationHook for F
where
    F: Fn(&AllocEvent<'_>) + Send + Sync,
{
    fn on_alloc(&self, event: &AllocEvent<'_>) {
        self(event)
    }
}

/// Replaceable hook storage, readable while other threads allocate.
#[derive(Default)]
pub(crate) struct HookSlot {
    hook: RwLock<Option<Arc<dyn AllocationHook>>>,
}

impl HookSlot {
    pub(crate) fn store(&self, hook: Option<Arc<dyn AllocationHook>>) {
        *self.hook.write() = hook;
    }

    pub(crate) fn load(&self) -> Option<Arc<dyn AllocationHook>> {
        self.hook.read().clone()
    }

    #[cfg(test)]
    pub(crate) fn is_set(&self) -> bool {
        self.hook.read().is_some()
    }

    /// Invoke the current hook, if any.
    pub(crate) fn fire(&self, event: &AllocEvent<'_>) {
        if let Some(hook) = self.load() {
            hook.on_alloc(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(block: Block) -> AllocEvent<'static> {
        AllocEvent {
            arena: block.arena(),
            arena_name: "A#000001",
            id: 3,
            block,
            size: block.len(),
            offset: block.offset(),
            alignment_waste: 0,
            label: "test",
        }
    }

    #[test]
    fn empty_slot_does_nothing() {
        let slot = HookSlot::default();
        assert!(!slot.is_set());
        slot.fire(&event(Block::new(ArenaId::next(), 0, 8)));
    }

    #[test]
    fn closure_hook_receives_event() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let slot = HookSlot::default();
        slot.store(Some(Arc::new(move |e: &AllocEvent<'_>| {
            assert_eq!(e.label, "test");
            seen.fetch_add(e.size, Ordering::Relaxed);
        })));
        slot.fire(&event(Block::new(ArenaId::next(), 16, 24)));
        assert_eq!(count.load(Ordering::Relaxed), 24);
    }

    #[test]
    fn hook_can_be_cleared() {
        let slot = HookSlot::default();
        slot.store(Some(Arc::new(|_: &AllocEvent<'_>| {})));
        assert!(slot.is_set());
        slot.store(None);
        assert!(!slot.is_set());
    }
}
