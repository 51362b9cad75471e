//! Allocation counters and growth history.

use std::fmt;

/// Snapshot of an arena's counters.
///
/// Returned by value from [`Arena::stats`](crate::Arena::stats); mutating
/// the copy has no effect on the arena.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Successful allocations, including `realloc_last` calls.
    pub allocations: u64,
    /// Successful `realloc_last` calls (in-place and fallback).
    pub reallocations: u64,
    /// Allocation requests that failed.
    pub failed_allocations: u64,
    /// Allocations performed since the last reset.
    pub live_allocations: u64,
    /// Total bytes handed out (excluding alignment padding).
    pub bytes_allocated: u64,
    /// Total bytes skipped to satisfy alignment.
    pub wasted_alignment_bytes: u64,
    /// Number of successful shrinks.
    pub shrink_count: u64,
    /// Highest cursor value ever reached. Never decreases.
    pub peak_usage: usize,
    /// Highest capacity ever held. Never decreases.
    pub peak_capacity: usize,
    /// Size of the most recent allocation.
    pub last_alloc_size: usize,
    /// Offset of the most recent allocation.
    pub last_alloc_offset: usize,
    /// Id of the most recent allocation.
    pub last_alloc_id: u64,
    /// Id the next allocation will receive. Monotonic.
    pub next_alloc_id: u64,
    /// Capacity before each growth, oldest first.
    pub growth_history: Vec<usize>,
}

impl ArenaStats {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            peak_capacity: capacity,
            ..Self::default()
        }
    }

    /// Number of times the arena has grown.
    pub fn growth_count(&self) -> usize {
        self.growth_history.len()
    }

    /// Record a successful allocation ending at `cursor`; returns its id.
    pub(crate) fn record_alloc(
        &mut self,
        size: usize,
        offset: usize,
        waste: usize,
        cursor: usize,
    ) -> u64 {
        self.allocations += 1;
        self.live_allocations += 1;
        self.bytes_allocated += size as u64;
        self.wasted_alignment_bytes += waste as u64;
        self.note_cursor(cursor);
        self.stamp_last(size, offset)
    }

    /// Record a `realloc_last` that kept its block in place.
    pub(crate) fn record_resize(
        &mut self,
        old_size: usize,
        new_size: usize,
        offset: usize,
        cursor: usize,
    ) -> u64 {
        self.allocations += 1;
        self.reallocations += 1;
        self.bytes_allocated += new_size.saturating_sub(old_size) as u64;
        self.note_cursor(cursor);
        self.stamp_last(new_size, offset)
    }

    pub(crate) fn record_growth(&mut self, previous: usize, new_capacity: usize) {
        self.growth_history.push(previous);
        self.peak_capacity = self.peak_capacity.max(new_capacity);
    }

    pub(crate) fn note_cursor(&mut self, cursor: usize) {
        self.peak_usage = self.peak_usage.max(cursor);
    }

    fn stamp_last(&mut self, size: usize, offset: usize) -> u64 {
        let id = self.next_alloc_id;
        self.last_alloc_size = size;
        self.last_alloc_offset = offset;
        self.last_alloc_id = id;
        self.next_alloc_id += 1;
        id
    }
}

impl fmt::Display for ArenaStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  allocations:      {}", self.allocations)?;
        writeln!(f, "  reallocations:    {}", self.reallocations)?;
        writeln!(f, "  failed:           {}", self.failed_allocations)?;
        writeln!(f, "  live:             {}", self.live_allocations)?;
        writeln!(f, "  bytes allocated:  {}", self.bytes_allocated)?;
        writeln!(f, "  alignment waste:  {}", self.wasted_alignment_bytes)?;
        writeln!(f, "  peak usage:       {}", self.peak_usage)?;
        writeln!(f, "  shrinks:          {}", self.shrink_count)?;
        writeln!(
            f,
            "  last alloc:       #{} ({} bytes at {})",
            self.last_alloc_id, self.last_alloc_size, self.last_alloc_offset
        )?;
        write!(f, "  growth history:   {:?}", self.growth_history)
    }
}
