//! Identifiers, labels, error dispatch, poisoning and integrity checks.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::config::{ID_LEN, POISON_PATTERN};
use crate::error::ArenaError;
use crate::stats::ArenaStats;

/// Tag prefixed to every line written by the default error sink.
pub const ERROR_TAG: &str = "[strata]";

/// Counter for unique [`ArenaId`] allocation.
static ARENA_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique arena identifier.
///
/// Every arena, including sub-arenas and scratch arenas, receives a fresh
/// id at construction. Block and marker handles carry the id of the arena
/// that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaId(u64);

impl ArenaId {
    /// Allocate a fresh id. Thread-safe.
    pub fn next() -> Self {
        Self(ARENA_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Display name for a root arena, e.g. `A#000001`.
    pub fn root_name(self) -> String {
        format!("A#{:0width$}", self.0, width = ID_LEN - 2)
    }
}

impl fmt::Display for ArenaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One error, as delivered to an [`ErrorCallback`].
#[derive(Debug)]
pub struct ErrorReport<'a> {
    /// Display name of the arena (`A#000001`, `A#000001.2`, ...).
    pub arena: &'a str,
    /// Debug label, if one was set.
    pub label: Option<&'a str>,
    /// The operation that failed (`alloc`, `pop`, ...).
    pub operation: &'static str,
    /// The error itself.
    pub error: &'a ArenaError,
}

impl fmt::Display for ErrorReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ERROR_TAG} {}", self.arena)?;
        if let Some(label) = self.label {
            write!(f, " ({label})")?;
        }
        write!(f, ": {}: {}", self.operation, self.error)
    }
}

/// Receiver for arena errors.
///
/// Implemented for any `Fn(&ErrorReport<'_>) + Send + Sync`, so a closure
/// capturing its own context works directly. The callback runs on the
/// failing thread without the arena lock held, but must not destroy the
/// arena it is reporting for.
pub trait ErrorCallback: Send + Sync {
    /// Handle one error.
    fn on_error(&self, report: &ErrorReport<'_>);
}

impl<F> ErrorCallback for F
where
    F: Fn(&ErrorReport<'_>) + Send + Sync,
{
    fn on_error(&self, report: &ErrorReport<'_>) {
        self(report)
    }
}

/// Write one line to stderr; used when no callback is installed.
fn default_error_sink(report: &ErrorReport<'_>) {
    let _ = writeln!(std::io::stderr().lock(), "{report}");
}

/// Per-arena diagnostic state that lives outside the arena lock.
pub(crate) struct DebugInfo {
    name: String,
    label: RwLock<Option<String>>,
    on_error: RwLock<Option<Arc<dyn ErrorCallback>>>,
    sub_seq: AtomicU32,
}

impl DebugInfo {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            label: RwLock::new(None),
            on_error: RwLock::new(None),
            sub_seq: AtomicU32::new(0),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn label(&self) -> Option<String> {
        self.label.read().clone()
    }

    pub(crate) fn set_label(&self, label: Option<String>) {
        *self.label.write() = label;
    }

    pub(crate) fn set_callback(&self, callback: Option<Arc<dyn ErrorCallback>>) {
        *self.on_error.write() = callback;
    }

    /// Next sub-arena sequence number (1-based).
    pub(crate) fn next_sub_seq(&self) -> u32 {
        self.sub_seq.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Deliver one error to the installed callback or the stderr sink.
    pub(crate) fn dispatch(&self, operation: &'static str, error: &ArenaError) {
        // Clone out of the locks so the callback may replace itself or the label.
        let label = self.label();
        let callback = self.on_error.read().clone();
        let report = ErrorReport {
            arena: &self.name,
            label: label.as_deref(),
            operation,
            error,
        };
        warn!(arena = %self.name, operation, %error, "arena error");
        match callback {
            Some(cb) => cb.on_error(&report),
            None => default_error_sink(&report),
        }
    }
}

/// Overwrite `bytes` with [`POISON_PATTERN`], repeated from the first byte.
///
/// A no-op unless the `poison` feature is enabled.
#[inline]
pub fn poison(bytes: &mut [u8]) {
    if cfg!(feature = "poison") {
        let pattern = POISON_PATTERN.to_ne_bytes();
        for chunk in bytes.chunks_mut(pattern.len()) {
            chunk.copy_from_slice(&pattern[..chunk.len()]);
        }
    }
}

/// Whether every byte of `bytes` carries the poison pattern.
pub fn is_poisoned(bytes: &[u8]) -> bool {
    let pattern = POISON_PATTERN.to_ne_bytes();
    bytes
        .iter()
        .enumerate()
        .all(|(i, &b)| b == pattern[i % pattern.len()])
}

/// The numbers the integrity check looks at.
pub(crate) struct InvariantView<'a> {
    pub cursor: usize,
    pub capacity: usize,
    pub released: bool,
    pub owns_flag: bool,
    pub owns_backing: bool,
    pub carved: bool,
    pub stats: &'a ArenaStats,
}

/// Verify the structural invariants of one arena.
pub(crate) fn check_invariants(view: &InvariantView<'_>) -> Result<(), ArenaError> {
    let fail = |detail: String| Err(ArenaError::Corrupted { detail });
    let stats = view.stats;
    if view.cursor > view.capacity {
        return fail(format!(
            "cursor {} beyond capacity {}",
            view.cursor, view.capacity
        ));
    }
    if view.released {
        return fail("live arena has released storage".into());
    }
    if view.owns_flag != view.owns_backing {
        return fail(format!(
            "ownership flag {} disagrees with backing",
            view.owns_flag
        ));
    }
    if view.carved && view.owns_flag {
        return fail("sub-arena claims ownership of its buffer".into());
    }
    if view.cursor > stats.peak_usage {
        return fail(format!(
            "cursor {} above peak usage {}",
            view.cursor, stats.peak_usage
        ));
    }
    if stats.peak_usage > stats.peak_capacity.max(view.capacity) {
        return fail(format!(
            "peak usage {} above peak capacity {}",
            stats.peak_usage, stats.peak_capacity
        ));
    }
    if stats.reallocations > stats.allocations {
        return fail(format!(
            "{} reallocations exceed {} allocations",
            stats.reallocations, stats.allocations
        ));
    }
    if stats.live_allocations > stats.allocations {
        return fail(format!(
            "{} live allocations exceed {} allocations",
            stats.live_allocations, stats.allocations
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = ArenaId::next();
        let b = ArenaId::next();
        assert!(b > a);
    }

    #[test]
    fn root_name_has_fixed_width() {
        let id = ArenaId(7);
        assert_eq!(id.root_name(), "A#000007");
        assert_eq!(id.root_name().len(), ID_LEN);
    }

    #[test]
    fn report_formats_tag_label_and_error() {
        let err = ArenaError::ZeroSize;
        let report = ErrorReport {
            arena: "A#000001",
            label: Some("parser"),
            operation: "alloc",
            error: &err,
        };
        let line = report.to_string();
        assert!(line.starts_with("[strata] A#000001 (parser): alloc:"));
        assert!(line.contains("zero-size"));
    }

    #[test]
    fn dispatch_uses_installed_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let info = DebugInfo::new("A#000009".into());
        info.set_label(Some("frame".into()));
        info.set_callback(Some(Arc::new(move |r: &ErrorReport<'_>| {
            sink.lock().unwrap().push(r.to_string());
        })));
        info.dispatch("reset", &ArenaError::Destroyed);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("(frame): reset: arena is destroyed"));
    }

    #[test]
    fn sub_sequence_starts_at_one() {
        let info = DebugInfo::new("A#000001".into());
        assert_eq!(info.next_sub_seq(), 1);
        assert_eq!(info.next_sub_seq(), 2);
    }

    #[cfg(feature = "poison")]
    #[test]
    fn poison_writes_pattern_over_odd_lengths() {
        let mut bytes = [0u8; 7];
        poison(&mut bytes);
        assert!(is_poisoned(&bytes));
        let pattern = POISON_PATTERN.to_ne_bytes();
        assert_eq!(&bytes[4..7], &pattern[..3]);
    }

    #[test]
    fn invariants_accept_consistent_state() {
        let mut stats = ArenaStats::new(128);
        stats.record_alloc(64, 0, 0, 64);
        let view = InvariantView {
            cursor: 64,
            capacity: 128,
            released: false,
            owns_flag: true,
            owns_backing: true,
            carved: false,
            stats: &stats,
        };
        assert!(check_invariants(&view).is_ok());
    }

    #[test]
    fn invariants_reject_cursor_past_capacity() {
        let mut stats = ArenaStats::new(128);
        stats.note_cursor(200);
        let view = InvariantView {
            cursor: 200,
            capacity: 128,
            released: false,
            owns_flag: true,
            owns_backing: true,
            carved: false,
            stats: &stats,
        };
        assert!(matches!(
            check_invariants(&view),
            Err(ArenaError::Corrupted { .. })
        ));
    }

    #[test]
    fn invariants_reject_ownership_mismatch() {
        let stats = ArenaStats::new(128);
        let view = InvariantView {
            cursor: 0,
            capacity: 128,
            released: false,
            owns_flag: false,
            owns_backing: true,
            carved: false,
            stats: &stats,
        };
        assert!(matches!(
            check_invariants(&view),
            Err(ArenaError::Corrupted { .. })
        ));
    }

    #[test]
    fn invariants_reject_released_storage_on_live_arena() {
        let stats = ArenaStats::default();
        let view = InvariantView {
            cursor: 0,
            capacity: 0,
            released: true,
            owns_flag: false,
            owns_backing: false,
            carved: false,
            stats: &stats,
        };
        assert!(matches!(
            check_invariants(&view),
            Err(ArenaError::Corrupted { .. })
        ));
    }
}
