//! Test utilities for strata development.
//!
//! Provides recording implementations of the arena observer traits
//! ([`AllocationHook`], [`ErrorCallback`]), a tracing initialiser for
//! tests, and arena [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::Arc;

use parking_lot::Mutex;
use strata_arena::{AllocEvent, AllocationHook, Arena, ArenaError, ErrorCallback, ErrorKind, ErrorReport};

pub use fixtures::{filled_arena, leaked_buffer};

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Honours `RUST_LOG`. Safe to call from every test; only the first call
/// installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One allocation as seen by a [`RecordingHook`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocRecord {
    pub arena_name: String,
    pub id: u64,
    pub offset: usize,
    pub size: usize,
    pub alignment_waste: usize,
    pub label: String,
}

/// Allocation hook that records every event.
///
/// Clones share the same log, so one clone can be installed while the
/// test keeps another for inspection.
#[derive(Clone, Default)]
pub struct RecordingHook {
    records: Arc<Mutex<Vec<AllocRecord>>>,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a clone of this hook on `arena`.
    pub fn install(&self, arena: &Arena) {
        arena.set_allocation_hook(self.clone());
    }

    pub fn records(&self) -> Vec<AllocRecord> {
        self.records.lock().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl AllocationHook for RecordingHook {
    fn on_alloc(&self, event: &AllocEvent<'_>) {
        self.records.lock().push(AllocRecord {
            arena_name: event.arena_name.to_owned(),
            id: event.id,
            offset: event.offset,
            size: event.size,
            alignment_waste: event.alignment_waste,
            label: event.label.to_owned(),
        });
    }
}

/// One error as seen by an [`ErrorLog`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorEntry {
    pub arena: String,
    pub label: Option<String>,
    pub operation: &'static str,
    pub error: ArenaError,
    /// The formatted report line.
    pub line: String,
}

/// Error callback that collects reports instead of printing them.
#[derive(Clone, Default)]
pub struct ErrorLog {
    entries: Arc<Mutex<Vec<ErrorEntry>>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a clone of this log on `arena`.
    pub fn install(&self, arena: &Arena) {
        arena.set_error_callback(self.clone());
    }

    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.entries.lock().clone()
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.entries.lock().iter().map(|e| e.error.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl ErrorCallback for ErrorLog {
    fn on_error(&self, report: &ErrorReport<'_>) {
        self.entries.lock().push(ErrorEntry {
            arena: report.arena.to_owned(),
            label: report.label.map(str::to_owned),
            operation: report.operation,
            error: report.error.clone(),
            line: report.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_hook_sees_labels() {
        let arena = Arena::new(256, false).unwrap();
        let hook = RecordingHook::new();
        hook.install(&arena);
        arena.alloc_labeled(8, "first").unwrap();
        arena.calloc(2, 4).unwrap();
        assert_eq!(hook.labels(), vec!["first", strata_arena::config::CALLOC_LABEL]);
        let records = hook.records();
        assert_eq!(records[0].id, 0);
        assert_eq!(records[1].size, 8);
    }

    #[test]
    fn error_log_collects_reports() {
        let arena = Arena::new(32, false).unwrap();
        arena.set_debug_label("tiny");
        let log = ErrorLog::new();
        log.install(&arena);
        assert!(arena.alloc(64).is_err());
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, "alloc");
        assert_eq!(entries[0].label.as_deref(), Some("tiny"));
        assert!(entries[0].line.starts_with("[strata] "));
        assert_eq!(log.kinds(), vec![ErrorKind::Exhausted]);
    }
}
