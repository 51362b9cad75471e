//! Compile-time tunables and arena configuration parameters.

use crate::error::ArenaError;

/// Default alignment for untyped allocations: the size of the widest
/// native integer.
pub const DEFAULT_ALIGNMENT: usize = std::mem::size_of::<u128>();

/// Alignment of every owned backing buffer.
///
/// Blocks aligned to at most this value keep their address alignment
/// across a grow that moves the buffer.
pub const BUFFER_ALIGN: usize = 64;

/// Largest alignment an allocation may request.
pub const MAX_ALIGNMENT: usize = 4096;

/// Upper bound on arena capacity and on any single request (4 GiB on
/// 64-bit targets).
pub const MAX_CAPACITY: usize = (u32::MAX as usize).saturating_add(1);

/// Maximum depth of an arena's built-in marker stack.
pub const MAX_MARKER_DEPTH: usize = 16;

/// Shrinking is only worthwhile when the target is at most this fraction
/// of the current capacity.
pub const MIN_SHRINK_RATIO: f64 = 0.95;

/// Headroom kept above the cursor by [`Arena::might_shrink`](crate::Arena::might_shrink).
pub const SHRINK_PADDING: usize = 64;

/// Smallest capacity the default growth policy starts doubling from.
pub const MIN_GROWTH_SEED: usize = 64;

/// Number of slots in a [`ScratchPool`](crate::ScratchPool).
pub const SCRATCH_SLOTS: usize = 64;

/// Width of a root arena identifier such as `A#000001`.
pub const ID_LEN: usize = 8;

/// Initial capacity of a thread-local scratch arena.
pub const THREAD_SCRATCH_DEFAULT_SIZE: usize = 8 * 1024;

/// 32-bit pattern written over released bytes when the `poison` feature is on.
pub const POISON_PATTERN: u32 = 0xDEAD_BEEF;

/// Label used when the caller does not supply one.
pub const DEFAULT_LABEL: &str = "alloc";

/// Reserved label: allocations carrying it are zero-filled.
pub const CALLOC_LABEL: &str = "arena_calloc_zero";

/// Configuration for a single arena.
///
/// Validated at construction; see [`ArenaConfig::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Initial buffer size in bytes. Zero is allowed for growable arenas.
    pub capacity: usize,

    /// Whether the buffer may be reallocated larger when an allocation
    /// does not fit.
    pub allow_grow: bool,

    /// Optional human-readable label used in diagnostics.
    pub label: Option<String>,
}

impl ArenaConfig {
    /// Default initial capacity: 4 KiB.
    pub const DEFAULT_CAPACITY: usize = 4 * 1024;

    /// Create a fixed-size configuration with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            allow_grow: false,
            label: None,
        }
    }

    /// Set the growth policy flag.
    pub fn growable(mut self, allow_grow: bool) -> Self {
        self.allow_grow = allow_grow;
        self
    }

    /// Attach a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Check the configuration against the global limits.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.capacity > MAX_CAPACITY {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "capacity {} exceeds the maximum of {MAX_CAPACITY} bytes",
                    self.capacity
                ),
            });
        }
        if self.capacity == 0 && !self.allow_grow {
            return Err(ArenaError::InvalidConfig {
                reason: "a fixed-size arena needs a non-zero capacity".into(),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY).growable(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_growable_4k() {
        let config = ArenaConfig::default();
        assert_eq!(config.capacity, 4096);
        assert!(config.allow_grow);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oversized_capacity_rejected() {
        let config = ArenaConfig::new(MAX_CAPACITY + 1);
        assert!(matches!(
            config.validate(),
            Err(ArenaError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn zero_capacity_needs_growth() {
        assert!(ArenaConfig::new(0).validate().is_err());
        assert!(ArenaConfig::new(0).growable(true).validate().is_ok());
    }

    #[test]
    fn label_is_kept() {
        let config = ArenaConfig::new(16).with_label("parser");
        assert_eq!(config.label.as_deref(), Some("parser"));
    }

    #[test]
    fn default_alignment_is_power_of_two() {
        assert!(DEFAULT_ALIGNMENT.is_power_of_two());
        assert!(DEFAULT_ALIGNMENT <= BUFFER_ALIGN);
        assert!(BUFFER_ALIGN <= MAX_ALIGNMENT);
    }
}
