//! Benchmark workloads for the strata arena allocator.
//!
//! Provides deterministic request streams shared by the Criterion benches:
//!
//! - [`small_objects`]: many 8–64 byte requests at default alignment
//! - [`mixed_profile`]: sizes up to 4 KiB with occasional over-alignment
//! - [`request_sizes`]: the seeded size generator behind both profiles

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use strata_arena::config::DEFAULT_ALIGNMENT;
use strata_arena::{Arena, ArenaError};

/// One allocation request in a workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Request {
    /// Bytes requested.
    pub size: usize,
    /// Requested alignment (a power of two).
    pub alignment: usize,
}

/// A named, replayable sequence of allocation requests.
#[derive(Clone, Debug)]
pub struct Workload {
    /// Name used as the benchmark id.
    pub name: &'static str,
    /// The requests, in order.
    pub requests: Vec<Request>,
}

impl Workload {
    /// Sum of requested sizes, ignoring alignment padding.
    pub fn total_bytes(&self) -> usize {
        self.requests.iter().map(|r| r.size).sum()
    }

    /// Capacity that fits the whole workload including worst-case padding.
    pub fn capacity_hint(&self) -> usize {
        self.requests.iter().map(|r| r.size + r.alignment).sum()
    }

    /// Replay every request against `arena`, returning the bytes used.
    pub fn replay(&self, arena: &Arena) -> Result<usize, ArenaError> {
        for r in &self.requests {
            arena.alloc_aligned(r.size, r.alignment)?;
        }
        Ok(arena.used())
    }
}

/// Generate `n` deterministic sizes in `[min, max]` from `seed`.
pub fn request_sizes(n: usize, min: usize, max: usize, seed: u64) -> Vec<usize> {
    let span = (max - min + 1) as u64;
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            min + ((state >> 33) % span) as usize
        })
        .collect()
}

/// `n` small requests (8–64 bytes) at the default alignment.
pub fn small_objects(n: usize, seed: u64) -> Workload {
    Workload {
        name: "small_objects",
        requests: request_sizes(n, 8, 64, seed)
            .into_iter()
            .map(|size| Request {
                size,
                alignment: DEFAULT_ALIGNMENT,
            })
            .collect(),
    }
}

/// `n` requests up to 4 KiB; every eighth is 64-byte aligned and every
/// thirty-second is page aligned.
pub fn mixed_profile(n: usize, seed: u64) -> Workload {
    Workload {
        name: "mixed",
        requests: request_sizes(n, 1, 4096, seed)
            .into_iter()
            .enumerate()
            .map(|(i, size)| Request {
                size,
                alignment: match i {
                    i if i % 32 == 31 => 4096,
                    i if i % 8 == 7 => 64,
                    _ => DEFAULT_ALIGNMENT,
                },
            })
            .collect(),
    }
}
