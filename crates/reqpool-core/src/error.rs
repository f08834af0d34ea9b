//! Error types for arena allocation.
//!
//! Only allocation-side conditions are errors. Operating on an empty or
//! moved-from wrapper is not: those calls degrade to empty results at the
//! call site and never surface here.

use thiserror::Error;

use crate::id::ArenaId;

/// Errors that can occur during arena operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// The arena's byte budget is exhausted.
    #[error("arena capacity exceeded: requested {requested} bytes, capacity {capacity} bytes")]
    CapacityExceeded {
        /// Number of bytes requested.
        requested: usize,
        /// Total byte budget of the arena.
        capacity: usize,
    },
    /// `count * elem_size` does not fit in `usize` (or exceeds `isize::MAX`).
    #[error("allocation size overflow: {count} elements of {elem_size} bytes")]
    SizeOverflow {
        /// Requested element count.
        count: usize,
        /// Size of one element in bytes.
        elem_size: usize,
    },
    /// The system allocator refused to hand out a backing block.
    #[error("system allocator failed to provide {bytes} bytes")]
    SystemAllocFailed {
        /// Size of the refused block in bytes.
        bytes: usize,
    },
    /// Allocation attempted through an arena that has been destroyed.
    #[error("arena {arena} has been destroyed")]
    ArenaExpired {
        /// The destroyed arena.
        arena: ArenaId,
    },
    /// Arena configuration failed validation.
    #[error("invalid arena config: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// A size/alignment pair that does not form a valid layout.
    #[error("invalid layout: size {size}, align {align}")]
    InvalidLayout {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment in bytes.
        align: usize,
    },
}

impl ArenaError {
    /// Whether this error belongs to the allocation-failure class
    /// (budget exhausted, size overflow, or system refusal).
    pub fn is_allocation_failure(&self) -> bool {
        matches!(
            self,
            Self::CapacityExceeded { .. } | Self::SizeOverflow { .. } | Self::SystemAllocFailed { .. }
        )
    }
}
