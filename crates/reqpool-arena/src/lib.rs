//! Request-scoped bump arena with ownership handles.
//!
//! An [`Arena`] serves every allocation made while handling one request
//! and releases them all at once when the request ends. This is the
//! only crate in the workspace that contains `unsafe` code; it is
//! confined to the modules that touch raw memory, each carrying its own
//! `allow`.
//!
//! # Architecture
//!
//! ```text
//! Arena (lifecycle: live → destroyed, epoch bumped on reset/destroy)
//! ├── BlockList → Block[] (scratch tier, bump-allocated, never moved)
//! ├── LargeObjects (large tier, one system allocation each, freeable)
//! ├── CleanupRegistry (callbacks + in-place destructors, run LIFO)
//! └── Budget (optional byte cap across both tiers)
//! ```
//!
//! # Ownership
//!
//! - [`ArenaBox`] owns a value in arena memory and drops it exactly once.
//! - [`ArenaRef`] observes a value and never releases it.
//! - [`LargeBlock`] owns a large-tier region and frees it on drop.
//! - [`BytesHandle`] locates scratch bytes without a borrow and stops
//!   resolving once the arena resets or is destroyed.
//!
//! [`ArenaAllocator`] lets `allocator-api2` vectors and `hashbrown` maps
//! use the arena as their backing store.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod allocator;
pub mod arena;
pub mod block;
mod budget;
pub mod cleanup;
pub mod config;
pub mod handle;
mod large;
mod raw;

// Public re-exports for the primary API surface.
pub use allocator::{
    clone_into_arena, vec_with_capacity_in, ArenaAllocator, ArenaMap, ArenaVec,
};
pub use arena::{Arena, ArenaStats, Reclaim};
pub use cleanup::CleanupId;
pub use config::{ArenaConfig, ResetCleanup};
pub use handle::{ArenaBox, ArenaRef, BytesHandle, LargeBlock};
pub use reqpool_core::ArenaError;
