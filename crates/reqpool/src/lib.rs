//! Reqpool: request-scoped arena allocation with explicit ownership.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the reqpool sub-crates. For most users, adding `reqpool` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use reqpool::prelude::*;
//!
//! let greeting = with_request_arena(ArenaConfig::new(4096), |arena| {
//!     let hello = ByteString::copy_str_in(arena, "hello").unwrap();
//!     let mut headers = SegmentedList::new_in(arena, 8).unwrap();
//!     TableEntry::new_in_list(&mut headers)
//!         .unwrap()
//!         .set_key(arena, "Host")
//!         .unwrap()
//!         .set_value(arena, "example.org")
//!         .unwrap()
//!         .set_hash(1);
//!     assert!(headers.find_if(|h| h.key_matches("host")).is_some());
//!
//!     // Copy out anything the caller keeps; the arena dies with the scope.
//!     hello.into_owned()
//! })
//! .unwrap();
//! assert_eq!(greeting, "hello");
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `reqpool-core` | `ArenaId`, `Epoch`, `ArenaError`, `ByteView` |
//! | [`arena`] | `reqpool-arena` | `Arena`, handles, `ArenaAllocator` |
//! | [`bytes`] | `reqpool-bytes` | Byte strings, buffers, lists, chains, table entries |
//! | [`scope`] | this crate | Create-lend-destroy helpers for one request |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod scope;

/// Arena, ownership handles, and the container allocator (`reqpool-arena`).
pub use reqpool_arena as arena;

/// Core identifiers, the error taxonomy, and the [`types::ByteView`] trait
/// (`reqpool-core`).
pub use reqpool_core as types;

/// Arena-backed domain wrappers (`reqpool-bytes`).
pub use reqpool_bytes as bytes;

/// Common imports for typical request handling.
///
/// ```rust
/// use reqpool::prelude::*;
/// ```
pub mod prelude {
    // Arena and handles
    pub use reqpool_arena::{
        Arena, ArenaAllocator, ArenaBox, ArenaConfig, ArenaMap, ArenaRef, ArenaVec, BytesHandle,
        LargeBlock, ResetCleanup,
    };

    // Core types and errors
    pub use reqpool_core::{ArenaError, ArenaId, ByteView, Epoch};

    // Wrappers
    pub use reqpool_bytes::{BufFlags, ByteBuffer, ByteString, LinkChain, SegmentedList, TableEntry};

    // Scope
    pub use crate::scope::{with_request_arena, with_request_arena_mut};
}
