//! Core types and traits for the reqpool arena ownership model.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the arena and the byte wrappers: arena
//! identity, the allocation error taxonomy, and the read-only byte trait
//! every wrapper implements.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod traits;

pub use error::ArenaError;
pub use id::{ArenaId, Epoch};
pub use traits::ByteView;
