//! Arena-backed byte strings, buffers, lists, chains and table entries.
//!
//! Every wrapper here has an explicit invalid state (its `Default`) that
//! is also what `take()` leaves behind. Queries on an invalid value
//! return empty results and mutations are no-ops; only allocation can
//! fail, and it reports an [`ArenaError`].
//!
//! | Wrapper | Storage | Owns |
//! |---|---|---|
//! | [`ByteString`] | borrowed view or heap copy | the heap copy |
//! | [`ByteBuffer`] | view, arena copy, or heap copy, plus [`BufFlags`] | the heap copy |
//! | [`SegmentedList`] | fixed-capacity arena segments | its elements |
//! | [`LinkChain`] | arena nodes holding [`ByteBuffer`]s | its buffers |
//! | [`TableEntry`] | key/value ranges into arena or caller memory | nothing |
//!
//! Anything that must outlive the request is copied out first with
//! [`ByteString::into_owned`], [`ByteBuffer::into_owned`] or
//! [`TableEntry::to_owned_pair`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod chain;
pub mod list;
pub mod string;
pub mod table;

pub use buffer::{BufFlags, ByteBuffer};
pub use chain::LinkChain;
pub use list::SegmentedList;
pub use reqpool_core::{ArenaError, ByteView};
pub use string::ByteString;
pub use table::TableEntry;
