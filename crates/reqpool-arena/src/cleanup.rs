//! Cleanup registry: teardown work deferred to arena reset/destroy.
//!
//! Two kinds of entries share one LIFO list:
//!
//! - **Callbacks** registered by users (`FnOnce()`), run synchronously
//!   when the arena is destroyed (and at reset, depending on
//!   [`ResetCleanup`]).
//! - **In-place destructors** for values constructed inside arena memory.
//!   These bridge arena teardown to Rust `Drop` and always run before the
//!   memory holding the value is recycled.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::{self, NonNull};

use smallvec::SmallVec;

use crate::config::ResetCleanup;

/// Identifies a registered cleanup (registration sequence number).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CleanupId(pub u32);

impl fmt::Display for CleanupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

enum Entry {
    Callback(Box<dyn FnOnce()>),
    InPlace {
        drop_fn: unsafe fn(NonNull<u8>),
        data: NonNull<u8>,
    },
}

/// Drop the `T` at `data`.
///
/// # Safety
///
/// `data` must point to a live, initialised `T` that nothing else will
/// drop or use afterwards.
unsafe fn drop_erased<T>(data: NonNull<u8>) {
    // SAFETY: upheld by the caller.
    unsafe { ptr::drop_in_place(data.cast::<T>().as_ptr()) }
}

/// Ordered list of pending cleanups.
///
/// Entries are appended in registration order and run in reverse,
/// mirroring stack unwinding. Most requests register only a handful, so
/// the first eight live inline.
pub(crate) struct CleanupRegistry {
    entries: SmallVec<[(CleanupId, Entry); 8]>,
    next_id: u32,
}

impl CleanupRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: SmallVec::new(),
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> CleanupId {
        let id = CleanupId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Append a user callback.
    pub(crate) fn push_callback(&mut self, callback: Box<dyn FnOnce()>) -> CleanupId {
        let id = self.next_id();
        self.entries.push((id, Entry::Callback(callback)));
        id
    }

    /// Append an in-place destructor for the `T` at `data`.
    ///
    /// # Safety
    ///
    /// `data` must point to a live `T` in memory that stays allocated
    /// until this entry runs, and nothing else may drop that `T`.
    pub(crate) unsafe fn push_in_place<T>(&mut self, data: NonNull<T>) -> CleanupId {
        let id = self.next_id();
        self.entries.push((
            id,
            Entry::InPlace {
                drop_fn: drop_erased::<T>,
                data: data.cast(),
            },
        ));
        id
    }

    /// Run every entry, newest first, leaving the registry empty.
    pub(crate) fn run_all(&mut self) -> usize {
        let mut ran = 0;
        // Pop one at a time so a panicking cleanup never leaves an entry
        // behind to run twice.
        while let Some((_, entry)) = self.entries.pop() {
            run(entry);
            ran += 1;
        }
        ran
    }

    /// Run entries whose storage is about to be recycled.
    ///
    /// In-place destructors always run. Callbacks run too under
    /// [`ResetCleanup::Run`]; under [`ResetCleanup::Defer`] they are kept,
    /// in their original order, for destruction time.
    pub(crate) fn run_for_reset(&mut self, policy: ResetCleanup) -> usize {
        let mut kept: SmallVec<[(CleanupId, Entry); 8]> = SmallVec::new();
        let mut ran = 0;
        while let Some((id, entry)) = self.entries.pop() {
            match (&entry, policy) {
                (Entry::Callback(_), ResetCleanup::Defer) => kept.push((id, entry)),
                _ => {
                    run(entry);
                    ran += 1;
                }
            }
        }
        kept.reverse();
        self.entries = kept;
        ran
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

fn run(entry: Entry) {
    match entry {
        Entry::Callback(callback) => callback(),
        // SAFETY: `push_in_place` callers guarantee the value is live and
        // exclusively ours; the entry was popped, so it runs only once.
        Entry::InPlace { drop_fn, data } => unsafe { drop_fn(data) },
    }
}

impl Drop for CleanupRegistry {
    fn drop(&mut self) {
        self.run_all();
    }
}
