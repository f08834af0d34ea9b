//! Test utilities and fixtures for reqpool development.
//!
//! Provides drop accounting ([`DropCounter`]), an ordered record of
//! cleanup callbacks ([`CallLog`]), a one-shot tracing subscriber for
//! tests that want to see arena events, and arena [`fixtures`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing_subscriber::EnvFilter;

/// Counts how many of its [`DropToken`]s have been dropped.
///
/// Clone the counter freely; clones share one count.
#[derive(Clone, Debug, Default)]
pub struct DropCounter {
    dropped: Rc<Cell<usize>>,
}

impl DropCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A value that bumps this counter when dropped.
    pub fn token(&self) -> DropToken {
        DropToken {
            dropped: Rc::clone(&self.dropped),
        }
    }

    /// Number of tokens dropped so far.
    pub fn dropped(&self) -> usize {
        self.dropped.get()
    }
}

/// Bumps its [`DropCounter`] exactly once, on drop.
#[derive(Debug)]
pub struct DropToken {
    dropped: Rc<Cell<usize>>,
}

impl Drop for DropToken {
    fn drop(&mut self) {
        self.dropped.set(self.dropped.get() + 1);
    }
}

/// Ordered log of labels, for asserting cleanup order.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    entries: Rc<RefCell<Vec<&'static str>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `'static` callback that appends `label` when run.
    pub fn recorder(&self, label: &'static str) -> impl FnOnce() + 'static {
        let entries = Rc::clone(&self.entries);
        move || entries.borrow_mut().push(label)
    }

    /// Labels recorded so far, oldest first.
    pub fn entries(&self) -> Vec<&'static str> {
        self.entries.borrow().clone()
    }

    /// Number of recorded calls.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Install a test-friendly `fmt` subscriber filtered by `RUST_LOG`.
///
/// Safe to call from many tests; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
