//! Low-level primitives for arena memory operations.
//!
//! This is the only place that talks to the system allocator. Every
//! block, scratch or large, is a [`RawBlock`]: a non-null pointer plus
//! the layout it was obtained with, released exactly once on drop.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Alignment of every block handed out by [`RawBlock::allocate`], unless
/// the caller asks for more.
pub(crate) const BLOCK_ALIGN: usize = 16;

/// A block of memory obtained from the system allocator.
///
/// Owns its allocation. The address never changes for the lifetime of
/// the value, which is what lets the arena hand out references into it
/// while other blocks are appended.
pub(crate) struct RawBlock {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl RawBlock {
    /// Obtain `size` bytes aligned to at least [`BLOCK_ALIGN`].
    ///
    /// Returns `None` if the layout is invalid, the size is zero, or the
    /// system allocator refuses.
    pub(crate) fn allocate(size: usize, align: usize, zeroed: bool) -> Option<Self> {
        if size == 0 {
            return None;
        }
        let layout = Layout::from_size_align(size, align.max(BLOCK_ALIGN)).ok()?;
        // SAFETY: `layout` has a non-zero size, checked above.
        let raw = unsafe {
            if zeroed {
                alloc::alloc_zeroed(layout)
            } else {
                alloc::alloc(layout)
            }
        };
        NonNull::new(raw).map(|ptr| Self { ptr, layout })
    }

    /// Base address of the block.
    pub(crate) fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Size of the block in bytes.
    pub(crate) fn len(&self) -> usize {
        self.layout.size()
    }

    /// Whether `addr..addr + len` lies entirely inside this block.
    pub(crate) fn contains_range(&self, addr: usize, len: usize) -> bool {
        let base = self.ptr.as_ptr() as usize;
        match addr.checked_add(len) {
            Some(end) => addr >= base && end <= base + self.len(),
            None => false,
        }
    }

    /// Pointer `offset` bytes past the base.
    ///
    /// Returns `None` if `offset` is past the end of the block.
    pub(crate) fn at(&self, offset: usize) -> Option<NonNull<u8>> {
        if offset > self.len() {
            return None;
        }
        // SAFETY: `offset <= len`, so the result is in bounds or one past
        // the end of the same allocation.
        Some(unsafe { self.ptr.add(offset) })
    }
}

impl Drop for RawBlock {
    fn drop(&mut self) {
        // SAFETY: `ptr` was returned by `alloc`/`alloc_zeroed` with exactly
        // this layout and is released only here.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl std::fmt::Debug for RawBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawBlock")
            .field("ptr", &self.ptr)
            .field("len", &self.len())
            .field("align", &self.layout.align())
            .finish()
    }
}
