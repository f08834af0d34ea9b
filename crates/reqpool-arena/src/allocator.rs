//! Container allocator backed by an [`Arena`].
//!
//! [`ArenaAllocator`] is a typed, `Copy` adapter over `&Arena`. It
//! implements [`allocator_api2::alloc::Allocator`], so the
//! `allocator-api2` `Vec` and `hashbrown` maps can draw their storage
//! from a request arena. Small buffers are bump-allocated and reclaimed
//! wholesale; large ones go to the large tier and are freed as soon as
//! the container releases them.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

use allocator_api2::alloc::{AllocError, Allocator};
use reqpool_core::{ArenaError, ArenaId};

use crate::arena::{Arena, Reclaim};

/// `Vec` whose buffer lives in an arena.
pub type ArenaVec<'a, T> = allocator_api2::vec::Vec<T, ArenaAllocator<'a, T>>;

/// `HashMap` whose table lives in an arena.
pub type ArenaMap<'a, K, V, S = hashbrown::DefaultHashBuilder> =
    hashbrown::HashMap<K, V, S, ArenaAllocator<'a, (K, V)>>;

/// Typed allocator drawing from an [`Arena`].
///
/// Two allocators compare equal iff they draw from the same arena,
/// whatever their element types. The element type only drives
/// [`allocate`](ArenaAllocator::allocate) sizing; [`rebind`](ArenaAllocator::rebind)
/// switches it.
pub struct ArenaAllocator<'a, T> {
    arena: &'a Arena,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T> ArenaAllocator<'a, T> {
    /// Allocator over `arena`.
    pub fn new(arena: &'a Arena) -> Self {
        Self {
            arena,
            _marker: PhantomData,
        }
    }

    /// The backing arena.
    pub fn arena(&self) -> &'a Arena {
        self.arena
    }

    /// Identity of the backing arena.
    pub fn arena_id(&self) -> ArenaId {
        self.arena.id()
    }

    /// Uninitialised storage for `n` values of `T`.
    ///
    /// # Errors
    ///
    /// `SizeOverflow` if `n * size_of::<T>()` overflows, `ArenaExpired`
    /// if the arena has been destroyed, or an allocation failure.
    pub fn allocate(&self, n: usize) -> Result<NonNull<T>, ArenaError> {
        let layout = array_layout::<T>(n)?;
        Ok(self.arena.alloc_layout(layout)?.cast())
    }

    /// Hand storage from [`allocate`](ArenaAllocator::allocate) back.
    ///
    /// Best-effort; see [`Arena::dealloc_layout`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate(n)` on an allocator over the same
    /// arena and must not be used afterwards.
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) -> Reclaim {
        match array_layout::<T>(n) {
            // SAFETY: forwarded from the caller.
            Ok(layout) => unsafe { self.arena.dealloc_layout(ptr.cast(), layout) },
            Err(_) => Reclaim::Deferred,
        }
    }

    /// The same arena, typed for `U`.
    pub fn rebind<U>(&self) -> ArenaAllocator<'a, U> {
        ArenaAllocator::new(self.arena)
    }

    /// Largest `n` that [`allocate`](ArenaAllocator::allocate) could
    /// possibly satisfy.
    pub fn max_size(&self) -> usize {
        let bytes = self
            .arena
            .config()
            .max_bytes
            .unwrap_or(isize::MAX as usize)
            .min(isize::MAX as usize);
        bytes / mem::size_of::<T>().max(1)
    }

    /// Move `value` into `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes and aligned for `T`. Any value
    /// already there is overwritten without being dropped.
    pub unsafe fn construct(&self, ptr: NonNull<T>, value: T) {
        // SAFETY: forwarded from the caller.
        unsafe { ptr.as_ptr().write(value) }
    }

    /// Run the destructor of the value at `ptr`. Never frees memory.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live `T` that is not used or dropped again.
    pub unsafe fn destroy(&self, ptr: NonNull<T>) {
        // SAFETY: forwarded from the caller.
        unsafe { ptr::drop_in_place(ptr.as_ptr()) }
    }
}

fn array_layout<T>(n: usize) -> Result<Layout, ArenaError> {
    Layout::array::<T>(n).map_err(|_| ArenaError::SizeOverflow {
        count: n,
        elem_size: mem::size_of::<T>(),
    })
}

impl<T> Clone for ArenaAllocator<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaAllocator<'_, T> {}

impl<T, U> PartialEq<ArenaAllocator<'_, U>> for ArenaAllocator<'_, T> {
    fn eq(&self, other: &ArenaAllocator<'_, U>) -> bool {
        self.arena.id() == other.arena.id()
    }
}

impl<T> Eq for ArenaAllocator<'_, T> {}

impl<T> fmt::Debug for ArenaAllocator<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaAllocator")
            .field("arena", &self.arena.id())
            .field("elem", &std::any::type_name::<T>())
            .finish()
    }
}

// SAFETY: blocks stay valid until deallocated or until the arena resets
// or is destroyed, and both of those need `&mut Arena`, which cannot
// coexist with the `&'a Arena` every copy of this allocator holds. Copies
// share the arena, so any copy may free what another allocated.
unsafe impl<T> Allocator for ArenaAllocator<'_, T> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        let ptr = self.arena.alloc_layout(layout).map_err(|_| AllocError)?;
        Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: the `Allocator` contract gives us a block from this
        // allocator with this layout, never used again.
        unsafe {
            self.arena.dealloc_layout(ptr, layout);
        }
    }
}

/// Empty vector with room for exactly `capacity` elements in `arena`.
///
/// Unlike `ArenaVec::with_capacity_in`, failure is reported as an
/// [`ArenaError`] instead of aborting. Pushing up to `capacity` elements
/// never reallocates.
pub fn vec_with_capacity_in<T>(
    capacity: usize,
    arena: &Arena,
) -> Result<ArenaVec<'_, T>, ArenaError> {
    let alloc = ArenaAllocator::new(arena);
    if capacity == 0 {
        return Ok(ArenaVec::new_in(alloc));
    }
    let ptr = alloc.allocate(capacity)?;
    // SAFETY: `ptr` was allocated by `alloc` for exactly `capacity`
    // elements of `T`, and the vector starts out empty.
    Ok(unsafe { ArenaVec::from_raw_parts_in(ptr.as_ptr(), 0, capacity, alloc) })
}

/// Copy `src` into a new vector backed by `target`.
///
/// Always allocates fresh storage in `target`, so the result never
/// shares memory with wherever `src` lives (another arena included).
pub fn clone_into_arena<'b, T: Clone>(
    src: &[T],
    target: &'b Arena,
) -> Result<ArenaVec<'b, T>, ArenaError> {
    let mut out = vec_with_capacity_in(src.len(), target)?;
    out.extend_from_slice(src);
    Ok(out)
}
