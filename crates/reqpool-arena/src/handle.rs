//! Ownership handles over arena memory.
//!
//! - [`ArenaBox`] owns a value placed in arena memory and runs its
//!   destructor exactly once. The memory itself stays with the arena.
//! - [`ArenaRef`] observes a value without ever releasing it.
//! - [`LargeBlock`] owns a large-tier byte region and frees it on drop.
//! - [`BytesHandle`] is a detached, epoch-scoped locator for scratch
//!   bytes. It carries no lifetime and resolves to nothing once the arena
//!   is reset or destroyed.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use reqpool_core::{ArenaError, ArenaId, Epoch};

use crate::arena::Arena;

/// Owning handle to a `T` living in arena memory.
///
/// Either empty or the sole owner of its target's teardown. Dropping a
/// bound box runs `T::drop` in place; the bytes are reclaimed when the
/// arena resets or is destroyed. Not `Clone`: use [`ArenaBox::clone_in`]
/// for an explicit deep copy.
pub struct ArenaBox<'a, T> {
    ptr: Option<NonNull<T>>,
    _marker: PhantomData<(&'a Arena, T)>,
}

impl<'a, T> ArenaBox<'a, T> {
    /// Move `value` into `arena` and take ownership of it.
    pub fn new_in(arena: &'a Arena, value: T) -> Result<Self, ArenaError> {
        let ptr = arena.alloc_layout(std::alloc::Layout::new::<T>())?.cast::<T>();
        // SAFETY: `ptr` is fresh, aligned for `T` and exclusively ours.
        unsafe { ptr.as_ptr().write(value) };
        Ok(Self {
            ptr: Some(ptr),
            _marker: PhantomData,
        })
    }

    /// A box that owns nothing.
    pub const fn empty() -> Self {
        Self {
            ptr: None,
            _marker: PhantomData,
        }
    }

    /// Whether the box currently owns a value.
    pub fn is_valid(&self) -> bool {
        self.ptr.is_some()
    }

    /// Shared access to the value.
    pub fn get(&self) -> Option<&T> {
        // SAFETY: a bound pointer refers to a live `T` we own.
        self.ptr.map(|p| unsafe { &*p.as_ptr() })
    }

    /// Exclusive access to the value.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: as in `get`; `&mut self` guarantees exclusivity.
        self.ptr.map(|p| unsafe { &mut *p.as_ptr() })
    }

    /// Raw pointer to the value, null when empty.
    pub fn as_ptr(&self) -> *const T {
        self.ptr.map_or(ptr::null(), |p| p.as_ptr().cast_const())
    }

    /// Move ownership out, leaving this box empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        Self {
            ptr: self.ptr.take(),
            _marker: PhantomData,
        }
    }

    /// Release the current value (running its destructor), then adopt
    /// `other`'s.
    pub fn replace(&mut self, other: Self) {
        *self = other;
    }

    /// Non-owning view of the value.
    pub fn view(&self) -> ArenaRef<'_, T> {
        ArenaRef { target: self.get() }
    }

    /// Move the value back out of the arena, leaving this box empty.
    pub fn into_inner(mut self) -> Option<T> {
        // SAFETY: the pointer is taken, so `Drop` will not touch the value
        // again after we read it out.
        self.ptr.take().map(|p| unsafe { p.as_ptr().read() })
    }
}

impl<T: Clone> ArenaBox<'_, T> {
    /// Deep-copy the value into `arena`. An empty box copies to an empty
    /// box.
    pub fn clone_in<'b>(&self, arena: &'b Arena) -> Result<ArenaBox<'b, T>, ArenaError> {
        match self.get() {
            Some(value) => ArenaBox::new_in(arena, value.clone()),
            None => Ok(ArenaBox::empty()),
        }
    }
}

impl<T> Default for ArenaBox<'_, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Drop for ArenaBox<'_, T> {
    fn drop(&mut self) {
        if let Some(p) = self.ptr.take() {
            // SAFETY: we own the live `T` at `p`, and `take` guarantees this
            // runs at most once.
            unsafe { ptr::drop_in_place(p.as_ptr()) }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ArenaBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArenaBox").field(&self.get()).finish()
    }
}

/// Non-owning handle to a `T`.
///
/// Never releases its target. The lifetime ties it to whatever owns the
/// value (an [`ArenaBox`], the arena, or a longer-lived scope).
pub struct ArenaRef<'a, T> {
    target: Option<&'a T>,
}

impl<'a, T> ArenaRef<'a, T> {
    /// Observe `target`.
    pub const fn new(target: &'a T) -> Self {
        Self {
            target: Some(target),
        }
    }

    /// A handle that observes nothing.
    pub const fn empty() -> Self {
        Self { target: None }
    }

    /// Whether the handle is bound.
    pub fn is_valid(&self) -> bool {
        self.target.is_some()
    }

    /// The observed value.
    pub fn get(&self) -> Option<&'a T> {
        self.target
    }

    /// Raw pointer to the target, null when empty.
    pub fn as_ptr(&self) -> *const T {
        self.target.map_or(ptr::null(), |t| t as *const T)
    }

    /// Move the binding out, leaving this handle empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        Self {
            target: self.target.take(),
        }
    }
}

impl<T> Clone for ArenaRef<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaRef<'_, T> {}

impl<T> Default for ArenaRef<'_, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, T> From<&'a T> for ArenaRef<'a, T> {
    fn from(target: &'a T) -> Self {
        Self::new(target)
    }
}

impl<T: fmt::Debug> fmt::Debug for ArenaRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArenaRef").field(&self.target).finish()
    }
}

/// Owning handle to a large-tier byte region.
///
/// The bytes are zero-filled on allocation and returned to the system as
/// soon as the block is dropped, independently of the arena's lifetime.
pub struct LargeBlock<'a> {
    arena: &'a Arena,
    ptr: NonNull<u8>,
    len: usize,
}

impl<'a> LargeBlock<'a> {
    pub(crate) fn new(arena: &'a Arena, ptr: NonNull<u8>, len: usize) -> Self {
        Self { arena, ptr, len }
    }

    /// The arena the block was drawn from.
    pub fn arena(&self) -> &'a Arena {
        self.arena
    }

    /// Base address of the region.
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }
}

impl Deref for LargeBlock<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `len` initialised bytes we own (or
        // dangling with `len == 0`).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for LargeBlock<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as in `deref`; `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for LargeBlock<'_> {
    fn drop(&mut self) {
        if self.len > 0 {
            self.arena.free_large(self.ptr);
        }
    }
}

impl fmt::Debug for LargeBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LargeBlock")
            .field("arena", &self.arena.id())
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

/// Detached location of scratch bytes within an arena.
///
/// Scoped to one arena epoch: the `epoch` field allows O(1) staleness
/// checks without a lookup table. Obtained from
/// [`Arena::detach`](crate::Arena::detach) and turned back into bytes by
/// [`Arena::resolve`](crate::Arena::resolve).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct BytesHandle {
    pub(crate) arena: ArenaId,
    pub(crate) epoch: Epoch,
    pub(crate) block: u32,
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

impl BytesHandle {
    /// The arena this handle points into.
    pub fn arena(&self) -> ArenaId {
        self.arena
    }

    /// The epoch this handle was taken in.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the handle covers zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for BytesHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arena#{}@{}[block {}, +{}, {} bytes]",
            self.arena, self.epoch, self.block, self.offset, self.len
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counted(Rc<Cell<u32>>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn arena() -> Arena {
        Arena::with_size_hint(4096).unwrap()
    }

    #[test]
    fn box_drops_value_once() {
        let arena = arena();
        let drops = Rc::new(Cell::new(0));
        {
            let b = ArenaBox::new_in(&arena, Counted(Rc::clone(&drops))).unwrap();
            assert!(b.is_valid());
        }
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn take_transfers_ownership() {
        let arena = arena();
        let drops = Rc::new(Cell::new(0));
        let mut a = ArenaBox::new_in(&arena, Counted(Rc::clone(&drops))).unwrap();
        let b = a.take();
        assert!(!a.is_valid());
        assert!(a.get().is_none());
        assert!(a.as_ptr().is_null());
        assert!(b.is_valid());
        drop(a);
        assert_eq!(drops.get(), 0);
        drop(b);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn moves_release_once() {
        let arena = arena();
        let drops = Rc::new(Cell::new(0));
        let a = ArenaBox::new_in(&arena, Counted(Rc::clone(&drops))).unwrap();
        let b = a;
        let c = b;
        drop(c);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn replace_releases_previous_target_first() {
        let arena = arena();
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let mut a = ArenaBox::new_in(&arena, Counted(Rc::clone(&first))).unwrap();
        a.replace(ArenaBox::new_in(&arena, Counted(Rc::clone(&second))).unwrap());
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 0);
        drop(a);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn view_observes_without_releasing() {
        let arena = arena();
        let drops = Rc::new(Cell::new(0));
        let owner = ArenaBox::new_in(&arena, Counted(Rc::clone(&drops))).unwrap();
        {
            let view = owner.view();
            let copy = view;
            assert!(copy.is_valid());
            assert_eq!(copy.as_ptr(), owner.as_ptr());
        }
        assert_eq!(drops.get(), 0);
        drop(owner);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn into_inner_skips_in_place_drop() {
        let arena = arena();
        let drops = Rc::new(Cell::new(0));
        let b = ArenaBox::new_in(&arena, Counted(Rc::clone(&drops))).unwrap();
        let value = b.into_inner().unwrap();
        assert_eq!(drops.get(), 0);
        drop(value);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn clone_in_copies_into_other_arena() {
        let a = arena();
        let b = arena();
        let original = ArenaBox::new_in(&a, String::from("hello")).unwrap();
        let copy = original.clone_in(&b).unwrap();
        assert_eq!(copy.get().map(String::as_str), Some("hello"));
        assert!(b.contains(copy.as_ptr().cast()));
        assert!(!a.contains(copy.as_ptr().cast()));
    }

    #[test]
    fn empty_handles_degrade() {
        let mut empty: ArenaBox<'_, u32> = ArenaBox::default();
        assert!(empty.get_mut().is_none());
        assert!(empty.clone_in(&arena()).unwrap().get().is_none());
        let r: ArenaRef<'_, u32> = ArenaRef::default();
        assert!(r.get().is_none());
        assert!(r.as_ptr().is_null());
    }

    #[test]
    fn bytes_handle_display() {
        let arena = arena();
        let bytes = arena.alloc_copy(b"abc").unwrap();
        let handle = arena.detach(bytes).unwrap();
        let text = handle.to_string();
        assert!(text.starts_with(&format!("arena#{}@0", arena.id())));
        assert!(text.ends_with("3 bytes]"));
    }
}
