//! The request arena: bump allocation, tiers, lifecycle, and cleanups.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::ffi::CStr;
use std::fmt;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};
use std::slice;

use reqpool_core::{ArenaError, ArenaId, Epoch};
use tracing::{debug, trace, warn, Span};

use crate::block::BlockList;
use crate::budget::Budget;
use crate::cleanup::{CleanupId, CleanupRegistry};
use crate::config::ArenaConfig;
use crate::handle::{BytesHandle, LargeBlock};
use crate::large::LargeObjects;

/// Outcome of a best-effort [`Arena::dealloc_layout`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reclaim {
    /// A large-tier object was returned to the system.
    Freed,
    /// The most recent scratch allocation was rolled back.
    Rewound,
    /// Nothing was reclaimed now; the bytes come back at reset or destroy.
    Deferred,
}

/// Point-in-time summary of an arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaStats {
    /// Arena identity.
    pub id: ArenaId,
    /// Current epoch.
    pub epoch: Epoch,
    /// Bytes handed out across both tiers (scratch includes padding).
    pub allocated_bytes: usize,
    /// Bytes reserved from the system across both tiers.
    pub reserved_bytes: usize,
    /// Number of scratch blocks held.
    pub block_count: usize,
    /// Number of live large objects.
    pub large_count: usize,
    /// Number of pending cleanups.
    pub cleanup_count: usize,
}

/// A request-scoped memory arena.
///
/// Small requests are bump-allocated from fixed-size scratch blocks and
/// are only reclaimed wholesale, by [`reset`](Arena::reset) or
/// [`destroy`](Arena::destroy). Requests above the large threshold get
/// their own system allocation and can be freed individually.
///
/// Allocation goes through `&self` and hands out references tied to the
/// borrow of the arena; `reset` and `destroy` take `&mut self`, so the
/// compiler proves nothing allocated earlier is still reachable when the
/// memory is recycled.
///
/// An arena is single-threaded: it is neither `Send` nor `Sync`. Run one
/// arena per request or task.
///
/// # Example
///
/// ```
/// use reqpool_arena::Arena;
///
/// let mut arena = Arena::with_size_hint(4096).unwrap();
/// let greeting = arena.alloc_str("hello").unwrap();
/// assert_eq!(greeting, "hello");
/// arena.destroy();
/// assert!(!arena.is_live());
/// ```
pub struct Arena {
    id: ArenaId,
    config: ArenaConfig,
    budget: Budget,
    blocks: RefCell<BlockList>,
    large: RefCell<LargeObjects>,
    cleanups: RefCell<CleanupRegistry>,
    epoch: Cell<Epoch>,
    live: Cell<bool>,
    span: Span,
}

impl Arena {
    /// Create an arena and obtain its first scratch block.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `config` fails validation, or an allocation
    /// failure if the first block cannot be obtained.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        let id = ArenaId::next();
        let span = tracing::debug_span!(
            "arena",
            id = id.get(),
            label = config.label.as_deref().unwrap_or_default()
        );
        let budget = Budget::new(config.max_bytes);
        let blocks = BlockList::new(config.block_size, &budget)?;
        debug!(
            parent: &span,
            block_size = config.block_size,
            large_threshold = config.large_threshold,
            max_bytes = ?config.max_bytes,
            "arena created"
        );
        Ok(Self {
            id,
            config,
            budget,
            blocks: RefCell::new(blocks),
            large: RefCell::new(LargeObjects::new()),
            cleanups: RefCell::new(CleanupRegistry::new()),
            epoch: Cell::new(Epoch::default()),
            live: Cell::new(true),
            span,
        })
    }

    /// Create an arena with the given block size and default settings.
    pub fn with_size_hint(block_size: usize) -> Result<Self, ArenaError> {
        Self::new(ArenaConfig::new(block_size))
    }

    // ── allocation ───────────────────────────────────────────────

    fn ensure_live(&self) -> Result<(), ArenaError> {
        if self.live.get() {
            Ok(())
        } else {
            warn!(parent: &self.span, "allocation through destroyed arena");
            Err(ArenaError::ArenaExpired { arena: self.id })
        }
    }

    fn failed(&self, err: ArenaError) -> ArenaError {
        warn!(
            parent: &self.span,
            error = %err,
            reserved = self.budget.reserved(),
            "allocation failed"
        );
        err
    }

    /// Scratch-tier allocation. Zero-size layouts get a dangling, aligned
    /// pointer and touch no block.
    fn scratch(&self, layout: Layout) -> Result<NonNull<u8>, ArenaError> {
        self.ensure_live()?;
        if layout.size() == 0 {
            return dangling(layout);
        }
        let placement = self
            .blocks
            .borrow_mut()
            .alloc(layout, &self.budget)
            .map_err(|e| self.failed(e))?;
        trace!(
            parent: &self.span,
            size = layout.size(),
            align = layout.align(),
            block = placement.block,
            offset = placement.offset,
            "scratch alloc"
        );
        Ok(placement.ptr)
    }

    fn large_alloc(&self, layout: Layout, zeroed: bool) -> Result<NonNull<u8>, ArenaError> {
        self.ensure_live()?;
        let ptr = self
            .large
            .borrow_mut()
            .alloc(layout.size(), layout.align(), zeroed, &self.budget)
            .map_err(|e| self.failed(e))?;
        trace!(parent: &self.span, size = layout.size(), "large alloc");
        Ok(ptr)
    }

    /// `n` uninitialised scratch bytes.
    ///
    /// Comes from the current block or a newly appended one; earlier
    /// allocations never move.
    pub fn alloc_uninit(&self, n: usize) -> Result<&mut [MaybeUninit<u8>], ArenaError> {
        let ptr = self.scratch(byte_layout(n)?)?;
        // SAFETY: `ptr` is valid for `n` bytes handed out to nobody else,
        // and stays allocated until `reset`/`destroy`, which need
        // `&mut self` and therefore outlive this borrow.
        Ok(unsafe { slice::from_raw_parts_mut(ptr.as_ptr().cast::<MaybeUninit<u8>>(), n) })
    }

    /// `n` zero-filled scratch bytes.
    pub fn alloc_zeroed(&self, n: usize) -> Result<&mut [u8], ArenaError> {
        let ptr = self.scratch(byte_layout(n)?)?;
        // SAFETY: as in `alloc_uninit`; the bytes are initialised before
        // the slice is formed. Blocks are recycled, so zero explicitly.
        unsafe {
            ptr::write_bytes(ptr.as_ptr(), 0, n);
            Ok(slice::from_raw_parts_mut(ptr.as_ptr(), n))
        }
    }

    /// Copy `src` into scratch memory.
    pub fn alloc_copy(&self, src: &[u8]) -> Result<&mut [u8], ArenaError> {
        let ptr = self.scratch(byte_layout(src.len())?)?;
        // SAFETY: `ptr` is fresh and valid for `src.len()` bytes, so it
        // cannot overlap `src`.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len());
            Ok(slice::from_raw_parts_mut(ptr.as_ptr(), src.len()))
        }
    }

    /// Copy `s` into scratch memory.
    pub fn alloc_str(&self, s: &str) -> Result<&mut str, ArenaError> {
        let bytes = self.alloc_copy(s.as_bytes())?;
        // SAFETY: the bytes were copied from a `str`.
        Ok(unsafe { std::str::from_utf8_unchecked_mut(bytes) })
    }

    /// Copy `s` into scratch memory with a trailing NUL.
    ///
    /// An interior NUL in `s` truncates the returned string there.
    pub fn alloc_cstr(&self, s: &str) -> Result<&CStr, ArenaError> {
        let len = s.len().checked_add(1).ok_or(ArenaError::SizeOverflow {
            count: s.len(),
            elem_size: 1,
        })?;
        let buf = self.alloc_uninit(len)?;
        for (dst, &src) in buf.iter_mut().zip(s.as_bytes()) {
            dst.write(src);
        }
        buf[s.len()].write(0);
        // SAFETY: every byte was written above.
        let bytes = unsafe { &*(buf as *mut [MaybeUninit<u8>] as *const [u8]) };
        CStr::from_bytes_until_nul(bytes).map_err(|_| ArenaError::InvalidLayout { size: len, align: 1 })
    }

    /// Place a plain-data value in scratch memory.
    ///
    /// `T: Copy` guarantees there is no destructor to lose. Values that
    /// need dropping go through [`alloc_with_cleanup`](Arena::alloc_with_cleanup)
    /// or an [`ArenaBox`](crate::ArenaBox).
    pub fn alloc_value<T: Copy>(&self, value: T) -> Result<&mut T, ArenaError> {
        let ptr = self.scratch(Layout::new::<T>())?.cast::<T>();
        // SAFETY: fresh, aligned, exclusively ours for the borrow of `self`.
        unsafe {
            ptr.as_ptr().write(value);
            Ok(&mut *ptr.as_ptr())
        }
    }

    /// Place `value` in scratch memory and register its destructor to run
    /// when the arena resets or is destroyed.
    ///
    /// Types without drop glue skip the registration.
    pub fn alloc_with_cleanup<T: 'static>(&self, value: T) -> Result<&mut T, ArenaError> {
        let ptr = self.scratch(Layout::new::<T>())?.cast::<T>();
        // SAFETY: fresh and aligned; the value is written before any
        // reference is formed.
        unsafe { ptr.as_ptr().write(value) };
        if std::mem::needs_drop::<T>() {
            // SAFETY: the `T` is live and stays in place until the registry
            // runs, which happens before its block is recycled or freed.
            // Nothing else drops it: the caller only gets a reference.
            unsafe { self.cleanups.borrow_mut().push_in_place(ptr) };
        }
        // SAFETY: as in `alloc_value`.
        Ok(unsafe { &mut *ptr.as_ptr() })
    }

    /// `count` default-initialised elements in scratch memory.
    ///
    /// # Errors
    ///
    /// `SizeOverflow` if `count * size_of::<T>()` does not fit a layout.
    pub fn alloc_array<T: Default + Copy>(&self, count: usize) -> Result<&mut [T], ArenaError> {
        let layout = Layout::array::<T>(count).map_err(|_| ArenaError::SizeOverflow {
            count,
            elem_size: std::mem::size_of::<T>(),
        })?;
        let ptr = self.scratch(layout)?.cast::<T>();
        // SAFETY: valid and aligned for `count` elements, each written
        // before the slice is formed.
        unsafe {
            for i in 0..count {
                ptr.as_ptr().add(i).write(T::default());
            }
            Ok(slice::from_raw_parts_mut(ptr.as_ptr(), count))
        }
    }

    /// Allocate raw memory for `layout`, choosing the tier by size.
    ///
    /// Sizes up to the large threshold are bump-allocated; larger ones
    /// get their own system allocation. The memory is uninitialised.
    pub fn alloc_layout(&self, layout: Layout) -> Result<NonNull<u8>, ArenaError> {
        if layout.size() > self.config.large_threshold {
            self.large_alloc(layout, false)
        } else {
            self.scratch(layout)
        }
    }

    /// Best-effort release of memory from [`alloc_layout`](Arena::alloc_layout).
    ///
    /// Large objects are freed; the most recent scratch allocation is
    /// rolled back; anything else stays until reset or destroy.
    ///
    /// # Safety
    ///
    /// `ptr` must have come from this arena's `alloc_layout` with this
    /// `layout`, and must not be used afterwards.
    pub unsafe fn dealloc_layout(&self, ptr: NonNull<u8>, layout: Layout) -> Reclaim {
        if !self.live.get() || layout.size() == 0 {
            return Reclaim::Deferred;
        }
        let outcome = if layout.size() > self.config.large_threshold {
            if self.large.borrow_mut().free(ptr, &self.budget) {
                Reclaim::Freed
            } else {
                Reclaim::Deferred
            }
        } else if self.blocks.borrow_mut().rewind(ptr, layout.size()) {
            Reclaim::Rewound
        } else {
            Reclaim::Deferred
        };
        trace!(parent: &self.span, size = layout.size(), ?outcome, "dealloc");
        outcome
    }

    /// `n` zero-filled bytes in the large tier, freed when the returned
    /// block is dropped.
    pub fn alloc_large(&self, n: usize) -> Result<LargeBlock<'_>, ArenaError> {
        let layout = byte_layout(n)?;
        let ptr = if n == 0 {
            self.ensure_live()?;
            dangling(layout)?
        } else {
            self.large_alloc(layout, true)?
        };
        Ok(LargeBlock::new(self, ptr, n))
    }

    pub(crate) fn free_large(&self, ptr: NonNull<u8>) {
        if self.live.get() {
            self.large.borrow_mut().free(ptr, &self.budget);
        }
    }

    // ── cleanups ─────────────────────────────────────────────────

    /// Register `callback` to run when the arena is destroyed (and at
    /// reset, per [`ResetCleanup`](crate::ResetCleanup)).
    ///
    /// Callbacks run synchronously, newest first. Returns `None` once the
    /// arena has been destroyed.
    pub fn register_cleanup<F>(&self, callback: F) -> Option<CleanupId>
    where
        F: FnOnce() + 'static,
    {
        if !self.live.get() {
            warn!(parent: &self.span, "cleanup registered on destroyed arena");
            return None;
        }
        let id = self.cleanups.borrow_mut().push_callback(Box::new(callback));
        trace!(parent: &self.span, %id, "cleanup registered");
        Some(id)
    }

    // ── lifecycle ────────────────────────────────────────────────

    /// Recycle the arena for another request.
    ///
    /// Runs in-place destructors (and callbacks, unless the policy defers
    /// them), frees large objects, rewinds every scratch block, and bumps
    /// the epoch so detached handles stop resolving. Blocks are kept for
    /// reuse. No-op on a destroyed arena.
    pub fn reset(&mut self) {
        if !self.live.get() {
            return;
        }
        let ran = self
            .cleanups
            .get_mut()
            .run_for_reset(self.config.reset_cleanup);
        self.large.get_mut().clear(&self.budget);
        self.blocks.get_mut().reset();
        self.epoch.set(self.epoch.get().next());
        debug!(
            parent: &self.span,
            epoch = self.epoch.get().0,
            cleanups_run = ran,
            "arena reset"
        );
    }

    /// Run every pending cleanup (newest first) and release all memory.
    ///
    /// Idempotent. Afterwards allocations fail with `ArenaExpired` and
    /// detached handles resolve to nothing. Dropping the arena calls this.
    pub fn destroy(&mut self) {
        if !self.live.replace(false) {
            return;
        }
        let ran = self.cleanups.get_mut().run_all();
        self.large.get_mut().clear(&self.budget);
        self.blocks.get_mut().release_all(&self.budget);
        self.epoch.set(self.epoch.get().next());
        debug!(parent: &self.span, cleanups_run = ran, "arena destroyed");
    }

    // ── detached handles ─────────────────────────────────────────

    /// Record where `bytes` live so they can be found again later without
    /// holding a borrow.
    ///
    /// Returns `None` unless `bytes` is a non-empty range inside this
    /// arena's scratch tier.
    pub fn detach(&self, bytes: &[u8]) -> Option<BytesHandle> {
        if !self.live.get() || bytes.is_empty() {
            return None;
        }
        let (block, offset) = self
            .blocks
            .borrow()
            .locate(bytes.as_ptr() as usize, bytes.len())?;
        Some(BytesHandle {
            arena: self.id,
            epoch: self.epoch.get(),
            block,
            offset,
            len: bytes.len(),
        })
    }

    /// The bytes behind `handle`, if it belongs to this arena and its
    /// epoch is still current.
    ///
    /// Takes `&mut self` so no allocation handed out earlier can alias the
    /// returned slice.
    pub fn resolve(&mut self, handle: BytesHandle) -> Option<&[u8]> {
        if !self.is_current(handle) {
            return None;
        }
        let ptr = self
            .blocks
            .get_mut()
            .resolve(handle.block, handle.offset, handle.len)?;
        // SAFETY: the range lies inside the used part of a live block and
        // `&mut self` rules out any outstanding mutable borrow of it.
        Some(unsafe { slice::from_raw_parts(ptr.as_ptr(), handle.len) })
    }

    /// Copy the bytes behind `handle` out to the heap.
    pub fn copy_out(&mut self, handle: BytesHandle) -> Option<Vec<u8>> {
        self.resolve(handle).map(<[u8]>::to_vec)
    }

    /// Whether `handle` was taken from this arena in its current epoch.
    pub fn is_current(&self, handle: BytesHandle) -> bool {
        self.live.get() && handle.arena == self.id && handle.epoch == self.epoch.get()
    }

    // ── introspection ────────────────────────────────────────────

    /// Process-unique identity.
    pub fn id(&self) -> ArenaId {
        self.id
    }

    /// Current epoch.
    pub fn epoch(&self) -> Epoch {
        self.epoch.get()
    }

    /// Whether the arena has not been destroyed.
    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    /// The configuration the arena was created with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Diagnostic label, if any.
    pub fn label(&self) -> Option<&str> {
        self.config.label.as_deref()
    }

    /// Diagnostic span every arena event is recorded in.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Bytes handed out across both tiers.
    pub fn allocated_bytes(&self) -> usize {
        self.blocks.borrow().used_bytes() + self.large.borrow().bytes()
    }

    /// Bytes reserved from the system across both tiers.
    pub fn reserved_bytes(&self) -> usize {
        self.budget.reserved()
    }

    /// Number of scratch blocks held.
    pub fn block_count(&self) -> usize {
        self.blocks.borrow().block_count()
    }

    /// Number of live large objects.
    pub fn large_count(&self) -> usize {
        self.large.borrow().len()
    }

    /// Number of pending cleanups.
    pub fn cleanup_count(&self) -> usize {
        self.cleanups.borrow().len()
    }

    /// Bytes still available under the byte budget, if one is set.
    pub fn remaining_budget(&self) -> Option<usize> {
        self.budget
            .limit()
            .map(|limit| limit.saturating_sub(self.budget.reserved()))
    }

    /// Whether `ptr` points into memory owned by this arena.
    pub fn contains(&self, ptr: *const u8) -> bool {
        let addr = ptr as usize;
        self.blocks.borrow().contains(addr) || self.large.borrow().contains(addr)
    }

    /// Snapshot of the counters above.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            id: self.id,
            epoch: self.epoch(),
            allocated_bytes: self.allocated_bytes(),
            reserved_bytes: self.reserved_bytes(),
            block_count: self.block_count(),
            large_count: self.large_count(),
            cleanup_count: self.cleanup_count(),
        }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("id", &self.id)
            .field("label", &self.label())
            .field("epoch", &self.epoch())
            .field("live", &self.is_live())
            .field("allocated_bytes", &self.allocated_bytes())
            .field("block_count", &self.block_count())
            .finish()
    }
}

fn byte_layout(n: usize) -> Result<Layout, ArenaError> {
    Layout::array::<u8>(n).map_err(|_| ArenaError::SizeOverflow {
        count: n,
        elem_size: 1,
    })
}

fn dangling(layout: Layout) -> Result<NonNull<u8>, ArenaError> {
    NonNull::new(ptr::without_provenance_mut::<u8>(layout.align())).ok_or(
        ArenaError::InvalidLayout {
            size: layout.size(),
            align: layout.align(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResetCleanup;
    use std::rc::Rc;

    fn arena() -> Arena {
        Arena::with_size_hint(4096).unwrap()
    }

    #[test]
    fn new_rejects_bad_config() {
        let err = Arena::with_size_hint(1).unwrap_err();
        assert!(matches!(err, ArenaError::InvalidConfig { .. }));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(arena().id(), arena().id());
    }

    #[test]
    fn copies_are_independent_of_source() {
        let arena = arena();
        let mut source = b"hello".to_vec();
        let copy = arena.alloc_copy(&source).unwrap();
        source[0] = b'j';
        assert_eq!(copy, b"hello");
        assert!(arena.contains(copy.as_ptr()));
    }

    #[test]
    fn zeroed_memory_is_zero_after_reset() {
        let mut arena = arena();
        arena.alloc_copy(&[0xAB; 64]).unwrap();
        arena.reset();
        let z = arena.alloc_zeroed(64).unwrap();
        assert!(z.iter().all(|&b| b == 0));
    }

    #[test]
    fn allocations_never_move_when_blocks_are_added() {
        let arena = Arena::with_size_hint(128).unwrap();
        let first = arena.alloc_copy(b"stable").unwrap();
        let addr = first.as_ptr();
        for _ in 0..64 {
            arena.alloc_copy(&[1; 100]).unwrap();
        }
        assert!(arena.block_count() > 1);
        assert_eq!(first.as_ptr(), addr);
        assert_eq!(first, b"stable");
    }

    #[test]
    fn cstr_is_nul_terminated() {
        let arena = arena();
        let c = arena.alloc_cstr("host").unwrap();
        assert_eq!(c.to_bytes_with_nul(), b"host\0");
        let cut = arena.alloc_cstr("a\0b").unwrap();
        assert_eq!(cut.to_bytes(), b"a");
    }

    #[test]
    fn value_and_array_allocation() {
        let arena = arena();
        let v = arena.alloc_value(42_u64).unwrap();
        *v += 1;
        assert_eq!(*v, 43);
        assert_eq!(v as *mut u64 as usize % std::mem::align_of::<u64>(), 0);
        let arr = arena.alloc_array::<u32>(10).unwrap();
        assert_eq!(arr, &[0; 10]);
    }

    #[test]
    fn array_overflow_is_reported() {
        let arena = arena();
        let err = arena.alloc_array::<u64>(usize::MAX / 4).unwrap_err();
        assert!(matches!(err, ArenaError::SizeOverflow { elem_size: 8, .. }));
    }

    #[test]
    fn zero_size_requests_succeed_without_memory() {
        let arena = arena();
        let before = arena.allocated_bytes();
        assert!(arena.alloc_copy(&[]).unwrap().is_empty());
        assert!(arena.alloc_array::<u64>(0).unwrap().is_empty());
        assert!(arena.alloc_large(0).unwrap().is_empty());
        assert_eq!(arena.allocated_bytes(), before);
    }

    #[test]
    fn layout_allocation_picks_tier_by_threshold() {
        let arena = arena();
        let small = Layout::array::<u8>(64).unwrap();
        let big = Layout::array::<u8>(8192).unwrap();
        arena.alloc_layout(small).unwrap();
        assert_eq!(arena.large_count(), 0);
        let p = arena.alloc_layout(big).unwrap();
        assert_eq!(arena.large_count(), 1);
        // SAFETY: `p` came from `alloc_layout(big)` and is not used again.
        assert_eq!(unsafe { arena.dealloc_layout(p, big) }, Reclaim::Freed);
        assert_eq!(arena.large_count(), 0);
    }

    #[test]
    fn dealloc_is_best_effort_for_scratch() {
        let arena = arena();
        let layout = Layout::array::<u8>(32).unwrap();
        let a = arena.alloc_layout(layout).unwrap();
        let b = arena.alloc_layout(layout).unwrap();
        // SAFETY: both pointers came from `alloc_layout(layout)` and are
        // not used afterwards.
        unsafe {
            assert_eq!(arena.dealloc_layout(a, layout), Reclaim::Deferred);
            assert_eq!(arena.dealloc_layout(b, layout), Reclaim::Rewound);
        }
        assert_eq!(arena.allocated_bytes(), 32);
    }

    #[test]
    fn large_block_frees_on_drop() {
        let arena = arena();
        let reserved = arena.reserved_bytes();
        {
            let mut block = arena.alloc_large(10_000).unwrap();
            assert!(block.iter().all(|&b| b == 0));
            block[0] = 7;
            assert_eq!(arena.large_count(), 1);
            assert_eq!(arena.reserved_bytes(), reserved + 10_000);
        }
        assert_eq!(arena.large_count(), 0);
        assert_eq!(arena.reserved_bytes(), reserved);
    }

    #[test]
    fn budget_exhaustion_fails_loudly() {
        let arena = Arena::new(ArenaConfig::new(1024).with_max_bytes(2048)).unwrap();
        let _held = arena.alloc_large(1024).unwrap();
        let err = arena.alloc_large(1).unwrap_err();
        assert!(err.is_allocation_failure());
        assert!(matches!(err, ArenaError::CapacityExceeded { .. }));
    }

    #[test]
    fn cleanups_run_lifo_on_destroy() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut arena = arena();
        for name in ["A", "B", "C"] {
            let order = Rc::clone(&order);
            arena.register_cleanup(move || order.borrow_mut().push(name));
        }
        assert_eq!(arena.cleanup_count(), 3);
        arena.destroy();
        assert_eq!(*order.borrow(), vec!["C", "B", "A"]);
        arena.destroy();
        assert_eq!(order.borrow().len(), 3);
    }

    #[test]
    fn drop_runs_cleanups() {
        let ran = Rc::new(Cell::new(false));
        {
            let arena = arena();
            let ran = Rc::clone(&ran);
            arena.register_cleanup(move || ran.set(true));
        }
        assert!(ran.get());
    }

    #[test]
    fn destroyed_arena_refuses_work() {
        let mut arena = arena();
        arena.destroy();
        assert!(!arena.is_live());
        assert!(matches!(
            arena.alloc_copy(b"x"),
            Err(ArenaError::ArenaExpired { .. })
        ));
        assert!(arena.register_cleanup(|| {}).is_none());
        assert_eq!(arena.block_count(), 0);
        assert_eq!(arena.reserved_bytes(), 0);
    }

    #[test]
    fn reset_runs_destructors_and_keeps_blocks() {
        let drops = Rc::new(Cell::new(0));
        struct Tracked(Rc<Cell<u32>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }
        let mut arena = Arena::with_size_hint(256).unwrap();
        arena.alloc_with_cleanup(Tracked(Rc::clone(&drops))).unwrap();
        for _ in 0..8 {
            arena.alloc_copy(&[0; 200]).unwrap();
        }
        let blocks = arena.block_count();
        arena.reset();
        assert_eq!(drops.get(), 1);
        assert_eq!(arena.block_count(), blocks);
        assert_eq!(arena.allocated_bytes(), 0);
        assert_eq!(arena.epoch(), Epoch(1));
        arena.destroy();
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn plain_data_registers_no_cleanup() {
        let arena = arena();
        arena.alloc_with_cleanup(5_u32).unwrap();
        assert_eq!(arena.cleanup_count(), 0);
        arena.alloc_with_cleanup(String::from("x")).unwrap();
        assert_eq!(arena.cleanup_count(), 1);
    }

    #[test]
    fn reset_policy_controls_callbacks() {
        let ran = Rc::new(Cell::new(0));
        let mut run = arena();
        let mut defer =
            Arena::new(ArenaConfig::new(4096).with_reset_cleanup(ResetCleanup::Defer)).unwrap();
        for arena in [&run, &defer] {
            let ran = Rc::clone(&ran);
            arena.register_cleanup(move || ran.set(ran.get() + 1));
        }
        run.reset();
        assert_eq!(ran.get(), 1);
        defer.reset();
        assert_eq!(ran.get(), 1);
        assert_eq!(defer.cleanup_count(), 1);
        defer.destroy();
        assert_eq!(ran.get(), 2);
    }

    #[test]
    fn detached_handles_follow_epochs() {
        let mut arena = arena();
        let bytes = arena.alloc_copy(b"hello world").unwrap();
        let handle = arena.detach(&bytes[..5]).unwrap();
        assert_eq!(handle.len(), 5);
        assert_eq!(arena.resolve(handle), Some(&b"hello"[..]));
        assert_eq!(arena.copy_out(handle), Some(b"hello".to_vec()));
        arena.reset();
        assert!(arena.resolve(handle).is_none());
    }

    #[test]
    fn foreign_and_external_bytes_do_not_detach() {
        let mut a = arena();
        let b = arena();
        let external = b"outside".to_vec();
        assert!(a.detach(&external).is_none());
        let in_b = b.alloc_copy(b"bee").unwrap();
        assert!(a.detach(in_b).is_none());
        let handle = b.detach(in_b).unwrap();
        assert!(a.resolve(handle).is_none());
    }

    #[test]
    fn stats_reflect_activity() {
        let arena = Arena::new(ArenaConfig::new(4096).with_label("req")).unwrap();
        arena.alloc_copy(&[1; 100]).unwrap();
        arena.register_cleanup(|| {});
        let stats = arena.stats();
        assert_eq!(stats.id, arena.id());
        assert_eq!(stats.allocated_bytes, 100);
        assert_eq!(stats.reserved_bytes, 4096);
        assert_eq!(stats.block_count, 1);
        assert_eq!(stats.cleanup_count, 1);
        assert_eq!(arena.label(), Some("req"));
        assert_eq!(arena.remaining_budget(), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn every_copy_reads_back(chunks in prop::collection::vec(
                prop::collection::vec(any::<u8>(), 0..300), 1..40)
            ) {
                let arena = Arena::with_size_hint(256).unwrap();
                let copies: Vec<&[u8]> = chunks
                    .iter()
                    .map(|c| &*arena.alloc_copy(c).unwrap())
                    .collect();
                for (copy, chunk) in copies.iter().zip(&chunks) {
                    prop_assert_eq!(*copy, chunk.as_slice());
                }
            }

            #[test]
            fn aligned_values_are_aligned(sizes in prop::collection::vec(1usize..64, 1..50)) {
                let arena = Arena::with_size_hint(512).unwrap();
                for n in sizes {
                    arena.alloc_uninit(n).unwrap();
                    let v = arena.alloc_value(0_u64).unwrap();
                    prop_assert_eq!(v as *mut u64 as usize % 8, 0);
                }
            }
        }
    }
}
