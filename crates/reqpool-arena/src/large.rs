//! Large-object tier: individually freed allocations.
//!
//! Requests above the arena's large threshold bypass the bump blocks and
//! get their own system allocation, tracked by address. Unlike scratch
//! bytes these can be returned before the arena goes away.

use std::ptr::NonNull;

use indexmap::IndexMap;
use reqpool_core::ArenaError;

use crate::budget::Budget;
use crate::raw::RawBlock;

/// Table of live large objects keyed by base address.
#[derive(Default)]
pub(crate) struct LargeObjects {
    objects: IndexMap<usize, RawBlock>,
}

impl LargeObjects {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Obtain `size` bytes aligned to `align`, charged to `budget`.
    pub(crate) fn alloc(
        &mut self,
        size: usize,
        align: usize,
        zeroed: bool,
        budget: &Budget,
    ) -> Result<NonNull<u8>, ArenaError> {
        budget.reserve(size)?;
        let Some(raw) = RawBlock::allocate(size, align, zeroed) else {
            budget.release(size);
            return Err(ArenaError::SystemAllocFailed { bytes: size });
        };
        let ptr = raw.as_ptr();
        self.objects.insert(ptr.as_ptr() as usize, raw);
        Ok(ptr)
    }

    /// Free the object starting at `ptr`. Returns `false` if `ptr` is not
    /// the base of a live large object.
    pub(crate) fn free(&mut self, ptr: NonNull<u8>, budget: &Budget) -> bool {
        match self.objects.swap_remove(&(ptr.as_ptr() as usize)) {
            Some(raw) => {
                budget.release(raw.len());
                true
            }
            None => false,
        }
    }

    /// Free every object.
    pub(crate) fn clear(&mut self, budget: &Budget) {
        budget.release(self.bytes());
        self.objects.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.len()
    }

    pub(crate) fn bytes(&self) -> usize {
        self.objects.values().map(RawBlock::len).sum()
    }

    pub(crate) fn contains(&self, addr: usize) -> bool {
        self.objects.values().any(|raw| raw.contains_range(addr, 1))
    }
}
