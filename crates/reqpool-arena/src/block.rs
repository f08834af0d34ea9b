//! Contiguous scratch blocks and growable block lists.
//!
//! A [`Block`] is a fixed-size region of raw memory with bump allocation.
//! A [`BlockList`] is a growable collection of blocks that overflows into
//! a new block when the current one is full. Blocks are never moved or
//! resized, so earlier allocations stay put while the list grows.

use std::alloc::Layout;
use std::ptr::NonNull;

use reqpool_core::ArenaError;

use crate::budget::Budget;
use crate::raw::{RawBlock, BLOCK_ALIGN};

/// A single contiguous memory block with bump allocation.
///
/// Blocks are the storage unit of the scratch tier. Each one is obtained
/// from the system once and keeps a cursor that advances on every
/// allocation. Blocks are never freed individually, only reset or
/// released together with the arena.
pub struct Block {
    /// Backing storage. Allocated to full capacity at creation.
    raw: RawBlock,
    /// Bump pointer: next free byte offset.
    cursor: usize,
}

impl Block {
    /// Obtain a new block of `capacity` bytes.
    ///
    /// Returns `None` if the system allocator refuses.
    pub(crate) fn new(capacity: usize, align: usize) -> Option<Self> {
        Some(Self {
            raw: RawBlock::allocate(capacity, align, false)?,
            cursor: 0,
        })
    }

    /// Bump-allocate a region with the given layout.
    ///
    /// Returns the offset of the region within this block, or `None` if
    /// the remaining capacity (after alignment padding) is insufficient.
    pub fn alloc(&mut self, layout: Layout) -> Option<usize> {
        let base = self.raw.as_ptr().as_ptr() as usize;
        let unaligned = base.checked_add(self.cursor)?;
        let aligned = unaligned.checked_add(layout.align() - 1)? & !(layout.align() - 1);
        let start = aligned - base;
        let end = start.checked_add(layout.size())?;
        if end > self.raw.len() {
            return None;
        }
        self.cursor = end;
        Some(start)
    }

    /// Pointer to `offset` bytes into this block.
    pub(crate) fn ptr_at(&self, offset: usize) -> Option<NonNull<u8>> {
        self.raw.at(offset)
    }

    /// Reset the bump pointer to zero without releasing memory.
    ///
    /// All previous allocations become invalid. The bytes are NOT
    /// zeroed; zeroed allocations fill on the way out.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Bytes currently handed out (including alignment padding).
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.raw.len()
    }

    /// Remaining free capacity in bytes.
    pub fn remaining(&self) -> usize {
        self.raw.len() - self.cursor
    }

    /// Whether `addr..addr + len` lies inside the used part of this block.
    fn contains_used(&self, addr: usize, len: usize) -> bool {
        let base = self.raw.as_ptr().as_ptr() as usize;
        self.raw.contains_range(addr, len) && addr + len <= base + self.cursor
    }

    fn offset_of(&self, addr: usize) -> usize {
        addr - self.raw.as_ptr().as_ptr() as usize
    }
}

/// Where a scratch allocation landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Index of the block in the list.
    pub block: u32,
    /// Byte offset within the block.
    pub offset: usize,
    /// Address of the first byte.
    pub ptr: NonNull<u8>,
}

/// The most recent allocation, kept so it can be rolled back.
#[derive(Clone, Copy, Debug)]
struct LastAlloc {
    block: usize,
    start: usize,
    cursor_before: usize,
    len: usize,
}

/// A growable list of [`Block`]s with overflow-based bump allocation.
///
/// When the current block is full, the next existing block (left over
/// from before a reset) is tried, then a fresh block is appended.
/// Allocations never span block boundaries. A request bigger than the
/// block size gets a dedicated oversized block; the current block stays
/// current so small allocations keep filling it.
pub struct BlockList {
    blocks: Vec<Block>,
    block_size: usize,
    /// Index of the block currently being filled.
    current: usize,
    last: Option<LastAlloc>,
}

impl BlockList {
    /// Create a block list with one pre-allocated block, charged to `budget`.
    pub(crate) fn new(block_size: usize, budget: &Budget) -> Result<Self, ArenaError> {
        budget.reserve(block_size)?;
        let Some(first) = Block::new(block_size, BLOCK_ALIGN) else {
            budget.release(block_size);
            return Err(ArenaError::SystemAllocFailed { bytes: block_size });
        };
        Ok(Self {
            blocks: vec![first],
            block_size,
            current: 0,
            last: None,
        })
    }

    /// Bump-allocate a region, growing into a new block if needed.
    pub(crate) fn alloc(&mut self, layout: Layout, budget: &Budget) -> Result<Placement, ArenaError> {
        // Current block, then any block recycled by a reset.
        for index in self.current..self.blocks.len() {
            let cursor_before = self.blocks[index].cursor;
            if let Some(offset) = self.blocks[index].alloc(layout) {
                self.current = index;
                return self.placed(index, offset, cursor_before, layout.size());
            }
        }

        // Worst-case padding is `align - 1`; a block of that much extra
        // always fits the request.
        let needed = layout
            .size()
            .checked_add(layout.align() - 1)
            .ok_or(ArenaError::InvalidLayout {
                size: layout.size(),
                align: layout.align(),
            })?;
        let oversized = needed > self.block_size;
        let capacity = needed.max(self.block_size);

        budget.reserve(capacity)?;
        let Some(mut block) = Block::new(capacity, layout.align()) else {
            budget.release(capacity);
            return Err(ArenaError::SystemAllocFailed { bytes: capacity });
        };
        let Some(offset) = block.alloc(layout) else {
            budget.release(capacity);
            return Err(ArenaError::InvalidLayout {
                size: layout.size(),
                align: layout.align(),
            });
        };
        self.blocks.push(block);
        let index = self.blocks.len() - 1;
        if !oversized {
            self.current = index;
        }
        tracing::trace!(index, capacity, oversized, "appended scratch block");
        self.placed(index, offset, 0, layout.size())
    }

    fn placed(
        &mut self,
        index: usize,
        offset: usize,
        cursor_before: usize,
        len: usize,
    ) -> Result<Placement, ArenaError> {
        let ptr = self.blocks[index]
            .ptr_at(offset)
            .ok_or(ArenaError::InvalidLayout { size: len, align: 1 })?;
        self.last = Some(LastAlloc {
            block: index,
            start: offset,
            cursor_before,
            len,
        });
        Ok(Placement {
            block: index as u32,
            offset,
            ptr,
        })
    }

    /// Roll back the most recent allocation if `ptr`/`len` name it.
    ///
    /// Returns `true` if the bytes were reclaimed.
    pub(crate) fn rewind(&mut self, ptr: NonNull<u8>, len: usize) -> bool {
        let Some(last) = self.last else {
            return false;
        };
        let block = &mut self.blocks[last.block];
        let addr = ptr.as_ptr() as usize;
        if last.len != len || !block.contains_used(addr, len) || block.offset_of(addr) != last.start {
            return false;
        }
        block.cursor = last.cursor_before;
        self.last = None;
        true
    }

    /// Find the block and offset holding `addr..addr + len`.
    pub(crate) fn locate(&self, addr: usize, len: usize) -> Option<(u32, usize)> {
        self.blocks
            .iter()
            .position(|b| b.contains_used(addr, len))
            .map(|index| (index as u32, self.blocks[index].offset_of(addr)))
    }

    /// Address of `len` used bytes at `offset` in block `index`.
    pub(crate) fn resolve(&self, index: u32, offset: usize, len: usize) -> Option<NonNull<u8>> {
        let block = self.blocks.get(index as usize)?;
        if offset.checked_add(len)? > block.used() {
            return None;
        }
        block.ptr_at(offset)
    }

    /// Whether `addr` points into any block.
    pub(crate) fn contains(&self, addr: usize) -> bool {
        self.blocks.iter().any(|b| b.raw.contains_range(addr, 1))
    }

    /// Reset all blocks' bump pointers without releasing memory.
    ///
    /// After reset, allocations start from block 0 again.
    pub(crate) fn reset(&mut self) {
        for block in &mut self.blocks {
            block.reset();
        }
        self.current = 0;
        self.last = None;
    }

    /// Release every block back to the system and to `budget`.
    pub(crate) fn release_all(&mut self, budget: &Budget) {
        let bytes = self.capacity_bytes();
        self.blocks.clear();
        self.current = 0;
        self.last = None;
        budget.release(bytes);
    }

    /// Number of blocks currently held.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Bytes handed out across all blocks.
    pub fn used_bytes(&self) -> usize {
        self.blocks.iter().map(Block::used).sum()
    }

    /// Total capacity across all blocks.
    pub fn capacity_bytes(&self) -> usize {
        self.blocks.iter().map(Block::capacity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(n: usize) -> Layout {
        Layout::array::<u8>(n).unwrap()
    }

    #[test]
    fn block_sequential_alloc() {
        let mut block = Block::new(1024, BLOCK_ALIGN).unwrap();
        assert_eq!(block.alloc(bytes(100)), Some(0));
        assert_eq!(block.alloc(bytes(200)), Some(100));
        assert_eq!(block.used(), 300);
        assert_eq!(block.remaining(), 724);
    }

    #[test]
    fn block_alloc_fails_when_full() {
        let mut block = Block::new(100, BLOCK_ALIGN).unwrap();
        assert!(block.alloc(bytes(100)).is_some());
        assert!(block.alloc(bytes(1)).is_none());
    }

    #[test]
    fn block_respects_alignment() {
        let mut block = Block::new(256, BLOCK_ALIGN).unwrap();
        block.alloc(bytes(3)).unwrap();
        let offset = block.alloc(Layout::new::<u64>()).unwrap();
        assert_eq!(offset % 8, 0);
        assert_eq!(offset, 8);
    }

    #[test]
    fn block_reset_allows_realloc() {
        let mut block = Block::new(100, BLOCK_ALIGN).unwrap();
        block.alloc(bytes(100)).unwrap();
        block.reset();
        assert_eq!(block.used(), 0);
        assert!(block.alloc(bytes(50)).is_some());
    }

    #[test]
    fn list_grows_on_overflow() {
        let budget = Budget::new(None);
        let mut list = BlockList::new(100, &budget).unwrap();
        let first = list.alloc(bytes(100), &budget).unwrap();
        let second = list.alloc(bytes(50), &budget).unwrap();
        assert_eq!(first.block, 0);
        assert_eq!(second.block, 1);
        assert_eq!(list.block_count(), 2);
        assert_eq!(budget.reserved(), 200);
    }

    #[test]
    fn growth_never_moves_earlier_allocations() {
        let budget = Budget::new(None);
        let mut list = BlockList::new(64, &budget).unwrap();
        let first = list.alloc(bytes(60), &budget).unwrap();
        for _ in 0..32 {
            list.alloc(bytes(60), &budget).unwrap();
        }
        assert_eq!(list.resolve(first.block, first.offset, 60), Some(first.ptr));
    }

    #[test]
    fn oversized_request_gets_dedicated_block() {
        let budget = Budget::new(None);
        let mut list = BlockList::new(100, &budget).unwrap();
        list.alloc(bytes(10), &budget).unwrap();
        let big = list.alloc(bytes(500), &budget).unwrap();
        assert_eq!(big.block, 1);
        // Small allocations continue in the original block.
        let small = list.alloc(bytes(10), &budget).unwrap();
        assert_eq!(small.block, 0);
        assert_eq!(small.offset, 10);
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let budget = Budget::new(Some(150));
        let mut list = BlockList::new(100, &budget).unwrap();
        list.alloc(bytes(100), &budget).unwrap();
        let err = list.alloc(bytes(10), &budget).unwrap_err();
        assert!(matches!(err, ArenaError::CapacityExceeded { .. }));
    }

    #[test]
    fn reset_reuses_blocks() {
        let budget = Budget::new(None);
        let mut list = BlockList::new(100, &budget).unwrap();
        list.alloc(bytes(80), &budget).unwrap();
        list.alloc(bytes(80), &budget).unwrap();
        assert_eq!(list.block_count(), 2);
        list.reset();
        assert_eq!(list.used_bytes(), 0);
        let p = list.alloc(bytes(10), &budget).unwrap();
        assert_eq!((p.block, p.offset), (0, 0));
        list.alloc(bytes(95), &budget).unwrap();
        // Second block is recycled rather than a third one appended.
        assert_eq!(list.block_count(), 2);
    }

    #[test]
    fn rewind_only_reclaims_last_allocation() {
        let budget = Budget::new(None);
        let mut list = BlockList::new(100, &budget).unwrap();
        let a = list.alloc(bytes(10), &budget).unwrap();
        let b = list.alloc(bytes(20), &budget).unwrap();
        assert!(!list.rewind(a.ptr, 10));
        assert!(list.rewind(b.ptr, 20));
        assert_eq!(list.used_bytes(), 10);
        // Only one level of rollback is tracked.
        assert!(!list.rewind(a.ptr, 10));
    }

    #[test]
    fn locate_finds_used_ranges_only() {
        let budget = Budget::new(None);
        let mut list = BlockList::new(100, &budget).unwrap();
        let p = list.alloc(bytes(10), &budget).unwrap();
        let addr = p.ptr.as_ptr() as usize;
        assert_eq!(list.locate(addr, 10), Some((0, 0)));
        assert_eq!(list.locate(addr + 5, 5), Some((0, 5)));
        assert_eq!(list.locate(addr, 11), None);
    }

    #[test]
    fn release_all_returns_budget() {
        let budget = Budget::new(None);
        let mut list = BlockList::new(100, &budget).unwrap();
        list.alloc(bytes(100), &budget).unwrap();
        list.alloc(bytes(100), &budget).unwrap();
        list.release_all(&budget);
        assert_eq!(list.block_count(), 0);
        assert_eq!(budget.reserved(), 0);
    }
}
