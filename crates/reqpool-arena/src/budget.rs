//! Byte budget shared by the scratch and large-object tiers.

use std::cell::Cell;

use reqpool_core::ArenaError;

/// Tracks bytes reserved from the system against an optional limit.
#[derive(Debug)]
pub(crate) struct Budget {
    limit: Option<usize>,
    reserved: Cell<usize>,
}

impl Budget {
    pub(crate) fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            reserved: Cell::new(0),
        }
    }

    /// Reserve `bytes`, failing with `CapacityExceeded` past the limit.
    pub(crate) fn reserve(&self, bytes: usize) -> Result<(), ArenaError> {
        let current = self.reserved.get();
        let next = current.checked_add(bytes);
        match (next, self.limit) {
            (Some(next), Some(limit)) if next <= limit => {
                self.reserved.set(next);
                Ok(())
            }
            (Some(next), None) => {
                self.reserved.set(next);
                Ok(())
            }
            _ => Err(ArenaError::CapacityExceeded {
                requested: bytes,
                capacity: self.limit.unwrap_or(usize::MAX),
            }),
        }
    }

    /// Return `bytes` to the budget.
    pub(crate) fn release(&self, bytes: usize) {
        self.reserved.set(self.reserved.get().saturating_sub(bytes));
    }

    pub(crate) fn reserved(&self) -> usize {
        self.reserved.get()
    }

    pub(crate) fn limit(&self) -> Option<usize> {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_accepts_everything() {
        let b = Budget::new(None);
        b.reserve(1 << 30).unwrap();
        assert_eq!(b.reserved(), 1 << 30);
    }

    #[test]
    fn limit_is_inclusive() {
        let b = Budget::new(Some(100));
        b.reserve(60).unwrap();
        b.reserve(40).unwrap();
        assert!(matches!(
            b.reserve(1),
            Err(ArenaError::CapacityExceeded {
                requested: 1,
                capacity: 100
            })
        ));
    }

    #[test]
    fn release_makes_room() {
        let b = Budget::new(Some(100));
        b.reserve(100).unwrap();
        b.release(30);
        b.reserve(30).unwrap();
        assert_eq!(b.reserved(), 100);
    }

    #[test]
    fn overflowing_reservation_fails() {
        let b = Budget::new(None);
        b.reserve(usize::MAX).unwrap();
        assert!(b.reserve(1).is_err());
    }
}
