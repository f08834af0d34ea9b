//! Lists stored as fixed-capacity segments in an arena.
//!
//! A [`SegmentedList`] never reallocates element storage: when the last
//! segment is full, a new one is drawn from the arena and linked after
//! it, so references handed out by [`SegmentedList::push`] stay valid
//! for as long as the element does. Only the small segment directory
//! grows.

use std::fmt;
use std::iter::FusedIterator;
use std::mem;
use std::slice;

use reqpool_arena::{vec_with_capacity_in, Arena, ArenaVec};
use reqpool_core::ArenaError;
use tracing::trace;

/// Initial number of directory slots.
const INITIAL_SEGMENTS: usize = 4;

struct Segments<'a, T> {
    arena: &'a Arena,
    parts: ArenaVec<'a, ArenaVec<'a, T>>,
    segment_capacity: usize,
    len: usize,
}

impl<'a, T> Segments<'a, T> {
    fn add_segment(&mut self) -> Result<(), ArenaError> {
        let part = vec_with_capacity_in(self.segment_capacity, self.arena)?;
        if self.parts.len() == self.parts.capacity() {
            let slots = (self.parts.capacity() * 2).max(INITIAL_SEGMENTS);
            let mut parts = vec_with_capacity_in(slots, self.arena)?;
            parts.extend(self.parts.drain(..));
            self.parts = parts;
        }
        self.parts.push(part);
        trace!(
            segments = self.parts.len(),
            capacity = self.segment_capacity,
            "list segment appended"
        );
        Ok(())
    }
}

/// A sequence of `T` stored as linked fixed-capacity arena segments.
///
/// Appending is O(1) except at segment boundaries, where one new segment
/// is allocated. Iteration crosses segments transparently and never
/// looks past the last populated one.
///
/// The invalid state (from `Default` or [`take`](SegmentedList::take))
/// has no arena: it iterates as empty and refuses pushes.
pub struct SegmentedList<'a, T> {
    inner: Option<Segments<'a, T>>,
}

impl<'a, T> SegmentedList<'a, T> {
    /// A list in `arena` whose segments hold `segment_capacity` elements.
    ///
    /// The first segment is allocated immediately.
    pub fn new_in(arena: &'a Arena, segment_capacity: usize) -> Result<Self, ArenaError> {
        if segment_capacity == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "segment capacity must be non-zero".into(),
            });
        }
        let mut inner = Segments {
            arena,
            parts: vec_with_capacity_in(INITIAL_SEGMENTS, arena)?,
            segment_capacity,
            len: 0,
        };
        inner.add_segment()?;
        Ok(Self { inner: Some(inner) })
    }

    /// Append `value`, returning a reference to it in place.
    ///
    /// # Errors
    ///
    /// An allocation error if a new segment is needed and cannot be
    /// obtained, or `InvalidConfig` if the list is invalid. `value` is
    /// dropped in either case.
    pub fn push(&mut self, value: T) -> Result<&mut T, ArenaError> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(ArenaError::InvalidConfig {
                reason: "segmented list is not bound to an arena".into(),
            });
        };
        let full = inner
            .parts
            .last()
            .is_none_or(|part| part.len() >= inner.segment_capacity);
        if full {
            inner.add_segment()?;
        }
        let last = inner.parts.len() - 1;
        let part = &mut inner.parts[last];
        let index = part.len();
        part.push(value);
        inner.len += 1;
        Ok(&mut part[index])
    }

    /// Append `T::default()`.
    pub fn push_default(&mut self) -> Result<&mut T, ArenaError>
    where
        T: Default,
    {
        self.push(T::default())
    }

    /// Whether the list is bound to an arena.
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |i| i.len)
    }

    /// Whether the list has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of segments allocated so far.
    pub fn segment_count(&self) -> usize {
        self.inner.as_ref().map_or(0, |i| i.parts.len())
    }

    /// Elements per segment.
    pub fn segment_capacity(&self) -> usize {
        self.inner.as_ref().map_or(0, |i| i.segment_capacity)
    }

    /// Elements in insertion order.
    pub fn iter(&self) -> Iter<'_, 'a, T> {
        match &self.inner {
            Some(inner) => Iter {
                parts: inner.parts.iter(),
                current: Default::default(),
                remaining: inner.len,
            },
            None => Iter {
                parts: Default::default(),
                current: Default::default(),
                remaining: 0,
            },
        }
    }

    /// Elements in insertion order, mutably.
    pub fn iter_mut(&mut self) -> IterMut<'_, 'a, T> {
        match &mut self.inner {
            Some(inner) => IterMut {
                remaining: inner.len,
                parts: inner.parts.iter_mut(),
                current: Default::default(),
            },
            None => IterMut {
                parts: Default::default(),
                current: Default::default(),
                remaining: 0,
            },
        }
    }

    /// First element matching `pred`.
    pub fn find_if<P>(&self, mut pred: P) -> Option<&T>
    where
        P: FnMut(&T) -> bool,
    {
        self.iter().find(|item| pred(item))
    }

    /// First element matching `pred`, mutably.
    pub fn find_if_mut<P>(&mut self, mut pred: P) -> Option<&mut T>
    where
        P: FnMut(&T) -> bool,
    {
        self.iter_mut().find(|item| pred(item))
    }

    /// Call `f` on every element in order.
    pub fn for_each<F>(&mut self, f: F)
    where
        F: FnMut(&mut T),
    {
        self.iter_mut().for_each(f);
    }

    /// Drop every element, keeping the first segment for reuse.
    pub fn clear(&mut self) {
        if let Some(inner) = self.inner.as_mut() {
            inner.parts.truncate(1);
            if let Some(first) = inner.parts.first_mut() {
                first.clear();
            }
            inner.len = 0;
        }
    }

    /// Move the elements out, leaving this list invalid.
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }
}

impl<T> Default for SegmentedList<'_, T> {
    fn default() -> Self {
        Self { inner: None }
    }
}

impl<T: fmt::Debug> fmt::Debug for SegmentedList<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over a [`SegmentedList`].
pub struct Iter<'s, 'a, T> {
    parts: slice::Iter<'s, ArenaVec<'a, T>>,
    current: slice::Iter<'s, T>,
    remaining: usize,
}

impl<'s, T> Iterator for Iter<'s, '_, T> {
    type Item = &'s T;

    fn next(&mut self) -> Option<&'s T> {
        loop {
            if let Some(item) = self.current.next() {
                self.remaining = self.remaining.saturating_sub(1);
                return Some(item);
            }
            self.current = self.parts.next()?.iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, '_, T> {}
impl<T> FusedIterator for Iter<'_, '_, T> {}

/// Mutable iterator over a [`SegmentedList`].
pub struct IterMut<'s, 'a, T> {
    parts: slice::IterMut<'s, ArenaVec<'a, T>>,
    current: slice::IterMut<'s, T>,
    remaining: usize,
}

impl<'s, T> Iterator for IterMut<'s, '_, T> {
    type Item = &'s mut T;

    fn next(&mut self) -> Option<&'s mut T> {
        loop {
            if let Some(item) = self.current.next() {
                self.remaining = self.remaining.saturating_sub(1);
                return Some(item);
            }
            self.current = self.parts.next()?.iter_mut();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for IterMut<'_, '_, T> {}
impl<T> FusedIterator for IterMut<'_, '_, T> {}

impl<'s, 'a, T> IntoIterator for &'s SegmentedList<'a, T> {
    type Item = &'s T;
    type IntoIter = Iter<'s, 'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'s, 'a, T> IntoIterator for &'s mut SegmentedList<'a, T> {
    type Item = &'s mut T;
    type IntoIter = IterMut<'s, 'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
