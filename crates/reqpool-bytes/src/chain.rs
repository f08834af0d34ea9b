//! Singly-linked chains of buffers, built up into an outgoing stream.

use std::fmt;
use std::iter::FusedIterator;
use std::mem;

use reqpool_arena::{Arena, ArenaBox};
use reqpool_core::ArenaError;
use tracing::trace;

use crate::buffer::ByteBuffer;

struct Link<'a> {
    buf: ByteBuffer<'a>,
    next: ArenaBox<'a, Link<'a>>,
}

/// A singly-linked list of [`ByteBuffer`]s whose nodes live in an arena.
///
/// Nodes are owned by the chain; dropping it drops every buffer (heap
/// copies are released), while the node memory goes back with the arena.
/// An empty chain is the invalid state.
#[derive(Default)]
pub struct LinkChain<'a> {
    head: ArenaBox<'a, Link<'a>>,
    len: usize,
}

impl<'a> LinkChain<'a> {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain with one link.
    pub fn single(arena: &'a Arena, buf: ByteBuffer<'a>) -> Result<Self, ArenaError> {
        let mut chain = Self::new();
        chain.push(arena, buf)?;
        Ok(chain)
    }

    /// A chain with one link per buffer, in order.
    pub fn from_buffers<I>(arena: &'a Arena, bufs: I) -> Result<Self, ArenaError>
    where
        I: IntoIterator<Item = ByteBuffer<'a>>,
    {
        let mut chain = Self::new();
        for buf in bufs {
            chain.push(arena, buf)?;
        }
        Ok(chain)
    }

    fn last_mut(&mut self) -> Option<&mut Link<'a>> {
        let len = self.len;
        let mut link = self.head.get_mut()?;
        for _ in 1..len {
            link = link.next.get_mut()?;
        }
        Some(link)
    }

    /// Append `buf` as a new last link.
    pub fn push(&mut self, arena: &'a Arena, buf: ByteBuffer<'a>) -> Result<(), ArenaError> {
        let node = ArenaBox::new_in(
            arena,
            Link {
                buf,
                next: ArenaBox::empty(),
            },
        )?;
        match self.last_mut() {
            Some(last) => last.next = node,
            None => self.head = node,
        }
        self.len += 1;
        Ok(())
    }

    /// Splice `other` onto the end of this chain.
    pub fn append(&mut self, mut other: LinkChain<'a>) {
        let head = other.head.take();
        if !head.is_valid() {
            return;
        }
        let added = mem::take(&mut other.len);
        match self.last_mut() {
            Some(last) => last.next = head,
            None => self.head = head,
        }
        self.len += added;
        trace!(added, len = self.len, "chain appended");
    }

    /// Flag the last buffer as the end of the stream.
    ///
    /// No-op on an empty chain.
    pub fn mark_final(&mut self) {
        if let Some(last) = self.last_mut() {
            last.buf.set_last_buf(true).set_last_in_chain(true);
        }
    }

    /// Whether the last buffer carries the end-of-stream flag.
    pub fn is_final(&self) -> bool {
        self.iter().last().is_some_and(ByteBuffer::is_last_buf)
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the chain has no links.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total payload bytes across all links.
    pub fn total_len(&self) -> usize {
        self.iter().map(ByteBuffer::len).sum()
    }

    /// Concatenate every payload into one heap buffer.
    pub fn collect_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len());
        for buf in self {
            out.extend_from_slice(buf.as_bytes());
        }
        out
    }

    /// Buffers in order.
    pub fn iter(&self) -> Iter<'_, 'a> {
        Iter {
            link: self.head.get(),
            remaining: self.len,
        }
    }

    /// Buffers in order, mutably.
    pub fn iter_mut(&mut self) -> IterMut<'_, 'a> {
        IterMut {
            remaining: self.len,
            link: self.head.get_mut(),
        }
    }

    /// Move the links out, leaving this chain empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }
}

impl Drop for LinkChain<'_> {
    fn drop(&mut self) {
        // Unlink iteratively so long chains can't overflow the stack.
        let mut link = self.head.take();
        while let Some(node) = link.get_mut() {
            let next = node.next.take();
            link = next;
        }
    }
}

impl fmt::Debug for LinkChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over a chain's buffers.
pub struct Iter<'s, 'a> {
    link: Option<&'s Link<'a>>,
    remaining: usize,
}

impl<'s, 'a> Iterator for Iter<'s, 'a> {
    type Item = &'s ByteBuffer<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let link = self.link.take()?;
        self.link = link.next.get();
        self.remaining = self.remaining.saturating_sub(1);
        Some(&link.buf)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_, '_> {}
impl FusedIterator for Iter<'_, '_> {}

/// Mutable iterator over a chain's buffers.
pub struct IterMut<'s, 'a> {
    link: Option<&'s mut Link<'a>>,
    remaining: usize,
}

impl<'s, 'a> Iterator for IterMut<'s, 'a> {
    type Item = &'s mut ByteBuffer<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let Link { buf, next } = self.link.take()?;
        self.link = next.get_mut();
        self.remaining = self.remaining.saturating_sub(1);
        Some(buf)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for IterMut<'_, '_> {}
impl FusedIterator for IterMut<'_, '_> {}

impl<'s, 'a> IntoIterator for &'s LinkChain<'a> {
    type Item = &'s ByteBuffer<'a>;
    type IntoIter = Iter<'s, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
