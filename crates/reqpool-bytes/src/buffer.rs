//! Contiguous byte buffers with stream flags.

use std::borrow::Cow;
use std::fmt;
use std::mem;

use reqpool_arena::Arena;
use reqpool_core::{ArenaError, ByteView};

use crate::chain::LinkChain;

/// Stream flags carried by a [`ByteBuffer`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BufFlags {
    /// Final buffer of the whole response.
    pub last_buf: bool,
    /// Final buffer of the current chain.
    pub last_in_chain: bool,
    /// Read-only memory the buffer must not modify.
    pub memory: bool,
    /// Flush point with no payload of its own.
    pub sync: bool,
    /// Writable memory owned by the request (a copy).
    pub temporary: bool,
}

/// A contiguous byte region plus [`BufFlags`].
///
/// The bytes are either a view (of external memory, or of a copy placed
/// in an arena) or an owned heap copy. The invalid state, reached through
/// `Default` or [`take`](ByteBuffer::take), has no bytes; flag setters on
/// it do nothing.
#[derive(Default)]
pub struct ByteBuffer<'a> {
    data: Option<Cow<'a, [u8]>>,
    flags: BufFlags,
}

impl<'a> ByteBuffer<'a> {
    /// A valid buffer with no bytes and no flags set.
    pub const fn empty() -> Self {
        Self {
            data: Some(Cow::Borrowed(&[])),
            flags: BufFlags {
                last_buf: false,
                last_in_chain: false,
                memory: false,
                sync: false,
                temporary: false,
            },
        }
    }

    /// Copy `bytes` into `arena`.
    pub fn copy_in(arena: &'a Arena, bytes: &[u8]) -> Result<Self, ArenaError> {
        let copy: &'a [u8] = arena.alloc_copy(bytes)?;
        Ok(Self {
            data: Some(Cow::Borrowed(copy)),
            flags: BufFlags {
                temporary: true,
                ..BufFlags::default()
            },
        })
    }

    /// Copy `s` into `arena`.
    pub fn from_str_in(arena: &'a Arena, s: &str) -> Result<Self, ArenaError> {
        Self::copy_in(arena, s.as_bytes())
    }

    /// Pass `bytes` through without copying.
    pub fn wrap(bytes: &'a [u8]) -> Self {
        Self {
            data: Some(Cow::Borrowed(bytes)),
            flags: BufFlags {
                memory: true,
                ..BufFlags::default()
            },
        }
    }

    /// Copy `bytes` to the heap; the buffer owns and releases them.
    pub fn heap_copy(bytes: &[u8]) -> ByteBuffer<'static> {
        ByteBuffer {
            data: Some(Cow::Owned(bytes.to_vec())),
            flags: BufFlags {
                temporary: true,
                ..BufFlags::default()
            },
        }
    }

    /// Zero-length end-of-stream marker.
    pub fn terminator() -> Self {
        Self {
            data: Some(Cow::Borrowed(&[])),
            flags: BufFlags {
                last_buf: true,
                last_in_chain: true,
                sync: true,
                ..BufFlags::default()
            },
        }
    }

    /// Whether the buffer refers to anything.
    pub fn is_valid(&self) -> bool {
        self.data.is_some()
    }

    /// Whether the buffer owns a heap copy of its bytes.
    pub fn is_owned(&self) -> bool {
        matches!(self.data, Some(Cow::Owned(_)))
    }

    /// Whether the bytes are a read-only view of someone else's memory.
    pub fn is_pass_through(&self) -> bool {
        self.is_valid() && self.flags.memory && !self.flags.temporary
    }

    /// The bytes; empty for an invalid buffer.
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether there are no bytes.
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Current flags.
    pub fn flags(&self) -> BufFlags {
        self.flags
    }

    /// Final buffer of the response.
    pub fn is_last_buf(&self) -> bool {
        self.flags.last_buf
    }

    /// Final buffer of its chain.
    pub fn is_last_in_chain(&self) -> bool {
        self.flags.last_in_chain
    }

    fn update(&mut self, f: impl FnOnce(&mut BufFlags)) -> &mut Self {
        if self.is_valid() {
            f(&mut self.flags);
        }
        self
    }

    /// Set or clear `last_buf`.
    pub fn set_last_buf(&mut self, on: bool) -> &mut Self {
        self.update(|fl| fl.last_buf = on)
    }

    /// Set or clear `last_in_chain`.
    pub fn set_last_in_chain(&mut self, on: bool) -> &mut Self {
        self.update(|fl| fl.last_in_chain = on)
    }

    /// Set or clear `memory`.
    pub fn set_memory(&mut self, on: bool) -> &mut Self {
        self.update(|fl| fl.memory = on)
    }

    /// Set or clear `sync`.
    pub fn set_sync(&mut self, on: bool) -> &mut Self {
        self.update(|fl| fl.sync = on)
    }

    /// Set or clear `temporary`.
    pub fn set_temporary(&mut self, on: bool) -> &mut Self {
        self.update(|fl| fl.temporary = on)
    }

    /// Move the contents out, leaving this buffer invalid.
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Detach from any borrow, copying to the heap if needed.
    pub fn into_owned(self) -> ByteBuffer<'static> {
        ByteBuffer {
            data: self.data.map(|d| Cow::Owned(d.into_owned())),
            flags: self.flags,
        }
    }

    /// A one-link chain holding this buffer.
    pub fn into_chain(self, arena: &'a Arena) -> Result<LinkChain<'a>, ArenaError> {
        LinkChain::single(arena, self)
    }
}

impl ByteView for ByteBuffer<'_> {
    fn bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    fn is_valid(&self) -> bool {
        self.data.is_some()
    }
}

impl fmt::Debug for ByteBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("valid", &self.is_valid())
            .field("owned", &self.is_owned())
            .field("len", &self.len())
            .field("flags", &self.flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_in_is_temporary_arena_memory() {
        let arena = Arena::with_size_hint(4096).unwrap();
        let buf = ByteBuffer::from_str_in(&arena, "payload").unwrap();
        assert_eq!(buf.as_bytes(), b"payload");
        assert!(buf.flags().temporary);
        assert!(!buf.is_owned());
        assert!(!buf.is_pass_through());
        assert!(arena.contains(buf.as_bytes().as_ptr()));
    }

    #[test]
    fn wrap_passes_through() {
        let external = b"static body".to_vec();
        let buf = ByteBuffer::wrap(&external);
        assert!(buf.is_pass_through());
        assert_eq!(buf.as_bytes().as_ptr(), external.as_ptr());
    }

    #[test]
    fn heap_copy_owns_its_bytes() {
        let mut src = b"abc".to_vec();
        let buf = ByteBuffer::heap_copy(&src);
        src[0] = b'x';
        assert!(buf.is_owned());
        assert_eq!(buf.as_bytes(), b"abc");
    }

    #[test]
    fn terminator_flags() {
        let t = ByteBuffer::terminator();
        assert!(t.is_valid());
        assert!(t.is_empty());
        assert!(t.is_last_buf());
        assert!(t.is_last_in_chain());
        assert!(t.flags().sync);
    }

    #[test]
    fn setters_chain() {
        let mut buf = ByteBuffer::empty();
        buf.set_last_buf(true).set_sync(true).set_memory(true);
        assert_eq!(
            buf.flags(),
            BufFlags {
                last_buf: true,
                sync: true,
                memory: true,
                ..BufFlags::default()
            }
        );
        buf.set_last_buf(false);
        assert!(!buf.is_last_buf());
    }

    #[test]
    fn invalid_buffer_ignores_mutation() {
        let mut buf = ByteBuffer::heap_copy(b"x");
        let moved = buf.take();
        assert!(moved.is_valid());
        assert!(!buf.is_valid());
        buf.set_last_buf(true);
        assert!(!buf.is_last_buf());
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn into_owned_keeps_flags() {
        let arena = Arena::with_size_hint(4096).unwrap();
        let mut buf = ByteBuffer::copy_in(&arena, b"z").unwrap();
        buf.set_last_buf(true);
        let owned = buf.into_owned();
        assert!(owned.is_owned());
        assert!(owned.is_last_buf());
    }
}
