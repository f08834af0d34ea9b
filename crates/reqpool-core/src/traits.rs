//! Read-only byte access shared by every wrapper type.

use std::borrow::Cow;

/// Read-only view of a wrapper's bytes.
///
/// Implemented by the byte wrappers so callers can treat strings and
/// buffers uniformly. Every method is total: an invalid wrapper (default
/// constructed, moved-from, or the result of a failed allocation) reports
/// itself as invalid and yields an empty slice instead of faulting.
pub trait ByteView {
    /// The wrapper's bytes, or an empty slice if the wrapper is invalid.
    fn bytes(&self) -> &[u8];

    /// Whether the wrapper refers to anything at all.
    fn is_valid(&self) -> bool;

    /// Number of bytes; zero for an invalid wrapper.
    fn size(&self) -> usize {
        self.bytes().len()
    }

    /// Lossy UTF-8 rendering of the bytes.
    fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.bytes())
    }
}

impl ByteView for [u8] {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn is_valid(&self) -> bool {
        true
    }
}

impl ByteView for str {
    fn bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    fn is_valid(&self) -> bool {
        true
    }
}

impl<T: ByteView + ?Sized> ByteView for &T {
    fn bytes(&self) -> &[u8] {
        (**self).bytes()
    }

    fn is_valid(&self) -> bool {
        (**self).is_valid()
    }
}
