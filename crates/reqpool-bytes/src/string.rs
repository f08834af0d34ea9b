//! Byte strings that borrow, live in an arena, or own a heap copy.

use std::borrow::Cow;
use std::fmt;
use std::mem;

use reqpool_arena::{Arena, BytesHandle};
use reqpool_core::{ArenaError, ByteView};

/// A byte string with an explicit invalid state.
///
/// Storage is one of:
///
/// - a borrowed view (external bytes or arena bytes), never released;
/// - an owned heap copy, released exactly once on drop;
/// - nothing at all (invalid: default constructed, taken from, or the
///   result of a lookup that failed).
///
/// Read operations on an invalid string return empty results, and every
/// comparison involving one is `false`. Because an invalid string is not
/// even equal to itself, `ByteString` is `PartialEq` but not `Eq`.
#[derive(Default)]
pub struct ByteString<'a> {
    data: Option<Cow<'a, [u8]>>,
}

impl<'a> ByteString<'a> {
    /// View `bytes` without copying.
    pub const fn borrowed(bytes: &'a [u8]) -> Self {
        Self {
            data: Some(Cow::Borrowed(bytes)),
        }
    }

    /// View `s` without copying.
    #[allow(clippy::should_implement_trait)]
    pub const fn from_str(s: &'a str) -> Self {
        Self::borrowed(s.as_bytes())
    }

    /// View a static literal.
    pub const fn literal(s: &'static str) -> Self {
        Self::borrowed(s.as_bytes())
    }

    /// A valid, zero-length string.
    pub const fn empty() -> Self {
        Self::borrowed(&[])
    }

    /// The invalid string.
    pub const fn invalid() -> Self {
        Self { data: None }
    }

    /// Copy `bytes` into `arena`.
    pub fn copy_in(arena: &'a Arena, bytes: &[u8]) -> Result<Self, ArenaError> {
        let copy: &'a [u8] = arena.alloc_copy(bytes)?;
        Ok(Self::borrowed(copy))
    }

    /// Copy `s` into `arena`.
    pub fn copy_str_in(arena: &'a Arena, s: &str) -> Result<Self, ArenaError> {
        Self::copy_in(arena, s.as_bytes())
    }

    /// Copy `bytes` to the heap.
    pub fn owned_copy(bytes: &[u8]) -> ByteString<'static> {
        ByteString {
            data: Some(Cow::Owned(bytes.to_vec())),
        }
    }

    /// Whether the string refers to anything.
    pub fn is_valid(&self) -> bool {
        self.data.is_some()
    }

    /// Whether the string owns a heap copy of its bytes.
    pub fn is_owned(&self) -> bool {
        matches!(self.data, Some(Cow::Owned(_)))
    }

    /// The bytes; empty for an invalid string.
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }

    /// Length in bytes; zero for an invalid string.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether there are no bytes (always true when invalid).
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// The bytes as UTF-8, if valid and well-formed.
    pub fn to_str(&self) -> Option<&str> {
        self.data
            .as_deref()
            .and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Byte-wise equality. `false` if either side is invalid.
    pub fn equals(&self, other: &ByteString<'_>) -> bool {
        match (&self.data, &other.data) {
            (Some(a), Some(b)) => a[..] == b[..],
            _ => false,
        }
    }

    /// Byte-wise equality with `s`. `false` if invalid.
    pub fn equals_str(&self, s: &str) -> bool {
        self.data.as_deref() == Some(s.as_bytes())
    }

    /// ASCII case-insensitive equality. `false` if either side is invalid.
    pub fn eq_ignore_case(&self, other: &ByteString<'_>) -> bool {
        match (&self.data, &other.data) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }

    /// ASCII case-insensitive equality with `s`. `false` if invalid.
    pub fn eq_ignore_case_str(&self, s: &str) -> bool {
        self.data
            .as_deref()
            .is_some_and(|b| b.eq_ignore_ascii_case(s.as_bytes()))
    }

    /// Whether the string begins with `prefix`.
    ///
    /// An empty prefix or an empty (or invalid) string never matches.
    pub fn starts_with(&self, prefix: impl AsRef<[u8]>) -> bool {
        let prefix = prefix.as_ref();
        !prefix.is_empty() && !self.is_empty() && self.as_bytes().starts_with(prefix)
    }

    /// Whether the string ends with `suffix`.
    ///
    /// An empty suffix or an empty (or invalid) string never matches.
    pub fn ends_with(&self, suffix: impl AsRef<[u8]>) -> bool {
        let suffix = suffix.as_ref();
        !suffix.is_empty() && !self.is_empty() && self.as_bytes().ends_with(suffix)
    }

    /// Offset of the first occurrence of `needle`.
    ///
    /// Naive O(n·m) scan; header-sized inputs don't justify anything
    /// cleverer. `None` for an empty needle or an empty haystack.
    pub fn find(&self, needle: impl AsRef<[u8]>) -> Option<usize> {
        let needle = needle.as_ref();
        let haystack = self.as_bytes();
        if needle.is_empty() || haystack.is_empty() || needle.len() > haystack.len() {
            return None;
        }
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    fn range(&self, pos: usize, len: usize) -> Option<&[u8]> {
        let bytes = self.data.as_deref()?;
        if pos >= bytes.len() {
            return Some(&[]);
        }
        let end = pos.saturating_add(len).min(bytes.len());
        Some(&bytes[pos..end])
    }

    /// Heap copy of up to `len` bytes starting at `pos`.
    ///
    /// Never aliases this string, so it survives the source being
    /// released. `pos` past the end yields a valid empty string; an
    /// invalid source yields an invalid string. Pass `usize::MAX` as
    /// `len` to take the rest.
    pub fn substr(&self, pos: usize, len: usize) -> ByteString<'static> {
        match self.range(pos, len) {
            Some([]) => ByteString::empty(),
            Some(bytes) => ByteString::owned_copy(bytes),
            None => ByteString::invalid(),
        }
    }

    /// Like [`substr`](ByteString::substr), but the copy lives in `arena`.
    pub fn substr_in<'b>(
        &self,
        arena: &'b Arena,
        pos: usize,
        len: usize,
    ) -> Result<ByteString<'b>, ArenaError> {
        match self.range(pos, len) {
            Some(bytes) => ByteString::copy_in(arena, bytes),
            None => Ok(ByteString::invalid()),
        }
    }

    /// Detach from any borrow, copying to the heap if needed.
    ///
    /// Use before handing the string to work that outlives the request.
    pub fn into_owned(self) -> ByteString<'static> {
        ByteString {
            data: self.data.map(|d| Cow::Owned(d.into_owned())),
        }
    }

    /// Move the contents out, leaving this string invalid.
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Locate this string's bytes in `arena` for later lookup.
    ///
    /// `None` unless the string is a non-empty view into the arena's
    /// scratch memory.
    pub fn detach(&self, arena: &Arena) -> Option<BytesHandle> {
        match &self.data {
            Some(Cow::Borrowed(bytes)) => arena.detach(bytes),
            _ => None,
        }
    }

    /// The string `handle` points at, or an invalid string once the arena
    /// has been reset or destroyed.
    pub fn resolve(arena: &'a mut Arena, handle: BytesHandle) -> Self {
        arena
            .resolve(handle)
            .map(ByteString::borrowed)
            .unwrap_or_default()
    }
}

impl Clone for ByteString<'_> {
    /// Always an owned heap copy; never aliases the source.
    fn clone(&self) -> Self {
        Self {
            data: self.data.as_deref().map(|b| Cow::Owned(b.to_vec())),
        }
    }
}

impl PartialEq for ByteString<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl PartialEq<str> for ByteString<'_> {
    fn eq(&self, other: &str) -> bool {
        self.equals_str(other)
    }
}

impl PartialEq<&str> for ByteString<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.equals_str(other)
    }
}

impl AsRef<[u8]> for ByteString<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl ByteView for ByteString<'_> {
    fn bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    fn is_valid(&self) -> bool {
        self.data.is_some()
    }
}

impl<'a> From<&'a str> for ByteString<'a> {
    fn from(s: &'a str) -> Self {
        Self::from_str(s)
    }
}

impl<'a> From<&'a [u8]> for ByteString<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::borrowed(bytes)
    }
}

impl From<String> for ByteString<'static> {
    fn from(s: String) -> Self {
        Self {
            data: Some(Cow::Owned(s.into_bytes())),
        }
    }
}

impl From<Vec<u8>> for ByteString<'static> {
    fn from(bytes: Vec<u8>) -> Self {
        Self {
            data: Some(Cow::Owned(bytes)),
        }
    }
}

impl fmt::Debug for ByteString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(Cow::Borrowed(b)) => write!(f, "Borrowed({:?})", String::from_utf8_lossy(b)),
            Some(Cow::Owned(b)) => write!(f, "Owned({:?})", String::from_utf8_lossy(b)),
            None => f.write_str("Invalid"),
        }
    }
}

impl fmt::Display for ByteString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}
