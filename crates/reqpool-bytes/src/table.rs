//! Key/value entries for header-style tables.

use std::fmt;
use std::mem;

use reqpool_arena::Arena;
use reqpool_core::ArenaError;

use crate::list::SegmentedList;
use crate::string::ByteString;

#[derive(Clone, Copy, Default)]
struct Fields<'a> {
    key: &'a [u8],
    value: &'a [u8],
    hash: usize,
}

/// A key/value pair of byte ranges plus a hash marker.
///
/// A hash of zero marks the entry as deleted or not yet filled in; see
/// [`is_active`](TableEntry::is_active). The ranges either point at
/// arena copies ([`set_key`](TableEntry::set_key)) or at memory the
/// caller guarantees outlives the entry
/// ([`set_key_direct`](TableEntry::set_key_direct)).
///
/// `Default` is the invalid state; every setter on it is a no-op.
#[derive(Clone, Copy, Default)]
pub struct TableEntry<'a> {
    inner: Option<Fields<'a>>,
}

impl<'a> TableEntry<'a> {
    /// A valid entry with empty key and value and hash zero.
    pub fn new() -> Self {
        Self {
            inner: Some(Fields::default()),
        }
    }

    /// Push a fresh entry into `list` and return it for filling in.
    pub fn new_in_list<'l>(
        list: &'l mut SegmentedList<'a, TableEntry<'a>>,
    ) -> Result<&'l mut TableEntry<'a>, ArenaError> {
        list.push(Self::new())
    }

    /// Whether the entry is usable.
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Copy `key` into `arena` and point the key at the copy.
    pub fn set_key(&mut self, arena: &'a Arena, key: &str) -> Result<&mut Self, ArenaError> {
        if let Some(fields) = self.inner.as_mut() {
            fields.key = arena.alloc_copy(key.as_bytes())?;
        }
        Ok(self)
    }

    /// Copy `value` into `arena` and point the value at the copy.
    pub fn set_value(&mut self, arena: &'a Arena, value: &str) -> Result<&mut Self, ArenaError> {
        if let Some(fields) = self.inner.as_mut() {
            fields.value = arena.alloc_copy(value.as_bytes())?;
        }
        Ok(self)
    }

    /// Point the key at `key` without copying.
    pub fn set_key_direct(&mut self, key: &'a [u8]) -> &mut Self {
        if let Some(fields) = self.inner.as_mut() {
            fields.key = key;
        }
        self
    }

    /// Point the value at `value` without copying.
    pub fn set_value_direct(&mut self, value: &'a [u8]) -> &mut Self {
        if let Some(fields) = self.inner.as_mut() {
            fields.value = value;
        }
        self
    }

    /// Set the hash marker. Zero marks the entry inactive.
    pub fn set_hash(&mut self, hash: usize) -> &mut Self {
        if let Some(fields) = self.inner.as_mut() {
            fields.hash = hash;
        }
        self
    }

    /// Key bytes; empty when invalid.
    pub fn key(&self) -> &'a [u8] {
        self.inner.map(|f| f.key).unwrap_or_default()
    }

    /// Value bytes; empty when invalid.
    pub fn value(&self) -> &'a [u8] {
        self.inner.map(|f| f.value).unwrap_or_default()
    }

    /// Key as a borrowed [`ByteString`] (invalid when the entry is).
    pub fn key_str(&self) -> ByteString<'a> {
        match self.inner {
            Some(f) => ByteString::borrowed(f.key),
            None => ByteString::invalid(),
        }
    }

    /// Value as a borrowed [`ByteString`] (invalid when the entry is).
    pub fn value_str(&self) -> ByteString<'a> {
        match self.inner {
            Some(f) => ByteString::borrowed(f.value),
            None => ByteString::invalid(),
        }
    }

    /// Hash marker; zero when invalid.
    pub fn hash(&self) -> usize {
        self.inner.map_or(0, |f| f.hash)
    }

    /// Valid with a non-zero hash.
    pub fn is_active(&self) -> bool {
        self.hash() != 0
    }

    /// ASCII case-insensitive key comparison. False when invalid.
    pub fn key_matches(&self, name: &str) -> bool {
        self.is_valid() && self.key().eq_ignore_ascii_case(name.as_bytes())
    }

    /// Heap copies of key and value, independent of the arena.
    pub fn to_owned_pair(&self) -> (ByteString<'static>, ByteString<'static>) {
        (self.key_str().into_owned(), self.value_str().into_owned())
    }

    /// Move the fields out, leaving this entry invalid.
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }
}

impl fmt::Debug for TableEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner {
            Some(fields) => f
                .debug_struct("TableEntry")
                .field("key", &String::from_utf8_lossy(fields.key))
                .field("value", &String::from_utf8_lossy(fields.value))
                .field("hash", &fields.hash)
                .finish(),
            None => f.write_str("TableEntry(invalid)"),
        }
    }
}
