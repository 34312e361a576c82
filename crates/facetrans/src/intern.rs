//! String and bytes interning for identifiers and literals of one unit.
//!
//! Every identifier the parser sees (variable names, attribute names, parameter names,
//! module paths) and every string literal is stored once and referred to by a [`StringId`].
//! The rewriter compares and copies ids instead of strings, and the printer looks them up
//! again when producing source text.
//!
//! The interner is owned by the unit being rewritten. The hygienic name generator scans it
//! to pick a symbol prefix no user string can collide with (see [`crate::fresh`]).

use ahash::AHashMap;

/// Index into the string interner's storage.
///
/// Uses `u32` to save space (4 bytes vs 8 bytes for `usize`). This limits a unit to
/// ~4 billion unique strings, which is more than sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StringId(u32);

impl StringId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into the bytes interner's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BytesId(u32);

/// Interner for the strings and bytes literals of one unit.
#[derive(Debug, Clone, Default)]
pub struct InternerBuilder {
    /// Maps strings to their indices for deduplication during interning.
    string_map: AHashMap<String, StringId>,
    /// Storage for interned strings, indexed by `StringId`.
    strings: Vec<String>,
    /// Storage for interned bytes literals, indexed by `BytesId`.
    /// Not deduplicated since bytes literals are rare.
    bytes: Vec<Vec<u8>>,
}

impl InternerBuilder {
    /// Creates an interner sized from a rough guess at the number of names in `code`.
    #[must_use]
    pub fn new(code: &str) -> Self {
        // one identifier per ~8 bytes of source is a generous upper bound for typical code
        let capacity = code.len() >> 3;
        Self {
            string_map: AHashMap::with_capacity(capacity),
            strings: Vec::with_capacity(capacity),
            bytes: Vec::new(),
        }
    }

    /// Interns a string, returning its `StringId`.
    ///
    /// Returns the existing id when the string was interned before.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(id) = self.string_map.get(s) {
            return *id;
        }
        let id = StringId(self.strings.len().try_into().expect("StringId overflow"));
        self.strings.push(s.to_owned());
        self.string_map.insert(s.to_owned(), id);
        id
    }

    /// Interns bytes, returning its `BytesId`.
    pub fn intern_bytes(&mut self, b: &[u8]) -> BytesId {
        let id = BytesId(self.bytes.len().try_into().expect("BytesId overflow"));
        self.bytes.push(b.to_vec());
        id
    }

    /// Looks up a string by its `StringId`.
    #[inline]
    #[must_use]
    pub fn get_str(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    /// Looks up a bytes literal by its `BytesId`.
    #[inline]
    #[must_use]
    pub fn get_bytes(&self, id: BytesId) -> &[u8] {
        &self.bytes[id.0 as usize]
    }

    /// Looks up a `StringId` by its string value.
    ///
    /// Returns `Some(id)` if the string was previously interned, `None` otherwise.
    #[must_use]
    pub fn try_get_str_id(&self, s: &str) -> Option<StringId> {
        self.string_map.get(s).copied()
    }

    /// Iterates over every interned string in interning order.
    pub fn strings(&self) -> impl Iterator<Item = &str> + '_ {
        self.strings.iter().map(String::as_str)
    }

    /// Returns the number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true when nothing has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates() {
        let mut interner = InternerBuilder::new("x = y");
        let a = interner.intern("value");
        let b = interner.intern("other");
        let c = interner.intern("value");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(interner.get_str(b), "other");
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn lookup_without_interning() {
        let mut interner = InternerBuilder::default();
        assert_eq!(interner.try_get_str_id("missing"), None);
        let id = interner.intern("present");
        assert_eq!(interner.try_get_str_id("present"), Some(id));
    }

    #[test]
    fn bytes_are_not_deduplicated() {
        let mut interner = InternerBuilder::default();
        let a = interner.intern_bytes(b"abc");
        let b = interner.intern_bytes(b"abc");
        assert_ne!(a, b);
        assert_eq!(interner.get_bytes(b), b"abc");
    }
}
