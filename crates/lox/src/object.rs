// SPDX-License-Identifier: GPL-3.0-or-later
//
// Copyright (C) 2026 Lox Contributors

//! Heap object storage for Lox.
//!
//! Lox has exactly two heap-allocated object kinds: interned strings and
//! compiled functions. The reference implementation this crate is modeled
//! on (a `no_std` bytecode VM for a different language) threads every heap
//! value through raw addresses into a platform-supplied memory space and
//! frees them by walking an intrusive linked list at shutdown. Neither
//! makes sense in a hosted Rust binary, so heap objects here live in a
//! growable arena and are referenced by handle (`StringRef`, `FunctionRef`)
//! rather than by pointer. Dropping the `Heap` drops every object at once;
//! there is no explicit free walk and nothing is reclaimed early (matching
//! `spec.md`'s "garbage collection beyond a free-at-shutdown walk" non-goal).

use crate::chunk::Chunk;
use crate::table::{StringLookup, Table};
use crate::value::Value;

/// FNV-1a seed, per the hash used throughout this crate for string interning.
const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
/// FNV-1a prime.
const FNV_PRIME: u32 = 16_777_619;

/// Hash a byte string with 32-bit FNV-1a.
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A handle to an interned string living in a `Heap`.
///
/// Two `StringRef`s compare equal only if they name the same arena slot,
/// which `Heap::intern` guarantees happens only for byte-identical strings.
/// The hash is carried inline so the hash table can probe without
/// dereferencing the heap.
#[derive(Clone, Copy, Debug)]
pub struct StringRef {
    index: u32,
    hash: u32,
}

impl StringRef {
    /// The precomputed FNV-1a hash of the string's bytes.
    #[must_use]
    pub const fn hash(self) -> u32 {
        self.hash
    }
}

impl PartialEq for StringRef {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for StringRef {}

/// A handle to a compiled function living in a `Heap`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionRef(u32);

/// A compiled function: parameter arity, an optional name, and its own chunk.
///
/// The top-level compile produces a synthetic function whose chunk is the
/// whole script and whose name is absent.
pub struct ObjFunction {
    /// Number of declared parameters.
    pub arity: u8,
    /// The function's name, or `None` for the top-level script.
    pub name: Option<StringRef>,
    /// The function's own bytecode.
    pub chunk: Chunk,
}

impl ObjFunction {
    /// Create a new, empty function with the given arity and name.
    #[must_use]
    pub fn new(arity: u8, name: Option<StringRef>) -> Self {
        Self {
            arity,
            name,
            chunk: Chunk::new(),
        }
    }
}

enum Obj {
    String { hash: u32, bytes: Box<str> },
    Function(ObjFunction),
}

/// The heap: an arena of objects plus the table used to intern strings.
///
/// Every string literal or identifier lexeme is routed through
/// [`Heap::intern`], which guarantees that byte-equal strings share one
/// arena slot. This makes string equality at run time a handle comparison.
pub struct Heap {
    objects: Vec<Obj>,
    strings: Table,
}

impl Heap {
    /// Create an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            strings: Table::new(),
        }
    }

    /// Intern a string, returning the canonical handle for its bytes.
    ///
    /// If a live string with the same bytes already exists, its handle is
    /// returned and no allocation happens; otherwise a new string object is
    /// allocated and registered in the intern table.
    pub fn intern(&mut self, s: &str) -> StringRef {
        let hash = fnv1a(s.as_bytes());
        if let Some(existing) = self.strings.find_string(self, s.as_bytes(), hash) {
            return existing;
        }

        let index = u32::try_from(self.objects.len()).expect("object arena overflow");
        self.objects.push(Obj::String {
            hash,
            bytes: s.into(),
        });
        let key = StringRef { index, hash };
        self.strings.set(key, Value::Nil);
        key
    }

    /// Concatenate two strings, producing a freshly interned result.
    ///
    /// This is the one place string allocation happens outside of literals
    /// and identifiers: Lox's `+` operator on two strings.
    pub fn concat(&mut self, a: StringRef, b: StringRef) -> StringRef {
        let mut owned = std::string::String::with_capacity(
            self.string_bytes(a).len() + self.string_bytes(b).len(),
        );
        owned.push_str(self.as_str(a));
        owned.push_str(self.as_str(b));
        self.intern(&owned)
    }

    /// Allocate a new function object, returning its handle.
    pub fn alloc_function(&mut self, function: ObjFunction) -> FunctionRef {
        let index = u32::try_from(self.objects.len()).expect("object arena overflow");
        self.objects.push(Obj::Function(function));
        FunctionRef(index)
    }

    /// Borrow a string's contents as `&str`.
    ///
    /// # Panics
    ///
    /// Panics if `key` does not refer to a string object. This can only
    /// happen by constructing a `StringRef` by hand, which is not possible
    /// outside this module.
    #[must_use]
    pub fn as_str(&self, key: StringRef) -> &str {
        match &self.objects[key.index as usize] {
            Obj::String { bytes, .. } => bytes,
            Obj::Function(_) => unreachable!("StringRef must name a string object"),
        }
    }

    /// Borrow a function by handle.
    ///
    /// # Panics
    ///
    /// Panics if `key` does not refer to a function object.
    #[must_use]
    pub fn function(&self, key: FunctionRef) -> &ObjFunction {
        match &self.objects[key.0 as usize] {
            Obj::Function(f) => f,
            Obj::String { .. } => unreachable!("FunctionRef must name a function object"),
        }
    }

    /// Mutably borrow a function by handle, for the compiler to finish
    /// filling in its chunk.
    ///
    /// # Panics
    ///
    /// Panics if `key` does not refer to a function object.
    pub fn function_mut(&mut self, key: FunctionRef) -> &mut ObjFunction {
        match &mut self.objects[key.0 as usize] {
            Obj::Function(f) => f,
            Obj::String { .. } => unreachable!("FunctionRef must name a function object"),
        }
    }

    /// Look up an already-interned string by content without allocating.
    ///
    /// Used where a caller needs a `StringRef` to probe a table (e.g. the
    /// globals table) but has no handle of its own yet.
    #[must_use]
    pub fn find_interned(&self, s: &str) -> Option<StringRef> {
        self.strings.find_string(self, s.as_bytes(), fnv1a(s.as_bytes()))
    }

    /// The display name of a function: `<fn NAME>` or `<script>`.
    #[must_use]
    pub fn function_display_name(&self, key: FunctionRef) -> std::string::String {
        match self.function(key).name {
            Some(name) => std::format!("<fn {}>", self.as_str(name)),
            None => "<script>".to_owned(),
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl StringLookup for Heap {
    fn string_bytes(&self, key: StringRef) -> &[u8] {
        self.as_str(key).as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_returns_the_same_handle_for_equal_bytes() {
        let mut heap = Heap::new();
        let a = heap.intern("hello");
        let b = heap.intern("hello");
        assert_eq!(a, b);
        assert_eq!(heap.as_str(a), "hello");
    }

    #[test]
    fn interning_distinguishes_different_bytes() {
        let mut heap = Heap::new();
        let a = heap.intern("hello");
        let b = heap.intern("world");
        assert_ne!(a, b);
    }

    #[test]
    fn concat_produces_an_interned_result() {
        let mut heap = Heap::new();
        let a = heap.intern("he");
        let b = heap.intern("llo");
        let c = heap.concat(a, b);
        assert_eq!(heap.as_str(c), "hello");
        let d = heap.intern("hello");
        assert_eq!(c, d);
    }

    #[test]
    fn fnv1a_matches_known_vector() {
        // FNV-1a of the empty string is the offset basis.
        assert_eq!(fnv1a(b""), FNV_OFFSET_BASIS);
    }
}
