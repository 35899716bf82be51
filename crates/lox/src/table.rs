// SPDX-License-Identifier: GPL-3.0-or-later
//
// Copyright (C) 2026 Lox Contributors

//! Open-addressed hash table keyed by interned strings.
//!
//! Used both for the VM's globals table (name → value) and, inside
//! [`crate::object::Heap`], as the string interning table (name → unit,
//! really just a set). Probing is linear with tombstones so deletions
//! don't break probe sequences for later lookups.
//!
//! The reference table (`clox`'s `table.c`) represents empty cells and
//! tombstones as sentinel `(key, value)` pairs inside a single `Entry`
//! struct. That is a C idiom for avoiding a second allocation or an extra
//! tag byte; in Rust a plain three-state enum is the idiomatic equivalent
//! and preserves every invariant `spec.md` documents (max load factor,
//! growth policy, tombstone probing, count semantics).

use crate::object::StringRef;
use crate::value::Value;

/// Maximum load factor before the table grows.
const MAX_LOAD_FACTOR: f64 = 0.75;
/// Minimum table capacity (also the first capacity used on growth from empty).
const MIN_CAPACITY: usize = 8;

#[derive(Clone)]
enum Slot {
    Empty,
    Tombstone,
    Occupied(StringRef, Value),
}

/// Gives a hash table access to the bytes behind a [`StringRef`] without
/// taking a hard dependency on [`crate::object::Heap`].
///
/// Only [`Table::find_string`] needs this: every other operation compares
/// keys by handle identity, which is free.
pub trait StringLookup {
    /// The bytes of the string named by `key`.
    fn string_bytes(&self, key: StringRef) -> &[u8];
}

/// An open-addressed table from interned strings to [`Value`]s.
#[derive(Clone)]
pub struct Table {
    slots: Vec<Slot>,
    /// Live entries *and* tombstones — both count toward the load factor.
    count: usize,
}

impl Table {
    /// Create an empty table. No allocation happens until the first insert.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            count: 0,
        }
    }

    /// Number of live entries (tombstones are not counted here).
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, Slot::Occupied(..)))
            .count()
    }

    /// Whether the table has no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a value by key identity.
    #[must_use]
    pub fn get(&self, key: StringRef) -> Option<Value> {
        if self.slots.is_empty() {
            return None;
        }
        match &self.slots[self.probe(key)] {
            Slot::Occupied(_, value) => Some(*value),
            Slot::Empty | Slot::Tombstone => None,
        }
    }

    /// Insert or overwrite a value by key identity.
    ///
    /// Returns `true` if `key` was not already present (a "new key"),
    /// matching `table_set`'s contract in `spec.md` §4.4.
    pub fn set(&mut self, key: StringRef, value: Value) -> bool {
        self.ensure_capacity_for_insert();

        let index = self.probe(key);
        let is_new = !matches!(self.slots[index], Slot::Occupied(..));
        if matches!(self.slots[index], Slot::Empty) {
            self.count += 1;
        }
        self.slots[index] = Slot::Occupied(key, value);
        is_new
    }

    /// Delete an entry by key identity, replacing it with a tombstone.
    ///
    /// Returns `true` if an entry was present. `count` is not decremented:
    /// tombstones keep counting toward the load factor so probe sequences
    /// for other keys stay intact.
    pub fn delete(&mut self, key: StringRef) -> bool {
        if self.slots.is_empty() {
            return false;
        }
        let index = self.probe(key);
        if matches!(self.slots[index], Slot::Occupied(..)) {
            self.slots[index] = Slot::Tombstone;
            true
        } else {
            false
        }
    }

    /// The interning primitive: find a string by *content* rather than
    /// handle identity. Used only before a candidate string has a handle
    /// of its own — once it's interned, all further lookups use identity.
    #[must_use]
    pub fn find_string(
        &self,
        lookup: &impl StringLookup,
        bytes: &[u8],
        hash: u32,
    ) -> Option<StringRef> {
        if self.slots.is_empty() {
            return None;
        }
        let cap = self.slots.len();
        let mut index = (hash as usize) % cap;
        loop {
            match &self.slots[index] {
                Slot::Empty => return None,
                Slot::Tombstone => {}
                Slot::Occupied(key, _) => {
                    if key.hash() == hash && lookup.string_bytes(*key) == bytes {
                        return Some(*key);
                    }
                }
            }
            index = (index + 1) % cap;
        }
    }

    /// Probe for `key` by identity, returning the index of either the
    /// occupied slot holding it, or the first empty/tombstone slot found
    /// while searching (the slot to (re)use on insert).
    fn probe(&self, key: StringRef) -> usize {
        let cap = self.slots.len();
        let mut index = (key.hash() as usize) % cap;
        let mut tombstone = None;
        loop {
            match &self.slots[index] {
                Slot::Empty => return tombstone.unwrap_or(index),
                Slot::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Slot::Occupied(k, _) if *k == key => return index,
                Slot::Occupied(..) => {}
            }
            index = (index + 1) % cap;
        }
    }

    fn ensure_capacity_for_insert(&mut self) {
        let cap = self.slots.len();
        if cap == 0 {
            self.grow(MIN_CAPACITY);
            return;
        }
        #[allow(clippy::cast_precision_loss)]
        if (self.count + 1) as f64 > cap as f64 * MAX_LOAD_FACTOR {
            self.grow(cap * 2);
        }
    }

    fn grow(&mut self, new_capacity: usize) {
        let old = std::mem::replace(&mut self.slots, vec![Slot::Empty; new_capacity]);
        self.count = 0;
        for slot in old {
            if let Slot::Occupied(key, value) = slot {
                let index = self.probe(key);
                self.slots[index] = Slot::Occupied(key, value);
                self.count += 1;
            }
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Heap;

    #[test]
    fn set_then_get_roundtrips() {
        let mut heap = Heap::new();
        let mut table = Table::new();
        let key = heap.intern("answer");
        assert!(table.set(key, Value::Number(42.0)));
        assert_eq!(table.get(key), Some(Value::Number(42.0)));
    }

    #[test]
    fn set_on_existing_key_is_not_new() {
        let mut heap = Heap::new();
        let mut table = Table::new();
        let key = heap.intern("x");
        assert!(table.set(key, Value::Nil));
        assert!(!table.set(key, Value::Bool(true)));
    }

    #[test]
    fn delete_then_get_is_absent() {
        let mut heap = Heap::new();
        let mut table = Table::new();
        let key = heap.intern("gone");
        table.set(key, Value::Nil);
        assert!(table.delete(key));
        assert_eq!(table.get(key), None);
        assert!(!table.delete(key));
    }

    #[test]
    fn find_string_locates_content_before_a_handle_exists() {
        let mut heap = Heap::new();
        let mut table = Table::new();
        let key = heap.intern("shared");
        table.set(key, Value::Nil);

        let hash = crate::object::fnv1a(b"shared");
        let found = table.find_string(&heap, b"shared", hash);
        assert_eq!(found, Some(key));

        let missing = table.find_string(&heap, b"absent", crate::object::fnv1a(b"absent"));
        assert_eq!(missing, None);
    }

    #[test]
    fn grows_past_many_insertions_without_losing_entries() {
        let mut heap = Heap::new();
        let mut table = Table::new();
        let mut keys = std::vec::Vec::new();
        for i in 0..200 {
            let name = std::format!("key{i}");
            let key = heap.intern(&name);
            table.set(key, Value::Number(f64::from(i)));
            keys.push(key);
        }
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(table.get(*key), Some(Value::Number(f64::from(i as i32))));
        }
    }

    proptest::proptest! {
        #[test]
        fn matches_a_reference_map_under_set_and_delete(
            ops in proptest::collection::vec(
                (0u32..12, proptest::bool::ANY, 0i64..1000),
                0..200,
            )
        ) {
            use std::collections::HashMap;

            let mut heap = Heap::new();
            let mut table = Table::new();
            let mut model: HashMap<u32, i64> = HashMap::new();
            let mut handles: HashMap<u32, StringRef> = HashMap::new();

            for (id, is_delete, value) in ops {
                let name = std::format!("k{id}");
                let key = *handles.entry(id).or_insert_with(|| heap.intern(&name));

                if is_delete {
                    let existed = table.delete(key);
                    proptest::prop_assert_eq!(existed, model.remove(&id).is_some());
                } else {
                    table.set(key, Value::Number(value as f64));
                    model.insert(id, value);
                }

                let expected = model.get(&id).map(|v| Value::Number(*v as f64));
                proptest::prop_assert_eq!(table.get(key), expected);
            }
        }
    }
}
