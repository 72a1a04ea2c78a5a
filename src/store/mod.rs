//! Keyed collections used for per-user and per-source records.
//!
//! [KeyedStore] is the local variant: an arena of records addressed by key, where lookups never
//! fail because a missing key is inserted with a default value. [synced::SyncedStore] wraps the
//! same arena and keeps it in line with a remote collaborator.

pub mod metrics;
pub mod synced;

use std::{collections::HashMap, hash::Hash};

/// Stable reference to a record inside a [KeyedStore]. A handle of a removed record never
/// resolves to the record that later reuses its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct Slot<K, V> {
    generation: u32,
    entry: Option<(K, V)>,
}

#[derive(Debug)]
pub struct KeyedStore<K, V> {
    slots: Vec<Slot<K, V>>,
    free: Vec<usize>,
    index: HashMap<K, Handle>,
    /// Slot indices in insertion order.
    order: Vec<usize>,
}

impl<K, V> Default for KeyedStore<K, V> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<K: Clone + Eq + Hash, V> KeyedStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn handle(&self, key: &K) -> Option<Handle> {
        self.index.get(key).copied()
    }

    pub fn get(&self, handle: Handle) -> Option<&V> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut V> {
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_mut())
            .map(|(_, value)| value)
    }

    pub fn get_by_key(&self, key: &K) -> Option<&V> {
        self.handle(key).and_then(|handle| self.get(handle))
    }

    /// Inserts `value` under `key`. An existing record is replaced in place so its handle and
    /// position stay the same.
    pub fn insert(&mut self, key: K, value: V) -> Handle {
        if let Some(handle) = self.handle(&key) {
            if let Some(slot) = self.get_mut(handle) {
                *slot = value;
            }
            return handle;
        }

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.entry = Some((key.clone(), value));
                Handle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some((key.clone(), value)),
                });
                Handle {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        };
        self.order.push(handle.index);
        self.index.insert(key, handle);
        handle
    }

    /// Removes the record stored under `key`. Missing keys are ignored.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let handle = self.index.remove(key)?;
        let slot = &mut self.slots[handle.index];
        let (_, value) = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.order.retain(|index| *index != handle.index);
        Some(value)
    }

    /// Iterates over records in the order they were inserted.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.order.iter().filter_map(|index| {
            self.slots[*index]
                .entry
                .as_ref()
                .map(|(key, value)| (key, value))
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Record at position `n` of the insertion order.
    pub fn nth(&self, n: usize) -> Option<(&K, &V)> {
        self.iter().nth(n)
    }
}

impl<K: Clone + Eq + Hash, V: Default> KeyedStore<K, V> {
    /// Upsert-on-read lookup: a missing key gets a default record, so this never fails.
    pub fn find(&mut self, key: &K) -> Handle {
        match self.handle(key) {
            Some(handle) => handle,
            None => self.insert(key.clone(), V::default()),
        }
    }

    /// Same as [KeyedStore::find] but resolves the handle right away.
    pub fn find_mut(&mut self, key: &K) -> &mut V {
        let handle = self.find(key);
        let slot = &mut self.slots[handle.index];
        match slot.entry.as_mut() {
            Some((_, value)) => value,
            None => unreachable!("handle returned by find always points to a live slot"),
        }
    }
}
