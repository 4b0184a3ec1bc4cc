//! Generation-checked resource storage.
//!
//! Every resource the client manages lives in an [`Arena`] slot and is
//! addressed by a small `Copy` key. Freeing a slot bumps its generation, so
//! a key kept after its resource was released no longer resolves instead of
//! silently aliasing whatever reuses the slot.

use std::marker::PhantomData;

/// Raw slot address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RawKey {
    index: u32,
    generation: u32,
}

/// Keys that address an arena slot.
pub(crate) trait ArenaKey: Copy {
    fn from_raw(raw: RawKey) -> Self;
    fn raw(self) -> RawKey;
}

macro_rules! arena_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(RawKey);

        impl ArenaKey for $name {
            fn from_raw(raw: RawKey) -> Self {
                Self(raw)
            }

            fn raw(self) -> RawKey {
                self.0
            }
        }
    };
}

arena_key!(
    /// Key of a database attachment.
    DatabaseKey
);
arena_key!(
    /// Key of a transaction.
    TransactionKey
);
arena_key!(
    /// Key of a statement.
    StatementKey
);
arena_key!(
    /// Key of a blob.
    BlobKey
);
arena_key!(
    /// Key of an array.
    ArrayKey
);
arena_key!(
    /// Key of an events subscription.
    EventsKey
);
arena_key!(
    /// Key of a service manager attachment.
    ServiceKey
);

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with a free list.
pub(crate) struct Arena<K, T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: usize,
    _key: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, T> Arena<K, T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            _key: PhantomData,
        }
    }

    /// Store `value`, reusing a freed slot when one is available.
    pub(crate) fn insert(&mut self, value: T) -> K {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return K::from_raw(RawKey {
                index,
                generation: slot.generation,
            });
        }
        // More than u32::MAX live resources is not a realistic workload.
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        K::from_raw(RawKey {
            index,
            generation: 0,
        })
    }

    fn slot(&self, key: K) -> Option<&Slot<T>> {
        let raw = key.raw();
        self.slots
            .get(raw.index as usize)
            .filter(|slot| slot.generation == raw.generation)
    }

    pub(crate) fn get(&self, key: K) -> Option<&T> {
        self.slot(key)?.value.as_ref()
    }

    pub(crate) fn get_mut(&mut self, key: K) -> Option<&mut T> {
        let raw = key.raw();
        self.slots
            .get_mut(raw.index as usize)
            .filter(|slot| slot.generation == raw.generation)?
            .value
            .as_mut()
    }

    pub(crate) fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// Take the value out and invalidate every outstanding key to it.
    pub(crate) fn remove(&mut self, key: K) -> Option<T> {
        let raw = key.raw();
        let slot = self
            .slots
            .get_mut(raw.index as usize)
            .filter(|slot| slot.generation == raw.generation)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(raw.index);
        self.len -= 1;
        Some(value)
    }

    /// Keys of every live value.
    pub(crate) fn keys(&self) -> Vec<K> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.value.is_some())
            .map(|(index, slot)| {
                K::from_raw(RawKey {
                    index: index as u32,
                    generation: slot.generation,
                })
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl<K: ArenaKey, T> Default for Arena<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> std::fmt::Debug for Arena<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("len", &self.len)
            .field("slots", &self.slots.len())
            .field("free", &self.free_list.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut arena: Arena<BlobKey, &str> = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);

        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_stale_key_does_not_alias_reused_slot() {
        let mut arena: Arena<StatementKey, u32> = Arena::new();
        let old = arena.insert(1);
        arena.remove(old);
        let new = arena.insert(2);
        assert_ne!(old, new);
        assert!(!arena.contains(old));
        assert_eq!(arena.get(new), Some(&2));
        *arena.get_mut(new).unwrap() = 3;
        assert_eq!(arena.get(new), Some(&3));
        assert!(arena.get_mut(old).is_none());
    }

    #[test]
    fn test_keys_lists_live_values() {
        let mut arena: Arena<EventsKey, char> = Arena::new();
        let a = arena.insert('a');
        let b = arena.insert('b');
        let c = arena.insert('c');
        arena.remove(b);
        assert_eq!(arena.keys(), vec![a, c]);
    }
}
