/// A key into a [`Slab`].
///
/// Keys carry the generation of the slot they were issued for, so a key
/// that outlived its entry never resolves to a newer occupant of the
/// same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    index: u32,
    generation: u32,
}

impl Key {
    /// Packs the key into a single integer, for use in opaque handles.
    pub(crate) fn into_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    /// Rebuilds a key from [`into_raw`](Self::into_raw).
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

struct Slot<T> {
    generation: u32,
    item: Option<T>,
}

/// A simple generational slab.
///
/// A `Slab` stores values of type `T` in a contiguous vector and
/// hands out small keys that can be reused after removal.
///
/// Internally, it keeps track of:
/// - the occupied slots and their generation,
/// - a stack of free indices.
pub(crate) struct Slab<T> {
    /// Storage for items (vacant slots hold `None`).
    slots: Vec<Slot<T>>,
    /// Stack of free indices that can be reused.
    free: Vec<usize>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates a new `Slab` with room for `size` items before growing.
    pub(crate) fn new(size: usize) -> Self {
        let slots = (0..size)
            .map(|_| Slot {
                generation: 0,
                item: None,
            })
            .collect();
        let free = (0..size).rev().collect();

        Self {
            slots,
            free,
            len: 0,
        }
    }

    /// Inserts a value into the slab and returns its key.
    ///
    /// If a free slot is available, it is reused.
    /// Otherwise, the slab grows exponentially.
    pub(crate) fn insert(&mut self, item: T) -> Key {
        let index = if let Some(i) = self.free.pop() {
            i
        } else {
            let len = self.slots.len();
            let new_len = if len == 0 { 1 } else { 2 * len };

            self.slots.extend((len..new_len).map(|_| Slot {
                generation: 0,
                item: None,
            }));
            self.free.extend(((len + 1)..new_len).rev());

            len
        };

        let slot = &mut self.slots[index];
        slot.item = Some(item);
        self.len += 1;

        Key {
            index: index as u32,
            generation: slot.generation,
        }
    }

    /// Removes and returns the value stored under `key`.
    ///
    /// Returns `None` if the key is stale or was never issued.
    pub(crate) fn remove(&mut self, key: Key) -> Option<T> {
        let slot = self.slots.get_mut(key.index as usize)?;

        if slot.generation != key.generation {
            return None;
        }

        let item = slot.item.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index as usize);
        self.len -= 1;

        Some(item)
    }

    /// Returns a reference to the value stored under `key`.
    pub(crate) fn get(&self, key: Key) -> Option<&T> {
        let slot = self.slots.get(key.index as usize)?;

        if slot.generation != key.generation {
            return None;
        }

        slot.item.as_ref()
    }

    /// Iterates over the occupied slots.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (Key, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.item.as_ref().map(|item| {
                (
                    Key {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    item,
                )
            })
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}
