//! Opaque Handles
//!
//! Generational slot table backing the 64-bit handles given to the host.
//! A handle is `generation << 32 | slot`; generations start at 1 so a
//! handle is never 0, and stale handles are rejected after removal.

/// Opaque host-visible handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// The null handle, never issued
    pub const NULL: Handle = Handle(0);

    fn new(slot: u32, generation: u32) -> Self {
        Self((u64::from(generation) << 32) | u64::from(slot))
    }

    /// Reinterpret a raw value received from the host
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    fn slot(self) -> usize {
        (self.0 & 0xFFFF_FFFF) as usize
    }

    fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

/// Slot table keyed by [`Handle`]
#[derive(Debug)]
pub struct HandleTable<T> {
    entries: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: Vec<u32>,
    len: usize,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Insert value, returning its handle
    pub fn insert(&mut self, value: T) -> Handle {
        self.len += 1;
        if let Some(slot) = self.free_list.pop() {
            let index = slot as usize;
            self.entries[index] = Some(value);
            Handle::new(slot, self.generations[index])
        } else {
            let slot = self.entries.len() as u32;
            self.entries.push(Some(value));
            self.generations.push(1);
            Handle::new(slot, 1)
        }
    }

    /// Get value
    pub fn get(&self, handle: Handle) -> Option<&T> {
        if !self.is_current(handle) {
            return None;
        }
        self.entries.get(handle.slot()).and_then(Option::as_ref)
    }

    /// Remove value; the handle becomes stale
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        if !self.is_current(handle) {
            return None;
        }
        let index = handle.slot();
        let value = self.entries.get_mut(index)?.take()?;

        // Skip 0 on wrap so no handle ever equals NULL
        self.generations[index] = self.generations[index].wrapping_add(1).max(1);
        self.free_list.push(index as u32);
        self.len -= 1;
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove every value
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.len);
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if let Some(value) = entry.take() {
                self.generations[index] = self.generations[index].wrapping_add(1).max(1);
                self.free_list.push(index as u32);
                values.push(value);
            }
        }
        self.len = 0;
        values
    }

    fn is_current(&self, handle: Handle) -> bool {
        handle != Handle::NULL
            && self.generations.get(handle.slot()).is_some_and(|g| *g == handle.generation())
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
