//! Integer-handle registry for GPU objects owned by the backend.

use std::collections::HashMap;

/// Maps non-zero `u64` handles to owned values. Handles are never reused.
pub struct HandleStore<T> {
    items: HashMap<u64, T>,
    next: u64,
}

impl<T> HandleStore<T> {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            next: 1,
        }
    }

    pub fn insert(&mut self, value: T) -> u64 {
        let handle = self.next;
        self.next += 1;
        self.items.insert(handle, value);
        handle
    }

    pub fn get(&self, handle: u64) -> Option<&T> {
        self.items.get(&handle)
    }

    pub fn remove(&mut self, handle: u64) -> Option<T> {
        self.items.remove(&handle)
    }
}

impl<T> Default for HandleStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_nonzero_and_not_reused() {
        let mut store = HandleStore::new();
        let a = store.insert("a");
        let b = store.insert("b");
        assert!(a > 0 && b > a);
        assert_eq!(store.remove(a), Some("a"));
        let c = store.insert("c");
        assert!(c > b);
        assert_eq!(store.get(a), None);
        assert_eq!(store.get(c), Some(&"c"));
        assert_eq!(store.get(b), Some(&"b"));
    }
}
