use super::handle::Handle;

/// Append-only arena with tombstones. Handles stay stable after a removal; a removed
/// slot is never reused, so a stale handle reads `None` instead of someone else's item.
pub struct AssetCache<T> {
    items: Vec<Option<T>>,
}

impl<T> Default for AssetCache<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> AssetCache<T> {
    pub fn insert(&mut self, item: T) -> Handle<T> {
        let idx = self.items.len() as u32;
        self.items.push(Some(item));
        Handle::new(idx)
    }

    /// Get a reference to an asset by handle.
    /// Returns None if the handle is invalid or was removed.
    pub fn get(&self, h: Handle<T>) -> Option<&T> {
        self.items.get(h.idx()).and_then(Option::as_ref)
    }

    /// Get a mutable reference to an asset by handle.
    pub fn get_mut(&mut self, h: Handle<T>) -> Option<&mut T> {
        self.items.get_mut(h.idx()).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, h: Handle<T>) -> Option<T> {
        self.items.get_mut(h.idx()).and_then(Option::take)
    }

    /// Live items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| item.as_ref().map(|item| (Handle::new(idx as u32), item)))
    }

    pub fn len(&self) -> usize {
        self.items.iter().filter(|item| item.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_invalid_handle_returns_none() {
        let cache: AssetCache<u32> = AssetCache::default();
        let fake_handle = Handle::new(999);
        assert!(cache.get(fake_handle).is_none());
    }

    #[test]
    fn get_valid_handle_returns_some() {
        let mut cache = AssetCache::default();
        let handle = cache.insert(42u32);
        assert_eq!(cache.get(handle), Some(&42));
    }

    #[test]
    fn removed_slot_is_not_reused() {
        let mut cache = AssetCache::default();
        let first = cache.insert(1u32);
        assert_eq!(cache.remove(first), Some(1));
        let second = cache.insert(2u32);

        assert_ne!(first, second);
        assert!(cache.get(first).is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![2]);
    }
}
