/// A fixed-capacity bucket of key/value pairs owned by the hash table directory.
///
/// Several directory slots may point at the same bucket; the bucket itself
/// only knows its local depth and its entries.
#[derive(Debug)]
pub(crate) struct Bucket<K, V> {
    /// Maximum number of entries before the bucket must split
    capacity: usize,
    /// Number of low hash bits shared by every key in this bucket
    depth: u32,
    /// Entries in insertion order
    items: Vec<(K, V)>,
}

impl<K: Eq, V> Bucket<K, V> {
    pub(crate) fn new(capacity: usize, depth: u32) -> Self {
        Self::with_items(capacity, depth, Vec::with_capacity(capacity))
    }

    pub(crate) fn with_items(capacity: usize, depth: u32, items: Vec<(K, V)>) -> Self {
        debug_assert!(items.len() <= capacity);
        Self {
            capacity,
            depth,
            items,
        }
    }

    pub(crate) fn depth(&self) -> u32 {
        self.depth
    }

    pub(crate) fn increment_depth(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub(crate) fn items(&self) -> &[(K, V)] {
        &self.items
    }

    /// Takes every entry out of the bucket, leaving it empty.
    pub(crate) fn take_items(&mut self) -> Vec<(K, V)> {
        std::mem::replace(&mut self.items, Vec::with_capacity(self.capacity))
    }

    pub(crate) fn find(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Removes the entry for `key`, returning true if it was present.
    pub(crate) fn remove(&mut self, key: &K) -> bool {
        match self.items.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Inserts or overwrites an entry.
    ///
    /// An existing key is always updated in place, even when the bucket is
    /// full. A new key is rejected when there is no room, and the pair is
    /// handed back so the caller can split and retry.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Result<(), (K, V)> {
        if let Some((_, slot)) = self.items.iter_mut().find(|(k, _)| *k == key) {
            *slot = value;
            return Ok(());
        }

        if self.is_full() {
            return Err((key, value));
        }

        self.items.push((key, value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_insert_and_find() {
        let mut bucket = Bucket::new(2, 0);
        assert!(bucket.insert(1, "a").is_ok());
        assert!(bucket.insert(2, "b").is_ok());

        assert_eq!(bucket.find(&1), Some(&"a"));
        assert_eq!(bucket.find(&2), Some(&"b"));
        assert_eq!(bucket.find(&3), None);
        assert!(bucket.is_full());
    }

    #[test]
    fn test_bucket_rejects_new_key_when_full() {
        let mut bucket = Bucket::new(1, 0);
        assert!(bucket.insert(1, 10).is_ok());
        assert_eq!(bucket.insert(2, 20), Err((2, 20)));
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn test_bucket_overwrites_when_full() {
        let mut bucket = Bucket::new(1, 0);
        assert!(bucket.insert(1, 10).is_ok());
        assert!(bucket.insert(1, 11).is_ok());
        assert_eq!(bucket.find(&1), Some(&11));
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn test_bucket_remove() {
        let mut bucket = Bucket::new(4, 0);
        bucket.insert(1, 10).unwrap();
        bucket.insert(2, 20).unwrap();

        assert!(bucket.remove(&1));
        assert!(!bucket.remove(&1));
        assert_eq!(bucket.find(&1), None);
        assert_eq!(bucket.find(&2), Some(&20));
    }

    #[test]
    fn test_bucket_take_items() {
        let mut bucket = Bucket::new(2, 3);
        bucket.insert(1, 10).unwrap();
        bucket.insert(2, 20).unwrap();

        let items = bucket.take_items();
        assert_eq!(items, vec![(1, 10), (2, 20)]);
        assert_eq!(bucket.len(), 0);
        assert_eq!(bucket.depth(), 3);
        assert_eq!(bucket.capacity(), 2);
    }
}
