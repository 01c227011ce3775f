//! Extendible hash table used as the buffer pool's page table.
//!
//! The directory is a power-of-two array of slots, each pointing at a bucket
//! in an arena. Slots that share the low `local_depth` bits of their index
//! point at the same bucket. A full bucket splits in two on insert, and the
//! directory doubles first when the bucket is already as deep as the
//! directory. Buckets are never merged and the directory never shrinks.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use log::debug;
use parking_lot::Mutex;

use crate::common::{BufCoreError, Result, DEFAULT_BUCKET_SIZE};

use super::bucket::Bucket;

/// Returns the low `depth` bits of `hash`.
fn low_bits(hash: u64, depth: u32) -> u64 {
    match 1u64.checked_shl(depth) {
        Some(bit) => hash & (bit - 1),
        None => hash,
    }
}

/// Directory and bucket arena, guarded together by the table latch
struct Directory<K, V> {
    global_depth: u32,
    /// Slot index -> position of the bucket in `buckets`
    slots: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

impl<K: Eq, V> Directory<K, V> {
    fn new(bucket_size: usize) -> Self {
        Self {
            global_depth: 0,
            slots: vec![0],
            buckets: vec![Bucket::new(bucket_size, 0)],
        }
    }

    fn slot_of(&self, hash: u64) -> usize {
        low_bits(hash, self.global_depth) as usize
    }

    fn bucket_for(&self, hash: u64) -> &Bucket<K, V> {
        &self.buckets[self.slots[self.slot_of(hash)]]
    }

    fn bucket_for_mut(&mut self, hash: u64) -> &mut Bucket<K, V> {
        let slot = self.slot_of(hash);
        &mut self.buckets[self.slots[slot]]
    }

    /// Doubles the directory. Slot `i + old_size` aliases slot `i`.
    fn double(&mut self) {
        let old_size = self.slots.len();
        self.slots.extend_from_within(..);
        self.global_depth += 1;
        debug!(
            "hash directory doubled: {} -> {} slots (global depth {})",
            old_size,
            self.slots.len(),
            self.global_depth
        );
    }

    /// Splits the bucket referenced by `slot` into two buckets one bit deeper.
    ///
    /// The bucket keeps every slot and entry whose bit `local_depth - 1` is
    /// clear; the new sibling receives those where it is set. The same bit
    /// test is applied to slot indices and entry hashes.
    fn split<F>(&mut self, slot: usize, hash_of: F)
    where
        F: Fn(&K) -> u64,
    {
        let target = self.slots[slot];
        if self.buckets[target].depth() == self.global_depth {
            self.double();
        }

        let bucket = &mut self.buckets[target];
        bucket.increment_depth();
        let depth = bucket.depth();
        let capacity = bucket.capacity();
        let split_bit = 1u64 << (depth - 1);

        let (stay, moved): (Vec<_>, Vec<_>) = bucket
            .take_items()
            .into_iter()
            .partition(|(key, _)| hash_of(key) & split_bit == 0);
        let moved_count = moved.len();
        *bucket = Bucket::with_items(capacity, depth, stay);

        let sibling = self.buckets.len();
        self.buckets.push(Bucket::with_items(capacity, depth, moved));

        for (index, entry) in self.slots.iter_mut().enumerate() {
            if *entry == target && (index as u64) & split_bit != 0 {
                *entry = sibling;
            }
        }

        debug!(
            "split bucket {} at local depth {}: {} entries moved to bucket {}",
            target, depth, moved_count, sibling
        );
    }
}

/// A thread-safe extendible hash table.
///
/// All operations take a single table-wide latch. `find` returns a clone of
/// the stored value, so `V` is typically a small handle such as a frame id.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    /// Maximum number of entries per bucket
    bucket_size: usize,
    hash_builder: S,
    inner: Mutex<Directory<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V, RandomState>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Creates an empty table whose buckets hold `bucket_size` entries each.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_size` is zero.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq,
    V: Clone,
    S: BuildHasher,
{
    /// Creates an empty table that hashes keys with `hash_builder`.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_size` is zero.
    pub fn with_hasher(bucket_size: usize, hash_builder: S) -> Self {
        assert!(bucket_size > 0, "bucket size must be at least 1");
        Self {
            bucket_size,
            hash_builder,
            inner: Mutex::new(Directory::new(bucket_size)),
        }
    }

    fn hash_of(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    /// Returns the directory slot `key` currently maps to.
    ///
    /// The result is only meaningful until the next insert, which may
    /// double the directory.
    pub fn index_of(&self, key: &K) -> usize {
        let dir = self.inner.lock();
        dir.slot_of(self.hash_of(key))
    }

    /// Looks up the value stored for `key`.
    pub fn find(&self, key: &K) -> Option<V> {
        let hash = self.hash_of(key);
        let dir = self.inner.lock();
        dir.bucket_for(hash).find(key).cloned()
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        let hash = self.hash_of(key);
        let dir = self.inner.lock();
        dir.bucket_for(hash).find(key).is_some()
    }

    /// Inserts `value` for `key`, overwriting any previous value.
    ///
    /// A full target bucket is split (doubling the directory when needed)
    /// until the entry fits. Keys whose hashes agree on every bit can never
    /// be separated, so more than `bucket_size` of them will not terminate.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash_of(&key);
        let mut dir = self.inner.lock();
        let mut entry = (key, value);

        loop {
            match dir.bucket_for_mut(hash).insert(entry.0, entry.1) {
                Ok(()) => return,
                Err(rejected) => {
                    entry = rejected;
                    let slot = dir.slot_of(hash);
                    dir.split(slot, |k| self.hash_builder.hash_one(k));
                }
            }
        }
    }

    /// Removes `key`, returning true if it was present.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash_of(key);
        let mut dir = self.inner.lock();
        dir.bucket_for_mut(hash).remove(key)
    }

    /// Number of low hash bits used to index the directory.
    pub fn global_depth(&self) -> u32 {
        self.inner.lock().global_depth
    }

    /// Local depth of the bucket referenced by directory slot `dir_index`.
    pub fn local_depth(&self, dir_index: usize) -> Result<u32> {
        let dir = self.inner.lock();
        match dir.slots.get(dir_index) {
            Some(&bucket) => Ok(dir.buckets[bucket].depth()),
            None => Err(BufCoreError::InvalidDirectoryIndex {
                index: dir_index,
                size: dir.slots.len(),
            }),
        }
    }

    /// Number of distinct buckets.
    pub fn num_buckets(&self) -> usize {
        self.inner.lock().buckets.len()
    }

    /// Number of directory slots, always `2^global_depth`.
    pub fn directory_size(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Maximum number of entries a bucket holds before it splits.
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Total number of entries in the table.
    pub fn len(&self) -> usize {
        self.inner.lock().buckets.iter().map(Bucket::len).sum()
    }

    /// Returns true if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks the directory invariants, reporting the first violation found.
    ///
    /// For every bucket: its local depth does not exceed the global depth,
    /// exactly `2^(global - local)` slots reference it, all of them share
    /// the same low `local` bits, it holds no more than `bucket_size`
    /// entries, and every entry hashes to that shared prefix.
    pub fn verify_integrity(&self) -> Result<()> {
        let dir = self.inner.lock();
        let corrupted = |msg: String| Err(BufCoreError::IndexCorrupted(msg));

        if dir.slots.len() != 1usize << dir.global_depth {
            return corrupted(format!(
                "directory has {} slots at global depth {}",
                dir.slots.len(),
                dir.global_depth
            ));
        }

        let mut referenced: Vec<Vec<usize>> = vec![Vec::new(); dir.buckets.len()];
        for (index, &bucket) in dir.slots.iter().enumerate() {
            match referenced.get_mut(bucket) {
                Some(slots) => slots.push(index),
                None => return corrupted(format!("slot {} points at missing bucket {}", index, bucket)),
            }
        }

        for (id, (bucket, slots)) in dir.buckets.iter().zip(&referenced).enumerate() {
            let depth = bucket.depth();
            if depth > dir.global_depth {
                return corrupted(format!(
                    "bucket {} local depth {} exceeds global depth {}",
                    id, depth, dir.global_depth
                ));
            }

            let expected = 1usize << (dir.global_depth - depth);
            if slots.len() != expected {
                return corrupted(format!(
                    "bucket {} referenced by {} slots, expected {}",
                    id,
                    slots.len(),
                    expected
                ));
            }

            let prefix = low_bits(slots[0] as u64, depth);
            if let Some(slot) = slots
                .iter()
                .find(|&&slot| low_bits(slot as u64, depth) != prefix)
            {
                return corrupted(format!(
                    "slot {} does not share bucket {} prefix {:#b}",
                    slot, id, prefix
                ));
            }

            if bucket.len() > self.bucket_size {
                return corrupted(format!(
                    "bucket {} holds {} entries, capacity {}",
                    id,
                    bucket.len(),
                    self.bucket_size
                ));
            }

            if bucket
                .items()
                .iter()
                .any(|(key, _)| low_bits(self.hash_of(key), depth) != prefix)
            {
                return corrupted(format!("bucket {} holds a key outside its prefix", id));
            }
        }

        Ok(())
    }
}

impl<K, V> Default for ExtendibleHashTable<K, V, RandomState>
where
    K: Hash + Eq,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_SIZE)
    }
}
