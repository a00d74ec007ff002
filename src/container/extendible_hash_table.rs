use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;

/// A bucket holding up to `bucket_size` unordered entries.
#[derive(Debug)]
struct Bucket<K, V> {
    local_depth: usize,
    items: Vec<(K, V)>,
}

impl<K: Eq, V> Bucket<K, V> {
    fn new(local_depth: usize) -> Self {
        Self {
            local_depth,
            items: Vec::new(),
        }
    }

    fn find(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove(&mut self, key: &K) -> bool {
        if let Some(pos) = self.items.iter().position(|(k, _)| k == key) {
            self.items.swap_remove(pos);
            true
        } else {
            false
        }
    }

    /// Overwrites an existing key or appends; false when the bucket is full
    /// and the key is absent.
    fn insert(&mut self, key: K, value: V, bucket_size: usize) -> bool {
        if let Some((_, v)) = self.items.iter_mut().find(|(k, _)| *k == key) {
            *v = value;
            return true;
        }
        if self.items.len() >= bucket_size {
            return false;
        }
        self.items.push((key, value));
        true
    }
}

struct TableState<K, V> {
    global_depth: usize,
    /// Directory of slab indices into `buckets`; `dir.len() == 1 << global_depth`.
    /// Slots agreeing on the low `local_depth` bits alias the same bucket.
    dir: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

/// Directory-based extendible hash table.
///
/// Serves as the buffer pool's page table (page id -> frame id) and is usable
/// as a general closed-addressing map. A single table-wide mutex guards all
/// state; buckets double the directory or split on demand.
pub struct ExtendibleHashTable<K, V> {
    bucket_size: usize,
    state: Mutex<TableState<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(bucket_size: usize) -> Self {
        assert!(bucket_size > 0, "bucket size must be positive");
        Self {
            bucket_size,
            state: Mutex::new(TableState {
                global_depth: 0,
                dir: vec![0],
                buckets: vec![Bucket::new(0)],
            }),
        }
    }

    fn hash(key: &K) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn dir_index(global_depth: usize, key: &K) -> usize {
        let mask = (1usize << global_depth) - 1;
        (Self::hash(key) as usize) & mask
    }

    pub fn find(&self, key: &K) -> Option<V> {
        let state = self.state.lock();
        let slot = Self::dir_index(state.global_depth, key);
        state.buckets[state.dir[slot]].find(key).cloned()
    }

    pub fn remove(&self, key: &K) -> bool {
        let mut state = self.state.lock();
        let slot = Self::dir_index(state.global_depth, key);
        let bucket = state.dir[slot];
        state.buckets[bucket].remove(key)
    }

    /// Inserts or overwrites. Grows the directory or splits the owning bucket
    /// until it has room; terminates because directory capacity grows on
    /// double and local depth grows on split.
    pub fn insert(&self, key: K, value: V) {
        let mut state = self.state.lock();
        loop {
            let slot = Self::dir_index(state.global_depth, &key);
            let bucket_idx = state.dir[slot];
            if state.buckets[bucket_idx].insert(key.clone(), value.clone(), self.bucket_size) {
                return;
            }

            if state.buckets[bucket_idx].local_depth == state.global_depth {
                // Double the directory; each new slot aliases its low-half twin
                state.global_depth += 1;
                let old_size = state.dir.len();
                for i in 0..old_size {
                    let target = state.dir[i];
                    state.dir.push(target);
                }
            } else {
                Self::split_bucket(&mut state, bucket_idx);
            }
        }
    }

    /// Splits `bucket_idx` into itself and an image bucket one bit deeper.
    /// Entries whose hash has bit `depth - 1` set move to the image, as do
    /// the directory slots selecting that bit.
    fn split_bucket(state: &mut TableState<K, V>, bucket_idx: usize) {
        state.buckets[bucket_idx].local_depth += 1;
        let depth = state.buckets[bucket_idx].local_depth;
        let image_idx = state.buckets.len();
        state.buckets.push(Bucket::new(depth));

        let high_bit = 1usize << (depth - 1);
        let items = std::mem::take(&mut state.buckets[bucket_idx].items);
        let (stay, moved): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|(k, _)| (Self::hash(k) as usize) & high_bit == 0);
        state.buckets[bucket_idx].items = stay;
        state.buckets[image_idx].items = moved;

        // Repoint every aliasing slot whose discriminating bit selects the image
        let low_mask = high_bit - 1;
        let discriminant = {
            // Any slot currently pointing at the split bucket shares these low bits
            let slot = state
                .dir
                .iter()
                .position(|&b| b == bucket_idx)
                .expect("split bucket not referenced by directory");
            slot & low_mask
        };
        for slot in 0..state.dir.len() {
            if slot & low_mask == discriminant && slot & high_bit != 0 {
                state.dir[slot] = image_idx;
            }
        }
    }

    /// Current global depth of the directory.
    pub fn global_depth(&self) -> usize {
        self.state.lock().global_depth
    }

    /// Local depth of the bucket referenced by the given directory slot.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        let state = self.state.lock();
        state.buckets[state.dir[dir_index]].local_depth
    }

    /// Number of distinct buckets.
    pub fn num_buckets(&self) -> usize {
        self.state.lock().buckets.len()
    }

    /// Number of directory slots (`2^global_depth`).
    pub fn dir_size(&self) -> usize {
        self.state.lock().dir.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_find_remove() {
        let table: ExtendibleHashTable<u32, String> = ExtendibleHashTable::new(2);

        table.insert(1, "one".to_string());
        table.insert(2, "two".to_string());

        assert_eq!(table.find(&1), Some("one".to_string()));
        assert_eq!(table.find(&2), Some("two".to_string()));
        assert_eq!(table.find(&3), None);

        assert!(table.remove(&1));
        assert!(!table.remove(&1));
        assert_eq!(table.find(&1), None);
    }

    #[test]
    fn test_insert_overwrites_existing_key() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(2);

        table.insert(7, 1);
        table.insert(7, 2);
        assert_eq!(table.find(&7), Some(2));
    }

    #[test]
    fn test_split_preserves_entries() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(2);

        for i in 0..64 {
            table.insert(i, i * 10);
        }
        for i in 0..64 {
            assert_eq!(table.find(&i), Some(i * 10), "lost key {}", i);
        }
    }

    #[test]
    fn test_directory_invariants() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(2);

        for i in 0..128 {
            table.insert(i, i);
            assert_eq!(table.dir_size(), 1 << table.global_depth());
            for slot in 0..table.dir_size() {
                assert!(table.local_depth(slot) <= table.global_depth());
            }
        }
    }

    #[test]
    fn test_bucket_growth_is_bounded() {
        let table: ExtendibleHashTable<u32, u32> = ExtendibleHashTable::new(2);

        let n = 100;
        for i in 0..n {
            table.insert(i, i);
        }
        // One split creates one bucket, and each insert forces at most a
        // bounded number of splits overall
        assert!(table.num_buckets() <= 1 + n as usize);
    }
}
