//! Integration tests for the B+Tree index: search, insert, iteration,
//! persistence through the header page

use std::sync::Arc;

use oxbow::buffer::BufferPoolManager;
use oxbow::index::{record_id_for_key, BPlusTree, IndexKey, IntegerComparator};
use oxbow::storage::disk::DiskManager;

use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(pool_size, 2, disk_manager));
    (bpm, temp_file)
}

fn key(n: u64) -> IndexKey {
    IndexKey::from_u64(n)
}

#[test]
fn test_empty_tree() {
    let (bpm, _temp) = create_bpm(10);
    let tree = BPlusTree::new("empty", bpm, IntegerComparator, 4, 4).unwrap();

    assert!(tree.is_empty());
    assert_eq!(tree.get_value(&key(1)).unwrap(), None);
    assert!(tree.begin().unwrap().is_end());
}

#[test]
fn test_insert_and_point_lookup() {
    let (bpm, _temp) = create_bpm(20);
    let tree = BPlusTree::new("lookup", bpm, IntegerComparator, 4, 4).unwrap();

    for n in [10u64, 20, 30] {
        assert!(tree.insert(&key(n), record_id_for_key(n)).unwrap());
    }
    assert!(!tree.is_empty());

    for n in [10u64, 20, 30] {
        assert_eq!(
            tree.get_value(&key(n)).unwrap(),
            Some(record_id_for_key(n))
        );
    }
    assert_eq!(tree.get_value(&key(40)).unwrap(), None);
}

#[test]
fn test_duplicate_insert_returns_false() {
    let (bpm, _temp) = create_bpm(10);
    let tree = BPlusTree::new("dup", bpm, IntegerComparator, 4, 4).unwrap();

    assert!(tree.insert(&key(7), record_id_for_key(7)).unwrap());
    assert!(!tree.insert(&key(7), record_id_for_key(8)).unwrap());
    assert_eq!(tree.get_value(&key(7)).unwrap(), Some(record_id_for_key(7)));
}

#[test]
fn test_ascending_inserts_split_correctly() {
    let (bpm, _temp) = create_bpm(50);
    let tree = BPlusTree::new("asc", bpm, IntegerComparator, 4, 4).unwrap();

    for n in 0..500u64 {
        assert!(tree.insert(&key(n), record_id_for_key(n)).unwrap());
    }
    for n in 0..500u64 {
        assert_eq!(
            tree.get_value(&key(n)).unwrap(),
            Some(record_id_for_key(n)),
            "key {} lost after splits",
            n
        );
    }
}

#[test]
fn test_descending_inserts_split_correctly() {
    let (bpm, _temp) = create_bpm(50);
    let tree = BPlusTree::new("desc", bpm, IntegerComparator, 4, 4).unwrap();

    for n in (0..200u64).rev() {
        assert!(tree.insert(&key(n), record_id_for_key(n)).unwrap());
    }
    for n in 0..200u64 {
        assert_eq!(
            tree.get_value(&key(n)).unwrap(),
            Some(record_id_for_key(n))
        );
    }
}

#[test]
fn test_random_inserts() {
    use rand::seq::SliceRandom;
    use rand::thread_rng;

    let (bpm, _temp) = create_bpm(100);
    let tree = BPlusTree::new("rand", bpm, IntegerComparator, 4, 4).unwrap();

    let mut keys: Vec<u64> = (0..1000).collect();
    keys.shuffle(&mut thread_rng());

    for &n in &keys {
        assert!(tree.insert(&key(n), record_id_for_key(n)).unwrap());
    }
    for &n in &keys {
        assert_eq!(
            tree.get_value(&key(n)).unwrap(),
            Some(record_id_for_key(n)),
            "key {} lost",
            n
        );
    }
}

#[test]
fn test_iterator_visits_keys_in_order() {
    let (bpm, _temp) = create_bpm(50);
    let tree = BPlusTree::new("iter", bpm, IntegerComparator, 4, 4).unwrap();

    for n in 1..=16u64 {
        tree.insert(&key(n), record_id_for_key(n)).unwrap();
    }

    let mut iter = tree.begin().unwrap();
    let mut seen = Vec::new();
    while !iter.is_end() {
        let (k, v) = iter.entry().unwrap();
        assert_eq!(v, record_id_for_key(k.to_u64()));
        seen.push(k.to_u64());
        iter.advance().unwrap();
    }
    assert_eq!(iter, tree.end());

    let expected: Vec<u64> = (1..=16).collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_iterator_from_key() {
    let (bpm, _temp) = create_bpm(50);
    let tree = BPlusTree::new("iter_from", bpm, IntegerComparator, 4, 4).unwrap();

    for n in (0..50u64).map(|i| i * 2) {
        tree.insert(&key(n), record_id_for_key(n)).unwrap();
    }

    // Positioned on an existing key
    let mut iter = tree.begin_at(&key(20)).unwrap();
    assert_eq!(iter.key().unwrap().to_u64(), 20);

    // Positioned between keys lands on the next larger one
    iter = tree.begin_at(&key(21)).unwrap();
    assert_eq!(iter.key().unwrap().to_u64(), 22);

    // Past the largest key equals end
    iter = tree.begin_at(&key(1000)).unwrap();
    assert!(iter.is_end());
}

#[test]
fn test_root_survives_reopen_through_header_page() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    {
        let disk_manager = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(20, 2, disk_manager));
        let tree = BPlusTree::new("persistent", bpm.clone(), IntegerComparator, 4, 4).unwrap();

        for n in 0..100u64 {
            tree.insert(&key(n), record_id_for_key(n)).unwrap();
        }
        bpm.flush_all_pages().unwrap();
    }

    {
        let disk_manager = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(20, 2, disk_manager));
        // Same name: the root comes back from the header page
        let tree = BPlusTree::new("persistent", bpm, IntegerComparator, 4, 4).unwrap();

        assert!(!tree.is_empty());
        for n in 0..100u64 {
            assert_eq!(
                tree.get_value(&key(n)).unwrap(),
                Some(record_id_for_key(n)),
                "key {} lost across reopen",
                n
            );
        }
    }
}

#[test]
fn test_two_indexes_share_header_page() {
    let (bpm, _temp) = create_bpm(30);

    let orders = BPlusTree::new("orders", bpm.clone(), IntegerComparator, 4, 4).unwrap();
    let users = BPlusTree::new("users", bpm, IntegerComparator, 4, 4).unwrap();

    for n in 0..50u64 {
        orders.insert(&key(n), record_id_for_key(n)).unwrap();
        users.insert(&key(n * 10), record_id_for_key(n * 10)).unwrap();
    }

    assert_ne!(orders.get_root_page_id(), users.get_root_page_id());
    assert_eq!(
        orders.get_value(&key(49)).unwrap(),
        Some(record_id_for_key(49))
    );
    assert_eq!(
        users.get_value(&key(490)).unwrap(),
        Some(record_id_for_key(490))
    );
    assert_eq!(users.get_value(&key(49)).unwrap(), None);
}

#[test]
fn test_insert_and_remove_from_file() {
    use std::io::Write;

    let (bpm, _temp) = create_bpm(30);
    let tree = BPlusTree::new("from_file", bpm, IntegerComparator, 4, 4).unwrap();

    let mut input = NamedTempFile::new().unwrap();
    writeln!(input, "5 3 9\n1 7").unwrap();
    input.flush().unwrap();

    tree.insert_from_file(input.path()).unwrap();
    for n in [1u64, 3, 5, 7, 9] {
        assert_eq!(
            tree.get_value(&key(n)).unwrap(),
            Some(record_id_for_key(n))
        );
    }

    let mut removals = NamedTempFile::new().unwrap();
    writeln!(removals, "3 7").unwrap();
    removals.flush().unwrap();

    tree.remove_from_file(removals.path()).unwrap();
    assert_eq!(tree.get_value(&key(3)).unwrap(), None);
    assert_eq!(tree.get_value(&key(7)).unwrap(), None);
    assert_eq!(tree.get_value(&key(5)).unwrap(), Some(record_id_for_key(5)));
}

#[test]
fn test_concurrent_readers_and_writer() {
    use std::thread;

    let (bpm, _temp) = create_bpm(100);
    let tree = Arc::new(BPlusTree::new("concurrent", bpm, IntegerComparator, 8, 8).unwrap());

    // Seed half the key space up front
    for n in 0..200u64 {
        tree.insert(&key(n), record_id_for_key(n)).unwrap();
    }

    let writer = {
        let tree = Arc::clone(&tree);
        thread::spawn(move || {
            for n in 200..400u64 {
                tree.insert(&key(n), record_id_for_key(n)).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                for _ in 0..20 {
                    for n in 0..200u64 {
                        // Seeded keys are always visible
                        assert_eq!(
                            tree.get_value(&key(n)).unwrap(),
                            Some(record_id_for_key(n))
                        );
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for handle in readers {
        handle.join().unwrap();
    }

    for n in 0..400u64 {
        assert_eq!(tree.get_value(&key(n)).unwrap(), Some(record_id_for_key(n)));
    }
}
