//! Integration tests for the LRU-K replacer

use oxbow::buffer::LruKReplacer;
use oxbow::common::FrameId;

#[test]
fn test_eviction_order_mixed_histories() {
    let replacer = LruKReplacer::new(2, 10);

    // Accesses: 1, 2, 3, 1, 2. Frame 3 never reaches k accesses.
    replacer.record_access(FrameId::new(1)).unwrap();
    replacer.record_access(FrameId::new(2)).unwrap();
    replacer.record_access(FrameId::new(3)).unwrap();
    replacer.record_access(FrameId::new(1)).unwrap();
    replacer.record_access(FrameId::new(2)).unwrap();

    for i in 1..=3 {
        replacer.set_evictable(FrameId::new(i), true).unwrap();
    }
    assert_eq!(replacer.size(), 3);

    // Frame 3 has infinite backward k-distance and goes first; frames 1 and
    // 2 follow by their oldest remembered access.
    assert_eq!(replacer.evict(), Some(FrameId::new(3)));
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_all_partial_histories_evict_fifo() {
    let replacer = LruKReplacer::new(2, 10);

    for i in 0..5 {
        replacer.record_access(FrameId::new(i)).unwrap();
        replacer.set_evictable(FrameId::new(i), true).unwrap();
    }

    // Every frame has fewer than k accesses, so the earliest first access
    // loses each round
    for i in 0..5 {
        assert_eq!(replacer.evict(), Some(FrameId::new(i)));
    }
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_pinned_frames_are_skipped() {
    let replacer = LruKReplacer::new(2, 10);

    for i in 0..3 {
        replacer.record_access(FrameId::new(i)).unwrap();
    }
    replacer.set_evictable(FrameId::new(1), true).unwrap();
    replacer.set_evictable(FrameId::new(2), true).unwrap();

    assert_eq!(replacer.size(), 2);
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    // Frame 0 was never evictable
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_toggle_evictable_includes_and_excludes() {
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(0)).unwrap();
    replacer.set_evictable(FrameId::new(0), true).unwrap();
    assert_eq!(replacer.size(), 1);

    replacer.set_evictable(FrameId::new(0), false).unwrap();
    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.evict(), None);

    replacer.set_evictable(FrameId::new(0), true).unwrap();
    assert_eq!(replacer.size(), 1);
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
}

#[test]
fn test_size_counts_only_evictable() {
    let replacer = LruKReplacer::new(3, 16);

    for i in 0..8 {
        replacer.record_access(FrameId::new(i)).unwrap();
    }
    for i in 0..4 {
        replacer.set_evictable(FrameId::new(i), true).unwrap();
    }
    assert_eq!(replacer.size(), 4);

    replacer.remove(FrameId::new(0)).unwrap();
    assert_eq!(replacer.size(), 3);
}

#[test]
fn test_concurrent_access() {
    use std::sync::Arc;
    use std::thread;

    let replacer = Arc::new(LruKReplacer::new(2, 100));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let replacer = Arc::clone(&replacer);
            thread::spawn(move || {
                for i in 0..25 {
                    let frame_id = FrameId::new((t * 25 + i) as u32);
                    replacer.record_access(frame_id).unwrap();
                    replacer.set_evictable(frame_id, true).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(replacer.size(), 100);
    for _ in 0..100 {
        assert!(replacer.evict().is_some());
    }
    assert_eq!(replacer.size(), 0);
}
