use std::cmp::Ordering;

/// Total order over raw key bytes. Implementations must be consistent for
/// the lifetime of an index; the tree stores keys in comparator order.
pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Compares keys as little-endian u64 integers.
#[derive(Clone, Copy, Default)]
pub struct IntegerComparator;

impl KeyComparator for IntegerComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let a_val = u64::from_le_bytes(a.try_into().expect("key width"));
        let b_val = u64::from_le_bytes(b.try_into().expect("key width"));
        a_val.cmp(&b_val)
    }
}

/// Compares keys lexicographically by raw bytes.
#[derive(Clone, Copy, Default)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}
