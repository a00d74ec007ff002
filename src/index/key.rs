use std::fmt;

/// Serialized width of an index key in bytes.
pub const KEY_SIZE: usize = 8;

/// An opaque fixed-size key payload. The tree never interprets the bytes;
/// ordering comes entirely from the [`KeyComparator`](super::KeyComparator)
/// the tree was built with.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IndexKey([u8; KEY_SIZE]);

impl IndexKey {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = [0u8; KEY_SIZE];
        buf.copy_from_slice(bytes);
        Self(buf)
    }

    /// Builds a key from an integer, little-endian.
    pub fn from_u64(value: u64) -> Self {
        Self(value.to_le_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_u64(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }
}

impl fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexKey({})", self.to_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u64_round_trip() {
        let key = IndexKey::from_u64(0xDEAD_BEEF);
        assert_eq!(key.to_u64(), 0xDEAD_BEEF);
        assert_eq!(IndexKey::from_bytes(key.as_bytes()), key);
    }
}
