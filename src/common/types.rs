use std::fmt;

/// Identity of one 4 KiB block in the database file. Handed out by the disk
/// manager and never reused for the lifetime of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(u32);

impl PageId {
    /// The "no page here" sentinel. Serialized it is all-ones, which doubles
    /// as the on-disk encoding of an absent link in page headers.
    pub const INVALID: PageId = PageId(u32::MAX);

    pub const fn new(id: u32) -> Self {
        PageId(id)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a slot in the buffer pool's frame array. Frame ids are dense in
/// `[0, pool_size)` and never refer to disk state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u32);

impl FrameId {
    pub const INVALID: FrameId = FrameId(u32::MAX);

    pub const fn new(id: u32) -> Self {
        FrameId(id)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a tuple within its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u16);

impl SlotId {
    pub const fn new(id: u16) -> Self {
        SlotId(id)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a tuple lives: page plus slot. This is the value payload index
/// leaves store, so it owns its fixed-width on-page encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl RecordId {
    /// Width of the on-page encoding: page id then slot id, little endian.
    pub const ENCODED_LEN: usize = 6;

    pub const fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }

    /// Writes the 6-byte encoding into `buf`.
    pub fn write_to(self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.page_id.as_u32().to_le_bytes());
        buf[4..Self::ENCODED_LEN].copy_from_slice(&self.slot_id.as_u16().to_le_bytes());
    }

    /// Reads a record id back from its 6-byte encoding.
    pub fn read_from(buf: &[u8]) -> Self {
        Self::new(
            PageId::new(u32::from_le_bytes(buf[..4].try_into().unwrap())),
            SlotId::new(u16::from_le_bytes(buf[4..Self::ENCODED_LEN].try_into().unwrap())),
        )
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot_id)
    }
}

/// Timestamp type for LRU-K tracking
pub type Timestamp = u64;
