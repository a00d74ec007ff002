use crate::common::{PageId, PAGE_SIZE};

const RECORD_COUNT_OFFSET: usize = 0;
const RECORDS_OFFSET: usize = 4;

const NAME_SIZE: usize = 32;
const RECORD_SIZE: usize = NAME_SIZE + 4;

/// Maximum number of (name, root page id) records page 0 can hold.
pub const MAX_HEADER_RECORDS: usize = (PAGE_SIZE - RECORDS_OFFSET) / RECORD_SIZE;

/// Mutable view over the header page: a record count followed by fixed-width
/// `(index name, root page id)` records. Index roots are looked up here on
/// startup, which is what lets an index survive a restart.
///
/// Names longer than 32 bytes are truncated; a zeroed page is a valid empty
/// header.
pub struct HeaderPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HeaderPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self) {
        self.data.fill(0);
    }

    pub fn record_count(&self) -> usize {
        read_u32(self.data, RECORD_COUNT_OFFSET) as usize
    }

    fn set_record_count(&mut self, count: usize) {
        write_u32(self.data, RECORD_COUNT_OFFSET, count as u32);
    }

    /// Appends a new record. False when the name is already present or the
    /// page is full.
    pub fn insert_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        if find_record(self.data, name).is_some() {
            return false;
        }
        let count = self.record_count();
        if count >= MAX_HEADER_RECORDS {
            return false;
        }

        let offset = RECORDS_OFFSET + count * RECORD_SIZE;
        write_name(self.data, offset, name);
        write_u32(self.data, offset + NAME_SIZE, root_page_id.as_u32());
        self.set_record_count(count + 1);
        true
    }

    /// Rewrites the root page id of an existing record. False when absent.
    pub fn update_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        match find_record(self.data, name) {
            Some(offset) => {
                write_u32(self.data, offset + NAME_SIZE, root_page_id.as_u32());
                true
            }
            None => false,
        }
    }

    /// Removes a record, compacting the tail. False when absent.
    pub fn delete_record(&mut self, name: &str) -> bool {
        let Some(offset) = find_record(self.data, name) else {
            return false;
        };
        let count = self.record_count();
        let tail_start = offset + RECORD_SIZE;
        let tail_end = RECORDS_OFFSET + count * RECORD_SIZE;
        self.data.copy_within(tail_start..tail_end, offset);
        self.set_record_count(count - 1);
        true
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        find_record(self.data, name)
            .map(|offset| PageId::new(read_u32(self.data, offset + NAME_SIZE)))
    }
}

/// Read-only view with the same layout.
pub struct HeaderPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HeaderPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn record_count(&self) -> usize {
        read_u32(self.data, RECORD_COUNT_OFFSET) as usize
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        find_record(self.data, name)
            .map(|offset| PageId::new(read_u32(self.data, offset + NAME_SIZE)))
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_name(data: &mut [u8], offset: usize, name: &str) {
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_SIZE);
    data[offset..offset + len].copy_from_slice(&bytes[..len]);
    data[offset + len..offset + NAME_SIZE].fill(0);
}

fn name_matches(stored: &[u8], name: &str) -> bool {
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_SIZE);
    stored[..len] == bytes[..len] && stored[len..].iter().all(|&b| b == 0)
}

fn find_record(data: &[u8], name: &str) -> Option<usize> {
    let count = read_u32(data, RECORD_COUNT_OFFSET) as usize;
    (0..count)
        .map(|i| RECORDS_OFFSET + i * RECORD_SIZE)
        .find(|&offset| name_matches(&data[offset..offset + NAME_SIZE], name))
}
