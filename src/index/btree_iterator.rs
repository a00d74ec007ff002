use std::fmt;
use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{OxbowError, PageId, RecordId, Result};

use super::btree_page::LeafPageRef;
use super::IndexKey;

/// Forward iterator over the leaf chain of a B+Tree.
///
/// The iterator remembers a position `(leaf page id, slot)` and pins the
/// current leaf only for the duration of each call, so it never holds more
/// than one page at a time. Walking past the rightmost leaf leaves the
/// iterator equal to [`BPlusTree::end`](super::BPlusTree::end).
pub struct IndexIterator {
    bpm: Arc<BufferPoolManager>,
    page_id: PageId,
    index: usize,
}

impl IndexIterator {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page_id: PageId, index: usize) -> Self {
        Self {
            bpm,
            page_id,
            index,
        }
    }

    pub fn is_end(&self) -> bool {
        !self.page_id.is_valid()
    }

    pub fn key(&self) -> Result<IndexKey> {
        Ok(self.entry()?.0)
    }

    pub fn value(&self) -> Result<RecordId> {
        Ok(self.entry()?.1)
    }

    /// The `(key, value)` pair at the current position.
    pub fn entry(&self) -> Result<(IndexKey, RecordId)> {
        assert!(!self.is_end(), "iterator dereferenced at end");
        let guard = self
            .bpm
            .fetch_page_read(self.page_id)?
            .ok_or(OxbowError::OutOfMemory)?;
        let leaf = LeafPageRef::new(guard.data());
        Ok((leaf.key_at(self.index), leaf.value_at(self.index)))
    }

    /// Steps to the next entry, rolling over to the next leaf in the chain
    /// when this one is exhausted.
    pub fn advance(&mut self) -> Result<()> {
        assert!(!self.is_end(), "iterator advanced past end");
        let guard = self
            .bpm
            .fetch_page_read(self.page_id)?
            .ok_or(OxbowError::OutOfMemory)?;
        let leaf = LeafPageRef::new(guard.data());

        self.index += 1;
        if self.index >= leaf.size() as usize {
            self.page_id = leaf.next_page_id();
            self.index = 0;
        }
        Ok(())
    }
}

impl fmt::Debug for IndexIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexIterator")
            .field("page_id", &self.page_id)
            .field("index", &self.index)
            .finish()
    }
}

impl PartialEq for IndexIterator {
    fn eq(&self, other: &Self) -> bool {
        self.page_id == other.page_id && self.index == other.index
    }
}

impl Eq for IndexIterator {}
