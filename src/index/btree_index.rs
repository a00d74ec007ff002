use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::{BufferPoolManager, ReadPageGuard, WritePageGuard};
use crate::common::{
    OxbowError, PageId, RecordId, Result, SlotId, HEADER_PAGE_ID, INVALID_PAGE_ID,
};
use crate::storage::page::HeaderPage;

use super::btree_page::{
    BTreePage, BTreePageRef, InternalPage, InternalPageRef, LeafPage, LeafPageRef,
};
use super::{IndexIterator, IndexKey, KeyComparator};

/// A disk-resident B+Tree index over the buffer pool.
///
/// Keys are unique, fixed-size, and ordered by the comparator; values are
/// record ids. All data lives in leaf pages chained left to right; internal
/// pages carry routing keys only. A tree-wide reader/writer latch guards the
/// root pointer: lookups and scans take it shared, mutations exclusive, so a
/// concurrent reader observes either the pre-state or the post-state of any
/// structural change.
///
/// The tree registers its root in the header page (page 0) under its index
/// name and re-adopts it when reopened over the same file.
pub struct BPlusTree<C: KeyComparator> {
    index_name: String,
    /// Tree-wide latch; the guarded value is the root page id itself
    root_page_id: RwLock<PageId>,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: u32,
    internal_max_size: u32,
}

impl<C: KeyComparator> BPlusTree<C> {
    /// Opens (or declares) the named index. An existing root recorded in the
    /// header page is adopted; otherwise the tree starts empty.
    pub fn new(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Result<Self> {
        assert!(leaf_max_size >= 2 && internal_max_size >= 3, "fanout too small");
        let index_name = index_name.into();

        let root = {
            let guard = Self::fetch_read_from(&bpm, HEADER_PAGE_ID)?;
            let header = crate::storage::page::HeaderPageRef::new(guard.data());
            header.get_root_id(&index_name).unwrap_or(INVALID_PAGE_ID)
        };

        Ok(Self {
            index_name,
            root_page_id: RwLock::new(root),
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self.root_page_id.read() == INVALID_PAGE_ID
    }

    pub fn get_root_page_id(&self) -> PageId {
        *self.root_page_id.read()
    }

    /// Point lookup.
    pub fn get_value(&self, key: &IndexKey) -> Result<Option<RecordId>> {
        let root_latch = self.root_page_id.read();
        if *root_latch == INVALID_PAGE_ID {
            return Ok(None);
        }

        let leaf_id = self.find_leaf(*root_latch, key)?;
        let guard = self.fetch_read(leaf_id)?;
        let leaf = LeafPageRef::new(guard.data());
        Ok(leaf.lookup(key, &self.comparator))
    }

    /// Inserts a unique key. Returns false when the key is already present.
    pub fn insert(&self, key: &IndexKey, value: RecordId) -> Result<bool> {
        let mut root_latch = self.root_page_id.write();

        if *root_latch == INVALID_PAGE_ID {
            self.start_new_tree(&mut root_latch, key, value)?;
            return Ok(true);
        }

        let leaf_id = self.find_leaf(*root_latch, key)?;

        // Duplicate probe through a read guard keeps the dirty flag honest
        {
            let guard = self.fetch_read(leaf_id)?;
            let leaf = LeafPageRef::new(guard.data());
            if leaf.lookup(key, &self.comparator).is_some() {
                return Ok(false);
            }
        }

        let mut leaf_guard = self.fetch_write(leaf_id)?;
        let parent_id;
        {
            let mut leaf = LeafPage::new(leaf_guard.data_mut());
            let new_size = leaf.insert(key, value, &self.comparator);
            if new_size <= self.leaf_max_size {
                return Ok(true);
            }
            parent_id = leaf.parent_page_id();
        }

        // Overflow: split off a right sibling and promote its first key
        let mut sibling_guard = self.new_page()?;
        let sibling_id = sibling_guard.page_id();
        let separator;
        {
            let mut leaf = LeafPage::new(leaf_guard.data_mut());
            let mut sibling = LeafPage::init(
                sibling_guard.data_mut(),
                sibling_id,
                parent_id,
                self.leaf_max_size,
            );
            leaf.move_half_to(&mut sibling);
            sibling.set_next_page_id(leaf.next_page_id());
            leaf.set_next_page_id(sibling_id);
            separator = sibling.key_at(0);
        }
        drop(sibling_guard);
        drop(leaf_guard);
        log::debug!(
            "{}: split leaf page {} into {}",
            self.index_name,
            leaf_id,
            sibling_id
        );

        self.insert_into_parent(&mut root_latch, leaf_id, parent_id, separator, sibling_id)?;
        Ok(true)
    }

    /// Removes a key; silently returns when it is absent.
    pub fn remove(&self, key: &IndexKey) -> Result<()> {
        let mut root_latch = self.root_page_id.write();
        if *root_latch == INVALID_PAGE_ID {
            return Ok(());
        }

        let leaf_id = self.find_leaf(*root_latch, key)?;

        {
            let guard = self.fetch_read(leaf_id)?;
            let leaf = LeafPageRef::new(guard.data());
            if leaf.lookup(key, &self.comparator).is_none() {
                return Ok(());
            }
        }

        let (size, min_size) = {
            let mut guard = self.fetch_write(leaf_id)?;
            let mut leaf = LeafPage::new(guard.data_mut());
            leaf.remove(key, &self.comparator);
            (leaf.size(), leaf.min_size())
        };

        if leaf_id == *root_latch {
            // The root leaf has no occupancy floor; an empty tree forgets it
            if size == 0 {
                *root_latch = INVALID_PAGE_ID;
                self.update_root_page_id(INVALID_PAGE_ID, false)?;
                self.discard_page(leaf_id)?;
                log::debug!("{}: tree emptied", self.index_name);
            }
            return Ok(());
        }

        if size >= min_size {
            return Ok(());
        }
        self.coalesce_or_redistribute_leaf(&mut root_latch, leaf_id)
    }

    /// Iterator positioned at the smallest key.
    pub fn begin(&self) -> Result<IndexIterator> {
        let root_latch = self.root_page_id.read();
        if *root_latch == INVALID_PAGE_ID {
            return Ok(self.end());
        }

        let mut current = *root_latch;
        loop {
            let guard = self.fetch_read(current)?;
            if BTreePageRef::new(guard.data()).is_leaf() {
                return Ok(IndexIterator::new(Arc::clone(&self.bpm), current, 0));
            }
            current = InternalPageRef::new(guard.data()).child_at(0);
        }
    }

    /// Iterator positioned at the first key >= `key`.
    pub fn begin_at(&self, key: &IndexKey) -> Result<IndexIterator> {
        let root_latch = self.root_page_id.read();
        if *root_latch == INVALID_PAGE_ID {
            return Ok(self.end());
        }

        let leaf_id = self.find_leaf(*root_latch, key)?;
        let (index, size, next) = {
            let guard = self.fetch_read(leaf_id)?;
            let leaf = LeafPageRef::new(guard.data());
            (
                leaf.key_index(key, &self.comparator),
                leaf.size() as usize,
                leaf.next_page_id(),
            )
        };

        // Everything in this leaf is smaller: start at the right neighbor
        if index >= size {
            if next == INVALID_PAGE_ID {
                return Ok(self.end());
            }
            return Ok(IndexIterator::new(Arc::clone(&self.bpm), next, 0));
        }
        Ok(IndexIterator::new(Arc::clone(&self.bpm), leaf_id, index))
    }

    /// The exhausted iterator.
    pub fn end(&self) -> IndexIterator {
        IndexIterator::new(Arc::clone(&self.bpm), INVALID_PAGE_ID, 0)
    }

    /// Bulk-loads whitespace-separated integer keys from a text file,
    /// deriving each record id from the key.
    pub fn insert_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = std::fs::read_to_string(path)?;
        for token in contents.split_whitespace() {
            if let Ok(n) = token.parse::<u64>() {
                self.insert(&IndexKey::from_u64(n), record_id_for_key(n))?;
            }
        }
        Ok(())
    }

    /// Removes whitespace-separated integer keys listed in a text file.
    pub fn remove_from_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = std::fs::read_to_string(path)?;
        for token in contents.split_whitespace() {
            if let Ok(n) = token.parse::<u64>() {
                self.remove(&IndexKey::from_u64(n))?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Descent
    // ------------------------------------------------------------------

    /// Walks from `start` down to the leaf whose range covers `key`.
    fn find_leaf(&self, start: PageId, key: &IndexKey) -> Result<PageId> {
        let mut current = start;
        loop {
            let guard = self.fetch_read(current)?;
            if BTreePageRef::new(guard.data()).is_leaf() {
                return Ok(current);
            }
            current = InternalPageRef::new(guard.data()).lookup(key, &self.comparator);
        }
    }

    // ------------------------------------------------------------------
    // Insert internals
    // ------------------------------------------------------------------

    fn start_new_tree(&self, root: &mut PageId, key: &IndexKey, value: RecordId) -> Result<()> {
        let mut guard = self.new_page()?;
        let page_id = guard.page_id();
        {
            let mut leaf = LeafPage::init(
                guard.data_mut(),
                page_id,
                INVALID_PAGE_ID,
                self.leaf_max_size,
            );
            leaf.insert(key, value, &self.comparator);
        }
        drop(guard);

        *root = page_id;
        self.update_root_page_id(page_id, true)?;
        log::debug!("{}: new root leaf page {}", self.index_name, page_id);
        Ok(())
    }

    /// Threads a freshly split-off `right_id` (separated from `left_id` by
    /// `key`) into the parent, growing a new root or splitting the parent
    /// recursively as needed.
    fn insert_into_parent(
        &self,
        root: &mut PageId,
        left_id: PageId,
        parent_id: PageId,
        key: IndexKey,
        right_id: PageId,
    ) -> Result<()> {
        if parent_id == INVALID_PAGE_ID {
            // The split node was the root: grow the tree by one level
            let mut root_guard = self.new_page()?;
            let new_root_id = root_guard.page_id();
            {
                let mut new_root = InternalPage::init(
                    root_guard.data_mut(),
                    new_root_id,
                    INVALID_PAGE_ID,
                    self.internal_max_size,
                );
                new_root.populate_new_root(left_id, &key, right_id);
            }
            drop(root_guard);

            self.reparent(left_id, new_root_id)?;
            self.reparent(right_id, new_root_id)?;
            *root = new_root_id;
            self.update_root_page_id(new_root_id, false)?;
            log::debug!("{}: new root page {}", self.index_name, new_root_id);
            return Ok(());
        }

        let mut parent_guard = self.fetch_write(parent_id)?;
        let grandparent_id;
        {
            let mut parent = InternalPage::new(parent_guard.data_mut());
            let new_size = parent.insert_node_after(left_id, &key, right_id);
            if new_size <= self.internal_max_size {
                return Ok(());
            }
            grandparent_id = parent.parent_page_id();
        }

        // Parent overflowed as well: split it and promote one level up
        let mut sibling_guard = self.new_page()?;
        let sibling_id = sibling_guard.page_id();
        let push_up;
        let moved_children: Vec<PageId>;
        {
            let mut parent = InternalPage::new(parent_guard.data_mut());
            let mut sibling = InternalPage::init(
                sibling_guard.data_mut(),
                sibling_id,
                grandparent_id,
                self.internal_max_size,
            );
            parent.move_half_to(&mut sibling);
            push_up = sibling.key_at(0);
            moved_children = (0..sibling.size() as usize)
                .map(|i| sibling.child_at(i))
                .collect();
        }
        drop(sibling_guard);
        drop(parent_guard);
        log::debug!(
            "{}: split internal page {} into {}",
            self.index_name,
            parent_id,
            sibling_id
        );

        for child in moved_children {
            self.reparent(child, sibling_id)?;
        }
        self.insert_into_parent(root, parent_id, grandparent_id, push_up, sibling_id)
    }

    // ------------------------------------------------------------------
    // Remove internals
    // ------------------------------------------------------------------

    /// Restores the occupancy floor of an underflowing leaf: borrow from the
    /// left sibling, else from the right, else merge (left preferred).
    fn coalesce_or_redistribute_leaf(&self, root: &mut PageId, leaf_id: PageId) -> Result<()> {
        let mut leaf_guard = self.fetch_write(leaf_id)?;
        let parent_id = BTreePageRef::new(leaf_guard.data()).parent_page_id();
        let mut parent_guard = self.fetch_write(parent_id)?;

        let (index, parent_size) = {
            let parent = InternalPageRef::new(parent_guard.data());
            let index = parent.value_index(leaf_id).ok_or_else(|| {
                OxbowError::Corrupted(format!("page {} missing from parent {}", leaf_id, parent_id))
            })?;
            (index, parent.size() as usize)
        };

        if index > 0 {
            let left_id = InternalPageRef::new(parent_guard.data()).child_at(index - 1);
            let mut left_guard = self.fetch_write(left_id)?;
            let can_borrow = {
                let left = LeafPageRef::new(left_guard.data());
                left.size() > left.min_size()
            };
            if can_borrow {
                let mut left = LeafPage::new(left_guard.data_mut());
                let mut leaf = LeafPage::new(leaf_guard.data_mut());
                left.move_last_to_front_of(&mut leaf);
                let mut parent = InternalPage::new(parent_guard.data_mut());
                parent.set_key_at(index, &leaf.key_at(0));
                return Ok(());
            }
        }

        if index + 1 < parent_size {
            let right_id = InternalPageRef::new(parent_guard.data()).child_at(index + 1);
            let mut right_guard = self.fetch_write(right_id)?;
            let can_borrow = {
                let right = LeafPageRef::new(right_guard.data());
                right.size() > right.min_size()
            };
            if can_borrow {
                let mut right = LeafPage::new(right_guard.data_mut());
                let mut leaf = LeafPage::new(leaf_guard.data_mut());
                right.move_first_to_end_of(&mut leaf);
                let mut parent = InternalPage::new(parent_guard.data_mut());
                parent.set_key_at(index + 1, &right.key_at(0));
                return Ok(());
            }
        }

        if index > 0 {
            // Merge this leaf into its left sibling
            let left_id = InternalPageRef::new(parent_guard.data()).child_at(index - 1);
            let mut left_guard = self.fetch_write(left_id)?;
            {
                let mut left = LeafPage::new(left_guard.data_mut());
                let mut leaf = LeafPage::new(leaf_guard.data_mut());
                leaf.move_all_to(&mut left);
                left.set_next_page_id(leaf.next_page_id());
            }
            {
                let mut parent = InternalPage::new(parent_guard.data_mut());
                parent.remove(index);
            }
            drop(left_guard);
            drop(leaf_guard);
            drop(parent_guard);
            log::debug!(
                "{}: merged leaf page {} into {}",
                self.index_name,
                leaf_id,
                left_id
            );

            self.discard_page(leaf_id)?;
            self.fix_after_separator_removal(root, parent_id)
        } else {
            // Leftmost child: absorb the right sibling instead
            let right_id = InternalPageRef::new(parent_guard.data()).child_at(index + 1);
            let mut right_guard = self.fetch_write(right_id)?;
            {
                let mut right = LeafPage::new(right_guard.data_mut());
                let mut leaf = LeafPage::new(leaf_guard.data_mut());
                right.move_all_to(&mut leaf);
                leaf.set_next_page_id(right.next_page_id());
            }
            {
                let mut parent = InternalPage::new(parent_guard.data_mut());
                parent.remove(index + 1);
            }
            drop(right_guard);
            drop(leaf_guard);
            drop(parent_guard);
            log::debug!(
                "{}: merged leaf page {} into {}",
                self.index_name,
                right_id,
                leaf_id
            );

            self.discard_page(right_id)?;
            self.fix_after_separator_removal(root, parent_id)
        }
    }

    /// Same repair for an underflowing internal node. Separators rotate
    /// through the parent, and every child that changes nodes is refetched
    /// and reparented.
    fn coalesce_or_redistribute_internal(&self, root: &mut PageId, node_id: PageId) -> Result<()> {
        let mut node_guard = self.fetch_write(node_id)?;
        let parent_id = BTreePageRef::new(node_guard.data()).parent_page_id();
        let mut parent_guard = self.fetch_write(parent_id)?;

        let (index, parent_size) = {
            let parent = InternalPageRef::new(parent_guard.data());
            let index = parent.value_index(node_id).ok_or_else(|| {
                OxbowError::Corrupted(format!("page {} missing from parent {}", node_id, parent_id))
            })?;
            (index, parent.size() as usize)
        };

        if index > 0 {
            let left_id = InternalPageRef::new(parent_guard.data()).child_at(index - 1);
            let mut left_guard = self.fetch_write(left_id)?;
            let can_borrow = {
                let left = InternalPageRef::new(left_guard.data());
                left.size() > left.min_size()
            };
            if can_borrow {
                let separator = InternalPageRef::new(parent_guard.data()).key_at(index);
                let moved_child;
                let moved_key;
                {
                    let mut left = InternalPage::new(left_guard.data_mut());
                    let mut node = InternalPage::new(node_guard.data_mut());
                    moved_key = left.key_at(left.size() as usize - 1);
                    moved_child = left.move_last_to_front_of(&mut node, &separator);
                }
                {
                    let mut parent = InternalPage::new(parent_guard.data_mut());
                    parent.set_key_at(index, &moved_key);
                }
                drop(left_guard);
                drop(node_guard);
                drop(parent_guard);
                return self.reparent(moved_child, node_id);
            }
        }

        if index + 1 < parent_size {
            let right_id = InternalPageRef::new(parent_guard.data()).child_at(index + 1);
            let mut right_guard = self.fetch_write(right_id)?;
            let can_borrow = {
                let right = InternalPageRef::new(right_guard.data());
                right.size() > right.min_size()
            };
            if can_borrow {
                let separator = InternalPageRef::new(parent_guard.data()).key_at(index + 1);
                let moved_child;
                let new_separator;
                {
                    let mut right = InternalPage::new(right_guard.data_mut());
                    let mut node = InternalPage::new(node_guard.data_mut());
                    new_separator = right.key_at(1);
                    moved_child = right.move_first_to_end_of(&mut node, &separator);
                }
                {
                    let mut parent = InternalPage::new(parent_guard.data_mut());
                    parent.set_key_at(index + 1, &new_separator);
                }
                drop(right_guard);
                drop(node_guard);
                drop(parent_guard);
                return self.reparent(moved_child, node_id);
            }
        }

        if index > 0 {
            // Merge this node into its left sibling
            let left_id = InternalPageRef::new(parent_guard.data()).child_at(index - 1);
            let mut left_guard = self.fetch_write(left_id)?;
            let separator = InternalPageRef::new(parent_guard.data()).key_at(index);
            let moved_children: Vec<PageId> = {
                let node = InternalPageRef::new(node_guard.data());
                (0..node.size() as usize).map(|i| node.child_at(i)).collect()
            };
            {
                let mut left = InternalPage::new(left_guard.data_mut());
                let mut node = InternalPage::new(node_guard.data_mut());
                node.move_all_to(&mut left, &separator);
            }
            {
                let mut parent = InternalPage::new(parent_guard.data_mut());
                parent.remove(index);
            }
            drop(left_guard);
            drop(node_guard);
            drop(parent_guard);
            log::debug!(
                "{}: merged internal page {} into {}",
                self.index_name,
                node_id,
                left_id
            );

            for child in moved_children {
                self.reparent(child, left_id)?;
            }
            self.discard_page(node_id)?;
            self.fix_after_separator_removal(root, parent_id)
        } else {
            // Leftmost child: absorb the right sibling
            let right_id = InternalPageRef::new(parent_guard.data()).child_at(index + 1);
            let mut right_guard = self.fetch_write(right_id)?;
            let separator = InternalPageRef::new(parent_guard.data()).key_at(index + 1);
            let moved_children: Vec<PageId> = {
                let right = InternalPageRef::new(right_guard.data());
                (0..right.size() as usize)
                    .map(|i| right.child_at(i))
                    .collect()
            };
            {
                let mut right = InternalPage::new(right_guard.data_mut());
                let mut node = InternalPage::new(node_guard.data_mut());
                right.move_all_to(&mut node, &separator);
            }
            {
                let mut parent = InternalPage::new(parent_guard.data_mut());
                parent.remove(index + 1);
            }
            drop(right_guard);
            drop(node_guard);
            drop(parent_guard);
            log::debug!(
                "{}: merged internal page {} into {}",
                self.index_name,
                right_id,
                node_id
            );

            for child in moved_children {
                self.reparent(child, node_id)?;
            }
            self.discard_page(right_id)?;
            self.fix_after_separator_removal(root, parent_id)
        }
    }

    /// An internal node has just lost a separator slot. Shrink the root when
    /// it is down to a single child, or recurse when a non-root node fell
    /// below its floor.
    fn fix_after_separator_removal(&self, root: &mut PageId, page_id: PageId) -> Result<()> {
        let (size, min, only_child) = {
            let guard = self.fetch_read(page_id)?;
            let page = InternalPageRef::new(guard.data());
            (page.size(), page.min_size(), page.child_at(0))
        };

        if page_id == *root {
            if size == 1 {
                self.reparent(only_child, INVALID_PAGE_ID)?;
                *root = only_child;
                self.update_root_page_id(only_child, false)?;
                self.discard_page(page_id)?;
                log::debug!("{}: root collapsed to page {}", self.index_name, only_child);
            }
            return Ok(());
        }

        if size < min {
            return self.coalesce_or_redistribute_internal(root, page_id);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    /// Rewrites a child's parent back-edge, unpinning it dirty.
    fn reparent(&self, child_id: PageId, parent_id: PageId) -> Result<()> {
        let mut guard = self.fetch_write(child_id)?;
        let mut page = BTreePage::new(guard.data_mut());
        page.set_parent_page_id(parent_id);
        Ok(())
    }

    /// Records the current root under this index's name in the header page.
    /// `insert_record` semantics on first creation, `update_record` after.
    fn update_root_page_id(&self, root: PageId, insert: bool) -> Result<()> {
        let mut guard = self.fetch_write(HEADER_PAGE_ID)?;
        let mut header = HeaderPage::new(guard.data_mut());
        if insert {
            // A tree that was emptied earlier left its record behind
            if !header.insert_record(&self.index_name, root) {
                header.update_record(&self.index_name, root);
            }
        } else {
            header.update_record(&self.index_name, root);
        }
        Ok(())
    }

    fn discard_page(&self, page_id: PageId) -> Result<()> {
        let deleted = self.bpm.delete_page(page_id)?;
        debug_assert!(deleted, "page {} still pinned at delete", page_id);
        Ok(())
    }

    fn new_page(&self) -> Result<WritePageGuard> {
        self.bpm.new_page()?.ok_or(OxbowError::OutOfMemory)
    }

    fn fetch_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        Self::fetch_read_from(&self.bpm, page_id)
    }

    fn fetch_read_from(bpm: &BufferPoolManager, page_id: PageId) -> Result<ReadPageGuard> {
        bpm.fetch_page_read(page_id)?.ok_or(OxbowError::OutOfMemory)
    }

    fn fetch_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        self.bpm
            .fetch_page_write(page_id)?
            .ok_or(OxbowError::OutOfMemory)
    }
}

/// Record id derived from an integer key, used by the file-driven loaders.
pub fn record_id_for_key(key: u64) -> RecordId {
    RecordId::new(PageId::new((key >> 16) as u32), SlotId::new(key as u16))
}
