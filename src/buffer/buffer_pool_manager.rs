use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{FrameId, PageId, Result, PAGE_SIZE};
use crate::container::ExtendibleHashTable;
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::page_guard::ReleasePin;
use super::{FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Pool state; guards hold it as their pin-release hook.
struct PoolInner {
    frames: Vec<FrameHeader>,
    /// Page table: page id -> frame id for every resident page
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// Frames not currently holding any page, FIFO
    free_list: Mutex<VecDeque<FrameId>>,
    replacer: LruKReplacer,
    /// Serializes every public pool operation; the page table and replacer
    /// keep their own latches and remain independently usable
    latch: Mutex<()>,
    disk_scheduler: DiskScheduler,
}

impl PoolInner {
    /// Decrements a page's pin count, honestly merging the dirty flag.
    /// False when the page is not resident or was not pinned.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let _guard = self.latch.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            return false;
        };
        // The frame folds the dirty verdict in, so an earlier writer's dirty
        // bit survives a clean unpin from a later reader
        match self.frames[frame_id.as_usize()].unpin(is_dirty) {
            None => false,
            Some(0) => {
                let _ = self.replacer.set_evictable(frame_id, true);
                true
            }
            Some(_) => true,
        }
    }
}

impl ReleasePin for PoolInner {
    fn release_pin(&self, page_id: PageId, is_dirty: bool) {
        self.unpin_page(page_id, is_dirty);
    }
}

/// BufferPoolManager owns a fixed array of frames and moves pages between
/// them and disk. Victims come from the free list first, then from the LRU-K
/// replacer; pages handed out are pinned through RAII guards and become
/// evictable again when the last guard drops.
pub struct BufferPoolManager {
    pool_size: usize,
    inner: Arc<PoolInner>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, replacer_k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(FrameHeader::new(frame_id));
            free_list.push_back(frame_id);
        }

        let inner = Arc::new(PoolInner {
            frames,
            page_table: ExtendibleHashTable::new(crate::common::DEFAULT_BUCKET_SIZE),
            free_list: Mutex::new(free_list),
            replacer: LruKReplacer::new(replacer_k, pool_size),
            latch: Mutex::new(()),
            disk_scheduler: DiskScheduler::new(disk_manager),
        });

        Self { pool_size, inner }
    }

    /// Allocates a brand-new page and returns it pinned for writing.
    /// `Ok(None)` when every frame is pinned.
    pub fn new_page(&self) -> Result<Option<WritePageGuard>> {
        let inner = &self.inner;
        let frame_id = {
            let _guard = inner.latch.lock();

            let Some(frame_id) = self.acquire_victim_frame()? else {
                return Ok(None);
            };
            let frame = &inner.frames[frame_id.as_usize()];

            let page_id = inner.disk_scheduler.disk_manager().allocate_page()?;
            frame.assign(page_id);

            inner.page_table.insert(page_id, frame_id);
            inner.replacer.record_access(frame_id)?;
            inner.replacer.set_evictable(frame_id, false)?;
            frame_id
        };

        Ok(Some(self.make_write_guard(frame_id)))
    }

    /// Fetches a page for shared access, pinned. `Ok(None)` when the page is
    /// not resident and every frame is pinned.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<Option<ReadPageGuard>> {
        let Some(frame_id) = self.fetch_page(page_id)? else {
            return Ok(None);
        };
        Ok(Some(self.make_read_guard(frame_id)))
    }

    /// Fetches a page for exclusive access, pinned. `Ok(None)` when the page
    /// is not resident and every frame is pinned.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<Option<WritePageGuard>> {
        let Some(frame_id) = self.fetch_page(page_id)? else {
            return Ok(None);
        };
        Ok(Some(self.make_write_guard(frame_id)))
    }

    /// Decrements a page's pin count. Guards do this automatically; a second
    /// unpin for the same pin returns false.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.inner.unpin_page(page_id, is_dirty)
    }

    /// Writes a resident page through to disk and clears its dirty bit,
    /// regardless of pin state. False when the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if self.pin_for_flush(page_id)?.is_none() {
            return Ok(false);
        }
        self.flush_pinned(page_id)
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        // Snapshot resident identities first; each flush pins its page, so a
        // page that vanishes in between is simply skipped
        let resident: Vec<PageId> = {
            let inner = &self.inner;
            let _guard = inner.latch.lock();
            inner
                .frames
                .iter()
                .map(|frame| frame.page_id())
                .filter(|page_id| page_id.is_valid())
                .collect()
        };

        for page_id in resident {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Pins a resident page so it cannot be evicted while its bytes are
    /// copied outside the pool latch.
    fn pin_for_flush(&self, page_id: PageId) -> Result<Option<FrameId>> {
        let inner = &self.inner;
        let _guard = inner.latch.lock();

        let Some(frame_id) = inner.page_table.find(&page_id) else {
            return Ok(None);
        };
        let frame = &inner.frames[frame_id.as_usize()];
        frame.pin();
        inner.replacer.set_evictable(frame_id, false)?;
        Ok(Some(frame_id))
    }

    /// Second half of a flush: copies the page image (waiting out any writer
    /// without holding the pool latch), writes it through, drops the pin.
    fn flush_pinned(&self, page_id: PageId) -> Result<bool> {
        let inner = &self.inner;
        let frame_id = {
            let _guard = inner.latch.lock();
            inner
                .page_table
                .find(&page_id)
                .expect("pinned page left the page table")
        };
        let frame = &inner.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        frame.snapshot(&mut data);
        let result = inner.disk_scheduler.schedule_write_sync(page_id, &data);
        if result.is_ok() {
            frame.mark_clean();
        }
        inner.unpin_page(page_id, false);
        result.map(|_| true)
    }

    /// Drops a page from the pool and deallocates it on disk.
    /// Returns true when the page is not resident, false when it is pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let inner = &self.inner;
        let _guard = inner.latch.lock();

        let Some(frame_id) = inner.page_table.find(&page_id) else {
            return Ok(true);
        };
        let frame = &inner.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.snapshot(&mut data);
            inner.disk_scheduler.schedule_write_sync(page_id, &data)?;
        }

        inner.page_table.remove(&page_id);
        inner.replacer.remove(frame_id)?;
        frame.clear();
        inner.free_list.lock().push_back(frame_id);
        inner
            .disk_scheduler
            .disk_manager()
            .deallocate_page(page_id)?;
        Ok(true)
    }

    /// Returns the pin count for a resident page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = &self.inner;
        let _guard = inner.latch.lock();
        inner
            .page_table
            .find(&page_id)
            .map(|frame_id| inner.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.inner.free_list.lock().len()
    }

    /// Resolves a page to a pinned frame, reading it from disk on a miss.
    /// `Ok(None)` when no victim frame is available.
    fn fetch_page(&self, page_id: PageId) -> Result<Option<FrameId>> {
        let inner = &self.inner;
        let _guard = inner.latch.lock();

        if let Some(frame_id) = inner.page_table.find(&page_id) {
            let frame = &inner.frames[frame_id.as_usize()];
            frame.pin();
            inner.replacer.record_access(frame_id)?;
            inner.replacer.set_evictable(frame_id, false)?;
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = self.acquire_victim_frame()? else {
            return Ok(None);
        };
        let frame = &inner.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        inner.disk_scheduler.schedule_read_sync(page_id, &mut data)?;
        frame.assign(page_id);
        frame.load(&data);

        inner.page_table.insert(page_id, frame_id);
        inner.replacer.record_access(frame_id)?;
        inner.replacer.set_evictable(frame_id, false)?;
        Ok(Some(frame_id))
    }

    /// Takes a frame from the free list, or evicts one (flushing it first if
    /// dirty). Caller must hold the pool latch.
    fn acquire_victim_frame(&self) -> Result<Option<FrameId>> {
        let inner = &self.inner;

        if let Some(frame_id) = inner.free_list.lock().pop_front() {
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = inner.replacer.evict() else {
            return Ok(None);
        };
        let frame = &inner.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();
        log::debug!("evicting page {} from frame {}", old_page_id, frame_id);

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.snapshot(&mut data);
            inner.disk_scheduler.schedule_write_sync(old_page_id, &data)?;
        }

        inner.page_table.remove(&old_page_id);
        frame.clear();
        Ok(Some(frame_id))
    }

    fn make_read_guard(&self, frame_id: FrameId) -> ReadPageGuard {
        let frame = &self.inner.frames[frame_id.as_usize()];
        let pool: Arc<dyn ReleasePin> = self.inner.clone() as Arc<dyn ReleasePin>;
        ReadPageGuard::acquire(frame.page_id(), frame.buffer(), pool)
    }

    fn make_write_guard(&self, frame_id: FrameId) -> WritePageGuard {
        let frame = &self.inner.frames[frame_id.as_usize()];
        let pool: Arc<dyn ReleasePin> = self.inner.clone() as Arc<dyn ReleasePin>;
        WritePageGuard::acquire(frame.page_id(), frame.buffer(), pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(pool_size, 2, dm);
        (bpm, temp_file)
    }

    #[test]
    fn test_new_pool_is_all_free() {
        let (bpm, _temp) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
    }

    #[test]
    fn test_new_page_is_pinned() {
        let (bpm, _temp) = create_bpm(10);

        let guard = bpm.new_page().unwrap().unwrap();
        let page_id = guard.page_id();
        assert_eq!(bpm.pin_count(page_id), Some(1));
        assert_eq!(bpm.free_frame_count(), 9);

        drop(guard);
        assert_eq!(bpm.pin_count(page_id), Some(0));
    }

    #[test]
    fn test_read_write_round_trip() {
        let (bpm, _temp) = create_bpm(10);

        let page_id = {
            let mut guard = bpm.new_page().unwrap().unwrap();
            guard.data_mut()[0] = 42;
            guard.data_mut()[100] = 255;
            guard.page_id()
        };

        let guard = bpm.fetch_page_read(page_id).unwrap().unwrap();
        assert_eq!(guard.data()[0], 42);
        assert_eq!(guard.data()[100], 255);
    }

    #[test]
    fn test_pool_exhaustion_returns_none() {
        let (bpm, _temp) = create_bpm(2);

        let _g1 = bpm.new_page().unwrap().unwrap();
        let _g2 = bpm.new_page().unwrap().unwrap();

        assert!(bpm.new_page().unwrap().is_none());
    }

    #[test]
    fn test_delete_pinned_page_refused() {
        let (bpm, _temp) = create_bpm(10);

        let guard = bpm.new_page().unwrap().unwrap();
        let page_id = guard.page_id();

        assert!(!bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.pin_count(page_id), Some(1));

        drop(guard);
        assert!(bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.pin_count(page_id), None);
        // Deleting a page that is not resident succeeds trivially
        assert!(bpm.delete_page(page_id).unwrap());
    }

    #[test]
    fn test_flush_persists_bytes() {
        let (bpm, temp) = create_bpm(10);

        let page_id = {
            let mut guard = bpm.new_page().unwrap().unwrap();
            guard.data_mut()[0] = 42;
            guard.page_id()
        };
        bpm.flush_page(page_id).unwrap();
        drop(bpm);

        let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
        let bpm2 = BufferPoolManager::new(10, 2, dm);
        let guard = bpm2.fetch_page_read(page_id).unwrap().unwrap();
        assert_eq!(guard.data()[0], 42);
    }

    #[test]
    fn test_unpin_twice_returns_false() {
        let (bpm, _temp) = create_bpm(10);

        let page_id = bpm.new_page().unwrap().unwrap().page_id();
        // The guard already unpinned once on drop
        assert!(!bpm.unpin_page(page_id, false));
    }
}
