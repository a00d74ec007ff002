use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::common::{FrameId, PageId, PAGE_SIZE};

use super::page_guard::FrameData;

/// Which page a frame hosts and how it is held. All transitions happen under
/// the pool latch, so one small mutex-guarded record is the only
/// synchronization the metadata needs; the page bytes carry their own
/// reader/writer lock because page guards outlive pool operations.
struct FrameMeta {
    page_id: PageId,
    pin_count: u32,
    is_dirty: bool,
}

/// One slot of the buffer pool: a page-sized buffer plus the bookkeeping
/// that says which page is in it, how many handles hold it, and whether it
/// diverged from its disk image.
pub struct FrameHeader {
    frame_id: FrameId,
    meta: Mutex<FrameMeta>,
    data: FrameData,
}

impl FrameHeader {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            meta: Mutex::new(FrameMeta {
                page_id: PageId::INVALID,
                pin_count: 0,
                is_dirty: false,
            }),
            data: Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE]))),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        self.meta.lock().page_id
    }

    /// A free frame hosts no page.
    pub fn is_free(&self) -> bool {
        !self.meta.lock().page_id.is_valid()
    }

    pub fn pin_count(&self) -> u32 {
        self.meta.lock().pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.meta.lock().is_dirty
    }

    pub fn mark_clean(&self) {
        self.meta.lock().is_dirty = false;
    }

    /// Stamps the frame with a page that is becoming resident: identity set,
    /// one pin for the caller, clean. The frame must be free.
    pub fn assign(&self, page_id: PageId) {
        let mut meta = self.meta.lock();
        debug_assert!(!meta.page_id.is_valid(), "assigning over a resident page");
        debug_assert_eq!(meta.pin_count, 0, "assigning a pinned frame");
        meta.page_id = page_id;
        meta.pin_count = 1;
        meta.is_dirty = false;
    }

    /// Adds a pin for another handle to the resident page.
    pub fn pin(&self) -> u32 {
        let mut meta = self.meta.lock();
        meta.pin_count += 1;
        meta.pin_count
    }

    /// Releases one pin, folding the releaser's dirty verdict into the
    /// frame. Returns the remaining pin count, or None when there was no pin
    /// to release.
    pub fn unpin(&self, dirty: bool) -> Option<u32> {
        let mut meta = self.meta.lock();
        if meta.pin_count == 0 {
            return None;
        }
        meta.pin_count -= 1;
        meta.is_dirty |= dirty;
        Some(meta.pin_count)
    }

    /// Strips the frame of its page on eviction or deletion: identity
    /// forgotten, buffer zeroed. Only unpinned frames are cleared.
    pub fn clear(&self) {
        let mut meta = self.meta.lock();
        debug_assert_eq!(meta.pin_count, 0, "clearing a pinned frame");
        meta.page_id = PageId::INVALID;
        meta.is_dirty = false;
        drop(meta);
        self.data.write().fill(0);
    }

    /// Fills the buffer from a page image read off disk.
    pub fn load(&self, bytes: &[u8]) {
        assert_eq!(bytes.len(), PAGE_SIZE);
        self.data.write().copy_from_slice(bytes);
    }

    /// Copies the current page image out, e.g. for a write-back.
    pub fn snapshot(&self, out: &mut [u8]) {
        assert_eq!(out.len(), PAGE_SIZE);
        out.copy_from_slice(&**self.data.read());
    }

    /// The lockable page bytes a guard latches onto.
    pub(crate) fn buffer(&self) -> &FrameData {
        &self.data
    }
}
