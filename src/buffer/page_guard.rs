use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};

use crate::common::{PageId, PAGE_SIZE};

/// A frame's page bytes behind a shared reader/writer lock. Guards lock
/// through the `Arc` itself, so a guard owns everything it needs and never
/// borrows the frame it came from.
pub(crate) type FrameData = Arc<RwLock<Box<[u8; PAGE_SIZE]>>>;

type SharedRead = ArcRwLockReadGuard<RawRwLock, Box<[u8; PAGE_SIZE]>>;
type SharedWrite = ArcRwLockWriteGuard<RawRwLock, Box<[u8; PAGE_SIZE]>>;

/// What a guard owes its pool: one pin release, with an honest dirty
/// verdict, when the guard goes away.
pub(crate) trait ReleasePin: Send + Sync {
    fn release_pin(&self, page_id: PageId, is_dirty: bool);
}

/// Shared access to a pinned page.
///
/// The pool pins the page before the guard exists; dropping the guard hands
/// the pin back. Readers never dirty a page, so the release always reports
/// clean.
pub struct ReadPageGuard {
    page_id: PageId,
    /// Held until drop; surrendered before the pool is notified
    data: Option<SharedRead>,
    pool: Arc<dyn ReleasePin>,
}

impl ReadPageGuard {
    pub(crate) fn acquire(page_id: PageId, data: &FrameData, pool: Arc<dyn ReleasePin>) -> Self {
        Self {
            page_id,
            data: Some(data.read_arc()),
            pool,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().unwrap()[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Surrender the page lock before release_pin takes the pool latch: a
        // flush already holding that latch may be waiting on this very page
        self.data.take();
        self.pool.release_pin(self.page_id, false);
    }
}

/// Exclusive access to a pinned page.
///
/// The guard tracks whether the bytes were ever borrowed mutably and reports
/// that verdict to the pool on drop, so a page only becomes dirty when
/// someone could actually have written it.
pub struct WritePageGuard {
    page_id: PageId,
    dirtied: bool,
    /// Held until drop; surrendered before the pool is notified
    data: Option<SharedWrite>,
    pool: Arc<dyn ReleasePin>,
}

impl WritePageGuard {
    pub(crate) fn acquire(page_id: PageId, data: &FrameData, pool: Arc<dyn ReleasePin>) -> Self {
        Self {
            page_id,
            dirtied: false,
            data: Some(data.write_arc()),
            pool,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().unwrap()[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirtied = true;
        &mut self.data.as_mut().unwrap()[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.data.take();
        self.pool.release_pin(self.page_id, self.dirtied);
    }
}
