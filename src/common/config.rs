use super::types::{FrameId, PageId};

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Conventional alias for [`PageId::INVALID`].
pub const INVALID_PAGE_ID: PageId = PageId::INVALID;

/// Conventional alias for [`FrameId::INVALID`].
pub const INVALID_FRAME_ID: FrameId = FrameId::INVALID;

/// The distinguished page holding (index name, root page id) records
pub const HEADER_PAGE_ID: PageId = PageId::new(0);

/// Default K value for LRU-K replacement policy
pub const DEFAULT_LRUK_K: usize = 2;

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 10;

/// Default number of entries per extendible hash bucket
pub const DEFAULT_BUCKET_SIZE: usize = 4;
