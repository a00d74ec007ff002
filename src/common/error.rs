use thiserror::Error;

use super::types::{FrameId, PageId};

/// Database error types
#[derive(Error, Debug)]
pub enum OxbowError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame ID: {0}")]
    InvalidFrameId(FrameId),

    #[error("Frame {0} is tracked but not evictable")]
    FrameNotEvictable(FrameId),

    #[error("Buffer pool could not supply a page: all frames pinned")]
    OutOfMemory,

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Disk scheduler error: {0}")]
    Scheduler(String),

    #[error("Page image corrupted: {0}")]
    Corrupted(String),
}

pub type Result<T> = std::result::Result<T, OxbowError>;
