mod config;
mod error;
mod types;

pub use config::*;
pub use error::{OxbowError, Result};
pub use types::{FrameId, PageId, RecordId, SlotId, Timestamp};
