//! Oxbow - the storage and indexing core of a disk-oriented RDBMS
//!
//! The crate provides the two load-bearing pieces underneath a relational
//! database: a buffer pool that caches fixed-size pages between memory and
//! disk, and a disk-resident B+Tree index that performs all of its I/O
//! through that pool.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): page-granular disk I/O
//!   - `DiskManager`: reads, writes and allocates pages in the database file
//!   - `DiskScheduler`: background worker thread funneling I/O requests
//!   - `HeaderPage`: the page-0 registry of index roots
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: pins pages into fixed frames and evicts under
//!     pressure
//!   - `LruKReplacer`: LRU-K eviction policy
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pin handles
//!
//! - **Containers** (`container`): `ExtendibleHashTable`, the pool's
//!   page-table structure, exposed generically
//!
//! - **Index** (`index`): `BPlusTree` ordered index with point lookup,
//!   range iteration, insert-with-split and delete-with-rebalance
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use oxbow::buffer::BufferPoolManager;
//! use oxbow::index::{BPlusTree, IndexKey, IntegerComparator, record_id_for_key};
//! use oxbow::storage::disk::DiskManager;
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
//!
//! let tree = BPlusTree::new("demo_index", bpm, IntegerComparator, 64, 64).unwrap();
//! tree.insert(&IndexKey::from_u64(42), record_id_for_key(42)).unwrap();
//! assert!(tree.get_value(&IndexKey::from_u64(42)).unwrap().is_some());
//! ```

pub mod buffer;
pub mod common;
pub mod container;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{OxbowError, PageId, RecordId, Result, SlotId};
