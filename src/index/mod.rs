pub mod btree_index;
pub mod btree_iterator;
pub mod btree_page;
pub mod key;
pub mod key_comparator;

pub use btree_index::{record_id_for_key, BPlusTree};
pub use btree_iterator::IndexIterator;
pub use btree_page::{
    BTreePage, BTreePageRef, BTreePageType, InternalPage, InternalPageRef, LeafPage, LeafPageRef,
    DEFAULT_INTERNAL_MAX_SIZE, DEFAULT_LEAF_MAX_SIZE,
};
pub use key::{IndexKey, KEY_SIZE};
pub use key_comparator::{BytewiseComparator, IntegerComparator, KeyComparator};
