//! Document store for tessera pages and templates.
//!
//! Items are stored once and indexed three ways: a flat insertion-ordered list,
//! buckets by directory, and any number of id aliases. Lifecycle hooks can veto
//! mutations or remap the storage key, and a usage index tracks which custom
//! elements each item references.

pub mod collection;
pub mod record;
pub mod usage;

pub use collection::{
    Collection, CollectionError, CollectionHooks, CollectionItem, Document, ItemKey, Outcome,
    SetDecision,
};
pub use record::{FilePath, FileRecord, ItemKind};
pub use usage::UsageIndex;
