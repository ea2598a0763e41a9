//! Generic document collection.

use std::collections::{BTreeMap, HashMap};

use crate::record::{FileRecord, FilePath, ItemKind};
use crate::usage::UsageIndex;

/// A document payload that can be parsed from a file record.
pub trait Document: Sized {
    /// Collection-wide parse settings.
    type Options: Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Parse the record's content into the payload.
    fn parse(record: &FileRecord, options: &Self::Options) -> Result<Self, Self::Error>;

    /// Custom element names referenced by the document.
    fn uses(&self) -> Vec<String>;
}

/// A stored document.
#[derive(Debug, Clone)]
pub struct CollectionItem<T> {
    pub path: FilePath,
    pub content: String,
    pub kind: ItemKind,
    pub result: T,
}

/// Stable handle to a stored item. Survives updates, invalidated by delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(usize);

/// Verdict of a pre-set or pre-update hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetDecision {
    /// Drop the mutation silently
    Skip,

    /// Store the item, optionally under a primary key other than its path
    Store { key: Option<String> },
}

/// Hooks consulted before a collection mutates.
pub trait CollectionHooks<T>: Send + Sync {
    fn before_set(&self, _item: &CollectionItem<T>) -> SetDecision {
        SetDecision::Store { key: None }
    }

    fn before_update(&self, _current: &CollectionItem<T>, next: &CollectionItem<T>) -> SetDecision {
        self.before_set(next)
    }
}

struct DefaultHooks;

impl<T> CollectionHooks<T> for DefaultHooks {}

/// Result of a successful mutation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Inserted(ItemKey),
    Updated(ItemKey),
    Skipped,
}

impl Outcome {
    pub fn key(self) -> Option<ItemKey> {
        match self {
            Outcome::Inserted(key) | Outcome::Updated(key) => Some(key),
            Outcome::Skipped => None,
        }
    }
}

/// Errors that can occur when mutating a collection.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Duplicate key {key:?}: {path} conflicts with {existing}")]
    DuplicateKey {
        key: String,
        path: String,
        existing: String,
    },
}

struct Entry<T> {
    item: CollectionItem<T>,
    aliases: Vec<String>,
}

/// Indexed store of documents of one kind.
pub struct Collection<T: Document> {
    kind: ItemKind,
    options: T::Options,
    entries: Vec<Option<Entry<T>>>,
    /// Slots emptied by delete, reused by the next insert
    free: Vec<usize>,
    list: Vec<ItemKey>,
    by_id: HashMap<String, ItemKey>,
    by_directory: BTreeMap<String, Vec<ItemKey>>,
    usage: UsageIndex,
    hooks: Box<dyn CollectionHooks<T>>,
}

impl<T: Document> Collection<T> {
    pub fn new(kind: ItemKind, options: T::Options) -> Self {
        Self::with_hooks(kind, options, Box::new(DefaultHooks))
    }

    pub fn with_hooks(
        kind: ItemKind,
        options: T::Options,
        hooks: Box<dyn CollectionHooks<T>>,
    ) -> Self {
        Self {
            kind,
            options,
            entries: Vec::new(),
            free: Vec::new(),
            list: Vec::new(),
            by_id: HashMap::new(),
            by_directory: BTreeMap::new(),
            usage: UsageIndex::new(),
            hooks,
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn options(&self) -> &T::Options {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Parse and insert a record. An existing path is updated instead.
    pub fn set(&mut self, record: FileRecord) -> Result<Outcome, CollectionError> {
        if self.key_for_path(&record.path.pathname).is_some() {
            return self.update(record);
        }

        let item = self.parse(record)?;
        let key_override = match self.hooks.before_set(&item) {
            SetDecision::Skip => {
                tracing::debug!("set of {} vetoed", item.path.pathname);
                return Ok(Outcome::Skipped);
            }
            SetDecision::Store { key } => key,
        };

        let aliases = aliases_for(&item.path, key_override);
        self.check_aliases(&aliases, None, &item.path.pathname)?;

        let key = ItemKey(self.free.pop().unwrap_or(self.entries.len()));
        for alias in &aliases {
            self.by_id.insert(alias.clone(), key);
        }
        self.by_directory
            .entry(item.path.dirname.clone())
            .or_default()
            .push(key);
        self.list.push(key);
        self.usage
            .replace_uses(&item.path.pathname, &item.result.uses());

        tracing::debug!("set {}", item.path.pathname);
        let entry = Some(Entry { item, aliases });
        match self.entries.get_mut(key.0) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }

        Ok(Outcome::Inserted(key))
    }

    /// Re-parse an existing record and patch the stored item in place.
    /// Unknown paths are inserted.
    pub fn update(&mut self, record: FileRecord) -> Result<Outcome, CollectionError> {
        let Some(key) = self.key_for_path(&record.path.pathname) else {
            return self.set(record);
        };

        let next = self.parse(record)?;
        let Some(current) = self.item(key) else {
            return Ok(Outcome::Skipped);
        };

        let key_override = match self.hooks.before_update(current, &next) {
            SetDecision::Skip => {
                tracing::debug!("update of {} vetoed", next.path.pathname);
                return Ok(Outcome::Skipped);
            }
            SetDecision::Store { key } => key,
        };

        let aliases = aliases_for(&next.path, key_override);
        self.check_aliases(&aliases, Some(key), &next.path.pathname)?;

        self.usage
            .replace_uses(&next.path.pathname, &next.result.uses());

        let Some(entry) = self.entries[key.0].as_mut() else {
            return Ok(Outcome::Skipped);
        };
        let stale = std::mem::replace(&mut entry.aliases, aliases.clone());
        entry.item.content = next.content;
        entry.item.result = next.result;
        entry.item.kind = next.kind;

        for alias in stale {
            if self.by_id.get(&alias) == Some(&key) {
                self.by_id.remove(&alias);
            }
        }
        for alias in aliases {
            self.by_id.insert(alias, key);
        }

        tracing::debug!("updated {}", next.path.pathname);
        Ok(Outcome::Updated(key))
    }

    /// Remove an item by path or any id alias, returning it.
    pub fn delete(&mut self, id: &str) -> Option<CollectionItem<T>> {
        let key = *self.by_id.get(id)?;
        let entry = self.entries.get_mut(key.0)?.take()?;
        self.free.push(key.0);

        for alias in &entry.aliases {
            if self.by_id.get(alias) == Some(&key) {
                self.by_id.remove(alias);
            }
        }

        let dirname = &entry.item.path.dirname;
        if let Some(bucket) = self.by_directory.get_mut(dirname) {
            bucket.retain(|&k| k != key);
            if bucket.is_empty() {
                self.by_directory.remove(dirname);
            }
        }

        self.list.retain(|&k| k != key);
        self.usage.forget_user(&entry.item.path.pathname);

        tracing::debug!("deleted {}", entry.item.path.pathname);
        Some(entry.item)
    }

    /// Look up an item by path or id alias.
    pub fn get(&self, id: &str) -> Option<&CollectionItem<T>> {
        self.item(self.key(id)?)
    }

    /// Resolve a path or id alias to the item's handle.
    pub fn key(&self, id: &str) -> Option<ItemKey> {
        self.by_id.get(id).copied()
    }

    pub fn item(&self, key: ItemKey) -> Option<&CollectionItem<T>> {
        self.entries
            .get(key.0)
            .and_then(|e| e.as_ref())
            .map(|e| &e.item)
    }

    /// Items stored directly in `dirname`, in insertion order.
    pub fn get_by_directory(&self, dirname: &str) -> Vec<&CollectionItem<T>> {
        self.by_directory
            .get(dirname)
            .map(|keys| keys.iter().filter_map(|&k| self.item(k)).collect())
            .unwrap_or_default()
    }

    /// Directories that currently hold at least one item.
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.by_directory.keys().map(String::as_str)
    }

    /// All items in insertion order.
    pub fn items(&self) -> impl Iterator<Item = &CollectionItem<T>> {
        self.list.iter().filter_map(|&k| self.item(k))
    }

    /// Every id alias of an item, primary key first.
    pub fn aliases(&self, key: ItemKey) -> &[String] {
        self.entries
            .get(key.0)
            .and_then(|e| e.as_ref())
            .map(|e| e.aliases.as_slice())
            .unwrap_or_default()
    }

    /// Primary keys of all items in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.list
            .iter()
            .filter_map(|&k| self.aliases(k).first().cloned())
            .collect()
    }

    pub fn usage(&self) -> &UsageIndex {
        &self.usage
    }

    fn key_for_path(&self, pathname: &str) -> Option<ItemKey> {
        let key = self.key(pathname)?;
        let item = self.item(key)?;
        (item.path.pathname == pathname).then_some(key)
    }

    fn parse(&self, record: FileRecord) -> Result<CollectionItem<T>, CollectionError> {
        let result = T::parse(&record, &self.options).map_err(|e| CollectionError::Parse {
            path: record.path.pathname.clone(),
            source: Box::new(e),
        })?;

        Ok(CollectionItem {
            path: record.path,
            content: record.content,
            kind: self.kind,
            result,
        })
    }

    fn check_aliases(
        &self,
        aliases: &[String],
        owner: Option<ItemKey>,
        pathname: &str,
    ) -> Result<(), CollectionError> {
        for alias in aliases {
            if let Some(&existing) = self.by_id.get(alias) {
                if Some(existing) != owner {
                    let existing = self
                        .item(existing)
                        .map(|i| i.path.pathname.clone())
                        .unwrap_or_default();
                    return Err(CollectionError::DuplicateKey {
                        key: alias.clone(),
                        path: pathname.to_string(),
                        existing,
                    });
                }
            }
        }
        Ok(())
    }
}

fn aliases_for(path: &FilePath, primary: Option<String>) -> Vec<String> {
    match primary {
        Some(key) if key != path.pathname => vec![key, path.pathname.clone()],
        _ => vec![path.pathname.clone()],
    }
}
