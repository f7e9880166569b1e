//! In-memory rule collections
//!
//! A collection opened by name joins a process-wide database so several
//! adapters see the same rows; `MemoryCollection::new` gives a private one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bson::Document;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use rulestore_common::error::{Result, StorageError};

use crate::filter;
use crate::index::UniqueIndex;
use crate::{DocumentStream, RuleCollection};

/// Shared in-memory databases, keyed by database then collection name
static DATABASES: Lazy<DashMap<String, DashMap<String, Arc<RwLock<CollectionData>>>>> =
    Lazy::new(DashMap::new);

/// Rows plus the optional unique index
#[derive(Default)]
struct CollectionData {
    docs: Vec<Document>,
    unique: Option<UniqueIndex>,
    keys: HashSet<Vec<u8>>,
}

impl CollectionData {
    fn insert(&mut self, doc: Document) -> Result<()> {
        if let Some(index) = &self.unique {
            let key = index.key(&doc);
            if !self.keys.insert(key) {
                return Err(index.duplicate(&doc));
            }
        }
        self.docs.push(doc);
        Ok(())
    }

    fn remove_at(&mut self, position: usize) {
        let doc = self.docs.remove(position);
        if let Some(index) = &self.unique {
            self.keys.remove(&index.key(&doc));
        }
    }
}

/// Process-local document collection
pub struct MemoryCollection {
    namespace: String,
    data: Arc<RwLock<CollectionData>>,
    closed: AtomicBool,
}

impl MemoryCollection {
    /// Create a private collection no other handle can see
    pub fn new(collection: &str) -> Self {
        Self {
            namespace: format!("memory.{}", collection),
            data: Arc::new(RwLock::new(CollectionData::default())),
            closed: AtomicBool::new(false),
        }
    }

    /// Open `collection` in the shared database `database`
    pub fn open(database: &str, collection: &str) -> Self {
        let data = DATABASES
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(CollectionData::default())))
            .clone();

        debug!("Opened shared memory collection {}.{}", database, collection);

        Self {
            namespace: format!("{}.{}", database, collection),
            data,
            closed: AtomicBool::new(false),
        }
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.data.read().docs.len()
    }

    /// True when the collection holds no documents
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::CollectionClosed(self.namespace.clone()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl RuleCollection for MemoryCollection {
    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_open()
    }

    async fn create_unique_index(&self, fields: &[&str]) -> Result<()> {
        self.ensure_open()?;
        let index = UniqueIndex::new(fields)?;

        let mut data = self.data.write();
        if data.unique.as_ref() == Some(&index) {
            return Ok(());
        }

        let mut keys = HashSet::with_capacity(data.docs.len());
        for doc in &data.docs {
            if !keys.insert(index.key(doc)) {
                return Err(index.duplicate(doc));
            }
        }

        debug!("Created unique index {} on {}", index.name(), self.namespace);
        data.keys = keys;
        data.unique = Some(index);
        Ok(())
    }

    async fn insert_one(&self, doc: Document) -> Result<()> {
        self.ensure_open()?;
        self.data.write().insert(doc)
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<u64> {
        self.ensure_open()?;
        let mut data = self.data.write();
        let mut inserted = 0u64;
        for doc in docs {
            data.insert(doc)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn delete_one(&self, selector: &Document) -> Result<u64> {
        self.ensure_open()?;
        filter::validate(selector)?;

        let mut data = self.data.write();
        let position = data.docs.iter().position(|doc| filter::matches(selector, doc));
        match position {
            Some(position) => {
                data.remove_at(position);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, selector: &Document) -> Result<u64> {
        self.ensure_open()?;
        filter::validate(selector)?;

        let mut data = self.data.write();
        let before = data.docs.len();
        let (removed, kept): (Vec<Document>, Vec<Document>) = std::mem::take(&mut data.docs)
            .into_iter()
            .partition(|doc| filter::matches(selector, doc));
        data.docs = kept;

        if let Some(index) = data.unique.clone() {
            for doc in &removed {
                data.keys.remove(&index.key(doc));
            }
        }

        debug!(
            "Deleted {} of {} documents from {}",
            removed.len(),
            before,
            self.namespace
        );
        Ok(removed.len() as u64)
    }

    async fn find(&self, selector: &Document) -> Result<DocumentStream> {
        self.ensure_open()?;
        filter::validate(selector)?;

        let matched: Vec<Document> = self
            .data
            .read()
            .docs
            .iter()
            .filter(|doc| filter::matches(selector, doc))
            .cloned()
            .collect();

        Ok(stream::iter(matched.into_iter().map(Ok)).boxed())
    }

    async fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        let mut data = self.data.write();
        data.docs.clear();
        data.keys.clear();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
