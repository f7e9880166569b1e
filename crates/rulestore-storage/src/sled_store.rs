//! Sled-backed durable rule collections
//!
//! Layout per namespace `db.coll`:
//! - `db.coll`: document id (big-endian u64) -> BSON bytes
//! - `db.coll.$index`: unique index key -> document id
//! - `db.coll.$meta`: index definition
//!
//! Ids come from `Db::generate_id`, so tree order is insertion order.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bson::Document;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use sled::{Db, Tree};
use tracing::{debug, info};

use rulestore_common::error::{Result, StorageError};

use crate::filter;
use crate::index::UniqueIndex;
use crate::{DocumentStream, RuleCollection};

const UNIQUE_INDEX_KEY: &[u8] = b"unique_index";

/// Durable document collection stored in a sled database
pub struct SledCollection {
    db: Db,
    namespace: String,
    docs: Tree,
    index: Tree,
    meta: Tree,
    unique: RwLock<Option<UniqueIndex>>,
    closed: AtomicBool,
}

impl SledCollection {
    /// Open (or create) the sled database at `path` and the named collection
    pub fn open(path: &Path, database: &str, collection: &str) -> Result<Self> {
        info!("Opening sled rule store at {:?}", path);
        let db = sled::open(path)?;
        Self::with_db(db, database, collection)
    }

    /// Use an already opened sled database
    pub fn with_db(db: Db, database: &str, collection: &str) -> Result<Self> {
        let namespace = format!("{}.{}", database, collection);
        let docs = db.open_tree(namespace.as_bytes())?;
        let index = db.open_tree(format!("{}.$index", namespace).as_bytes())?;
        let meta = db.open_tree(format!("{}.$meta", namespace).as_bytes())?;

        let unique = match meta.get(UNIQUE_INDEX_KEY)? {
            Some(raw) => Some(serde_json::from_slice::<UniqueIndex>(&raw)?),
            None => None,
        };

        debug!(
            "Opened sled collection {} ({} documents)",
            namespace,
            docs.len()
        );

        Ok(Self {
            db,
            namespace,
            docs,
            index,
            meta,
            unique: RwLock::new(unique),
            closed: AtomicBool::new(false),
        })
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// True when the collection holds no documents
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::CollectionClosed(self.namespace.clone()).into());
        }
        Ok(())
    }

    fn encode(doc: &Document) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        doc.to_writer(&mut buf)?;
        Ok(buf)
    }

    fn decode(raw: &[u8]) -> Result<Document> {
        Ok(Document::from_reader(raw)?)
    }

    fn insert_doc(&self, doc: &Document) -> Result<()> {
        let id = self.db.generate_id()?.to_be_bytes();
        let value = Self::encode(doc)?;

        if let Some(unique) = self.unique.read().as_ref() {
            let key = unique.key(doc);
            if self
                .index
                .compare_and_swap(key, None::<&[u8]>, Some(&id[..]))?
                .is_err()
            {
                return Err(unique.duplicate(doc));
            }
        }

        self.docs.insert(id, value)?;
        Ok(())
    }

    fn remove_doc(&self, id: &[u8], doc: &Document) -> Result<bool> {
        let removed = self.docs.remove(id)?.is_some();
        if removed {
            if let Some(unique) = self.unique.read().as_ref() {
                self.index.remove(unique.key(doc))?;
            }
        }
        Ok(removed)
    }

    /// Matching documents with their ids, in insertion order
    fn scan(&self, selector: &Document) -> Result<Vec<(sled::IVec, Document)>> {
        let mut matched = Vec::new();
        for entry in self.docs.iter() {
            let (id, raw) = entry?;
            let doc = Self::decode(&raw)?;
            if filter::matches(selector, &doc) {
                matched.push((id, doc));
            }
        }
        Ok(matched)
    }
}

#[async_trait]
impl RuleCollection for SledCollection {
    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_open()?;
        self.db.size_on_disk()?;
        Ok(())
    }

    async fn create_unique_index(&self, fields: &[&str]) -> Result<()> {
        self.ensure_open()?;
        let unique = UniqueIndex::new(fields)?;

        let mut current = self.unique.write();
        if current.as_ref() == Some(&unique) {
            return Ok(());
        }

        self.index.clear()?;
        for entry in self.docs.iter() {
            let (id, raw) = entry?;
            let doc = Self::decode(&raw)?;
            if self
                .index
                .compare_and_swap(unique.key(&doc), None::<&[u8]>, Some(id))?
                .is_err()
            {
                self.index.clear()?;
                return Err(unique.duplicate(&doc));
            }
        }

        self.meta
            .insert(UNIQUE_INDEX_KEY, serde_json::to_vec(&unique)?)?;
        debug!("Created unique index {} on {}", unique.name(), self.namespace);
        *current = Some(unique);
        Ok(())
    }

    async fn insert_one(&self, doc: Document) -> Result<()> {
        self.ensure_open()?;
        self.insert_doc(&doc)
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<u64> {
        self.ensure_open()?;
        let mut inserted = 0u64;
        for doc in &docs {
            self.insert_doc(doc)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn delete_one(&self, selector: &Document) -> Result<u64> {
        self.ensure_open()?;
        filter::validate(selector)?;

        for entry in self.docs.iter() {
            let (id, raw) = entry?;
            let doc = Self::decode(&raw)?;
            if filter::matches(selector, &doc) && self.remove_doc(&id, &doc)? {
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn delete_many(&self, selector: &Document) -> Result<u64> {
        self.ensure_open()?;
        filter::validate(selector)?;

        let mut deleted = 0u64;
        for (id, doc) in self.scan(selector)? {
            if self.remove_doc(&id, &doc)? {
                deleted += 1;
            }
        }
        debug!("Deleted {} documents from {}", deleted, self.namespace);
        Ok(deleted)
    }

    async fn find(&self, selector: &Document) -> Result<DocumentStream> {
        self.ensure_open()?;
        filter::validate(selector)?;

        let matched = self.scan(selector)?;
        Ok(stream::iter(matched.into_iter().map(|(_, doc)| Ok(doc))).boxed())
    }

    async fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        self.docs.clear()?;
        self.index.clear()?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.db.flush_async().await?;
        info!("Closed sled collection {}", self.namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use futures::TryStreamExt;

    fn open(dir: &tempfile::TempDir) -> SledCollection {
        SledCollection::open(dir.path(), "casbin", "casbin_rule").unwrap()
    }

    #[tokio::test]
    async fn test_insert_find_delete() {
        let dir = tempfile::tempdir().unwrap();
        let coll = open(&dir);

        coll.insert_many(vec![
            doc! { "ptype": "p", "v0": "alice", "v1": "data1" },
            doc! { "ptype": "p", "v0": "bob", "v1": "data1" },
            doc! { "ptype": "g", "v0": "alice", "v1": "admin" },
        ])
        .await
        .unwrap();

        let found: Vec<Document> = coll
            .find(&doc! { "v1": "data1" })
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].get_str("v0").unwrap(), "alice");
        assert_eq!(found[1].get_str("v0").unwrap(), "bob");

        assert_eq!(coll.delete_many(&doc! { "ptype": "p" }).await.unwrap(), 2);
        assert_eq!(coll.delete_one(&doc! { "ptype": "p" }).await.unwrap(), 0);
        assert_eq!(coll.len(), 1);
    }

    #[tokio::test]
    async fn test_unique_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let coll = open(&dir);
            coll.create_unique_index(&["ptype", "v0"]).await.unwrap();
            coll.insert_one(doc! { "ptype": "p", "v0": "alice" }).await.unwrap();
            coll.close().await.unwrap();
        }

        let coll = open(&dir);
        assert_eq!(coll.len(), 1);
        let err = coll
            .insert_one(doc! { "ptype": "p", "v0": "alice" })
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn test_delete_frees_index_key() {
        let dir = tempfile::tempdir().unwrap();
        let coll = open(&dir);
        coll.create_unique_index(&["v0"]).await.unwrap();
        coll.insert_one(doc! { "v0": "a" }).await.unwrap();
        assert_eq!(coll.delete_one(&doc! { "v0": "a" }).await.unwrap(), 1);
        coll.insert_one(doc! { "v0": "a" }).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_keeps_index_definition() {
        let dir = tempfile::tempdir().unwrap();
        let coll = open(&dir);
        coll.create_unique_index(&["v0"]).await.unwrap();
        coll.insert_one(doc! { "v0": "a" }).await.unwrap();
        coll.clear().await.unwrap();
        assert!(coll.is_empty());

        coll.insert_one(doc! { "v0": "a" }).await.unwrap();
        assert!(coll.insert_one(doc! { "v0": "a" }).await.is_err());
    }

    #[tokio::test]
    async fn test_collections_are_isolated_by_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let rules = SledCollection::with_db(db.clone(), "casbin", "rules").unwrap();
        let other = SledCollection::with_db(db, "casbin", "other").unwrap();

        rules.insert_one(doc! { "v0": "a" }).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_index_creation_rejects_existing_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let coll = open(&dir);
        coll.insert_many(vec![doc! { "v0": "a" }, doc! { "v0": "a" }])
            .await
            .unwrap();
        assert!(coll.create_unique_index(&["v0"]).await.is_err());
        // No partial index left behind
        coll.insert_one(doc! { "v0": "a" }).await.unwrap();
    }
}
