//! Policy persistence adapter
//!
//! `RuleAdapter` moves rules between a [`PolicyModel`] and a rule collection.
//! It keeps no policy data of its own; the only in-process state is whether
//! the last successful load was filtered, which blocks full saves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bson::Document;
use futures::{Future, TryStreamExt};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use rulestore_common::config::{AdapterConfig, DEFAULT_TIMEOUT_MS};
use rulestore_common::error::{ConnectionError, Error, PolicyError, Result, StorageError};
use rulestore_common::metrics::{self, LatencyTimer};
use rulestore_storage::{connect, RuleCollection, StoreUri};

use crate::codec;
use crate::model::{PolicyModel, Section};
use crate::row::{RuleRow, INDEX_FIELDS};
use crate::selector::Selector;

/// Operations a policy engine needs from its storage
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Load every stored rule into `model`
    async fn load_policy(&self, model: &mut PolicyModel) -> Result<()>;

    /// Load the rules matching `filter` into `model`.
    ///
    /// `None` or an empty document loads everything and marks the adapter
    /// full; any other filter marks it filtered.
    async fn load_filtered_policy(
        &self,
        model: &mut PolicyModel,
        filter: Option<&Document>,
    ) -> Result<()>;

    /// True when the last successful load used a filter
    fn is_filtered(&self) -> bool;

    /// Replace the stored rules with every rule in `model`
    async fn save_policy(&self, model: &PolicyModel) -> Result<()>;

    /// Store one rule
    async fn add_policy(&self, sec: &str, ptype: &str, rule: Vec<String>) -> Result<()>;

    /// Store several rules in one request
    async fn add_policies(&self, sec: &str, ptype: &str, rules: Vec<Vec<String>>) -> Result<()>;

    /// Delete at most one row matching `rule` exactly; returns rows deleted
    async fn remove_policy(&self, sec: &str, ptype: &str, rule: Vec<String>) -> Result<u64>;

    /// Delete each rule exactly once; returns rows deleted
    async fn remove_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> Result<u64>;

    /// Delete every row of `ptype` whose slots from `field_index` on match
    /// the non-empty `field_values`; returns rows deleted
    async fn remove_filtered_policy(
        &self,
        sec: &str,
        ptype: &str,
        field_index: isize,
        field_values: Vec<String>,
    ) -> Result<u64>;
}

/// Whether the model was last loaded in full or through a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Full,
    Filtered,
}

/// [`Adapter`] over a [`RuleCollection`]
pub struct RuleAdapter {
    collection: Arc<dyn RuleCollection>,
    owns_collection: bool,
    timeout: Duration,
    state: RwLock<LoadState>,
    closed: AtomicBool,
}

impl RuleAdapter {
    /// Open the store at `uri` with default settings
    pub async fn from_uri(uri: &str) -> Result<Self> {
        Self::from_config(&AdapterConfig::with_uri(uri)).await
    }

    /// Like [`RuleAdapter::from_uri`], but starts filtered so nothing can be
    /// saved before an explicit load
    pub async fn new_filtered(uri: &str) -> Result<Self> {
        let config = AdapterConfig {
            filtered: true,
            ..AdapterConfig::with_uri(uri)
        };
        Self::from_config(&config).await
    }

    /// Open the store described by `config`.
    ///
    /// The adapter owns the connection and releases it on [`close`].
    ///
    /// [`close`]: RuleAdapter::close
    pub async fn from_config(config: &AdapterConfig) -> Result<Self> {
        config.validate()?;
        let uri = StoreUri::parse(&config.uri)?;
        let collection = connect(&uri, config.database.as_deref(), &config.collection)?;

        let initial = if config.filtered {
            LoadState::Filtered
        } else {
            LoadState::Full
        };
        let adapter = Self::build(collection, true, config.timeout(), initial);

        let opened = async {
            adapter
                .request("ping", adapter.collection.ping())
                .await?;
            if config.create_index {
                adapter.ensure_index().await?;
            }
            Ok::<_, Error>(())
        }
        .await;

        if let Err(e) = opened {
            warn!("Failed to open rule store {}: {}", config.uri, e);
            if let Err(close_err) = adapter.close().await {
                warn!("Failed to release rule store {}: {}", config.uri, close_err);
            }
            return Err(e);
        }

        info!(
            "Rule adapter ready on {} (timeout {:?})",
            adapter.collection.namespace(),
            adapter.timeout
        );
        Ok(adapter)
    }

    /// Use an existing collection handle.
    ///
    /// The unique rule index is created if missing. The caller keeps
    /// ownership; [`close`] leaves the collection open.
    ///
    /// [`close`]: RuleAdapter::close
    pub async fn with_collection(collection: Arc<dyn RuleCollection>) -> Result<Self> {
        let adapter = Self::build(
            collection,
            false,
            Duration::from_millis(DEFAULT_TIMEOUT_MS),
            LoadState::Full,
        );
        adapter.ensure_index().await?;
        debug!("Rule adapter attached to {}", adapter.collection.namespace());
        Ok(adapter)
    }

    /// Override the per-request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build(
        collection: Arc<dyn RuleCollection>,
        owns_collection: bool,
        timeout: Duration,
        state: LoadState,
    ) -> Self {
        Self {
            collection,
            owns_collection,
            timeout,
            state: RwLock::new(state),
            closed: AtomicBool::new(false),
        }
    }

    /// Backing collection
    pub fn collection(&self) -> &Arc<dyn RuleCollection> {
        &self.collection
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn load_state(&self) -> LoadState {
        *self.state.read()
    }

    /// Ping the store; any failure, including a timeout, reads as unhealthy
    pub async fn is_healthy(&self) -> bool {
        self.request("ping", self.collection.ping()).await.is_ok()
    }

    /// Release the store connection if this adapter opened it.
    ///
    /// Later calls fail with `ConnectionClosed`. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.owns_collection {
            self.timed("close", self.collection.close()).await?;
            info!("Closed rule store {}", self.collection.namespace());
        }
        Ok(())
    }

    async fn ensure_index(&self) -> Result<()> {
        self.request(
            "create_index",
            self.collection.create_unique_index(&INDEX_FIELDS),
        )
        .await
    }

    /// Run one store request under the adapter's deadline
    async fn request<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        T: Send,
        F: Future<Output = Result<T>> + Send,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnectionError::ConnectionClosed.into());
        }
        self.timed(operation, fut).await
    }

    async fn timed<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        T: Send,
        F: Future<Output = Result<T>> + Send,
    {
        let _timer = LatencyTimer::new(operation);
        if let Ok(result) = tokio::time::timeout(self.timeout, fut).await {
            metrics::record_request(operation, result.is_ok());
            result
        } else {
            let after_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
            warn!("Store request {} timed out after {}ms", operation, after_ms);
            metrics::record_timeout(operation);
            metrics::record_request(operation, false);
            Err(ConnectionError::Timeout {
                operation,
                after_ms,
            }
            .into())
        }
    }

    async fn find_rows(&self, selector: &Document) -> Result<Vec<RuleRow>> {
        let docs: Vec<Document> = self
            .request("find", async {
                self.collection.find(selector).await?.try_collect().await
            })
            .await?;

        docs.iter().map(RuleRow::from_document).collect()
    }
}

/// Reject a rule type that is unknown or filed under the wrong section
fn check_rule_type(sec: &str, ptype: &str) -> Result<()> {
    let section = Section::parse(sec)?;
    if Section::of_rule_type(ptype)? != section {
        return Err(PolicyError::UnknownSection(format!(
            "{} in section {}",
            ptype, section
        ))
        .into());
    }
    Ok(())
}

/// Surface an index collision as a rule conflict
fn duplicate_rule(err: Error) -> Error {
    match err {
        Error::Storage(StorageError::DuplicateKey(detail)) => {
            PolicyError::DuplicateRule(detail).into()
        }
        other => other,
    }
}

#[async_trait]
impl Adapter for RuleAdapter {
    async fn load_policy(&self, model: &mut PolicyModel) -> Result<()> {
        self.load_filtered_policy(model, None).await
    }

    #[instrument(skip(self, model))]
    async fn load_filtered_policy(
        &self,
        model: &mut PolicyModel,
        filter: Option<&Document>,
    ) -> Result<()> {
        let selector = filter.cloned().unwrap_or_default();
        let state = if selector.is_empty() {
            LoadState::Full
        } else {
            LoadState::Filtered
        };

        let rows = self.find_rows(&selector).await?;

        // Reject the whole batch before touching the model
        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            Section::of_rule_type(&row.ptype)?;
            let rule = codec::decode(&row);
            rules.push((row.ptype, rule));
        }

        let loaded = rules.len();
        for (ptype, rule) in rules {
            model.load_policy_line(&ptype, rule)?;
        }

        *self.state.write() = state;
        metrics::record_rules_loaded(loaded as u64);
        debug!("Loaded {} rules ({:?})", loaded, state);
        Ok(())
    }

    fn is_filtered(&self) -> bool {
        self.load_state() == LoadState::Filtered
    }

    #[instrument(skip(self, model))]
    async fn save_policy(&self, model: &PolicyModel) -> Result<()> {
        if self.is_filtered() {
            return Err(PolicyError::FilteredSave.into());
        }

        let mut docs = Vec::with_capacity(model.len());
        for sec in Section::ALL {
            for ptype in model.rule_types(sec) {
                for rule in model.get_policy(sec, ptype) {
                    docs.push(codec::encode(ptype, rule).to_document());
                }
            }
        }

        self.request("clear", self.collection.clear()).await?;
        if docs.is_empty() {
            info!("Saved empty policy to {}", self.collection.namespace());
            return Ok(());
        }

        // On failure the store is empty or holds the rows written before
        // the failing one; callers must reload
        let written = self
            .request("insert_many", self.collection.insert_many(docs))
            .await
            .map_err(duplicate_rule)?;

        metrics::record_rules_written(written);
        info!("Saved {} rules to {}", written, self.collection.namespace());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_policy(&self, sec: &str, ptype: &str, rule: Vec<String>) -> Result<()> {
        check_rule_type(sec, ptype)?;
        let doc = codec::encode(ptype, &rule).to_document();
        self.request("insert_one", self.collection.insert_one(doc))
            .await
            .map_err(duplicate_rule)?;
        metrics::record_rules_written(1);
        Ok(())
    }

    #[instrument(skip(self, rules), fields(count = rules.len()))]
    async fn add_policies(&self, sec: &str, ptype: &str, rules: Vec<Vec<String>>) -> Result<()> {
        check_rule_type(sec, ptype)?;
        if rules.is_empty() {
            return Ok(());
        }
        let docs = rules
            .iter()
            .map(|rule| codec::encode(ptype, rule).to_document())
            .collect();
        let written = self
            .request("insert_many", self.collection.insert_many(docs))
            .await
            .map_err(duplicate_rule)?;
        metrics::record_rules_written(written);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_policy(&self, sec: &str, ptype: &str, rule: Vec<String>) -> Result<u64> {
        let filter = codec::encode(ptype, &rule).exact_filter();
        let deleted = self
            .request("delete_one", self.collection.delete_one(&filter))
            .await?;
        if deleted == 0 {
            debug!("No stored rule matched");
        }
        metrics::record_rules_deleted(deleted);
        Ok(deleted)
    }

    #[instrument(skip(self, rules), fields(count = rules.len()))]
    async fn remove_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: Vec<Vec<String>>,
    ) -> Result<u64> {
        let mut deleted = 0;
        for rule in &rules {
            let filter = codec::encode(ptype, rule).exact_filter();
            deleted += self
                .request("delete_one", self.collection.delete_one(&filter))
                .await?;
        }
        metrics::record_rules_deleted(deleted);
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn remove_filtered_policy(
        &self,
        sec: &str,
        ptype: &str,
        field_index: isize,
        field_values: Vec<String>,
    ) -> Result<u64> {
        let filter = Selector::build(ptype, field_index, &field_values).to_document();
        let deleted = self
            .request("delete_many", self.collection.delete_many(&filter))
            .await?;
        debug!("Removed {} rules", deleted);
        metrics::record_rules_deleted(deleted);
        Ok(deleted)
    }
}

impl Drop for RuleAdapter {
    fn drop(&mut self) {
        if self.owns_collection && !self.closed.load(Ordering::SeqCst) {
            warn!(
                "Rule adapter for {} dropped without close()",
                self.collection.namespace()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use rulestore_storage::{DocumentStream, MemoryCollection};

    fn rule(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    async fn adapter() -> (RuleAdapter, Arc<MemoryCollection>) {
        let coll = Arc::new(MemoryCollection::new("casbin_rule"));
        let adapter = RuleAdapter::with_collection(coll.clone()).await.unwrap();
        (adapter, coll)
    }

    async fn load(adapter: &RuleAdapter) -> PolicyModel {
        let mut model = PolicyModel::new();
        adapter.load_policy(&mut model).await.unwrap();
        model
    }

    #[tokio::test]
    async fn test_add_then_load() {
        let (adapter, _) = adapter().await;
        adapter
            .add_policy("p", "p", rule(&["alice", "data1", "read"]))
            .await
            .unwrap();
        adapter
            .add_policy("g", "g", rule(&["alice", "admin"]))
            .await
            .unwrap();

        let model = load(&adapter).await;
        assert_eq!(
            model.get_policy(Section::Policy, "p"),
            &[rule(&["alice", "data1", "read"])]
        );
        assert_eq!(
            model.get_policy(Section::Grouping, "g"),
            &[rule(&["alice", "admin"])]
        );
    }

    #[tokio::test]
    async fn test_duplicate_add_is_a_rule_conflict() {
        let (adapter, _) = adapter().await;
        adapter.add_policy("p", "p", rule(&["a", "b"])).await.unwrap();
        let err = adapter
            .add_policy("p", "p", rule(&["a", "b"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Policy(PolicyError::DuplicateRule(_))));
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_or_mismatched_rule_type() {
        let (adapter, coll) = adapter().await;

        let err = adapter.add_policy("p", "x", rule(&["bob"])).await.unwrap_err();
        assert!(matches!(err, Error::Policy(PolicyError::UnknownSection(_))));
        let err = adapter.add_policy("g", "p", rule(&["carol"])).await.unwrap_err();
        assert!(matches!(err, Error::Policy(PolicyError::UnknownSection(_))));
        let err = adapter.add_policy("m", "p", rule(&["dave"])).await.unwrap_err();
        assert!(matches!(err, Error::Policy(PolicyError::UnknownSection(_))));
        let err = adapter
            .add_policies("p", "g2", vec![rule(&["erin", "admin"])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Policy(PolicyError::UnknownSection(_))));
        assert!(coll.is_empty());

        adapter.add_policy("p", "p2", rule(&["frank"])).await.unwrap();
        let model = load(&adapter).await;
        assert_eq!(model.get_policy(Section::Policy, "p2"), &[rule(&["frank"])]);
        assert_eq!(model.len(), 1);
    }

    #[tokio::test]
    async fn test_filtered_load_blocks_save() {
        let (adapter, coll) = adapter().await;
        adapter.add_policy("p", "p", rule(&["alice", "data1", "read"])).await.unwrap();
        adapter.add_policy("p", "p", rule(&["bob", "data2", "read"])).await.unwrap();

        let mut model = PolicyModel::new();
        adapter
            .load_filtered_policy(&mut model, Some(&doc! { "v0": "alice" }))
            .await
            .unwrap();
        assert!(adapter.is_filtered());
        assert_eq!(model.len(), 1);

        let err = adapter.save_policy(&model).await.unwrap_err();
        assert!(matches!(err, Error::Policy(PolicyError::FilteredSave)));
        assert_eq!(coll.len(), 2);

        adapter.load_policy(&mut PolicyModel::new()).await.unwrap();
        assert!(!adapter.is_filtered());
    }

    #[tokio::test]
    async fn test_empty_filter_counts_as_full_load() {
        let (adapter, _) = adapter().await;
        let mut model = PolicyModel::new();
        adapter
            .load_filtered_policy(&mut model, Some(&doc! {}))
            .await
            .unwrap();
        assert!(!adapter.is_filtered());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_state() {
        let (adapter, _) = adapter().await;
        let mut model = PolicyModel::new();
        adapter
            .load_filtered_policy(&mut model, Some(&doc! { "v0": "alice" }))
            .await
            .unwrap();

        let bad = doc! { "v0": { "$regex": "^a" } };
        assert!(adapter
            .load_filtered_policy(&mut model, Some(&bad))
            .await
            .is_err());
        assert!(adapter.is_filtered());
    }

    #[tokio::test]
    async fn test_unknown_section_leaves_model_untouched() {
        let (adapter, coll) = adapter().await;
        coll.insert_one(doc! { "ptype": "p", "v0": "alice" }).await.unwrap();
        coll.insert_one(doc! { "ptype": "x", "v0": "bob" }).await.unwrap();

        let mut model = PolicyModel::new();
        let err = adapter.load_policy(&mut model).await.unwrap_err();
        assert!(matches!(err, Error::Policy(PolicyError::UnknownSection(_))));
        assert!(model.is_empty());
    }

    #[tokio::test]
    async fn test_load_truncates_sparse_rows() {
        let (adapter, coll) = adapter().await;
        coll.insert_one(doc! {
            "ptype": "p", "v0": "a", "v1": "", "v2": "b", "v3": "", "v4": "", "v5": "b",
        })
        .await
        .unwrap();
        coll.insert_one(doc! { "ptype": "p" }).await.unwrap();

        let model = load(&adapter).await;
        assert_eq!(
            model.get_policy(Section::Policy, "p"),
            &[rule(&["a"]), Vec::new()]
        );
    }

    #[tokio::test]
    async fn test_save_replaces_store() {
        let (adapter, coll) = adapter().await;
        adapter.add_policy("p", "p", rule(&["stale", "x", "y"])).await.unwrap();

        let mut model = PolicyModel::new();
        model.add_policy(Section::Policy, "p", rule(&["alice", "data1", "read"]));
        model.add_policy(Section::Policy, "p2", rule(&["bob", "data2"]));
        model.add_policy(Section::Grouping, "g", rule(&["alice", "admin"]));
        adapter.save_policy(&model).await.unwrap();
        assert_eq!(coll.len(), 3);

        assert_eq!(load(&adapter).await, model);

        adapter.save_policy(&PolicyModel::new()).await.unwrap();
        assert!(coll.is_empty());
    }

    #[tokio::test]
    async fn test_save_with_duplicate_rules_leaves_store_partial() {
        let (adapter, coll) = adapter().await;
        let mut model = PolicyModel::new();
        model.add_policy(Section::Policy, "p", rule(&["a"]));
        model.add_policy(Section::Policy, "p", rule(&["a"]));

        let err = adapter.save_policy(&model).await.unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(coll.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_policy_is_exact_and_idempotent() {
        let (adapter, _) = adapter().await;
        adapter.add_policy("p", "p", rule(&["alice", "data1", "read"])).await.unwrap();
        adapter.add_policy("p", "p", rule(&["alice", "data1"])).await.unwrap();

        let removed = adapter
            .remove_policy("p", "p", rule(&["alice", "data1"]))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let again = adapter
            .remove_policy("p", "p", rule(&["alice", "data1"]))
            .await
            .unwrap();
        assert_eq!(again, 0);

        let model = load(&adapter).await;
        assert_eq!(
            model.get_policy(Section::Policy, "p"),
            &[rule(&["alice", "data1", "read"])]
        );
    }

    #[tokio::test]
    async fn test_remove_filtered_policy() {
        let (adapter, _) = adapter().await;
        adapter.add_policy("p", "p", rule(&["alice", "data1", "read"])).await.unwrap();
        adapter.add_policy("p", "p", rule(&["bob", "data1", "write"])).await.unwrap();
        adapter.add_policy("p", "p", rule(&["bob", "data2", "write"])).await.unwrap();
        adapter.add_policy("g", "g", rule(&["alice", "data1"])).await.unwrap();

        let removed = adapter
            .remove_filtered_policy("p", "p", 1, rule(&["data1"]))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let model = load(&adapter).await;
        assert_eq!(
            model.get_policy(Section::Policy, "p"),
            &[rule(&["bob", "data2", "write"])]
        );
        assert_eq!(model.get_policy(Section::Grouping, "g").len(), 1);

        let none = adapter
            .remove_filtered_policy("p", "p", 0, rule(&["nobody"]))
            .await
            .unwrap();
        assert_eq!(none, 0);
    }

    #[tokio::test]
    async fn test_batch_add_and_remove() {
        let (adapter, coll) = adapter().await;
        adapter
            .add_policies("p", "p", vec![rule(&["a", "1"]), rule(&["b", "2"]), rule(&["c", "3"])])
            .await
            .unwrap();
        assert_eq!(coll.len(), 3);

        let removed = adapter
            .remove_policies("p", "p", vec![rule(&["a", "1"]), rule(&["zz"])])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(coll.len(), 2);

        adapter.add_policies("p", "p", Vec::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_leaves_borrowed_collection_open() {
        let (adapter, coll) = adapter().await;
        adapter.close().await.unwrap();
        adapter.close().await.unwrap();

        let err = adapter.load_policy(&mut PolicyModel::new()).await.unwrap_err();
        assert!(matches!(err, Error::Connection(ConnectionError::ConnectionClosed)));
        assert!(coll.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_owned_store_closes() {
        let adapter = RuleAdapter::from_uri("memory://").await.unwrap();
        assert!(adapter.is_healthy().await);
        let coll = adapter.collection().clone();
        adapter.close().await.unwrap();
        assert!(coll.ping().await.is_err());
        assert!(!adapter.is_healthy().await);
    }

    #[tokio::test]
    async fn test_new_filtered_refuses_save_until_load() {
        let adapter = RuleAdapter::new_filtered("memory://").await.unwrap();
        assert!(adapter.is_filtered());
        assert!(adapter.save_policy(&PolicyModel::new()).await.is_err());

        adapter.load_policy(&mut PolicyModel::new()).await.unwrap();
        adapter.save_policy(&PolicyModel::new()).await.unwrap();
        adapter.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_uri_is_rejected() {
        let err = RuleAdapter::from_uri("mongodb://localhost").await.err().unwrap();
        assert!(matches!(err, Error::Connection(ConnectionError::InvalidUri(_))));
    }

    /// Collection whose reads never finish in time
    struct SlowCollection {
        inner: MemoryCollection,
        delay: Duration,
    }

    #[async_trait]
    impl RuleCollection for SlowCollection {
        fn namespace(&self) -> String {
            self.inner.namespace()
        }
        async fn ping(&self) -> Result<()> {
            self.inner.ping().await
        }
        async fn create_unique_index(&self, fields: &[&str]) -> Result<()> {
            self.inner.create_unique_index(fields).await
        }
        async fn insert_one(&self, doc: Document) -> Result<()> {
            self.inner.insert_one(doc).await
        }
        async fn insert_many(&self, docs: Vec<Document>) -> Result<u64> {
            self.inner.insert_many(docs).await
        }
        async fn delete_one(&self, filter: &Document) -> Result<u64> {
            self.inner.delete_one(filter).await
        }
        async fn delete_many(&self, filter: &Document) -> Result<u64> {
            self.inner.delete_many(filter).await
        }
        async fn find(&self, filter: &Document) -> Result<DocumentStream> {
            tokio::time::sleep(self.delay).await;
            self.inner.find(filter).await
        }
        async fn clear(&self) -> Result<()> {
            self.inner.clear().await
        }
        async fn close(&self) -> Result<()> {
            self.inner.close().await
        }
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let slow = Arc::new(SlowCollection {
            inner: MemoryCollection::new("casbin_rule"),
            delay: Duration::from_secs(5),
        });
        let adapter = RuleAdapter::with_collection(slow)
            .await
            .unwrap()
            .with_timeout(Duration::from_millis(20));
        assert_eq!(adapter.timeout(), Duration::from_millis(20));

        let mut model = PolicyModel::new();
        let filtered = adapter
            .load_filtered_policy(&mut model, Some(&doc! { "v0": "a" }))
            .await;
        assert!(filtered.unwrap_err().is_timeout());
        let err = adapter.load_policy(&mut model).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Connection error: find timed out after 20ms");
        assert!(!adapter.is_filtered());
    }
}
