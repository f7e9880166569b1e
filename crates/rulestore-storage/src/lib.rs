//! RuleStore Storage
//!
//! Document collections the policy adapter persists rules into:
//! - `RuleCollection`, the CRUD seam the adapter talks to
//! - In-memory collections (private or shared by database name)
//! - Sled-backed durable collections
//! - Store URI parsing and connection setup

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod connection;
pub mod filter;
pub mod index;
pub mod memory;
pub mod sled_store;

use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;

use rulestore_common::error::Result;

pub use connection::{connect, StoreUri};
pub use index::UniqueIndex;
pub use memory::MemoryCollection;
pub use sled_store::SledCollection;

/// Cursor over the documents returned by [`RuleCollection::find`]
pub type DocumentStream = BoxStream<'static, Result<Document>>;

/// A collection of rule documents.
///
/// Each call is one independent request; nothing here is transactional.
#[async_trait]
pub trait RuleCollection: Send + Sync {
    /// `database.collection`
    fn namespace(&self) -> String;

    /// Verify the collection is reachable
    async fn ping(&self) -> Result<()>;

    /// Create a unique index over `fields`.
    ///
    /// Idempotent for the same field list. Fails if existing documents
    /// already collide.
    async fn create_unique_index(&self, fields: &[&str]) -> Result<()>;

    /// Insert one document
    async fn insert_one(&self, doc: Document) -> Result<()>;

    /// Insert documents in order, stopping at the first failure.
    ///
    /// Documents before the failing one stay inserted.
    async fn insert_many(&self, docs: Vec<Document>) -> Result<u64>;

    /// Delete the first document matching `filter`; returns 0 or 1
    async fn delete_one(&self, filter: &Document) -> Result<u64>;

    /// Delete every document matching `filter`
    async fn delete_many(&self, filter: &Document) -> Result<u64>;

    /// Stream documents matching `filter` in insertion order
    async fn find(&self, filter: &Document) -> Result<DocumentStream>;

    /// Remove every document, keeping index definitions
    async fn clear(&self) -> Result<()>;

    /// Release the handle; later requests fail with `CollectionClosed`
    async fn close(&self) -> Result<()>;
}
