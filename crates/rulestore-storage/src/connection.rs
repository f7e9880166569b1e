//! Store URIs and connection setup
//!
//! Supported forms:
//! - `memory://` private in-process collection
//! - `memory:///<database>` shared in-process database
//! - `sled:///<path>?database=<db>&collection=<coll>` durable sled store

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use url::Url;

use rulestore_common::config::DEFAULT_DATABASE;
use rulestore_common::error::{ConnectionError, Result};

use crate::memory::MemoryCollection;
use crate::sled_store::SledCollection;
use crate::RuleCollection;

/// Parsed store location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUri {
    /// In-process collection; shared when a database is named
    Memory { database: Option<String> },
    /// Embedded sled database at `path`
    Sled {
        path: PathBuf,
        database: Option<String>,
        collection: Option<String>,
    },
}

impl StoreUri {
    /// Parse a store URI
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)
            .map_err(|e| ConnectionError::InvalidUri(format!("{}: {}", uri, e)))?;

        let mut database = None;
        let mut collection = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "database" if !value.is_empty() => database = Some(value.into_owned()),
                "collection" if !value.is_empty() => collection = Some(value.into_owned()),
                _ => {}
            }
        }

        match url.scheme() {
            "memory" => {
                let name = url.path().trim_matches('/');
                if !name.is_empty() {
                    database = Some(name.to_string());
                }
                Ok(StoreUri::Memory { database })
            }
            "sled" => {
                if url.host_str().is_some_and(|h| !h.is_empty()) {
                    return Err(ConnectionError::InvalidUri(format!(
                        "{}: sled URIs take an absolute path and no host",
                        uri
                    ))
                    .into());
                }
                if url.path().is_empty() || url.path() == "/" {
                    return Err(
                        ConnectionError::InvalidUri(format!("{}: missing sled path", uri)).into(),
                    );
                }
                Ok(StoreUri::Sled {
                    path: PathBuf::from(url.path()),
                    database,
                    collection,
                })
            }
            other => Err(ConnectionError::InvalidUri(format!(
                "{}: unsupported scheme '{}'",
                uri, other
            ))
            .into()),
        }
    }

    /// Database named by the URI itself, if any
    pub fn database(&self) -> Option<&str> {
        match self {
            StoreUri::Memory { database } | StoreUri::Sled { database, .. } => database.as_deref(),
        }
    }

    /// Collection named by the URI itself, if any
    pub fn collection(&self) -> Option<&str> {
        match self {
            StoreUri::Memory { .. } => None,
            StoreUri::Sled { collection, .. } => collection.as_deref(),
        }
    }
}

/// Open the collection a URI points at.
///
/// Names in the URI win over `database` and `collection`; the database falls
/// back to [`DEFAULT_DATABASE`].
pub fn connect(
    uri: &StoreUri,
    database: Option<&str>,
    collection: &str,
) -> Result<Arc<dyn RuleCollection>> {
    let collection = uri.collection().unwrap_or(collection);
    let database = uri.database().or(database);

    let handle: Arc<dyn RuleCollection> = match uri {
        StoreUri::Memory { .. } => match database {
            Some(name) => Arc::new(MemoryCollection::open(name, collection)),
            None => Arc::new(MemoryCollection::new(collection)),
        },
        StoreUri::Sled { path, .. } => Arc::new(SledCollection::open(
            path,
            database.unwrap_or(DEFAULT_DATABASE),
            collection,
        )?),
    };

    info!("Connected to rule collection {}", handle.namespace());
    Ok(handle)
}
