//! RuleStore
//!
//! Persistence adapter for authorization policies kept in a document store.
//! Each rule is stored as one row: a type tag (`ptype`) plus six field slots
//! (`v0`..`v5`), with empty slots stored as empty strings.
//!
//! - [`codec`]: rule tuples to rows and back
//! - [`selector`]: partial-match selectors for filtered removal
//! - [`model`]: the section / rule type / tuple model policy engines use
//! - [`adapter`]: load, save, add and remove against a [`RuleCollection`]
//!
//! ```no_run
//! use rulestore::{Adapter, PolicyModel, RuleAdapter};
//!
//! # async fn run() -> rulestore::Result<()> {
//! let adapter = RuleAdapter::from_uri("sled:///var/lib/rulestore").await?;
//! adapter
//!     .add_policy("p", "p", vec!["alice".into(), "data1".into(), "read".into()])
//!     .await?;
//!
//! let mut model = PolicyModel::new();
//! adapter.load_policy(&mut model).await?;
//! adapter.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod codec;
pub mod model;
pub mod row;
pub mod selector;

pub use adapter::{Adapter, LoadState, RuleAdapter};
pub use model::{PolicyModel, Section};
pub use row::{RuleRow, MAX_FIELDS};
pub use selector::Selector;

pub use rulestore_common::{AdapterConfig, Config, Error, LoggingConfig, PolicyError, Result};
pub use rulestore_storage::{MemoryCollection, RuleCollection, SledCollection, StoreUri};
