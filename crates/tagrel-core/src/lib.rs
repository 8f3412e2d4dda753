//! Tagrel Core - Tag relationship resolution and autocomplete result caching.
//!
//! This crate resolves user-declared tag siblings (aliases) and parents
//! (implications) across independently edited tag services, and decides per
//! keystroke whether cached autocomplete results can answer a refined query.
//! It can be used programmatically without the RPC layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tagrel_core::{
//!     AutocompleteSession, MemoryStore, ParentPair, RelationshipCacheManager, ServiceId,
//!     TagOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> tagrel_core::Result<()> {
//!     let store = Arc::new(MemoryStore::load("store.json")?);
//!     let manager = RelationshipCacheManager::start(store.clone(), TagOptions::default()).await?;
//!
//!     let service = ServiceId::new("my tags");
//!     store.add_parent(&service, ParentPair::new("samus aran", "metroid"))?;
//!     manager.notify_parents_changed();
//!     manager.refresh_now().await?;
//!     println!("{:?}", manager.get_parents(&service, "samus aran")?);
//!
//!     let session = AutocompleteSession::new(service, store, manager);
//!     for predicate in session.lookup("sam").await? {
//!         println!("{:?}", predicate.value);
//!     }
//!     Ok(())
//! }
//! ```

pub mod autocomplete;
pub mod cancel;
pub mod config;
pub mod error;
pub mod manager;
pub mod predicate;
pub mod relationships;
pub mod store;
pub mod tags;

// Re-export commonly used types
pub use autocomplete::{AutocompleteQuery, AutocompleteSession, ResultCache, TextMatcher};
pub use cancel::{CancellationSlot, CancellationToken, CancelledError};
pub use config::{AutocompleteConfig, RelationshipConfig, RpcConfig, TagOptions};
pub use error::{Result, TagRelError};
pub use manager::{LookupScope, ManagerStatus, RefreshState, RelationshipCacheManager};
pub use predicate::{merge_predicates, Predicate, PredicateCount, PredicateValue, SystemPredicate};
pub use relationships::{resolve_parents, resolve_siblings, ParentGraph, SiblingGraph};
pub use store::{MemoryStore, RelationshipStore, ServiceRecord, StoreSnapshot};
pub use tags::{ParentPair, ServiceId, SiblingPair};
