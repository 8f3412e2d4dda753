//! In-memory [`RelationshipStore`], loadable from a JSON snapshot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::RelationshipStore;
use crate::autocomplete::matching::{fetch_permitted, is_exact_match, TextMatcher};
use crate::cancel::CancellationToken;
use crate::config::TagOptions;
use crate::error::{Result, TagRelError};
use crate::predicate::{Predicate, PredicateCount};
use crate::tags::{ParentPair, ServiceId, SiblingPair};

/// Everything one service holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub service: ServiceId,
    /// Highest precedence group first.
    #[serde(default)]
    pub sibling_groups: Vec<Vec<SiblingPair>>,
    #[serde(default)]
    pub parent_pairs: Vec<ParentPair>,
    /// Current file count per tag.
    #[serde(default)]
    pub tag_counts: BTreeMap<String, u64>,
}

impl ServiceRecord {
    pub fn new(service: ServiceId) -> Self {
        Self {
            service,
            sibling_groups: Vec::new(),
            parent_pairs: Vec::new(),
            tag_counts: BTreeMap::new(),
        }
    }
}

/// Serializable contents of a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Highest precedence service first.
    #[serde(default)]
    pub services: Vec<ServiceRecord>,
    #[serde(default = "default_system_predicates")]
    pub system_predicates: Vec<Predicate>,
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            services: Vec::new(),
            system_predicates: default_system_predicates(),
        }
    }
}

fn default_system_predicates() -> Vec<Predicate> {
    ["everything", "inbox", "archive"]
        .into_iter()
        .map(Predicate::system)
        .collect()
}

/// A relationship store kept entirely in memory.
///
/// Used as the backing store of the RPC server and as the fixture store in
/// tests. Edits go through the mutation methods; callers are responsible for
/// telling the relationship manager afterwards.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            data: RwLock::new(snapshot),
        }
    }

    /// Load a store from a JSON snapshot file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| TagRelError::io_with_path(e, path))?;
        let snapshot: StoreSnapshot = serde_json::from_str(&contents)?;
        debug!(
            "Loaded store snapshot with {} services from {}",
            snapshot.services.len(),
            path.display()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        Ok(self.read()?.clone())
    }

    /// Register a service at the lowest precedence. Returns false if it exists.
    pub fn add_service(&self, service: ServiceId) -> Result<bool> {
        let mut data = self.write()?;
        if data.services.iter().any(|record| record.service == service) {
            return Ok(false);
        }
        data.services.push(ServiceRecord::new(service));
        Ok(true)
    }

    /// Add a sibling pair to the given precedence group of a service.
    ///
    /// `group` may name an existing group or the next one after the last.
    pub fn add_sibling(&self, service: &ServiceId, group: usize, pair: SiblingPair) -> Result<()> {
        self.with_service(service, |record| {
            let group_count = record.sibling_groups.len();
            if group > group_count {
                return Err(TagRelError::InvalidParams {
                    message: format!(
                        "Sibling group {} out of range ({} groups in {})",
                        group, group_count, record.service
                    ),
                });
            }
            if group == group_count {
                record.sibling_groups.push(Vec::new());
            }
            let pairs = &mut record.sibling_groups[group];
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
            Ok(())
        })?
    }

    /// Remove a sibling pair from every group of a service.
    pub fn remove_sibling(&self, service: &ServiceId, pair: &SiblingPair) -> Result<bool> {
        self.with_service(service, |record| {
            let mut removed = false;
            for pairs in record.sibling_groups.iter_mut() {
                let before = pairs.len();
                pairs.retain(|existing| existing != pair);
                removed |= pairs.len() != before;
            }
            removed
        })
    }

    pub fn add_parent(&self, service: &ServiceId, pair: ParentPair) -> Result<()> {
        self.with_service(service, |record| {
            if !record.parent_pairs.contains(&pair) {
                record.parent_pairs.push(pair);
            }
        })
    }

    pub fn remove_parent(&self, service: &ServiceId, pair: &ParentPair) -> Result<bool> {
        self.with_service(service, |record| {
            let before = record.parent_pairs.len();
            record.parent_pairs.retain(|existing| existing != pair);
            record.parent_pairs.len() != before
        })
    }

    /// Set the current file count of a tag. A zero count removes the tag.
    pub fn set_tag_count(&self, service: &ServiceId, tag: impl Into<String>, count: u64) -> Result<()> {
        let tag = tag.into();
        self.with_service(service, |record| {
            if count == 0 {
                record.tag_counts.remove(&tag);
            } else {
                record.tag_counts.insert(tag, count);
            }
        })
    }

    fn with_service<T>(
        &self,
        service: &ServiceId,
        f: impl FnOnce(&mut ServiceRecord) -> T,
    ) -> Result<T> {
        let mut data = self.write()?;
        let record = data
            .services
            .iter_mut()
            .find(|record| &record.service == service)
            .ok_or_else(|| TagRelError::service_not_found(service))?;
        Ok(f(record))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreSnapshot>> {
        self.data
            .read()
            .map_err(|_| TagRelError::store("Failed to acquire store lock"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreSnapshot>> {
        self.data
            .write()
            .map_err(|_| TagRelError::store("Failed to acquire store lock"))
    }

    /// Records a lookup covers: one service, or all of them for the combined
    /// service.
    fn records<'a>(
        data: &'a StoreSnapshot,
        service: &ServiceId,
    ) -> Result<Vec<&'a ServiceRecord>> {
        if service.is_combined() {
            return Ok(data.services.iter().collect());
        }
        data.services
            .iter()
            .find(|record| &record.service == service)
            .map(|record| vec![record])
            .ok_or_else(|| TagRelError::service_not_found(service))
    }
}

#[async_trait]
impl RelationshipStore for MemoryStore {
    async fn list_services(&self, cancel: &CancellationToken) -> Result<Vec<ServiceId>> {
        cancel.check()?;
        Ok(self
            .read()?
            .services
            .iter()
            .map(|record| record.service.clone())
            .collect())
    }

    async fn read_sibling_pairs(
        &self,
        service: &ServiceId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<SiblingPair>>> {
        cancel.check()?;
        let data = self.read()?;
        Ok(Self::records(&data, service)?
            .into_iter()
            .flat_map(|record| record.sibling_groups.iter().cloned())
            .collect())
    }

    async fn read_parent_pairs(
        &self,
        service: &ServiceId,
        cancel: &CancellationToken,
    ) -> Result<Vec<ParentPair>> {
        cancel.check()?;
        let data = self.read()?;
        Ok(Self::records(&data, service)?
            .into_iter()
            .flat_map(|record| record.parent_pairs.iter().cloned())
            .collect())
    }

    async fn read_autocomplete_predicates(
        &self,
        service: &ServiceId,
        search_text: &str,
        exact_match: bool,
        options: &TagOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Predicate>> {
        cancel.check()?;
        if !fetch_permitted(search_text, options) {
            debug!("Fetch of {:?} not permitted by tag options", search_text);
            return Ok(Vec::new());
        }
        let matcher = TextMatcher::new(search_text, options)?;
        let data = self.read()?;

        let mut counts: BTreeMap<&str, PredicateCount> = BTreeMap::new();
        for record in Self::records(&data, service)? {
            for (tag, &count) in &record.tag_counts {
                let hit = if exact_match {
                    is_exact_match(search_text, tag)
                } else {
                    matcher.matches_tag(tag)
                };
                if hit {
                    counts
                        .entry(tag.as_str())
                        .and_modify(|existing| existing.merge(&PredicateCount::exact(count, 0)))
                        .or_insert_with(|| PredicateCount::exact(count, 0));
                }
            }
        }

        Ok(counts
            .into_iter()
            .map(|(tag, count)| Predicate::tag(tag).with_count(count))
            .collect())
    }

    async fn read_system_predicates(
        &self,
        service: &ServiceId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Predicate>> {
        cancel.check()?;
        let data = self.read()?;
        Self::records(&data, service)?;
        Ok(data.system_predicates.clone())
    }
}
