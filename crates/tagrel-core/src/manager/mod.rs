//! RelationshipCacheManager - resolved sibling and parent graphs per service.
//!
//! Provides:
//! - Synchronous lookups (collapse, parents, expansion) from in-memory graphs
//! - Debounced rebuilds from the [`RelationshipStore`] after edit notifications
//! - A synthetic combined service unioning every real service
//! - A "display rules changed" generation counter for dependent caches
//!
//! Graphs are rebuilt wholesale and swapped in under a short lock. A failed
//! rebuild leaves the previous graphs serving.

mod state;

pub use state::RefreshState;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::config::{RelationshipConfig, TagOptions};
use crate::error::{Result, TagRelError};
use crate::predicate::{merge_predicates, Predicate, PredicateValue};
use crate::relationships::{resolve_parents, resolve_siblings, ParentGraph, SiblingGraph};
use crate::store::RelationshipStore;
use crate::tags::{ParentPair, ServiceId, SiblingPair};
use state::AtomicRefreshState;

/// Whether a lookup honours the "apply across all services" options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupScope {
    /// Substitute the combined graph when the options say so.
    #[default]
    FollowOptions,
    /// Always use the requested service's own graph.
    ServiceOnly,
}

/// Snapshot of the manager for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStatus {
    pub state: RefreshState,
    pub services: Vec<ServiceId>,
    pub rebuild_count: u64,
    pub generation: u64,
}

/// The resolved graphs of one rebuild.
#[derive(Debug)]
struct Graphs {
    /// Real services, highest precedence first.
    services: Vec<ServiceId>,
    siblings: HashMap<ServiceId, Arc<SiblingGraph>>,
    /// Parents with pairs collapsed through the service's own siblings.
    parents: HashMap<ServiceId, Arc<ParentGraph>>,
    /// Parents with pairs collapsed through the combined siblings, served
    /// while siblings apply across all services.
    parents_via_combined: HashMap<ServiceId, Arc<ParentGraph>>,
}

impl Graphs {
    fn empty() -> Self {
        let mut siblings = HashMap::new();
        let mut parents = HashMap::new();
        siblings.insert(ServiceId::combined(), Arc::new(SiblingGraph::new()));
        parents.insert(ServiceId::combined(), Arc::new(ParentGraph::new()));
        Self {
            services: Vec::new(),
            siblings,
            parents,
            parents_via_combined: HashMap::new(),
        }
    }

    fn check_known(&self, service: &ServiceId) -> Result<()> {
        if service.is_combined() || self.services.contains(service) {
            Ok(())
        } else {
            Err(TagRelError::service_not_found(service))
        }
    }

    fn siblings_of(&self, service: &ServiceId) -> Arc<SiblingGraph> {
        self.siblings
            .get(service)
            .cloned()
            .unwrap_or_else(|| Arc::new(SiblingGraph::new()))
    }

    fn parents_of(&self, service: &ServiceId, siblings_across_all: bool) -> Arc<ParentGraph> {
        let by_service = if siblings_across_all && !service.is_combined() {
            &self.parents_via_combined
        } else {
            &self.parents
        };
        by_service
            .get(service)
            .cloned()
            .unwrap_or_else(|| Arc::new(ParentGraph::new()))
    }
}

/// Owner of the resolved relationship graphs.
///
/// Construct one per store and share it as `Arc<RelationshipCacheManager>`.
/// Edit notifications take `self: &Arc<Self>` because they spawn the
/// debounce timer.
pub struct RelationshipCacheManager {
    store: Arc<dyn RelationshipStore>,
    graphs: Mutex<Graphs>,
    options: RwLock<TagOptions>,
    state: AtomicRefreshState,
    /// The single armed debounce timer, if any.
    pending: Mutex<Option<JoinHandle<()>>>,
    /// Bumped whenever the timer is re-armed; a firing timer with a stale
    /// epoch does nothing.
    timer_epoch: AtomicU64,
    rebuild_lock: tokio::sync::Mutex<()>,
    rules_changed: watch::Sender<u64>,
    quiet_period: Duration,
    rebuild_count: AtomicU64,
}

impl RelationshipCacheManager {
    /// Create a manager with empty graphs. Wrap it in an `Arc` and call
    /// [`refresh_now`] before serving lookups for real services.
    ///
    /// [`refresh_now`]: RelationshipCacheManager::refresh_now
    pub fn new(store: Arc<dyn RelationshipStore>, options: TagOptions) -> Self {
        let (rules_changed, _) = watch::channel(0);
        Self {
            store,
            graphs: Mutex::new(Graphs::empty()),
            options: RwLock::new(options),
            state: AtomicRefreshState::new(RefreshState::Dirty),
            pending: Mutex::new(None),
            timer_epoch: AtomicU64::new(0),
            rebuild_lock: tokio::sync::Mutex::new(()),
            rules_changed,
            quiet_period: RelationshipConfig::REBUILD_QUIET_PERIOD,
            rebuild_count: AtomicU64::new(0),
        }
    }

    /// Override the debounce quiet period.
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    /// Create a manager and run the first rebuild.
    pub async fn start(store: Arc<dyn RelationshipStore>, options: TagOptions) -> Result<Arc<Self>> {
        let manager = Arc::new(Self::new(store, options));
        manager.refresh_now().await?;
        Ok(manager)
    }

    // === Lookups ===

    /// The ideal tag for `tag`, or `tag` itself when it has no better alias.
    pub fn collapse_tag(&self, service: &ServiceId, tag: &str) -> Result<String> {
        Ok(self.sibling_graph(service, LookupScope::FollowOptions)?.collapse(tag))
    }

    pub fn collapse_tags<I, S>(&self, service: &ServiceId, tags: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let graph = self.sibling_graph(service, LookupScope::FollowOptions)?;
        Ok(tags
            .into_iter()
            .map(|tag| graph.collapse(tag.as_ref()))
            .collect())
    }

    /// Collapse both sides of each pair. Duplicates produced by collapsing are
    /// dropped; the first occurrence keeps its position.
    pub fn collapse_pairs(&self, service: &ServiceId, pairs: &[ParentPair]) -> Result<Vec<ParentPair>> {
        let graph = self.sibling_graph(service, LookupScope::FollowOptions)?;
        Ok(collapse_parent_pairs(&graph, pairs))
    }

    /// Ordered ancestors of `tag`; empty when it has none.
    pub fn get_parents(&self, service: &ServiceId, tag: &str) -> Result<Vec<String>> {
        self.get_parents_scoped(service, tag, LookupScope::FollowOptions)
    }

    pub fn get_parents_scoped(
        &self,
        service: &ServiceId,
        tag: &str,
        scope: LookupScope,
    ) -> Result<Vec<String>> {
        Ok(self.parent_graph(service, scope)?.parents(tag).to_vec())
    }

    /// The input tags plus every ancestor of each.
    pub fn expand_tags<I, S>(&self, service: &ServiceId, tags: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let graph = self.parent_graph(service, LookupScope::FollowOptions)?;
        let mut expanded = BTreeSet::new();
        for tag in tags {
            let tag = tag.as_ref();
            expanded.extend(graph.parents(tag).iter().cloned());
            expanded.insert(tag.to_string());
        }
        Ok(expanded)
    }

    /// Insert one parent predicate per ancestor directly after each tag
    /// predicate. Parent predicates share the inclusiveness of their tag.
    pub fn expand_predicates(
        &self,
        service: &ServiceId,
        predicates: Vec<Predicate>,
    ) -> Result<Vec<Predicate>> {
        let graph = self.parent_graph(service, LookupScope::FollowOptions)?;
        let mut expanded = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            let parents = match &predicate.value {
                PredicateValue::Tag(tag) => graph.parents(tag),
                _ => &[],
            };
            let inclusive = predicate.inclusive;
            let parents: Vec<Predicate> = parents
                .iter()
                .map(|parent| Predicate::parent(parent.clone()).with_inclusive(inclusive))
                .collect();
            expanded.push(predicate);
            expanded.extend(parents);
        }
        Ok(expanded)
    }

    /// The whole alias group of `tag`: the ideal first, then its aliases in
    /// lexicographic order. `[tag]` when it has no siblings.
    pub fn get_all_siblings(&self, service: &ServiceId, tag: &str) -> Result<Vec<String>> {
        Ok(self.sibling_graph(service, LookupScope::FollowOptions)?.group_of(tag))
    }

    /// Replace every tag predicate by its ideal and merge the counts of
    /// predicates that end up equal.
    pub fn collapse_predicates(
        &self,
        service: &ServiceId,
        predicates: Vec<Predicate>,
    ) -> Result<Vec<Predicate>> {
        let graph = self.sibling_graph(service, LookupScope::FollowOptions)?;
        let collapsed = predicates.into_iter().map(|mut predicate| {
            if let PredicateValue::Tag(tag) = &mut predicate.value {
                if let Some(ideal) = graph.ideal(tag) {
                    *tag = ideal.to_string();
                }
            }
            predicate
        });
        Ok(merge_predicates(collapsed))
    }

    // === Events ===

    /// Sibling data changed in the store; schedule a rebuild.
    pub fn notify_siblings_changed(self: &Arc<Self>) {
        debug!("Sibling data changed, scheduling rebuild");
        self.schedule_rebuild();
    }

    /// Parent data changed in the store; schedule a rebuild.
    pub fn notify_parents_changed(self: &Arc<Self>) {
        debug!("Parent data changed, scheduling rebuild");
        self.schedule_rebuild();
    }

    /// Receiver of the "display rules changed" generation counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.rules_changed.subscribe()
    }

    // === Rebuild ===

    /// Rebuild immediately, bypassing any armed timer.
    ///
    /// On failure the previous graphs stay in place, the error is returned
    /// and a retry is scheduled as if an edit had just arrived.
    pub async fn refresh_now(self: &Arc<Self>) -> Result<()> {
        self.disarm_timer();
        let cancel = CancellationToken::new();
        if let Err(e) = self.rebuild(&cancel).await {
            warn!(
                "Relationship refresh failed, retrying in {:?}: {}",
                self.quiet_period, e
            );
            self.schedule_rebuild();
            return Err(e);
        }
        Ok(())
    }

    fn schedule_rebuild(self: &Arc<Self>) {
        let mut pending = self.pending_timer();
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        self.state.store(RefreshState::Dirty);

        let epoch = self.timer_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let manager = Arc::downgrade(self);
        let quiet_period = self.quiet_period;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            Self::run_scheduled_rebuild(manager, epoch).await;
        }));
    }

    async fn run_scheduled_rebuild(manager: Weak<Self>, epoch: u64) {
        let Some(manager) = manager.upgrade() else {
            return;
        };

        {
            let mut pending = manager.pending_timer();
            if manager.timer_epoch.load(Ordering::SeqCst) != epoch {
                return;
            }
            // Detach so later edits arm a new timer instead of aborting this
            // rebuild.
            pending.take();
        }

        let cancel = CancellationToken::new();
        if let Err(e) = manager.rebuild(&cancel).await {
            warn!(
                "Scheduled relationship rebuild failed, retrying in {:?}: {}",
                manager.quiet_period, e
            );
            manager.schedule_rebuild();
        }
    }

    fn disarm_timer(&self) {
        let mut pending = self.pending_timer();
        self.timer_epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = pending.take() {
            handle.abort();
        }
    }

    async fn rebuild(&self, cancel: &CancellationToken) -> Result<()> {
        let _guard = self.rebuild_lock.lock().await;
        let started = Instant::now();
        self.state.store(RefreshState::Rebuilding);

        let graphs = match self.build_graphs(cancel).await {
            Ok(graphs) => graphs,
            Err(e) => {
                self.state.transition(RefreshState::Rebuilding, RefreshState::Dirty);
                return Err(e);
            }
        };

        let service_count = graphs.services.len();
        *self.lock_graphs()? = graphs;

        self.rebuild_count.fetch_add(1, Ordering::SeqCst);
        self.state.transition(RefreshState::Rebuilding, RefreshState::Clean);
        self.publish_rules_changed();

        info!(
            "Rebuilt tag relationships for {} services in {:?}",
            service_count,
            started.elapsed()
        );
        Ok(())
    }

    /// Read every service and resolve its graphs. Parent graphs are built
    /// for both sibling scopes so an options change never needs a rebuild.
    async fn build_graphs(&self, cancel: &CancellationToken) -> Result<Graphs> {
        let services = self.store.list_services(cancel).await?;

        let sibling_reads = try_join_all(
            services
                .iter()
                .map(|service| self.store.read_sibling_pairs(service, cancel)),
        )
        .await?;
        let parent_reads = try_join_all(
            services
                .iter()
                .map(|service| self.store.read_parent_pairs(service, cancel)),
        )
        .await?;
        cancel.check()?;

        let combined_groups: Vec<&Vec<SiblingPair>> = sibling_reads.iter().flatten().collect();
        let combined_siblings = Arc::new(resolve_siblings(&combined_groups));

        let mut graphs = Graphs::empty();
        let mut combined_pairs = Vec::new();
        for ((service, groups), pairs) in services.iter().zip(&sibling_reads).zip(&parent_reads) {
            let siblings = Arc::new(resolve_siblings(groups));
            let parents = resolve_parents(&collapse_parent_pairs(&siblings, pairs));

            let via_combined = collapse_parent_pairs(&combined_siblings, pairs);
            let parents_via_combined = resolve_parents(&via_combined);
            debug!(
                "Service {}: {} sibling mappings, {} tags with parents",
                service,
                siblings.len(),
                parents.len()
            );

            combined_pairs.extend(via_combined);
            graphs.siblings.insert(service.clone(), siblings);
            graphs.parents.insert(service.clone(), Arc::new(parents));
            graphs
                .parents_via_combined
                .insert(service.clone(), Arc::new(parents_via_combined));
        }

        graphs
            .parents
            .insert(ServiceId::combined(), Arc::new(resolve_parents(&combined_pairs)));
        graphs.siblings.insert(ServiceId::combined(), combined_siblings);
        graphs.services = services;
        Ok(graphs)
    }

    fn publish_rules_changed(&self) {
        self.rules_changed.send_modify(|generation| *generation += 1);
    }

    // === Options and status ===

    pub fn options(&self) -> TagOptions {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the options. Any change is published as a rules change so
    /// autocomplete snapshots taken under the old options are dropped.
    /// Lookups follow the new options immediately.
    pub fn set_options(&self, options: TagOptions) -> bool {
        let changed = {
            let mut current = self.options.write().unwrap_or_else(PoisonError::into_inner);
            let changed = *current != options;
            *current = options;
            changed
        };
        if changed {
            debug!("Tag options changed");
            self.publish_rules_changed();
        }
        changed
    }

    pub fn state(&self) -> RefreshState {
        self.state.load()
    }

    /// Real services as of the last successful rebuild.
    pub fn services(&self) -> Result<Vec<ServiceId>> {
        Ok(self.lock_graphs()?.services.clone())
    }

    /// Number of successful rebuilds so far.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> Result<ManagerStatus> {
        Ok(ManagerStatus {
            state: self.state(),
            services: self.services()?,
            rebuild_count: self.rebuild_count(),
            generation: *self.rules_changed.borrow(),
        })
    }

    // === Internals ===

    fn sibling_graph(&self, service: &ServiceId, scope: LookupScope) -> Result<Arc<SiblingGraph>> {
        let across_all = scope == LookupScope::FollowOptions
            && self.options().apply_siblings_across_all_services;
        let graphs = self.lock_graphs()?;
        graphs.check_known(service)?;
        if across_all {
            Ok(graphs.siblings_of(&ServiceId::combined()))
        } else {
            Ok(graphs.siblings_of(service))
        }
    }

    fn parent_graph(&self, service: &ServiceId, scope: LookupScope) -> Result<Arc<ParentGraph>> {
        let options = self.options();
        let follow = scope == LookupScope::FollowOptions;
        let graphs = self.lock_graphs()?;
        graphs.check_known(service)?;
        if follow && options.apply_parents_across_all_services {
            Ok(graphs.parents_of(&ServiceId::combined(), false))
        } else {
            Ok(graphs.parents_of(service, follow && options.apply_siblings_across_all_services))
        }
    }

    fn lock_graphs(&self) -> Result<MutexGuard<'_, Graphs>> {
        self.graphs
            .lock()
            .map_err(|_| TagRelError::Other("Relationship graph lock poisoned".to_string()))
    }

    fn pending_timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RelationshipCacheManager {
    fn drop(&mut self) {
        if let Some(handle) = self.pending_timer().take() {
            handle.abort();
        }
    }
}

/// Collapse both sides of each pair through `graph`, dropping duplicates.
fn collapse_parent_pairs(graph: &SiblingGraph, pairs: &[ParentPair]) -> Vec<ParentPair> {
    let mut seen = HashSet::new();
    pairs
        .iter()
        .map(|pair| ParentPair::new(graph.collapse(&pair.child), graph.collapse(&pair.parent)))
        .filter(|pair| seen.insert(pair.clone()))
        .collect()
}
