//! One search box's worth of autocomplete state.
//!
//! A session owns the current result snapshot and the token of the single
//! fetch it allows in flight. Each lookup either filters the snapshot locally
//! or replaces it with a fresh fetch from the store.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::debug;

use super::cache::ResultCache;
use super::matching::is_exact_match;
use super::query::AutocompleteQuery;
use crate::cancel::{CancellationSlot, CancellationToken};
use crate::config::TagOptions;
use crate::error::Result;
use crate::manager::RelationshipCacheManager;
use crate::predicate::{Predicate, PredicateCount};
use crate::store::RelationshipStore;
use crate::tags::ServiceId;

pub struct AutocompleteSession {
    service: ServiceId,
    store: Arc<dyn RelationshipStore>,
    manager: Arc<RelationshipCacheManager>,
    /// Snapshots hold raw store results; sibling collapsing happens on the
    /// way out so a rules change never makes a snapshot wrong.
    cache: RwLock<Arc<ResultCache>>,
    rules: Mutex<watch::Receiver<u64>>,
    in_flight: CancellationSlot,
}

impl AutocompleteSession {
    pub fn new(
        service: ServiceId,
        store: Arc<dyn RelationshipStore>,
        manager: Arc<RelationshipCacheManager>,
    ) -> Self {
        let rules = manager.subscribe();
        Self {
            service,
            store,
            manager,
            cache: RwLock::new(Arc::new(ResultCache::Empty)),
            rules: Mutex::new(rules),
            in_flight: CancellationSlot::new(),
        }
    }

    pub fn service(&self) -> &ServiceId {
        &self.service
    }

    /// Predicates for one keystroke's worth of text.
    ///
    /// Starting a lookup cancels the previous one; a cancelled lookup returns
    /// [`TagRelError::Cancelled`](crate::error::TagRelError::Cancelled) and
    /// never publishes its results.
    pub async fn lookup(&self, text: &str) -> Result<Vec<Predicate>> {
        self.drop_stale_snapshot();

        let options = self.manager.options();
        let query = AutocompleteQuery::parse(text, &options);
        let cancel = self.in_flight.replace();

        let raw = if query.is_blank() {
            self.blank_results(&query, &cancel).await?
        } else {
            self.tag_results(&query, &options, &cancel).await?
        };

        let collapsed = self.manager.collapse_predicates(&self.service, raw)?;
        cancel.check()?;

        let inclusive = query.inclusive();
        Ok(collapsed
            .into_iter()
            .map(|predicate| {
                if predicate.is_system() {
                    predicate
                } else {
                    predicate.with_inclusive(inclusive)
                }
            })
            .collect())
    }

    async fn blank_results(
        &self,
        query: &AutocompleteQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Predicate>> {
        let cache = self.current();
        if cache.can_serve(query, false) {
            return Ok(cache.filter(&self.service, ""));
        }

        let predicates = self.store.read_system_predicates(&self.service, cancel).await?;
        cancel.check()?;

        self.publish(
            ResultCache::SystemOnly {
                service: self.service.clone(),
                predicates: predicates.clone(),
            },
            cancel,
        )?;
        Ok(predicates)
    }

    async fn tag_results(
        &self,
        query: &AutocompleteQuery,
        options: &TagOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Predicate>> {
        let exact_match = query.exact_match_requested();
        let search_text = query.search_text();

        let cache = self.current();
        if cache.can_serve(query, exact_match) {
            debug!("Serving {:?} from cached results", query.text());
            let mut predicates = cache.filter(&self.service, &search_text);
            if exact_match {
                predicates.retain(|predicate| {
                    predicate
                        .tag_value()
                        .map(|tag| is_exact_match(query.text(), tag))
                        .unwrap_or(false)
                });
            }
            return Ok(predicates);
        }

        debug!("Fetching {:?} from store (exact: {})", search_text, exact_match);
        let predicates = self
            .store
            .read_autocomplete_predicates(&self.service, &search_text, exact_match, options, cancel)
            .await?;
        cancel.check()?;

        self.publish(
            ResultCache::TagText {
                service: self.service.clone(),
                predicates: predicates.clone(),
                query: query.clone(),
                was_exact_match: exact_match,
                options: options.clone(),
            },
            cancel,
        )?;
        Ok(predicates)
    }

    /// Replace the snapshot with tag counts from a media selection. Later
    /// lookups filter these counts until the selection is cleared.
    pub fn set_media_selection<I, S>(&self, tag_counts: I)
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        self.in_flight.cancel();
        let predicates = tag_counts
            .into_iter()
            .map(|(tag, count)| Predicate::tag(tag).with_count(PredicateCount::exact(count, 0)))
            .collect();
        self.replace(ResultCache::MediaSelection {
            service: self.service.clone(),
            predicates,
            options: self.manager.options(),
        });
    }

    pub fn clear_media_selection(&self) {
        if matches!(*self.current(), ResultCache::MediaSelection { .. }) {
            self.invalidate();
        }
    }

    /// Forget the snapshot; the next lookup goes to the store.
    pub fn invalidate(&self) {
        self.in_flight.cancel();
        self.replace(ResultCache::Empty);
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<ResultCache> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop fetched snapshots if display rules changed since the last lookup.
    /// A media selection is kept: it holds raw tags and is collapsed on output,
    /// so it only picks up the current options.
    fn drop_stale_snapshot(&self) {
        let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        if !rules.has_changed().unwrap_or(false) {
            return;
        }
        let _ = rules.borrow_and_update();

        match &*self.current() {
            ResultCache::MediaSelection {
                service,
                predicates,
                ..
            } => self.replace(ResultCache::MediaSelection {
                service: service.clone(),
                predicates: predicates.clone(),
                options: self.manager.options(),
            }),
            _ => {
                debug!("Tag display rules changed, dropping cached results");
                self.replace(ResultCache::Empty);
            }
        }
    }

    fn publish(&self, snapshot: ResultCache, cancel: &CancellationToken) -> Result<()> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cancel.check()?;
        *cache = Arc::new(snapshot);
        Ok(())
    }

    fn replace(&self, snapshot: ResultCache) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }
}
