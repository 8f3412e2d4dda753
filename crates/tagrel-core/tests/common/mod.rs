//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tagrel_core::{
    CancellationToken, MemoryStore, ParentPair, Predicate, RelationshipStore, Result, ServiceId,
    SiblingPair, TagOptions, TagRelError,
};

pub fn local() -> ServiceId {
    ServiceId::new("my tags")
}

pub fn remote() -> ServiceId {
    ServiceId::new("public tag repo")
}

/// A [`MemoryStore`] that counts reads, can be switched to failing, and can
/// slow down rebuild reads or autocomplete fetches.
#[derive(Default)]
pub struct InstrumentedStore {
    pub inner: MemoryStore,
    pub fail: AtomicBool,
    pub list_calls: AtomicUsize,
    pub autocomplete_calls: AtomicUsize,
    pub fetch_delay: Option<Duration>,
    pub rebuild_delay: Option<Duration>,
    /// Finish autocomplete fetches even after their token is cancelled.
    pub ignore_cancel: bool,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.inner.add_service(local()).unwrap();
        store.inner.add_service(remote()).unwrap();
        store
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn with_rebuild_delay(mut self, delay: Duration) -> Self {
        self.rebuild_delay = Some(delay);
        self
    }

    pub fn ignoring_cancellation(mut self) -> Self {
        self.ignore_cancel = true;
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn autocomplete_calls(&self) -> usize {
        self.autocomplete_calls.load(Ordering::SeqCst)
    }

    fn check_failing(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(TagRelError::store("store offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RelationshipStore for InstrumentedStore {
    async fn list_services(&self, cancel: &CancellationToken) -> Result<Vec<ServiceId>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.rebuild_delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failing()?;
        self.inner.list_services(cancel).await
    }

    async fn read_sibling_pairs(
        &self,
        service: &ServiceId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<SiblingPair>>> {
        self.check_failing()?;
        self.inner.read_sibling_pairs(service, cancel).await
    }

    async fn read_parent_pairs(
        &self,
        service: &ServiceId,
        cancel: &CancellationToken,
    ) -> Result<Vec<ParentPair>> {
        self.check_failing()?;
        self.inner.read_parent_pairs(service, cancel).await
    }

    async fn read_autocomplete_predicates(
        &self,
        service: &ServiceId,
        search_text: &str,
        exact_match: bool,
        options: &TagOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Predicate>> {
        self.autocomplete_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        let uncancelled = CancellationToken::new();
        let cancel = if self.ignore_cancel { &uncancelled } else { cancel };
        self.inner
            .read_autocomplete_predicates(service, search_text, exact_match, options, cancel)
            .await
    }

    async fn read_system_predicates(
        &self,
        service: &ServiceId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Predicate>> {
        self.inner.read_system_predicates(service, cancel).await
    }
}
