//! The external tag store, seen from the relationship core.
//!
//! The core never writes relationships; it reads them wholesale during a
//! rebuild and asks for autocomplete results when no cached snapshot can
//! answer. Every read takes a [`CancellationToken`] and is expected to check
//! it before doing slow work.

mod memory;

pub use memory::{MemoryStore, ServiceRecord, StoreSnapshot};

use async_trait::async_trait;

use crate::cancel::CancellationToken;
use crate::config::TagOptions;
use crate::error::Result;
use crate::predicate::Predicate;
use crate::tags::{ParentPair, ServiceId, SiblingPair};

/// Read access to relationship and tag-count data.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Every real service, highest precedence first.
    async fn list_services(&self, cancel: &CancellationToken) -> Result<Vec<ServiceId>>;

    /// Sibling pairs of one service, grouped by source, highest precedence
    /// group first.
    async fn read_sibling_pairs(
        &self,
        service: &ServiceId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<SiblingPair>>>;

    /// Parent pairs of one service at current and pending status.
    ///
    /// Pairs are returned raw; sibling collapsing is the caller's job.
    async fn read_parent_pairs(
        &self,
        service: &ServiceId,
        cancel: &CancellationToken,
    ) -> Result<Vec<ParentPair>>;

    /// Tag predicates matching `search_text`.
    ///
    /// With `exact_match`, only tags matching the text exactly are returned;
    /// otherwise the text follows the rules of
    /// [`TextMatcher`](crate::autocomplete::TextMatcher).
    async fn read_autocomplete_predicates(
        &self,
        service: &ServiceId,
        search_text: &str,
        exact_match: bool,
        options: &TagOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Predicate>>;

    /// System predicates offered for a blank query.
    async fn read_system_predicates(
        &self,
        service: &ServiceId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Predicate>>;
}
