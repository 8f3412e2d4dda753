//! Snapshots of fetched autocomplete results and the rules for reusing them.
//!
//! A snapshot answers a later query only when its predicates are guaranteed
//! to be a superset of what the store would return. Whenever that is unclear
//! the answer is "cannot serve" and the caller fetches again.

use tracing::warn;

use super::matching::TextMatcher;
use super::query::AutocompleteQuery;
use crate::config::TagOptions;
use crate::predicate::Predicate;
use crate::tags::ServiceId;

/// An immutable autocomplete result set plus the state that produced it.
#[derive(Debug, Clone, Default)]
pub enum ResultCache {
    /// Nothing fetched yet, or explicitly invalidated.
    #[default]
    Empty,
    /// The listing for a blank query.
    SystemOnly {
        service: ServiceId,
        predicates: Vec<Predicate>,
    },
    /// Tags counted from the current media selection. The owner discards it
    /// when the selection changes.
    MediaSelection {
        service: ServiceId,
        predicates: Vec<Predicate>,
        /// Options the text filter follows.
        options: TagOptions,
    },
    /// Results of a tag-text fetch.
    TagText {
        service: ServiceId,
        predicates: Vec<Predicate>,
        query: AutocompleteQuery,
        was_exact_match: bool,
        /// Options in force when the fetch ran.
        options: TagOptions,
    },
}

impl ResultCache {
    /// Whether this snapshot can answer `query` without a store round-trip.
    pub fn can_serve(&self, query: &AutocompleteQuery, exact_match_requested: bool) -> bool {
        match self {
            ResultCache::Empty => false,
            ResultCache::SystemOnly { .. } => query.is_blank(),
            ResultCache::MediaSelection { .. } => true,
            ResultCache::TagText {
                query: original,
                was_exact_match,
                options,
                ..
            } => tag_text_can_serve(original, *was_exact_match, options, query, exact_match_requested),
        }
    }

    /// Re-derive the predicates matching `search_text` from this snapshot.
    ///
    /// A snapshot taken for another service yields nothing.
    pub fn filter(&self, service: &ServiceId, search_text: &str) -> Vec<Predicate> {
        match self {
            ResultCache::Empty => Vec::new(),
            ResultCache::SystemOnly {
                service: cached,
                predicates,
            } => {
                if cached == service {
                    predicates.clone()
                } else {
                    Vec::new()
                }
            }
            ResultCache::MediaSelection {
                service: cached,
                predicates,
                options,
            }
            | ResultCache::TagText {
                service: cached,
                predicates,
                options,
                ..
            } => {
                if cached == service {
                    filter_by_text(predicates, search_text, options)
                } else {
                    Vec::new()
                }
            }
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        match self {
            ResultCache::Empty => &[],
            ResultCache::SystemOnly { predicates, .. }
            | ResultCache::MediaSelection { predicates, .. }
            | ResultCache::TagText { predicates, .. } => predicates,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ResultCache::Empty)
    }
}

fn tag_text_can_serve(
    original: &AutocompleteQuery,
    was_exact_match: bool,
    options: &TagOptions,
    query: &AutocompleteQuery,
    exact_match_requested: bool,
) -> bool {
    if query.is_blank() {
        return false;
    }

    if was_exact_match {
        return exact_match_requested && query.text() == original.text();
    }

    if original.is_fetch_all() {
        return options.fetch_all_allowed;
    }

    let (original_namespace, original_subtag) = (original.namespace(), original.subtag());
    let (namespace, subtag) = (query.namespace(), query.subtag());

    // "char" then "character:samus": the first fetch only covered the
    // namespace if namespaces were searched as full tags.
    if !namespace.is_empty() && original_namespace.is_empty() && namespace.starts_with(original_subtag) {
        return options.search_namespaces_into_full_tags;
    }

    if namespace != original_namespace {
        return false;
    }

    if original.is_namespace_bare() {
        return options.namespace_bare_fetch_all_allowed;
    }

    if original.is_namespace_fetch_all() {
        return options.namespace_fetch_all_allowed;
    }

    subtag.starts_with(original_subtag)
}

fn filter_by_text(
    predicates: &[Predicate],
    search_text: &str,
    options: &TagOptions,
) -> Vec<Predicate> {
    if search_text.is_empty() {
        return predicates.to_vec();
    }

    let matcher = match TextMatcher::new(search_text, options) {
        Ok(matcher) => matcher,
        Err(e) => {
            warn!("Cannot filter cached predicates: {}", e);
            return Vec::new();
        }
    };

    predicates
        .iter()
        .filter(|predicate| {
            predicate
                .tag_value()
                .map(|tag| matcher.matches_tag(tag))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}
