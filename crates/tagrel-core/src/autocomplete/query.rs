//! Normalization of raw type-ahead text.

use serde::{Deserialize, Serialize};

use super::matching::WILDCARD;
use crate::config::{AutocompleteConfig, TagOptions};
use crate::tags::split_tag;

/// Leading character that turns a query into an exclusion.
const EXCLUDE_PREFIX: char = '-';

/// One keystroke's worth of search text, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutocompleteQuery {
    /// Lower-cased, trimmed, whitespace-collapsed text without the exclusion
    /// prefix or any automatic trailing wildcard.
    text: String,
    inclusive: bool,
    exact_match_requested: bool,
}

impl AutocompleteQuery {
    pub fn parse(raw: &str, options: &TagOptions) -> Self {
        let mut text = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let mut inclusive = true;
        if let Some(stripped) = text.strip_prefix(EXCLUDE_PREFIX) {
            inclusive = false;
            text = stripped.trim_start().to_string();
        }

        // Only the subtag counts towards the threshold, and wildcard or
        // whole-namespace queries are never exact.
        let subtag = split_tag(&text).1;
        let exact_match_requested = !subtag.is_empty()
            && !text.contains(WILDCARD)
            && options.wants_exact_match(subtag.chars().count());

        Self {
            text,
            inclusive,
            exact_match_requested,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn inclusive(&self) -> bool {
        self.inclusive
    }

    pub fn exact_match_requested(&self) -> bool {
        self.exact_match_requested
    }

    pub fn namespace(&self) -> &str {
        split_tag(&self.text).0
    }

    pub fn subtag(&self) -> &str {
        split_tag(&self.text).1
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }

    /// `*`: every tag.
    pub fn is_fetch_all(&self) -> bool {
        self.text == AutocompleteConfig::FETCH_ALL_TEXT
    }

    /// `ns:`: every tag in a namespace.
    pub fn is_namespace_bare(&self) -> bool {
        !self.namespace().is_empty() && self.subtag().is_empty()
    }

    /// `ns:*`: every tag in a namespace, spelled with a wildcard.
    pub fn is_namespace_fetch_all(&self) -> bool {
        !self.namespace().is_empty() && self.subtag() == AutocompleteConfig::FETCH_ALL_TEXT
    }

    /// Text to hand to the store or the local filter.
    ///
    /// Prefix searches get a trailing wildcard; exact searches and bare
    /// namespaces do not.
    pub fn search_text(&self) -> String {
        if self.exact_match_requested
            || self.is_namespace_bare()
            || self.text.ends_with(WILDCARD)
        {
            self.text.clone()
        } else {
            format!("{}{}", self.text, WILDCARD)
        }
    }
}
