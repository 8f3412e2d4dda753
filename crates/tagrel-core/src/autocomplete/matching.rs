//! The text-match rule shared by the local cache filter and the store.
//!
//! A cached superset is only safe to filter locally if the filter agrees with
//! what the store would have returned, so both sides go through
//! [`TextMatcher`].

use regex::Regex;

use crate::config::{AutocompleteConfig, TagOptions};
use crate::error::{Result, TagRelError};
use crate::tags::split_tag;

/// Wildcard in search text, matching any run of characters.
pub const WILDCARD: char = '*';

/// Compiled form of one search text.
///
/// - `*` matches any characters
/// - the match must start at a tag boundary (start, `:`, whitespace) unless
///   the text begins with `*`
/// - the match must end at end-of-string or whitespace unless the text ends
///   with `*`
/// - `namespace:subtag` text requires that exact namespace and applies the
///   rules above to the subtag only; a bare `namespace:` matches every tag in
///   the namespace
/// - unnamespaced text only sees the namespace part of a tag when
///   `search_namespaces_into_full_tags` is set
#[derive(Debug, Clone)]
pub struct TextMatcher {
    namespace: Option<String>,
    full_tags: bool,
    regex: Regex,
}

impl TextMatcher {
    pub fn new(search_text: &str, options: &TagOptions) -> Result<Self> {
        let (namespace, subtag) = split_tag(search_text);

        let (namespace, pattern_text) = if namespace.is_empty() || namespace.contains(WILDCARD) {
            (None, search_text)
        } else if subtag.is_empty() {
            (Some(namespace.to_string()), AutocompleteConfig::FETCH_ALL_TEXT)
        } else {
            (Some(namespace.to_string()), subtag)
        };

        let regex = Regex::new(&build_pattern(pattern_text)).map_err(|e| {
            TagRelError::InvalidParams {
                message: format!("Unusable search text {:?}: {}", search_text, e),
            }
        })?;

        Ok(Self {
            namespace,
            full_tags: options.search_namespaces_into_full_tags,
            regex,
        })
    }

    pub fn matches_tag(&self, tag: &str) -> bool {
        match &self.namespace {
            Some(namespace) => {
                let (tag_namespace, tag_subtag) = split_tag(tag);
                tag_namespace == namespace && self.regex.is_match(tag_subtag)
            }
            None if self.full_tags => self.regex.is_match(tag),
            None => self.regex.is_match(split_tag(tag).1),
        }
    }
}

/// Whether the options permit fetching for `search_text` at all.
///
/// `*`, `ns:` and `ns:*` list whole tag spaces and are each gated by their
/// own option. The store returns nothing for a gated search.
pub fn fetch_permitted(search_text: &str, options: &TagOptions) -> bool {
    let (namespace, subtag) = split_tag(search_text);
    if namespace.is_empty() {
        subtag != AutocompleteConfig::FETCH_ALL_TEXT || options.fetch_all_allowed
    } else if subtag.is_empty() {
        options.namespace_bare_fetch_all_allowed
    } else if subtag == AutocompleteConfig::FETCH_ALL_TEXT {
        options.namespace_fetch_all_allowed
    } else {
        true
    }
}

fn build_pattern(text: &str) -> String {
    let body = text
        .split(WILDCARD)
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    let start = if text.starts_with(WILDCARD) {
        ""
    } else {
        r"(?:\A|:|\s)"
    };
    let end = if text.ends_with(WILDCARD) {
        ""
    } else {
        r"(?:\s|\z)"
    };

    format!("(?s){}{}{}", start, body, end)
}

/// Exact-match rule: unnamespaced text matches a tag whose subtag is exactly
/// the text, in any namespace; namespaced text must equal the tag.
pub fn is_exact_match(search_text: &str, tag: &str) -> bool {
    let (namespace, _) = split_tag(search_text);
    if namespace.is_empty() {
        split_tag(tag).1 == search_text
    } else {
        tag == search_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(search: &str, tag: &str) -> bool {
        TextMatcher::new(search, &TagOptions::default())
            .unwrap()
            .matches_tag(tag)
    }

    fn matches_full(search: &str, tag: &str) -> bool {
        let options = TagOptions {
            search_namespaces_into_full_tags: true,
            ..TagOptions::default()
        };
        TextMatcher::new(search, &options).unwrap().matches_tag(tag)
    }

    #[test]
    fn test_prefix_match_at_boundaries() {
        assert!(matches("sam*", "samus aran"));
        assert!(matches("sam*", "character:samus aran"));
        assert!(matches("ara*", "samus aran"));
        assert!(!matches("amus*", "samus aran"));
    }

    #[test]
    fn test_leading_wildcard_matches_anywhere() {
        assert!(matches("*amus*", "samus aran"));
        assert!(matches("*aran", "samus aran"));
        assert!(!matches("*ara", "samus aran"));
    }

    #[test]
    fn test_end_anchor() {
        assert!(matches("samus", "samus"));
        assert!(matches("samus", "samus aran"));
        assert!(!matches("samus", "samuses"));
    }

    #[test]
    fn test_inner_wildcard() {
        assert!(matches("s*s*", "samus aran"));
        assert!(matches("s*n", "samus aran"));
        assert!(!matches("s*x", "samus aran"));
    }

    #[test]
    fn test_namespace_must_match_exactly() {
        assert!(matches("character:sam*", "character:samus aran"));
        assert!(!matches("character:sam*", "series:samus"));
        assert!(!matches("character:sam*", "samus"));
        assert!(!matches("char:sam*", "character:samus"));
        assert!(matches("character:*", "character:anything"));
        assert!(matches("character:", "character:anything"));
        assert!(!matches("character:", "series:anything"));
    }

    #[test]
    fn test_namespace_text_only_searched_when_enabled() {
        assert!(!matches("char*", "character:samus aran"));
        assert!(matches("char*", "char"));
        assert!(matches_full("char*", "character:samus aran"));
        assert!(matches_full("sam*", "character:samus aran"));
    }

    #[test]
    fn test_fetch_permissions() {
        let closed = TagOptions::default();
        assert!(!fetch_permitted("*", &closed));
        assert!(!fetch_permitted("series:", &closed));
        assert!(!fetch_permitted("series:*", &closed));
        assert!(fetch_permitted("sam*", &closed));
        assert!(fetch_permitted("series:sam*", &closed));

        let open = TagOptions {
            fetch_all_allowed: true,
            namespace_bare_fetch_all_allowed: true,
            namespace_fetch_all_allowed: false,
            ..TagOptions::default()
        };
        assert!(fetch_permitted("*", &open));
        assert!(fetch_permitted("series:", &open));
        assert!(!fetch_permitted("series:*", &open));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(matches("c++*", "c++ programming"));
        assert!(!matches("c.*", "cat"));
        assert!(matches("(rating)*", "(rating) safe"));
    }

    #[test]
    fn test_exact_match() {
        assert!(is_exact_match("samus", "samus"));
        assert!(is_exact_match("samus", "character:samus"));
        assert!(!is_exact_match("samus", "samus aran"));
        assert!(is_exact_match("character:samus", "character:samus"));
        assert!(!is_exact_match("character:samus", "series:samus"));
    }
}
