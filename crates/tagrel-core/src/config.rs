//! Centralized configuration for the tag relationship core.
//!
//! Constants live on unit structs grouped by subsystem. User-editable flags
//! live in [`TagOptions`], which can be loaded from a JSON file.

use crate::error::{Result, TagRelError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Relationship cache configuration.
pub struct RelationshipConfig;

impl RelationshipConfig {
    /// Quiet period after the last edit notification before a rebuild runs.
    pub const REBUILD_QUIET_PERIOD: Duration = Duration::from_secs(8);
    /// Reserved key of the synthetic service that unions every real service.
    pub const COMBINED_SERVICE_KEY: &'static str = "all known tags";
}

/// Autocomplete configuration.
pub struct AutocompleteConfig;

impl AutocompleteConfig {
    /// Queries this short (in characters) only fetch exact matches by default.
    pub const DEFAULT_EXACT_MATCH_THRESHOLD: usize = 2;
    /// Search text meaning "every tag".
    pub const FETCH_ALL_TEXT: &'static str = "*";
}

/// RPC server configuration.
pub struct RpcConfig;

impl RpcConfig {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_SESSION: &'static str = "default";
    /// Open autocomplete sessions per server.
    pub const MAX_SESSIONS: usize = 256;
}

/// User-editable flags that change how relationships are applied and how
/// aggressively autocomplete reuses cached results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct TagOptions {
    /// Resolve siblings through the combined graph for every service.
    pub apply_siblings_across_all_services: bool,
    /// Resolve parents through the combined graph for every service.
    pub apply_parents_across_all_services: bool,
    /// A cached `ns:` fetch may answer any later `ns:...` query.
    pub namespace_bare_fetch_all_allowed: bool,
    /// A cached `ns:*` fetch may answer any later `ns:...` query.
    pub namespace_fetch_all_allowed: bool,
    /// A cached `*` fetch may answer any later query.
    pub fetch_all_allowed: bool,
    /// Typing a namespace's prefix also finds tags inside that namespace.
    pub search_namespaces_into_full_tags: bool,
    /// Queries up to this many characters only fetch exact matches.
    pub exact_match_character_threshold: Option<usize>,
}

impl Default for TagOptions {
    fn default() -> Self {
        Self {
            apply_siblings_across_all_services: false,
            apply_parents_across_all_services: false,
            namespace_bare_fetch_all_allowed: false,
            namespace_fetch_all_allowed: false,
            fetch_all_allowed: false,
            search_namespaces_into_full_tags: false,
            exact_match_character_threshold: Some(AutocompleteConfig::DEFAULT_EXACT_MATCH_THRESHOLD),
        }
    }
}

impl TagOptions {
    /// Load options from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| TagRelError::io_with_path(e, path))?;
        serde_json::from_str(&contents).map_err(|e| TagRelError::Config {
            message: format!("Invalid options file {}: {}", path.display(), e),
        })
    }

    /// Whether a query of `char_count` characters should only fetch exact matches.
    pub fn wants_exact_match(&self, char_count: usize) -> bool {
        self.exact_match_character_threshold
            .map(|threshold| char_count <= threshold)
            .unwrap_or(false)
    }
}
