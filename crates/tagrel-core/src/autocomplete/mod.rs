//! Search-as-you-type support.
//!
//! - [`query`]: normalizing raw keystrokes
//! - [`matching`]: the text-match rule shared with the store
//! - [`cache`]: snapshots and when they can answer a refined query
//! - [`session`]: the per-search-box coordinator

pub mod cache;
pub mod matching;
pub mod query;
pub mod session;

pub use cache::ResultCache;
pub use matching::{is_exact_match, TextMatcher};
pub use query::AutocompleteQuery;
pub use session::AutocompleteSession;
