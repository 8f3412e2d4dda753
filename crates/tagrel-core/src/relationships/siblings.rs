//! Sibling resolution: ordered groups of `bad -> good` claims collapsed into a
//! flat `tag -> ideal` mapping.

use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::tags::SiblingPair;

/// Resolved siblings for one service.
///
/// Only tags that have a better alias appear as keys. Every value is an ideal
/// tag, so resolving a tag never needs more than one lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiblingGraph {
    ideals: HashMap<String, String>,
    aliases: HashMap<String, BTreeSet<String>>,
}

impl SiblingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_ideals(ideals: HashMap<String, String>) -> Self {
        let mut aliases: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (bad, ideal) in &ideals {
            aliases.entry(ideal.clone()).or_default().insert(bad.clone());
        }
        Self { ideals, aliases }
    }

    /// The ideal tag `tag` resolves to, if it has one.
    pub fn ideal(&self, tag: &str) -> Option<&str> {
        self.ideals.get(tag).map(String::as_str)
    }

    /// `tag` resolved to its ideal, or unchanged.
    pub fn collapse(&self, tag: &str) -> String {
        self.ideal(tag).unwrap_or(tag).to_string()
    }

    /// Every tag that resolves to `ideal`, excluding `ideal` itself.
    ///
    /// Never inserts; unknown tags get an empty iterator.
    pub fn aliases_of(&self, ideal: &str) -> impl Iterator<Item = &str> {
        self.aliases
            .get(ideal)
            .into_iter()
            .flat_map(|aliases| aliases.iter().map(String::as_str))
    }

    /// The alias group `tag` belongs to: its ideal first, then every alias of
    /// that ideal in lexicographic order. A tag with no siblings is its own
    /// group.
    pub fn group_of(&self, tag: &str) -> Vec<String> {
        let ideal = self.ideal(tag).unwrap_or(tag);
        std::iter::once(ideal)
            .chain(self.aliases_of(ideal))
            .map(str::to_string)
            .collect()
    }

    /// Iterate every `(bad, ideal)` mapping.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.ideals.iter().map(|(bad, ideal)| (bad.as_str(), ideal.as_str()))
    }

    pub fn len(&self) -> usize {
        self.ideals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ideals.is_empty()
    }
}

/// Collapse groups of sibling claims into a [`SiblingGraph`].
///
/// `groups` are in descending precedence. Within a group, pairs are processed
/// in `(bad, good)` order so that conflicting claims of equal precedence
/// always resolve the same way. A claim is dropped when it is a self-loop,
/// when its `bad` tag already has an accepted claim, or when accepting it
/// would close a cycle.
pub fn resolve_siblings<G>(groups: &[G]) -> SiblingGraph
where
    G: AsRef<[SiblingPair]>,
{
    let mut accepted: HashMap<String, String> = HashMap::new();

    for group in groups {
        let mut pairs: Vec<&SiblingPair> = group.as_ref().iter().collect();
        pairs.sort();

        for pair in pairs {
            if pair.bad == pair.good || accepted.contains_key(&pair.bad) {
                continue;
            }

            if chain_reaches(&accepted, &pair.good, &pair.bad) {
                debug!(
                    "Dropping sibling {} -> {}: would close a loop",
                    pair.bad, pair.good
                );
                continue;
            }

            accepted.insert(pair.bad.clone(), pair.good.clone());
        }
    }

    SiblingGraph::from_ideals(collapse_chains(&accepted))
}

/// Walk `start -> accepted[start] -> ...` and report whether `target` shows up.
fn chain_reaches(accepted: &HashMap<String, String>, start: &str, target: &str) -> bool {
    let mut current = start;
    while let Some(next) = accepted.get(current) {
        if next == target {
            return true;
        }
        current = next;
    }
    false
}

/// Turn `a -> b, b -> c` into `a -> c, b -> c`.
fn collapse_chains(accepted: &HashMap<String, String>) -> HashMap<String, String> {
    let mut ideals: HashMap<String, String> = HashMap::with_capacity(accepted.len());

    for bad in accepted.keys() {
        if ideals.contains_key(bad) {
            continue;
        }

        // Walk to the terminal tag, stopping early at a memoized hop.
        let mut path: Vec<&str> = vec![bad.as_str()];
        let mut current = bad.as_str();
        let terminal = loop {
            match accepted.get(current) {
                Some(next) => {
                    if let Some(known) = ideals.get(next.as_str()) {
                        break known.clone();
                    }
                    if !accepted.contains_key(next.as_str()) {
                        break next.clone();
                    }
                    path.push(next.as_str());
                    current = next.as_str();
                }
                None => break current.to_string(),
            }
        };

        for tag in path {
            ideals.insert(tag.to_string(), terminal.clone());
        }
    }

    ideals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<SiblingPair> {
        raw.iter().map(|(b, g)| SiblingPair::new(*b, *g)).collect()
    }

    #[test]
    fn test_chain_collapses_to_ideal() {
        let graph = resolve_siblings(&[pairs(&[("a", "b"), ("b", "c"), ("c", "d")])]);

        assert_eq!(graph.ideal("a"), Some("d"));
        assert_eq!(graph.ideal("b"), Some("d"));
        assert_eq!(graph.ideal("c"), Some("d"));
        assert_eq!(graph.ideal("d"), None);
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_values_are_fixed_points() {
        let graph = resolve_siblings(&[
            pairs(&[("lotr", "lord of the rings"), ("lord of the rings", "series:lotr")]),
            pairs(&[("series:lotr", "series:the lord of the rings"), ("x", "lotr")]),
        ]);

        for (_, ideal) in graph.iter() {
            assert_eq!(graph.collapse(ideal), ideal);
        }
        assert_eq!(graph.collapse("x"), "series:the lord of the rings");
    }

    #[test]
    fn test_cycle_drops_an_edge() {
        let graph = resolve_siblings(&[pairs(&[("a", "b"), ("b", "c"), ("c", "a")])]);

        // Sorted order accepts a->b and b->c; c->a would close the loop.
        assert_eq!(graph.ideal("a"), Some("c"));
        assert_eq!(graph.ideal("b"), Some("c"));
        assert_eq!(graph.ideal("c"), None);
    }

    #[test]
    fn test_self_loop_dropped() {
        let graph = resolve_siblings(&[pairs(&[("a", "a")])]);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_first_group_wins() {
        let graph = resolve_siblings(&[pairs(&[("bad", "x")]), pairs(&[("bad", "y")])]);
        assert_eq!(graph.ideal("bad"), Some("x"));
        assert_eq!(graph.group_of("y"), vec!["y".to_string()]);
    }

    #[test]
    fn test_same_group_tie_break_is_lexicographic() {
        let graph = resolve_siblings(&[pairs(&[("bad", "z"), ("bad", "m")])]);
        assert_eq!(graph.ideal("bad"), Some("m"));
    }

    #[test]
    fn test_opposite_directions_never_both() {
        let graph = resolve_siblings(&[pairs(&[("b", "a"), ("a", "b")])]);

        let forward = graph.ideal("a") == Some("b");
        let backward = graph.ideal("b") == Some("a");
        assert!(forward ^ backward);
    }

    #[test]
    fn test_later_group_cannot_close_loop() {
        let graph = resolve_siblings(&[pairs(&[("a", "b")]), pairs(&[("b", "a")])]);
        assert_eq!(graph.ideal("a"), Some("b"));
        assert_eq!(graph.ideal("b"), None);
    }

    #[test]
    fn test_group_of() {
        let graph = resolve_siblings(&[pairs(&[("samus", "samus aran"), ("aran", "samus aran")])]);

        let expected: Vec<String> = ["samus aran", "aran", "samus"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(graph.group_of("samus"), expected);
        assert_eq!(graph.group_of("samus aran"), expected);
        assert_eq!(graph.group_of("zelda"), vec!["zelda".to_string()]);
        assert_eq!(graph.aliases_of("zelda").count(), 0);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let chain: Vec<SiblingPair> = (0..50_000)
            .map(|i| SiblingPair::new(format!("t{:06}", i), format!("t{:06}", i + 1)))
            .collect();
        let graph = resolve_siblings(&[chain]);
        assert_eq!(graph.ideal("t000000"), Some("t050000"));
        assert_eq!(graph.ideal("t049999"), Some("t050000"));
    }
}
