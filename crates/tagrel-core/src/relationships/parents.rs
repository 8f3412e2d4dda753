//! Parent resolution: `child -> parent` claims turned into a cycle-free
//! `child -> ancestors` mapping with full transitive closure.

use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::tags::ParentPair;

/// Direct (one hop) parents, before transitive expansion.
///
/// Each child's parents keep the order their pairs were declared in.
#[derive(Debug, Clone, Default)]
pub struct DirectParents {
    parents: HashMap<String, Vec<String>>,
}

impl DirectParents {
    /// Direct parents of `tag`; empty for unknown tags.
    pub fn of(&self, tag: &str) -> &[String] {
        self.parents.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Resolved parents for one service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentGraph {
    ancestors: HashMap<String, Vec<String>>,
}

impl ParentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// All ancestors of `tag`, nearest first. Empty for unknown tags.
    pub fn parents(&self, tag: &str) -> &[String] {
        self.ancestors.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.ancestors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ancestors.is_empty()
    }
}

/// Build the one-hop parent graph, dropping self-loops and any pair that
/// would make a tag its own ancestor.
pub fn build_direct_parents<'a>(pairs: impl IntoIterator<Item = &'a ParentPair>) -> DirectParents {
    let mut direct = DirectParents::default();

    for pair in pairs {
        if pair.child == pair.parent {
            continue;
        }

        if would_loop(&direct, &pair.child, &pair.parent) {
            debug!(
                "Dropping parent {} -> {}: would close a loop",
                pair.child, pair.parent
            );
            continue;
        }

        let parents = direct.parents.entry(pair.child.clone()).or_default();
        if !parents.contains(&pair.parent) {
            parents.push(pair.parent.clone());
        }
    }

    direct
}

/// Whether adding `child -> candidate_parent` would let `child` reach itself.
///
/// Walks breadth-first from the candidate's own parents.
pub fn would_loop(graph: &DirectParents, child: &str, candidate_parent: &str) -> bool {
    let mut queue: VecDeque<&str> = graph.of(candidate_parent).iter().map(String::as_str).collect();
    let mut visited: HashSet<&str> = HashSet::new();

    while let Some(tag) = queue.pop_front() {
        if tag == child {
            return true;
        }
        if !visited.insert(tag) {
            continue;
        }
        queue.extend(graph.of(tag).iter().map(String::as_str));
    }

    false
}

/// Expand every child's direct parents into its full ancestor list.
///
/// For each tag, its direct parents are appended as a group in declaration
/// order, then each of those parents is expanded the same way, in order.
/// `a -> [mother, father], mother -> [grandmother]` therefore yields
/// `[mother, father, grandmother]`. Tags already present are skipped.
pub fn expand_transitively(direct: &DirectParents) -> ParentGraph {
    let ancestors = direct
        .parents
        .keys()
        .map(|child| (child.clone(), expand_one(direct, child)))
        .collect();

    ParentGraph { ancestors }
}

fn expand_one(direct: &DirectParents, child: &str) -> Vec<String> {
    let mut ancestors: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut expanded: HashSet<&str> = HashSet::new();

    // Each frame is a group whose members still need their own parents
    // expanded, plus the index of the next member to descend into.
    let root = direct.of(child);
    append_group(root, child, &mut seen, &mut ancestors);
    let mut stack: Vec<(&[String], usize)> = vec![(root, 0)];

    while let Some(frame) = stack.last_mut() {
        let (group, next) = *frame;
        if next >= group.len() {
            stack.pop();
            continue;
        }
        frame.1 += 1;

        let parent = group[next].as_str();
        if !expanded.insert(parent) {
            continue;
        }

        let grandparents = direct.of(parent);
        if !grandparents.is_empty() {
            append_group(grandparents, child, &mut seen, &mut ancestors);
            stack.push((grandparents, 0));
        }
    }

    ancestors
}

fn append_group<'a>(
    group: &'a [String],
    child: &str,
    seen: &mut HashSet<&'a str>,
    ancestors: &mut Vec<String>,
) {
    for parent in group {
        if parent != child && seen.insert(parent.as_str()) {
            ancestors.push(parent.clone());
        }
    }
}

/// Build and expand in one go.
pub fn resolve_parents<'a>(pairs: impl IntoIterator<Item = &'a ParentPair>) -> ParentGraph {
    expand_transitively(&build_direct_parents(pairs))
}
