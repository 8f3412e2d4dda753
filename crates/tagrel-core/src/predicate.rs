//! Structured search predicates.
//!
//! Predicates are produced elsewhere (search parsers, the tag store). This
//! module only cares about what the relationship and autocomplete layers
//! need: the kind, the value, inclusiveness, and merging counts when two
//! equivalent predicates are de-duplicated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// File counts attached to a predicate.
///
/// Counts from different sources may overlap, so merged counts are a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateCount {
    pub min_current: u64,
    pub max_current: u64,
    pub min_pending: u64,
    pub max_pending: u64,
}

impl PredicateCount {
    /// An exact count with no overlap uncertainty.
    pub fn exact(current: u64, pending: u64) -> Self {
        Self {
            min_current: current,
            max_current: current,
            min_pending: pending,
            max_pending: pending,
        }
    }

    /// Merge another count into this one.
    ///
    /// The minimum is the larger of the two minimums; the maximum assumes no
    /// overlap and sums, saturating at `u64::MAX`.
    pub fn merge(&mut self, other: &PredicateCount) {
        self.min_current = self.min_current.max(other.min_current);
        self.max_current = self.max_current.saturating_add(other.max_current);
        self.min_pending = self.min_pending.max(other.min_pending);
        self.max_pending = self.max_pending.saturating_add(other.max_pending);
    }
}

/// An opaque system condition (file size, import time, ...), as handed over
/// by the system-predicate parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemPredicate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// What a predicate tests for, one variant per kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PredicateValue {
    Tag(String),
    /// Synthetic entry added under a tag to show one of its parents.
    Parent(String),
    Namespace(String),
    Wildcard(String),
    System(SystemPredicate),
    Or(Vec<Predicate>),
}

/// A structured search term.
///
/// Equality and hashing ignore `count`, so equivalent predicates from
/// different sources compare equal and can be merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predicate {
    pub value: PredicateValue,
    #[serde(default = "default_inclusive")]
    pub inclusive: bool,
    #[serde(default)]
    pub count: PredicateCount,
}

fn default_inclusive() -> bool {
    true
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.inclusive == other.inclusive
    }
}

impl Eq for Predicate {}

impl Hash for Predicate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
        self.inclusive.hash(state);
    }
}

impl Predicate {
    pub fn new(value: PredicateValue) -> Self {
        Self {
            value,
            inclusive: true,
            count: PredicateCount::default(),
        }
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Self::new(PredicateValue::Tag(tag.into()))
    }

    pub fn parent(tag: impl Into<String>) -> Self {
        Self::new(PredicateValue::Parent(tag.into()))
    }

    pub fn system(name: impl Into<String>) -> Self {
        Self::new(PredicateValue::System(SystemPredicate {
            name: name.into(),
            condition: None,
        }))
    }

    pub fn with_count(mut self, count: PredicateCount) -> Self {
        self.count = count;
        self
    }

    pub fn with_inclusive(mut self, inclusive: bool) -> Self {
        self.inclusive = inclusive;
        self
    }

    /// The tag text for tag predicates, `None` for every other kind.
    pub fn tag_value(&self) -> Option<&str> {
        match &self.value {
            PredicateValue::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self.value, PredicateValue::System(_))
    }
}

/// De-duplicate equivalent predicates, merging their counts.
///
/// First occurrence keeps its position.
pub fn merge_predicates(predicates: impl IntoIterator<Item = Predicate>) -> Vec<Predicate> {
    let mut merged: Vec<Predicate> = Vec::new();
    let mut positions: HashMap<Predicate, usize> = HashMap::new();

    for predicate in predicates {
        if let Some(&index) = positions.get(&predicate) {
            merged[index].count.merge(&predicate.count);
        } else {
            positions.insert(predicate.clone(), merged.len());
            merged.push(predicate);
        }
    }

    merged
}
