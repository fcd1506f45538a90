//! Incremental per-group statistics

use indexmap::{Equivalent, IndexMap};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use super::parser::Record;

/// Composite grouping key `(group_primary, group_secondary)`.
///
/// A structured pair, so `("AB", "C")` and `("A", "BC")` stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupKey {
    pub primary: String,
    pub secondary: String,
}

impl GroupKey {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }
}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        GroupKeyRef(&self.primary, &self.secondary).hash(state);
    }
}

/// Borrowed form of [`GroupKey`] for allocation-free lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GroupKeyRef<'a>(&'a str, &'a str);

impl Hash for GroupKeyRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
        self.1.hash(state);
    }
}

impl Equivalent<GroupKey> for GroupKeyRef<'_> {
    fn equivalent(&self, key: &GroupKey) -> bool {
        self.0 == key.primary && self.1 == key.secondary
    }
}

/// Running statistics of one group.
///
/// `count` always equals the sum of `category_counts`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateState {
    pub sum: f64,
    pub count: u64,
    /// Frequency of each category, in first-seen order
    pub category_counts: IndexMap<String, u64>,
}

impl AggregateState {
    fn first(record: &Record<'_>) -> Self {
        let mut category_counts = IndexMap::new();
        category_counts.insert(record.category.to_string(), 1);
        Self {
            sum: record.measure,
            count: 1,
            category_counts,
        }
    }

    fn add(&mut self, record: &Record<'_>) {
        self.sum += record.measure;
        self.count += 1;
        match self.category_counts.get_mut(record.category) {
            Some(n) => *n += 1,
            None => {
                self.category_counts.insert(record.category.to_string(), 1);
            }
        }
    }

    pub fn average(&self) -> f64 {
        self.sum / self.count as f64
    }

    /// Category with the strictly greatest count; ties go to the one seen first
    pub fn most_frequent_category(&self) -> Option<&str> {
        let mut best: Option<(&str, u64)> = None;
        for (category, &count) in &self.category_counts {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((category.as_str(), count)),
            }
        }
        best.map(|(category, _)| category)
    }
}

/// Final per-group output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub group_primary: String,
    pub group_secondary: String,
    pub average_measure: f64,
    pub most_frequent_category: String,
}

/// Sole owner and mutator of the per-group state of one run
#[derive(Debug, Default)]
pub struct Aggregator {
    groups: IndexMap<GroupKey, AggregateState>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into its group, creating the group on first sight
    pub fn apply(&mut self, record: &Record<'_>) {
        let lookup = GroupKeyRef(record.group_primary, record.group_secondary);
        match self.groups.get_mut(&lookup) {
            Some(state) => state.add(record),
            None => {
                self.groups.insert(
                    GroupKey::new(record.group_primary, record.group_secondary),
                    AggregateState::first(record),
                );
            }
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Records folded in so far, across all groups
    pub fn record_count(&self) -> u64 {
        self.groups.values().map(|state| state.count).sum()
    }

    pub fn get(&self, primary: &str, secondary: &str) -> Option<&AggregateState> {
        self.groups.get(&GroupKeyRef(primary, secondary))
    }

    /// Groups in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &AggregateState)> {
        self.groups.iter()
    }

    /// Consume the state into one summary per group, in first-seen order
    pub fn finalize(self) -> Vec<SummaryRecord> {
        self.groups
            .into_iter()
            .map(|(key, state)| {
                let most_frequent_category = state
                    .most_frequent_category()
                    .unwrap_or_default()
                    .to_string();
                SummaryRecord {
                    average_measure: state.average(),
                    most_frequent_category,
                    group_primary: key.primary,
                    group_secondary: key.secondary,
                }
            })
            .collect()
    }
}
