use crate::models::{StationStats, Summary};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Per-station totals keyed by name; iteration order is the output order.
pub type MergedTable<'a> = BTreeMap<&'a [u8], StationStats>;

/// Folds per-worker tables into one sorted table.
pub struct DataMerger {
    tree_reduce: bool,
}

impl DataMerger {
    pub fn new() -> Self {
        Self { tree_reduce: false }
    }

    /// Merge tables pairwise in parallel instead of folding them left to right.
    pub fn with_tree_reduce(tree_reduce: bool) -> Self {
        Self { tree_reduce }
    }

    /// Combine every worker's entries. The fold is commutative and associative,
    /// so the result does not depend on worker order or grouping.
    pub fn merge_tables<'a, I, E>(&self, tables: I) -> MergedTable<'a>
    where
        I: IntoIterator<Item = E>,
        E: IntoIterator<Item = (&'a [u8], StationStats)>,
    {
        if self.tree_reduce {
            let partials: Vec<MergedTable<'a>> = tables
                .into_iter()
                .map(|entries| {
                    let mut table = MergedTable::new();
                    Self::merge_entries(&mut table, entries);
                    table
                })
                .collect();
            partials
                .into_par_iter()
                .reduce(MergedTable::new, Self::merge_pair)
        } else {
            let mut merged = MergedTable::new();
            for entries in tables {
                Self::merge_entries(&mut merged, entries);
            }
            merged
        }
    }

    /// Fold `entries` into `target`; identity entries are skipped.
    pub fn merge_entries<'a>(
        target: &mut MergedTable<'a>,
        entries: impl IntoIterator<Item = (&'a [u8], StationStats)>,
    ) {
        for (name, stats) in entries {
            if stats.is_empty() {
                continue;
            }
            target.entry(name).or_default().merge(&stats);
        }
    }

    /// Merge two partial results, folding the smaller into the larger.
    pub fn merge_pair<'a>(left: MergedTable<'a>, right: MergedTable<'a>) -> MergedTable<'a> {
        let (mut larger, smaller) = if left.len() >= right.len() {
            (left, right)
        } else {
            (right, left)
        };
        Self::merge_entries(&mut larger, smaller);
        larger
    }

    pub fn summarize(&self, merged: MergedTable<'_>) -> Summary {
        Summary::from_merged(merged)
    }
}

impl Default for DataMerger {
    fn default() -> Self {
        Self::new()
    }
}
