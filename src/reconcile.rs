//! Compares tallied (possibly estimated) counts with the population counts
//! published in the listing's filter sidebar.
//!
//! Rows are keyed by the sidebar's tags. A sidebar tag never seen in the
//! downloaded pages is reported with an estimate of 0; a tag seen only in the
//! pages has no sidebar count to compare against and is listed separately.

use std::collections::BTreeMap;

use crate::formats::FilterStatistics;
use crate::tally::{TagCategory, TagCounts, TagTally};

/// Categories the sidebar reports in enough depth to compare against.
pub const RECONCILED_CATEGORIES: [TagCategory; 2] =
    [TagCategory::Characters, TagCategory::Relationships];

#[derive(Debug, Clone, PartialEq)]
pub struct TagDelta {
    pub tag: String,
    pub ground_truth: u64,
    pub estimate: u64,
    pub delta: i64,
    pub relative_delta_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub category: TagCategory,
    /// Sorted by ground-truth count, highest first.
    pub rows: Vec<TagDelta>,
    pub ground_truth_tags: usize,
    pub estimated_tags: usize,
    pub matched_tags: usize,
    pub match_rate_pct: f64,
    /// Tags present in the tally but not in the sidebar, in tally order.
    pub estimate_only: Vec<String>,
}

pub fn reconcile(
    category: TagCategory,
    estimate: &TagCounts,
    ground_truth: &BTreeMap<String, u64>,
) -> Reconciliation {
    let mut rows: Vec<TagDelta> = ground_truth
        .iter()
        .map(|(tag, &truth)| tag_delta(tag, truth, estimate.get(tag).unwrap_or(0)))
        .collect();
    rows.sort_by(|a, b| b.ground_truth.cmp(&a.ground_truth));

    let matched_tags = ground_truth
        .keys()
        .filter(|tag| estimate.contains(tag))
        .count();
    let estimate_only = estimate
        .tags()
        .filter(|tag| !ground_truth.contains_key(*tag))
        .map(str::to_owned)
        .collect();

    Reconciliation {
        category,
        rows,
        ground_truth_tags: ground_truth.len(),
        estimated_tags: estimate.len(),
        matched_tags,
        match_rate_pct: percentage(matched_tags as f64, ground_truth.len() as f64),
        estimate_only,
    }
}

/// Reconciles every category the sidebar is compared on.
pub fn reconcile_tally(tally: &TagTally, filter_stats: &FilterStatistics) -> Vec<Reconciliation> {
    RECONCILED_CATEGORIES
        .iter()
        .filter_map(|&category| {
            let truth = ground_truth_for(filter_stats, category)?;
            Some(reconcile(category, &tally.table(category).global, truth))
        })
        .collect()
}

/// Sidebar counts for `category`; the sidebar has no free-form section.
pub fn ground_truth_for(
    filter_stats: &FilterStatistics,
    category: TagCategory,
) -> Option<&BTreeMap<String, u64>> {
    match category {
        TagCategory::Characters => Some(&filter_stats.characters),
        TagCategory::Relationships => Some(&filter_stats.relationships),
        TagCategory::Fandoms => Some(&filter_stats.fandoms),
        TagCategory::Ratings => Some(&filter_stats.ratings),
        TagCategory::Warnings => Some(&filter_stats.warnings),
        TagCategory::Categories => Some(&filter_stats.categories),
        TagCategory::Freeforms => None,
    }
}

fn tag_delta(tag: &str, ground_truth: u64, estimate: u64) -> TagDelta {
    let delta = estimate as i64 - ground_truth as i64;
    TagDelta {
        tag: tag.to_owned(),
        ground_truth,
        estimate,
        delta,
        relative_delta_pct: percentage(delta as f64, ground_truth as f64),
    }
}

/// `part / whole × 100`, or 0 when `whole` is 0.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    part / whole * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(entries: &[(&str, u64)]) -> TagCounts {
        let mut counts = TagCounts::default();
        for (tag, count) in entries {
            counts.add(tag, *count);
        }
        counts
    }

    fn truth(entries: &[(&str, u64)]) -> BTreeMap<String, u64> {
        entries
            .iter()
            .map(|(tag, count)| ((*tag).to_owned(), *count))
            .collect()
    }

    #[test]
    fn partial_overlap_reports_match_rate_and_deltas() {
        let estimate = counts(&[("Alice", 90), ("Carol", 5)]);
        let ground_truth = truth(&[("Alice", 100), ("Bob", 50)]);

        let result = reconcile(TagCategory::Characters, &estimate, &ground_truth);

        assert_eq!(result.ground_truth_tags, 2);
        assert_eq!(result.estimated_tags, 2);
        assert_eq!(result.matched_tags, 1);
        assert_eq!(result.match_rate_pct, 50.0);

        assert_eq!(result.rows.len(), 2);
        let alice = &result.rows[0];
        assert_eq!(alice.tag, "Alice");
        assert_eq!(alice.estimate, 90);
        assert_eq!(alice.delta, -10);
        assert_eq!(alice.relative_delta_pct, -10.0);

        // Sidebar tags missing from the pages are compared against 0.
        let bob = &result.rows[1];
        assert_eq!(bob.tag, "Bob");
        assert_eq!(bob.estimate, 0);
        assert_eq!(bob.delta, -50);
        assert_eq!(bob.relative_delta_pct, -100.0);

        assert!(result.rows.iter().all(|row| row.tag != "Carol"));
        assert_eq!(result.estimate_only, vec!["Carol"]);
    }

    #[test]
    fn empty_ground_truth_has_zero_match_rate() {
        let estimate = counts(&[("Alice", 3)]);
        let result = reconcile(TagCategory::Relationships, &estimate, &BTreeMap::new());

        assert_eq!(result.match_rate_pct, 0.0);
        assert!(result.rows.is_empty());
        assert_eq!(result.estimate_only, vec!["Alice"]);
    }

    #[test]
    fn zero_ground_truth_count_has_zero_relative_delta() {
        let estimate = counts(&[("Alice", 4)]);
        let result = reconcile(TagCategory::Characters, &estimate, &truth(&[("Alice", 0)]));

        assert_eq!(result.rows[0].delta, 4);
        assert_eq!(result.rows[0].relative_delta_pct, 0.0);
        assert_eq!(result.match_rate_pct, 100.0);
    }

    #[test]
    fn overestimates_are_positive() {
        let estimate = counts(&[("Alice", 125)]);
        let result = reconcile(TagCategory::Characters, &estimate, &truth(&[("Alice", 100)]));
        assert_eq!(result.rows[0].delta, 25);
        assert_eq!(result.rows[0].relative_delta_pct, 25.0);
    }

    #[test]
    fn rows_follow_ground_truth_ranking() {
        let ground_truth = truth(&[("A", 5), ("B", 50), ("C", 20), ("D", 20)]);
        let result = reconcile(TagCategory::Characters, &TagCounts::default(), &ground_truth);
        let order: Vec<&str> = result.rows.iter().map(|row| row.tag.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "D", "A"]);
    }

    #[test]
    fn tally_reconciles_characters_and_relationships() {
        let mut filter_stats = FilterStatistics::default();
        filter_stats.characters.insert("Alice".to_owned(), 1);
        let results = reconcile_tally(&TagTally::default(), &filter_stats);

        let categories: Vec<TagCategory> = results.iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            vec![TagCategory::Characters, TagCategory::Relationships]
        );
        assert_eq!(results[0].rows[0].estimate, 0);
        assert_eq!(results[1].ground_truth_tags, 0);
    }

    #[test]
    fn free_forms_have_no_sidebar_counts() {
        let filter_stats = FilterStatistics::default();
        assert!(ground_truth_for(&filter_stats, TagCategory::Freeforms).is_none());
        assert!(ground_truth_for(&filter_stats, TagCategory::Fandoms).is_some());
    }
}
