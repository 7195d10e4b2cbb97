//! Whole-article summary statistics
//!
//! Derived from the enriched history; never stored.

use crate::revision::EnrichedRevision;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Number of editors listed in `top_editors`
pub const TOP_EDITORS: usize = 10;

/// Edit count for one editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorCount {
    pub user: String,
    pub edits: usize,
}

/// High-level statistics about an article's revision history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct ArticleSummary {
    pub total_edits: usize,
    pub total_reverts: usize,
    /// Reverts as a percentage of all edits, two decimal places
    pub revert_rate: f64,
    pub bot_edits: usize,
    pub human_edits: usize,
    pub unique_editors: usize,
    pub unique_human_editors: usize,
    pub spike_days: usize,
    pub conflict_language_edits: usize,
    pub category_counts: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_edit: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_edit: Option<NaiveDate>,
    pub top_editors: Vec<EditorCount>,
}

/// Compute summary statistics for an enriched history
///
/// `spike_days` counts distinct spike days, not revisions on spike days.
pub fn compute_summary(revisions: &[EnrichedRevision]) -> ArticleSummary {
    if revisions.is_empty() {
        return ArticleSummary::default();
    }

    let total_edits = revisions.len();
    let total_reverts = revisions.iter().filter(|r| r.is_revert).count();
    let bot_edits = revisions.iter().filter(|r| r.is_bot).count();

    let unique_editors = revisions
        .iter()
        .map(|r| r.raw.user.as_str())
        .collect::<HashSet<_>>()
        .len();
    let unique_human_editors = revisions
        .iter()
        .filter(|r| !r.is_bot)
        .map(|r| r.raw.user.as_str())
        .collect::<HashSet<_>>()
        .len();

    let spike_days = revisions
        .iter()
        .filter(|r| r.is_spike_day)
        .map(|r| r.day_bucket)
        .collect::<HashSet<_>>()
        .len();

    let mut category_counts: BTreeMap<String, usize> = BTreeMap::new();
    for tag in revisions.iter().flat_map(|r| r.nlp_categories.iter()) {
        *category_counts.entry(tag.clone()).or_insert(0) += 1;
    }

    let revert_rate = (total_reverts as f64 / total_edits as f64 * 10_000.0).round() / 100.0;

    ArticleSummary {
        total_edits,
        total_reverts,
        revert_rate,
        bot_edits,
        human_edits: total_edits - bot_edits,
        unique_editors,
        unique_human_editors,
        spike_days,
        conflict_language_edits: revisions
            .iter()
            .filter(|r| r.has_conflict_language())
            .count(),
        category_counts,
        first_edit: revisions.iter().map(|r| r.day_bucket).min(),
        last_edit: revisions.iter().map(|r| r.day_bucket).max(),
        top_editors: top_editors(revisions, TOP_EDITORS),
    }
}

/// Most active editors, by edit count descending then name ascending
pub fn top_editors(revisions: &[EnrichedRevision], limit: usize) -> Vec<EditorCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for revision in revisions {
        *counts.entry(revision.raw.user.as_str()).or_insert(0) += 1;
    }

    let mut editors: Vec<EditorCount> = counts
        .into_iter()
        .map(|(user, edits)| EditorCount {
            user: user.to_string(),
            edits,
        })
        .collect();
    editors.sort_by(|a, b| b.edits.cmp(&a.edits).then_with(|| a.user.cmp(&b.user)));
    editors.truncate(limit);
    editors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{enrich, Classifier};
    use crate::revision::test_support::rev;

    #[test]
    fn test_summary_counts() {
        let revisions = vec![
            rev(1, 1, 0, "Alice", "create"),
            rev(2, 1, 1, "ClueBot NG", "Reverting possible vandalism"),
            rev(3, 2, 0, "Bob", "biased wording"),
            rev(4, 3, 0, "Alice", "expand"),
        ];
        let summary = compute_summary(&enrich(&revisions, &Classifier::default()));

        assert_eq!(summary.total_edits, 4);
        assert_eq!(summary.total_reverts, 1);
        assert_eq!(summary.revert_rate, 25.0);
        assert_eq!(summary.bot_edits, 1);
        assert_eq!(summary.human_edits, 3);
        assert_eq!(summary.unique_editors, 3);
        assert_eq!(summary.unique_human_editors, 2);
        assert_eq!(summary.conflict_language_edits, 2);
        assert_eq!(summary.category_counts.get("dispute"), Some(&1));
        assert_eq!(summary.first_edit, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(summary.last_edit, NaiveDate::from_ymd_opt(2024, 1, 3));
        assert_eq!(summary.top_editors[0].user, "Alice");
        assert_eq!(summary.top_editors[0].edits, 2);
    }

    #[test]
    fn test_top_editors_tie_break_by_name() {
        let revisions = vec![
            rev(1, 1, 0, "Zed", ""),
            rev(2, 1, 1, "Amy", ""),
            rev(3, 1, 2, "Mia", ""),
            rev(4, 1, 3, "Mia", ""),
        ];
        let enriched = enrich(&revisions, &Classifier::default());
        let names: Vec<String> = top_editors(&enriched, 2)
            .into_iter()
            .map(|e| e.user)
            .collect();
        assert_eq!(names, vec!["Mia", "Amy"]);
    }

    #[test]
    fn test_empty_summary() {
        let summary = compute_summary(&[]);
        assert_eq!(summary.total_edits, 0);
        assert!(summary.first_edit.is_none());
        assert!(summary.top_editors.is_empty());
    }
}
