//! Daily aggregation
//!
//! Global invariants enforced:
//! - Every calendar day from the first to the last revision appears once
//! - Days without edits are present with zero counts and are never spikes
//! - Output is sorted by date ascending
//! - Aggregates are recomputed from scratch on every call

use crate::revision::EnrichedRevision;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Aggregate over all revisions sharing one UTC calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DailyStat {
    pub date: NaiveDate,
    pub edit_count: usize,
    pub unique_editor_count: usize,
    pub revert_count: usize,
    pub is_spike_day: bool,
}

impl DailyStat {
    fn empty(date: NaiveDate) -> Self {
        DailyStat {
            date,
            edit_count: 0,
            unique_editor_count: 0,
            revert_count: 0,
            is_spike_day: false,
        }
    }
}

#[derive(Default)]
struct DayAccumulator<'a> {
    edits: usize,
    editors: HashSet<&'a str>,
    reverts: usize,
    spike: bool,
}

/// Group enriched revisions by day, filling gaps with zero-edit days
pub fn aggregate_daily(revisions: &[EnrichedRevision]) -> Vec<DailyStat> {
    let mut days: BTreeMap<NaiveDate, DayAccumulator<'_>> = BTreeMap::new();

    for revision in revisions {
        let day = days.entry(revision.day_bucket).or_default();
        day.edits += 1;
        day.editors.insert(revision.raw.user.as_str());
        if revision.is_revert {
            day.reverts += 1;
        }
        day.spike |= revision.is_spike_day;
    }

    let (first, last) = match (days.keys().next(), days.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Vec::new(),
    };

    first
        .iter_days()
        .take_while(|date| *date <= last)
        .map(|date| match days.get(&date) {
            Some(day) => DailyStat {
                date,
                edit_count: day.edits,
                unique_editor_count: day.editors.len(),
                revert_count: day.reverts,
                is_spike_day: day.spike,
            },
            None => DailyStat::empty(date),
        })
        .collect()
}

/// Number of calendar days covered by a daily series
pub fn span_days(stats: &[DailyStat]) -> usize {
    stats.len()
}

/// Number of spike days in a daily series
pub fn spike_day_count(stats: &[DailyStat]) -> usize {
    stats.iter().filter(|s| s.is_spike_day).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{enrich, Classifier};
    use crate::revision::test_support::rev;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_gap_days_are_filled() {
        let revisions = vec![
            rev(1, 1, 0, "a", ""),
            rev(2, 2, 0, "b", ""),
            rev(3, 4, 0, "a", ""),
            rev(4, 5, 0, "c", ""),
        ];
        let stats = aggregate_daily(&enrich(&revisions, &Classifier::default()));

        assert_eq!(stats.len(), 5);
        let dates: Vec<NaiveDate> = stats.iter().map(|s| s.date).collect();
        assert_eq!(dates, (1..=5).map(date).collect::<Vec<_>>());

        let gap = &stats[2];
        assert_eq!(gap.date, date(3));
        assert_eq!(gap.edit_count, 0);
        assert_eq!(gap.unique_editor_count, 0);
        assert!(!gap.is_spike_day);
    }

    #[test]
    fn test_counts_per_day() {
        let revisions = vec![
            rev(1, 1, 0, "Alice", "create"),
            rev(2, 1, 1, "Bob", "Reverted edits by Alice"),
            rev(3, 1, 2, "Alice", "undo"),
            rev(4, 2, 0, "Carol", "expand"),
        ];
        let stats = aggregate_daily(&enrich(&revisions, &Classifier::default()));

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].edit_count, 3);
        assert_eq!(stats[0].unique_editor_count, 2);
        assert_eq!(stats[0].revert_count, 2);
        assert_eq!(stats[1].edit_count, 1);
        assert_eq!(stats[1].revert_count, 0);
    }

    #[test]
    fn test_empty_history() {
        assert!(aggregate_daily(&[]).is_empty());
        assert_eq!(span_days(&[]), 0);
        assert_eq!(spike_day_count(&[]), 0);
    }

    #[test]
    fn test_spike_flag_carried_from_enrichment() {
        let mut revisions = vec![
            rev(1, 1, 0, "a", ""),
            rev(2, 2, 0, "a", ""),
            rev(3, 3, 0, "a", ""),
        ];
        for i in 0..10 {
            revisions.push(rev(10 + i, 4, i as u32, "b", ""));
        }
        let stats = aggregate_daily(&enrich(&revisions, &Classifier::default()));
        assert_eq!(spike_day_count(&stats), 1);
        assert!(stats[3].is_spike_day);
    }
}
