//! Revision records
//!
//! Global invariants enforced:
//! - Revisions of one article are held in timestamp-ascending order
//! - `revision_id` is unique within a history
//! - Enriched revisions are never mutated after creation

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One historical edit as returned by the source API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RawRevision {
    pub revision_id: u64,
    pub timestamp: DateTime<Utc>,
    /// Editor display name; may be an anonymous IP
    pub user: String,
    /// Edit summary; may be empty
    pub comment: String,
    /// Byte length of the article after this edit
    pub size: u64,
}

impl RawRevision {
    /// UTC calendar date of the edit
    pub fn day_bucket(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// A raw revision plus the facts derived by the enrichment pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EnrichedRevision {
    #[serde(flatten)]
    pub raw: RawRevision,
    pub normalized_comment: String,
    pub is_revert: bool,
    pub is_bot: bool,
    pub nlp_categories: BTreeSet<String>,
    pub day_bucket: NaiveDate,
    pub is_spike_day: bool,
    /// Byte change relative to the previous revision (0 for the first)
    pub size_delta: i64,
}

impl EnrichedRevision {
    /// True if any conflict-language category matched
    pub fn has_conflict_language(&self) -> bool {
        !self.nlp_categories.is_empty()
    }
}

/// Sort revisions into canonical order and drop duplicate ids
///
/// Order is timestamp ascending, then revision id ascending. When the same
/// revision id appears more than once the first occurrence is kept.
pub fn canonicalize(mut revisions: Vec<RawRevision>) -> Vec<RawRevision> {
    let mut seen = std::collections::HashSet::with_capacity(revisions.len());
    revisions.retain(|rev| seen.insert(rev.revision_id));
    revisions.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.revision_id.cmp(&b.revision_id))
    });
    revisions
}


#[cfg(test)]
mod tests {
    use super::test_support::rev;
    use super::*;

    #[test]
    fn test_canonicalize_sorts_by_timestamp_then_id() {
        let revisions = vec![
            rev(3, 2, 0, "a", ""),
            rev(2, 1, 5, "b", ""),
            rev(1, 1, 5, "c", ""),
        ];
        let ids: Vec<u64> = canonicalize(revisions)
            .iter()
            .map(|r| r.revision_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_canonicalize_drops_duplicate_ids() {
        let revisions = vec![
            rev(1, 1, 0, "first", ""),
            rev(1, 1, 0, "second", ""),
            rev(2, 2, 0, "a", ""),
        ];
        let result = canonicalize(revisions);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].user, "first");
    }

    #[test]
    fn test_day_bucket_is_utc_date() {
        let r = rev(1, 5, 23, "a", "");
        assert_eq!(
            r.day_bucket(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
    }
}
