//! Revision enrichment
//!
//! Two passes over a fetched history:
//! 1. Per revision (order-independent, run in parallel): text normalization,
//!    revert detection, bot detection, conflict-language categories.
//! 2. Per day (needs the full set): spike-day membership.
//!
//! Global invariants enforced:
//! - Output length and order equal input length and order
//! - Pure: identical input and classifier yield identical output
//! - All keyword tests run against the normalized (lower-cased, trimmed) text

use crate::revision::{EnrichedRevision, RawRevision};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Default spike multiplier: a day is a spike at >= 3x the mean daily edits
pub const DEFAULT_SPIKE_MULTIPLIER: f64 = 3.0;

/// Default substring marking a bot account
pub const DEFAULT_BOT_MARKER: &str = "bot";

/// Default keywords that mark an edit summary as a revert
pub const DEFAULT_REVERT_KEYWORDS: &[&str] = &[
    "revert",
    "reverted",
    "rv",
    "undo",
    "undid",
    "vandalism",
    "vandal",
    "restore",
    "restored",
    "rollback",
    "reverts",
];

const HOSTILITY_KEYWORDS: &[&str] = &["attack", "abuse", "harassment", "insult", "inappropriate"];

const DISPUTE_KEYWORDS: &[&str] = &[
    "dispute",
    "disagree",
    "incorrect",
    "wrong",
    "false",
    "inaccurate",
    "misleading",
    "biased",
    "bias",
    "pov",
    "neutral",
    "neutrality",
];

const PROTECTION_KEYWORDS: &[&str] = &[
    "protected",
    "semi-protected",
    "fully protected",
    "edit request",
];

/// Default conflict-language categories, keyed by tag
pub fn default_categories() -> BTreeMap<String, Vec<String>> {
    let owned = |words: &[&str]| words.iter().map(|w| w.to_string()).collect::<Vec<_>>();
    BTreeMap::from([
        ("hostility".to_string(), owned(HOSTILITY_KEYWORDS)),
        ("dispute".to_string(), owned(DISPUTE_KEYWORDS)),
        ("revert_lang".to_string(), owned(DEFAULT_REVERT_KEYWORDS)),
        ("protection".to_string(), owned(PROTECTION_KEYWORDS)),
    ])
}

/// Keyword rules used by the enrichment passes
///
/// Keywords are expected lower-cased; [`crate::config`] normalizes them
/// when resolving a config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    pub revert_keywords: Vec<String>,
    pub bot_marker: String,
    pub categories: BTreeMap<String, Vec<String>>,
    pub spike_multiplier: f64,
}

impl Default for Classifier {
    fn default() -> Self {
        Classifier {
            revert_keywords: DEFAULT_REVERT_KEYWORDS
                .iter()
                .map(|w| w.to_string())
                .collect(),
            bot_marker: DEFAULT_BOT_MARKER.to_string(),
            categories: default_categories(),
            spike_multiplier: DEFAULT_SPIKE_MULTIPLIER,
        }
    }
}

/// Case-fold and trim text before keyword matching
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

fn contains_any(normalized: &str, keywords: &[String]) -> bool {
    !normalized.is_empty() && keywords.iter().any(|kw| normalized.contains(kw.as_str()))
}

impl Classifier {
    /// True if the normalized comment contains any revert keyword
    pub fn is_revert(&self, normalized_comment: &str) -> bool {
        contains_any(normalized_comment, &self.revert_keywords)
    }

    /// True if the user name contains the bot marker, in any case
    pub fn is_bot(&self, user: &str) -> bool {
        !self.bot_marker.is_empty() && normalize_text(user).contains(self.bot_marker.as_str())
    }

    /// Every category with at least one keyword match; categories are independent
    pub fn categorize(&self, normalized_comment: &str) -> BTreeSet<String> {
        self.categories
            .iter()
            .filter(|(_, keywords)| contains_any(normalized_comment, keywords))
            .map(|(tag, _)| tag.clone())
            .collect()
    }
}

/// Facts derived from one revision alone
struct RevisionFacts {
    normalized_comment: String,
    is_revert: bool,
    is_bot: bool,
    nlp_categories: BTreeSet<String>,
}

fn classify_revision(revision: &RawRevision, classifier: &Classifier) -> RevisionFacts {
    let normalized_comment = normalize_text(&revision.comment);
    RevisionFacts {
        is_revert: classifier.is_revert(&normalized_comment),
        is_bot: classifier.is_bot(&revision.user),
        nlp_categories: classifier.categorize(&normalized_comment),
        normalized_comment,
    }
}

/// Per-day edit counts over days with at least one edit
pub fn daily_edit_counts(revisions: &[RawRevision]) -> BTreeMap<NaiveDate, usize> {
    let mut counts = BTreeMap::new();
    for revision in revisions {
        *counts.entry(revision.day_bucket()).or_insert(0) += 1;
    }
    counts
}

/// Days whose edit count is at least `multiplier` times the mean daily count
///
/// The mean is taken over the days present in `counts` (active days only),
/// recomputed on every call.
pub fn spike_days(counts: &BTreeMap<NaiveDate, usize>, multiplier: f64) -> BTreeSet<NaiveDate> {
    if counts.is_empty() {
        return BTreeSet::new();
    }

    let total: usize = counts.values().sum();
    let mean = total as f64 / counts.len() as f64;
    let threshold = mean * multiplier;

    counts
        .iter()
        .filter(|&(_, &count)| count as f64 >= threshold)
        .map(|(date, _)| *date)
        .collect()
}

/// Enrich a canonical (timestamp-ascending) revision history
pub fn enrich(revisions: &[RawRevision], classifier: &Classifier) -> Vec<EnrichedRevision> {
    // Pass 1: indexed parallel map keeps input order on collect
    let facts: Vec<RevisionFacts> = revisions
        .par_iter()
        .map(|revision| classify_revision(revision, classifier))
        .collect();

    // Pass 2: spike days over the whole set
    let spikes = spike_days(&daily_edit_counts(revisions), classifier.spike_multiplier);

    let mut previous_size: Option<u64> = None;
    revisions
        .iter()
        .zip(facts)
        .map(|(revision, facts)| {
            let size_delta = match previous_size {
                Some(prev) => revision.size as i64 - prev as i64,
                None => 0,
            };
            previous_size = Some(revision.size);

            let day_bucket = revision.day_bucket();
            EnrichedRevision {
                raw: revision.clone(),
                normalized_comment: facts.normalized_comment,
                is_revert: facts.is_revert,
                is_bot: facts.is_bot,
                nlp_categories: facts.nlp_categories,
                day_bucket,
                is_spike_day: spikes.contains(&day_bucket),
                size_delta,
            }
        })
        .collect()
}
