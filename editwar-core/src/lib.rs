//! editwar core library - revision-history enrichment and controversy scoring

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Data flows one way: fetch -> enrich -> aggregate -> score
// - No stage mutates a predecessor's output
// - No global mutable state; configuration is passed in explicitly
// - Everything after the fetch is pure and total (empty input is valid)
// - Identical input yields byte-for-byte identical output

pub mod config;
pub mod daily;
pub mod enrich;
pub mod fetch;
pub mod mediawiki;
pub mod report;
pub mod retry;
pub mod revision;
pub mod scoring;
pub mod summary;

pub use config::ResolvedConfig;
pub use daily::DailyStat;
pub use fetch::{FetchError, FetchStatus, FetchedHistory, RevisionSource};
pub use report::{render_json, render_jsonl, render_text};
pub use revision::{EnrichedRevision, RawRevision};
pub use scoring::{ControversyLabel, ControversyScore};
pub use summary::ArticleSummary;

use tokio_util::sync::CancellationToken;

/// Everything derived from one fetched history
///
/// A read-only snapshot for presentation; nothing in it links back to the
/// pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleAnalysis {
    pub title: String,
    pub fetch_status: FetchStatus,
    pub revisions: Vec<EnrichedRevision>,
    pub daily: Vec<DailyStat>,
    pub summary: ArticleSummary,
    pub score: ControversyScore,
}

impl ArticleAnalysis {
    /// True when the article has no edit history (not an error)
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }
}

/// Run enrichment, aggregation, summary, and scoring over a fetched history
pub fn analyze_history(history: FetchedHistory, config: &ResolvedConfig) -> ArticleAnalysis {
    let revisions = enrich::enrich(&history.revisions, &config.classifier);
    let daily = daily::aggregate_daily(&revisions);
    let summary = summary::compute_summary(&revisions);

    let input = scoring::ScoreInput {
        revert_count: summary.total_reverts,
        unique_editor_count: summary.unique_editors,
        spike_day_count: daily::spike_day_count(&daily),
        total_days: daily::span_days(&daily),
    };
    let score = scoring::compute_controversy_score(&input, &config.weights, &config.ceilings);

    tracing::debug!(
        title = %history.title,
        revisions = revisions.len(),
        days = daily.len(),
        score = score.composite_score,
        "analysis complete"
    );

    ArticleAnalysis {
        title: history.title,
        fetch_status: history.status,
        revisions,
        daily,
        summary,
        score,
    }
}

/// Fetch an article's history from `source` and analyze it
///
/// # Errors
///
/// Only the fetch can fail; see [`FetchError`]. An article with no
/// revisions is returned as an empty analysis with a zero score.
pub async fn analyze_article<S: RevisionSource + ?Sized>(
    source: &S,
    title: &str,
    config: &ResolvedConfig,
    cancel: &CancellationToken,
) -> Result<ArticleAnalysis, FetchError> {
    let history = fetch::fetch_history(source, title, &config.fetch, cancel).await?;
    Ok(analyze_history(history, config))
}
