//! Reporting and output generation
//!
//! Global invariants enforced:
//! - Deterministic output ordering
//! - Byte-for-byte identical output across runs

use crate::daily::DailyStat;
use crate::fetch::FetchStatus;
use crate::scoring::ControversyScore;
use crate::summary::ArticleSummary;
use crate::ArticleAnalysis;
use anyhow::{Context, Result};
use serde::Serialize;

/// JSON report: everything except the per-revision table
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    title: &'a str,
    fetch_status: FetchStatus,
    score: &'a ControversyScore,
    summary: &'a ArticleSummary,
    daily: &'a [DailyStat],
}

fn status_str(status: FetchStatus) -> &'static str {
    match status {
        FetchStatus::Complete => "complete",
        FetchStatus::Truncated => "truncated at revision cap",
        FetchStatus::Cancelled => "cancelled (partial history)",
    }
}

/// Render an analysis as human-readable text
pub fn render_text(analysis: &ArticleAnalysis) -> String {
    let mut output = String::new();
    output.push_str(&format!("Article: {}\n", analysis.title));
    output.push_str(&format!("Fetch:   {}\n", status_str(analysis.fetch_status)));

    if analysis.is_empty() {
        output.push_str("\nNo edit history found.\n");
        return output;
    }

    let s = &analysis.summary;
    let score = &analysis.score;
    output.push_str(&format!(
        "\nControversy score: {} / 100 ({})\n",
        score.composite_score,
        score.label.as_str()
    ));
    output.push_str(&format!(
        "  {:<10} {:>6.1}\n  {:<10} {:>6.1}\n  {:<10} {:>6.1}\n",
        "reverts",
        score.revert_component * 100.0,
        "editors",
        score.editor_component * 100.0,
        "spikes",
        score.spike_component * 100.0,
    ));

    output.push_str("\nSummary:\n");
    let period = match (s.first_edit, s.last_edit) {
        (Some(first), Some(last)) => format!("{} .. {}", first, last),
        _ => "-".to_string(),
    };
    let rows: [(&str, String); 9] = [
        ("period", period),
        ("edits", s.total_edits.to_string()),
        ("reverts", format!("{} ({:.2}%)", s.total_reverts, s.revert_rate)),
        ("bot edits", s.bot_edits.to_string()),
        ("human edits", s.human_edits.to_string()),
        ("editors", s.unique_editors.to_string()),
        ("human editors", s.unique_human_editors.to_string()),
        ("spike days", s.spike_days.to_string()),
        ("conflict", s.conflict_language_edits.to_string()),
    ];
    for (label, value) in rows {
        output.push_str(&format!("  {:<14} {}\n", label, value));
    }

    if !s.category_counts.is_empty() {
        output.push_str("\nConflict language:\n");
        for (tag, count) in &s.category_counts {
            output.push_str(&format!("  {:<14} {}\n", tag, count));
        }
    }

    if !s.top_editors.is_empty() {
        output.push_str("\nTop editors:\n");
        for editor in &s.top_editors {
            output.push_str(&format!(
                "  {:<30} {}\n",
                truncate_or_pad(&editor.user, 30),
                editor.edits
            ));
        }
    }

    let spikes: Vec<&DailyStat> = analysis.daily.iter().filter(|d| d.is_spike_day).collect();
    if !spikes.is_empty() {
        output.push_str("\nSpike days:\n");
        output.push_str(&format!(
            "  {:<12} {:>6} {:>8} {:>8}\n",
            "DATE", "EDITS", "EDITORS", "REVERTS"
        ));
        for day in spikes {
            output.push_str(&format!(
                "  {:<12} {:>6} {:>8} {:>8}\n",
                day.date.to_string(),
                day.edit_count,
                day.unique_editor_count,
                day.revert_count
            ));
        }
    }

    output
}

/// Render an analysis as pretty JSON (score, summary, and daily series)
pub fn render_json(analysis: &ArticleAnalysis) -> Result<String> {
    let report = JsonReport {
        title: &analysis.title,
        fetch_status: analysis.fetch_status,
        score: &analysis.score,
        summary: &analysis.summary,
        daily: &analysis.daily,
    };
    serde_json::to_string_pretty(&report).context("failed to serialize report to JSON")
}

/// Render enriched revisions as JSON Lines, oldest first
pub fn render_jsonl(analysis: &ArticleAnalysis) -> Result<String> {
    let mut output = String::new();
    for revision in &analysis.revisions {
        let line = serde_json::to_string(revision).with_context(|| {
            format!("failed to serialize revision {}", revision.raw.revision_id)
        })?;
        output.push_str(&line);
        output.push('\n');
    }
    Ok(output)
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}
