//! Controversy scoring
//!
//! Reduces whole-article aggregates (reverts, unique editors, spike days) to
//! three log-normalized components and one bounded composite score.
//!
//! Global invariants enforced:
//! - Pure and deterministic: identical inputs yield identical scores
//! - Every component is clamped to [0, 1]; the composite to [0, 100]
//! - Degenerate inputs (no days) score 0 without dividing by zero

use serde::{Deserialize, Serialize};

/// Weights for the composite score; non-negative and summing to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub reverts: f64,
    pub editors: f64,
    pub spikes: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            reverts: 0.4,
            editors: 0.3,
            spikes: 0.3,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.reverts + self.editors + self.spikes
    }
}

/// Saturation points for log normalization
///
/// A raw value at or above its ceiling normalizes to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationCeilings {
    pub reverts: f64,
    pub editors: f64,
    /// Percentage of days that are spike days
    pub spike_percent: f64,
}

impl Default for NormalizationCeilings {
    fn default() -> Self {
        NormalizationCeilings {
            reverts: 1000.0,
            editors: 1000.0,
            spike_percent: 20.0,
        }
    }
}

/// Whole-article aggregates consumed by the scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreInput {
    pub revert_count: usize,
    pub unique_editor_count: usize,
    pub spike_day_count: usize,
    pub total_days: usize,
}

/// Human-readable controversy band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControversyLabel {
    Low,      // < 25
    Medium,   // 25-50
    High,     // 50-75
    Extreme,  // >= 75
}

impl ControversyLabel {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=24 => ControversyLabel::Low,
            25..=49 => ControversyLabel::Medium,
            50..=74 => ControversyLabel::High,
            _ => ControversyLabel::Extreme,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControversyLabel::Low => "Low",
            ControversyLabel::Medium => "Medium",
            ControversyLabel::High => "High",
            ControversyLabel::Extreme => "Extreme",
        }
    }
}

/// Controversy score for one article snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ControversyScore {
    pub revert_component: f64,
    pub editor_component: f64,
    pub spike_component: f64,
    pub composite_score: u8,
    pub label: ControversyLabel,
}

impl ControversyScore {
    pub fn zero() -> Self {
        ControversyScore {
            revert_component: 0.0,
            editor_component: 0.0,
            spike_component: 0.0,
            composite_score: 0,
            label: ControversyLabel::Low,
        }
    }
}

/// Normalize a non-negative value to [0, 1] on a log scale
///
/// Formula: `ln(1 + value) / ln(1 + ceiling)`, clamped. Returns 0 when
/// either argument is not positive.
pub fn log_normalize(value: f64, ceiling: f64) -> f64 {
    if value <= 0.0 || ceiling <= 0.0 {
        return 0.0;
    }
    (value.ln_1p() / ceiling.ln_1p()).clamp(0.0, 1.0)
}

/// Compute the controversy score
///
/// Components:
/// - revert: `log_normalize(revert_count, ceilings.reverts)`
/// - editor: `log_normalize(unique_editor_count, ceilings.editors)`
/// - spike:  `log_normalize(100 * spike_days / total_days, ceilings.spike_percent)`
///
/// Composite: `round(100 * (w_r * revert + w_e * editor + w_s * spike))`
pub fn compute_controversy_score(
    input: &ScoreInput,
    weights: &ScoringWeights,
    ceilings: &NormalizationCeilings,
) -> ControversyScore {
    if input.total_days == 0 {
        return ControversyScore::zero();
    }

    let revert_component = log_normalize(input.revert_count as f64, ceilings.reverts);
    let editor_component = log_normalize(input.unique_editor_count as f64, ceilings.editors);
    let spike_percent = input.spike_day_count as f64 / input.total_days as f64 * 100.0;
    let spike_component = log_normalize(spike_percent, ceilings.spike_percent);

    let weighted = weights.reverts * revert_component
        + weights.editors * editor_component
        + weights.spikes * spike_component;
    let composite_score = (weighted * 100.0).round().clamp(0.0, 100.0) as u8;

    ControversyScore {
        revert_component,
        editor_component,
        spike_component,
        composite_score,
        label: ControversyLabel::from_score(composite_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(r: usize, e: usize, s: usize, days: usize) -> ControversyScore {
        compute_controversy_score(
            &ScoreInput {
                revert_count: r,
                unique_editor_count: e,
                spike_day_count: s,
                total_days: days,
            },
            &ScoringWeights::default(),
            &NormalizationCeilings::default(),
        )
    }

    #[test]
    fn test_log_normalize_bounds() {
        assert_eq!(log_normalize(0.0, 30.0), 0.0);
        assert_eq!(log_normalize(-5.0, 30.0), 0.0);
        assert_eq!(log_normalize(5.0, 0.0), 0.0);
        assert_eq!(log_normalize(30.0, 30.0), 1.0);
        assert_eq!(log_normalize(1e9, 30.0), 1.0);
        let mid = log_normalize(5.0, 30.0);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_score_is_deterministic() {
        let a = score(5, 3, 1, 10);
        let b = score(5, 3, 1, 10);
        assert_eq!(a, b);
        // revert 0.2597, editor 0.2007, spike 0.7876 -> 40.02
        assert_eq!(a.composite_score, 40);
        assert_eq!(a.label, ControversyLabel::Medium);
    }

    #[test]
    fn test_zero_inputs_score_zero() {
        assert_eq!(score(0, 0, 0, 0), ControversyScore::zero());
        assert_eq!(score(0, 0, 0, 5).composite_score, 0);
        // Counts without any day span are degenerate
        assert_eq!(score(7, 3, 1, 0).composite_score, 0);
    }

    #[test]
    fn test_monotonic_in_reverts() {
        let mut previous = 0;
        for reverts in [0, 1, 2, 5, 10, 50, 100, 1000, 5000] {
            let current = score(reverts, 20, 2, 30).composite_score;
            assert!(
                current >= previous,
                "score decreased at {} reverts: {} < {}",
                reverts,
                current,
                previous
            );
            previous = current;
        }
    }

    #[test]
    fn test_saturated_inputs_score_100() {
        let s = score(10_000, 10_000, 10, 10);
        assert_eq!(s.revert_component, 1.0);
        assert_eq!(s.editor_component, 1.0);
        assert_eq!(s.spike_component, 1.0);
        assert_eq!(s.composite_score, 100);
        assert_eq!(s.label, ControversyLabel::Extreme);
    }

    #[test]
    fn test_weights_are_injected() {
        let revert_only = ScoringWeights {
            reverts: 1.0,
            editors: 0.0,
            spikes: 0.0,
        };
        let s = compute_controversy_score(
            &ScoreInput {
                revert_count: 1000,
                unique_editor_count: 0,
                spike_day_count: 0,
                total_days: 1,
            },
            &revert_only,
            &NormalizationCeilings::default(),
        );
        assert_eq!(s.composite_score, 100);
    }

    #[test]
    fn test_label_bands() {
        assert_eq!(ControversyLabel::from_score(0), ControversyLabel::Low);
        assert_eq!(ControversyLabel::from_score(24), ControversyLabel::Low);
        assert_eq!(ControversyLabel::from_score(25), ControversyLabel::Medium);
        assert_eq!(ControversyLabel::from_score(50), ControversyLabel::High);
        assert_eq!(ControversyLabel::from_score(75), ControversyLabel::Extreme);
        assert_eq!(ControversyLabel::from_score(100), ControversyLabel::Extreme);
    }
}
