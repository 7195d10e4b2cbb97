//! Configuration file support for editwar
//!
//! Loads analysis configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.editwarrc.json` in the working directory
//! 3. `editwar.config.json` in the working directory
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::enrich::{
    default_categories, normalize_text, Classifier, DEFAULT_BOT_MARKER, DEFAULT_REVERT_KEYWORDS,
    DEFAULT_SPIKE_MULTIPLIER,
};
use crate::fetch::{FetchOptions, DEFAULT_MAX_REVISIONS, MAX_PAGE_SIZE};
use crate::mediawiki::{MediaWikiSettings, DEFAULT_API_URL};
use crate::retry::RetryPolicy;
use crate::scoring::{NormalizationCeilings, ScoringWeights};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tolerance when checking that scoring weights sum to 1
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// editwar configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditwarConfig {
    /// Revision source and pagination settings
    #[serde(default)]
    pub fetch: Option<FetchConfig>,

    /// Keyword rules for revert, bot, and conflict-language detection
    #[serde(default)]
    pub classify: Option<ClassifyConfig>,

    /// Controversy score weights and normalization ceilings
    #[serde(default)]
    pub scoring: Option<ScoringConfig>,
}

/// Revision source settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    /// MediaWiki API endpoint (default: English Wikipedia)
    pub api_url: Option<String>,
    /// Maximum revisions to fetch (default: 5000)
    pub max_revisions: Option<usize>,
    /// Revisions per request, at most 500 (default: 500)
    pub page_size: Option<usize>,
    /// Per-request timeout in seconds (default: 30)
    pub request_timeout_secs: Option<u64>,
    /// Minimum delay between requests in milliseconds (default: 500)
    pub rate_limit_delay_ms: Option<u64>,
    /// Retry policy for transient failures
    pub retry: Option<RetryConfig>,
}

/// Retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts per page including the first (default: 1, no retries)
    pub max_attempts: Option<u32>,
    /// First backoff delay in milliseconds (default: 1000)
    pub initial_backoff_ms: Option<u64>,
    /// Backoff growth factor, at least 1.0 (default: 2.0)
    pub backoff_multiplier: Option<f64>,
}

/// Classification keyword rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifyConfig {
    /// Substrings marking an edit summary as a revert
    pub revert_keywords: Option<Vec<String>>,
    /// Substring marking a bot user name (default: "bot")
    pub bot_marker: Option<String>,
    /// Conflict-language categories, tag to keywords (replaces the defaults)
    pub categories: Option<BTreeMap<String, Vec<String>>>,
    /// Spike threshold as a multiple of mean daily edits (default: 3.0)
    pub spike_multiplier: Option<f64>,
}

/// Controversy score settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    pub weights: Option<WeightConfig>,
    pub ceilings: Option<CeilingConfig>,
}

/// Composite score weights; must sum to 1.0
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightConfig {
    /// Weight for the revert component (default: 0.4)
    pub reverts: Option<f64>,
    /// Weight for the unique-editor component (default: 0.3)
    pub editors: Option<f64>,
    /// Weight for the spike-day component (default: 0.3)
    pub spikes: Option<f64>,
}

/// Log-normalization saturation points
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CeilingConfig {
    /// Revert count that saturates the component (default: 1000)
    pub reverts: Option<f64>,
    /// Unique editor count that saturates the component (default: 1000)
    pub editors: Option<f64>,
    /// Spike-day percentage that saturates the component (default: 20)
    pub spike_percent: Option<f64>,
}

/// Resolved configuration with every default filled in
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub fetch: FetchOptions,
    pub source: MediaWikiSettings,
    pub retry: RetryPolicy,
    pub classifier: Classifier,
    pub weights: ScoringWeights,
    pub ceilings: NormalizationCeilings,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        EditwarConfig::default().resolve()
    }
}

/// Check that an API endpoint is an http(s) URL
pub fn validate_api_url(url: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("API URL must start with http:// or https:// (got {})", url);
    }
    Ok(())
}

fn validate_keywords(field: &str, keywords: &[String]) -> Result<()> {
    if keywords.is_empty() {
        anyhow::bail!("{} must not be empty", field);
    }
    if keywords.iter().any(|k| k.trim().is_empty()) {
        anyhow::bail!("{} must not contain blank keywords", field);
    }
    Ok(())
}

fn normalized_keywords(keywords: &[String]) -> Vec<String> {
    keywords.iter().map(|k| normalize_text(k)).collect()
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl EditwarConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(ref f) = self.fetch {
            if let Some(url) = &f.api_url {
                validate_api_url(url).context("invalid fetch.api_url")?;
            }
            if f.max_revisions == Some(0) {
                anyhow::bail!("fetch.max_revisions must be positive");
            }
            if let Some(size) = f.page_size {
                if size == 0 || size > MAX_PAGE_SIZE {
                    anyhow::bail!(
                        "fetch.page_size must be between 1 and {} (got {})",
                        MAX_PAGE_SIZE,
                        size
                    );
                }
            }
            if f.request_timeout_secs == Some(0) {
                anyhow::bail!("fetch.request_timeout_secs must be positive");
            }
            if let Some(ref r) = f.retry {
                if r.max_attempts == Some(0) {
                    anyhow::bail!("fetch.retry.max_attempts must be at least 1");
                }
                if let Some(m) = r.backoff_multiplier {
                    if !(m >= 1.0 && m.is_finite()) {
                        anyhow::bail!(
                            "fetch.retry.backoff_multiplier must be at least 1.0 (got {})",
                            m
                        );
                    }
                }
            }
        }

        if let Some(ref c) = self.classify {
            if let Some(keywords) = &c.revert_keywords {
                validate_keywords("classify.revert_keywords", keywords)?;
            }
            if let Some(marker) = &c.bot_marker {
                if marker.trim().is_empty() {
                    anyhow::bail!("classify.bot_marker must not be blank");
                }
            }
            if let Some(categories) = &c.categories {
                for (tag, keywords) in categories {
                    if tag.trim().is_empty() {
                        anyhow::bail!("classify.categories must not contain a blank tag");
                    }
                    validate_keywords(&format!("classify.categories.{}", tag), keywords)?;
                }
            }
            if let Some(m) = c.spike_multiplier {
                if !(m > 0.0 && m.is_finite()) {
                    anyhow::bail!("classify.spike_multiplier must be positive (got {})", m);
                }
            }
        }

        if let Some(ref s) = self.scoring {
            if let Some(ref w) = s.weights {
                let defaults = ScoringWeights::default();
                let resolved = [
                    ("reverts", w.reverts.unwrap_or(defaults.reverts)),
                    ("editors", w.editors.unwrap_or(defaults.editors)),
                    ("spikes", w.spikes.unwrap_or(defaults.spikes)),
                ];
                for (name, v) in resolved {
                    if !(v >= 0.0 && v.is_finite()) {
                        anyhow::bail!("scoring.weights.{} must be non-negative (got {})", name, v);
                    }
                }
                let sum: f64 = resolved.iter().map(|(_, v)| v).sum();
                if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                    anyhow::bail!("scoring.weights must sum to 1.0 (got {})", sum);
                }
            }
            if let Some(ref c) = s.ceilings {
                for (name, val) in [
                    ("reverts", c.reverts),
                    ("editors", c.editors),
                    ("spike_percent", c.spike_percent),
                ] {
                    if let Some(v) = val {
                        if !(v > 0.0 && v.is_finite()) {
                            anyhow::bail!("scoring.ceilings.{} must be positive (got {})", name, v);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Resolve config into the immutable form consumed by the pipeline
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let fetch = self.fetch.clone().unwrap_or_default();
        let fetch_options = FetchOptions {
            max_revisions: fetch.max_revisions.unwrap_or(DEFAULT_MAX_REVISIONS),
            page_size: fetch.page_size.unwrap_or(MAX_PAGE_SIZE),
        };
        let source = MediaWikiSettings {
            api_url: fetch
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            request_timeout: Duration::from_secs(fetch.request_timeout_secs.unwrap_or(30)),
            rate_limit_delay: Duration::from_millis(fetch.rate_limit_delay_ms.unwrap_or(500)),
        };
        let retry = match &fetch.retry {
            Some(r) => RetryPolicy {
                max_attempts: r.max_attempts.unwrap_or(1),
                initial_backoff: Duration::from_millis(r.initial_backoff_ms.unwrap_or(1000)),
                backoff_multiplier: r.backoff_multiplier.unwrap_or(2.0),
            },
            None => RetryPolicy::default(),
        };

        let classify = self.classify.clone().unwrap_or_default();
        let classifier = Classifier {
            revert_keywords: normalized_keywords(
                &classify
                    .revert_keywords
                    .unwrap_or_else(|| owned(DEFAULT_REVERT_KEYWORDS)),
            ),
            bot_marker: normalize_text(
                classify.bot_marker.as_deref().unwrap_or(DEFAULT_BOT_MARKER),
            ),
            categories: classify
                .categories
                .unwrap_or_else(default_categories)
                .into_iter()
                .map(|(tag, keywords)| (tag.trim().to_string(), normalized_keywords(&keywords)))
                .collect(),
            spike_multiplier: classify
                .spike_multiplier
                .unwrap_or(DEFAULT_SPIKE_MULTIPLIER),
        };

        let scoring = self.scoring.clone().unwrap_or_default();
        let weights = match &scoring.weights {
            Some(w) => {
                let d = ScoringWeights::default();
                ScoringWeights {
                    reverts: w.reverts.unwrap_or(d.reverts),
                    editors: w.editors.unwrap_or(d.editors),
                    spikes: w.spikes.unwrap_or(d.spikes),
                }
            }
            None => ScoringWeights::default(),
        };
        let ceilings = match &scoring.ceilings {
            Some(c) => {
                let d = NormalizationCeilings::default();
                NormalizationCeilings {
                    reverts: c.reverts.unwrap_or(d.reverts),
                    editors: c.editors.unwrap_or(d.editors),
                    spike_percent: c.spike_percent.unwrap_or(d.spike_percent),
                }
            }
            None => NormalizationCeilings::default(),
        };

        Ok(ResolvedConfig {
            fetch: fetch_options,
            source,
            retry,
            classifier,
            weights,
            ceilings,
            config_path: None,
        })
    }
}

/// Discover and load a config file from a directory
///
/// Search order:
/// 1. `.editwarrc.json`
/// 2. `editwar.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(dir: &Path) -> Result<Option<(EditwarConfig, PathBuf)>> {
    for name in [".editwarrc.json", "editwar.config.json"] {
        let path = dir.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<EditwarConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: EditwarConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config in `dir`.
/// Returns default config if nothing is found.
pub fn load_and_resolve(dir: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(dir)? {
            Some((config, path)) => (config, Some(path)),
            None => (EditwarConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    resolved.config_path = source_path;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let config = EditwarConfig::default();
        config.validate().expect("default config should be valid");
        let resolved = config.resolve().expect("default config should resolve");
        assert_eq!(resolved.fetch.max_revisions, 5000);
        assert_eq!(resolved.fetch.page_size, 500);
        assert_eq!(resolved.weights, ScoringWeights::default());
        assert_eq!(resolved.ceilings, NormalizationCeilings::default());
        assert_eq!(resolved.classifier, Classifier::default());
        assert_eq!(resolved.retry.max_attempts, 1);
        assert_eq!(resolved.source.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: EditwarConfig = serde_json::from_str("{}").unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "fetch": {
                "api_url": "https://de.wikipedia.org/w/api.php",
                "max_revisions": 200,
                "page_size": 50,
                "request_timeout_secs": 10,
                "rate_limit_delay_ms": 0,
                "retry": {"max_attempts": 3, "initial_backoff_ms": 250, "backoff_multiplier": 1.5}
            },
            "classify": {
                "revert_keywords": ["Revert", "  RV "],
                "bot_marker": "BOT",
                "categories": {"dispute": ["POV"]},
                "spike_multiplier": 2.5
            },
            "scoring": {
                "weights": {"reverts": 0.5, "editors": 0.25, "spikes": 0.25},
                "ceilings": {"reverts": 100, "editors": 50, "spike_percent": 10}
            }
        }"#;
        let config: EditwarConfig = serde_json::from_str(json).unwrap();
        let resolved = config.resolve().unwrap();

        assert_eq!(resolved.fetch.max_revisions, 200);
        assert_eq!(resolved.fetch.page_size, 50);
        assert_eq!(resolved.source.api_url, "https://de.wikipedia.org/w/api.php");
        assert_eq!(resolved.source.rate_limit_delay, Duration::ZERO);
        assert_eq!(resolved.retry.max_attempts, 3);
        assert_eq!(resolved.classifier.revert_keywords, vec!["revert", "rv"]);
        assert_eq!(resolved.classifier.bot_marker, "bot");
        assert_eq!(resolved.classifier.categories.len(), 1);
        assert_eq!(resolved.classifier.categories["dispute"], vec!["pov"]);
        assert_eq!(resolved.classifier.spike_multiplier, 2.5);
        assert_eq!(resolved.weights.reverts, 0.5);
        assert_eq!(resolved.ceilings.spike_percent, 10.0);
    }

    #[test]
    fn test_reject_unknown_fields() {
        let result: Result<EditwarConfig, _> = serde_json::from_str(r#"{"unknown_field": true}"#);
        assert!(result.is_err(), "unknown fields should be rejected");
        let nested: Result<EditwarConfig, _> =
            serde_json::from_str(r#"{"scoring": {"weights": {"bots": 0.1}}}"#);
        assert!(nested.is_err());
    }

    #[test]
    fn test_reject_weights_not_summing_to_one() {
        let json = r#"{"scoring": {"weights": {"reverts": 0.9}}}"#;
        let config: EditwarConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_negative_weight() {
        let json = r#"{"scoring": {"weights": {"reverts": -0.2, "editors": 0.6, "spikes": 0.6}}}"#;
        let config: EditwarConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_api_url() {
        assert!(validate_api_url("https://en.wikipedia.org/w/api.php").is_ok());
        assert!(validate_api_url("http://localhost:8080/api.php").is_ok());
        assert!(validate_api_url("en.wikipedia.org/w/api.php").is_err());
        assert!(validate_api_url("ftp://example.org/api.php").is_err());
        assert!(validate_api_url("").is_err());

        let json = r#"{"fetch": {"api_url": "wikipedia.org"}}"#;
        let config: EditwarConfig = serde_json::from_str(json).unwrap();
        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("fetch.api_url"));
    }

    #[test]
    fn test_reject_page_size_over_limit() {
        let json = r#"{"fetch": {"page_size": 501}}"#;
        let config: EditwarConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_zero_max_revisions() {
        let json = r#"{"fetch": {"max_revisions": 0}}"#;
        let config: EditwarConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_non_positive_spike_multiplier() {
        let json = r#"{"classify": {"spike_multiplier": 0}}"#;
        let config: EditwarConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_blank_keywords() {
        let json = r#"{"classify": {"revert_keywords": ["revert", "  "]}}"#;
        let config: EditwarConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());

        let json = r#"{"classify": {"categories": {"dispute": []}}}"#;
        let config: EditwarConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_zero_ceiling() {
        let json = r#"{"scoring": {"ceilings": {"editors": 0}}}"#;
        let config: EditwarConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discover_editwarrc() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(".editwarrc.json");
        fs::write(&config_path, r#"{"fetch": {"max_revisions": 42}}"#).unwrap();

        let (config, path) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.fetch.unwrap().max_revisions, Some(42));
        assert_eq!(path, config_path);
    }

    #[test]
    fn test_discover_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".editwarrc.json"),
            r#"{"fetch": {"max_revisions": 1}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("editwar.config.json"),
            r#"{"fetch": {"max_revisions": 2}}"#,
        )
        .unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(
            config.fetch.unwrap().max_revisions,
            Some(1),
            ".editwarrc.json should take priority"
        );
    }

    #[test]
    fn test_no_config_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_and_resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("custom.json");
        fs::write(&config_path, r#"{"classify": {"spike_multiplier": 4.0}}"#).unwrap();

        let resolved = load_and_resolve(dir.path(), Some(&config_path)).unwrap();
        assert_eq!(resolved.classifier.spike_multiplier, 4.0);
        assert_eq!(resolved.config_path, Some(config_path));
    }

    #[test]
    fn test_load_and_resolve_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_and_resolve(dir.path(), None).unwrap();
        assert!(resolved.config_path.is_none());
        assert_eq!(resolved.fetch.max_revisions, DEFAULT_MAX_REVISIONS);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bad.json");
        fs::write(&config_path, r#"{"fetch": {"page_size": 9999}}"#).unwrap();
        let err = load_config_file(&config_path).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.json"));
    }
}
