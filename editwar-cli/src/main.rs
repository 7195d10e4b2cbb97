//! editwar CLI - Wikipedia edit-war and controversy analysis

#![deny(warnings)]

// Global invariants enforced:
// - Deterministic output ordering
// - Logs go to stderr; stdout carries only the report
// - A fetch failure never renders as an empty history

use anyhow::Context;
use clap::{Parser, Subcommand};
use editwar_core::config::{self, ResolvedConfig};
use editwar_core::mediawiki::MediaWikiClient;
use editwar_core::retry::RetryingSource;
use editwar_core::{analyze_article, render_json, render_jsonl, render_text};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "editwar")]
#[command(about = "Revision-history controversy analysis for Wikipedia articles")]
#[command(version = env!("EDITWAR_VERSION"))]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an article's revision history and score it
    Analyze {
        /// Exact article title (e.g. "Climate change")
        title: String,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Maximum revisions to fetch (overrides config file)
        #[arg(long)]
        max_revisions: Option<usize>,

        /// MediaWiki API endpoint (overrides config file)
        #[arg(long)]
        api_url: Option<String>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate or inspect a configuration file
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without running analysis
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Jsonl,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze {
            title,
            format,
            max_revisions,
            api_url,
            config: config_path,
        } => {
            if title.trim().is_empty() {
                anyhow::bail!("article title cannot be empty");
            }

            let working_dir = std::env::current_dir()?;
            let mut resolved = config::load_and_resolve(&working_dir, config_path.as_deref())
                .context("failed to load configuration")?;

            if let Some(config_path) = &resolved.config_path {
                tracing::info!("Using config: {}", config_path.display());
            }

            // CLI flags override config file values
            if let Some(max) = max_revisions {
                if max == 0 {
                    anyhow::bail!("--max-revisions must be positive");
                }
                resolved.fetch.max_revisions = max;
            }
            if let Some(url) = api_url {
                config::validate_api_url(&url).context("invalid --api-url")?;
                resolved.source.api_url = url;
            }

            let client = MediaWikiClient::new(&resolved.source)
                .context("failed to build MediaWiki client")?;
            let source = RetryingSource::new(client, resolved.retry);

            // First Ctrl-C stops the fetch and reports the partial history;
            // a second one exits immediately
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                tracing::warn!("interrupt received, stopping fetch (Ctrl-C again to exit)");
                on_interrupt.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            });

            let analysis = analyze_article(&source, &title, &resolved, &cancel)
                .await
                .with_context(|| format!("failed to fetch revision history for '{}'", title))?;

            let output = match format {
                OutputFormat::Text => render_text(&analysis),
                OutputFormat::Json => render_json(&analysis)?,
                OutputFormat::Jsonl => render_jsonl(&analysis)?,
            };
            print!("{}", output);
            if matches!(format, OutputFormat::Json) {
                println!();
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let working_dir = std::env::current_dir()?;
                let config_path = match path {
                    Some(p) => p,
                    None => match config::discover_config(&working_dir) {
                        Ok(Some((_, p))) => p,
                        Ok(None) => {
                            println!("No config file found. Using defaults.");
                            return Ok(());
                        }
                        Err(e) => {
                            eprintln!("Config validation failed: {:#}", e);
                            std::process::exit(1);
                        }
                    },
                };

                match config::load_config_file(&config_path).and_then(|c| c.resolve()) {
                    Ok(_) => println!("Config valid: {}", config_path.display()),
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let working_dir = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&working_dir, path.as_deref())
                    .context("failed to load configuration")?;
                print_resolved_config(&resolved);
            }
        },
    }

    Ok(())
}

fn print_resolved_config(resolved: &ResolvedConfig) {
    println!("Configuration:");
    if let Some(ref p) = resolved.config_path {
        println!("  Source: {}", p.display());
    } else {
        println!("  Source: defaults (no config file found)");
    }
    println!();
    println!("Fetch:");
    println!("  api_url: {}", resolved.source.api_url);
    println!("  max_revisions: {}", resolved.fetch.max_revisions);
    println!("  page_size: {}", resolved.fetch.page_size);
    println!(
        "  request_timeout: {}s",
        resolved.source.request_timeout.as_secs()
    );
    println!(
        "  rate_limit_delay: {}ms",
        resolved.source.rate_limit_delay.as_millis()
    );
    println!(
        "  retry: {} attempt(s), backoff {}ms x{}",
        resolved.retry.max_attempts,
        resolved.retry.initial_backoff.as_millis(),
        resolved.retry.backoff_multiplier
    );
    println!();
    println!("Classification:");
    println!(
        "  revert_keywords: {}",
        resolved.classifier.revert_keywords.join(", ")
    );
    println!("  bot_marker: {}", resolved.classifier.bot_marker);
    println!("  spike_multiplier: {}", resolved.classifier.spike_multiplier);
    for (tag, keywords) in &resolved.classifier.categories {
        println!("  category {}: {}", tag, keywords.join(", "));
    }
    println!();
    println!("Weights:");
    println!("  reverts: {}", resolved.weights.reverts);
    println!("  editors: {}", resolved.weights.editors);
    println!("  spikes: {}", resolved.weights.spikes);
    println!();
    println!("Ceilings:");
    println!("  reverts: {}", resolved.ceilings.reverts);
    println!("  editors: {}", resolved.ceilings.editors);
    println!("  spike_percent: {}", resolved.ceilings.spike_percent);
}
