//! `themalinks-viewer`: run the viewer pipeline for one URL from the shell.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;

use themalinks_viewer::{HttpConfig, Link, ViewerBuilder, ViewerState};

#[derive(Parser)]
#[command(
    name = "themalinks-viewer",
    about = "Load a page the way the ThemaLinks viewer does: direct embed or sanitized proxy copy",
    version
)]
struct Cli {
    /// Page to open.
    url: String,

    /// Link title shown in logs.
    #[arg(long, default_value = "link")]
    title: String,

    /// Direct-embed probe timeout in milliseconds.
    #[arg(long, default_value_t = 3000)]
    probe_timeout_ms: u64,

    /// Per-endpoint fetch timeout in milliseconds.
    #[arg(long, default_value_t = 15_000)]
    fetch_timeout_ms: u64,

    /// Pause between proxy endpoints in milliseconds.
    #[arg(long, default_value_t = 1000)]
    backoff_ms: u64,

    /// Health-check every proxy first and start with the first healthy one.
    #[arg(long)]
    find_best: bool,

    /// Write the sanitized document here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the viewer snapshot as JSON.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let http = HttpConfig {
        timeout: Duration::from_millis(cli.fetch_timeout_ms),
        ..HttpConfig::default()
    };
    let viewer = ViewerBuilder::from_http(&http)?
        .probe_timeout(Duration::from_millis(cli.probe_timeout_ms))
        .fetch_timeout(Duration::from_millis(cli.fetch_timeout_ms))
        .retry_backoff(Duration::from_millis(cli.backoff_ms))
        .build()?;

    if cli.find_best && viewer.orchestrator().find_best_endpoint().await.is_none() {
        tracing::warn!("Continuing with the default endpoint order");
    }

    viewer.open(&Link::new(cli.title, cli.url)).await;
    let snapshot = viewer.snapshot();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    match snapshot.state {
        ViewerState::DirectReady => {
            if !cli.json {
                println!("direct: {}", snapshot.url.unwrap_or_default());
            }
        }
        ViewerState::ContentReady => {
            let content = snapshot.content.unwrap_or_default();
            match &cli.output {
                Some(path) => std::fs::write(path, &content)
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None if !cli.json => println!("{content}"),
                None => {}
            }
        }
        state => {
            let reason = snapshot
                .error
                .map_or_else(|| format!("viewer stopped in {state:?}"), |e| e.to_string());
            match viewer.external_url() {
                Some(url) => bail!("{reason} (open externally: {url})"),
                None => bail!("{reason}"),
            }
        }
    }
    Ok(())
}
