//! Update Clicker
//!
//! Clicks the update link on every roster character's page so the site
//! re-imports their latest logs. Run it ahead of `mplus_crawler`.
//!
//! Usage:
//!   update_clicker [--roster data/character_info.json] [--config mplus_crawler.toml]
//!
//! Needs a running WebDriver endpoint (chromedriver); a plain HTTP client
//! cannot click.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mplus_crawler::cancel::CancelToken;
use mplus_crawler::config::AppConfig;
use mplus_crawler::driver::{BrowserDriver, DriverKind};
use mplus_crawler::fetcher::TracingAttemptLog;
use mplus_crawler::refresh::{RefreshSummary, UpdateClicker};
use mplus_crawler::roster::load_roster;

#[derive(Parser, Debug)]
#[command(name = "update_clicker")]
#[command(about = "Ask the log site to refresh every roster character")]
struct Args {
    #[arg(short, long, default_value = "data/character_info.json", env = "MPLUS_ROSTER")]
    roster: PathBuf,

    #[arg(short, long, env = "MPLUS_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides browser.webdriver_url
    #[arg(long, env = "MPLUS_WEBDRIVER_URL")]
    webdriver_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mplus_crawler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(summary) => {
            eprintln!("✅ {} character(s) refreshed", summary.refreshed.len());
            if !summary.failed.is_empty() {
                eprintln!("⚠️  No update link clicked for: {}", summary.failed.join(", "));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<RefreshSummary> {
    let mut config = match args.config.as_deref() {
        Some(p) => AppConfig::load(p)
            .with_context(|| format!("Failed to load config {}", p.display()))?,
        None => AppConfig::default(),
    };
    if let Some(url) = args.webdriver_url {
        config.browser.webdriver_url = url;
    }

    let roster = load_roster(&args.roster)
        .with_context(|| format!("Failed to load roster {}", args.roster.display()))?;

    let cancel = CancelToken::new();
    cancel.cancel_on_ctrl_c();

    let timeout = Duration::from_secs(config.crawler.page_load_timeout_secs);
    let driver = BrowserDriver::start(DriverKind::WebDriver, &config.browser, timeout)
        .await
        .with_context(|| {
            format!("Failed to start browser session at {}", config.browser.webdriver_url)
        })?;

    let log = TracingAttemptLog;
    let clicker = UpdateClicker::new(&config.crawler, &log, cancel);
    clicker.run(&roster, driver).await.context("Update run failed")
}
