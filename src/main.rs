use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mplus_crawler::cancel::CancelToken;
use mplus_crawler::config::AppConfig;
use mplus_crawler::driver::{BrowserDriver, DriverKind};
use mplus_crawler::fetcher::TracingAttemptLog;
use mplus_crawler::pipeline::Pipeline;
use mplus_crawler::report::write_report;
use mplus_crawler::roster::load_roster;

const DEFAULT_CONFIG: &str = "mplus_crawler.toml";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DriverArg {
    /// Real browser through a WebDriver endpoint (chromedriver)
    Webdriver,
    /// Plain HTTP GET, no script execution
    Http,
}

impl From<DriverArg> for DriverKind {
    fn from(arg: DriverArg) -> Self {
        match arg {
            DriverArg::Webdriver => DriverKind::WebDriver,
            DriverArg::Http => DriverKind::Http,
        }
    }
}

/// Command-line arguments for mplus_crawler
#[derive(Parser, Debug)]
#[command(name = "mplus_crawler")]
#[command(about = "Collect Mythic+ dungeon runs for a roster of characters")]
#[command(version)]
struct Args {
    /// Roster file (JSON array of rows with player/character/server/class columns)
    #[arg(short, long, default_value = "data/character_info.json", env = "MPLUS_ROSTER")]
    roster: PathBuf,

    /// TOML config file; `mplus_crawler.toml` is used when present
    #[arg(short, long, env = "MPLUS_CONFIG")]
    config: Option<PathBuf>,

    /// Directory the batch report is written to
    #[arg(short, long, default_value = "reports", env = "MPLUS_OUT_DIR")]
    out_dir: PathBuf,

    #[arg(long, value_enum, default_value = "webdriver")]
    driver: DriverArg,

    /// Overrides browser.webdriver_url
    #[arg(long, env = "MPLUS_WEBDRIVER_URL")]
    webdriver_url: Option<String>,

    /// Overrides crawler.zone_id
    #[arg(long)]
    zone: Option<String>,
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
        Ok(path) => {
            eprintln!("✅ Report written to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<PathBuf> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(url) = args.webdriver_url {
        config.browser.webdriver_url = url;
    }
    if let Some(zone) = args.zone {
        config.crawler.zone_id = zone;
    }

    // Roster problems are fatal before any browser is started
    let roster = load_roster(&args.roster)
        .with_context(|| format!("Failed to load roster {}", args.roster.display()))?;
    let catalog = config.catalog();

    info!(
        characters = roster.len(),
        zone = %config.crawler.zone_id,
        "Starting batch"
    );

    let cancel = CancelToken::new();
    cancel.cancel_on_ctrl_c();

    let timeout = Duration::from_secs(config.crawler.page_load_timeout_secs);
    let driver = BrowserDriver::start(args.driver.into(), &config.browser, timeout)
        .await
        .with_context(|| {
            format!("Failed to start {:?} driver at {}", args.driver, config.browser.webdriver_url)
        })?;

    let log = TracingAttemptLog;
    let pipeline = Pipeline::new(&config.crawler, &catalog, &log, cancel);
    let report = pipeline.run(&roster, driver).await.context("Batch failed")?;

    for name in &report.skipped {
        tracing::warn!(character = %name, "Skipped: no runs found after all attempts");
    }

    write_report(&report, &args.out_dir).context("Failed to write report")
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(p) => AppConfig::load(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            AppConfig::load(Path::new(DEFAULT_CONFIG)).context("Failed to load mplus_crawler.toml")
        }
        None => Ok(AppConfig::default()),
    }
}
