//! Page Inspect
//!
//! Parses one character page and prints the classified runs as JSON, so
//! selector or time-limit problems can be checked without a whole batch.
//!
//! Usage:
//!   page_inspect --file saved_page.html
//!   page_inspect --server 燃烧之刃 --character 某角色 [--http]
//!
//! The live mode uses the same config file and retry policy as the crawler.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;

use mplus_crawler::cancel::CancelToken;
use mplus_crawler::catalog::DungeonCatalog;
use mplus_crawler::classifier::classify;
use mplus_crawler::config::AppConfig;
use mplus_crawler::driver::{BrowserDriver, DriverKind, PageDriver};
use mplus_crawler::fetcher::{RetryPolicy, RetryingFetcher, TracingAttemptLog};
use mplus_crawler::models::RunRecord;
use mplus_crawler::parser::{self, ParsedPage};
use mplus_crawler::target;

// ── Arguments ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "page_inspect")]
#[command(about = "Parse a single character page and print its classified runs")]
struct Args {
    /// Saved page markup; skips the network entirely
    #[arg(long, conflicts_with_all = ["server", "character"])]
    file: Option<PathBuf>,

    #[arg(long, requires = "character")]
    server: Option<String>,

    #[arg(long, requires = "server")]
    character: Option<String>,

    /// Use a plain HTTP GET instead of the WebDriver session
    #[arg(long)]
    http: bool,

    #[arg(short, long, env = "MPLUS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct InspectOutput {
    source: String,
    rows_seen: usize,
    malformed: usize,
    runs: Vec<RunRecord>,
}

// ── Sources ──────────────────────────────────────────────────────────────────

async fn fetch_live(
    config: &AppConfig,
    server: &str,
    character: &str,
    http: bool,
) -> Result<(String, ParsedPage), String> {
    let url = target::character_url(
        &config.crawler.base_url,
        &config.crawler.region,
        server,
        character,
        &config.crawler.zone_id,
    );
    eprintln!("🌐 {}", url);

    let timeout = Duration::from_secs(config.crawler.page_load_timeout_secs);
    let kind = if http { DriverKind::Http } else { DriverKind::WebDriver };
    let mut driver = BrowserDriver::start(kind, &config.browser, timeout)
        .await
        .map_err(|e| e.to_string())?;

    let log = TracingAttemptLog;
    let policy = RetryPolicy::from(&config.crawler);
    let fetcher = RetryingFetcher::new(policy, &log, CancelToken::new());
    let fetched = fetcher.fetch(&mut driver, character, &url).await;

    if let Err(e) = driver.quit().await {
        eprintln!("⚠️  Closing browser session failed: {}", e);
    }

    let page = fetched.map_err(|e| e.to_string())?;
    eprintln!("   {} row(s) after {} attempt(s)", page.parsed.rows_seen, page.attempts);
    Ok((url, page.parsed))
}

fn summarize(source: String, parsed: &ParsedPage, catalog: &DungeonCatalog) -> InspectOutput {
    InspectOutput {
        source,
        rows_seen: parsed.rows_seen,
        malformed: parsed.malformed.len(),
        runs: parsed.runs.iter().map(|raw| classify(raw, catalog)).collect(),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig, String> {
    match path {
        Some(p) => AppConfig::load(p).map_err(|e| format!("{}: {}", p.display(), e)),
        None => Ok(AppConfig::default()),
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mplus_crawler=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let catalog = config.catalog();

    let (source, parsed) = match (&args.file, &args.server, &args.character) {
        (Some(file), _, _) => match std::fs::read_to_string(file) {
            Ok(markup) => (file.display().to_string(), parser::parse_page(&markup)),
            Err(e) => {
                eprintln!("❌ Cannot read {}: {}", file.display(), e);
                return ExitCode::FAILURE;
            }
        },
        (None, Some(server), Some(character)) => {
            match fetch_live(&config, server, character, args.http).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    eprintln!("❌ {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        _ => {
            eprintln!("❌ Either --file or --server/--character is required.");
            eprintln!("   Usage: page_inspect --file PAGE.html");
            eprintln!("          page_inspect --server SERVER --character NAME [--http]");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("\n🔍 Parsing rows...");
    let output = summarize(source, &parsed, &catalog);
    eprintln!(
        "   {} run(s) from {} row(s), {} malformed",
        output.runs.len(),
        output.rows_seen,
        output.malformed
    );

    match serde_json::to_string_pretty(&output) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Failed to serialise output: {}", e);
            ExitCode::FAILURE
        }
    }
}
