//! Typed configuration, loaded from an optional TOML file

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::catalog::{CatalogOverrides, DungeonCatalog};
use crate::error::{Error, Result};

/// Retry policy and lookup target
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub max_attempts: u32,
    /// Dwell after navigation; the page renders its table asynchronously
    pub settle_wait_secs: f64,
    pub inter_attempt_pause_secs: f64,
    pub page_load_timeout_secs: u64,
    /// Halt remaining resource loads (ads, trackers) before reading the page
    pub stop_loading: bool,
    pub zone_id: String,
    pub base_url: String,
    pub region: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            settle_wait_secs: 6.0,
            inter_attempt_pause_secs: 2.0,
            page_load_timeout_secs: 10,
            stop_loading: true,
            zone_id: "45".to_string(),
            base_url: "https://www.warcraftlogs.com".to_string(),
            region: "cn".to_string(),
        }
    }
}

impl CrawlerConfig {
    pub fn settle_wait(&self) -> Duration {
        secs(self.settle_wait_secs)
    }

    pub fn inter_attempt_pause(&self) -> Duration {
        secs(self.inter_attempt_pause_secs)
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Options for the WebDriver browser session
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub disable_gpu: bool,
    pub no_sandbox: bool,
    pub log_level: Option<u8>,
    pub proxy_server: Option<String>,
    pub window_size: Option<String>,
    pub user_agent: Option<String>,
    /// `none`, `eager` or `normal`
    pub page_load_strategy: String,
    pub disable_extensions: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            disable_gpu: true,
            no_sandbox: true,
            log_level: Some(3),
            proxy_server: None,
            window_size: Some("1920,1080".to_string()),
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            page_load_strategy: "eager".to_string(),
            disable_extensions: true,
        }
    }
}

impl BrowserConfig {
    /// Chrome command-line switches for these options
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.headless {
            args.push("--headless".to_string());
        }
        if self.disable_gpu {
            args.push("--disable-gpu".to_string());
        }
        if self.no_sandbox {
            args.push("--no-sandbox".to_string());
        }
        if let Some(level) = self.log_level {
            args.push(format!("--log-level={}", level));
        }
        if let Some(proxy) = self.proxy_server.as_deref().filter(|p| !p.is_empty()) {
            args.push(format!("--proxy-server={}", proxy));
        }
        if let Some(size) = self.window_size.as_deref().filter(|s| !s.is_empty()) {
            args.push(format!("--window-size={}", size));
        }
        if let Some(ua) = self.user_agent.as_deref().filter(|u| !u.is_empty()) {
            args.push(format!("--user-agent={}", ua));
        }
        if self.disable_extensions {
            args.push("--disable-extensions".to_string());
        }
        args
    }
}

/// Whole config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub crawler: CrawlerConfig,
    pub browser: BrowserConfig,
    pub catalog: Option<CatalogOverrides>,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.crawler.max_attempts == 0 {
            return Err(Error::Config("crawler.max_attempts must be at least 1".into()));
        }
        if self.crawler.zone_id.trim().is_empty() {
            return Err(Error::Config("crawler.zone_id must not be empty".into()));
        }
        if !matches!(self.browser.page_load_strategy.as_str(), "none" | "eager" | "normal") {
            return Err(Error::Config(format!(
                "browser.page_load_strategy must be none, eager or normal (got {:?})",
                self.browser.page_load_strategy
            )));
        }
        Ok(())
    }

    /// Catalog built from the season defaults plus any `[catalog]` edits
    pub fn catalog(&self) -> DungeonCatalog {
        match &self.catalog {
            Some(overrides) => DungeonCatalog::with_overrides(overrides),
            None => DungeonCatalog::season_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.crawler.max_attempts, 3);
        assert_eq!(config.crawler.settle_wait(), Duration::from_secs(6));
        assert_eq!(config.crawler.inter_attempt_pause(), Duration::from_secs(2));
        assert_eq!(config.crawler.zone_id, "45");
        assert_eq!(config.browser.page_load_strategy, "eager");
        assert_eq!(config.catalog().dungeons().len(), 8);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let text = r#"
            [crawler]
            max_attempts = 5
            zone_id = "47"

            [browser]
            proxy_server = "http://127.0.0.1:7890"

            [catalog.time_limits]
            "破晨号" = 1920
        "#;
        let config = AppConfig::from_toml_str(text).unwrap();
        assert_eq!(config.crawler.max_attempts, 5);
        assert_eq!(config.crawler.zone_id, "47");
        assert_eq!(config.crawler.region, "cn");
        assert!(config.browser.headless);
        assert!(config
            .browser
            .chrome_args()
            .contains(&"--proxy-server=http://127.0.0.1:7890".to_string()));
        assert_eq!(config.catalog().time_limit("破晨号"), Some(1920));
    }

    #[test]
    fn rejects_zero_attempts() {
        let err = AppConfig::from_toml_str("[crawler]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_unknown_load_strategy() {
        let err =
            AppConfig::from_toml_str("[browser]\npage_load_strategy = \"lazy\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn negative_wait_clamps_to_zero() {
        let config = CrawlerConfig {
            settle_wait_secs: -1.0,
            ..Default::default()
        };
        assert_eq!(config.settle_wait(), Duration::ZERO);
    }
}
