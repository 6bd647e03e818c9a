//! Retrying fetcher.
//!
//! Per character: `Idle → Loading → {RowsFound | NoRows | LoadError}`, looping
//! back to `Loading` until an attempt finds rows or `max_attempts` is spent
//! (`Exhausted`). Each attempt navigates, dwells for the settle duration (the
//! table renders asynchronously and there is no completion signal to poll),
//! optionally halts further resource loading, then parses the table rows.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::CrawlerConfig;
use crate::driver::{DriverError, PageDriver};
use crate::error::{Error, Result};
use crate::parser::{self, ParsedPage};

/// How one attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    RowsFound(usize),
    NoRows,
    /// The update link was clicked
    Clicked,
    LoadError(String),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowsFound(n) => write!(f, "{} row(s) found", n),
            Self::NoRows => write!(f, "no table rows"),
            Self::Clicked => write!(f, "update link clicked"),
            Self::LoadError(reason) => write!(f, "load failed: {}", reason),
        }
    }
}

/// One per-attempt log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub url: String,
    pub outcome: AttemptOutcome,
}

/// Sink for per-attempt log lines
pub trait AttemptLog {
    fn record(&self, attempt: &AttemptRecord);
}

/// Forwards attempt lines to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAttemptLog;

impl AttemptLog for TracingAttemptLog {
    fn record(&self, a: &AttemptRecord) {
        match &a.outcome {
            AttemptOutcome::RowsFound(_) | AttemptOutcome::Clicked => {
                tracing::info!(attempt = a.attempt, url = %a.url, "{}", a.outcome)
            }
            AttemptOutcome::NoRows => {
                tracing::warn!(attempt = a.attempt, url = %a.url, "{}", a.outcome)
            }
            AttemptOutcome::LoadError(_) => {
                tracing::error!(attempt = a.attempt, url = %a.url, "{}", a.outcome)
            }
        }
    }
}

/// Keeps attempt lines in memory
#[derive(Debug, Default)]
pub struct MemoryAttemptLog {
    lines: Mutex<Vec<AttemptRecord>>,
}

impl MemoryAttemptLog {
    pub fn lines(&self) -> Vec<AttemptRecord> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl AttemptLog for MemoryAttemptLog {
    fn record(&self, attempt: &AttemptRecord) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(attempt.clone());
        }
    }
}

#[derive(Debug)]
enum FetchState {
    Idle,
    Loading { attempt: u32 },
    RowsFound { attempt: u32, page: ParsedPage },
    NoRows { attempt: u32 },
    LoadError { attempt: u32 },
    Exhausted { attempts: u32 },
}

/// Rows parsed from the first attempt that showed any
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub parsed: ParsedPage,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub settle_wait: Duration,
    pub inter_attempt_pause: Duration,
    pub stop_loading: bool,
}

impl From<&CrawlerConfig> for RetryPolicy {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            settle_wait: config.settle_wait(),
            inter_attempt_pause: config.inter_attempt_pause(),
            stop_loading: config.stop_loading,
        }
    }
}

pub struct RetryingFetcher<'a, L: AttemptLog> {
    policy: RetryPolicy,
    log: &'a L,
    cancel: CancelToken,
}

impl<'a, L: AttemptLog> RetryingFetcher<'a, L> {
    pub fn new(policy: RetryPolicy, log: &'a L, cancel: CancelToken) -> Self {
        Self { policy, log, cancel }
    }

    /// Load `url` until a page with rows appears.
    ///
    /// `Error::FetchExhausted` after `max_attempts` empty or failed attempts;
    /// `Error::Interrupted` if cancelled between attempts.
    pub async fn fetch<D: PageDriver>(
        &self,
        driver: &mut D,
        character: &str,
        url: &str,
    ) -> Result<FetchedPage> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut state = FetchState::Idle;

        loop {
            state = match state {
                FetchState::Idle => FetchState::Loading { attempt: 1 },

                FetchState::Loading { attempt } => self.attempt(driver, url, attempt).await,

                FetchState::RowsFound { attempt, page } => {
                    return Ok(FetchedPage {
                        parsed: page,
                        attempts: attempt,
                    });
                }

                FetchState::NoRows { attempt } | FetchState::LoadError { attempt } => {
                    if attempt >= max_attempts {
                        FetchState::Exhausted { attempts: attempt }
                    } else if !self.cancel.sleep(self.policy.inter_attempt_pause).await {
                        return Err(Error::Interrupted);
                    } else {
                        FetchState::Loading { attempt: attempt + 1 }
                    }
                }

                FetchState::Exhausted { attempts } => {
                    tracing::error!(
                        character,
                        attempts,
                        "Page never showed rows, skipping character"
                    );
                    return Err(Error::FetchExhausted {
                        character: character.to_string(),
                        attempts,
                    });
                }
            };
        }
    }

    async fn attempt<D: PageDriver>(&self, driver: &mut D, url: &str, attempt: u32) -> FetchState {
        let (next, outcome) = match self.load(driver, url).await {
            Ok(page) if page.rows_seen > 0 => {
                let rows = page.rows_seen;
                (FetchState::RowsFound { attempt, page }, AttemptOutcome::RowsFound(rows))
            }
            Ok(_) => (FetchState::NoRows { attempt }, AttemptOutcome::NoRows),
            Err(e) => (
                FetchState::LoadError { attempt },
                AttemptOutcome::LoadError(e.to_string()),
            ),
        };
        self.log.record(&AttemptRecord {
            attempt,
            url: url.to_string(),
            outcome,
        });
        next
    }

    async fn load<D: PageDriver>(
        &self,
        driver: &mut D,
        url: &str,
    ) -> std::result::Result<ParsedPage, DriverError> {
        driver.navigate(url).await?;
        tokio::time::sleep(self.policy.settle_wait).await;

        if self.policy.stop_loading {
            if let Err(e) = driver.stop_loading().await {
                tracing::warn!(error = %e, "Could not stop page loading");
            }
        }

        let markup = driver.current_markup().await?;
        Ok(parser::parse_page(&markup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Serves scripted pages, one per navigate
    struct ScriptedDriver {
        script: VecDeque<std::result::Result<String, String>>,
        current: Option<String>,
        navigations: u32,
        stops: u32,
        fail_stop: bool,
    }

    impl ScriptedDriver {
        fn new(script: Vec<std::result::Result<String, String>>) -> Self {
            Self {
                script: script.into(),
                current: None,
                navigations: 0,
                stops: 0,
                fail_stop: false,
            }
        }
    }

    impl PageDriver for ScriptedDriver {
        async fn navigate(&mut self, _url: &str) -> std::result::Result<(), DriverError> {
            self.navigations += 1;
            match self.script.pop_front() {
                Some(Ok(page)) => {
                    self.current = Some(page);
                    Ok(())
                }
                Some(Err(reason)) => Err(DriverError::Protocol(reason)),
                None => Err(DriverError::NoPage),
            }
        }

        async fn current_markup(&mut self) -> std::result::Result<String, DriverError> {
            self.current.clone().ok_or(DriverError::NoPage)
        }

        async fn stop_loading(&mut self) -> std::result::Result<(), DriverError> {
            self.stops += 1;
            if self.fail_stop {
                Err(DriverError::Protocol("script error".into()))
            } else {
                Ok(())
            }
        }
    }

    fn rows_page(n: usize) -> String {
        let rows = "<tr role=\"row\"><td>x</td></tr>".repeat(n);
        format!("<html><body><table><tbody>{}</tbody></table></body></html>", rows)
    }

    fn empty_page() -> String {
        "<html><body><div>Loading</div></body></html>".to_string()
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            settle_wait: Duration::ZERO,
            inter_attempt_pause: Duration::ZERO,
            stop_loading: true,
        }
    }

    #[tokio::test]
    async fn third_attempt_succeeds() {
        let log = MemoryAttemptLog::default();
        let fetcher = RetryingFetcher::new(policy(3), &log, CancelToken::new());
        let mut driver =
            ScriptedDriver::new(vec![Ok(empty_page()), Ok(empty_page()), Ok(rows_page(4))]);

        let page = fetcher.fetch(&mut driver, "X", "https://example.test/x").await.unwrap();
        assert_eq!(page.parsed.rows_seen, 4);
        assert_eq!(page.attempts, 3);
        assert!(page.parsed.runs.is_empty());

        let lines = log.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].outcome, AttemptOutcome::NoRows);
        assert_eq!(lines[1].outcome, AttemptOutcome::NoRows);
        assert_eq!(lines[2].outcome, AttemptOutcome::RowsFound(4));
        assert_eq!(lines[2].attempt, 3);
        assert_eq!(lines[2].url, "https://example.test/x");
    }

    #[tokio::test]
    async fn stops_after_first_success() {
        let log = MemoryAttemptLog::default();
        let fetcher = RetryingFetcher::new(policy(3), &log, CancelToken::new());
        let mut driver = ScriptedDriver::new(vec![Ok(rows_page(2)), Ok(rows_page(9))]);

        let page = fetcher.fetch(&mut driver, "X", "u").await.unwrap();
        assert_eq!(page.parsed.rows_seen, 2);
        assert_eq!(driver.navigations, 1);
        assert_eq!(log.lines().len(), 1);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let log = MemoryAttemptLog::default();
        let fetcher = RetryingFetcher::new(policy(3), &log, CancelToken::new());
        let mut driver = ScriptedDriver::new(vec![
            Err("net::ERR_PROXY_CONNECTION_FAILED".into()),
            Ok(empty_page()),
            Ok(empty_page()),
            Ok(rows_page(5)),
        ]);

        let err = fetcher.fetch(&mut driver, "X", "u").await.unwrap_err();
        assert!(matches!(
            err,
            Error::FetchExhausted { ref character, attempts: 3 } if character == "X"
        ));
        assert_eq!(driver.navigations, 3);

        let lines = log.lines();
        assert_eq!(lines.len(), 3);
        assert!(matches!(
            lines[0].outcome,
            AttemptOutcome::LoadError(ref r) if r.contains("ERR_PROXY")
        ));
    }

    #[tokio::test]
    async fn stop_loading_failure_is_not_fatal() {
        let log = MemoryAttemptLog::default();
        let fetcher = RetryingFetcher::new(policy(1), &log, CancelToken::new());
        let mut driver = ScriptedDriver::new(vec![Ok(rows_page(1))]);
        driver.fail_stop = true;

        let page = fetcher.fetch(&mut driver, "X", "u").await.unwrap();
        assert_eq!(page.parsed.rows_seen, 1);
        assert_eq!(driver.stops, 1);
    }

    #[tokio::test]
    async fn stop_loading_can_be_disabled() {
        let log = MemoryAttemptLog::default();
        let mut no_stop = policy(1);
        no_stop.stop_loading = false;
        let fetcher = RetryingFetcher::new(no_stop, &log, CancelToken::new());
        let mut driver = ScriptedDriver::new(vec![Ok(rows_page(1))]);

        fetcher.fetch(&mut driver, "X", "u").await.unwrap();
        assert_eq!(driver.stops, 0);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let log = MemoryAttemptLog::default();
        let fetcher = RetryingFetcher::new(policy(0), &log, CancelToken::new());
        let mut driver = ScriptedDriver::new(vec![Ok(empty_page())]);

        let err = fetcher.fetch(&mut driver, "X", "u").await.unwrap_err();
        assert!(matches!(err, Error::FetchExhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn cancel_stops_before_next_attempt() {
        let log = MemoryAttemptLog::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let fetcher = RetryingFetcher::new(policy(3), &log, cancel);
        let mut driver = ScriptedDriver::new(vec![Ok(empty_page()), Ok(rows_page(3))]);

        let err = fetcher.fetch(&mut driver, "X", "u").await.unwrap_err();
        assert!(matches!(err, Error::Interrupted));
        assert_eq!(driver.navigations, 1);
        assert_eq!(log.lines().len(), 1);
    }
}
