//! Update-link clicker.
//!
//! Walks the roster and clicks the character page's update link, which makes
//! the site re-import that character's recent logs before the next crawl.
//! Same address, settle wait, attempt budget and pause as the fetcher; an
//! attempt succeeds once the click goes through.

use serde::Serialize;

use crate::cancel::CancelToken;
use crate::config::CrawlerConfig;
use crate::driver::{DriverError, PageDriver};
use crate::error::{Error, Result};
use crate::fetcher::{AttemptLog, AttemptOutcome, AttemptRecord, RetryPolicy};
use crate::models::Character;
use crate::target;

/// DOM id of the page's update link
pub const UPDATE_LINK_ID: &str = "update-link";

#[derive(Debug, Default, Clone, Serialize)]
pub struct RefreshSummary {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
}

pub struct UpdateClicker<'a, L: AttemptLog> {
    config: &'a CrawlerConfig,
    log: &'a L,
    cancel: CancelToken,
}

impl<'a, L: AttemptLog> UpdateClicker<'a, L> {
    pub fn new(config: &'a CrawlerConfig, log: &'a L, cancel: CancelToken) -> Self {
        Self {
            config,
            log,
            cancel,
        }
    }

    /// Click update for every character in roster order, then quit `driver`.
    ///
    /// A character whose link never clicks lands in `failed`; only an interrupt
    /// ends the walk early.
    pub async fn run<D: PageDriver>(
        &self,
        roster: &[Character],
        mut driver: D,
    ) -> Result<RefreshSummary> {
        let summary = self.click_all(roster, &mut driver).await;

        if let Err(e) = driver.quit().await {
            tracing::warn!(error = %e, "Error while closing browser session");
        }
        summary
    }

    async fn click_all<D: PageDriver>(
        &self,
        roster: &[Character],
        driver: &mut D,
    ) -> Result<RefreshSummary> {
        let mut summary = RefreshSummary::default();

        for (i, character) in roster.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(done = i, total = roster.len(), "Interrupted");
                return Err(Error::Interrupted);
            }

            tracing::info!(
                character = %character.name,
                server = %character.server,
                "Requesting update ({}/{})",
                i + 1,
                roster.len()
            );

            let url = target::character_url(
                &self.config.base_url,
                &self.config.region,
                &character.server,
                &character.name,
                &self.config.zone_id,
            );
            match self.click_update(driver, &character.name, &url).await {
                Ok(_) => summary.refreshed.push(character.name.clone()),
                Err(Error::UpdateFailed { character, .. }) => summary.failed.push(character),
                Err(e) => return Err(e),
            }
        }

        Ok(summary)
    }

    /// Load `url` and click its update link, retrying; returns the attempt that worked
    pub async fn click_update<D: PageDriver>(
        &self,
        driver: &mut D,
        character: &str,
        url: &str,
    ) -> Result<u32> {
        let policy = RetryPolicy::from(self.config);
        let max_attempts = policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let outcome = match self.try_click(driver, url, &policy).await {
                Ok(()) => AttemptOutcome::Clicked,
                Err(e) => AttemptOutcome::LoadError(e.to_string()),
            };
            let clicked = outcome == AttemptOutcome::Clicked;
            self.log.record(&AttemptRecord {
                attempt,
                url: url.to_string(),
                outcome,
            });

            if clicked {
                // give the site a moment to queue the import
                self.cancel.sleep(policy.inter_attempt_pause).await;
                return Ok(attempt);
            }
            if attempt < max_attempts && !self.cancel.sleep(policy.inter_attempt_pause).await {
                return Err(Error::Interrupted);
            }
        }

        tracing::error!(
            character,
            attempts = max_attempts,
            "Update link never clicked, skipping"
        );
        Err(Error::UpdateFailed {
            character: character.to_string(),
            attempts: max_attempts,
        })
    }

    async fn try_click<D: PageDriver>(
        &self,
        driver: &mut D,
        url: &str,
        policy: &RetryPolicy,
    ) -> std::result::Result<(), DriverError> {
        driver.navigate(url).await?;
        tokio::time::sleep(policy.settle_wait).await;
        driver.click(UPDATE_LINK_ID).await
    }
}
