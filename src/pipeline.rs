//! Batch orchestration: roster → resolve → fetch → parse → classify → aggregate.
//!
//! Characters are processed strictly one after another, in roster order, on a
//! single browser session that is quit on every exit path.

use crate::aggregate::aggregate;
use crate::cancel::CancelToken;
use crate::catalog::DungeonCatalog;
use crate::classifier::classify;
use crate::config::CrawlerConfig;
use crate::driver::PageDriver;
use crate::error::{Error, Result};
use crate::fetcher::{AttemptLog, RetryPolicy, RetryingFetcher};
use crate::models::{BatchReport, Character, TrackedRun};
use crate::target;

pub struct Pipeline<'a, L: AttemptLog> {
    config: &'a CrawlerConfig,
    catalog: &'a DungeonCatalog,
    log: &'a L,
    cancel: CancelToken,
}

/// Runs collected so far plus the characters that were skipped
#[derive(Debug, Default)]
struct Crawl {
    records: Vec<TrackedRun>,
    skipped: Vec<String>,
}

impl<'a, L: AttemptLog> Pipeline<'a, L> {
    pub fn new(
        config: &'a CrawlerConfig,
        catalog: &'a DungeonCatalog,
        log: &'a L,
        cancel: CancelToken,
    ) -> Self {
        Self {
            config,
            catalog,
            log,
            cancel,
        }
    }

    /// Crawl a validated roster on `driver`, then aggregate.
    ///
    /// The driver is quit before returning, whatever the outcome. Fails with
    /// `Error::EmptyBatch` when no character produced any run, and with
    /// `Error::Interrupted` when cancelled (partial results are dropped).
    pub async fn run<D: PageDriver>(
        &self,
        roster: &[Character],
        mut driver: D,
    ) -> Result<BatchReport> {
        let crawl = self.crawl(roster, &mut driver).await;

        if let Err(e) = driver.quit().await {
            tracing::warn!(error = %e, "Error while closing browser session");
        }

        let Crawl { records, skipped } = crawl?;
        if records.is_empty() {
            tracing::error!("No dungeon runs were collected; nothing to report");
            return Err(Error::EmptyBatch);
        }

        let agg = aggregate(roster, &records, self.catalog);
        tracing::info!(
            runs = records.len(),
            characters = agg.matrix.rows.len(),
            skipped = skipped.len(),
            "Batch aggregated"
        );

        Ok(BatchReport {
            generated_at: chrono::Local::now(),
            zone_id: self.config.zone_id.clone(),
            records,
            matrix: agg.matrix,
            character_stats: agg.character_stats,
            dungeon_stats: agg.dungeon_stats,
            level_distribution: agg.level_distribution,
            skipped,
        })
    }

    async fn crawl<D: PageDriver>(&self, roster: &[Character], driver: &mut D) -> Result<Crawl> {
        let mut crawl = Crawl::default();

        for (i, character) in roster.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    done = i,
                    total = roster.len(),
                    "Interrupted, discarding partial batch"
                );
                return Err(Error::Interrupted);
            }

            tracing::info!(
                player = %character.player,
                character = %character.name,
                server = %character.server,
                "Fetching character ({}/{})",
                i + 1,
                roster.len()
            );

            match self.character_runs(driver, character).await {
                Ok(runs) => {
                    tracing::info!(
                        character = %character.name,
                        runs = runs.len(),
                        "Character done"
                    );
                    crawl.records.extend(runs);
                }
                Err(Error::FetchExhausted { character, .. }) => crawl.skipped.push(character),
                Err(e) => return Err(e),
            }
        }

        Ok(crawl)
    }

    /// Resolve, fetch with retries, parse and classify one character's runs, in page order
    pub async fn character_runs<D: PageDriver>(
        &self,
        driver: &mut D,
        character: &Character,
    ) -> Result<Vec<TrackedRun>> {
        let url = target::character_url(
            &self.config.base_url,
            &self.config.region,
            &character.server,
            &character.name,
            &self.config.zone_id,
        );

        let policy = RetryPolicy::from(self.config);
        let fetcher = RetryingFetcher::new(policy, self.log, self.cancel.clone());
        let page = fetcher.fetch(driver, &character.name, &url).await?;

        Ok(page
            .parsed
            .runs
            .iter()
            .map(|raw| TrackedRun {
                player: character.player.clone(),
                character: character.name.clone(),
                server: character.server.clone(),
                run: classify(raw, self.catalog),
            })
            .collect())
    }
}
