//! Folding classified runs into the performance matrix and summary statistics.
//!
//! Everything here is recomputed from scratch per batch. The matrix keeps the
//! first run seen for each (player, character, dungeon), in input order, and
//! ignores later ones; it does not look for the best run.

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::DungeonCatalog;
use crate::models::*;

/// Output of both reductions
#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    pub matrix: PerformanceMatrix,
    pub character_stats: Vec<CharacterStat>,
    pub dungeon_stats: Vec<DungeonStat>,
    pub level_distribution: Vec<LevelBucket>,
}

pub fn aggregate(
    roster: &[Character],
    runs: &[TrackedRun],
    catalog: &DungeonCatalog,
) -> Aggregates {
    Aggregates {
        matrix: build_matrix(runs),
        character_stats: character_stats(roster, runs),
        dungeon_stats: dungeon_stats(runs, catalog),
        level_distribution: level_distribution(runs),
    }
}

/// Rows sorted by (player, character), columns by dungeon name; absent cells are `-`
pub fn build_matrix(runs: &[TrackedRun]) -> PerformanceMatrix {
    let mut columns: BTreeSet<&str> = BTreeSet::new();
    let mut firsts: BTreeMap<(&str, &str), BTreeMap<&str, &str>> = BTreeMap::new();

    for tracked in runs {
        let dungeon = tracked.run.dungeon_name.as_str();
        columns.insert(dungeon);
        firsts
            .entry((tracked.player.as_str(), tracked.character.as_str()))
            .or_default()
            .entry(dungeon)
            .or_insert(tracked.run.display_label.as_str());
    }

    let rows = firsts
        .into_iter()
        .map(|((player, character), labels)| MatrixRow {
            player: player.to_string(),
            character: character.to_string(),
            cells: columns
                .iter()
                .map(|&d| {
                    let label = labels.get(d).copied().unwrap_or(EMPTY_LABEL);
                    (d.to_string(), label.to_string())
                })
                .collect(),
        })
        .collect();

    PerformanceMatrix {
        dungeons: columns.into_iter().map(str::to_string).collect(),
        rows,
    }
}

/// Running totals over runs with a known keystone level
#[derive(Debug, Default)]
struct Tally {
    level_sum: u64,
    total: u32,
    timed: u32,
    /// Unreadable clear times count as zero
    seconds_sum: u64,
}

impl Tally {
    fn add(&mut self, run: &RunRecord) {
        let Some(level) = run.keystone_level else {
            return;
        };
        self.level_sum += u64::from(level);
        self.total += 1;
        if run.on_time {
            self.timed += 1;
        }
        self.seconds_sum += u64::from(run.clear_seconds.unwrap_or(0));
    }

    fn avg_level(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        round1(self.level_sum as f64 / f64::from(self.total))
    }

    fn timed_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        round1(f64::from(self.timed) / f64::from(self.total) * 100.0)
    }

    fn avg_time(&self) -> String {
        if self.total == 0 {
            return format_mm_ss(0);
        }
        format_mm_ss((self.seconds_sum / u64::from(self.total)) as u32)
    }
}

/// One entry per roster character, in roster order; characters without runs are all zero
pub fn character_stats(roster: &[Character], runs: &[TrackedRun]) -> Vec<CharacterStat> {
    roster
        .iter()
        .map(|c| {
            let mut tally = Tally::default();
            runs.iter()
                .filter(|r| r.character == c.name)
                .for_each(|r| tally.add(&r.run));

            CharacterStat {
                player: c.player.clone(),
                character: c.name.clone(),
                server: c.server.clone(),
                class: c.class.clone(),
                avg_level: tally.avg_level(),
                timed_runs: tally.timed,
                total_runs: tally.total,
                timed_rate: tally.timed_rate(),
            }
        })
        .collect()
}

/// Catalog dungeons first (in catalog order), then any other dungeon seen in the runs
pub fn dungeon_stats(runs: &[TrackedRun], catalog: &DungeonCatalog) -> Vec<DungeonStat> {
    let mut order: Vec<&str> = catalog.dungeons().iter().map(String::as_str).collect();
    for r in runs {
        let name = r.run.dungeon_name.as_str();
        if !order.contains(&name) {
            order.push(name);
        }
    }

    order
        .into_iter()
        .map(|dungeon| {
            let mut tally = Tally::default();
            runs.iter()
                .filter(|r| r.run.dungeon_name == dungeon)
                .for_each(|r| tally.add(&r.run));

            DungeonStat {
                dungeon: dungeon.to_string(),
                short_name: catalog.short_name(dungeon).to_string(),
                avg_level: tally.avg_level(),
                avg_time: tally.avg_time(),
                timed_runs: tally.timed,
                total_runs: tally.total,
                timed_rate: tally.timed_rate(),
            }
        })
        .collect()
}

/// Run count per known keystone level, ascending
pub fn level_distribution(runs: &[TrackedRun]) -> Vec<LevelBucket> {
    let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
    for level in runs.iter().filter_map(|r| r.run.keystone_level) {
        *counts.entry(level).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(level, count)| LevelBucket {
            level,
            label: format!("+{}", level),
            count,
        })
        .collect()
}
