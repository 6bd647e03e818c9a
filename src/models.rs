use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label used for a run with no known keystone level, and for empty matrix cells
pub const EMPTY_LABEL: &str = "-";

/// Clear-time text recorded when the row carried no `MM:SS` substring
pub const UNKNOWN_TIME: &str = "unknown";

/// A tracked character from the roster
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Character {
    pub player: String,
    pub name: String,
    pub server: String,
    pub class: String,
}

/// Raw fields lifted from one table row, before classification
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct RawRun {
    pub dungeon_raw: String,
    /// `MM:SS` substring of the time cell, if any
    pub clear_time_text: Option<String>,
    /// Digits following `+` in the time cell, if any
    pub keystone_level: Option<u32>,
}

/// A classified dungeon run
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub dungeon_raw: String,
    pub dungeon_name: String,
    pub clear_time_text: String,
    pub clear_seconds: Option<u32>,
    pub keystone_level: Option<u32>,
    /// Time limit the run was judged against (None when the catalog has no entry)
    pub time_limit_secs: Option<u32>,
    pub on_time: bool,
    pub display_label: String,
}

/// A run attributed to the roster character whose page it came from
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TrackedRun {
    pub player: String,
    pub character: String,
    pub server: String,
    #[serde(flatten)]
    pub run: RunRecord,
}

/// One (player, character) row of the performance matrix
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub player: String,
    pub character: String,
    /// dungeon name -> display label, one entry per matrix column
    pub cells: BTreeMap<String, String>,
}

impl MatrixRow {
    /// Label for a dungeon column, `-` when the row has no run for it
    pub fn label(&self, dungeon: &str) -> &str {
        self.cells.get(dungeon).map(String::as_str).unwrap_or(EMPTY_LABEL)
    }
}

/// Player × character × dungeon matrix of display labels
#[derive(Debug, Serialize, Clone, PartialEq, Eq, Default)]
pub struct PerformanceMatrix {
    /// Column order (sorted dungeon names)
    pub dungeons: Vec<String>,
    /// Rows sorted by (player, character)
    pub rows: Vec<MatrixRow>,
}

impl PerformanceMatrix {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, player: &str, character: &str, dungeon: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.player == player && r.character == character)
            .map(|r| r.label(dungeon))
    }
}

/// Per-character summary over runs with a known keystone level
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CharacterStat {
    pub player: String,
    pub character: String,
    pub server: String,
    pub class: String,
    pub avg_level: f64,
    pub timed_runs: u32,
    pub total_runs: u32,
    /// Percentage, one decimal
    pub timed_rate: f64,
}

/// Per-dungeon summary over runs with a known keystone level
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DungeonStat {
    pub dungeon: String,
    pub short_name: String,
    pub avg_level: f64,
    /// Mean clear time as `MM:SS`
    pub avg_time: String,
    pub timed_runs: u32,
    pub total_runs: u32,
    pub timed_rate: f64,
}

/// Number of runs at one keystone level
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct LevelBucket {
    pub level: u32,
    pub label: String,
    pub count: u32,
}

/// Everything one batch produces for the downstream report writers
#[derive(Debug, Serialize, Clone)]
pub struct BatchReport {
    pub generated_at: chrono::DateTime<chrono::Local>,
    pub zone_id: String,
    pub records: Vec<TrackedRun>,
    pub matrix: PerformanceMatrix,
    pub character_stats: Vec<CharacterStat>,
    pub dungeon_stats: Vec<DungeonStat>,
    pub level_distribution: Vec<LevelBucket>,
    /// Characters whose page never produced rows
    pub skipped: Vec<String>,
}

/// Format a second count as zero-padded `MM:SS`
pub fn format_mm_ss(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Round to one decimal place, exact halves to the even digit
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_mm_ss(0), "00:00");
        assert_eq!(format_mm_ss(1799), "29:59");
        assert_eq!(format_mm_ss(6000), "100:00");
    }

    #[test]
    fn rounds_to_one_decimal() {
        assert_eq!(round1(66.666), 66.7);
        assert_eq!(round1(12.0), 12.0);
        assert_eq!(round1(0.04), 0.0);
    }

    #[test]
    fn exact_halves_round_to_even() {
        assert_eq!(round1(11.25), 11.2);
        assert_eq!(round1(6.25), 6.2);
        assert_eq!(round1(12.5), 12.5);
    }

    #[test]
    fn missing_matrix_cell_reads_as_dash() {
        let row = MatrixRow {
            player: "A".into(),
            character: "X".into(),
            cells: BTreeMap::new(),
        };
        assert_eq!(row.label("Halls"), EMPTY_LABEL);
    }
}
