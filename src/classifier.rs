//! Time-limit classification of parsed runs

use nom::{
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res},
    sequence::separated_pair,
    IResult,
};

use crate::catalog::DungeonCatalog;
use crate::models::{RawRun, RunRecord, EMPTY_LABEL, UNKNOWN_TIME};

/// Elapsed time assumed when the clear time can't be read; beyond any time limit
pub const OVERTIME_SENTINEL_SECS: u32 = 9999;

/// Build the classified record for one raw row. Pure: depends only on `raw` and `catalog`.
pub fn classify(raw: &RawRun, catalog: &DungeonCatalog) -> RunRecord {
    let dungeon_name = catalog.translate(&raw.dungeon_raw).to_string();
    let clear_seconds = raw.clear_time_text.as_deref().and_then(parse_clear_time);
    let elapsed = clear_seconds.unwrap_or(OVERTIME_SENTINEL_SECS);

    let time_limit_secs = catalog.time_limit(&dungeon_name);
    let on_time = time_limit_secs.is_some_and(|limit| elapsed <= limit);

    RunRecord {
        dungeon_raw: raw.dungeon_raw.clone(),
        clear_time_text: raw
            .clear_time_text
            .clone()
            .unwrap_or_else(|| UNKNOWN_TIME.to_string()),
        clear_seconds,
        keystone_level: raw.keystone_level,
        time_limit_secs,
        on_time,
        display_label: display_label(raw.keystone_level, on_time),
        dungeon_name,
    }
}

/// `-` for an unknown level, `+N` when timed, `+N*` when over time
pub fn display_label(level: Option<u32>, on_time: bool) -> String {
    match level {
        None => EMPTY_LABEL.to_string(),
        Some(level) if on_time => format!("+{}", level),
        Some(level) => format!("+{}*", level),
    }
}

/// Keystone level a label was built from
pub fn label_level(label: &str) -> Option<u32> {
    label
        .strip_prefix('+')
        .map(|rest| rest.strip_suffix('*').unwrap_or(rest))
        .and_then(|digits| digits.parse().ok())
}

/// Whole-string `MM:SS` → seconds
pub fn parse_clear_time(text: &str) -> Option<u32> {
    all_consuming(minutes_seconds)(text.trim())
        .ok()
        .and_then(|(_, (m, s))| m.checked_mul(60)?.checked_add(s))
}

fn minutes_seconds(input: &str) -> IResult<&str, (u32, u32)> {
    separated_pair(
        map_res(digit1, str::parse::<u32>),
        char(':'),
        map_res(digit1, str::parse::<u32>),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogOverrides;

    fn catalog_with(dungeon: &str, limit: u32) -> DungeonCatalog {
        let mut overrides = CatalogOverrides {
            replace: true,
            ..Default::default()
        };
        overrides.time_limits.insert(dungeon.to_string(), limit);
        DungeonCatalog::with_overrides(&overrides)
    }

    fn raw(dungeon: &str, time: Option<&str>, level: Option<u32>) -> RawRun {
        RawRun {
            dungeon_raw: dungeon.to_string(),
            clear_time_text: time.map(str::to_string),
            keystone_level: level,
        }
    }

    #[test]
    fn just_under_the_limit_is_timed() {
        let catalog = catalog_with("D", 1800);
        let rec = classify(&raw("D", Some("29:59"), Some(18)), &catalog);
        assert!(rec.on_time);
        assert_eq!(rec.clear_seconds, Some(1799));
        assert_eq!(rec.display_label, "+18");
    }

    #[test]
    fn just_over_the_limit_is_not() {
        let catalog = catalog_with("D", 1800);
        let rec = classify(&raw("D", Some("30:01"), Some(10)), &catalog);
        assert!(!rec.on_time);
        assert_eq!(rec.display_label, "+10*");
    }

    #[test]
    fn exactly_the_limit_is_timed() {
        let catalog = catalog_with("D", 1800);
        assert!(classify(&raw("D", Some("30:00"), Some(12)), &catalog).on_time);
    }

    #[test]
    fn unknown_dungeon_keeps_raw_name_and_is_never_timed() {
        let catalog = DungeonCatalog::season_default();
        let rec = classify(&raw("Grim Batol", Some("10:00"), Some(7)), &catalog);
        assert_eq!(rec.dungeon_name, "Grim Batol");
        assert_eq!(rec.time_limit_secs, None);
        assert!(!rec.on_time);
        assert_eq!(rec.display_label, "+7*");
    }

    #[test]
    fn translated_dungeon_uses_local_limit() {
        let catalog = DungeonCatalog::season_default();
        let rec = classify(&raw("The Dawnbreaker", Some("31:00"), Some(15)), &catalog);
        assert_eq!(rec.dungeon_name, "破晨号");
        assert_eq!(rec.time_limit_secs, Some(1860));
        assert!(rec.on_time);
    }

    #[test]
    fn missing_level_is_dash_regardless_of_time() {
        let catalog = catalog_with("D", 1800);
        let rec = classify(&raw("D", Some("20:00"), None), &catalog);
        assert!(rec.on_time);
        assert_eq!(rec.display_label, "-");
    }

    #[test]
    fn unreadable_time_counts_as_over_time() {
        let catalog = catalog_with("D", 1800);
        let rec = classify(&raw("D", None, Some(11)), &catalog);
        assert_eq!(rec.clear_seconds, None);
        assert_eq!(rec.clear_time_text, UNKNOWN_TIME);
        assert!(!rec.on_time);
        assert_eq!(rec.display_label, "+11*");
    }

    #[test]
    fn labels_recover_their_level() {
        for level in [2, 10, 18, 25] {
            for on_time in [true, false] {
                let label = display_label(Some(level), on_time);
                assert_eq!(label_level(&label), Some(level));
            }
        }
        assert_eq!(display_label(None, true), "-");
        assert_eq!(label_level("-"), None);
    }

    #[test]
    fn clear_time_must_be_whole_mm_ss() {
        assert_eq!(parse_clear_time("05:07"), Some(307));
        assert_eq!(parse_clear_time("5:07"), Some(307));
        assert_eq!(parse_clear_time("unknown"), None);
        assert_eq!(parse_clear_time("30:01 +10"), None);
        assert_eq!(parse_clear_time(":30"), None);
    }
}
