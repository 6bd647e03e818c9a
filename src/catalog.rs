//! Dungeon catalog: site name → local name, time limit per local name, short names.
//!
//! Built once at startup and shared read-only for the rest of the run.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Current season: (site name, local name, short name, time limit in seconds)
const SEASON_DUNGEONS: &[(&str, &str, &str, u32)] = &[
    ("Ara-Kara, City of Echoes", "艾拉-卡拉，回响之城", "回响", 30 * 60),
    ("Eco-Dome Al'dani", "奥尔达尼生态圆顶", "圆顶", 31 * 60),
    ("Halls of Atonement", "赎罪大厅", "赎罪", 31 * 60),
    ("Operation: Floodgate", "水闸行动", "水闸", 33 * 60),
    ("Priory of the Sacred Flame", "圣焰隐修院", "隐修院", 32 * 60 + 30),
    ("Tazavesh: So'leah's Gambit", "塔扎维什: 索·莉亚的宏图", "宏图", 30 * 60),
    ("Tazavesh: Streets of Wonder", "塔扎维什: 琳彩天街", "天街", 35 * 60),
    ("The Dawnbreaker", "破晨号", "破船", 31 * 60),
];

/// Catalog edits read from the `[catalog]` table of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogOverrides {
    /// Drop the built-in season tables before applying the entries below
    pub replace: bool,
    /// site name -> local name
    pub names: BTreeMap<String, String>,
    /// local name -> limit in seconds
    pub time_limits: BTreeMap<String, u32>,
    /// local name -> short name
    pub short_names: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct DungeonCatalog {
    names: HashMap<String, String>,
    limits: HashMap<String, u32>,
    short_names: HashMap<String, String>,
    order: Vec<String>,
}

impl DungeonCatalog {
    /// Built-in tables for the current season
    pub fn season_default() -> Self {
        let mut catalog = Self::default();
        for &(site, local, short, limit) in SEASON_DUNGEONS {
            catalog.names.insert(site.to_string(), local.to_string());
            catalog.short_names.insert(local.to_string(), short.to_string());
            catalog.insert_limit(local, limit);
        }
        catalog
    }

    /// Season defaults with `overrides` applied on top (or instead, when `replace` is set)
    pub fn with_overrides(overrides: &CatalogOverrides) -> Self {
        let mut catalog = if overrides.replace {
            Self::default()
        } else {
            Self::season_default()
        };
        for (site, local) in &overrides.names {
            catalog.names.insert(site.clone(), local.clone());
        }
        for (local, &limit) in &overrides.time_limits {
            catalog.insert_limit(local, limit);
        }
        for (local, short) in &overrides.short_names {
            catalog.short_names.insert(local.clone(), short.clone());
        }
        catalog
    }

    fn insert_limit(&mut self, local: &str, limit: u32) {
        if self.limits.insert(local.to_string(), limit).is_none() {
            self.order.push(local.to_string());
        }
    }

    /// Local name for a site name; unknown names pass through unchanged
    pub fn translate<'a>(&'a self, site_name: &'a str) -> &'a str {
        self.names.get(site_name).map(String::as_str).unwrap_or(site_name)
    }

    pub fn time_limit(&self, local_name: &str) -> Option<u32> {
        self.limits.get(local_name).copied()
    }

    /// Short display name, falling back to the full name
    pub fn short_name<'a>(&'a self, local_name: &'a str) -> &'a str {
        self.short_names
            .get(local_name)
            .map(String::as_str)
            .unwrap_or(local_name)
    }

    /// Local names that have a time limit, in catalog order
    pub fn dungeons(&self) -> &[String] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_default_translates_and_limits() {
        let catalog = DungeonCatalog::season_default();
        let local = catalog.translate("Priory of the Sacred Flame");
        assert_eq!(local, "圣焰隐修院");
        assert_eq!(catalog.time_limit(local), Some(1950));
        assert_eq!(catalog.short_name(local), "隐修院");
        assert_eq!(catalog.dungeons().len(), 8);
    }

    #[test]
    fn unknown_site_name_passes_through() {
        let catalog = DungeonCatalog::season_default();
        assert_eq!(catalog.translate("Grim Batol"), "Grim Batol");
        assert_eq!(catalog.time_limit("Grim Batol"), None);
        assert_eq!(catalog.short_name("Grim Batol"), "Grim Batol");
    }

    #[test]
    fn overrides_extend_season_tables() {
        let mut overrides = CatalogOverrides::default();
        overrides.names.insert("Grim Batol".into(), "格瑞姆巴托".into());
        overrides.time_limits.insert("格瑞姆巴托".into(), 34 * 60);
        overrides.time_limits.insert("破晨号".into(), 32 * 60);

        let catalog = DungeonCatalog::with_overrides(&overrides);
        assert_eq!(catalog.translate("Grim Batol"), "格瑞姆巴托");
        assert_eq!(catalog.time_limit("格瑞姆巴托"), Some(2040));
        assert_eq!(catalog.time_limit("破晨号"), Some(1920));
        assert_eq!(catalog.dungeons().len(), 9);
        assert_eq!(catalog.dungeons().last().map(String::as_str), Some("格瑞姆巴托"));
    }

    #[test]
    fn replace_drops_built_in_tables() {
        let mut overrides = CatalogOverrides {
            replace: true,
            ..Default::default()
        };
        overrides.time_limits.insert("Test Dungeon".into(), 1800);

        let catalog = DungeonCatalog::with_overrides(&overrides);
        assert_eq!(catalog.translate("The Dawnbreaker"), "The Dawnbreaker");
        assert_eq!(catalog.dungeons(), ["Test Dungeon".to_string()]);
    }
}
