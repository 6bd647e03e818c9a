//! Roster loading and validation.
//!
//! A roster is tabular: named columns, one row per tracked character. Required
//! columns are `player`, `character`, `server`, `class` (the Chinese
//! spreadsheet headers 玩家 / 角色名 / 服务器 / 职业 are accepted too).

use serde_json::Value;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::Character;

/// (canonical name, accepted header spellings)
const REQUIRED_COLUMNS: [(&str, &[&str]); 4] = [
    ("player", &["player", "玩家"]),
    ("character", &["character", "角色名"]),
    ("server", &["server", "服务器"]),
    ("class", &["class", "职业"]),
];

/// Untyped roster table as read from disk
#[derive(Debug, Clone, Default)]
pub struct RosterTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RosterTable {
    /// Parse a JSON array of objects. Columns are the union of keys in first-seen
    /// order; a key absent from a row reads as null.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let objects = value
            .as_array()
            .ok_or_else(|| Error::RosterValidation("roster must be a JSON array of rows".into()))?;

        let mut columns: Vec<String> = Vec::new();
        for obj in objects {
            let map = obj.as_object().ok_or_else(|| {
                Error::RosterValidation("every roster row must be a JSON object".into())
            })?;
            for key in map.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = objects
            .iter()
            .filter_map(Value::as_object)
            .map(|map| {
                columns
                    .iter()
                    .map(|col| map.get(col).and_then(cell_text))
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check required columns and nulls, then build trimmed characters in roster order
    pub fn validate(&self) -> Result<Vec<Character>> {
        let mut indices = [0usize; 4];
        let mut missing = Vec::new();
        for (slot, (name, spellings)) in REQUIRED_COLUMNS.iter().enumerate() {
            match self
                .columns
                .iter()
                .position(|c| spellings.contains(&c.trim()))
            {
                Some(i) => indices[slot] = i,
                None => missing.push(*name),
            }
        }
        if !missing.is_empty() {
            return Err(Error::RosterValidation(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )));
        }

        for (slot, (name, _)) in REQUIRED_COLUMNS.iter().enumerate() {
            let col = indices[slot];
            if let Some(row) = self.rows.iter().position(|r| is_null(r.get(col))) {
                return Err(Error::RosterValidation(format!(
                    "column '{}' has an empty value (row {})",
                    name,
                    row + 1
                )));
            }
        }

        let text = |row: &[Option<String>], slot: usize| -> String {
            row.get(indices[slot])
                .and_then(|c| c.as_deref())
                .unwrap_or_default()
                .trim()
                .to_string()
        };
        let characters = self
            .rows
            .iter()
            .map(|row| Character {
                player: text(row, 0),
                name: text(row, 1),
                server: text(row, 2),
                class: text(row, 3),
            })
            .collect::<Vec<_>>();

        tracing::info!(characters = characters.len(), "Roster validated");
        Ok(characters)
    }
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_null(cell: Option<&Option<String>>) -> bool {
    match cell {
        Some(Some(text)) => text.trim().is_empty(),
        _ => true,
    }
}

/// Read and validate a JSON roster file
pub fn load_roster(path: &Path) -> Result<Vec<Character>> {
    RosterTable::load(path)?.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_and_trims() {
        let table = RosterTable::from_json_str(
            r#"[
                {"player": " A ", "character": "X ", "server": "燃烧之刃", "class": "法师"},
                {"player": "B", "character": "Y", "server": "White Bear", "class": "战士"}
            ]"#,
        )
        .unwrap();
        let roster = table.validate().unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].player, "A");
        assert_eq!(roster[0].name, "X");
        assert_eq!(roster[1].server, "White Bear");
    }

    #[test]
    fn accepts_spreadsheet_headers() {
        let table = RosterTable::from_json_str(
            r#"[{"玩家": "A", "角色名": "X", "服务器": "S", "职业": "牧师"}]"#,
        )
        .unwrap();
        let roster = table.validate().unwrap();
        assert_eq!(roster[0].class, "牧师");
    }

    #[test]
    fn missing_column_is_fatal() {
        let table =
            RosterTable::from_json_str(r#"[{"player": "A", "character": "X", "server": "S"}]"#)
                .unwrap();
        let err = table.validate().unwrap_err();
        match err {
            Error::RosterValidation(msg) => assert!(msg.contains("class")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn null_or_absent_value_is_fatal() {
        let table = RosterTable::from_json_str(
            r#"[
                {"player": "A", "character": "X", "server": "S", "class": "法师"},
                {"player": "B", "character": null, "server": "S", "class": "法师"}
            ]"#,
        )
        .unwrap();
        assert!(matches!(table.validate(), Err(Error::RosterValidation(_))));

        let table = RosterTable::from_json_str(
            r#"[
                {"player": "A", "character": "X", "server": "S", "class": "法师"},
                {"player": "B", "character": "Y", "class": "法师"}
            ]"#,
        )
        .unwrap();
        assert!(matches!(table.validate(), Err(Error::RosterValidation(_))));
    }

    #[test]
    fn non_array_is_rejected() {
        assert!(RosterTable::from_json_str(r#"{"player": "A"}"#).is_err());
    }
}
