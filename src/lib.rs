//! Mythic+ dungeon-run crawler: fetches per-character run history from the
//! combat-log site, classifies each run against the dungeon's time limit and
//! aggregates a player × character × dungeon matrix with summary statistics.

pub mod aggregate;
pub mod cancel;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod driver;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod refresh;
pub mod report;
pub mod roster;
pub mod target;

pub use error::{Error, Result};
