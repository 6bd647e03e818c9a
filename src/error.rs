//! Error types for the crawler pipeline

use thiserror::Error;

use crate::driver::DriverError;

/// Crate-level error
#[derive(Error, Debug)]
pub enum Error {
    /// Roster is missing a required column or has empty values; aborts before any fetching
    #[error("Roster validation failed: {0}")]
    RosterValidation(String),

    /// Every attempt for one character came back empty or failed; the batch skips it
    #[error("No rows for {character} after {attempts} attempt(s)")]
    FetchExhausted { character: String, attempts: u32 },

    /// The update link could not be clicked within the attempt budget
    #[error("Could not click update for {character} after {attempts} attempt(s)")]
    UpdateFailed { character: String, attempts: u32 },

    /// No runs survived the whole roster
    #[error("No dungeon runs were collected for any character")]
    EmptyBatch,

    /// Operator interrupt; partial results are discarded
    #[error("Interrupted")]
    Interrupted,

    /// Starting or talking to the browser failed outside the retry loop
    #[error("Browser driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
