//! Writing a batch report to disk for the external report writers

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::BatchReport;

pub const REPORT_PREFIX: &str = "mythic_performance";

/// Write `<dir>/mythic_performance_<YYYYmmdd_HHMMSS>.json` and refresh
/// `<dir>/mythic_performance_latest.json`; returns the timestamped path.
pub fn write_report(report: &BatchReport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_string_pretty(report)?;
    let stamp = report.generated_at.format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{}_{}.json", REPORT_PREFIX, stamp));
    std::fs::write(&path, &json)?;

    let latest = dir.join(format!("{}_latest.json", REPORT_PREFIX));
    std::fs::write(&latest, &json)?;

    tracing::info!(path = %path.display(), latest = %latest.display(), "Report written");
    Ok(path)
}
