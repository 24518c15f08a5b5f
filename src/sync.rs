use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::info;

use crate::config::{SyncConfig, TextEncoding};
use crate::error::Result;
use crate::merge::merge;
use crate::registry::{load_registry, write_registry};
use crate::roster::{parse_roster, RosterStats};

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub total_students: usize,
    pub encoding: Option<TextEncoding>,
    pub stats: RosterStats,
    pub updated_on: NaiveDate,
    pub registry_path: PathBuf,
}

/// Loads the prior registry, parses the roster, merges and writes the result.
///
/// Nothing is written unless every step before the write succeeds.
pub fn run(config: &SyncConfig, today: NaiveDate) -> Result<RunSummary> {
    info!(
        roster = %config.roster_path().display(),
        registry = %config.registry_path().display(),
        "starting registry update from roster"
    );

    let prior = load_registry(config.registry_path());
    let roster = parse_roster(config.roster_path(), &config.roster)?;
    let next = merge(&roster, &prior, today, &config.merge);
    write_registry(config.registry_path(), &next)?;

    info!(
        students = next.metadata.total_count,
        date = %today,
        path = %config.registry_path().display(),
        "registry updated"
    );

    Ok(RunSummary {
        total_students: next.metadata.total_count,
        encoding: roster.encoding(),
        stats: roster.stats(),
        updated_on: today,
        registry_path: config.registry_path().to_path_buf(),
    })
}
