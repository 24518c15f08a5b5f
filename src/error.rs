use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Step of a sync run an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Parse,
    Merge,
    Write,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Parse => "parse",
            Stage::Merge => "merge",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while syncing a roster into the registry.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The roster file does not exist.
    #[error("roster file not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// The roster file exists but could not be read.
    #[error("failed to read roster file {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// None of the configured encodings decoded the roster.
    #[error(
        "roster file {} could not be decoded with any of: {}",
        path.display(),
        tried.join(", ")
    )]
    UnreadableSource { path: PathBuf, tried: Vec<String> },

    /// Decoded text is not a well-formed CSV table.
    #[error("roster file {} is not valid CSV (line {line}): {reason}", path.display())]
    MalformedSource {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// Required roster columns are absent from the header row.
    #[error("missing columns in roster: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// The prior registry could not be parsed. Recovered by starting fresh.
    #[error("registry {} is not a valid document: {reason}", path.display())]
    MalformedPriorState { path: PathBuf, reason: String },

    /// The merged registry could not be persisted.
    #[error("failed to write registry {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub fn stage(&self) -> Stage {
        match self {
            SyncError::MalformedPriorState { .. } => Stage::Load,
            SyncError::SourceNotFound { .. }
            | SyncError::SourceRead { .. }
            | SyncError::UnreadableSource { .. }
            | SyncError::MalformedSource { .. }
            | SyncError::SchemaMismatch { .. } => Stage::Parse,
            SyncError::WriteFailure { .. } => Stage::Write,
        }
    }

    /// Whether the run can continue past this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::MalformedPriorState { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
