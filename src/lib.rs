//! Keeps the web app's user registry (`usuarios.json`) in line with the
//! school's student roster export.
//!
//! A run loads the previous registry, reads and cleans the roster CSV, merges
//! the two and replaces the registry file. See [`sync::run`].

pub mod config;
pub mod error;
pub mod merge;
pub mod registry;
pub mod roster;
pub mod sync;

pub use config::{MergeOptions, RosterOptions, SyncConfig, TextEncoding};
pub use error::{Result, Stage, SyncError};
pub use merge::merge;
pub use registry::{load_registry, read_registry, write_registry, Metadata, Registry};
pub use roster::{parse_roster, Roster, RosterRecord, RosterStats};
pub use sync::{run, RunSummary};
