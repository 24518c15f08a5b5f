use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::Parser;
use roster_sync::config::{
    DEFAULT_IDENTIFIER_COLUMN, DEFAULT_NAME_COLUMN, DEFAULT_REGISTRY_PATH, DEFAULT_ROSTER_PATH,
};
use roster_sync::{SyncConfig, TextEncoding};
use tracing::info;

/// Update the web app's user registry from the student roster CSV.
#[derive(Parser, Debug)]
#[command(name = "roster-sync", version)]
struct Args {
    /// Roster CSV exported by the school office
    #[arg(long, env = "ROSTER_SYNC_ROSTER", default_value = DEFAULT_ROSTER_PATH)]
    roster: PathBuf,

    /// Registry document to update (created when missing)
    #[arg(long, env = "ROSTER_SYNC_REGISTRY", default_value = DEFAULT_REGISTRY_PATH)]
    registry: PathBuf,

    /// Encodings to try, in order (repeatable). Defaults to utf-8, latin-1, windows-1252
    #[arg(long = "encoding", value_name = "ENCODING")]
    encodings: Vec<TextEncoding>,

    /// Header of the column holding the student name
    #[arg(long, default_value = DEFAULT_NAME_COLUMN)]
    name_column: String,

    /// Header of the column holding the student code
    #[arg(long, default_value = DEFAULT_IDENTIFIER_COLUMN)]
    id_column: String,

    /// Field delimiter of the roster file
    #[arg(long, default_value = ",")]
    delimiter: String,

    /// Support contact used when the registry does not have one yet
    #[arg(long, env = "ROSTER_SYNC_SUPPORT_CONTACT")]
    support_contact: Option<String>,

    /// Date recorded as the last update (YYYY-MM-DD). Defaults to today
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Log debug output for this tool
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "warn,roster_sync=debug"
    } else {
        "warn,roster_sync=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

fn delimiter_byte(s: &str) -> anyhow::Result<u8> {
    let s = if s == "\\t" { "\t" } else { s };
    match s.as_bytes() {
        [b] => Ok(*b),
        _ => bail!("delimiter must be a single ASCII character, got {:?}", s),
    }
}

fn build_config(args: &Args) -> anyhow::Result<SyncConfig> {
    let delimiter = delimiter_byte(&args.delimiter).context("invalid --delimiter")?;
    let mut config = SyncConfig::new(&args.roster, &args.registry)
        .with_columns(&args.name_column, &args.id_column)
        .with_delimiter(delimiter);
    if !args.encodings.is_empty() {
        config = config.with_encodings(args.encodings.clone());
    }
    if let Some(contact) = &args.support_contact {
        config = config.with_support_contact(contact);
    }
    Ok(config)
}

fn try_main(args: Args) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    let summary = roster_sync::run(&config, today).map_err(|e| {
        let stage = e.stage();
        anyhow::Error::new(e).context(format!("{} step failed", stage))
    })?;

    info!(
        students = summary.total_students,
        encoding = summary.encoding.map(|e| e.label()).unwrap_or("-"),
        dropped_incomplete = summary.stats.missing_fields,
        dropped_duplicates = summary.stats.duplicates,
        date = %summary.updated_on,
        path = %summary.registry_path.display(),
        "done"
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match try_main(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
