//! Binary entry point for userstore.
//!
//! A command-line front end over [`userstore::RecordStore`].

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use userstore::config::Settings;
use userstore::observability::{self, LoggingConfig};
use userstore::{Record, RecordStore, SearchFilter, StoreConfig};

/// Userstore - transactional access to a table of user records.
#[derive(Parser)]
#[command(name = "userstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database target: `sqlite://path`, `sqlite::memory:` or `postgres://...`.
    #[arg(long, global = true, env = "USERSTORE_DATABASE_URL")]
    database_url: Option<String>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Table to operate on (overrides the config file).
    #[arg(long, global = true)]
    table: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Create a record.
    Create {
        /// Record id.
        id: i64,
        /// Email address.
        email: String,
        /// Subject id.
        #[arg(allow_negative_numbers = true)]
        subject_id: i64,
    },

    /// Show one record.
    Get {
        /// Record id.
        id: i64,
    },

    /// List every record.
    List,

    /// Overwrite a record's email and subject.
    Update {
        /// Record id.
        id: i64,
        /// New email address.
        email: String,
        /// New subject id.
        #[arg(allow_negative_numbers = true)]
        subject_id: i64,
    },

    /// Change a record's email.
    UpdateEmail {
        /// Record id.
        id: i64,
        /// New email address.
        email: String,
    },

    /// Change a record's subject.
    UpdateSubject {
        /// Record id.
        id: i64,
        /// New subject id.
        #[arg(allow_negative_numbers = true)]
        subject_id: i64,
    },

    /// Delete a record.
    Delete {
        /// Record id.
        id: i64,
    },

    /// Delete every record.
    DeleteAll {
        /// Confirm deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Count records.
    Count,

    /// Check whether a record exists.
    Exists {
        /// Record id.
        id: i64,
    },

    /// Find records by exact email.
    FindByEmail {
        /// Email address.
        email: String,
    },

    /// Create records from a JSON array, skipping ids already stored.
    Import {
        /// JSON file of `{"user_id", "user_email", "subject_id"}` objects.
        file: PathBuf,
    },

    /// Search records.
    Search {
        /// Email must contain this (case-sensitive).
        #[arg(long)]
        email: Option<String>,
        /// Minimum subject id (inclusive).
        #[arg(long, allow_negative_numbers = true)]
        min_subject: Option<i64>,
        /// Maximum subject id (inclusive).
        #[arg(long, allow_negative_numbers = true)]
        max_subject: Option<i64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match cli.config.as_deref().map(Settings::load_from_file) {
        Some(Ok(settings)) => settings,
        Some(Err(e)) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
        None => Settings::default(),
    };

    let logging = LoggingConfig::from_settings(settings.logging.as_ref(), cli.verbose);
    if let Err(e) = observability::init(logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli, settings) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

fn open_store(cli: &Cli, settings: Settings) -> anyhow::Result<RecordStore> {
    let target = cli
        .database_url
        .clone()
        .or(settings.database_url)
        .context(
            "no database target: pass --database-url, set USERSTORE_DATABASE_URL, \
             or set database_url in the config file",
        )?;

    let mut config: StoreConfig = settings.store;
    if let Some(table) = &cli.table {
        config = config.with_table(table.clone());
    }

    Ok(RecordStore::open_with_config(&target, config)?)
}

fn run(cli: Cli, settings: Settings) -> anyhow::Result<ExitCode> {
    let store = open_store(&cli, settings)?;
    let json = cli.json;

    match cli.command {
        Commands::Create {
            id,
            email,
            subject_id,
        } => print_affected(json, store.create(id, &email, subject_id)?)?,
        Commands::Get { id } => {
            let record = store.get(id)?;
            if json {
                print_json(&record)?;
            } else if let Some(record) = &record {
                println!("{record}");
            } else {
                eprintln!("record {id} not found");
            }
            return Ok(if record.is_some() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        },
        Commands::List => print_records(json, &store.get_all()?)?,
        Commands::Update {
            id,
            email,
            subject_id,
        } => print_affected(json, store.update(id, &email, subject_id)?)?,
        Commands::UpdateEmail { id, email } => {
            print_affected(json, store.update_email(id, &email)?)?;
        },
        Commands::UpdateSubject { id, subject_id } => {
            print_affected(json, store.update_subject(id, subject_id)?)?;
        },
        Commands::Delete { id } => print_affected(json, store.delete(id)?)?,
        Commands::DeleteAll { yes } => {
            if !yes {
                bail!("refusing to delete every record without --yes");
            }
            print_affected(json, store.delete_all()?)?;
        },
        Commands::Count => {
            let count = store.count()?;
            if json {
                print_json(&Count { count })?;
            } else {
                println!("{count}");
            }
        },
        Commands::Exists { id } => {
            let exists = store.exists(id)?;
            if json {
                print_json(&Exists { id, exists })?;
            } else {
                println!("{exists}");
            }
        },
        Commands::FindByEmail { email } => print_records(json, &store.get_by_email(&email)?)?,
        Commands::Import { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let records: Vec<Record> = serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse {}", file.display()))?;
            print_affected(json, store.create_batch(&records)?)?;
        },
        Commands::Search {
            email,
            min_subject,
            max_subject,
        } => {
            let filter = SearchFilter {
                email_contains: email,
                min_subject_id: min_subject,
                max_subject_id: max_subject,
            };
            print_records(json, &store.search(&filter)?)?;
        },
    }

    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct Affected {
    rows_affected: u64,
}

#[derive(Serialize)]
struct Count {
    count: u64,
}

#[derive(Serialize)]
struct Exists {
    id: i64,
    exists: bool,
}

fn print_affected(json: bool, rows_affected: u64) -> anyhow::Result<()> {
    if json {
        return print_json(&Affected { rows_affected });
    }
    println!("{rows_affected} row(s) affected");
    Ok(())
}

fn print_records(json: bool, records: &[Record]) -> anyhow::Result<()> {
    if json {
        return print_json(&records);
    }
    for record in records {
        println!("{record}");
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", render_json(value)?);
    Ok(())
}

fn render_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}
