//! charenc - convert legacy-encoded files to UTF-8 for editing, then restore them.
//!
//! This tool allows you to:
//! - Convert a file from a given encoding (cp932, euc-jp, ...) to UTF-8
//! - Restore the edited file to its original encoding
//! - Detect edits made in between via content hashes

mod config;
mod core;
mod error;
mod utils;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{Config, ConfigManager};
use crate::core::converter::Converter;
use crate::core::metadata::MetadataStore;
use crate::core::restorer::{RestoreOptions, Restorer};
use crate::error::CharencError;
use crate::utils::encoding::{self, ErrorPolicy};

#[derive(Parser)]
#[command(name = "charenc")]
#[command(author, version, about = "Convert files to UTF-8 for editing and restore their original encoding", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a file to UTF-8 and save its original encoding metadata
    Convert {
        /// File to convert
        file: PathBuf,
        /// Source encoding (e.g., cp932, shift_jis, euc-jp)
        #[arg(short, long)]
        encoding: String,
        /// Skip backup creation
        #[arg(long)]
        no_backup: bool,
    },
    /// Restore a converted file to its original encoding
    Restore {
        /// UTF-8 file to restore
        file: PathBuf,
        /// Error handling for unconvertible characters (default: strict)
        #[arg(long, value_enum)]
        errors: Option<ErrorPolicy>,
        /// Keep backup and metadata files
        #[arg(long)]
        keep_backup: bool,
        /// Target encoding (default: from metadata)
        #[arg(short, long)]
        encoding: Option<String>,
        /// Output file path (default: overwrite the file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the supported encoding identifiers
    Encodings,
    /// Show the active configuration
    Config {
        /// Write the active configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

fn init_tracing(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands, manager: &ConfigManager, config: &Config) -> Result<Value> {
    let store = MetadataStore::new(config.meta_dir_name.clone());

    match command {
        Commands::Convert {
            file,
            encoding,
            no_backup,
        } => {
            let result = Converter::new(store).convert(&file, &encoding, config.backup && !no_backup)?;
            Ok(serde_json::to_value(result)?)
        }
        Commands::Restore {
            file,
            errors,
            keep_backup,
            encoding,
            output,
        } => {
            let options = RestoreOptions {
                errors: errors.unwrap_or(config.default_errors),
                keep_backup,
                encoding,
                output,
            };
            let result = Restorer::new(store).restore(&file, &options)?;
            Ok(serde_json::to_value(result)?)
        }
        Commands::Encodings => Ok(json!({
            "status": "success",
            "encodings": encoding::supported_encodings(),
        })),
        Commands::Config { init } => {
            let path = manager.get_config_file_path();
            if init {
                manager
                    .save(config)
                    .with_context(|| format!("Cannot write config {}", path.display()))?;
                info!("Wrote config to {}", path.display());
            }
            Ok(json!({
                "status": "success",
                "config_file": path.to_string_lossy(),
                "config": config,
            }))
        }
    }
}

fn error_report(err: &anyhow::Error) -> Value {
    let mut report = json!({
        "status": "error",
        "error": err.to_string(),
    });
    if let Some(CharencError::Encode { .. }) = err.downcast_ref::<CharencError>() {
        report["hint"] = json!("Try --errors replace or --errors backslashreplace");
    }
    report
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let manager = ConfigManager::new();
    let config = manager.load();
    init_tracing(&config);
    debug!("Using config {}", manager.get_config_file_path().display());

    let (report, code) = match run(cli.command, &manager, &config) {
        Ok(value) => (value, ExitCode::SUCCESS),
        Err(err) => (error_report(&err), ExitCode::FAILURE),
    };

    // Output result as JSON
    match serde_json::to_string_pretty(&report) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Cannot format result: {}", e),
    }
    code
}
