//! Binary entry point for marksearch.
//!
//! This binary provides the CLI and the HTTP server for trademark search.

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

mod commands;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use marksearch::MarksearchConfig;
use marksearch::observability::{self, InitOptions};
use std::path::PathBuf;
use std::process::ExitCode;

/// Marksearch - hybrid text, class and logo search over trademark records.
#[derive(Parser)]
#[command(name = "marksearch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "MARKSEARCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Bind address (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Skip the index rebuild at startup.
        #[arg(long)]
        no_rebuild: bool,
    },

    /// Run a hybrid search.
    Search {
        /// Words to match against descriptions and applicant names.
        #[arg(short, long)]
        words: Option<String>,

        /// Class code to filter by.
        #[arg(short = 'c', long = "class")]
        class_filter: Option<String>,

        /// Logo image to search with.
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Output format: table or json.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Ingest records from a CSV manifest.
    Ingest {
        /// Manifest file.
        manifest: PathBuf,
    },

    /// Rebuild the vector index and report its size.
    Rebuild,

    /// Show store and index status.
    Status,

    /// Write a stored logo to a file.
    Logo {
        /// Record id.
        id: i64,

        /// Output file.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the effective configuration.
    Config,
}

/// Main entry point.
fn main() -> ExitCode {
    // Load .env before anything reads the environment
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match MarksearchConfig::load(cli.config.as_deref()) {
        Ok(config) => config.with_env_overrides(),
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let expose_metrics = matches!(cli.command, Commands::Serve { .. });
    let _observability = match observability::init_from_config(
        &config,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: expose_metrics,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("marksearch")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        },
    };

    match runtime.block_on(run_command(cli.command, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(command: Commands, mut config: MarksearchConfig) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            host,
            port,
            no_rebuild,
        } => {
            if let Some(host) = host {
                config.http.host = host;
            }
            if let Some(port) = port {
                config.http.port = port;
            }
            if no_rebuild {
                config.rebuild_on_start = false;
            }
            commands::cmd_serve(config).await
        },

        Commands::Search {
            words,
            class_filter,
            image,
            format,
        } => commands::cmd_search(&config, words, class_filter, image, format).await,

        Commands::Ingest { manifest } => commands::cmd_ingest(&config, manifest).await,

        Commands::Rebuild => commands::cmd_rebuild(&config).await,

        Commands::Status => commands::cmd_status(&config).await,

        Commands::Logo { id, output } => commands::cmd_logo(&config, id, output).await,

        Commands::Config => commands::cmd_config(&config),
    }
}
