//! Resizer CLI
//!
//! Submits images for background resizing and reports task status. The
//! hidden `worker` subcommand is the child process used when
//! `worker.mode` is `process`.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use resizer::{init_logging, LogFormat};

use commands::common::StatusArg;
use commands::submit::SubmitArgs;
use commands::worker::WorkerArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "resizer", version, about = "Background image resizing")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, default_value = "resizer.json")]
    config: PathBuf,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(format: LogFormatArg) -> Self {
        match format {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a resize task for an image
    Submit(SubmitArgs),
    /// Print a task as JSON
    Status {
        /// Task identifier returned by `submit`
        task_id: String,
    },
    /// List tasks, newest first
    List {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long, default_value_t = 50)]
        limit: u64,
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    /// Process a single task and print its result message
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format.into());

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    match cli.command {
        Command::Submit(args) => commands::submit::run(&cli.config, args).await?,
        Command::Status { task_id } => commands::status::status(&cli.config, &task_id)?,
        Command::List {
            status,
            limit,
            offset,
        } => commands::status::list(&cli.config, status, limit, offset)?,
        Command::Worker(args) => {
            let completed = commands::worker::run(args)?;
            return Ok(if completed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
    }
    Ok(ExitCode::SUCCESS)
}
