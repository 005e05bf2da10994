//! Hidden `resizer worker` subcommand: the isolated process a
//! `ProcessDispatcher` spawns for one task.

use std::path::PathBuf;

use clap::Args;
use resizer::{run_job, WorkerJob};

use crate::error::CliError;

#[derive(Debug, Args)]
pub struct WorkerArgs {
    #[arg(long)]
    pub task_id: String,

    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub source_name: String,

    #[arg(long)]
    pub output_root: PathBuf,

    #[arg(long, value_delimiter = ',', required = true)]
    pub resolutions: Vec<u32>,
}

/// Runs the job and prints its message as one JSON line on stdout.
/// Returns whether the job completed.
pub fn run(args: WorkerArgs) -> Result<bool, CliError> {
    let job = WorkerJob {
        task_id: args.task_id,
        input_path: args.input,
        source_name: args.source_name,
        output_root: args.output_root,
        resolutions: args.resolutions,
    };

    let message = run_job(&job);
    println!("{}", message.to_json_line()?);
    Ok(message.is_completed())
}
