//! `resizer submit`: create a task for an image.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use resizer::storage::{stage_copy, to_forward_slashes};
use resizer::{Coordinator, InputReference};
use tracing::{debug, info};

use crate::commands::common::{open, print_json};
use crate::error::CliError;

/// Extra time `--wait` allows beyond the worker timeout.
const WAIT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// Image file to resize
    pub path: PathBuf,

    /// Copy the file into the upload directory and process the copy
    #[arg(long)]
    pub upload: bool,

    /// Stable identifier for uploaded content (defaults to the given path)
    #[arg(long, requires = "upload")]
    pub canonical: Option<String>,

    /// Wait for the task to finish and print its final state
    #[arg(long)]
    pub wait: bool,
}

pub async fn run(config_path: &Path, args: SubmitArgs) -> Result<(), CliError> {
    let (config, db) = open(config_path)?;
    let coordinator = Coordinator::from_config(&config, db)?;

    let input = if args.upload {
        let staged = stage_copy(&args.path, &config.upload_directory())?;
        debug!(staged = %staged.display(), "Upload staged");
        let canonical = args
            .canonical
            .unwrap_or_else(|| to_forward_slashes(&args.path));
        InputReference::Upload {
            path: staged,
            canonical,
        }
    } else {
        InputReference::Path(args.path)
    };

    let created = coordinator.create_task(input).await?;
    print_json(&created)?;

    if args.wait {
        let timeout = Duration::from_secs(config.worker.timeout_secs) + WAIT_GRACE;
        info!(task_id = %created.task_id, timeout_secs = timeout.as_secs(), "Waiting for task");
        let task = coordinator.wait_for_task(&created.task_id, timeout).await?;
        print_json(&task)?;
    }

    // In-process workers die with the process; let them report first.
    coordinator.shutdown().await;
    Ok(())
}
