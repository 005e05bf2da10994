use std::ffi::OsString;
use std::path::PathBuf;

/// Everything an isolated worker needs to produce a task's variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerJob {
    pub task_id: String,
    pub input_path: PathBuf,
    /// Cleaned directory name the variants are grouped under.
    pub source_name: String,
    pub output_root: PathBuf,
    pub resolutions: Vec<u32>,
}

impl WorkerJob {
    /// Arguments for the hidden `worker` subcommand of the CLI binary.
    pub fn worker_args(&self) -> Vec<OsString> {
        let resolutions = self
            .resolutions
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");

        vec![
            "worker".into(),
            "--task-id".into(),
            self.task_id.clone().into(),
            "--input".into(),
            self.input_path.clone().into_os_string(),
            "--source-name".into(),
            self.source_name.clone().into(),
            "--output-root".into(),
            self.output_root.clone().into_os_string(),
            "--resolutions".into(),
            resolutions.into(),
        ]
    }
}
