use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub output_directory: String,
    #[serde(default)]
    pub upload_directory: Option<String>,
    #[serde(default = "default_resolutions")]
    pub resolutions: Vec<u32>,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
}

fn default_resolutions() -> Vec<u32> {
    vec![1024, 800]
}

impl Config {
    /// Directory holding transient upload copies.
    pub fn upload_directory(&self) -> PathBuf {
        match &self.upload_directory {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(&self.output_directory).join(".uploads"),
        }
    }

    /// Database file, falling back to `~/.resizer/data/resizer.db`.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path
            .as_ref()
            .map(PathBuf::from)
            .or_else(crate::db::default_database_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerMode {
    Thread,
    Process,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_mode")]
    pub mode: WorkerMode,
    /// Worker executable for process mode. Defaults to the running binary.
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_worker_mode() -> WorkerMode {
    WorkerMode::Thread
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            mode: default_worker_mode(),
            program: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_min_price")]
    pub min: f64,
    #[serde(default = "default_max_price")]
    pub max: f64,
}

fn default_min_price() -> f64 {
    crate::task::MIN_PRICE
}

fn default_max_price() -> f64 {
    crate::task::MAX_PRICE
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min: default_min_price(),
            max: default_max_price(),
        }
    }
}
