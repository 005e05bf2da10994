//! Shared test utilities for resizer integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use resizer::storage::to_forward_slashes;
use resizer::task::{FixedPrice, PriceGenerator};
use resizer::{
    load_config_from_str, Config, Coordinator, Database, Dispatcher, ThreadDispatcher,
    WorkerError, WorkerJob, WorkerMessage,
};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedSender;

/// Upper bound for waiting on a real worker.
pub const WAIT: Duration = Duration::from_secs(60);

/// Isolated input/output directories plus a config pointing at them.
pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub config: Config,
}

impl TestHarness {
    /// Resolutions `[1024, 800]`, everything else default.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let input_dir = temp_dir.path().join("input");
        let output_dir = temp_dir.path().join("output");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");

        let json = format!(
            r#"{{
                "version": "1.0",
                "output_directory": "{}",
                "resolutions": [1024, 800]
            }}"#,
            to_forward_slashes(&output_dir)
        );
        let config = load_config_from_str(&json).expect("Harness config must be valid");

        Self {
            temp_dir,
            input_dir,
            output_dir,
            config,
        }
    }

    pub fn root(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    pub fn input(&self, name: &str) -> PathBuf {
        self.input_dir.join(name)
    }

    /// Writes a gradient image into the input dir; the format follows the
    /// extension.
    pub fn write_image(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.input(name);
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 251) as u8, (y % 241) as u8, ((x * y) % 239) as u8])
        })
        .save(&path)
        .expect("Failed to write test image");
        path
    }

    pub fn coordinator(&self, dispatcher: Arc<dyn Dispatcher>) -> Coordinator {
        self.coordinator_with_price(dispatcher, Arc::new(FixedPrice(10.0)))
    }

    pub fn coordinator_with_price(
        &self,
        dispatcher: Arc<dyn Dispatcher>,
        pricing: Arc<dyn PriceGenerator>,
    ) -> Coordinator {
        Coordinator::new(
            &self.config,
            Database::open_in_memory().expect("Failed to open database"),
            dispatcher,
            pricing,
        )
        .expect("Coordinator needs a tokio runtime")
    }
}

pub fn thread_dispatcher() -> Arc<dyn Dispatcher> {
    Arc::new(ThreadDispatcher::new(WAIT))
}

/// Accepts jobs and never reports, leaving tasks pending.
pub struct HoldingDispatcher;

impl Dispatcher for HoldingDispatcher {
    fn dispatch(
        &self,
        _job: WorkerJob,
        _completions: UnboundedSender<WorkerMessage>,
    ) -> Result<(), WorkerError> {
        Ok(())
    }
}

pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}
