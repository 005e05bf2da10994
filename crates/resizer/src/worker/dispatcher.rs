//! Isolated execution of worker jobs, one unit per task.
//!
//! A dispatcher starts the unit and returns immediately. Exactly one
//! [`WorkerMessage`] for the job is later sent on the completion channel,
//! whether the unit reported one or the dispatcher had to synthesize a
//! failure (crash, non-zero exit, missing message, timeout).

use std::any::Any;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};
use log::{debug, error, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::config::{WorkerConfig, WorkerMode};
use crate::error::WorkerError;
use crate::worker::job::WorkerJob;
use crate::worker::message::WorkerMessage;
use crate::worker::runner::{self, elapsed_ms};

pub trait Dispatcher: Send + Sync {
    fn dispatch(
        &self,
        job: WorkerJob,
        completions: UnboundedSender<WorkerMessage>,
    ) -> Result<(), WorkerError>;
}

/// Builds the dispatcher selected by the `worker` config section.
pub fn from_config(config: &WorkerConfig) -> Result<Arc<dyn Dispatcher>, WorkerError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.mode {
        WorkerMode::Thread => Ok(Arc::new(ThreadDispatcher::new(timeout))),
        WorkerMode::Process => {
            let program = match &config.program {
                Some(program) => PathBuf::from(program),
                None => std::env::current_exe().map_err(|e| {
                    WorkerError::SpawnFailed(format!("cannot locate worker binary: {}", e))
                })?,
            };
            Ok(Arc::new(ProcessDispatcher::new(program, timeout)))
        }
    }
}

fn deliver(completions: &UnboundedSender<WorkerMessage>, message: WorkerMessage) {
    let task_id = message.task_id().to_string();
    if completions.send(message).is_err() {
        debug!(
            "Completion channel closed, dropping result for task {}",
            task_id
        );
    }
}

fn timeout_message(task_id: &str, timeout: Duration, started: Instant) -> WorkerMessage {
    warn!("Worker for task {} timed out after {:?}", task_id, timeout);
    WorkerMessage::failure(
        task_id,
        format!("worker timed out after {}s", timeout.as_secs()),
        elapsed_ms(started),
    )
}

// ─── ThreadDispatcher ───────────────────────────────────────────────────────

type JobRunner = dyn Fn(&WorkerJob) -> WorkerMessage + Send + Sync;

/// Runs each job on its own OS thread, watched by a supervisor thread.
///
/// A panic in the job is reported as a failure. On timeout the job thread
/// is detached; anything it sends afterwards goes nowhere.
pub struct ThreadDispatcher {
    timeout: Duration,
    runner: Arc<JobRunner>,
}

impl ThreadDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self::with_runner(timeout, runner::run_job)
    }

    /// Uses `runner` in place of the image pipeline.
    pub fn with_runner<F>(timeout: Duration, runner: F) -> Self
    where
        F: Fn(&WorkerJob) -> WorkerMessage + Send + Sync + 'static,
    {
        Self {
            timeout,
            runner: Arc::new(runner),
        }
    }
}

impl Dispatcher for ThreadDispatcher {
    fn dispatch(
        &self,
        job: WorkerJob,
        completions: UnboundedSender<WorkerMessage>,
    ) -> Result<(), WorkerError> {
        let (result_tx, result_rx) = bounded::<WorkerMessage>(1);
        let task_id = job.task_id.clone();
        let short_id: String = task_id.chars().take(8).collect();
        let runner = Arc::clone(&self.runner);
        let timeout = self.timeout;
        let started = Instant::now();

        let worker = thread::Builder::new()
            .name(format!("resizer-worker-{}", short_id))
            .spawn(move || {
                let message = (*runner)(&job);
                // The supervisor stops listening after a timeout.
                let _ = result_tx.send(message);
            })
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        thread::Builder::new()
            .name(format!("resizer-supervisor-{}", short_id))
            .spawn(move || {
                let message = match result_rx.recv_timeout(timeout) {
                    Ok(message) => {
                        if let Err(e) = worker.join() {
                            error!(
                                "Worker thread for task {} panicked after reporting: {}",
                                task_id,
                                panic_message(e.as_ref())
                            );
                        }
                        message
                    }
                    Err(RecvTimeoutError::Timeout) => timeout_message(&task_id, timeout, started),
                    Err(RecvTimeoutError::Disconnected) => {
                        let reason = match worker.join() {
                            Err(payload) => {
                                format!("worker crashed: {}", panic_message(payload.as_ref()))
                            }
                            Ok(()) => "worker exited without reporting a result".to_string(),
                        };
                        error!("Task {}: {}", task_id, reason);
                        WorkerMessage::failure(&task_id, reason, elapsed_ms(started))
                    }
                };

                deliver(&completions, message);
            })
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ─── ProcessDispatcher ──────────────────────────────────────────────────────

/// Runs each job as `<program> worker ...` in its own child process.
///
/// The child prints its [`WorkerMessage`] as a JSON line on stdout. The
/// child is killed if it outlives the timeout.
pub struct ProcessDispatcher {
    program: PathBuf,
    timeout: Duration,
}

impl ProcessDispatcher {
    pub fn new<P: Into<PathBuf>>(program: P, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl Dispatcher for ProcessDispatcher {
    fn dispatch(
        &self,
        job: WorkerJob,
        completions: UnboundedSender<WorkerMessage>,
    ) -> Result<(), WorkerError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| WorkerError::NoRuntime)?;

        let child = tokio::process::Command::new(&self.program)
            .args(job.worker_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                WorkerError::SpawnFailed(format!("{}: {}", self.program.display(), e))
            })?;

        debug!(
            "Spawned worker process {:?} for task {}",
            child.id(),
            job.task_id
        );

        let timeout = self.timeout;
        let task_id = job.task_id;
        let started = Instant::now();

        runtime.spawn(async move {
            // Dropping the output future on timeout drops the child, which kills it.
            let message = match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Err(_) => timeout_message(&task_id, timeout, started),
                Ok(Err(e)) => WorkerMessage::failure(
                    &task_id,
                    format!("failed to wait for worker process: {}", e),
                    elapsed_ms(started),
                ),
                Ok(Ok(output)) => interpret_output(
                    &task_id,
                    output.status.code(),
                    &String::from_utf8_lossy(&output.stdout),
                    elapsed_ms(started),
                ),
            };
            deliver(&completions, message);
        });

        Ok(())
    }
}

/// Turns a finished child's exit code and stdout into the task's message.
///
/// A reported message wins even when the exit code is non-zero. `None` for
/// `exit_code` means the child was terminated by a signal.
fn interpret_output(
    task_id: &str,
    exit_code: Option<i32>,
    stdout: &str,
    elapsed: u64,
) -> WorkerMessage {
    if let Some(message) = WorkerMessage::from_output(stdout) {
        if message.task_id() == task_id {
            return message;
        }
        warn!(
            "Worker for task {} reported a result for task {}",
            task_id,
            message.task_id()
        );
        return WorkerMessage::failure(
            task_id,
            format!("worker reported result for unexpected task {}", message.task_id()),
            elapsed,
        );
    }

    let reason = match exit_code {
        Some(0) => "worker exited without reporting a result".to_string(),
        Some(code) => format!("worker exited with code {}", code),
        None => "worker terminated by signal".to_string(),
    };
    warn!("Task {}: {}", task_id, reason);
    WorkerMessage::failure(task_id, reason, elapsed)
}
