pub mod dispatcher;
pub mod job;
pub mod message;
pub mod runner;

pub use dispatcher::{Dispatcher, ProcessDispatcher, ThreadDispatcher};
pub use job::WorkerJob;
pub use message::{VariantOutput, WorkerMessage};
pub use runner::run_job;
