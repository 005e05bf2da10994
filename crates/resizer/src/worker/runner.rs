//! The work a single isolated worker performs.

use std::time::Instant;

use tracing::{debug, info, info_span, warn};

use crate::error::ResizerError;
use crate::sanitize;
use crate::storage::{read_source, to_forward_slashes, VariantStorage};
use crate::transform::{self, VARIANT_EXTENSION};
use crate::worker::job::WorkerJob;
use crate::worker::message::{VariantOutput, WorkerMessage};

/// Reads the source, renders every configured resolution and stores each
/// variant. Never panics on bad input; every error becomes a `Failed`
/// message.
pub fn run_job(job: &WorkerJob) -> WorkerMessage {
    let started = Instant::now();
    let filename = sanitize::redact_path(&job.input_path);
    let _span = info_span!("worker",
        task_id = %job.task_id,
        filename = %filename,
        source_name = %job.source_name,
    )
    .entered();

    let result = produce_variants(job);
    let processing_time_ms = elapsed_ms(started);

    match result {
        Ok(variants) => {
            info!(
                variants = variants.len(),
                processing_time_ms, "Variants produced"
            );
            WorkerMessage::Completed {
                task_id: job.task_id.clone(),
                variants,
                processing_time_ms,
            }
        }
        Err(e) => {
            warn!(error = %e, processing_time_ms, "Worker failed");
            WorkerMessage::failure(&job.task_id, e.to_string(), processing_time_ms)
        }
    }
}

fn produce_variants(job: &WorkerJob) -> Result<Vec<VariantOutput>, ResizerError> {
    let source = {
        let _step = info_span!("read_source").entered();
        read_source(&job.input_path)?
    };

    let decoded = {
        let _step = info_span!("decode").entered();
        transform::decode(&source)?
    };
    drop(source);

    let storage = VariantStorage::new(&job.output_root);
    let mut variants = Vec::with_capacity(job.resolutions.len());

    for &resolution in &job.resolutions {
        let _step = info_span!("render_variant", resolution).entered();

        let rendered = transform::render(&decoded, resolution)?;
        let path = storage.store(
            &rendered.bytes,
            &job.source_name,
            resolution,
            &rendered.content_hash,
            VARIANT_EXTENSION,
        )?;
        debug!(
            width = rendered.width,
            height = rendered.height,
            hash = %rendered.content_hash,
            "Variant stored"
        );

        variants.push(VariantOutput {
            resolution,
            path: to_forward_slashes(&path),
            content_hash: rendered.content_hash,
        });
    }

    Ok(variants)
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
