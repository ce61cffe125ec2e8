//! Image-to-video driver (`Wan2_2-I2V-A14B`).
//!
//! Two quirks of the upstream are deliberately preserved here:
//!
//! 1. The backend has been observed to accept the inference-step count under a
//!    misspelled field name. Task creation tries the candidate encodings in
//!    [`STEP_FIELD_CANDIDATES`] order and only falls through to the next one
//!    when a submission is rejected or comes back without a `task_id`. When
//!    every candidate fails, all raw responses are kept for diagnostics.
//! 2. The backend produces fixed 5-second clips, so a longer duration is split
//!    into `ceil(duration / 5)` segments, each a full create → poll → fetch
//!    cycle run strictly in order. A failing segment halts the rest; segments
//!    that already finished are kept.
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde_json::json;
use tokio::sync::mpsc;

use crate::artifact::{bundle, materialize, timestamp, Artifact, ArtifactSource};
use crate::error::{AppError, AppResult};
use crate::gateway::{CreateResponse, GatewayClient};
use crate::task::{poll_task, PollPolicy, PollTick, TaskResult};
use crate::workflow::params::ImageToVideoParams;

pub const MODEL: &str = "Wan2_2-I2V-A14B";
pub const CREATE_PATH: &str = "async/videos/image-to-video";

/// Inference-step field names tried in order: the canonical spelling first,
/// then the misspelling some backend versions expect. Do not "fix" this list
/// down to one entry.
pub const STEP_FIELD_CANDIDATES: [&str; 2] = ["num_inference_steps", "num_inferenece_steps"];

/// Segments poll slower and longer than the default policy: video generation
/// is the most expensive mode.
fn segment_poll_policy() -> PollPolicy {
    PollPolicy::new(Duration::from_secs(60 * 60), Duration::from_secs(8))
}

/// One finished segment, with a record of how its task was created.
#[derive(Debug)]
pub struct SegmentArtifact {
    /// 1-based segment number.
    pub index: usize,
    pub task_id: String,
    /// Which step-field encoding the backend accepted.
    pub steps_field: &'static str,
    /// How many creation attempts the segment needed (1 or 2).
    pub attempts: usize,
    pub artifact: Artifact,
}

#[derive(Debug)]
pub enum HaltReason {
    /// The segment's task ended failed/cancelled/timed out.
    Task(TaskResult),
    /// The segment succeeded but its artifact could not be retrieved.
    Artifact(AppError),
}

#[derive(Debug)]
pub enum I2vOutcome {
    Completed {
        segments: Vec<SegmentArtifact>,
        /// Zip of all segments, present when bundling was requested for a
        /// multi-segment run and succeeded.
        bundle: Option<Artifact>,
        /// Set instead of failing the run when bundling was requested but the
        /// archive could not be built.
        bundle_error: Option<String>,
    },
    /// A segment did not resolve; earlier segments are preserved.
    Halted {
        segments: Vec<SegmentArtifact>,
        /// 1-based index of the segment that halted the run.
        failed_segment: usize,
        reason: HaltReason,
    },
}

struct CreatedTask {
    task_id: String,
    steps_field: &'static str,
    attempts: usize,
}

fn build_form(
    params: &ImageToVideoParams,
    image_bytes: &[u8],
    image_name: &str,
    steps_field: &str,
) -> Form {
    let mut form = Form::new()
        .text("prompt", params.prompt.clone())
        .text("model", MODEL)
        .text("num_frames", params.num_frames.to_string())
        .text("guidance_scale", params.guidance.to_string())
        .text("height", params.height.to_string())
        .text("width", params.width.to_string());
    if let Some(neg) = &params.negative_prompt {
        form = form.text("negative_prompt", neg.clone());
    }
    if let Some(seed) = params.seed {
        form = form.text("seed", seed.to_string());
    }
    form = form
        .text("watermark", if params.watermark { "true" } else { "false" })
        .text(
            "prompt_extend",
            if params.prompt_extend { "true" } else { "false" },
        )
        .text(steps_field.to_string(), params.steps.to_string())
        .part(
            "image",
            Part::bytes(image_bytes.to_vec()).file_name(image_name.to_string()),
        );
    form
}

/// Create one segment task, walking the candidate step-field encodings.
async fn create_segment_task(
    client: &GatewayClient,
    params: &ImageToVideoParams,
    image_bytes: &[u8],
    image_name: &str,
) -> AppResult<CreatedTask> {
    let mut rejections = Vec::new();

    for field in STEP_FIELD_CANDIDATES {
        let form = build_form(params, image_bytes, image_name, field);
        match client.submit_task_multipart(CREATE_PATH, form).await? {
            CreateResponse::Created { task_id, .. } => {
                if !rejections.is_empty() {
                    tracing::info!(
                        "Task created on retry with step field '{}' (task {})",
                        field,
                        task_id
                    );
                }
                return Ok(CreatedTask {
                    task_id,
                    steps_field: field,
                    attempts: rejections.len() + 1,
                });
            }
            CreateResponse::Rejected { status, raw } => {
                tracing::warn!(
                    "Submission with step field '{}' rejected (HTTP {})",
                    field,
                    status
                );
                rejections.push((status, raw));
            }
        }
    }

    // Both encodings rejected: surface both raw bodies.
    let status = rejections
        .last()
        .map(|(s, _)| s.as_u16())
        .unwrap_or(500);
    let mut body = serde_json::Map::new();
    for (i, (_, raw)) in rejections.into_iter().enumerate() {
        body.insert(format!("_try{}", i + 1), raw);
    }
    Err(AppError::TaskCreation {
        status,
        body: json!(body),
    })
}

pub async fn run(
    client: &GatewayClient,
    params: &ImageToVideoParams,
    bundle_segments: bool,
    progress: Option<&mpsc::UnboundedSender<PollTick>>,
) -> AppResult<I2vOutcome> {
    let image_bytes = tokio::fs::read(&params.image).await?;
    let image_name = params
        .image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image.png".to_string());

    let segment_count = params.segment_count();
    let mut segments: Vec<SegmentArtifact> = Vec::with_capacity(segment_count);

    for i in 0..segment_count {
        let index = i + 1;
        tracing::info!("Creating segment {}/{}", index, segment_count);

        let created = create_segment_task(client, params, &image_bytes, &image_name).await?;
        tracing::info!(
            "Segment {}/{} task {} (field '{}', attempt {})",
            index,
            segment_count,
            created.task_id,
            created.steps_field,
            created.attempts
        );

        let result = poll_task(client, &created.task_id, segment_poll_policy(), progress).await?;
        let (output, raw) = match result {
            TaskResult::Success { output, raw } => (output, raw),
            other => {
                tracing::warn!("Segment {} ended: {}", index, other.label());
                return Ok(I2vOutcome::Halted {
                    segments,
                    failed_segment: index,
                    reason: HaltReason::Task(other),
                });
            }
        };

        let Some(file_url) = output.and_then(|o| o.file_url) else {
            return Err(AppError::MissingOutput {
                task_id: created.task_id,
                raw,
            });
        };

        let file_name = format!("wan_seg{}_{}.mp4", index, timestamp());
        match materialize(client, ArtifactSource::Url(file_url), file_name).await {
            Ok(artifact) => segments.push(SegmentArtifact {
                index,
                task_id: created.task_id,
                steps_field: created.steps_field,
                attempts: created.attempts,
                artifact,
            }),
            Err(
                err @ (AppError::ArtifactFetch { .. } | AppError::InvalidArtifactUrl(_)),
            ) => {
                return Ok(I2vOutcome::Halted {
                    segments,
                    failed_segment: index,
                    reason: HaltReason::Artifact(err),
                });
            }
            Err(err) => return Err(err),
        }
    }

    // Bundling is best-effort: a zip failure never fails a finished run.
    let (bundle_artifact, bundle_error) = if bundle_segments && segments.len() > 1 {
        let files: Vec<Artifact> = segments.iter().map(|s| s.artifact.clone()).collect();
        match bundle(&files) {
            Ok(bytes) => (
                Some(Artifact {
                    file_name: format!("wan_segments_{}.zip", timestamp()),
                    bytes,
                }),
                None,
            ),
            Err(err) => {
                tracing::warn!("Bundling failed: {}", err);
                (None, Some(err.to_string()))
            }
        }
    } else {
        (None, None)
    };

    Ok(I2vOutcome::Completed {
        segments,
        bundle: bundle_artifact,
        bundle_error,
    })
}
