//! Workflow drivers: one sequential pipeline per generation mode.
//!
//! Each driver validates its parameters, builds a mode-specific request body,
//! submits it through the gateway, drives the poller and materializes the
//! output. Terminal-but-unsuccessful task states come back as values
//! (`WorkflowOutcome::Unresolved`, `I2vOutcome::Halted`), never as `Err`.
pub mod image_edit;
pub mod image_to_video;
pub mod params;
pub mod text_to_image;
pub mod text_to_video;

pub use params::{
    clamp_float, clamp_int, GenerationRequest, ImageEditParams, ImageToVideoParams,
    TextToImageParams, TextToVideoParams, EDIT_TASK_TYPES, SEGMENT_SECONDS, Z_RESOLUTIONS,
};

use tokio::sync::mpsc;

use crate::error::AppResult;
use crate::gateway::GatewayClient;
use crate::task::{PollTick, TaskResult};

/// Outcome of one polled workflow: either the mode-specific success payload or
/// the non-success terminal state with its diagnostic body.
#[derive(Debug)]
pub enum WorkflowOutcome<T> {
    Completed(T),
    Unresolved { task_id: String, result: TaskResult },
}

/// Result of dispatching a [`GenerationRequest`].
#[derive(Debug)]
pub enum RunReport {
    TextToImage(text_to_image::TextToImageOutcome),
    ImageEdit(WorkflowOutcome<image_edit::EditOutput>),
    ImageToVideo(image_to_video::I2vOutcome),
    TextToVideo(WorkflowOutcome<text_to_video::T2vSuccess>),
}

/// Run one generation request end to end.
///
/// `bundle_segments` only affects image-to-video runs with more than one
/// segment. `progress` receives a tick before every status poll.
pub async fn run(
    client: &GatewayClient,
    request: &GenerationRequest,
    bundle_segments: bool,
    progress: Option<&mpsc::UnboundedSender<PollTick>>,
) -> AppResult<RunReport> {
    tracing::info!("Starting {} run", request.mode());
    match request {
        GenerationRequest::TextToImage(p) => Ok(RunReport::TextToImage(
            text_to_image::run(client, p).await?,
        )),
        GenerationRequest::ImageEdit(p) => Ok(RunReport::ImageEdit(
            image_edit::run(client, p, progress).await?,
        )),
        GenerationRequest::ImageToVideo(p) => Ok(RunReport::ImageToVideo(
            image_to_video::run(client, p, bundle_segments, progress).await?,
        )),
        GenerationRequest::TextToVideo(p) => Ok(RunReport::TextToVideo(
            text_to_video::run(client, p, progress).await?,
        )),
    }
}
