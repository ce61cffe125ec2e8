//! Image-edit driver (`Qwen-Image-Edit-2511`).
//!
//! Multipart submission with two embedded images, then the standard
//! create → poll → fetch pipeline. A success status without `output.file_url`
//! is an error here: this mode always produces a file.
use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::artifact::{materialize, timestamped_name, Artifact, ArtifactSource};
use crate::error::{AppError, AppResult};
use crate::gateway::{CreateResponse, GatewayClient};
use crate::task::{poll_task, PollPolicy, PollTick, TaskResult};
use crate::workflow::params::ImageEditParams;
use crate::workflow::WorkflowOutcome;

pub const MODEL: &str = "Qwen-Image-Edit-2511";
pub const CREATE_PATH: &str = "async/images/edits";

#[derive(Debug)]
pub struct EditOutput {
    pub task_id: String,
    pub artifact: Artifact,
    pub raw: Value,
}

async fn image_part(path: &Path) -> AppResult<Part> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image.png".to_string());
    Ok(Part::bytes(bytes).file_name(file_name))
}

async fn build_form(params: &ImageEditParams) -> AppResult<Form> {
    let mut form = Form::new()
        .text("prompt", params.prompt.clone())
        .text("model", MODEL)
        .text("num_inference_steps", params.steps.to_string())
        .text("guidance_scale", params.guidance.to_string());
    for task_type in &params.task_types {
        form = form.text("task_types", task_type.clone());
    }
    for path in &params.images {
        form = form.part("image", image_part(path).await?);
    }
    Ok(form)
}

pub async fn run(
    client: &GatewayClient,
    params: &ImageEditParams,
    progress: Option<&mpsc::UnboundedSender<PollTick>>,
) -> AppResult<WorkflowOutcome<EditOutput>> {
    let form = build_form(params).await?;
    let task_id = match client.submit_task_multipart(CREATE_PATH, form).await? {
        CreateResponse::Created { task_id, .. } => task_id,
        CreateResponse::Rejected { status, raw } => {
            return Err(AppError::TaskCreation {
                status: status.as_u16(),
                body: raw,
            });
        }
    };
    tracing::info!("Edit task created: {}", task_id);

    let result = poll_task(client, &task_id, PollPolicy::default(), progress).await?;
    match result {
        TaskResult::Success { output, raw } => {
            let file_url = output
                .and_then(|o| o.file_url)
                .ok_or_else(|| AppError::MissingOutput {
                    task_id: task_id.clone(),
                    raw: raw.clone(),
                })?;
            let artifact = materialize(
                client,
                ArtifactSource::Url(file_url),
                timestamped_name("edit-2511", "png"),
            )
            .await?;
            Ok(WorkflowOutcome::Completed(EditOutput {
                task_id,
                artifact,
                raw,
            }))
        }
        other => Ok(WorkflowOutcome::Unresolved {
            task_id,
            result: other,
        }),
    }
}
