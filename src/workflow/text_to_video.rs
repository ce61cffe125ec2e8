//! Text-to-video driver (`HunyuanVideo-1.5`).
//!
//! JSON submission; the payload carries the inference-step count under the
//! server's misspelled `num_inferenece_steps` field on purpose; that is the
//! name this endpoint accepts. Success may yield a file, plain text, or
//! nothing at all; all three are successful outcomes.
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::artifact::{materialize, timestamped_name, Artifact, ArtifactSource};
use crate::error::{AppError, AppResult};
use crate::gateway::{CreateResponse, GatewayClient};
use crate::task::{poll_task, PollPolicy, PollTick, TaskResult};
use crate::workflow::params::TextToVideoParams;
use crate::workflow::WorkflowOutcome;

pub const MODEL: &str = "HunyuanVideo-1.5";
pub const CREATE_PATH: &str = "async/videos/generations";

fn t2v_poll_policy() -> PollPolicy {
    PollPolicy::new(Duration::from_secs(30 * 60), Duration::from_secs(10))
}

#[derive(Debug)]
pub enum T2vOutput {
    Video(Artifact),
    Text(String),
    /// Upstream reported success with no output attached.
    Empty,
}

#[derive(Debug)]
pub struct T2vSuccess {
    pub task_id: String,
    pub output: T2vOutput,
    pub raw: Value,
}

pub fn build_payload(params: &TextToVideoParams) -> Value {
    json!({
        "prompt": params.prompt,
        "model": MODEL,
        "aspect_ratio": params.aspect_ratio,
        "negative_prompt": params.negative_prompt,
        // Upstream's field name, misspelling included.
        "num_inferenece_steps": params.steps,
        "num_frames": params.num_frames,
        "seed": params.seed,
        "fps": params.fps,
    })
}

pub async fn run(
    client: &GatewayClient,
    params: &TextToVideoParams,
    progress: Option<&mpsc::UnboundedSender<PollTick>>,
) -> AppResult<WorkflowOutcome<T2vSuccess>> {
    let payload = build_payload(params);
    let task_id = match client.submit_task_json(CREATE_PATH, &payload).await? {
        CreateResponse::Created { task_id, .. } => task_id,
        CreateResponse::Rejected { status, raw } => {
            return Err(AppError::TaskCreation {
                status: status.as_u16(),
                body: raw,
            });
        }
    };
    tracing::info!("Text-to-video task created: {}", task_id);

    let result = poll_task(client, &task_id, t2v_poll_policy(), progress).await?;
    match result {
        TaskResult::Success { output, raw } => {
            let output = match output {
                Some(o) if o.file_url.is_some() => {
                    let file_url = o.file_url.unwrap_or_default();
                    let artifact = materialize(
                        client,
                        ArtifactSource::Url(file_url),
                        timestamped_name("hunyuan-video", "mp4"),
                    )
                    .await?;
                    T2vOutput::Video(artifact)
                }
                Some(o) if o.text_result.is_some() => {
                    T2vOutput::Text(o.text_result.unwrap_or_default())
                }
                _ => T2vOutput::Empty,
            };
            Ok(WorkflowOutcome::Completed(T2vSuccess {
                task_id,
                output,
                raw,
            }))
        }
        other => Ok(WorkflowOutcome::Unresolved {
            task_id,
            result: other,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_keeps_the_misspelled_step_field() {
        let params =
            TextToVideoParams::new("a storm", Some("rain"), Some("9:16"), Some("5"), None, "11", None)
                .unwrap();
        let payload = build_payload(&params);
        assert_eq!(payload["num_inferenece_steps"], 5);
        assert!(payload.get("num_inference_steps").is_none());
        assert_eq!(payload["model"], MODEL);
        assert_eq!(payload["seed"], 11);
        assert_eq!(payload["aspect_ratio"], "9:16");
    }
}
