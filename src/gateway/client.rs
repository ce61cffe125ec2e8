//! Thin HTTP client for the upstream generation API.
//!
//! - `submit_task_json` / `submit_task_multipart` post to an async task-creation
//!   endpoint and classify the response as `Created` or `Rejected`.
//! - `task_status` fetches `task/{id}` leniently for the poll loop.
//! - `generate_images` hits the synchronous `images/generations` endpoint.
//! - `fetch_artifact` downloads a generated file, optionally via a `/dl` relay.
//!
//! Responses are parsed into discriminated types here, at the boundary; callers
//! never see raw `reqwest` responses.
use bytes::Bytes;
use reqwest::multipart::Form;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{truncate_diagnostic, AppError, AppResult};

/// Outcome of a task-creation request. `Rejected` is not an `Err` because the
/// image-to-video driver needs to inspect a rejection and try again with an
/// alternate field encoding.
#[derive(Debug)]
pub enum CreateResponse {
    Created { task_id: String, raw: Value },
    Rejected { status: StatusCode, raw: Value },
}

/// Terminal-or-not task state as reported by `task/{id}`.
///
/// Anything the server sends that is not one of the three terminal strings,
/// including an absent or malformed status field, reads as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Success,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn parse(s: &str) -> Self {
        match s {
            "success" => TaskState::Success,
            "failed" => TaskState::Failed,
            "cancelled" => TaskState::Cancelled,
            _ => TaskState::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskOutput {
    pub file_url: Option<String>,
    pub text_result: Option<String>,
}

/// One `task/{id}` response, parsed leniently: the HTTP status is ignored and a
/// non-JSON body becomes `{"_text": ...}`, so a transient 5xx or an HTML error
/// page just reads as another pending cycle.
#[derive(Debug)]
pub struct TaskStatusResponse {
    pub state: TaskState,
    pub output: Option<TaskOutput>,
    pub raw: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageDatum {
    pub url: Option<String>,
    pub b64_json: Option<String>,
}

/// Response of the synchronous image-generation endpoint:
/// `{data: [{url? | b64_json?}, ...]}`.
#[derive(Debug)]
pub struct ImagesResponse {
    pub data: Vec<ImageDatum>,
    pub raw: Value,
}

#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_key: String,
    /// When set, artifact fetches are routed through `{relay}/dl?url=...`
    /// instead of hitting the remote host directly.
    relay_dl: Option<String>,
}

impl GatewayClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        GatewayClient {
            client: Client::new(),
            base_url: base,
            api_key,
            relay_dl: None,
        }
    }

    /// Route artifact downloads through a same-origin relay's `/dl` endpoint.
    pub fn with_relay_dl(mut self, relay_base: String) -> Self {
        self.relay_dl = Some(relay_base.trim_end_matches('/').to_string());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a task-creation request with a JSON body.
    pub async fn submit_task_json(&self, path: &str, payload: &Value) -> AppResult<CreateResponse> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::info!("Submitting task to {}", url);
        tracing::debug!("Task payload: {:?}", payload);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(AppError::HttpClient)?;
        Ok(Self::interpret_create(read_json_lenient(response).await?))
    }

    /// Submit a task-creation request with a multipart body (image uploads).
    pub async fn submit_task_multipart(&self, path: &str, form: Form) -> AppResult<CreateResponse> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::info!("Submitting multipart task to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(AppError::HttpClient)?;
        Ok(Self::interpret_create(read_json_lenient(response).await?))
    }

    fn interpret_create((status, raw): (StatusCode, Value)) -> CreateResponse {
        let task_id = raw.get("task_id").and_then(|v| v.as_str());
        match task_id {
            Some(id) if status.is_success() => CreateResponse::Created {
                task_id: id.to_string(),
                raw,
            },
            _ => {
                tracing::warn!("Task creation rejected (HTTP {})", status);
                CreateResponse::Rejected { status, raw }
            }
        }
    }

    /// Query `task/{id}` once. Transport failures propagate; HTTP-level errors
    /// do not (the poll loop treats them as pending).
    pub async fn task_status(&self, task_id: &str) -> AppResult<TaskStatusResponse> {
        let url = format!("{}/task/{}", self.base_url, task_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(AppError::HttpClient)?;
        let (_status, raw) = read_json_lenient(response).await?;

        let state = raw
            .get("status")
            .and_then(|v| v.as_str())
            .map(TaskState::parse)
            .unwrap_or(TaskState::Pending);
        let output = raw
            .get("output")
            .cloned()
            .and_then(|v| serde_json::from_value::<TaskOutput>(v).ok());

        Ok(TaskStatusResponse { state, output, raw })
    }

    /// Synchronous image generation (`images/generations`). Unlike the async
    /// task endpoints this returns finished outputs directly; a non-success
    /// status is a creation error carrying the raw body.
    pub async fn generate_images(&self, payload: &Value) -> AppResult<ImagesResponse> {
        let url = format!("{}/images/generations", self.base_url);
        tracing::info!("Requesting image generation at {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(AppError::HttpClient)?;
        let (status, raw) = read_json_lenient(response).await?;

        if !status.is_success() {
            return Err(AppError::TaskCreation {
                status: status.as_u16(),
                body: raw,
            });
        }

        let data = raw
            .get("data")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .map(|item| serde_json::from_value::<ImageDatum>(item.clone()).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();

        Ok(ImagesResponse { data, raw })
    }

    /// Download a generated artifact by absolute URL.
    ///
    /// The URL must be `http://` or `https://`; an optional `Range` header is
    /// forwarded so video content can be fetched partially.
    pub async fn fetch_artifact(&self, url: &str, range: Option<&str>) -> AppResult<Bytes> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::InvalidArtifactUrl(url.to_string()));
        }

        let mut request = match &self.relay_dl {
            Some(relay) => self
                .client
                .get(format!("{}/dl", relay))
                .query(&[("url", url)]),
            None => self.client.get(url),
        };
        if let Some(range) = range {
            request = request.header(reqwest::header::RANGE, range);
        }

        let response = request.send().await.map_err(AppError::HttpClient)?;
        let status = response.status();
        if status.is_success() {
            response.bytes().await.map_err(AppError::HttpClient)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AppError::ArtifactFetch {
                status: status.as_u16(),
                detail: truncate_diagnostic(&body),
            })
        }
    }
}

/// Read a response body as JSON, falling back to `{"_text": body}` when it is
/// not valid JSON. The status code is returned alongside so callers can decide
/// how much they care about it.
async fn read_json_lenient(response: reqwest::Response) -> AppResult<(StatusCode, Value)> {
    let status = response.status();
    let text = response.text().await.map_err(AppError::HttpClient)?;
    let value = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "_text": text }));
    Ok((status, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_state_parses_terminal_strings() {
        assert_eq!(TaskState::parse("success"), TaskState::Success);
        assert_eq!(TaskState::parse("failed"), TaskState::Failed);
        assert_eq!(TaskState::parse("cancelled"), TaskState::Cancelled);
    }

    #[test]
    fn task_state_treats_unknown_as_pending() {
        assert_eq!(TaskState::parse("in_progress"), TaskState::Pending);
        assert_eq!(TaskState::parse(""), TaskState::Pending);
        assert_eq!(TaskState::parse("SUCCESS"), TaskState::Pending);
        assert!(!TaskState::Pending.is_terminal());
        assert!(TaskState::Success.is_terminal());
    }

    #[test]
    fn new_trims_trailing_slash() {
        let client = GatewayClient::new("https://ai.example.com/v1/".to_string(), "k".to_string());
        assert_eq!(client.base_url(), "https://ai.example.com/v1");
    }

    #[tokio::test]
    async fn fetch_artifact_rejects_non_http_schemes() {
        let client = GatewayClient::new("https://ai.example.com/v1".to_string(), "k".to_string());
        let result = client.fetch_artifact("file:///etc/passwd", None).await;
        assert!(matches!(result, Err(AppError::InvalidArtifactUrl(_))));
        let result = client.fetch_artifact("ftp://host/file", None).await;
        assert!(matches!(result, Err(AppError::InvalidArtifactUrl(_))));
    }

    #[test]
    fn interpret_create_requires_success_and_task_id() {
        let created = GatewayClient::interpret_create((
            StatusCode::OK,
            json!({"task_id": "abc"}),
        ));
        assert!(matches!(created, CreateResponse::Created { ref task_id, .. } if task_id == "abc"));

        // 200 without task_id is still a rejection
        let rejected = GatewayClient::interpret_create((StatusCode::OK, json!({"ok": true})));
        assert!(matches!(rejected, CreateResponse::Rejected { .. }));

        let rejected = GatewayClient::interpret_create((
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"task_id": "abc"}),
        ));
        assert!(matches!(rejected, CreateResponse::Rejected { .. }));
    }
}
