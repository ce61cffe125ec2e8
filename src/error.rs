//! Common error type and result alias used across the crate.
//!
//! Terminal-but-unsuccessful task outcomes (failed/cancelled/timed out) are not
//! errors; they are reported as `TaskResult` values. `AppError` covers faults
//! that abort a workflow: bad input, rejected task creation, transport
//! failures, artifact retrieval and bundling problems.
use serde_json::Value;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("API key not configured; pass --api-key, set MOARK_API_KEY, or run `moarkctl key remember`")]
    MissingApiKey,

    #[error("{0}")]
    Validation(String),

    /// Task submission was rejected, or succeeded without a task identifier.
    /// Carries the raw upstream body for diagnostics.
    #[error("task creation failed (HTTP {status}): {body}")]
    TaskCreation { status: u16, body: Value },

    #[error("artifact fetch failed (HTTP {status}): {detail}")]
    ArtifactFetch { status: u16, detail: String },

    /// The task reported success but its output lacks the file reference the
    /// workflow needs.
    #[error("task {task_id} succeeded but returned no usable output")]
    MissingOutput { task_id: String, raw: Value },

    #[error("invalid artifact url (expected http:// or https://): {0}")]
    InvalidArtifactUrl(String),

    #[error("bundling failed: {0}")]
    Bundling(String),

    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Cap a diagnostic body for error messages. Upstream error pages can be
/// arbitrarily large; 240 bytes is enough to identify the failure.
pub fn truncate_diagnostic(body: &str) -> String {
    const MAX: usize = 240;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}
