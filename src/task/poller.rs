//! Fixed-interval task poller.
//!
//! Queries `task/{id}` until a terminal status is observed or a deadline
//! passes. The deadline produces a synthetic `TimedOut` result rather than an
//! error: the caller must handle it like any other terminal outcome. Each call
//! is stateless; nothing is cached between polls.
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::AppResult;
use crate::gateway::{GatewayClient, TaskOutput, TaskState};

/// Default wait between status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(6);

/// Default overall deadline for one task (30 minutes).
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            timeout: DEFAULT_POLL_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        PollPolicy { timeout, interval }
    }
}

/// Progress event sent before each status query. Consumers (CLI status line,
/// UI) receive these over a channel so the loop never depends on what they do
/// with them; a dropped receiver is ignored.
#[derive(Debug, Clone, Copy)]
pub struct PollTick {
    /// 1-based count of status queries issued so far, including this one.
    pub polls: u32,
    pub elapsed: Duration,
}

/// Terminal outcome of one polled task.
#[derive(Debug)]
pub enum TaskResult {
    Success {
        output: Option<TaskOutput>,
        raw: Value,
    },
    Failed {
        raw: Value,
    },
    Cancelled {
        raw: Value,
    },
    /// The deadline elapsed without a terminal status. Synthesized locally;
    /// the upstream task may still be running.
    TimedOut,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskResult::Success { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskResult::Success { .. } => "success",
            TaskResult::Failed { .. } => "failed",
            TaskResult::Cancelled { .. } => "cancelled",
            TaskResult::TimedOut => "timeout",
        }
    }

    /// Raw diagnostic payload for reporting. `TimedOut` has no upstream body,
    /// so it gets a synthesized one.
    pub fn raw(&self) -> Value {
        match self {
            TaskResult::Success { raw, .. }
            | TaskResult::Failed { raw }
            | TaskResult::Cancelled { raw } => raw.clone(),
            TaskResult::TimedOut => {
                json!({"status": "timeout", "message": "maximum wait time exceeded"})
            }
        }
    }
}

/// Poll `task_id` until terminal or deadline.
///
/// The first query is issued immediately; subsequent queries wait
/// `policy.interval` between cycles, so the call returns within
/// `timeout + interval` wall clock in all cases. Transport failures abort with
/// `Err`; HTTP-level errors from the status endpoint read as pending.
pub async fn poll_task(
    client: &GatewayClient,
    task_id: &str,
    policy: PollPolicy,
    progress: Option<&mpsc::UnboundedSender<PollTick>>,
) -> AppResult<TaskResult> {
    let start = Instant::now();
    let mut polls: u32 = 0;

    while start.elapsed() < policy.timeout {
        polls += 1;
        if let Some(tx) = progress {
            let _ = tx.send(PollTick {
                polls,
                elapsed: start.elapsed(),
            });
        }

        let status = client.task_status(task_id).await?;
        match status.state {
            TaskState::Success => {
                tracing::info!("Task {} finished: success", task_id);
                return Ok(TaskResult::Success {
                    output: status.output,
                    raw: status.raw,
                });
            }
            TaskState::Failed => {
                tracing::warn!("Task {} finished: failed", task_id);
                return Ok(TaskResult::Failed { raw: status.raw });
            }
            TaskState::Cancelled => {
                tracing::warn!("Task {} finished: cancelled", task_id);
                return Ok(TaskResult::Cancelled { raw: status.raw });
            }
            TaskState::Pending => {
                tracing::debug!("Task {} pending (poll {})", task_id, polls);
            }
        }

        tokio::time::sleep(policy.interval).await;
    }

    tracing::warn!("Task {} did not finish within {:?}", task_id, policy.timeout);
    Ok(TaskResult::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_six_seconds_thirty_minutes() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(6));
        assert_eq!(policy.timeout, Duration::from_secs(1800));
    }

    #[test]
    fn timed_out_synthesizes_a_diagnostic_body() {
        let result = TaskResult::TimedOut;
        assert!(!result.is_success());
        assert_eq!(result.label(), "timeout");
        assert_eq!(result.raw()["status"], "timeout");
    }

    #[test]
    fn labels_match_terminal_states() {
        let success = TaskResult::Success {
            output: None,
            raw: json!({"status": "success"}),
        };
        assert!(success.is_success());
        assert_eq!(success.label(), "success");
        assert_eq!(TaskResult::Failed { raw: json!({}) }.label(), "failed");
        assert_eq!(TaskResult::Cancelled { raw: json!({}) }.label(), "cancelled");
    }
}
