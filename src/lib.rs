//! Moark API Proxy library
//!
//! Modules:
//! - `relay`: Axum passthrough handlers and router used by the server binary.
//! - `gateway`: Thin client for the upstream generation API.
//! - `task`: Status poller for async generation tasks.
//! - `workflow`: Per-mode generation drivers and the request model.
//! - `artifact`: Download/decode of outputs, timestamp naming, zip bundling.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
//!
//! Re-exports are provided for common types: `Config`, `GatewayClient`,
//! `GenerationRequest`, `PollPolicy`, and `TaskResult`.
pub mod artifact;
pub mod config;
pub mod error;
pub mod gateway;
pub mod relay;
pub mod task;
pub mod workflow;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use gateway::GatewayClient;
pub use task::{PollPolicy, TaskResult};
pub use workflow::GenerationRequest;
