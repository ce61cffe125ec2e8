pub mod poller;

pub use poller::{poll_task, PollPolicy, PollTick, TaskResult};
