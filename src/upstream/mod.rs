//! Quest-board API access: response types and the per-account client.

pub mod client;
pub mod types;

pub use client::{ClaimResponse, UpstreamClient};
pub use types::{QuestBox, QuestDetail, QuestSummary, Task, TaskType};
