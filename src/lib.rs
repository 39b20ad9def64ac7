//! questclaim: quest-board monitor that auto-claims tasks for registered accounts.
//!
//! # Architecture
//!
//! Each configured account runs an independent polling loop:
//! - **Monitor** (`monitor`): fetches the quest board, fetches detail for unseen
//!   quests and decides what to claim
//! - **Classifier** (`classify`): maps a quest to social platforms by keyword and link
//! - **Match store** (`store`): operator-registered links and their proof artifacts
//! - **Claim pool** (`claim`): bounded queue of claim jobs with completion reports
//! - **Notifier** (`notify`): best-effort Telegram delivery with retry
//! - **Upload form** (`upload`): axum server where operators register proofs
//!
//! Link extraction from quest descriptions lives in the `quest-doc` crate.

pub mod account;
pub mod app_dirs;
pub mod claim;
pub mod classify;
pub mod config;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod seen;
pub mod store;
pub mod upload;
pub mod upstream;

pub use account::{Account, AccountContext};
pub use claim::{ClaimJob, ClaimOutcome, ClaimPool, ClaimReport, ClaimValue};
pub use classify::{Classification, Platform, classify};
pub use config::{BotConfig, ClaimRetryPolicy};
pub use error::{QuestError, Result};
pub use monitor::{AccountMonitor, CycleSummary};
pub use notify::{Notifier, NoopNotifier, RecordingNotifier, TelegramNotifier};
pub use seen::SeenSet;
pub use store::{MatchStore, Registry};
pub use upstream::UpstreamClient;
