//! Bounded per-account claim worker pool.
//!
//! Jobs go onto a bounded queue shared by a fixed number of workers. Every
//! finished job yields a [`ClaimReport`] on an unbounded report channel that
//! the monitor drains between polls.

use crate::account::AccountContext;
use crate::claim::{ClaimJob, ClaimOutcome, submit};
use crate::error::{QuestError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

/// Completion record for one claim job.
#[derive(Debug, Clone)]
pub struct ClaimReport {
    pub job: ClaimJob,
    pub outcome: ClaimOutcome,
    pub finished_at: DateTime<Utc>,
}

/// Worker pool owned by one account monitor.
pub struct ClaimPool {
    jobs_tx: Option<mpsc::Sender<ClaimJob>>,
    reports_rx: mpsc::UnboundedReceiver<ClaimReport>,
    workers: JoinSet<()>,
}

impl ClaimPool {
    /// Spawn `workers` claim workers behind a queue of `capacity` jobs.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn spawn(ctx: Arc<AccountContext>, workers: usize, capacity: usize) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel::<ClaimJob>(capacity.max(1));
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let jobs_rx = Arc::new(Mutex::new(jobs_rx));

        let mut set = JoinSet::new();
        for worker in 0..workers.max(1) {
            let ctx = Arc::clone(&ctx);
            let jobs_rx = Arc::clone(&jobs_rx);
            let reports_tx = reports_tx.clone();
            set.spawn(async move {
                loop {
                    // Hold the receiver lock only while waiting for the next job.
                    let next = jobs_rx.lock().await.recv().await;
                    let Some(job) = next else {
                        break;
                    };
                    tracing::debug!(
                        account = ctx.name(),
                        worker,
                        quest_id = %job.quest_id,
                        "claim job started"
                    );
                    let outcome = submit(&ctx, &job).await;
                    let report = ClaimReport {
                        job,
                        outcome,
                        finished_at: Utc::now(),
                    };
                    if reports_tx.send(report).is_err() {
                        tracing::debug!(worker, "report receiver gone");
                    }
                }
            });
        }

        Self {
            jobs_tx: Some(jobs_tx),
            reports_rx,
            workers: set,
        }
    }

    /// Queue a job, waiting for space when the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`QuestError::Config`] when the pool has been shut down.
    pub async fn dispatch(&self, job: ClaimJob) -> Result<()> {
        let Some(tx) = &self.jobs_tx else {
            return Err(QuestError::Config("claim pool is shut down".into()));
        };
        tx.send(job)
            .await
            .map_err(|_| QuestError::Config("claim pool workers have stopped".into()))
    }

    /// Reports of jobs finished since the last call.
    pub fn drain_reports(&mut self) -> Vec<ClaimReport> {
        let mut reports = Vec::new();
        while let Ok(report) = self.reports_rx.try_recv() {
            reports.push(report);
        }
        reports
    }

    /// Close the queue, wait for queued and in-flight jobs, and return the
    /// reports not yet drained.
    pub async fn shutdown(mut self) -> Vec<ClaimReport> {
        self.jobs_tx.take();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("claim worker panicked: {e}");
            }
        }
        self.drain_reports()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::account::Account;
    use crate::claim::ClaimValue;
    use crate::config::{ApiConfig, BotConfig};
    use crate::notify::RecordingNotifier;
    use crate::store::MatchStore;

    fn unreachable_context(notifier: Arc<RecordingNotifier>) -> Arc<AccountContext> {
        let config = BotConfig {
            api: ApiConfig {
                // Nothing listens on port 1; every claim is a transport error.
                base_url: "http://127.0.0.1:1".into(),
                ..Default::default()
            },
            request_timeout_secs: 2,
            ..Default::default()
        };
        let ctx = AccountContext::new(
            &config,
            Account::new("alice", "sid=1"),
            MatchStore::new(std::env::temp_dir().join("questclaim-pool-test")),
            notifier,
        )
        .unwrap();
        Arc::new(ctx)
    }

    fn job(n: usize) -> ClaimJob {
        ClaimJob {
            quest_id: format!("q{n}"),
            task_id: format!("t{n}"),
            box_id: None,
            title: format!("Quest {n}"),
            value: ClaimValue::TweetReact,
            consumed: None,
        }
    }

    #[tokio::test]
    async fn every_job_produces_one_report() {
        let notifier = Arc::new(RecordingNotifier::new());
        let pool = ClaimPool::spawn(unreachable_context(Arc::clone(&notifier)), 3, 2);
        for n in 0..5 {
            pool.dispatch(job(n)).await.unwrap();
        }
        let reports = pool.shutdown().await;
        assert_eq!(reports.len(), 5);
        assert!(
            reports
                .iter()
                .all(|r| matches!(r.outcome, ClaimOutcome::TransportError(_)))
        );
        let mut ids: Vec<_> = reports.iter().map(|r| r.job.quest_id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["q0", "q1", "q2", "q3", "q4"]);
        assert_eq!(notifier.count_containing("Error claiming"), 5);
    }

    #[tokio::test]
    async fn shutdown_with_no_jobs_returns_empty() {
        let notifier = Arc::new(RecordingNotifier::new());
        let pool = ClaimPool::spawn(unreachable_context(notifier), 2, 4);
        assert!(pool.shutdown().await.is_empty());
    }
}
