//! Per-account polling loop.
//!
//! Each cycle fetches the board, fetches detail for every quest not yet in
//! the seen set, decides a claim per task, and queues claim jobs on the
//! account's [`ClaimPool`]. Cycles repeat forever with a fixed sleep; errors
//! end the current cycle only.

use crate::account::AccountContext;
use crate::claim::{ClaimJob, ClaimPool, ClaimReport, ClaimValue, ConsumedLink};
use crate::classify::{Classification, classify};
use crate::config::{BotConfig, ClaimRetryPolicy};
use crate::error::{QuestError, Result};
use crate::seen::SeenSet;
use crate::upstream::{QuestDetail, Task, TaskType};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Counters for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Board entries with an id.
    pub quests_seen: usize,
    /// Quests skipped because they were already in the seen set.
    pub already_seen: usize,
    pub details_fetched: usize,
    pub claims_dispatched: usize,
    /// Unseen quests with no claimable task (or whose detail fetch failed).
    pub skipped: usize,
    /// Claim reports applied at the start of the cycle.
    pub reports_applied: usize,
}

/// Drives one account.
pub struct AccountMonitor {
    ctx: Arc<AccountContext>,
    seen: SeenSet,
    announced: HashSet<(String, String)>,
    /// Under `NextPoll`: (quest, task) pairs dispatched and not reported failed.
    claimed: HashSet<(String, String)>,
    pool: ClaimPool,
    poll_interval: Duration,
    retry: ClaimRetryPolicy,
    cycles: u64,
}

impl AccountMonitor {
    /// Build a monitor and spawn its claim workers.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(ctx: Arc<AccountContext>, seen: SeenSet, config: &BotConfig) -> Self {
        let pool = ClaimPool::spawn(Arc::clone(&ctx), config.max_workers, config.queue_capacity);
        Self {
            ctx,
            seen,
            announced: HashSet::new(),
            claimed: HashSet::new(),
            pool,
            poll_interval: config.poll_interval(),
            retry: config.claim_retry,
            cycles: 0,
        }
    }

    pub fn context(&self) -> &AccountContext {
        &self.ctx
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Run one poll cycle.
    ///
    /// # Errors
    ///
    /// Returns the board fetch error; per-quest errors are logged and counted
    /// as skipped.
    pub async fn poll_once(&mut self) -> Result<CycleSummary> {
        let mut summary = CycleSummary {
            reports_applied: self.apply_reports(),
            ..Default::default()
        };

        self.cycles += 1;
        let account = self.ctx.name().to_owned();
        tracing::info!(account = %account, cycle = self.cycles, "fetching questboard");
        let boxes = self.ctx.client.fetch_board().await?;

        for quest_box in &boxes {
            let box_id = quest_box.id.as_deref();
            for quest in &quest_box.quests {
                let Some(quest_id) = quest.id.as_deref() else {
                    continue;
                };
                summary.quests_seen += 1;
                if self.seen.contains(quest_id) {
                    summary.already_seen += 1;
                    continue;
                }

                let detail = match self.ctx.client.fetch_detail(quest_id).await {
                    Ok(detail) => detail,
                    Err(e) => {
                        tracing::warn!(account = %account, quest_id, "quest detail unavailable: {e}");
                        summary.skipped += 1;
                        continue;
                    }
                };
                summary.details_fetched += 1;

                let title = quest.title().to_owned();
                let frontend = self.ctx.client.frontend_url(box_id, quest_id);
                let jobs = self.plan_quest(quest_id, box_id, &title, &frontend, &detail).await;
                if jobs.is_empty() {
                    // A reopened quest whose remaining tasks are all claimed or in flight.
                    if self.claimed.iter().any(|(quest, _)| quest == quest_id) {
                        self.seen.insert(quest_id);
                    }
                    summary.skipped += 1;
                    continue;
                }

                self.seen.insert(quest_id);
                for job in jobs {
                    if self.retry == ClaimRetryPolicy::NextPoll {
                        self.claimed
                            .insert((job.quest_id.clone(), job.task_id.clone()));
                    }
                    tracing::info!(account = %account, quest_id, task_id = %job.task_id, "claiming: {title}");
                    match self.pool.dispatch(job).await {
                        Ok(()) => summary.claims_dispatched += 1,
                        Err(e) => tracing::error!(account = %account, quest_id, "claim not queued: {e}"),
                    }
                }
            }
        }

        tracing::debug!(account = %account, ?summary, "cycle finished");
        Ok(summary)
    }

    /// Announce each task once and build claim jobs for the claimable ones.
    async fn plan_quest(
        &mut self,
        quest_id: &str,
        box_id: Option<&str>,
        title: &str,
        frontend: &str,
        detail: &QuestDetail,
    ) -> Vec<ClaimJob> {
        let mut classification: Option<Classification> = None;
        let mut jobs = Vec::new();

        for task in &detail.tasks {
            let Some(task_id) = task.id.as_deref() else {
                continue;
            };

            if self
                .announced
                .insert((quest_id.to_owned(), task_id.to_owned()))
            {
                let message = format!(
                    "[{}] Found task: {title}\nType: {}\nURL: {frontend}",
                    self.ctx.name(),
                    task.kind
                );
                tracing::info!(account = self.ctx.name(), quest_id, task_id, "{message}");
                self.ctx.notify(&message).await;
            }

            let value = match &task.kind {
                TaskType::TweetReact => Some((ClaimValue::TweetReact, None)),
                TaskType::File | TaskType::Url => {
                    let classes = *classification.get_or_insert_with(|| classify(detail, title));
                    self.match_registered(task, detail, classes)
                }
                TaskType::Other(kind) => {
                    tracing::debug!(account = self.ctx.name(), quest_id, kind = %kind, "task type not auto-claimable");
                    None
                }
            };

            if self
                .claimed
                .contains(&(quest_id.to_owned(), task_id.to_owned()))
            {
                tracing::debug!(account = self.ctx.name(), quest_id, task_id, "task already claimed");
                continue;
            }

            if let Some((value, consumed)) = value {
                jobs.push(ClaimJob {
                    quest_id: quest_id.to_owned(),
                    task_id: task_id.to_owned(),
                    box_id: box_id.map(str::to_owned),
                    title: title.to_owned(),
                    value,
                    consumed,
                });
            }
        }
        jobs
    }

    /// First description link (in document order) with registered proof, for
    /// each platform the quest was classified as.
    fn match_registered(
        &self,
        task: &Task,
        detail: &QuestDetail,
        classes: Classification,
    ) -> Option<(ClaimValue, Option<ConsumedLink>)> {
        let account = self.ctx.name();
        for platform in classes.platforms() {
            for link in detail.description.links_matching(platform.domains()) {
                let artifacts = match self.ctx.store.lookup(account, platform, link) {
                    Ok(Some(artifacts)) => artifacts,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::error!(account, platform = %platform, "registry lookup failed: {e}");
                        continue;
                    }
                };
                let value = match task.kind {
                    TaskType::Url => artifacts.first().cloned().map(ClaimValue::Url),
                    _ if artifacts.is_empty() => None,
                    _ => Some(ClaimValue::Files(artifacts)),
                };
                if let Some(value) = value {
                    let consumed = ConsumedLink {
                        platform,
                        link: link.to_owned(),
                    };
                    return Some((value, Some(consumed)));
                }
            }
        }
        None
    }

    /// Apply finished claim reports according to the retry policy.
    fn apply_reports(&mut self) -> usize {
        let reports = self.pool.drain_reports();
        for report in &reports {
            self.apply_report(report);
        }
        reports.len()
    }

    fn apply_report(&mut self, report: &ClaimReport) {
        Self::apply_report_parts(
            &self.ctx,
            &mut self.seen,
            &mut self.claimed,
            self.retry,
            report,
        );
    }

    fn apply_report_parts(
        ctx: &AccountContext,
        seen: &mut SeenSet,
        claimed: &mut HashSet<(String, String)>,
        retry: ClaimRetryPolicy,
        report: &ClaimReport,
    ) {
        if report.outcome.is_success() || retry == ClaimRetryPolicy::Never {
            return;
        }
        // Only the failed task is retried; its siblings stay claimed.
        claimed.remove(&(report.job.quest_id.clone(), report.job.task_id.clone()));
        if seen.remove(&report.job.quest_id) {
            tracing::info!(
                account = ctx.name(),
                quest_id = %report.job.quest_id,
                "claim failed; quest will be retried on the next poll"
            );
        }
    }

    /// Run `cycles` poll cycles, sleeping the poll interval after each.
    pub async fn run_cycles(&mut self, cycles: usize) -> Vec<Result<CycleSummary>> {
        let mut results = Vec::with_capacity(cycles);
        for _ in 0..cycles {
            let result = self.poll_once().await;
            self.log_cycle_error(&result).await;
            results.push(result);
            tokio::time::sleep(self.poll_interval).await;
        }
        results
    }

    /// Poll forever. Only process termination stops this loop.
    pub async fn run(mut self) {
        tracing::info!(
            account = self.ctx.name(),
            cookie = %self.ctx.account.cookie_preview(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "monitor started"
        );
        loop {
            let result = self.poll_once().await;
            self.log_cycle_error(&result).await;
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Stop the claim pool, apply its last reports and hand back the seen set.
    pub async fn shutdown(mut self) -> (SeenSet, Vec<ClaimReport>) {
        let reports = self.pool.shutdown().await;
        for report in &reports {
            Self::apply_report_parts(
                &self.ctx,
                &mut self.seen,
                &mut self.claimed,
                self.retry,
                report,
            );
        }
        (self.seen, reports)
    }

    async fn log_cycle_error(&self, result: &Result<CycleSummary>) {
        let Err(err) = result else {
            return;
        };
        let account = self.ctx.name();
        match err {
            QuestError::Status { status, .. } => {
                tracing::warn!(account, status, "error fetching questboard");
            }
            QuestError::Http(e) => {
                tracing::warn!(account, "questboard request failed: {e}");
            }
            other => {
                tracing::error!(account, "general error: {other}");
                self.ctx
                    .notify(&format!("[{account}] General error: {other}"))
                    .await;
            }
        }
    }
}
