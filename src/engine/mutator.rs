//! Bulk Mutator
//!
//! Executes a reviewed selection of proposed changes: re-fetch the fresh
//! record, snapshot it into the backup ledger, then push the update with
//! pacing and bounded backoff. Produces one outcome per input item in input
//! order regardless of concurrency.
//!
//! Quota is tracked as an explicit [`QuotaBudget`] value consumed during the
//! run and returned in the report; once exhausted (locally or via a remote
//! `quotaExceeded` signal) every remaining item is marked Skipped and no
//! further remote calls are issued.

use crate::engine::ledger::SnapshotStore;
use crate::engine::matcher::{self, MatchResult};
use crate::engine::pager::LIST_COST;
use crate::error::{ApiError, MutationError};
use crate::youtube::client::{VideoRecord, YouTubeClient};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

/// Quota units charged per `videos.update` call
pub const UPDATE_COST: u64 = 50;

/// Default daily budget of the YouTube Data API
pub const DEFAULT_DAILY_UNITS: u64 = 10_000;

/// What happened to one selected item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    /// The remote update succeeded
    Applied,
    /// The update was attempted and failed
    Failed,
    /// The item was never attempted (cancelled, quota halt, or no-op)
    Skipped,
}

/// Per-item result of a bulk run. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub video_id: String,
    pub status: MutationStatus,
    pub error: Option<MutationError>,
}

impl MutationOutcome {
    fn applied(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            status: MutationStatus::Applied,
            error: None,
        }
    }

    fn failed(video_id: &str, error: MutationError) -> Self {
        Self {
            video_id: video_id.to_string(),
            status: MutationStatus::Failed,
            error: Some(error),
        }
    }

    fn skipped(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            status: MutationStatus::Skipped,
            error: None,
        }
    }
}

/// Explicit session quota, passed in and returned functionally.
/// The remote service remains the real authority; this is the local guard
/// that stops a run before it burns the day's allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaBudget {
    units: u64,
}

impl QuotaBudget {
    pub fn new(units: u64) -> Self {
        Self { units }
    }

    pub fn remaining(&self) -> u64 {
        self.units
    }

    pub fn can_afford(&self, cost: u64) -> bool {
        self.units >= cost
    }

    /// Deduct `cost` if affordable; returns false (unchanged) otherwise
    pub fn consume(&mut self, cost: u64) -> bool {
        if self.units < cost {
            return false;
        }
        self.units -= cost;
        true
    }
}

impl Default for QuotaBudget {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_UNITS)
    }
}

/// Tuning knobs for a bulk run. Defaults preserve the qualitative policy:
/// bounded retries, fail-closed backups, order-preserving outcomes.
#[derive(Debug, Clone)]
pub struct MutatorConfig {
    /// Attempts per item before a transient failure becomes terminal
    pub max_attempts: u32,
    /// First backoff delay; doubles per retry
    pub backoff_base: Duration,
    /// Write pacing ceiling, independent of the daily budget (0 = unpaced)
    pub writes_per_minute: u32,
    /// Worker pool size for per-item execution
    pub concurrency: usize,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_millis(500),
            writes_per_minute: 30,
            concurrency: 4,
        }
    }
}

/// Cooperative cancellation handle. Takes effect between items: in-flight
/// items complete or fail naturally, unstarted items become Skipped.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The reviewed selection plus the find/replace pair, carried so proposals
/// can be recomputed against the freshly fetched description
#[derive(Debug, Clone)]
pub struct ApplyPlan {
    pub pattern: String,
    pub replacement: String,
    pub case_sensitive: bool,
    pub selected: Vec<MatchResult>,
}

/// Result of a bulk run
#[derive(Debug, Clone)]
pub struct BulkReport {
    pub run_id: Uuid,
    /// One outcome per input item, input order
    pub outcomes: Vec<MutationOutcome>,
    /// Budget left after the run
    pub budget: QuotaBudget,
    /// True when the run stopped issuing remote calls (quota or auth)
    pub halted: bool,
}

impl BulkReport {
    pub fn count(&self, status: MutationStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// Paces remote writes under a per-minute ceiling. Each caller reserves the
/// next slot under the lock, then sleeps outside it.
struct Pacer {
    min_interval: Duration,
    next_slot: Mutex<Instant>,
}

impl Pacer {
    fn new(per_minute: u32) -> Self {
        let min_interval = if per_minute == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(60.0 / per_minute as f64)
        };
        Self {
            min_interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let wait = {
            let mut slot = self.next_slot.lock().await;
            let now = Instant::now();
            let at = (*slot).max(now);
            *slot = at + self.min_interval;
            at - now
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

/// State shared by concurrent item workers within one run
struct RunState {
    halt: AtomicBool,
    budget: Mutex<QuotaBudget>,
    pacer: Pacer,
}

impl RunState {
    fn halted(&self) -> bool {
        self.halt.load(Ordering::SeqCst)
    }

    fn set_halted(&self) {
        self.halt.store(true, Ordering::SeqCst);
    }
}

/// Orchestrates snapshot-then-update for a reviewed selection
pub struct BulkMutator<'a> {
    client: &'a YouTubeClient,
    ledger: &'a dyn SnapshotStore,
    config: MutatorConfig,
    cancel: CancelFlag,
}

impl<'a> BulkMutator<'a> {
    pub fn new(
        client: &'a YouTubeClient,
        ledger: &'a dyn SnapshotStore,
        config: MutatorConfig,
    ) -> Self {
        Self {
            client,
            ledger,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle for cancelling the run from another task
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Apply the selection. One outcome per input, input order.
    pub async fn apply(&self, plan: &ApplyPlan, budget: QuotaBudget) -> BulkReport {
        let run_id = Uuid::new_v4();
        tracing::info!(
            %run_id,
            items = plan.selected.len(),
            units = budget.remaining(),
            "bulk apply started"
        );

        let state = RunState {
            halt: AtomicBool::new(false),
            budget: Mutex::new(budget),
            pacer: Pacer::new(self.config.writes_per_minute),
        };

        let mut indexed: Vec<(usize, MutationOutcome)> =
            stream::iter(plan.selected.iter().enumerate())
                .map(|(idx, selected)| {
                    let state = &state;
                    async move { (idx, self.apply_one(selected, plan, state).await) }
                })
                .buffered(self.config.concurrency.max(1))
                .collect()
                .await;

        // buffered yields in order, but the report contract is input order,
        // so tie outcomes back to their index explicitly
        indexed.sort_by_key(|(idx, _)| *idx);
        let outcomes: Vec<MutationOutcome> = indexed.into_iter().map(|(_, o)| o).collect();

        let report = BulkReport {
            run_id,
            budget: *state.budget.lock().await,
            halted: state.halted(),
            outcomes,
        };

        tracing::info!(
            %run_id,
            applied = report.count(MutationStatus::Applied),
            failed = report.count(MutationStatus::Failed),
            skipped = report.count(MutationStatus::Skipped),
            units_left = report.budget.remaining(),
            "bulk apply finished"
        );

        report
    }

    /// Restore each video to its most recent backup. Same outcome contract
    /// as [`apply`](Self::apply); a missing backup is a per-item failure,
    /// never fatal to the batch.
    pub async fn restore(&self, video_ids: &[String], budget: QuotaBudget) -> BulkReport {
        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, items = video_ids.len(), "bulk restore started");

        let state = RunState {
            halt: AtomicBool::new(false),
            budget: Mutex::new(budget),
            pacer: Pacer::new(self.config.writes_per_minute),
        };

        let mut indexed: Vec<(usize, MutationOutcome)> = stream::iter(video_ids.iter().enumerate())
            .map(|(idx, video_id)| {
                let state = &state;
                async move { (idx, self.restore_one(video_id, state).await) }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        indexed.sort_by_key(|(idx, _)| *idx);
        let outcomes: Vec<MutationOutcome> = indexed.into_iter().map(|(_, o)| o).collect();

        let report = BulkReport {
            run_id,
            budget: *state.budget.lock().await,
            halted: state.halted(),
            outcomes,
        };

        tracing::info!(
            %run_id,
            applied = report.count(MutationStatus::Applied),
            failed = report.count(MutationStatus::Failed),
            skipped = report.count(MutationStatus::Skipped),
            "bulk restore finished"
        );

        report
    }

    async fn apply_one(
        &self,
        selected: &MatchResult,
        plan: &ApplyPlan,
        state: &RunState,
    ) -> MutationOutcome {
        let video_id = &selected.video_id;

        if self.cancel.is_cancelled() || state.halted() {
            return MutationOutcome::skipped(video_id);
        }

        if !self.reserve_item_budget(video_id, state).await {
            return MutationOutcome::skipped(video_id);
        }

        // Freshest known description: re-fetch so concurrent external edits
        // are not clobbered, and so the update body carries the full snippet
        let record = match self.fetch_fresh(video_id, state).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return MutationOutcome::failed(
                    video_id,
                    MutationError::RemoteRejected("video not found".to_string()),
                )
            }
            Err(outcome) => return outcome,
        };

        let (proposed, count) = matcher::replace_all(
            &record.description,
            &plan.pattern,
            &plan.replacement,
            plan.case_sensitive,
        );
        if count == 0 {
            tracing::info!(%video_id, "pattern no longer present, skipping");
            return MutationOutcome::skipped(video_id);
        }

        self.snapshot_then_update(&record, &proposed, state).await
    }

    async fn restore_one(&self, video_id: &str, state: &RunState) -> MutationOutcome {
        if self.cancel.is_cancelled() || state.halted() {
            return MutationOutcome::skipped(video_id);
        }

        // Capture the target before snapshotting the current state, or the
        // restore would chase its own snapshot
        let Some(target) = self.ledger.latest(video_id) else {
            return MutationOutcome::failed(video_id, MutationError::NoBackup);
        };

        if !self.reserve_item_budget(video_id, state).await {
            return MutationOutcome::skipped(video_id);
        }

        let record = match self.fetch_fresh(video_id, state).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return MutationOutcome::failed(
                    video_id,
                    MutationError::RemoteRejected("video not found".to_string()),
                )
            }
            Err(outcome) => return outcome,
        };

        if record.description == target.description {
            tracing::info!(%video_id, "already matches latest backup, skipping");
            return MutationOutcome::skipped(video_id);
        }

        self.snapshot_then_update(&record, &target.description, state)
            .await
    }

    /// Check that one read plus one write still fits the budget and charge
    /// the read. On exhaustion, halt the run.
    async fn reserve_item_budget(&self, video_id: &str, state: &RunState) -> bool {
        let mut budget = state.budget.lock().await;
        if !budget.can_afford(LIST_COST + UPDATE_COST) {
            tracing::warn!(
                %video_id,
                units_left = budget.remaining(),
                "local quota budget exhausted, halting run"
            );
            state.set_halted();
            return false;
        }
        budget.consume(LIST_COST);
        true
    }

    /// Snapshot the pre-mutation description (fail-closed), then push the
    /// update. The snapshot is durable before any remote write is attempted.
    async fn snapshot_then_update(
        &self,
        record: &VideoRecord,
        new_description: &str,
        state: &RunState,
    ) -> MutationOutcome {
        if let Err(e) = self
            .ledger
            .snapshot(&record.id, &record.title, &record.description)
        {
            tracing::error!(video_id = %record.id, error = %e, "backup write failed, mutation blocked");
            return MutationOutcome::failed(
                &record.id,
                MutationError::BackupWriteFailed(e.to_string()),
            );
        }

        {
            let mut budget = state.budget.lock().await;
            if !budget.consume(UPDATE_COST) {
                state.set_halted();
                return MutationOutcome::skipped(&record.id);
            }
        }

        self.push_update(record, new_description, state).await
    }

    /// Fetch the current record with bounded retry on transient errors.
    /// Terminal errors are returned as the item's outcome.
    async fn fetch_fresh(
        &self,
        video_id: &str,
        state: &RunState,
    ) -> Result<Option<VideoRecord>, MutationOutcome> {
        let mut attempt = 0;
        loop {
            match self.client.video(video_id).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt >= self.config.max_attempts {
                        return Err(MutationOutcome::failed(video_id, transient_error(&e)));
                    }
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(%video_id, attempt, ?delay, error = %e, "read failed, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(self.terminal_outcome(video_id, e, state)),
            }
        }
    }

    /// Push the remote update, paced, with exponential backoff on transient
    /// failures up to the attempt bound
    async fn push_update(
        &self,
        record: &VideoRecord,
        new_description: &str,
        state: &RunState,
    ) -> MutationOutcome {
        let video_id = &record.id;
        let mut attempt = 0;
        loop {
            state.pacer.acquire().await;
            match self.client.update_description(record, new_description).await {
                Ok(()) => return MutationOutcome::applied(video_id),
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt >= self.config.max_attempts {
                        tracing::warn!(%video_id, attempts = attempt, "retries exhausted");
                        return MutationOutcome::failed(video_id, transient_error(&e));
                    }
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(%video_id, attempt, ?delay, error = %e, "update failed, backing off");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return self.terminal_outcome(video_id, e, state),
            }
        }
    }

    /// Map a non-transient API error to an outcome, halting the run when the
    /// error poisons every later item too
    fn terminal_outcome(
        &self,
        video_id: &str,
        error: ApiError,
        state: &RunState,
    ) -> MutationOutcome {
        match error {
            ApiError::QuotaExceeded => {
                tracing::warn!(%video_id, "remote quota exhausted, halting run");
                state.set_halted();
                MutationOutcome::failed(video_id, MutationError::QuotaExceeded)
            }
            ApiError::AuthFailure(message) => {
                tracing::error!(%video_id, %message, "authentication failed, halting run");
                state.set_halted();
                MutationOutcome::failed(video_id, MutationError::AuthFailure(message))
            }
            ApiError::RemoteRejected { code, message } => {
                MutationOutcome::failed(video_id, MutationError::RemoteRejected(format!("{code}: {message}")))
            }
            ApiError::Remote { code, message } => {
                MutationOutcome::failed(video_id, MutationError::RemoteRejected(format!("{code}: {message}")))
            }
            // is_transient() arms are handled by the retry loops
            ApiError::RateLimited => MutationOutcome::failed(video_id, MutationError::RateLimited),
            ApiError::NetworkUnreachable(message) => {
                MutationOutcome::failed(video_id, MutationError::Network(message))
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.config.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

fn transient_error(error: &ApiError) -> MutationError {
    match error {
        ApiError::RateLimited => MutationError::RateLimited,
        ApiError::NetworkUnreachable(message) => MutationError::Network(message.clone()),
        _ => MutationError::RemoteRejected(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_consume_respects_floor() {
        let mut budget = QuotaBudget::new(60);
        assert!(budget.consume(50));
        assert_eq!(budget.remaining(), 10);
        assert!(!budget.consume(50));
        assert_eq!(budget.remaining(), 10);
    }

    #[test]
    fn budget_affordability_covers_read_plus_write() {
        let budget = QuotaBudget::new(LIST_COST + UPDATE_COST);
        assert!(budget.can_afford(LIST_COST + UPDATE_COST));
        assert!(!QuotaBudget::new(UPDATE_COST).can_afford(LIST_COST + UPDATE_COST));
    }

    #[test]
    fn cancel_flag_propagates_to_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let mutator_config = MutatorConfig {
            backoff_base: Duration::from_millis(100),
            ..Default::default()
        };
        // Exercise the arithmetic without a client
        let base = mutator_config.backoff_base;
        assert_eq!(base * 2u32.pow(0), Duration::from_millis(100));
        assert_eq!(base * 2u32.pow(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn pacer_spaces_acquisitions() {
        let pacer = Pacer::new(3000); // 20ms apart
        let start = std::time::Instant::now();
        pacer.acquire().await;
        pacer.acquire().await;
        pacer.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn unpaced_pacer_returns_immediately() {
        let pacer = Pacer::new(0);
        let start = std::time::Instant::now();
        for _ in 0..100 {
            pacer.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
