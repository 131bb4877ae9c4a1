use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::bulk::BulkResolution;
use super::config::{QueueSettings, MAX_BULK_LIMIT};
use super::domain::{
    Milestone, NewReviewItem, ResolutionOutcome, ReviewItem, ReviewItemId, ReviewStatus,
    ReviewerId, SlaStatus, UserId,
};
use super::priority::PriorityScorer;
use super::repository::{
    resolve_recipient, NotifiedItem, Notifier, QueueFilter, RepositoryError,
    ResolutionNotification, ReviewRepository, SubjectDirectory,
};
use super::sla::{SlaCalculator, TimeRemaining};
use super::statistics::{ProcessingTimeEntry, SlaStatistics, StatisticsAggregator};
use crate::clock::{Clock, SystemClock};

/// Error raised by the review queue service.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("review item {0} not found")]
    NotFound(ReviewItemId),
    #[error("review item {id} is {status} and no longer actionable")]
    InvalidState {
        id: ReviewItemId,
        status: ReviewStatus,
    },
    #[error("a rejection reason is required")]
    MissingReason,
    #[error(
        "review item {id} is {} and has not reached the {} milestone",
        .sla_status.label(),
        .milestone.label()
    )]
    MilestoneNotReached {
        id: ReviewItemId,
        milestone: Milestone,
        sla_status: SlaStatus,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ReviewError {
    /// Short per-item reason used in bulk results, where the id is already prefixed.
    pub fn item_reason(&self) -> String {
        match self {
            ReviewError::NotFound(_) => "not found".to_string(),
            ReviewError::InvalidState { status, .. } => {
                format!("already {status}; only pending or in_review items can be resolved")
            }
            ReviewError::MissingReason => "rejection reason is required".to_string(),
            ReviewError::MilestoneNotReached { milestone, .. } => {
                format!("{} milestone not reached", milestone.label())
            }
            ReviewError::Repository(err) => err.to_string(),
        }
    }
}

/// Result of one SLA sweep over the actionable queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub refreshed: usize,
    pub changed: usize,
    pub on_track: usize,
    pub at_risk: usize,
    pub breached: usize,
}

impl SweepSummary {
    fn tally(&mut self, status: SlaStatus) {
        self.refreshed += 1;
        match status {
            SlaStatus::OnTrack => self.on_track += 1,
            SlaStatus::AtRisk => self.at_risk += 1,
            SlaStatus::Breached => self.breached += 1,
        }
    }
}

#[derive(Debug, Clone)]
struct Resolution {
    outcome: ResolutionOutcome,
    reviewer: ReviewerId,
    notes: Option<String>,
}

impl Resolution {
    fn approve(reviewer: ReviewerId, notes: Option<String>) -> Self {
        Self {
            outcome: ResolutionOutcome::Approved,
            reviewer,
            notes: normalize_notes(notes),
        }
    }

    fn reject(reviewer: ReviewerId, reason: &str) -> Result<Self, ReviewError> {
        let notes = normalize_notes(Some(reason.to_string())).ok_or(ReviewError::MissingReason)?;
        Ok(Self {
            outcome: ResolutionOutcome::Rejected,
            reviewer,
            notes: Some(notes),
        })
    }
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Service composing the SLA calculator, priority scorer, repository, and notification hooks.
pub struct ReviewQueueService<R, N, S> {
    repository: Arc<R>,
    notifier: Arc<N>,
    subjects: Arc<S>,
    clock: Arc<dyn Clock>,
    calculator: SlaCalculator,
    scorer: PriorityScorer,
    settings: QueueSettings,
}

impl<R, N, S> ReviewQueueService<R, N, S>
where
    R: ReviewRepository + 'static,
    N: Notifier + 'static,
    S: SubjectDirectory + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        subjects: Arc<S>,
        settings: QueueSettings,
    ) -> Self {
        Self::with_clock(repository, notifier, subjects, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        repository: Arc<R>,
        notifier: Arc<N>,
        subjects: Arc<S>,
        settings: QueueSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            notifier,
            subjects,
            clock,
            calculator: settings.calculator(),
            scorer: PriorityScorer,
            settings,
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Queue a new pending review with its deadline fixed from the submission time.
    pub fn submit(&self, request: NewReviewItem) -> Result<ReviewItem, ReviewError> {
        let now = self.clock.now();
        let submitted_at = request.submitted_at.unwrap_or(now);
        let sla_deadline = self.calculator.deadline(&request.category, submitted_at);

        let mut item = ReviewItem {
            id: self.repository.next_id()?,
            subject: request.subject,
            user_id: request.user_id,
            category: request.category,
            status: ReviewStatus::Pending,
            submitted_at,
            sla_deadline,
            sla_status: SlaStatus::OnTrack,
            priority_score: 0,
            assignee: None,
            reviewer_id: None,
            reviewed_at: None,
            notes: None,
            warning_notified_at: None,
            breach_notified_at: None,
        };
        self.calculator.refresh(&mut item, &self.scorer, now);

        let stored = self.repository.insert(item)?;
        info!(
            review_id = %stored.id,
            category = %stored.category,
            subject = %stored.subject,
            deadline = %stored.sla_deadline,
            "review item queued"
        );
        Ok(stored)
    }

    pub fn get(&self, id: &ReviewItemId) -> Result<ReviewItem, ReviewError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| ReviewError::NotFound(id.clone()))
    }

    pub fn time_remaining(&self, item: &ReviewItem) -> TimeRemaining {
        TimeRemaining::until(item.sla_deadline, self.clock.now())
    }

    pub fn queue(&self, filter: &QueueFilter) -> Result<Vec<ReviewItem>, ReviewError> {
        Ok(self.repository.list(filter)?)
    }

    pub fn actionable(&self) -> Result<Vec<ReviewItem>, ReviewError> {
        self.queue(&QueueFilter::actionable())
    }

    pub fn at_risk(&self) -> Result<Vec<ReviewItem>, ReviewError> {
        self.queue(&QueueFilter::at_risk())
    }

    pub fn breached(&self) -> Result<Vec<ReviewItem>, ReviewError> {
        self.queue(&QueueFilter::breached())
    }

    pub fn needing_warning(&self) -> Result<Vec<ReviewItem>, ReviewError> {
        self.queue(&QueueFilter::needing_warning())
    }

    pub fn needing_breach_notice(&self) -> Result<Vec<ReviewItem>, ReviewError> {
        self.queue(&QueueFilter::needing_breach_notice())
    }

    /// Move an item into review and record who picked it up.
    pub fn mark_in_review(
        &self,
        id: &ReviewItemId,
        reviewer: ReviewerId,
    ) -> Result<ReviewItem, ReviewError> {
        let now = self.clock.now();
        self.repository
            .transaction(|tx| -> Result<ReviewItem, ReviewError> {
                let mut item = self.actionable_row(tx.fetch_for_update(id)?, id)?;
                item.status = ReviewStatus::InReview;
                item.assignee = Some(reviewer);
                self.calculator.refresh(&mut item, &self.scorer, now);
                tx.update(item.clone())?;
                Ok(item)
            })
    }

    pub fn assign(
        &self,
        id: &ReviewItemId,
        reviewer: ReviewerId,
    ) -> Result<ReviewItem, ReviewError> {
        self.repository
            .transaction(|tx| -> Result<ReviewItem, ReviewError> {
                let mut item = self.actionable_row(tx.fetch_for_update(id)?, id)?;
                item.assignee = Some(reviewer);
                tx.update(item.clone())?;
                Ok(item)
            })
    }

    pub fn approve(
        &self,
        id: &ReviewItemId,
        reviewer: ReviewerId,
        notes: Option<String>,
    ) -> Result<ReviewItem, ReviewError> {
        self.resolve_one(id, Resolution::approve(reviewer, notes))
    }

    pub fn reject(
        &self,
        id: &ReviewItemId,
        reviewer: ReviewerId,
        reason: &str,
    ) -> Result<ReviewItem, ReviewError> {
        let resolution = Resolution::reject(reviewer, reason)?;
        self.resolve_one(id, resolution)
    }

    pub fn bulk_approve(
        &self,
        ids: &[ReviewItemId],
        reviewer: ReviewerId,
        notes: Option<String>,
    ) -> BulkResolution {
        self.resolve_batch(ids, Ok(Resolution::approve(reviewer, notes)))
    }

    pub fn bulk_reject(
        &self,
        ids: &[ReviewItemId],
        reviewer: ReviewerId,
        reason: &str,
    ) -> BulkResolution {
        self.resolve_batch(ids, Resolution::reject(reviewer, reason))
    }

    /// Recompute SLA state for every actionable item. Terminal items are never touched.
    pub fn refresh_sla(&self) -> Result<SweepSummary, ReviewError> {
        let now = self.clock.now();
        let summary = self
            .repository
            .transaction(|tx| -> Result<SweepSummary, ReviewError> {
                let mut summary = SweepSummary::default();
                for mut item in tx.actionable()? {
                    let before = (item.sla_status, item.priority_score);
                    if !self.calculator.refresh(&mut item, &self.scorer, now) {
                        continue;
                    }
                    summary.tally(item.sla_status);
                    if before != (item.sla_status, item.priority_score) {
                        summary.changed += 1;
                        tx.update(item)?;
                    }
                }
                Ok(summary)
            })?;

        debug!(
            refreshed = summary.refreshed,
            changed = summary.changed,
            at_risk = summary.at_risk,
            breached = summary.breached,
            "sla sweep complete"
        );
        Ok(summary)
    }

    /// Set a milestone flag once. Returns `false` when it was already set.
    ///
    /// The item must still be actionable and its live SLA state must have reached the
    /// milestone: at risk (or later) for a warning, breached for a breach notice.
    pub fn record_milestone(
        &self,
        id: &ReviewItemId,
        milestone: Milestone,
    ) -> Result<bool, ReviewError> {
        let now = self.clock.now();
        self.repository
            .transaction(|tx| -> Result<bool, ReviewError> {
                let row = tx.fetch_for_update(id)?;
                let mut item = self.actionable_row(row, id)?;
                let sla_status = self.calculator.evaluate_item(&item, now).status;
                if !milestone.reached_by(sla_status) {
                    return Err(ReviewError::MilestoneNotReached {
                        id: item.id,
                        milestone,
                        sla_status,
                    });
                }
                let slot = match milestone {
                    Milestone::Warning => &mut item.warning_notified_at,
                    Milestone::Breach => &mut item.breach_notified_at,
                };
                if slot.is_some() {
                    return Ok(false);
                }
                *slot = Some(now);
                tx.update(item)?;
                Ok(true)
            })
    }

    pub fn statistics(&self) -> Result<SlaStatistics, ReviewError> {
        let items = self.repository.list(&QueueFilter::default())?;
        Ok(self.aggregator().summarize(&items, self.clock.now()))
    }

    pub fn processing_times(&self) -> Result<Vec<ProcessingTimeEntry>, ReviewError> {
        let items = self.repository.list(&QueueFilter::default())?;
        Ok(self.aggregator().processing_times(&items, self.clock.now()))
    }

    fn aggregator(&self) -> StatisticsAggregator<'_> {
        StatisticsAggregator::new(&self.calculator, self.settings.history_window_days)
    }

    fn actionable_row(
        &self,
        row: Option<ReviewItem>,
        id: &ReviewItemId,
    ) -> Result<ReviewItem, ReviewError> {
        let item = row.ok_or_else(|| ReviewError::NotFound(id.clone()))?;
        if !item.is_actionable() {
            return Err(ReviewError::InvalidState {
                id: item.id,
                status: item.status,
            });
        }
        Ok(item)
    }

    /// Apply the terminal transition. SLA fields are refreshed one last time, then frozen.
    fn apply_resolution(
        &self,
        row: Option<ReviewItem>,
        id: &ReviewItemId,
        resolution: &Resolution,
        now: DateTime<Utc>,
    ) -> Result<ReviewItem, ReviewError> {
        let mut item = self.actionable_row(row, id)?;
        self.calculator.refresh(&mut item, &self.scorer, now);
        item.status = resolution.outcome.status();
        item.reviewer_id = Some(resolution.reviewer.clone());
        item.reviewed_at = Some(now);
        item.notes = resolution.notes.clone();
        Ok(item)
    }

    fn resolve_one(
        &self,
        id: &ReviewItemId,
        resolution: Resolution,
    ) -> Result<ReviewItem, ReviewError> {
        let now = self.clock.now();
        let resolved = self
            .repository
            .transaction(|tx| -> Result<ReviewItem, ReviewError> {
                let row = tx.fetch_for_update(id)?;
                let resolved = self.apply_resolution(row, id, &resolution, now)?;
                tx.update(resolved.clone())?;
                Ok(resolved)
            })?;

        info!(
            review_id = %resolved.id,
            outcome = resolution.outcome.label(),
            reviewer = %resolution.reviewer.0,
            sla_status = resolved.sla_status.label(),
            "review item resolved"
        );
        self.after_commit(resolution.outcome, std::slice::from_ref(&resolved));
        Ok(resolved)
    }

    fn resolve_batch(
        &self,
        ids: &[ReviewItemId],
        resolution: Result<Resolution, ReviewError>,
    ) -> BulkResolution {
        let limit = self.settings.bulk_limit.clamp(1, MAX_BULK_LIMIT);
        let (batch, overflow) = ids.split_at(ids.len().min(limit));
        let mut result = BulkResolution::new(ids.len(), batch.len());

        if !overflow.is_empty() {
            warn!(
                limit,
                requested = ids.len(),
                skipped = overflow.len(),
                "bulk resolution truncated to batch limit"
            );
            result.record_overflow(limit, overflow);
        }

        let resolution = match resolution {
            Ok(resolution) => resolution,
            Err(err) => {
                for id in batch {
                    result.record_failure(id.clone(), err.item_reason());
                }
                return result;
            }
        };

        let now = self.clock.now();
        let committed = self
            .repository
            .transaction(|tx| -> Result<Vec<Result<ReviewItem, ReviewError>>, RepositoryError> {
                let mut outcomes = Vec::with_capacity(batch.len());
                for id in batch {
                    let row = tx.fetch_for_update(id)?;
                    let outcome = self.apply_resolution(row, id, &resolution, now);
                    if let Ok(resolved) = &outcome {
                        tx.update(resolved.clone())?;
                    }
                    outcomes.push(outcome);
                }
                Ok(outcomes)
            });

        match committed {
            Ok(outcomes) => {
                let mut resolved = Vec::with_capacity(outcomes.len());
                for (id, outcome) in batch.iter().zip(outcomes) {
                    match outcome {
                        Ok(item) => {
                            result.record_success(item.id.clone());
                            resolved.push(item);
                        }
                        Err(err) => result.record_failure(id.clone(), err.item_reason()),
                    }
                }

                info!(
                    outcome = resolution.outcome.label(),
                    reviewer = %resolution.reviewer.0,
                    succeeded = result.succeeded,
                    failed = result.failed,
                    "bulk resolution committed"
                );
                self.after_commit(resolution.outcome, &resolved);
            }
            Err(err) => {
                error!(
                    outcome = resolution.outcome.label(),
                    batch = batch.len(),
                    error = %err,
                    "bulk resolution rolled back"
                );
                result.rolled_back = true;
                for id in batch {
                    result.record_failure(id.clone(), format!("rolled back ({err})"));
                }
            }
        }

        result
    }

    /// Post-commit side effects. Failures here never undo the committed transition.
    fn after_commit(&self, outcome: ResolutionOutcome, items: &[ReviewItem]) {
        if outcome == ResolutionOutcome::Approved {
            for item in items {
                if let Err(err) = self.subjects.mark_verified(&item.subject) {
                    warn!(
                        review_id = %item.id,
                        subject = %item.subject,
                        error = %err,
                        "failed to mark subject verified"
                    );
                }
            }
        }

        self.dispatch(outcome, items);
    }

    fn dispatch(&self, outcome: ResolutionOutcome, items: &[ReviewItem]) {
        let mut batches: BTreeMap<UserId, Vec<NotifiedItem>> = BTreeMap::new();
        for item in items {
            match resolve_recipient(item, self.subjects.as_ref()) {
                Some(user_id) => batches
                    .entry(user_id)
                    .or_default()
                    .push(NotifiedItem::from_item(item)),
                None => debug!(review_id = %item.id, "no recipient for review outcome"),
            }
        }

        for (user_id, items) in batches {
            let count = items.len();
            let notification = ResolutionNotification {
                user_id: user_id.clone(),
                outcome,
                items,
            };
            if let Err(err) = self.notifier.notify(notification) {
                warn!(
                    user_id = %user_id.0,
                    outcome = outcome.label(),
                    items = count,
                    error = %err,
                    "resolution notification failed"
                );
            }
        }
    }
}
