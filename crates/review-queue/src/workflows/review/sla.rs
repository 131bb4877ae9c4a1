use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::domain::{ReviewCategory, ReviewItem, SlaStatus};
use super::priority::PriorityScorer;

pub const DEFAULT_TARGET_HOURS: u32 = 72;
pub const DEFAULT_AT_RISK_THRESHOLD: f64 = 0.80;

const SECONDS_PER_HOUR: i64 = 3_600;

/// Target resolution window per review category.
#[derive(Debug, Clone, PartialEq)]
pub struct SlaPolicy {
    targets: BTreeMap<ReviewCategory, u32>,
    default_hours: u32,
}

impl SlaPolicy {
    pub fn standard() -> Self {
        let targets = BTreeMap::from([
            (ReviewCategory::Identity, 48),
            (ReviewCategory::BackgroundCheck, 48),
            (ReviewCategory::Certification, 48),
            (ReviewCategory::BusinessLicense, 72),
            (ReviewCategory::Agency, 96),
        ]);

        Self {
            targets,
            default_hours: DEFAULT_TARGET_HOURS,
        }
    }

    pub fn with_target(mut self, category: ReviewCategory, hours: u32) -> Self {
        self.targets.insert(category, hours);
        self
    }

    pub fn with_default_hours(mut self, hours: u32) -> Self {
        self.default_hours = hours;
        self
    }

    pub fn target_hours(&self, category: &ReviewCategory) -> u32 {
        self.targets
            .get(category)
            .copied()
            .unwrap_or(self.default_hours)
    }

    pub fn default_hours(&self) -> u32 {
        self.default_hours
    }
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Point-in-time SLA reading for a single item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlaEvaluation {
    pub status: SlaStatus,
    pub elapsed_fraction: f64,
    pub seconds_remaining: i64,
}

impl SlaEvaluation {
    /// Whole hours left before the deadline, truncated toward zero.
    pub fn hours_remaining(&self) -> i64 {
        self.seconds_remaining / SECONDS_PER_HOUR
    }
}

/// Deadline arithmetic and status derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct SlaCalculator {
    policy: SlaPolicy,
    at_risk_threshold: f64,
}

impl SlaCalculator {
    pub fn new(policy: SlaPolicy, at_risk_threshold: f64) -> Self {
        let at_risk_threshold = if at_risk_threshold.is_finite()
            && at_risk_threshold > 0.0
            && at_risk_threshold <= 1.0
        {
            at_risk_threshold
        } else {
            DEFAULT_AT_RISK_THRESHOLD
        };

        Self {
            policy,
            at_risk_threshold,
        }
    }

    pub fn policy(&self) -> &SlaPolicy {
        &self.policy
    }

    pub fn at_risk_threshold(&self) -> f64 {
        self.at_risk_threshold
    }

    pub fn deadline(
        &self,
        category: &ReviewCategory,
        submitted_at: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let hours = self.policy.target_hours(category);
        submitted_at + Duration::seconds(i64::from(hours) * SECONDS_PER_HOUR)
    }

    /// Share of the window consumed, clamped at zero.
    ///
    /// A zero-length window counts as fully consumed.
    pub fn elapsed_fraction(
        &self,
        submitted_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> f64 {
        let window = (deadline - submitted_at).num_seconds();
        if window <= 0 {
            return 1.0;
        }

        let elapsed = (now - submitted_at).num_seconds().max(0);
        elapsed as f64 / window as f64
    }

    pub fn evaluate(
        &self,
        submitted_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SlaEvaluation {
        let elapsed_fraction = self.elapsed_fraction(submitted_at, deadline, now);
        let status = if now >= deadline {
            SlaStatus::Breached
        } else if elapsed_fraction >= self.at_risk_threshold {
            SlaStatus::AtRisk
        } else {
            SlaStatus::OnTrack
        };

        SlaEvaluation {
            status,
            elapsed_fraction,
            seconds_remaining: (deadline - now).num_seconds(),
        }
    }

    pub fn evaluate_item(&self, item: &ReviewItem, now: DateTime<Utc>) -> SlaEvaluation {
        self.evaluate(item.submitted_at, item.sla_deadline, now)
    }

    /// Recompute `sla_status` and `priority_score` in place.
    ///
    /// Terminal items are left untouched and `false` is returned.
    pub fn refresh(
        &self,
        item: &mut ReviewItem,
        scorer: &PriorityScorer,
        now: DateTime<Utc>,
    ) -> bool {
        if !item.is_actionable() {
            return false;
        }

        let evaluation = self.evaluate_item(item, now);
        item.sla_status = evaluation.status;
        item.priority_score = scorer.score(&evaluation);
        true
    }
}

impl Default for SlaCalculator {
    fn default() -> Self {
        Self::new(SlaPolicy::standard(), DEFAULT_AT_RISK_THRESHOLD)
    }
}

/// Display-oriented remaining time, truncated toward zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRemaining {
    pub overdue: bool,
    pub hours: i64,
    pub minutes: i64,
    pub label: String,
}

impl TimeRemaining {
    pub fn until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let seconds = (deadline - now).num_seconds();
        let overdue = seconds <= 0;
        let magnitude = seconds.abs();
        let hours = magnitude / SECONDS_PER_HOUR;
        let minutes = (magnitude % SECONDS_PER_HOUR) / 60;

        let label = if overdue {
            format!("overdue by {hours}h {minutes}m")
        } else {
            format!("{hours}h {minutes}m remaining")
        };

        Self {
            overdue,
            hours,
            minutes,
            label,
        }
    }
}
