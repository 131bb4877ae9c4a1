use std::cmp::Ordering;

use super::domain::{ReviewItem, SlaStatus};
use super::sla::SlaEvaluation;

/// Flat score for breached items. Every breach needs immediate action regardless of age.
pub const BREACHED_PRIORITY: i32 = 1_000;

/// Upper bound of the non-breached band.
pub const NON_BREACHED_CEILING: i32 = 100;

/// Maps an SLA reading to a sortable urgency score.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PriorityScorer;

impl PriorityScorer {
    pub fn score(&self, evaluation: &SlaEvaluation) -> i32 {
        if evaluation.status == SlaStatus::Breached {
            return BREACHED_PRIORITY;
        }

        let hours = evaluation
            .hours_remaining()
            .clamp(0, i64::from(NON_BREACHED_CEILING));
        (i64::from(NON_BREACHED_CEILING) - hours) as i32
    }
}

/// Queue ordering: highest score first, earlier deadline breaks ties, then id for determinism.
pub fn by_priority(left: &ReviewItem, right: &ReviewItem) -> Ordering {
    right
        .priority_score
        .cmp(&left.priority_score)
        .then_with(|| left.sla_deadline.cmp(&right.sla_deadline))
        .then_with(|| left.id.cmp(&right.id))
}

/// Oldest submissions first.
pub fn by_submission(left: &ReviewItem, right: &ReviewItem) -> Ordering {
    left.submitted_at
        .cmp(&right.submitted_at)
        .then_with(|| left.id.cmp(&right.id))
}
