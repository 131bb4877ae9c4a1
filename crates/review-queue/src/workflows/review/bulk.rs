use serde::{Deserialize, Serialize};

use super::domain::{ReviewItemId, ReviewerId};

/// Request body for the bulk approve endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResolutionRequest {
    pub ids: Vec<ReviewItemId>,
    pub reviewer_id: ReviewerId,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for the bulk reject endpoint. `notes` is accepted as an alias of `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRejectRequest {
    pub ids: Vec<ReviewItemId>,
    pub reviewer_id: ReviewerId,
    #[serde(default, alias = "notes")]
    pub reason: String,
}

/// Itemized outcome of a bulk approve/reject call.
///
/// `errors` holds one line per failed id in the form `"<id>: <reason>"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResolution {
    pub requested: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub succeeded_ids: Vec<ReviewItemId>,
    pub failed_ids: Vec<ReviewItemId>,
    pub skipped_ids: Vec<ReviewItemId>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub rolled_back: bool,
}

impl BulkResolution {
    pub(crate) fn new(requested: usize, processed: usize) -> Self {
        Self {
            requested,
            processed,
            ..Self::default()
        }
    }

    pub(crate) fn record_success(&mut self, id: ReviewItemId) {
        self.succeeded += 1;
        self.succeeded_ids.push(id);
    }

    pub(crate) fn record_failure(&mut self, id: ReviewItemId, reason: impl std::fmt::Display) {
        self.failed += 1;
        self.errors.push(format!("{id}: {reason}"));
        self.failed_ids.push(id);
    }

    pub(crate) fn record_overflow(&mut self, limit: usize, skipped: &[ReviewItemId]) {
        self.warnings.push(format!(
            "batch limited to {limit} items; {} item(s) were not processed",
            skipped.len()
        ));
        self.skipped_ids.extend(skipped.iter().cloned());
    }

    /// Dashboard summary line.
    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.succeeded, self.failed)
    }
}
