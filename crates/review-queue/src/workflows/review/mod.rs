//! Verification review queue: SLA tracking, priority ranking, and single/bulk resolution.
//!
//! Review items are created by the verification collaborators (identity, background
//! checks, certifications, business licenses, agency applications) and stay in the
//! actionable queue until an operator approves or rejects them. Terminal items keep the
//! SLA status they had at resolution time.

pub mod bulk;
pub mod config;
pub mod domain;
pub mod intake;
pub mod memory;
pub mod priority;
pub mod repository;
pub mod router;
pub mod service;
pub mod sla;
pub mod statistics;

#[cfg(test)]
mod tests;

pub use bulk::{BulkRejectRequest, BulkResolution, BulkResolutionRequest};
pub use config::QueueSettings;
pub use domain::{
    Milestone, NewReviewItem, ResolutionOutcome, ReviewCategory, ReviewItem, ReviewItemId,
    ReviewStatus, ReviewerId, SlaStatus, SubjectRef, UserId,
};
pub use intake::{ImportError, ReviewIntakeImporter};
pub use memory::InMemoryReviewStore;
pub use priority::{PriorityScorer, BREACHED_PRIORITY};
pub use repository::{
    NotificationError, NotifiedItem, Notifier, QueueFilter, QueueOrder, QueueView,
    RepositoryError, ResolutionNotification, ReviewRepository, ReviewTransaction,
    SubjectDirectory, SubjectSyncError,
};
pub use router::{review_router, ReviewItemView};
pub use service::{ReviewError, ReviewQueueService, SweepSummary};
pub use sla::{SlaCalculator, SlaEvaluation, SlaPolicy, TimeRemaining};
pub use statistics::{CategoryBreakdown, ProcessingTimeEntry, SlaCounts, SlaStatistics};
