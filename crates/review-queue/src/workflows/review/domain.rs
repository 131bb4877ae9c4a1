use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for review items.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReviewItemId(pub String);

impl fmt::Display for ReviewItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operator performing reviews.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReviewerId(pub String);

/// Marketplace user that owns the reviewed subject and receives outcome notifications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Compliance review category. Drives the SLA window.
///
/// Labels that are not recognised are kept verbatim in `Other` and fall back to the
/// default window.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReviewCategory {
    Identity,
    BackgroundCheck,
    Certification,
    BusinessLicense,
    Agency,
    Other(String),
}

impl ReviewCategory {
    pub const fn known() -> [ReviewCategory; 5] {
        [
            ReviewCategory::Identity,
            ReviewCategory::BackgroundCheck,
            ReviewCategory::Certification,
            ReviewCategory::BusinessLicense,
            ReviewCategory::Agency,
        ]
    }

    pub fn label(&self) -> &str {
        match self {
            ReviewCategory::Identity => "identity",
            ReviewCategory::BackgroundCheck => "background_check",
            ReviewCategory::Certification => "certification",
            ReviewCategory::BusinessLicense => "business_license",
            ReviewCategory::Agency => "agency",
            ReviewCategory::Other(label) => label,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "identity" => ReviewCategory::Identity,
            "background_check" => ReviewCategory::BackgroundCheck,
            "certification" => ReviewCategory::Certification,
            "business_license" => ReviewCategory::BusinessLicense,
            "agency" => ReviewCategory::Agency,
            other => ReviewCategory::Other(other.to_string()),
        }
    }
}

impl From<String> for ReviewCategory {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ReviewCategory> for String {
    fn from(value: ReviewCategory) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for ReviewCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Workflow status of a review item. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::InReview => "in_review",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub const fn is_actionable(self) -> bool {
        matches!(self, ReviewStatus::Pending | ReviewStatus::InReview)
    }

    pub const fn is_terminal(self) -> bool {
        !self.is_actionable()
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Derived SLA state of an actionable review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    OnTrack,
    AtRisk,
    Breached,
}

impl SlaStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SlaStatus::OnTrack => "on_track",
            SlaStatus::AtRisk => "at_risk",
            SlaStatus::Breached => "breached",
        }
    }
}

/// Weak reference to the record under verification. Never owned by the queue.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum SubjectRef {
    WorkerIdentity(String),
    BackgroundCheck(String),
    Certification(String),
    BusinessLicense(String),
    AgencyApplication(String),
}

impl SubjectRef {
    pub const fn kind(&self) -> &'static str {
        match self {
            SubjectRef::WorkerIdentity(_) => "worker_identity",
            SubjectRef::BackgroundCheck(_) => "background_check",
            SubjectRef::Certification(_) => "certification",
            SubjectRef::BusinessLicense(_) => "business_license",
            SubjectRef::AgencyApplication(_) => "agency_application",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SubjectRef::WorkerIdentity(id)
            | SubjectRef::BackgroundCheck(id)
            | SubjectRef::Certification(id)
            | SubjectRef::BusinessLicense(id)
            | SubjectRef::AgencyApplication(id) => id,
        }
    }

    pub fn from_parts(kind: &str, id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let subject = match kind.trim().to_ascii_lowercase().as_str() {
            "worker_identity" | "identity" => SubjectRef::WorkerIdentity(id),
            "background_check" => SubjectRef::BackgroundCheck(id),
            "certification" => SubjectRef::Certification(id),
            "business_license" => SubjectRef::BusinessLicense(id),
            "agency_application" | "agency" => SubjectRef::AgencyApplication(id),
            _ => return None,
        };
        Some(subject)
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Terminal outcome applied by the resolution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Approved,
    Rejected,
}

impl ResolutionOutcome {
    pub const fn status(self) -> ReviewStatus {
        match self {
            ResolutionOutcome::Approved => ReviewStatus::Approved,
            ResolutionOutcome::Rejected => ReviewStatus::Rejected,
        }
    }

    pub const fn label(self) -> &'static str {
        self.status().label()
    }
}

/// One-time SLA alerts tracked per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Warning,
    Breach,
}

impl Milestone {
    pub const fn label(self) -> &'static str {
        match self {
            Milestone::Warning => "warning",
            Milestone::Breach => "breach",
        }
    }

    /// Whether an item in `status` is due this alert.
    pub const fn reached_by(self, status: SlaStatus) -> bool {
        match self {
            Milestone::Warning => matches!(status, SlaStatus::AtRisk | SlaStatus::Breached),
            Milestone::Breach => matches!(status, SlaStatus::Breached),
        }
    }
}

/// Inbound request from a verification collaborator to queue a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReviewItem {
    pub subject: SubjectRef,
    pub category: ReviewCategory,
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Defaults to the current instant when omitted.
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// A pending or resolved compliance review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: ReviewItemId,
    pub subject: SubjectRef,
    pub user_id: Option<UserId>,
    pub category: ReviewCategory,
    pub status: ReviewStatus,
    pub submitted_at: DateTime<Utc>,
    pub sla_deadline: DateTime<Utc>,
    pub sla_status: SlaStatus,
    pub priority_score: i32,
    pub assignee: Option<ReviewerId>,
    pub reviewer_id: Option<ReviewerId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub warning_notified_at: Option<DateTime<Utc>>,
    pub breach_notified_at: Option<DateTime<Utc>>,
}

impl ReviewItem {
    pub fn is_actionable(&self) -> bool {
        self.status.is_actionable()
    }

    /// `Some(true)` when the item was resolved on or before its deadline.
    pub fn resolved_within_sla(&self) -> Option<bool> {
        self.reviewed_at
            .filter(|_| self.status.is_terminal())
            .map(|reviewed_at| reviewed_at <= self.sla_deadline)
    }

    pub fn processing_time(&self) -> Option<Duration> {
        self.reviewed_at
            .map(|reviewed_at| reviewed_at - self.submitted_at)
    }

    pub fn milestone_notified_at(&self, milestone: Milestone) -> Option<DateTime<Utc>> {
        match milestone {
            Milestone::Warning => self.warning_notified_at,
            Milestone::Breach => self.breach_notified_at,
        }
    }
}
