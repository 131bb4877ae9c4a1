use serde::{Deserialize, Serialize};

use super::domain::{
    ResolutionOutcome, ReviewCategory, ReviewItem, ReviewItemId, ReviewStatus, ReviewerId,
    SlaStatus, SubjectRef, UserId,
};
use super::priority::{by_priority, by_submission};

/// Storage abstraction for review items.
///
/// `transaction` runs `work` against an isolated view of the store. Writes staged through
/// the transaction become visible only if `work` returns `Ok`; any `Err` discards them.
pub trait ReviewRepository: Send + Sync {
    /// Allocate an id no other row in the store uses, across every service sharing it.
    fn next_id(&self) -> Result<ReviewItemId, RepositoryError>;
    fn insert(&self, item: ReviewItem) -> Result<ReviewItem, RepositoryError>;
    fn fetch(&self, id: &ReviewItemId) -> Result<Option<ReviewItem>, RepositoryError>;
    fn list(&self, filter: &QueueFilter) -> Result<Vec<ReviewItem>, RepositoryError>;
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn ReviewTransaction) -> Result<T, E>,
        E: From<RepositoryError>;
}

/// Row-level operations available inside a transaction.
pub trait ReviewTransaction {
    /// Read the current row, including writes already staged in this transaction.
    fn fetch_for_update(&mut self, id: &ReviewItemId)
        -> Result<Option<ReviewItem>, RepositoryError>;
    fn actionable(&mut self) -> Result<Vec<ReviewItem>, RepositoryError>;
    fn update(&mut self, item: ReviewItem) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Predefined queue slices consumed by dashboards and the milestone sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueView {
    #[default]
    All,
    Actionable,
    AtRisk,
    Breached,
    NeedsWarning,
    NeedsBreachNotice,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOrder {
    #[default]
    Priority,
    Submitted,
}

/// Combinable read filter. Every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueFilter {
    #[serde(default)]
    pub view: QueueView,
    #[serde(default)]
    pub status: Option<ReviewStatus>,
    #[serde(default)]
    pub sla_status: Option<SlaStatus>,
    #[serde(default)]
    pub category: Option<ReviewCategory>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub order: QueueOrder,
}

impl QueueFilter {
    pub fn view(view: QueueView) -> Self {
        Self {
            view,
            ..Self::default()
        }
    }

    pub fn actionable() -> Self {
        Self::view(QueueView::Actionable)
    }

    pub fn at_risk() -> Self {
        Self::view(QueueView::AtRisk)
    }

    pub fn breached() -> Self {
        Self::view(QueueView::Breached)
    }

    pub fn needing_warning() -> Self {
        Self::view(QueueView::NeedsWarning)
    }

    pub fn needing_breach_notice() -> Self {
        Self::view(QueueView::NeedsBreachNotice)
    }

    pub fn with_status(mut self, status: ReviewStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_sla_status(mut self, sla_status: SlaStatus) -> Self {
        self.sla_status = Some(sla_status);
        self
    }

    pub fn with_category(mut self, category: ReviewCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_assignee(mut self, assignee: &ReviewerId) -> Self {
        self.assignee = Some(assignee.0.clone());
        self
    }

    pub fn ordered_by(mut self, order: QueueOrder) -> Self {
        self.order = order;
        self
    }

    pub fn matches(&self, item: &ReviewItem) -> bool {
        let in_view = match self.view {
            QueueView::All => true,
            QueueView::Actionable => item.is_actionable(),
            QueueView::AtRisk => item.is_actionable() && item.sla_status == SlaStatus::AtRisk,
            QueueView::Breached => item.is_actionable() && item.sla_status == SlaStatus::Breached,
            QueueView::NeedsWarning => {
                item.is_actionable()
                    && item.sla_status == SlaStatus::AtRisk
                    && item.warning_notified_at.is_none()
            }
            QueueView::NeedsBreachNotice => {
                item.is_actionable()
                    && item.sla_status == SlaStatus::Breached
                    && item.breach_notified_at.is_none()
            }
        };

        in_view
            && self.status.map_or(true, |status| item.status == status)
            && self
                .sla_status
                .map_or(true, |sla_status| item.sla_status == sla_status)
            && self
                .category
                .as_ref()
                .map_or(true, |category| &item.category == category)
            && self.assignee.as_deref().map_or(true, |assignee| {
                item.assignee
                    .as_ref()
                    .is_some_and(|current| current.0 == assignee)
            })
    }

    /// Filter and order an arbitrary set of items.
    pub fn apply<I>(&self, items: I) -> Vec<ReviewItem>
    where
        I: IntoIterator<Item = ReviewItem>,
    {
        let mut selected: Vec<ReviewItem> =
            items.into_iter().filter(|item| self.matches(item)).collect();
        match self.order {
            QueueOrder::Priority => selected.sort_by(by_priority),
            QueueOrder::Submitted => selected.sort_by(by_submission),
        }
        selected
    }
}

/// Outbound notification hook. Delivery is assumed asynchronous and at-least-once.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: ResolutionNotification) -> Result<(), NotificationError>;
}

/// Terminal-outcome notice batched per recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionNotification {
    pub user_id: UserId,
    pub outcome: ResolutionOutcome,
    pub items: Vec<NotifiedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifiedItem {
    pub review_id: ReviewItemId,
    pub subject: SubjectRef,
    pub category: ReviewCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NotifiedItem {
    pub fn from_item(item: &ReviewItem) -> Self {
        Self {
            review_id: item.id.clone(),
            subject: item.subject.clone(),
            category: item.category.clone(),
            notes: item.notes.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Delivery(String),
}

/// Access to the verified records (worker, business, agency) behind review items.
pub trait SubjectDirectory: Send + Sync {
    /// Flag the subject as verified after an approval.
    fn mark_verified(&self, subject: &SubjectRef) -> Result<(), SubjectSyncError>;

    /// Owning user reachable through the subject's user relation.
    fn related_user(&self, subject: &SubjectRef) -> Option<UserId>;

    /// Owning user recorded as a bare id on the subject.
    fn user_id_field(&self, _subject: &SubjectRef) -> Option<UserId> {
        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubjectSyncError {
    #[error("subject {0} not found")]
    Missing(SubjectRef),
    #[error("subject store unavailable: {0}")]
    Unavailable(String),
}

/// Recipient for outcome notifications: direct reference, then the subject relation,
/// then the subject's user id field.
pub fn resolve_recipient<S>(item: &ReviewItem, subjects: &S) -> Option<UserId>
where
    S: SubjectDirectory + ?Sized,
{
    item.user_id
        .clone()
        .or_else(|| subjects.related_user(&item.subject))
        .or_else(|| subjects.user_id_field(&item.subject))
}
