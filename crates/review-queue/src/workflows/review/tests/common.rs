use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::clock::ManualClock;
use crate::workflows::review::config::QueueSettings;
use crate::workflows::review::domain::{
    NewReviewItem, ReviewCategory, ReviewItem, ReviewItemId, ReviewStatus, SlaStatus, SubjectRef,
    UserId,
};
use crate::workflows::review::memory::InMemoryReviewStore;
use crate::workflows::review::repository::{
    NotificationError, Notifier, QueueFilter, RepositoryError, ResolutionNotification,
    ReviewRepository, ReviewTransaction, SubjectDirectory, SubjectSyncError,
};
use crate::workflows::review::service::ReviewQueueService;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()
}

pub(crate) fn hours(value: i64) -> Duration {
    Duration::hours(value)
}

pub(crate) fn id(value: &str) -> ReviewItemId {
    ReviewItemId(value.to_string())
}

/// Pending identity review submitted at `t0()`, evaluated at submission time.
pub(crate) fn pending_item(review_id: &str) -> ReviewItem {
    ReviewItem {
        id: id(review_id),
        subject: SubjectRef::WorkerIdentity(format!("worker-{review_id}")),
        user_id: Some(UserId("user-1".to_string())),
        category: ReviewCategory::Identity,
        status: ReviewStatus::Pending,
        submitted_at: t0(),
        sla_deadline: t0() + hours(48),
        sla_status: SlaStatus::OnTrack,
        priority_score: 52,
        assignee: None,
        reviewer_id: None,
        reviewed_at: None,
        notes: None,
        warning_notified_at: None,
        breach_notified_at: None,
    }
}

pub(crate) fn request(
    category: ReviewCategory,
    subject: SubjectRef,
    user: Option<&str>,
) -> NewReviewItem {
    NewReviewItem {
        subject,
        category,
        user_id: user.map(|value| UserId(value.to_string())),
        submitted_at: None,
    }
}

pub(crate) fn identity_request(worker: &str, user: &str) -> NewReviewItem {
    request(
        ReviewCategory::Identity,
        SubjectRef::WorkerIdentity(worker.to_string()),
        Some(user),
    )
}

pub(crate) struct Harness<R = InMemoryReviewStore> {
    pub(crate) service: ReviewQueueService<R, MemoryNotifier, MemorySubjects>,
    pub(crate) store: Arc<R>,
    pub(crate) notifier: Arc<MemoryNotifier>,
    pub(crate) subjects: Arc<MemorySubjects>,
    pub(crate) clock: ManualClock,
}

pub(crate) fn harness() -> Harness {
    harness_with(Arc::new(InMemoryReviewStore::default()))
}

pub(crate) fn harness_with<R>(store: Arc<R>) -> Harness<R>
where
    R: ReviewRepository + 'static,
{
    let notifier = Arc::new(MemoryNotifier::default());
    let subjects = Arc::new(MemorySubjects::default());
    let clock = ManualClock::new(t0());
    let service = ReviewQueueService::with_clock(
        store.clone(),
        notifier.clone(),
        subjects.clone(),
        QueueSettings::default(),
        Arc::new(clock.clone()),
    );

    Harness {
        service,
        store,
        notifier,
        subjects,
        clock,
    }
}

impl<R> Harness<R>
where
    R: ReviewRepository + 'static,
{
    /// Submit `count` identity reviews at the current clock instant for `user`.
    pub(crate) fn seed(&self, count: usize, user: &str) -> Vec<ReviewItemId> {
        (0..count)
            .map(|index| {
                self.service
                    .submit(identity_request(&format!("w-{user}-{index}"), user))
                    .expect("submit succeeds")
                    .id
            })
            .collect()
    }

    pub(crate) fn stored(&self, review_id: &ReviewItemId) -> ReviewItem {
        self.store
            .fetch(review_id)
            .expect("fetch succeeds")
            .expect("record present")
    }
}

#[derive(Default, Clone)]
pub(crate) struct MemoryNotifier {
    events: Arc<Mutex<Vec<ResolutionNotification>>>,
}

impl MemoryNotifier {
    pub(crate) fn events(&self) -> Vec<ResolutionNotification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: ResolutionNotification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(crate) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notification: ResolutionNotification) -> Result<(), NotificationError> {
        Err(NotificationError::Delivery("smtp relay down".to_string()))
    }
}

#[derive(Default)]
pub(crate) struct MemorySubjects {
    verified: Mutex<Vec<SubjectRef>>,
    related: Mutex<HashMap<SubjectRef, UserId>>,
    fields: Mutex<HashMap<SubjectRef, UserId>>,
    unavailable: Mutex<bool>,
}

impl MemorySubjects {
    pub(crate) fn verified(&self) -> Vec<SubjectRef> {
        self.verified.lock().expect("subjects mutex poisoned").clone()
    }

    pub(crate) fn relate(&self, subject: SubjectRef, user: &str) {
        self.related
            .lock()
            .expect("subjects mutex poisoned")
            .insert(subject, UserId(user.to_string()));
    }

    pub(crate) fn set_user_field(&self, subject: SubjectRef, user: &str) {
        self.fields
            .lock()
            .expect("subjects mutex poisoned")
            .insert(subject, UserId(user.to_string()));
    }

    pub(crate) fn go_offline(&self) {
        *self.unavailable.lock().expect("subjects mutex poisoned") = true;
    }
}

impl SubjectDirectory for MemorySubjects {
    fn mark_verified(&self, subject: &SubjectRef) -> Result<(), SubjectSyncError> {
        if *self.unavailable.lock().expect("subjects mutex poisoned") {
            return Err(SubjectSyncError::Unavailable("worker service offline".to_string()));
        }
        self.verified
            .lock()
            .expect("subjects mutex poisoned")
            .push(subject.clone());
        Ok(())
    }

    fn related_user(&self, subject: &SubjectRef) -> Option<UserId> {
        self.related
            .lock()
            .expect("subjects mutex poisoned")
            .get(subject)
            .cloned()
    }

    fn user_id_field(&self, subject: &SubjectRef) -> Option<UserId> {
        self.fields
            .lock()
            .expect("subjects mutex poisoned")
            .get(subject)
            .cloned()
    }
}

/// Wraps the in-memory store and fails the N-th row update inside any transaction.
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: InMemoryReviewStore,
    fail_on_update: usize,
    updates: AtomicUsize,
}

impl FlakyStore {
    pub(crate) fn failing_on_update(nth: usize) -> Self {
        Self {
            inner: InMemoryReviewStore::default(),
            fail_on_update: nth,
            updates: AtomicUsize::new(0),
        }
    }
}

impl ReviewRepository for FlakyStore {
    fn next_id(&self) -> Result<ReviewItemId, RepositoryError> {
        self.inner.next_id()
    }

    fn insert(&self, item: ReviewItem) -> Result<ReviewItem, RepositoryError> {
        self.inner.insert(item)
    }

    fn fetch(&self, id: &ReviewItemId) -> Result<Option<ReviewItem>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn list(&self, filter: &QueueFilter) -> Result<Vec<ReviewItem>, RepositoryError> {
        self.inner.list(filter)
    }

    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn ReviewTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        self.inner.transaction(|tx| {
            let mut flaky = FlakyTransaction { inner: tx, store: self };
            work(&mut flaky)
        })
    }
}

struct FlakyTransaction<'a> {
    inner: &'a mut dyn ReviewTransaction,
    store: &'a FlakyStore,
}

impl ReviewTransaction for FlakyTransaction<'_> {
    fn fetch_for_update(
        &mut self,
        id: &ReviewItemId,
    ) -> Result<Option<ReviewItem>, RepositoryError> {
        self.inner.fetch_for_update(id)
    }

    fn actionable(&mut self) -> Result<Vec<ReviewItem>, RepositoryError> {
        self.inner.actionable()
    }

    fn update(&mut self, item: ReviewItem) -> Result<(), RepositoryError> {
        let attempt = self.store.updates.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == self.store.fail_on_update {
            return Err(RepositoryError::Unavailable(
                "injected storage failure".to_string(),
            ));
        }
        self.inner.update(item)
    }
}

pub(crate) struct UnavailableStore;

impl ReviewRepository for UnavailableStore {
    fn next_id(&self) -> Result<ReviewItemId, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert(&self, _item: ReviewItem) -> Result<ReviewItem, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ReviewItemId) -> Result<Option<ReviewItem>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _filter: &QueueFilter) -> Result<Vec<ReviewItem>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn transaction<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn ReviewTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
