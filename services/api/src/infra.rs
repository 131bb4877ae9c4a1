use chrono::{DateTime, NaiveDateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use review_queue::workflows::review::{
    InMemoryReviewStore, NotificationError, Notifier, ResolutionNotification, ReviewQueueService,
    SubjectDirectory, SubjectRef, SubjectSyncError, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

pub(crate) type QueueService =
    ReviewQueueService<InMemoryReviewStore, InMemoryNotifier, InMemorySubjectDirectory>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Logs each outcome notice and keeps it for later inspection by the CLI.
#[derive(Default, Clone)]
pub(crate) struct InMemoryNotifier {
    events: Arc<Mutex<Vec<ResolutionNotification>>>,
}

impl Notifier for InMemoryNotifier {
    fn notify(&self, notification: ResolutionNotification) -> Result<(), NotificationError> {
        info!(
            user_id = %notification.user_id.0,
            outcome = notification.outcome.label(),
            items = notification.items.len(),
            "review outcome notification queued"
        );
        lock(&self.events).push(notification);
        Ok(())
    }
}

impl InMemoryNotifier {
    pub(crate) fn events(&self) -> Vec<ResolutionNotification> {
        lock(&self.events).clone()
    }
}

/// Stand-in for the worker, business, and agency records behind review items.
#[derive(Default, Clone)]
pub(crate) struct InMemorySubjectDirectory {
    owners: Arc<Mutex<HashMap<SubjectRef, UserId>>>,
    verified: Arc<Mutex<HashSet<SubjectRef>>>,
}

impl InMemorySubjectDirectory {
    pub(crate) fn register(&self, subject: SubjectRef, owner: UserId) {
        lock(&self.owners).insert(subject, owner);
    }

    pub(crate) fn is_verified(&self, subject: &SubjectRef) -> bool {
        lock(&self.verified).contains(subject)
    }
}

impl SubjectDirectory for InMemorySubjectDirectory {
    fn mark_verified(&self, subject: &SubjectRef) -> Result<(), SubjectSyncError> {
        lock(&self.verified).insert(subject.clone());
        Ok(())
    }

    fn related_user(&self, subject: &SubjectRef) -> Option<UserId> {
        lock(&self.owners).get(subject).cloned()
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|err| {
            format!("failed to parse '{raw}' as RFC 3339 or YYYY-MM-DD HH:MM:SS ({err})")
        })
}
