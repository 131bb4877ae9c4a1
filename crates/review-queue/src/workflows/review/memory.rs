use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{ReviewItem, ReviewItemId};
use super::repository::{QueueFilter, RepositoryError, ReviewRepository, ReviewTransaction};

/// Process-local store. All access is serialized through one mutex, so a transaction
/// holds exclusive access to every row until it commits or rolls back.
#[derive(Default, Clone)]
pub struct InMemoryReviewStore {
    records: Arc<Mutex<HashMap<ReviewItemId, ReviewItem>>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryReviewStore {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ReviewItemId, ReviewItem>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("review store lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|guard| guard.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReviewRepository for InMemoryReviewStore {
    fn next_id(&self) -> Result<ReviewItemId, RepositoryError> {
        let guard = self.lock()?;
        loop {
            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
            let id = ReviewItemId(format!("rev-{sequence:06}"));
            if !guard.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    fn insert(&self, item: ReviewItem) -> Result<ReviewItem, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&item.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    fn fetch(&self, id: &ReviewItemId) -> Result<Option<ReviewItem>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.get(id).cloned())
    }

    fn list(&self, filter: &QueueFilter) -> Result<Vec<ReviewItem>, RepositoryError> {
        let guard = self.lock()?;
        Ok(filter.apply(guard.values().cloned()))
    }

    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn ReviewTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut guard = self.lock()?;
        let mut transaction = MemoryTransaction {
            committed: &*guard,
            staged: HashMap::new(),
        };

        let value = work(&mut transaction)?;
        let staged = transaction.staged;
        guard.extend(staged);
        Ok(value)
    }
}

struct MemoryTransaction<'a> {
    committed: &'a HashMap<ReviewItemId, ReviewItem>,
    staged: HashMap<ReviewItemId, ReviewItem>,
}

impl ReviewTransaction for MemoryTransaction<'_> {
    fn fetch_for_update(
        &mut self,
        id: &ReviewItemId,
    ) -> Result<Option<ReviewItem>, RepositoryError> {
        Ok(self
            .staged
            .get(id)
            .or_else(|| self.committed.get(id))
            .cloned())
    }

    fn actionable(&mut self) -> Result<Vec<ReviewItem>, RepositoryError> {
        let mut items: Vec<ReviewItem> = self
            .committed
            .iter()
            .filter(|(id, _)| !self.staged.contains_key(*id))
            .map(|(_, item)| item)
            .chain(self.staged.values())
            .filter(|item| item.is_actionable())
            .cloned()
            .collect();
        items.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(items)
    }

    fn update(&mut self, item: ReviewItem) -> Result<(), RepositoryError> {
        if !self.staged.contains_key(&item.id) && !self.committed.contains_key(&item.id) {
            return Err(RepositoryError::NotFound);
        }
        self.staged.insert(item.id.clone(), item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::review::tests::common::pending_item;
    use crate::workflows::review::domain::ReviewStatus;

    #[test]
    fn failed_transaction_discards_staged_writes() {
        let store = InMemoryReviewStore::default();
        store.insert(pending_item("rev-1")).expect("insert");

        let result: Result<(), RepositoryError> = store.transaction(|tx| {
            let mut item = tx.fetch_for_update(&ReviewItemId("rev-1".to_string()))?.expect("row");
            item.status = ReviewStatus::Approved;
            tx.update(item)?;
            Err(RepositoryError::Unavailable("disk full".to_string()))
        });

        assert!(result.is_err());
        let stored = store
            .fetch(&ReviewItemId("rev-1".to_string()))
            .expect("fetch")
            .expect("row");
        assert_eq!(stored.status, ReviewStatus::Pending);
    }

    #[test]
    fn staged_writes_are_visible_inside_the_transaction() {
        let store = InMemoryReviewStore::default();
        store.insert(pending_item("rev-1")).expect("insert");
        store.insert(pending_item("rev-2")).expect("insert");

        let actionable = store
            .transaction(|tx| -> Result<usize, RepositoryError> {
                let mut item = tx
                    .fetch_for_update(&ReviewItemId("rev-2".to_string()))?
                    .expect("row");
                item.status = ReviewStatus::Rejected;
                tx.update(item)?;
                Ok(tx.actionable()?.len())
            })
            .expect("commit");

        assert_eq!(actionable, 1);
        assert_eq!(
            store
                .fetch(&ReviewItemId("rev-2".to_string()))
                .expect("fetch")
                .expect("row")
                .status,
            ReviewStatus::Rejected
        );
    }

    #[test]
    fn allocated_ids_skip_rows_already_stored() {
        let store = InMemoryReviewStore::default();
        store.insert(pending_item("rev-000001")).expect("insert");
        store.insert(pending_item("rev-000002")).expect("insert");

        assert_eq!(store.next_id().expect("id"), ReviewItemId("rev-000003".to_string()));
        assert_eq!(store.next_id().expect("id"), ReviewItemId("rev-000004".to_string()));
    }

    #[test]
    fn clones_share_one_id_sequence() {
        let store = InMemoryReviewStore::default();
        let handle = store.clone();

        let first = store.next_id().expect("id");
        let second = handle.next_id().expect("id");

        assert_ne!(first, second);
    }

    #[test]
    fn update_requires_existing_row() {
        let store = InMemoryReviewStore::default();
        let result: Result<(), RepositoryError> =
            store.transaction(|tx| tx.update(pending_item("ghost")));
        assert_eq!(result, Err(RepositoryError::NotFound));
        assert!(store.is_empty());
    }
}
