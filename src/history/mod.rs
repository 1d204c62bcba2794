use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

pub mod backend;
pub mod record;

pub use backend::{FileBackend, HistoryBackend, MemoryBackend, StorageError, HISTORY_STORAGE_KEY};
pub use record::HistoryRecord;

/// Number of records kept before the oldest are evicted
pub const HISTORY_CAPACITY: usize = 10;

type Observer = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`HistoryStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Bounded, most-recent-first caption history.
///
/// Each mutation runs load, modify, save and notify under one lock, so a
/// second mutation never observes a half-applied first one. Observers are
/// called without arguments once the new state is saved and are expected
/// to re-read it with [`HistoryStore::list`]. An observer must not mutate
/// the store from inside its callback.
pub struct HistoryStore {
    backend: Box<dyn HistoryBackend>,
    capacity: usize,
    write_lock: Mutex<()>,
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
    next_subscription: AtomicU64,
}

impl HistoryStore {
    pub fn new(backend: impl HistoryBackend + 'static) -> Self {
        Self::with_capacity(backend, HISTORY_CAPACITY)
    }

    pub fn with_capacity(backend: impl HistoryBackend + 'static, capacity: usize) -> Self {
        Self {
            backend: Box::new(backend),
            capacity,
            write_lock: Mutex::new(()),
            observers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current records, most recent first. Unreadable storage reads as empty.
    pub fn list(&self) -> Vec<HistoryRecord> {
        match self.load_bounded() {
            Ok(records) => records,
            Err(e) => {
                warn!("History unavailable, showing none: {}", e);
                Vec::new()
            }
        }
    }

    /// Puts `record` at the front and evicts the oldest past capacity
    pub fn append(&self, record: HistoryRecord) -> Result<(), StorageError> {
        let _guard = self.lock_writes();
        let mut records = self.load_bounded()?;
        records.insert(0, record);
        if records.len() > self.capacity {
            debug!("Evicting {} oldest history records", records.len() - self.capacity);
            records.truncate(self.capacity);
        }
        self.backend.save(&records)?;
        info!("History now holds {} records", records.len());
        self.notify();
        Ok(())
    }

    /// Removes the record with `id`; an unknown id changes nothing
    pub fn delete_by_id(&self, id: &str) -> Result<(), StorageError> {
        let _guard = self.lock_writes();
        let mut records = self.load_bounded()?;
        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() == before {
            debug!("No history record with id {}", id);
            return Ok(());
        }
        self.backend.save(&records)?;
        info!("Deleted history record {}", id);
        self.notify();
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock_writes();
        self.backend.save(&[])?;
        info!("History cleared");
        self.notify();
        Ok(())
    }

    /// Registers `observer` to be called after every change
    pub fn subscribe(&self, observer: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.lock_observers().push((id, Arc::new(observer)));
        id
    }

    /// Returns false when `id` was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.lock_observers();
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    /// Stored records cut to capacity; a slot written elsewhere may hold more
    fn load_bounded(&self) -> Result<Vec<HistoryRecord>, StorageError> {
        let mut records = self.backend.load()?;
        if records.len() > self.capacity {
            debug!("Slot holds {} records, keeping the newest {}", records.len(), self.capacity);
            records.truncate(self.capacity);
        }
        Ok(records)
    }

    fn notify(&self) {
        // Snapshot so an observer may subscribe or unsubscribe while being called
        let observers: Vec<Observer> = self.lock_observers().iter().map(|(_, o)| o.clone()).collect();
        for observer in observers {
            observer();
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observers(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Observer)>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
