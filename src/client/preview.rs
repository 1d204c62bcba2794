use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{trace, warn};

/// Tracks preview handles handed out for selected images
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
    released: AtomicUsize,
}

impl PreviewRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a handle that is released when dropped
    pub fn acquire(self: &Arc<Self>) -> PreviewHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.lock().unwrap_or_else(PoisonError::into_inner).insert(id);
        trace!("Acquired preview {}", id);
        PreviewHandle {
            id,
            registry: Arc::clone(self),
        }
    }

    /// Handles acquired and not yet released
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn release(&self, id: u64) {
        if self.live.lock().unwrap_or_else(PoisonError::into_inner).remove(&id) {
            self.released.fetch_add(1, Ordering::SeqCst);
            trace!("Released preview {}", id);
        } else {
            warn!("Preview {} released twice", id);
        }
    }
}

/// A preview reference bound to one selected image.
///
/// Owned by exactly one selection; dropping it releases it.
#[derive(Debug)]
pub struct PreviewHandle {
    id: u64,
    registry: Arc<PreviewRegistry>,
}

impl PreviewHandle {
    pub fn url(&self) -> String {
        format!("preview://{}", self.id)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_release_once_on_drop() {
        let registry = PreviewRegistry::new();
        let a = registry.acquire();
        let b = registry.acquire();
        assert_ne!(a.url(), b.url());
        assert_eq!(registry.live_count(), 2);

        drop(a);
        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.released_count(), 1);

        drop(b);
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.released_count(), 2);
    }
}
