//! Per-user serialization of ledger writes

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

/// Keyed async mutexes. Writers for one user queue behind each other;
/// writers for different users never contend.
#[derive(Clone, Default)]
pub struct UserLocks {
    locks: Arc<LockMap>,
}

/// Exclusive hold on one user. Dropping it releases the user and forgets
/// the mutex once nobody else holds or waits on it.
pub struct UserGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
    user_id: Uuid,
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold a clone of the mutex, so a count of one means only
        // the map is left.
        self.locks
            .remove_if(&self.user_id, |_, m| Arc::strong_count(m) == 1);
    }
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: Uuid) -> UserGuard {
        let mutex = self.locks.entry(user_id).or_default().clone();
        let guard = mutex.lock_owned().await;
        UserGuard {
            guard: Some(guard),
            locks: self.locks.clone(),
            user_id,
        }
    }

    /// Users currently held or waited on
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
