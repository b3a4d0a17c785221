//! Per-manuscript critical sections
//!
//! Mutations of one manuscript run one at a time; different manuscripts
//! proceed in parallel. Waiting is bounded so a stuck holder surfaces as
//! `ConcurrentModification` instead of piling up requests.

use reviewforge_common::errors::{AppError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Registry size above which idle entries are swept
const SWEEP_THRESHOLD: usize = 1024;

pub struct ManuscriptLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
    timeout: Duration,
}

impl ManuscriptLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Wait for exclusive access to `id`; released when the guard drops
    pub async fn acquire(&self, id: Uuid) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            if locks.len() > SWEEP_THRESHOLD {
                // Only the registry holds idle locks
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(id).or_default().clone()
        };

        tokio::time::timeout(self.timeout, lock.lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(manuscript_id = %id, "Timed out waiting for manuscript lock");
                AppError::ConcurrentModification { manuscript_id: id }
            })
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
