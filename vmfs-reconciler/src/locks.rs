// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use vmfs_types::DatastoreId;

/// Keyed async locks that serialize reconciliation passes per datastore.
///
/// The executor has no compare-and-swap, so two passes touching one id
/// must not overlap. Passes over different ids proceed independently.
#[derive(Default)]
pub struct DatastoreLocks {
    entries: Mutex<HashMap<DatastoreId, Arc<AsyncMutex<()>>>>,
}

impl DatastoreLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, id: &DatastoreId) -> OwnedMutexGuard<()> {
        let entry = {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            entries.entry(id.clone()).or_default().clone()
        };
        entry.lock_owned().await
    }

    /// Drop the entry for a deleted datastore.
    pub fn forget(&self, id: &DatastoreId) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
