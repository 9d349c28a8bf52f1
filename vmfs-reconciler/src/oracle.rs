// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use futures_util::future::join_all;
use vmfs_contracts::DatastoreOracle;
use vmfs_types::{DatastoreId, DatastoreState, Existence};

use crate::error::{DatastoreError, Result};

/// Existence and property queries over a [`DatastoreOracle`].
///
/// Every method is a plain read and may be called concurrently.
#[derive(Clone)]
pub struct Oracle {
    inner: Arc<dyn DatastoreOracle>,
}

impl Oracle {
    pub fn new(inner: Arc<dyn DatastoreOracle>) -> Self {
        Self { inner }
    }

    pub async fn describe(&self, id: &DatastoreId) -> Result<DatastoreState> {
        self.inner
            .describe(id)
            .await
            .map_err(|error| DatastoreError::from_host(id, error))
    }

    /// `Absent` instead of an error when the id is unknown to the host.
    pub async fn existence(&self, id: &DatastoreId) -> Result<Existence> {
        match self.describe(id).await {
            Ok(state) => Ok(Existence::Present(state)),
            Err(DatastoreError::NotFound { .. }) => Ok(Existence::Absent),
            Err(error) => Err(error),
        }
    }

    pub async fn existence_many(
        &self,
        ids: &[DatastoreId],
    ) -> Vec<(DatastoreId, Result<Existence>)> {
        let lookups = ids.iter().map(|id| async move {
            let existence = self.existence(id).await;
            (id.clone(), existence)
        });
        join_all(lookups).await
    }
}
