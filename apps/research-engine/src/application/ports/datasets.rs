//! Dataset Repository Port (Driven Port)
//!
//! Resolves dataset references to positionally-ordered tabular handles.
//! Positional order is load-bearing: the optimization engine's
//! train/validation split cuts the row sequence by index, never randomly.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;

/// Errors from dataset resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatasetError {
    /// No dataset is registered under the requested id.
    #[error("Dataset not found: {dataset_id}")]
    NotFound {
        /// Requested dataset identifier.
        dataset_id: String,
    },

    /// The backend failed while materializing rows.
    #[error("Failed to load dataset '{dataset_id}': {message}")]
    LoadFailed {
        /// Requested dataset identifier.
        dataset_id: String,
        /// Backend error message.
        message: String,
    },
}

/// A tabular handle over time-ordered rows.
///
/// Rows are shared behind an `Arc`, so cloning and [`Dataset::slice`] are
/// cheap and never copy row data. A slice is a window `[start, end)` into
/// the same backing rows.
#[derive(Debug, Clone)]
pub struct Dataset {
    id: String,
    rows: Arc<Vec<Value>>,
    start: usize,
    end: usize,
}

impl Dataset {
    /// Wrap a full row sequence.
    #[must_use]
    pub fn new(id: impl Into<String>, rows: Vec<Value>) -> Self {
        let end = rows.len();
        Self {
            id: id.into(),
            rows: Arc::new(rows),
            start: 0,
            end,
        }
    }

    /// Identifier this handle was resolved from.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of rows visible through this handle.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the handle holds no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The visible rows.
    #[must_use]
    pub fn rows(&self) -> &[Value] {
        &self.rows[self.start..self.end]
    }

    /// Positional sub-window `[start, end)` relative to this handle.
    ///
    /// Out-of-range indices are clamped to the handle's bounds.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let len = self.len();
        let start = start.min(len);
        let end = end.clamp(start, len);
        Self {
            id: self.id.clone(),
            rows: Arc::clone(&self.rows),
            start: self.start + start,
            end: self.start + end,
        }
    }
}

/// Port for resolving dataset references.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatasetRepositoryPort: Send + Sync {
    /// Resolve a dataset reference to a tabular handle.
    async fn load(&self, dataset_id: &str) -> Result<Dataset, DatasetError>;

    /// Record a read in the dataset's last-accessed bookkeeping.
    async fn touch_last_accessed(&self, dataset_id: &str) -> Result<(), DatasetError>;
}

/// In-memory repository backed by registered fixture rows.
#[derive(Debug, Default)]
pub struct InMemoryDatasetRepository {
    datasets: RwLock<HashMap<String, Arc<Vec<Value>>>>,
    last_accessed: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryDatasetRepository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register rows under an identifier, replacing any previous rows.
    pub fn insert(&self, dataset_id: impl Into<String>, rows: Vec<Value>) {
        self.datasets.write().insert(dataset_id.into(), Arc::new(rows));
    }

    /// When the dataset was last read, if ever.
    #[must_use]
    pub fn last_accessed(&self, dataset_id: &str) -> Option<DateTime<Utc>> {
        self.last_accessed.read().get(dataset_id).copied()
    }

    /// Number of registered datasets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.datasets.read().len()
    }

    /// Whether the repository has no datasets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datasets.read().is_empty()
    }
}

#[async_trait]
impl DatasetRepositoryPort for InMemoryDatasetRepository {
    async fn load(&self, dataset_id: &str) -> Result<Dataset, DatasetError> {
        let rows = {
            let datasets = self.datasets.read();
            datasets
                .get(dataset_id)
                .cloned()
                .ok_or_else(|| DatasetError::NotFound {
                    dataset_id: dataset_id.to_string(),
                })?
        };

        Ok(Dataset {
            id: dataset_id.to_string(),
            start: 0,
            end: rows.len(),
            rows,
        })
    }

    async fn touch_last_accessed(&self, dataset_id: &str) -> Result<(), DatasetError> {
        let mut accessed = self.last_accessed.write();
        accessed.insert(dataset_id.to_string(), Utc::now());
        Ok(())
    }
}
