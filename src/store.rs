//! BillStore — the external bill-store collaborator.
//!
//! `JsonFileBillStore` stands in for the excluded database-backed loader,
//! reading a flat JSON array of [`Bill`] from disk. Follows the same
//! trait-plus-mock split as `EmbeddingProvider`/`LlmProvider`.

use crate::model::Bill;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read bill store file {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("failed to parse bill store file {0}: {1}")]
    Parse(PathBuf, serde_json::Error),
    #[error("no mock bills configured for key: {0:?}")]
    MissingMockBills(String),
}

/// Read access to the bill corpus, with eager article loading.
#[async_trait]
pub trait BillStore: Send + Sync {
    async fn list_bills(&self) -> Result<Vec<Bill>, StoreError>;
}

/// Reads a JSON array of [`Bill`] from a file on disk, in place of the
/// excluded database-backed loader.
pub struct JsonFileBillStore {
    path: PathBuf,
}

impl JsonFileBillStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl BillStore for JsonFileBillStore {
    async fn list_bills(&self) -> Result<Vec<Bill>, StoreError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| StoreError::Io(self.path.clone(), e))?;
        serde_json::from_str(&contents).map_err(|e| StoreError::Parse(self.path.clone(), e))
    }
}

/// Mock bill store returning a fixed, preconfigured set of bills.
pub struct MockBillStore {
    bills: Vec<Bill>,
}

impl MockBillStore {
    pub fn new(bills: Vec<Bill>) -> Self {
        Self { bills }
    }
}

#[async_trait]
impl BillStore for MockBillStore {
    async fn list_bills(&self) -> Result<Vec<Bill>, StoreError> {
        Ok(self.bills.clone())
    }
}

/// Mock bill store that fails unless asked for a preconfigured key, useful
/// for exercising the driver's error propagation from this stage.
pub struct FailingBillStore;

#[async_trait]
impl BillStore for FailingBillStore {
    async fn list_bills(&self) -> Result<Vec<Bill>, StoreError> {
        Err(StoreError::MissingMockBills("unconfigured".to_string()))
    }
}
