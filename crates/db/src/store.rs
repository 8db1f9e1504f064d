//! The [`JobStore`] seam.

use async_trait::async_trait;
use medassist_core::analysis::{Analysis, JobSnapshot, NewAnalysis, ResultRecord};
use medassist_core::types::JobId;

use crate::error::StoreError;
use crate::models::analysis::Page;

/// Persisted lifecycle state of analysis jobs.
///
/// Every implementation enforces the status state machine: a write that
/// would move a job backwards or out of a terminal state fails with
/// `CoreError::Conflict`, and results plus aggregate confidence are
/// written atomically with the `completed` transition.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Verify the backing storage is reachable.
    async fn health(&self) -> Result<(), StoreError>;

    /// Insert a new job in `pending` state.
    async fn create(&self, input: &NewAnalysis) -> Result<Analysis, StoreError>;

    /// Fetch a job by id.
    async fn find(&self, id: &str) -> Result<Option<Analysis>, StoreError>;

    /// Read-one view used by pollers.
    async fn snapshot(&self, id: &str) -> Result<Option<JobSnapshot>, StoreError>;

    /// Jobs owned by a doctor, newest first.
    async fn list_by_owner(&self, owner_id: &str, page: Page) -> Result<Vec<Analysis>, StoreError>;

    /// Result records of a job (empty unless completed).
    async fn results(&self, id: &str) -> Result<Vec<ResultRecord>, StoreError>;

    /// Atomically move the oldest pending job to `processing` and return it.
    async fn claim_next_pending(&self) -> Result<Option<Analysis>, StoreError>;

    /// pending -> processing for a specific job.
    async fn mark_processing(&self, id: &JobId) -> Result<Analysis, StoreError>;

    /// -> completed, storing results and their mean confidence.
    async fn complete(&self, id: &JobId, results: &[ResultRecord]) -> Result<Analysis, StoreError>;

    /// -> failed, storing the error message.
    async fn fail(&self, id: &JobId, message: &str) -> Result<Analysis, StoreError>;
}
