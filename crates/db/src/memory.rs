//! In-memory [`JobStore`].
//!
//! Selected explicitly with `JOB_STORE=memory` for local development and
//! used by the test suites. It is never picked as a fallback when Postgres
//! is unreachable.

use std::collections::HashMap;

use async_trait::async_trait;
use medassist_core::analysis::{
    aggregate_confidence, validate_results, Analysis, JobSnapshot, NewAnalysis, ResultRecord,
};
use medassist_core::error::CoreError;
use medassist_core::status::JobStatus;
use medassist_core::types::{new_job_id, JobId};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::models::analysis::Page;
use crate::store::JobStore;

struct Entry {
    analysis: Analysis,
    results: Vec<ResultRecord>,
}

/// Process-local job store guarded by a single `RwLock`.
#[derive(Default)]
pub struct MemoryJobStore {
    entries: RwLock<HashMap<JobId, Entry>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Apply a status transition under the write lock.
    async fn transition<F>(&self, id: &str, next: JobStatus, apply: F) -> Result<Analysis, StoreError>
    where
        F: FnOnce(&mut Entry),
    {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(id).ok_or_else(|| CoreError::NotFound {
            entity: "Analysis",
            id: id.to_string(),
        })?;
        entry.analysis.status.check_transition(next)?;

        entry.analysis.status = next;
        entry.analysis.updated_at = chrono::Utc::now();
        apply(entry);
        Ok(entry.analysis.clone())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn health(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create(&self, input: &NewAnalysis) -> Result<Analysis, StoreError> {
        input.validate()?;
        let now = chrono::Utc::now();
        let analysis = Analysis {
            id: new_job_id(),
            owner_id: input.owner_id.clone(),
            title: input.title.clone(),
            case_text: input.case_text.clone(),
            image_urls: input.image_urls.clone(),
            status: JobStatus::Pending,
            aggregate_confidence: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.entries.write().await.insert(
            analysis.id.clone(),
            Entry {
                analysis: analysis.clone(),
                results: Vec::new(),
            },
        );
        Ok(analysis)
    }

    async fn find(&self, id: &str) -> Result<Option<Analysis>, StoreError> {
        Ok(self.entries.read().await.get(id).map(|e| e.analysis.clone()))
    }

    async fn snapshot(&self, id: &str) -> Result<Option<JobSnapshot>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .get(id)
            .map(|e| e.analysis.snapshot(e.results.len())))
    }

    async fn list_by_owner(&self, owner_id: &str, page: Page) -> Result<Vec<Analysis>, StoreError> {
        let entries = self.entries.read().await;
        let mut owned: Vec<&Analysis> = entries
            .values()
            .map(|e| &e.analysis)
            .filter(|a| a.owner_id == owner_id)
            .collect();
        owned.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
        Ok(owned
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    async fn results(&self, id: &str) -> Result<Vec<ResultRecord>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .get(id)
            .map(|e| e.results.clone())
            .unwrap_or_default())
    }

    async fn claim_next_pending(&self) -> Result<Option<Analysis>, StoreError> {
        let mut entries = self.entries.write().await;
        let next = entries
            .values_mut()
            .filter(|e| e.analysis.status == JobStatus::Pending)
            .min_by(|a, b| {
                (a.analysis.created_at, &a.analysis.id).cmp(&(b.analysis.created_at, &b.analysis.id))
            });
        Ok(next.map(|entry| {
            entry.analysis.status = JobStatus::Processing;
            entry.analysis.updated_at = chrono::Utc::now();
            entry.analysis.clone()
        }))
    }

    async fn mark_processing(&self, id: &JobId) -> Result<Analysis, StoreError> {
        self.transition(id, JobStatus::Processing, |_| {}).await
    }

    async fn complete(&self, id: &JobId, results: &[ResultRecord]) -> Result<Analysis, StoreError> {
        validate_results(results)?;
        let aggregate = aggregate_confidence(results);
        self.transition(id, JobStatus::Completed, |entry| {
            entry.analysis.aggregate_confidence = aggregate;
            entry.results = results.to_vec();
        })
        .await
    }

    async fn fail(&self, id: &JobId, message: &str) -> Result<Analysis, StoreError> {
        self.transition(id, JobStatus::Failed, |entry| {
            entry.analysis.error_message = Some(message.to_string());
        })
        .await
    }
}
