//! Postgres-backed [`JobStore`].

use async_trait::async_trait;
use medassist_core::analysis::{
    aggregate_confidence, validate_results, Analysis, JobSnapshot, NewAnalysis, ResultRecord,
};
use medassist_core::error::CoreError;
use medassist_core::status::JobStatus;
use medassist_core::types::JobId;

use crate::error::StoreError;
use crate::models::analysis::{AnalysisRow, Page};
use crate::repositories::AnalysisRepo;
use crate::store::JobStore;
use crate::DbPool;

/// [`JobStore`] over a sqlx Postgres pool.
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Turn a guarded update that matched no row into the right error:
    /// `NotFound` if the job does not exist, `Conflict` otherwise.
    async fn guarded(
        &self,
        id: &str,
        next: JobStatus,
        row: Option<AnalysisRow>,
    ) -> Result<Analysis, StoreError> {
        if let Some(row) = row {
            return Ok(Analysis::try_from(row)?);
        }
        match AnalysisRepo::find_by_id(&self.pool, id).await? {
            None => Err(CoreError::NotFound {
                entity: "Analysis",
                id: id.to_string(),
            }
            .into()),
            Some(current) => {
                let current = Analysis::try_from(current)?;
                current.status.check_transition(next)?;
                // The row moved between the update and this read.
                tracing::warn!(
                    job_id = %id,
                    status = %current.status,
                    next = %next,
                    "Guarded update lost a race",
                );
                Err(CoreError::Conflict(format!(
                    "Analysis {id} changed concurrently (now {})",
                    current.status
                ))
                .into())
            }
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn health(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn create(&self, input: &NewAnalysis) -> Result<Analysis, StoreError> {
        input.validate()?;
        let row = AnalysisRepo::create(&self.pool, input).await?;
        Ok(Analysis::try_from(row)?)
    }

    async fn find(&self, id: &str) -> Result<Option<Analysis>, StoreError> {
        AnalysisRepo::find_by_id(&self.pool, id)
            .await?
            .map(|row| Analysis::try_from(row).map_err(StoreError::from))
            .transpose()
    }

    async fn snapshot(&self, id: &str) -> Result<Option<JobSnapshot>, StoreError> {
        let Some(analysis) = self.find(id).await? else {
            return Ok(None);
        };
        let count = AnalysisRepo::count_results(&self.pool, id).await?;
        Ok(Some(analysis.snapshot(count.max(0) as usize)))
    }

    async fn list_by_owner(&self, owner_id: &str, page: Page) -> Result<Vec<Analysis>, StoreError> {
        AnalysisRepo::list_by_owner(&self.pool, owner_id, page)
            .await?
            .into_iter()
            .map(|row| Analysis::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn results(&self, id: &str) -> Result<Vec<ResultRecord>, StoreError> {
        Ok(AnalysisRepo::list_results(&self.pool, id)
            .await?
            .into_iter()
            .map(ResultRecord::from)
            .collect())
    }

    async fn claim_next_pending(&self) -> Result<Option<Analysis>, StoreError> {
        AnalysisRepo::claim_next_pending(&self.pool)
            .await?
            .map(|row| Analysis::try_from(row).map_err(StoreError::from))
            .transpose()
    }

    async fn mark_processing(&self, id: &JobId) -> Result<Analysis, StoreError> {
        let row = AnalysisRepo::mark_processing(&self.pool, id).await?;
        self.guarded(id, JobStatus::Processing, row).await
    }

    async fn complete(&self, id: &JobId, results: &[ResultRecord]) -> Result<Analysis, StoreError> {
        validate_results(results)?;
        let aggregate = aggregate_confidence(results)
            .ok_or_else(|| CoreError::Internal("Aggregate of validated results missing".into()))?;
        let row = AnalysisRepo::complete(&self.pool, id, results, aggregate).await?;
        self.guarded(id, JobStatus::Completed, row).await
    }

    async fn fail(&self, id: &JobId, message: &str) -> Result<Analysis, StoreError> {
        let row = AnalysisRepo::fail(&self.pool, id, message).await?;
        self.guarded(id, JobStatus::Failed, row).await
    }
}
