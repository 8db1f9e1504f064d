//! Repository for the `analyses` and `analysis_results` tables.
//!
//! Every status write is guarded with `WHERE status = ANY($n)` built from
//! [`JobStatus::allowed_predecessors`], so the database itself refuses
//! reverse transitions even with concurrent writers.

use medassist_core::analysis::{NewAnalysis, ResultRecord};
use medassist_core::status::JobStatus;
use medassist_core::types::new_job_id;
use sqlx::PgPool;

use crate::models::analysis::{AnalysisRow, Page, ResultRow};

/// Column list for `analyses` queries.
const COLUMNS: &str = "\
    id, owner_id, title, case_text, image_urls, status, \
    aggregate_confidence, error_message, created_at, updated_at";

fn predecessors(next: JobStatus) -> Vec<String> {
    JobStatus::allowed_predecessors(next)
        .into_iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

/// Provides CRUD and lifecycle operations for analysis jobs.
pub struct AnalysisRepo;

impl AnalysisRepo {
    /// Insert a new pending analysis.
    pub async fn create(pool: &PgPool, input: &NewAnalysis) -> Result<AnalysisRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO analyses (id, owner_id, title, case_text, image_urls, status) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnalysisRow>(&query)
            .bind(new_job_id())
            .bind(&input.owner_id)
            .bind(&input.title)
            .bind(&input.case_text)
            .bind(&input.image_urls)
            .bind(JobStatus::Pending.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<AnalysisRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM analyses WHERE id = $1");
        sqlx::query_as::<_, AnalysisRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn count_results(pool: &PgPool, id: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM analysis_results WHERE analysis_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: &str,
        page: Page,
    ) -> Result<Vec<AnalysisRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM analyses WHERE owner_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, AnalysisRow>(&query)
            .bind(owner_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
    }

    pub async fn list_results(pool: &PgPool, id: &str) -> Result<Vec<ResultRow>, sqlx::Error> {
        sqlx::query_as::<_, ResultRow>(
            "SELECT category, result, confidence FROM analysis_results \
             WHERE analysis_id = $1 ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    /// Atomically claim the oldest pending analysis.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent dispatchers never
    /// claim the same row.
    pub async fn claim_next_pending(pool: &PgPool) -> Result<Option<AnalysisRow>, sqlx::Error> {
        let query = format!(
            "UPDATE analyses SET status = $1, updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM analyses \
                 WHERE status = $2 \
                 ORDER BY created_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnalysisRow>(&query)
            .bind(JobStatus::Processing.as_str())
            .bind(JobStatus::Pending.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Guarded pending -> processing. Returns `None` when the row is missing
    /// or not in an allowed predecessor state.
    pub async fn mark_processing(pool: &PgPool, id: &str) -> Result<Option<AnalysisRow>, sqlx::Error> {
        let query = format!(
            "UPDATE analyses SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status = ANY($3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnalysisRow>(&query)
            .bind(id)
            .bind(JobStatus::Processing.as_str())
            .bind(predecessors(JobStatus::Processing))
            .fetch_optional(pool)
            .await
    }

    /// Guarded transition to completed; results and aggregate confidence are
    /// written in the same transaction.
    pub async fn complete(
        pool: &PgPool,
        id: &str,
        results: &[ResultRecord],
        aggregate_confidence: f64,
    ) -> Result<Option<AnalysisRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE analyses \
             SET status = $2, aggregate_confidence = $3, updated_at = NOW() \
             WHERE id = $1 AND status = ANY($4) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, AnalysisRow>(&query)
            .bind(id)
            .bind(JobStatus::Completed.as_str())
            .bind(aggregate_confidence)
            .bind(predecessors(JobStatus::Completed))
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        for record in results {
            sqlx::query(
                "INSERT INTO analysis_results (analysis_id, category, result, confidence) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(&record.category)
            .bind(&record.result)
            .bind(record.confidence)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(row))
    }

    /// Guarded transition to failed.
    pub async fn fail(pool: &PgPool, id: &str, message: &str) -> Result<Option<AnalysisRow>, sqlx::Error> {
        let query = format!(
            "UPDATE analyses SET status = $2, error_message = $3, updated_at = NOW() \
             WHERE id = $1 AND status = ANY($4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnalysisRow>(&query)
            .bind(id)
            .bind(JobStatus::Failed.as_str())
            .bind(message)
            .bind(predecessors(JobStatus::Failed))
            .fetch_optional(pool)
            .await
    }
}
