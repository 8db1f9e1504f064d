//! Row types for the `analyses` and `analysis_results` tables.

use medassist_core::analysis::{Analysis, ResultRecord};
use medassist_core::error::CoreError;
use medassist_core::status::JobStatus;
use medassist_core::types::Timestamp;
use sqlx::FromRow;

/// A row from the `analyses` table.
///
/// `status` is stored as TEXT and converted to [`JobStatus`] on the way out.
#[derive(Debug, Clone, FromRow)]
pub struct AnalysisRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub case_text: String,
    pub image_urls: Vec<String>,
    pub status: String,
    pub aggregate_confidence: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<AnalysisRow> for Analysis {
    type Error = CoreError;

    fn try_from(row: AnalysisRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|_| CoreError::Internal(format!("Corrupt status '{}' on {}", row.status, row.id)))?;

        Ok(Analysis {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            case_text: row.case_text,
            image_urls: row.image_urls,
            status,
            aggregate_confidence: row.aggregate_confidence,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `analysis_results` table.
#[derive(Debug, Clone, FromRow)]
pub struct ResultRow {
    pub category: String,
    pub result: String,
    pub confidence: f64,
}

impl From<ResultRow> for ResultRecord {
    fn from(row: ResultRow) -> Self {
        ResultRecord {
            category: row.category,
            result: row.result,
            confidence: row.confidence,
        }
    }
}

/// Paging parameters for owner listings.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

/// Maximum page size for listings.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for listings.
pub const DEFAULT_LIMIT: i64 = 50;

impl Page {
    /// Clamp caller-provided values into the allowed range.
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}
