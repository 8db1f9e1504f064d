//! Analysis entity, its result records and the read-one snapshot.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::status::JobStatus;
use crate::types::{JobId, OwnerId, Timestamp};

/// One clinical-case analysis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: JobId,
    pub owner_id: OwnerId,
    pub title: String,
    pub case_text: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub status: JobStatus,
    /// Mean of the result confidences. Present only once completed.
    pub aggregate_confidence: Option<f64>,
    /// Set together with the `failed` transition.
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Analysis {
    /// Build the read-one view of this analysis.
    pub fn snapshot(&self, result_count: usize) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            status: self.status,
            result_count,
            aggregate_confidence: self.aggregate_confidence,
            title: self.title.clone(),
            owner_id: self.owner_id.clone(),
        }
    }
}

/// DTO for submitting a new case via `POST /api/v1/analyses`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewAnalysis {
    pub owner_id: OwnerId,
    pub title: String,
    pub case_text: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl NewAnalysis {
    /// Reject blank required fields.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (field, value) in [
            ("owner_id", &self.owner_id),
            ("title", &self.title),
            ("case_text", &self.case_text),
        ] {
            if value.trim().is_empty() {
                return Err(CoreError::Validation(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

/// One category/result/confidence record produced by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub category: String,
    pub result: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Check every confidence lies in `[0, 1]` and the set is non-empty.
pub fn validate_results(results: &[ResultRecord]) -> Result<(), CoreError> {
    if results.is_empty() {
        return Err(CoreError::Validation(
            "A completed analysis needs at least one result".into(),
        ));
    }
    if let Some(bad) = results
        .iter()
        .find(|r| !(0.0..=1.0).contains(&r.confidence))
    {
        return Err(CoreError::Validation(format!(
            "Confidence {} for category '{}' is outside [0, 1]",
            bad.confidence, bad.category
        )));
    }
    Ok(())
}

/// Mean of the per-category confidences, `None` for an empty set.
pub fn aggregate_confidence(results: &[ResultRecord]) -> Option<f64> {
    if results.is_empty() {
        return None;
    }
    let sum: f64 = results.iter().map(|r| r.confidence).sum();
    Some(sum / results.len() as f64)
}

/// Read-one view served by `GET /api/v1/analyses/{id}` and polled by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub result_count: usize,
    #[serde(default)]
    pub aggregate_confidence: Option<f64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub owner_id: OwnerId,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn record(category: &str, confidence: f64) -> ResultRecord {
        ResultRecord {
            category: category.into(),
            result: "finding".into(),
            confidence,
        }
    }

    #[test]
    fn aggregate_is_the_mean() {
        let results = [record("a", 0.5), record("b", 1.0), record("c", 0.0)];
        assert_eq!(aggregate_confidence(&results), Some(0.5));
        assert_eq!(aggregate_confidence(&[]), None);
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        assert_matches!(
            validate_results(&[record("a", 1.2)]),
            Err(CoreError::Validation(msg)) if msg.contains("'a'")
        );
        assert_matches!(validate_results(&[]), Err(CoreError::Validation(_)));
        assert!(validate_results(&[record("a", 0.0), record("b", 1.0)]).is_ok());
    }

    #[test]
    fn blank_submission_fields_are_rejected() {
        let input = NewAnalysis {
            owner_id: "doc-7".into(),
            title: "  ".into(),
            case_text: "fever".into(),
            image_urls: vec![],
        };
        assert_matches!(input.validate(), Err(CoreError::Validation(msg)) if msg.starts_with("title"));
    }

    #[test]
    fn snapshot_tolerates_missing_optional_fields() {
        let snap: JobSnapshot =
            serde_json::from_str(r#"{"id":"A1","status":"processing"}"#).unwrap();
        assert_eq!(snap.status, JobStatus::Processing);
        assert_eq!(snap.result_count, 0);
        assert!(snap.aggregate_confidence.is_none());
    }
}
