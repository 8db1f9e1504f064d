//! Push message format for analysis completion events.
//!
//! Sent as JSON text frames by the server's WebSocket endpoint and parsed
//! by the client-side status gate.

use serde::{Deserialize, Serialize};

use crate::analysis::Analysis;
use crate::status::JobStatus;
use crate::types::{JobId, OwnerId, Timestamp};

/// Analysis reached `completed`.
pub const MSG_TYPE_ANALYSIS_COMPLETED: &str = "analysis_completed";

/// Analysis reached `failed`.
pub const MSG_TYPE_ANALYSIS_FAILED: &str = "analysis_failed";

/// Client request to join an owner's room over an open socket.
pub const MSG_TYPE_JOIN: &str = "join";

/// Which terminal state the event announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionKind {
    #[serde(rename = "analysis_completed")]
    Completed,
    #[serde(rename = "analysis_failed")]
    Failed,
}

impl CompletionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionKind::Completed => MSG_TYPE_ANALYSIS_COMPLETED,
            CompletionKind::Failed => MSG_TYPE_ANALYSIS_FAILED,
        }
    }

    /// The job status this event implies.
    pub fn status(self) -> JobStatus {
        match self {
            CompletionKind::Completed => JobStatus::Completed,
            CompletionKind::Failed => JobStatus::Failed,
        }
    }
}

/// Owner-scoped notification that an analysis reached a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    #[serde(rename = "type")]
    pub kind: CompletionKind,
    pub job_id: JobId,
    pub owner_id: OwnerId,
    pub title: String,
    pub confidence: Option<f64>,
    pub result_count: usize,
    pub error: Option<String>,
    pub timestamp: Timestamp,
}

impl CompletionEvent {
    /// Event for a freshly completed analysis.
    pub fn completed(analysis: &Analysis, result_count: usize) -> Self {
        Self {
            kind: CompletionKind::Completed,
            job_id: analysis.id.clone(),
            owner_id: analysis.owner_id.clone(),
            title: analysis.title.clone(),
            confidence: analysis.aggregate_confidence,
            result_count,
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Event for a failed analysis.
    pub fn failed(analysis: &Analysis) -> Self {
        Self {
            kind: CompletionKind::Failed,
            job_id: analysis.id.clone(),
            owner_id: analysis.owner_id.clone(),
            title: analysis.title.clone(),
            confidence: None,
            result_count: 0,
            error: analysis.error_message.clone(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Inbound socket message asking to join another owner's room.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JoinRequest {
    #[serde(rename = "type")]
    pub message_type: String,
    pub owner_id: OwnerId,
}
