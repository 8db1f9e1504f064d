//! Poll side of the gate: a one-shot read of an analysis' status.

use std::time::Duration;

use async_trait::async_trait;
use medassist_core::analysis::JobSnapshot;
use serde::Deserialize;

use crate::error::SourceError;

/// Fetches the current snapshot of one analysis.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, job_id: &str) -> Result<JobSnapshot, SourceError>;
}

/// Per-request timeout for status reads. Shorter than the default poll
/// period, so a hung read is abandoned before the next tick is due.
const REQUEST_TIMEOUT: Duration = Duration::from_millis(2500);

/// Envelope the API wraps every success body in.
#[derive(Debug, Deserialize)]
struct DataEnvelope {
    data: JobSnapshot,
}

/// Reads `GET {api_base}/api/v1/analyses/{id}`.
pub struct HttpStatusSource {
    client: reqwest::Client,
    api_base: String,
}

impl HttpStatusSource {
    pub fn new(api_base: impl Into<String>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client, api_base))
    }

    pub fn with_client(client: reqwest::Client, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self { client, api_base }
    }

    fn url(&self, job_id: &str) -> String {
        format!("{}/api/v1/analyses/{job_id}", self.api_base)
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self, job_id: &str) -> Result<JobSnapshot, SourceError> {
        let response = self.client.get(self.url(job_id)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let envelope: DataEnvelope =
            serde_json::from_str(&body).map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }
}
