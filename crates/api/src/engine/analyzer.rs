//! The language-model analyzer seam.
//!
//! The dispatcher only needs "prompt plus optional images in, category
//! results out". [`HttpAnalyzer`] talks to an external model gateway;
//! [`StubAnalyzer`] returns canned results and is only selected with
//! `ANALYZER_MODE=stub`.

use std::time::Duration;

use async_trait::async_trait;
use medassist_core::analysis::{Analysis, ResultRecord};
use serde::{Deserialize, Serialize};

/// Input handed to an analyzer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub images: Vec<String>,
}

impl AnalysisRequest {
    /// Build the request for a submitted case.
    pub fn for_analysis(analysis: &Analysis) -> Self {
        Self {
            prompt: format!(
                "Clinical case: {}\n\n{}\n\nReturn findings grouped by category with a confidence between 0 and 1.",
                analysis.title, analysis.case_text
            ),
            images: analysis.image_urls.clone(),
        }
    }
}

/// Errors from an analyzer call. Every variant fails the job.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Analyzer request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx status.
    #[error("Analyzer returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The gateway answered 2xx with a body we cannot use.
    #[error("Analyzer response invalid: {0}")]
    InvalidResponse(String),
}

/// Black-box analysis function.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Vec<ResultRecord>, AnalyzerError>;
}

/// Response body expected from the model gateway.
#[derive(Debug, Deserialize)]
struct GatewayResponse {
    results: Vec<ResultRecord>,
}

/// Analyzer backed by an HTTP model gateway.
///
/// Sends `POST {url}` with `{prompt, images}` and expects
/// `{results: [{category, result, confidence}]}`.
pub struct HttpAnalyzer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpAnalyzer {
    /// Build an analyzer whose calls fail with [`AnalyzerError::Request`]
    /// once `timeout` elapses.
    pub fn new(url: String, api_key: Option<String>, timeout: Duration) -> Result<Self, AnalyzerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url, api_key))
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            url,
            api_key,
        }
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Vec<ResultRecord>, AnalyzerError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GatewayResponse = response
            .json()
            .await
            .map_err(|e| AnalyzerError::InvalidResponse(e.to_string()))?;
        Ok(parsed.results)
    }
}

/// Canned analyzer for development. Never used unless configured.
#[derive(Debug, Default, Clone)]
pub struct StubAnalyzer;

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Vec<ResultRecord>, AnalyzerError> {
        let mut results = vec![
            ResultRecord {
                category: "summary".into(),
                result: "[stub] No model was consulted for this case".into(),
                confidence: 0.5,
            },
            ResultRecord {
                category: "triage".into(),
                result: "[stub] Routine".into(),
                confidence: 0.5,
            },
        ];
        if !request.images.is_empty() {
            results.push(ResultRecord {
                category: "imaging".into(),
                result: format!("[stub] {} image(s) attached, not inspected", request.images.len()),
                confidence: 0.5,
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use medassist_core::status::JobStatus;

    use super::*;

    fn analysis(images: Vec<String>) -> Analysis {
        let now = chrono::Utc::now();
        Analysis {
            id: "A1".into(),
            owner_id: "doc-7".into(),
            title: "Persistent cough".into(),
            case_text: "6 weeks, non-smoker".into(),
            image_urls: images,
            status: JobStatus::Processing,
            aggregate_confidence: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn request_carries_title_text_and_images() {
        let req = AnalysisRequest::for_analysis(&analysis(vec!["x.png".into()]));
        assert!(req.prompt.contains("Persistent cough"));
        assert!(req.prompt.contains("non-smoker"));
        assert_eq!(req.images, vec!["x.png".to_string()]);
    }

    #[tokio::test]
    async fn stub_adds_imaging_result_only_with_images() {
        let without = StubAnalyzer
            .analyze(&AnalysisRequest::for_analysis(&analysis(vec![])))
            .await
            .unwrap();
        let with = StubAnalyzer
            .analyze(&AnalysisRequest::for_analysis(&analysis(vec!["x.png".into()])))
            .await
            .unwrap();
        assert_eq!(without.len(), 2);
        assert_eq!(with.len(), 3);
        assert!(with.iter().all(|r| r.result.starts_with("[stub]")));
    }
}
