//! Background analysis dispatcher.
//!
//! Polls the job store every `poll_interval`, claims the oldest pending
//! analysis (pending -> processing), runs it through the [`Analyzer`], writes
//! the terminal transition and then publishes a [`CompletionEvent`] to the
//! owner's group. The store write always happens before the publish, so a
//! client reacting to the push reads the terminal state.

use std::sync::Arc;
use std::time::Duration;

use medassist_core::analysis::Analysis;
use medassist_core::error::CoreError;
use medassist_core::job_events::CompletionEvent;
use medassist_db::{JobStore, StoreError};
use medassist_events::CompletionNotifier;
use tokio_util::sync::CancellationToken;

use super::analyzer::{AnalysisRequest, Analyzer};

/// Default polling interval for the dispatcher loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A single long-lived task turning pending analyses into results.
pub struct AnalysisDispatcher {
    store: Arc<dyn JobStore>,
    analyzer: Arc<dyn Analyzer>,
    notifier: Arc<CompletionNotifier>,
    poll_interval: Duration,
}

impl AnalysisDispatcher {
    /// Create a dispatcher with the default 1-second poll interval.
    pub fn new(
        store: Arc<dyn JobStore>,
        analyzer: Arc<dyn Analyzer>,
        notifier: Arc<CompletionNotifier>,
    ) -> Self {
        Self {
            store,
            analyzer,
            notifier,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run the dispatcher loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Analysis dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Analysis dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    // Drain everything pending before waiting for the next tick.
                    loop {
                        match self.dispatch_once().await {
                            Ok(true) if !cancel.is_cancelled() => continue,
                            Ok(_) => break,
                            Err(e) => {
                                tracing::error!(error = %e, "Dispatch cycle failed");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Claim and process at most one pending analysis.
    ///
    /// Returns `Ok(true)` if a job was processed.
    pub async fn dispatch_once(&self) -> Result<bool, StoreError> {
        let Some(job) = self.store.claim_next_pending().await? else {
            return Ok(false);
        };

        tracing::info!(
            job_id = %job.id,
            owner_id = %job.owner_id,
            "Analysis claimed",
        );

        self.process(job).await?;
        Ok(true)
    }

    /// Run the analyzer for a claimed job and record the outcome.
    async fn process(&self, job: Analysis) -> Result<(), StoreError> {
        let request = AnalysisRequest::for_analysis(&job);

        let event = match self.analyzer.analyze(&request).await {
            Ok(results) => match self.store.complete(&job.id, &results).await {
                Ok(done) => {
                    tracing::info!(
                        job_id = %done.id,
                        result_count = results.len(),
                        confidence = done.aggregate_confidence,
                        "Analysis completed",
                    );
                    CompletionEvent::completed(&done, results.len())
                }
                Err(StoreError::Core(CoreError::Validation(msg))) => {
                    tracing::warn!(job_id = %job.id, error = %msg, "Analyzer output rejected");
                    self.fail(&job, &format!("Analyzer output rejected: {msg}")).await?
                }
                Err(e) => {
                    // Never leave a claimed job in `processing`.
                    tracing::error!(job_id = %job.id, error = %e, "Failed to record analysis results");
                    self.fail(&job, &format!("Failed to record results: {e}")).await?
                }
            },
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Analyzer call failed");
                self.fail(&job, &e.to_string()).await?
            }
        };

        self.notifier.publish(&job.owner_id, event).await;
        Ok(())
    }

    async fn fail(&self, job: &Analysis, message: &str) -> Result<CompletionEvent, StoreError> {
        match self.store.fail(&job.id, message).await {
            Ok(failed) => {
                tracing::info!(job_id = %failed.id, "Analysis failed");
                Ok(CompletionEvent::failed(&failed))
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to mark analysis failed");
                Err(e)
            }
        }
    }
}
