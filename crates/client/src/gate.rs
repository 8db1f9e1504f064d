//! The status gate: waits for one analysis to finish, from two sources.
//!
//! A poll task reads the job snapshot immediately and then on a fixed
//! interval. A push task holds an owner-scoped subscription open,
//! reconnecting with backoff. Both feed [`Shared::observe`], which mirrors
//! non-terminal statuses monotonically and resolves the gate at most once.
//! Resolution and teardown both trigger the same cancellation token, so
//! every timer and socket is released regardless of which happens first.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use medassist_core::analysis::JobSnapshot;
use medassist_core::job_events::CompletionEvent;
use medassist_core::status::JobStatus;
use medassist_core::types::JobId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::GateConfig;
use crate::error::GateError;
use crate::push::PushSource;
use crate::reconnect::{next_delay, ReconnectConfig};
use crate::source::StatusSource;

/// Message used when a failure is observed without a reason attached.
const DEFAULT_FAILURE_MESSAGE: &str = "Analysis failed";

/// Observable state of a gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateState {
    /// Last mirrored status. Never moves backwards.
    pub status: JobStatus,
    /// True once a completed status with at least one result was seen.
    pub results_ready: bool,
    /// Failure reason, set only when the gate resolved as failed.
    pub error: Option<String>,
    pub result_count: usize,
    pub aggregate_confidence: Option<f64>,
}

impl Default for GateState {
    fn default() -> Self {
        Self {
            status: JobStatus::Pending,
            results_ready: false,
            error: None,
            result_count: 0,
            aggregate_confidence: None,
        }
    }
}

/// How a gate ended.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Ready {
        result_count: usize,
        aggregate_confidence: Option<f64>,
    },
    Failed {
        error: String,
    },
    /// Torn down before either terminal state was observed.
    Cancelled,
}

impl GateOutcome {
    fn from_state(state: &GateState) -> Self {
        match state.status {
            JobStatus::Completed if state.results_ready => Self::Ready {
                result_count: state.result_count,
                aggregate_confidence: state.aggregate_confidence,
            },
            JobStatus::Failed => Self::Failed {
                error: state
                    .error
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            },
            _ => Self::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    Resolved,
    TornDown,
}

/// A status report from either source, normalised.
#[derive(Debug)]
struct Observation {
    status: JobStatus,
    result_count: usize,
    aggregate_confidence: Option<f64>,
    error: Option<String>,
}

impl From<JobSnapshot> for Observation {
    fn from(snapshot: JobSnapshot) -> Self {
        Self {
            status: snapshot.status,
            result_count: snapshot.result_count,
            aggregate_confidence: snapshot.aggregate_confidence,
            error: None,
        }
    }
}

impl From<CompletionEvent> for Observation {
    fn from(event: CompletionEvent) -> Self {
        Self {
            status: event.kind.status(),
            result_count: event.result_count,
            aggregate_confidence: event.confidence,
            error: event.error,
        }
    }
}

/// State shared between the handle and its background tasks.
struct Shared {
    job_id: JobId,
    phase: Mutex<Phase>,
    state: watch::Sender<GateState>,
    cancel: CancellationToken,
}

impl Shared {
    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_active(&self) -> bool {
        *self.phase() == Phase::Active
    }

    /// Apply one observation. Ignored once the gate is resolved or torn down.
    fn observe(&self, observation: Observation, via: &'static str) {
        let mut phase = self.phase();
        if *phase != Phase::Active {
            return;
        }

        match observation.status {
            JobStatus::Completed if observation.result_count > 0 => {
                self.state.send_modify(|s| {
                    s.status = JobStatus::Completed;
                    s.results_ready = true;
                    s.error = None;
                    s.result_count = observation.result_count;
                    s.aggregate_confidence = observation.aggregate_confidence;
                });
                tracing::info!(
                    job_id = %self.job_id,
                    via,
                    result_count = observation.result_count,
                    "Analysis results ready",
                );
            }
            JobStatus::Failed => {
                let error = observation
                    .error
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                tracing::info!(job_id = %self.job_id, via, error = %error, "Analysis failed");
                self.state.send_modify(|s| {
                    s.status = JobStatus::Failed;
                    s.results_ready = false;
                    s.error = Some(error);
                });
            }
            JobStatus::Completed => {
                // Results not visible yet; keep waiting.
                tracing::debug!(job_id = %self.job_id, via, "Completed without results, still waiting");
                return;
            }
            status => {
                self.state.send_if_modified(|s| {
                    if status.rank() > s.status.rank() {
                        s.status = status;
                        true
                    } else {
                        false
                    }
                });
                return;
            }
        }

        *phase = Phase::Resolved;
        drop(phase);
        self.cancel.cancel();
    }

    fn teardown(&self) {
        let mut phase = self.phase();
        if *phase == Phase::Active {
            *phase = Phase::TornDown;
            tracing::debug!(job_id = %self.job_id, "Status gate torn down");
        }
        drop(phase);
        self.cancel.cancel();
    }
}

/// Watches a single analysis until it is ready, failed, or torn down.
///
/// Dropping the gate tears it down.
pub struct StatusGate {
    shared: Arc<Shared>,
    source: Arc<dyn StatusSource>,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for StatusGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusGate").finish_non_exhaustive()
    }
}

impl StatusGate {
    /// Start watching `config.job_id`.
    ///
    /// Performs an immediate read, then polls every `config.poll_interval`.
    /// When `push` is given and an owner id is configured, also subscribes
    /// to the owner's completion events. Must be called inside a Tokio
    /// runtime.
    pub fn start(
        config: &GateConfig,
        source: Arc<dyn StatusSource>,
        push: Option<Arc<dyn PushSource>>,
    ) -> Result<Self, GateError> {
        let job_id = config
            .job_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(GateError::MissingJobId)?
            .to_string();

        let (state, _) = watch::channel(GateState::default());
        let shared = Arc::new(Shared {
            job_id,
            phase: Mutex::new(Phase::Active),
            state,
            cancel: CancellationToken::new(),
        });

        let mut tasks = vec![tokio::spawn(poll_loop(
            Arc::clone(&shared),
            Arc::clone(&source),
            config.poll_interval,
        ))];

        let owner_id = config.owner_id.trim();
        match push {
            Some(push) if !owner_id.is_empty() => {
                tasks.push(tokio::spawn(push_loop(
                    Arc::clone(&shared),
                    push,
                    owner_id.to_string(),
                    config.reconnect.clone(),
                )));
            }
            Some(_) => {
                tracing::warn!(job_id = %shared.job_id, "No owner id configured, push disabled");
            }
            None => {}
        }

        tracing::info!(
            job_id = %shared.job_id,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            "Status gate started",
        );

        Ok(Self {
            shared,
            source,
            tasks,
        })
    }

    pub fn job_id(&self) -> &str {
        &self.shared.job_id
    }

    /// Current state snapshot.
    pub fn state(&self) -> GateState {
        self.shared.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn watch(&self) -> watch::Receiver<GateState> {
        self.shared.state.subscribe()
    }

    /// False once the gate resolved or was torn down.
    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    /// Read the status once, outside the timer.
    ///
    /// Does not move the poll schedule. A no-op after resolution or
    /// teardown. Read errors are logged and leave the state unchanged.
    pub async fn refresh(&self) -> GateState {
        if self.shared.is_active() {
            match self.source.fetch(&self.shared.job_id).await {
                Ok(snapshot) => observe_snapshot(&self.shared, snapshot, "refresh"),
                Err(e) => {
                    tracing::debug!(job_id = %self.shared.job_id, error = %e, "Manual refresh failed");
                }
            }
        }
        self.state()
    }

    /// Stop both sources. Idempotent; state is frozen afterwards.
    pub fn teardown(&self) {
        self.shared.teardown();
    }

    /// Wait until the gate resolves or is torn down.
    pub async fn resolved(&self) -> GateOutcome {
        self.shared.cancel.cancelled().await;
        GateOutcome::from_state(&self.state())
    }
}

impl Drop for StatusGate {
    fn drop(&mut self) {
        self.teardown();
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn observe_snapshot(shared: &Shared, snapshot: JobSnapshot, via: &'static str) {
    if snapshot.id != shared.job_id {
        tracing::debug!(
            job_id = %shared.job_id,
            got = %snapshot.id,
            "Ignoring snapshot for another analysis",
        );
        return;
    }
    shared.observe(Observation::from(snapshot), via);
}

async fn poll_loop(shared: Arc<Shared>, source: Arc<dyn StatusSource>, poll_interval: Duration) {
    let cancel = shared.cancel.clone();
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = source.fetch(&shared.job_id) => result,
        };

        match result {
            Ok(snapshot) => observe_snapshot(&shared, snapshot, "poll"),
            Err(e) => {
                tracing::debug!(job_id = %shared.job_id, error = %e, "Status poll failed, retrying next tick");
            }
        }
    }

    tracing::debug!(job_id = %shared.job_id, "Poll loop stopped");
}

async fn push_loop(
    shared: Arc<Shared>,
    push: Arc<dyn PushSource>,
    owner_id: String,
    reconnect: ReconnectConfig,
) {
    let cancel = shared.cancel.clone();
    let mut delay = reconnect.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = push.connect(&owner_id) => result,
        };

        match connected {
            Ok(mut events) => {
                tracing::debug!(job_id = %shared.job_id, attempt, "Push subscription established");
                attempt = 0;
                delay = reconnect.initial_delay;

                loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        next = events.next() => next,
                    };

                    match next {
                        Some(Ok(event)) if event.job_id == shared.job_id => {
                            shared.observe(Observation::from(event), "push");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!(job_id = %shared.job_id, error = %e, "Push stream error");
                            break;
                        }
                        None => {
                            tracing::debug!(job_id = %shared.job_id, "Push stream closed");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::debug!(
                    job_id = %shared.job_id,
                    attempt,
                    error = %e,
                    "Push connect failed, polling continues",
                );
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = next_delay(delay, &reconnect);
    }

    tracing::debug!(job_id = %shared.job_id, "Push loop stopped");
}
