//! Behavioural tests for the status gate, driven by scripted sources on a
//! paused clock so every tick is deterministic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use futures::StreamExt;
use medassist_client::{
    GateConfig, GateError, GateOutcome, PushSource, PushSubscription, SourceError, StatusGate,
    StatusSource,
};
use medassist_core::analysis::JobSnapshot;
use medassist_core::job_events::{CompletionEvent, CompletionKind};
use medassist_core::status::JobStatus;
use tokio::sync::mpsc;

const INTERVAL: Duration = Duration::from_millis(3000);

#[derive(Clone)]
enum Step {
    Report(JobStatus, usize, Option<f64>),
    Unavailable,
}

fn pending() -> Step {
    Step::Report(JobStatus::Pending, 0, None)
}

fn processing() -> Step {
    Step::Report(JobStatus::Processing, 0, None)
}

fn completed(count: usize, confidence: f64) -> Step {
    Step::Report(JobStatus::Completed, count, Some(confidence))
}

fn failed() -> Step {
    Step::Report(JobStatus::Failed, 0, None)
}

/// Replays `steps` in order, repeating the last one forever.
struct ScriptedSource {
    steps: Vec<Step>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch(&self, job_id: &str) -> Result<JobSnapshot, SourceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps[n.min(self.steps.len() - 1)].clone();
        match step {
            Step::Report(status, result_count, aggregate_confidence) => Ok(JobSnapshot {
                id: job_id.to_string(),
                status,
                result_count,
                aggregate_confidence,
                title: "Chest pain".into(),
                owner_id: "doc-7".into(),
            }),
            Step::Unavailable => Err(SourceError::Status { status: 503 }),
        }
    }
}

/// Push source fed from a channel. Only the first connect gets the channel;
/// later reconnects get a silent stream.
struct ChannelPush {
    rx: Mutex<Option<mpsc::UnboundedReceiver<CompletionEvent>>>,
    connects: AtomicUsize,
}

impl ChannelPush {
    fn new() -> (Arc<Self>, mpsc::UnboundedSender<CompletionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let push = Arc::new(Self {
            rx: Mutex::new(Some(rx)),
            connects: AtomicUsize::new(0),
        });
        (push, tx)
    }
}

#[async_trait]
impl PushSource for ChannelPush {
    async fn connect(&self, _owner_id: &str) -> Result<PushSubscription, SourceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let rx = self.rx.lock().unwrap().take();
        match rx {
            Some(rx) => Ok(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (Ok(event), rx))
            })
            .boxed()),
            None => Ok(futures::stream::pending().boxed()),
        }
    }
}

/// Push source whose connection attempts always fail.
#[derive(Default)]
struct UnreachablePush {
    connects: AtomicUsize,
}

#[async_trait]
impl PushSource for UnreachablePush {
    async fn connect(&self, _owner_id: &str) -> Result<PushSubscription, SourceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Err(SourceError::Push("connection refused".into()))
    }
}

fn config(job_id: Option<&str>) -> GateConfig {
    GateConfig::new("http://api.test", "doc-7", job_id.map(String::from)).with_poll_interval(INTERVAL)
}

fn completion(job_id: &str, result_count: usize) -> CompletionEvent {
    CompletionEvent {
        kind: CompletionKind::Completed,
        job_id: job_id.into(),
        owner_id: "doc-7".into(),
        title: "Chest pain".into(),
        confidence: Some(0.9),
        result_count,
        error: None,
        timestamp: chrono::Utc::now(),
    }
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// ---------------------------------------------------------------------------
// Test: pending, processing, completed resolves ready on the third read
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn resolves_ready_after_scripted_sequence() {
    let source = ScriptedSource::new(vec![pending(), processing(), completed(7, 0.83)]);
    let gate = StatusGate::start(&config(Some("A1")), source.clone(), None).unwrap();

    let outcome = gate.resolved().await;
    assert_eq!(
        outcome,
        GateOutcome::Ready {
            result_count: 7,
            aggregate_confidence: Some(0.83)
        }
    );
    assert_eq!(source.calls(), 3);

    let state = gate.state();
    assert_eq!(state.status, JobStatus::Completed);
    assert!(state.results_ready);
    assert!(state.error.is_none());
    assert!(!gate.is_active());

    // No polling after resolution.
    advance(30_000).await;
    assert_eq!(source.calls(), 3);
}

// ---------------------------------------------------------------------------
// Test: failure on the very first read stops everything
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failure_on_first_read_stops_polling() {
    let source = ScriptedSource::new(vec![failed()]);
    let gate = StatusGate::start(&config(Some("A1")), source.clone(), None).unwrap();

    assert_matches!(gate.resolved().await, GateOutcome::Failed { error } if !error.is_empty());

    let state = gate.state();
    assert_eq!(state.status, JobStatus::Failed);
    assert!(!state.results_ready);
    assert!(state.error.is_some());

    advance(30_000).await;
    assert_eq!(source.calls(), 1);
}

// ---------------------------------------------------------------------------
// Test: a missing or blank job id is rejected without any network call
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn missing_job_id_makes_no_calls() {
    let source = ScriptedSource::new(vec![pending()]);
    let (push, _tx) = ChannelPush::new();

    for job_id in [None, Some(""), Some("   ")] {
        let result = StatusGate::start(
            &config(job_id),
            source.clone(),
            Some(push.clone() as Arc<dyn PushSource>),
        );
        assert_matches!(result, Err(GateError::MissingJobId));
    }

    advance(10_000).await;
    assert_eq!(source.calls(), 0);
    assert_eq!(push.connects.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Test: a push event resolves the gate and stops polling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn push_event_resolves_and_stops_polling() {
    let source = ScriptedSource::new(vec![processing()]);
    let (push, tx) = ChannelPush::new();
    let gate = StatusGate::start(
        &config(Some("A1")),
        source.clone(),
        Some(push.clone() as Arc<dyn PushSource>),
    )
    .unwrap();

    advance(100).await;
    assert_eq!(gate.state().status, JobStatus::Processing);

    // Events for other analyses of the same owner are ignored.
    tx.send(completion("B2", 4)).unwrap();
    advance(100).await;
    assert!(gate.is_active());
    assert!(!gate.state().results_ready);

    tx.send(completion("A1", 5)).unwrap();
    assert_eq!(
        gate.resolved().await,
        GateOutcome::Ready {
            result_count: 5,
            aggregate_confidence: Some(0.9)
        }
    );

    let calls = source.calls();
    advance(30_000).await;
    assert_eq!(source.calls(), calls);
    assert_eq!(push.connects.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Test: an unreachable push channel does not prevent resolution by poll
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn poll_resolves_when_push_is_unreachable() {
    let source = ScriptedSource::new(vec![pending(), processing(), completed(2, 0.6)]);
    let push = Arc::new(UnreachablePush::default());
    let gate = StatusGate::start(
        &config(Some("A1")),
        source.clone(),
        Some(push.clone() as Arc<dyn PushSource>),
    )
    .unwrap();

    assert_matches!(gate.resolved().await, GateOutcome::Ready { result_count: 2, .. });
    assert!(push.connects.load(Ordering::SeqCst) >= 1);

    let connects = push.connects.load(Ordering::SeqCst);
    advance(120_000).await;
    assert_eq!(push.connects.load(Ordering::SeqCst), connects);
}

// ---------------------------------------------------------------------------
// Test: poll errors are transient
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn transient_poll_errors_are_retried() {
    let source = ScriptedSource::new(vec![Step::Unavailable, Step::Unavailable, completed(1, 0.7)]);
    let gate = StatusGate::start(&config(Some("A1")), source.clone(), None).unwrap();

    advance(100).await;
    assert!(gate.is_active());
    assert!(gate.state().error.is_none());

    assert_matches!(gate.resolved().await, GateOutcome::Ready { result_count: 1, .. });
    assert_eq!(source.calls(), 3);
}

// ---------------------------------------------------------------------------
// Test: completed with zero visible results keeps waiting
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn completed_without_results_is_not_ready() {
    let source = ScriptedSource::new(vec![
        Step::Report(JobStatus::Completed, 0, None),
        Step::Report(JobStatus::Completed, 0, None),
        completed(4, 0.5),
    ]);
    let gate = StatusGate::start(&config(Some("A1")), source.clone(), None).unwrap();

    advance(100).await;
    let state = gate.state();
    assert_eq!(state.status, JobStatus::Pending);
    assert!(!state.results_ready);
    assert!(gate.is_active());

    assert_matches!(gate.resolved().await, GateOutcome::Ready { result_count: 4, .. });
    assert_eq!(source.calls(), 3);
}

// ---------------------------------------------------------------------------
// Test: mirrored status never moves backwards
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn mirrored_status_is_monotonic() {
    let source = ScriptedSource::new(vec![processing(), pending(), processing(), completed(2, 0.8)]);
    let gate = StatusGate::start(&config(Some("A1")), source.clone(), None).unwrap();

    let mut rx = gate.watch();
    let recorder = tokio::spawn(async move {
        let mut seen = vec![rx.borrow_and_update().status];
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().status;
            if seen.last() != Some(&status) {
                seen.push(status);
            }
        }
        seen
    });

    // t=3100: the stale "pending" read has been applied and ignored.
    advance(3100).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(gate.state().status, JobStatus::Processing);

    assert_matches!(gate.resolved().await, GateOutcome::Ready { .. });
    drop(gate);

    let seen = recorder.await.unwrap();
    assert!(seen.windows(2).all(|w| w[0].rank() <= w[1].rank()), "{seen:?}");
    assert_eq!(seen.last(), Some(&JobStatus::Completed));
}

// ---------------------------------------------------------------------------
// Test: teardown is idempotent and freezes state
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn teardown_is_idempotent() {
    let source = ScriptedSource::new(vec![processing(), completed(3, 0.9)]);
    let (push, tx) = ChannelPush::new();
    let gate = StatusGate::start(
        &config(Some("A1")),
        source.clone(),
        Some(push as Arc<dyn PushSource>),
    )
    .unwrap();

    advance(100).await;
    gate.teardown();
    gate.teardown();

    assert!(!gate.is_active());
    assert_eq!(gate.resolved().await, GateOutcome::Cancelled);

    // Neither a late push nor the timer changes anything.
    let _ = tx.send(completion("A1", 3));
    advance(30_000).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(gate.state().status, JobStatus::Processing);
    assert!(!gate.state().results_ready);

    // Refresh after teardown does not read.
    gate.refresh().await;
    assert_eq!(source.calls(), 1);
}

// ---------------------------------------------------------------------------
// Test: teardown before the first read means no reads at all
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn teardown_before_first_read_makes_no_calls() {
    let source = ScriptedSource::new(vec![processing()]);
    let gate = StatusGate::start(&config(Some("A1")), source.clone(), None).unwrap();
    gate.teardown();

    advance(30_000).await;
    assert_eq!(source.calls(), 0);
}

// ---------------------------------------------------------------------------
// Test: dropping the gate tears it down
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn drop_stops_polling() {
    let source = ScriptedSource::new(vec![processing()]);
    let gate = StatusGate::start(&config(Some("A1")), source.clone(), None).unwrap();

    advance(100).await;
    drop(gate);

    advance(30_000).await;
    assert_eq!(source.calls(), 1);
}

// ---------------------------------------------------------------------------
// Test: manual refresh reads once and keeps the poll schedule
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn refresh_does_not_shift_schedule() {
    let source = ScriptedSource::new(vec![pending(), processing(), processing(), processing()]);
    let gate = StatusGate::start(&config(Some("A1")), source.clone(), None).unwrap();

    // t=0 immediate read.
    advance(1000).await;
    assert_eq!(source.calls(), 1);

    // t=1000 manual read.
    let state = gate.refresh().await;
    assert_eq!(state.status, JobStatus::Processing);
    assert_eq!(source.calls(), 2);

    // t=3100: the scheduled tick at t=3000 fired exactly once.
    advance(2100).await;
    assert_eq!(source.calls(), 3);

    // t=6100: next tick at t=6000, not t=7000.
    advance(3000).await;
    assert_eq!(source.calls(), 4);
}

// ---------------------------------------------------------------------------
// Test: a failed push event carries its reason
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failed_push_event_carries_reason() {
    let source = ScriptedSource::new(vec![processing()]);
    let (push, tx) = ChannelPush::new();
    let gate = StatusGate::start(
        &config(Some("A1")),
        source,
        Some(push as Arc<dyn PushSource>),
    )
    .unwrap();

    advance(100).await;
    tx.send(CompletionEvent {
        kind: CompletionKind::Failed,
        confidence: None,
        result_count: 0,
        error: Some("model overloaded".into()),
        ..completion("A1", 0)
    })
    .unwrap();

    assert_eq!(
        gate.resolved().await,
        GateOutcome::Failed {
            error: "model overloaded".into()
        }
    );
    assert_eq!(gate.state().error.as_deref(), Some("model overloaded"));
}
