//! Watch one analysis until its results are ready.
//!
//! Usage: `medassist-watch <job-id>`. Connection settings come from the
//! `MEDASSIST_*` environment variables.

use std::process::ExitCode;
use std::sync::Arc;

use medassist_client::{
    GateConfig, GateError, GateOutcome, HttpStatusSource, PushSource, StatusGate, WsPushSource,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: medassist-watch <job-id>";

/// What to print on stderr when the gate refuses to start.
fn usage_hint(err: &GateError) -> &'static str {
    match err {
        GateError::MissingJobId => USAGE,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medassist_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GateConfig::from_env(std::env::args().nth(1));

    let source = match HttpStatusSource::new(config.api_base.clone()) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };
    let push: Arc<dyn PushSource> = Arc::new(WsPushSource::new(config.api_base.clone()));

    let gate = match StatusGate::start(&config, source, Some(push)) {
        Ok(gate) => gate,
        Err(e) => {
            tracing::error!(error = %e, "Cannot start status gate");
            eprintln!("{}", usage_hint(&e));
            return ExitCode::FAILURE;
        }
    };

    let mut updates = gate.watch();
    let outcome = loop {
        tokio::select! {
            outcome = gate.resolved() => break outcome,
            changed = updates.changed() => {
                if changed.is_err() {
                    break GateOutcome::Cancelled;
                }
                let status = updates.borrow_and_update().status;
                tracing::info!(job_id = gate.job_id(), %status, "Status changed");
            }
            _ = tokio::signal::ctrl_c() => {
                gate.teardown();
            }
        }
    };

    match outcome {
        GateOutcome::Ready {
            result_count,
            aggregate_confidence,
        } => {
            tracing::info!(
                job_id = gate.job_id(),
                result_count,
                confidence = aggregate_confidence,
                "Results ready",
            );
            ExitCode::SUCCESS
        }
        GateOutcome::Failed { error } => {
            tracing::error!(job_id = gate.job_id(), %error, "Analysis failed");
            ExitCode::FAILURE
        }
        GateOutcome::Cancelled => {
            tracing::warn!(job_id = gate.job_id(), "Watch cancelled");
            ExitCode::FAILURE
        }
    }
}
