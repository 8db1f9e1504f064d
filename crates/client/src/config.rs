use std::time::Duration;

use crate::reconnect::ReconnectConfig;

/// Default poll period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Parameters for one [`StatusGate`](crate::StatusGate).
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Base URL of the API, e.g. `http://localhost:3000`.
    pub api_base: String,
    /// Owner (doctor) whose push room to join.
    pub owner_id: String,
    /// Analysis to watch. Required; `None` or blank fails `start`.
    pub job_id: Option<String>,
    /// Fixed poll period. No backoff is applied.
    pub poll_interval: Duration,
    /// Backoff for re-opening the push subscription.
    pub reconnect: ReconnectConfig,
}

impl GateConfig {
    pub fn new(api_base: impl Into<String>, owner_id: impl Into<String>, job_id: Option<String>) -> Self {
        Self {
            api_base: api_base.into(),
            owner_id: owner_id.into(),
            job_id,
            poll_interval: DEFAULT_POLL_INTERVAL,
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Load from environment variables with defaults.
    ///
    /// | Env Var                      | Default                 |
    /// |------------------------------|-------------------------|
    /// | `MEDASSIST_API_BASE`         | `http://localhost:3000` |
    /// | `MEDASSIST_OWNER_ID`         | empty (push disabled)   |
    /// | `MEDASSIST_POLL_INTERVAL_MS` | `3000`                  |
    pub fn from_env(job_id: Option<String>) -> Self {
        let api_base =
            std::env::var("MEDASSIST_API_BASE").unwrap_or_else(|_| "http://localhost:3000".into());
        let owner_id = std::env::var("MEDASSIST_OWNER_ID").unwrap_or_default();
        let poll_interval_ms: u64 = std::env::var("MEDASSIST_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("MEDASSIST_POLL_INTERVAL_MS must be a valid u64");

        Self::new(api_base, owner_id, job_id).with_poll_interval(Duration::from_millis(poll_interval_ms))
    }
}
