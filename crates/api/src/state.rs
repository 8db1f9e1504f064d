use std::sync::Arc;

use medassist_db::JobStore;
use medassist_events::CompletionNotifier;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Job Store (Postgres or the in-memory stub, per `JOB_STORE`).
    pub store: Arc<dyn JobStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Owner-scoped completion push registry.
    pub notifier: Arc<CompletionNotifier>,
}
