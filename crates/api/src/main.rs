use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use medassist_api::config::{AnalyzerMode, ServerConfig, StoreMode};
use medassist_api::engine::{AnalysisDispatcher, Analyzer, HttpAnalyzer, StubAnalyzer};
use medassist_api::router::build_app_router;
use medassist_api::state::AppState;
use medassist_db::{JobStore, MemoryJobStore, PgJobStore};
use medassist_events::CompletionNotifier;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medassist_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Job store ---
    let store: Arc<dyn JobStore> = match &config.store {
        StoreMode::Postgres { database_url } => {
            let pool = medassist_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            medassist_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            medassist_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgJobStore::new(pool))
        }
        StoreMode::Memory => {
            tracing::warn!("JOB_STORE=memory: using the in-memory stub store, data is not persisted");
            Arc::new(MemoryJobStore::new())
        }
    };

    // --- Analyzer ---
    let analyzer: Arc<dyn Analyzer> = match &config.analyzer {
        AnalyzerMode::Http {
            url,
            api_key,
            timeout_secs,
        } => {
            tracing::info!(url = %url, timeout_secs, "Using HTTP analyzer");
            Arc::new(
                HttpAnalyzer::new(url.clone(), api_key.clone(), Duration::from_secs(*timeout_secs))
                    .expect("Failed to build analyzer HTTP client"),
            )
        }
        AnalyzerMode::Stub => {
            tracing::warn!("ANALYZER_MODE=stub: results are canned, no model is consulted");
            Arc::new(StubAnalyzer)
        }
    };

    // --- Completion notifier ---
    let notifier = Arc::new(CompletionNotifier::new());

    // --- Dispatcher ---
    let dispatcher_cancel = CancellationToken::new();
    let dispatcher = AnalysisDispatcher::new(
        Arc::clone(&store),
        analyzer,
        Arc::clone(&notifier),
    )
    .with_poll_interval(config.dispatch_interval());
    let cancel = dispatcher_cancel.clone();
    let dispatcher_handle = tokio::spawn(async move {
        dispatcher.run(cancel).await;
    });

    // --- App state ---
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        notifier: Arc::clone(&notifier),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    dispatcher_cancel.cancel();
    let _ = tokio::time::timeout(config.shutdown_timeout(), dispatcher_handle).await;
    tracing::info!("Analysis dispatcher stopped");

    let count = notifier.connection_count().await;
    tracing::info!(count, "Closing remaining push subscriptions");
    notifier.shutdown_all().await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
