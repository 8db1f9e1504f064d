use std::time::Duration;

/// Which [`JobStore`](medassist_db::JobStore) implementation to run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreMode {
    /// Postgres via `DATABASE_URL`.
    Postgres { database_url: String },
    /// Process-local stub store. Data is lost on restart.
    Memory,
}

/// Default deadline for one analyzer call.
pub const DEFAULT_ANALYZER_TIMEOUT_SECS: u64 = 120;

/// Which analyzer the dispatcher calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerMode {
    /// POST cases to an external language-model gateway.
    Http {
        url: String,
        api_key: Option<String>,
        /// Per-call deadline; a gateway that never answers fails the job.
        timeout_secs: u64,
    },
    /// Deterministic canned results. Development and demos only.
    Stub,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the
/// Postgres URL, which is required unless `JOB_STORE=memory`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long to wait for background services on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Job store backend.
    pub store: StoreMode,
    /// Analyzer backend.
    pub analyzer: AnalyzerMode,
    /// Dispatcher poll period in milliseconds (default: `1000`).
    pub dispatch_interval_ms: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:8081`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `JOB_STORE`             | `postgres`                 |
    /// | `DATABASE_URL`          | required for `postgres`    |
    /// | `ANALYZER_MODE`         | `http`                     |
    /// | `ANALYZER_URL`          | required for `http`        |
    /// | `ANALYZER_API_KEY`      | unset                      |
    /// | `ANALYZER_TIMEOUT_SECS` | `120`                      |
    /// | `DISPATCH_INTERVAL_MS`  | `1000`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:8081".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let store = match std::env::var("JOB_STORE").as_deref() {
            Ok("memory") => StoreMode::Memory,
            Ok("postgres") | Err(_) => StoreMode::Postgres {
                database_url: std::env::var("DATABASE_URL")
                    .expect("DATABASE_URL must be set when JOB_STORE=postgres"),
            },
            Ok(other) => panic!("JOB_STORE must be 'postgres' or 'memory', got '{other}'"),
        };

        let analyzer = match std::env::var("ANALYZER_MODE").as_deref() {
            Ok("stub") => AnalyzerMode::Stub,
            Ok("http") | Err(_) => AnalyzerMode::Http {
                url: std::env::var("ANALYZER_URL")
                    .expect("ANALYZER_URL must be set when ANALYZER_MODE=http"),
                api_key: std::env::var("ANALYZER_API_KEY").ok().filter(|k| !k.is_empty()),
                timeout_secs: std::env::var("ANALYZER_TIMEOUT_SECS")
                    .unwrap_or_else(|_| DEFAULT_ANALYZER_TIMEOUT_SECS.to_string())
                    .parse()
                    .expect("ANALYZER_TIMEOUT_SECS must be a valid u64"),
            },
            Ok(other) => panic!("ANALYZER_MODE must be 'http' or 'stub', got '{other}'"),
        };

        let dispatch_interval_ms: u64 = std::env::var("DISPATCH_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("DISPATCH_INTERVAL_MS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            store,
            analyzer,
            dispatch_interval_ms,
        }
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Split a comma-separated origin list, dropping blanks.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_blank_entries_dropped() {
        assert_eq!(
            parse_origins(" http://a.test , ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert!(parse_origins("").is_empty());
    }
}
