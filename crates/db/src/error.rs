use medassist_core::error::CoreError;

/// Errors surfaced by [`JobStore`](crate::JobStore) implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A domain rule was violated (unknown id, illegal transition, bad input).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The database rejected or failed the query.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
