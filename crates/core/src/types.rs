/// Opaque analysis identifier (UUID v7 rendered as text).
pub type JobId = String;

/// Identifier of the doctor owning an analysis. Used as the push routing key.
pub type OwnerId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh, time-ordered job identifier.
pub fn new_job_id() -> JobId {
    uuid::Uuid::now_v7().to_string()
}
