/// Job identifiers as issued by the shop API.
pub type JobId = i64;

/// Stable per-session identifier of a staged part row.
pub type UniqueNumber = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
