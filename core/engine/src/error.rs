use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("review count must be non-negative, got {0}")]
    PreconditionViolation(i64),
    #[error("invalid review schedule: {0}")]
    InvalidSchedule(String),
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    /// No JSON value of the expected shape could be recovered from the reply.
    #[error("malformed model response: {source} (reply began with {excerpt:?})")]
    MalformedResponse {
        #[source]
        source: serde_json::Error,
        excerpt: String,
    },
}
