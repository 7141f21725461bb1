use thiserror::Error;

pub type Result<T, E = SinkError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("invalid point: {0}")]
    InvalidPoint(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("write rejected with status {code}: {body}")]
    Rejected { code: u16, body: String },
}

/// Final outcome of a retried write that never succeeded.
#[derive(Debug, Error)]
#[error("write failed after {attempts} attempt(s): {last}")]
pub struct RetryError {
    pub attempts: u32,
    pub last: SinkError,
}
