use crate::DeviceId;
use thiserror::Error;

pub type Result<T, E = InventoryError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("http error: {0}")]
    Http(String),
    #[error("unexpected status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("device not found: {0}")]
    NotFound(DeviceId),
    #[error("operation not supported on this backend: {0}")]
    Unsupported(&'static str),
}
