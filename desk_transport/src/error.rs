use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("device not found: {0}")]
    NotFound(String),
    #[error("link disconnected")]
    Disconnected,
    #[error("write rejected: {0}")]
    WriteRejected(String),
    #[error("endpoint missing: {0}")]
    EndpointMissing(&'static str),
}

pub type Result<T> = std::result::Result<T, TransportError>;
