use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeskError {
    /// Decode-time failure; the sample is dropped and the link stays up.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    /// Write or link failure; latches the fault flag and forces a reconnect.
    #[error("connection fault: {0}")]
    ConnectionFault(String),
    #[error("invalid calibration: max_height ({max}) must exceed base_height ({base})")]
    CalibrationInvalid { base: f64, max: f64 },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing transport")]
    MissingTransport,
    #[error("missing calibration")]
    MissingCalibration,
    #[error("missing device id")]
    MissingDeviceId,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

impl From<BuildError> for DeskError {
    fn from(e: BuildError) -> Self {
        DeskError::Config(e.to_string())
    }
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
