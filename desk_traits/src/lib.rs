//! Collaborator seams for the desk controller.
//!
//! The transport that performs discovery, pairing, and raw byte delivery is
//! an external collaborator; these traits are the only surface the core sees.
//! Errors crossing the boundary are boxed so any backend can plug in.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Callback invoked by the transport for every telemetry notification.
///
/// Implementations call it from their own delivery context; it must return
/// promptly.
pub type TelemetrySink = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Establishes logical connections to a device by identifier.
pub trait Transport: Send {
    fn connect(
        &mut self,
        device_id: &str,
    ) -> Result<Box<dyn Connection>, Box<dyn std::error::Error + Send + Sync>>;
}

/// One live link to a device.
pub trait Connection: Send {
    /// Resolve the control endpoint and return a writer for command frames.
    fn open_control_channel(
        &mut self,
    ) -> Result<Box<dyn ControlWriter>, Box<dyn std::error::Error + Send + Sync>>;
    /// Resolve the telemetry endpoint and start delivering notifications to `sink`.
    fn subscribe_telemetry(
        &mut self,
        sink: TelemetrySink,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn disconnect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// False once the link has dropped underneath us.
    fn is_connected(&self) -> bool;
}

/// Writes command frames to the control endpoint.
pub trait ControlWriter: Send {
    fn write(&mut self, frame: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
