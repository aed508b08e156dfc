//! Maps `Box<dyn Error>` from the transport boundary to typed `DeskError`.
//!
//! The traits in `desk_traits` use `Box<dyn Error + Send + Sync>` so any
//! backend can plug in; every such error is a connection fault from the
//! controller's point of view. With the `transport-errors` feature the
//! simulated backend's `TransportError` is downcast for a precise message.

use crate::error::DeskError;

/// Map a trait-boundary error to `DeskError::ConnectionFault`.
pub fn map_transport_error(e: &(dyn std::error::Error + 'static)) -> DeskError {
    #[cfg(feature = "transport-errors")]
    {
        use desk_transport::error::TransportError;
        if let Some(te) = e.downcast_ref::<TransportError>() {
            return match te {
                TransportError::Disconnected => DeskError::ConnectionFault("link dropped".into()),
                TransportError::NotFound(id) => {
                    DeskError::ConnectionFault(format!("device {id} not found"))
                }
                other => DeskError::ConnectionFault(other.to_string()),
            };
        }
    }

    DeskError::ConnectionFault(e.to_string())
}
