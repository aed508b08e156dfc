//! Session manager: owns at most one live link to the desk.
//!
//! Connecting resolves the control and telemetry endpoints, subscribes to
//! notifications, and writes a handshake; any failure tears the partial link
//! down again. `send` never retries: a failed write latches the sticky fault
//! flag and the control loop drives reconnection.
//!
//! The telemetry callback runs on the transport's delivery context. It only
//! decodes and pushes into a bounded queue; it never blocks and never takes
//! the reconciler lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel as xch;
use desk_traits::{Connection, ControlWriter, TelemetrySink, Transport};
use tracing::{debug, info, trace, warn};

use crate::codec::{Frame, TelemetryLayout, TelemetryReading, decode_telemetry};
use crate::config::HandshakeKind;
use crate::error::DeskError;
use crate::state::LinkStatus;
use crate::transport_error::map_transport_error;

struct Link {
    connection: Box<dyn Connection>,
    writer: Box<dyn ControlWriter>,
}

pub struct SessionManager {
    transport: Box<dyn Transport>,
    device_id: String,
    layout: TelemetryLayout,
    handshake: HandshakeKind,
    link: Option<Link>,
    telemetry_tx: xch::Sender<TelemetryReading>,
    status: Arc<LinkStatus>,
    shutdown: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

fn fault(e: Box<dyn std::error::Error + Send + Sync>) -> DeskError {
    map_transport_error(&*e)
}

impl SessionManager {
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        device_id: String,
        layout: TelemetryLayout,
        handshake: HandshakeKind,
        telemetry_tx: xch::Sender<TelemetryReading>,
        status: Arc<LinkStatus>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            device_id,
            layout,
            handshake,
            link: None,
            telemetry_tx,
            status,
            shutdown,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Telemetry samples discarded so far (malformed or queue full).
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Open a fresh link. Leaves no partial state behind on failure.
    pub fn connect(&mut self) -> Result<(), DeskError> {
        self.teardown();
        let mut connection = self.transport.connect(&self.device_id).map_err(fault)?;
        match self.open(connection.as_mut()) {
            Ok(writer) => {
                self.link = Some(Link { connection, writer });
                self.status.set_connected(true);
                info!(device_id = %self.device_id, "connected");
                Ok(())
            }
            Err(e) => {
                if let Err(de) = connection.disconnect() {
                    debug!(error = %de, "disconnect after failed connect");
                }
                Err(e)
            }
        }
    }

    fn open(&self, connection: &mut dyn Connection) -> Result<Box<dyn ControlWriter>, DeskError> {
        let mut writer = connection.open_control_channel().map_err(fault)?;
        connection
            .subscribe_telemetry(telemetry_sink(
                self.telemetry_tx.clone(),
                self.layout,
                self.dropped.clone(),
            ))
            .map_err(fault)?;
        for op in self.handshake.frames() {
            writer.write(Frame::encode(*op).as_bytes()).map_err(fault)?;
        }
        Ok(writer)
    }

    /// Disconnect and release the link. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.connection.disconnect() {
                debug!(error = %e, "disconnect failed");
            }
            info!(device_id = %self.device_id, "link torn down");
        }
        self.status.set_connected(false);
    }

    /// Write one frame to the control endpoint.
    pub fn send(&mut self, frame: &Frame) -> Result<(), DeskError> {
        let res = match self.link.as_mut() {
            Some(link) => {
                trace!(opcode = ?frame.opcode(), "send");
                link.writer.write(frame.as_bytes()).map_err(fault)
            }
            None => Err(DeskError::ConnectionFault("not connected".into())),
        };
        if let Err(e) = &res {
            self.on_fault(e);
        }
        res
    }

    /// Latch a fault if the transport reports the link has dropped.
    pub fn check_link(&mut self) -> Result<(), DeskError> {
        if let Some(link) = &self.link
            && !link.connection.is_connected()
        {
            let e = DeskError::ConnectionFault("link dropped".into());
            self.on_fault(&e);
            return Err(e);
        }
        Ok(())
    }

    fn on_fault(&self, e: &DeskError) {
        if self.shutdown.load(Ordering::Relaxed) {
            debug!(error = %e, "write failed during shutdown");
            return;
        }
        if self.status.latch_fault() {
            warn!(error = %e, device_id = %self.device_id, "connection fault latched");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Build the notification callback handed to the transport.
fn telemetry_sink(
    tx: xch::Sender<TelemetryReading>,
    layout: TelemetryLayout,
    dropped: Arc<AtomicU64>,
) -> TelemetrySink {
    Box::new(move |bytes: &[u8]| match decode_telemetry(bytes, layout) {
        Ok(reading) => {
            if let Err(xch::TrySendError::Full(_)) = tx.try_send(reading) {
                dropped.fetch_add(1, Ordering::Relaxed);
                trace!("telemetry queue full; sample dropped");
            }
        }
        Err(e) => {
            dropped.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, len = bytes.len(), "discarding telemetry sample");
        }
    })
}
