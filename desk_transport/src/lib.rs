//! In-process simulated desk that speaks the wire protocol.
//!
//! `SimulatedDesk` implements the transport traits: it moves a virtual
//! actuator while Raise/Lower frames keep arriving, coasts a little after
//! Stop, and answers every accepted frame with a telemetry notification.
//! Faults (dropped link, rejected writes, missing endpoint) can be injected
//! from a cloned handle.
pub mod error;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use desk_traits::{Connection, ControlWriter, TelemetrySink, Transport};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};

const FRAME_LEN: usize = 6;
const HEADER: u8 = 0xF1;
const FOOTER: u8 = 0x7E;

const OP_RAISE: u8 = 0x01;
const OP_LOWER: u8 = 0x02;
const OP_QUERY: u8 = 0x07;
const OP_STOP: u8 = 0x2B;

/// Physical and wire parameters of the simulated desk.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub device_id: String,
    /// Starting height in tenths of the native unit.
    pub initial_height_tenths: i16,
    pub min_height_tenths: i16,
    pub max_height_tenths: i16,
    /// Travel per accepted Raise/Lower frame.
    pub step_tenths: i16,
    /// Extra travel in the last direction after a Stop.
    pub coast_tenths: i16,
    /// Byte offset of the big-endian height inside a notification.
    pub height_offset: usize,
    /// Total notification length.
    pub notification_len: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            device_id: "SIM-DESK".to_string(),
            initial_height_tenths: 6500,
            min_height_tenths: 6200,
            max_height_tenths: 12700,
            step_tenths: 70,
            coast_tenths: 10,
            height_offset: 4,
            notification_len: 6,
        }
    }
}

#[derive(Default)]
struct SimState {
    height: i16,
    direction: i8,
    linked: bool,
    fail_writes: bool,
    hide_telemetry: bool,
    sink: Option<Arc<TelemetrySink>>,
    frames: Vec<[u8; FRAME_LEN]>,
    connects: u32,
}

/// Cloneable handle to one simulated desk; every clone shares the same state.
#[derive(Clone)]
pub struct SimulatedDesk {
    cfg: Arc<SimConfig>,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedDesk {
    pub fn new(cfg: SimConfig) -> Self {
        let state = SimState {
            height: cfg
                .initial_height_tenths
                .clamp(cfg.min_height_tenths, cfg.max_height_tenths),
            ..SimState::default()
        };
        Self {
            cfg: Arc::new(cfg),
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn height_tenths(&self) -> i16 {
        self.lock().height
    }

    pub fn is_linked(&self) -> bool {
        self.lock().linked
    }

    /// Number of successful connects so far.
    pub fn connects(&self) -> u32 {
        self.lock().connects
    }

    /// Opcodes of every frame the desk accepted, in arrival order.
    pub fn received_opcodes(&self) -> Vec<u8> {
        self.lock().frames.iter().map(|f| f[2]).collect()
    }

    /// Drop the link as if the desk went out of range.
    pub fn drop_link(&self) {
        let mut st = self.lock();
        st.linked = false;
        st.sink = None;
        debug!("sim link dropped");
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Hide the telemetry endpoint so subscribing fails.
    pub fn set_hide_telemetry(&self, hide: bool) {
        self.lock().hide_telemetry = hide;
    }

    fn notification(&self, height: i16) -> Vec<u8> {
        let len = self.cfg.notification_len.max(self.cfg.height_offset + 2);
        let mut buf = vec![0u8; len];
        let off = self.cfg.height_offset;
        buf[off..off + 2].copy_from_slice(&height.to_be_bytes());
        buf
    }

    fn accept(&self, frame: &[u8]) -> Result<()> {
        let bytes: [u8; FRAME_LEN] = frame
            .try_into()
            .map_err(|_| TransportError::WriteRejected(format!("length {}", frame.len())))?;
        if bytes[0] != HEADER || bytes[1] != HEADER || bytes[5] != FOOTER {
            return Err(TransportError::WriteRejected("bad framing".into()));
        }

        let (height, sink) = {
            let mut st = self.lock();
            if !st.linked {
                return Err(TransportError::Disconnected);
            }
            if st.fail_writes {
                return Err(TransportError::WriteRejected("injected write failure".into()));
            }
            let cfg = &self.cfg;
            match bytes[2] {
                OP_RAISE => {
                    st.direction = 1;
                    st.height = st.height.saturating_add(cfg.step_tenths);
                }
                OP_LOWER => {
                    st.direction = -1;
                    st.height = st.height.saturating_sub(cfg.step_tenths);
                }
                OP_STOP => {
                    let coast = cfg.coast_tenths.saturating_mul(i16::from(st.direction));
                    st.height = st.height.saturating_add(coast);
                    st.direction = 0;
                }
                OP_QUERY => {}
                other => trace!(opcode = other, "sim ignoring unknown opcode"),
            }
            st.height = st.height.clamp(cfg.min_height_tenths, cfg.max_height_tenths);
            st.frames.push(bytes);
            (st.height, st.sink.clone())
        };

        trace!(opcode = bytes[2], height_tenths = height, "sim frame accepted");
        // Deliver outside the lock, like a real notification queue.
        if let Some(sink) = sink {
            (**sink)(&self.notification(height));
        }
        Ok(())
    }
}

impl Transport for SimulatedDesk {
    fn connect(
        &mut self,
        device_id: &str,
    ) -> std::result::Result<Box<dyn Connection>, Box<dyn std::error::Error + Send + Sync>> {
        if device_id != self.cfg.device_id {
            return Err(Box::new(TransportError::NotFound(device_id.to_string())));
        }
        {
            let mut st = self.lock();
            st.linked = true;
            st.connects = st.connects.saturating_add(1);
        }
        debug!(device_id, "sim connected");
        Ok(Box::new(SimLink { desk: self.clone() }))
    }
}

/// A live link to the simulated desk.
pub struct SimLink {
    desk: SimulatedDesk,
}

impl Connection for SimLink {
    fn open_control_channel(
        &mut self,
    ) -> std::result::Result<Box<dyn ControlWriter>, Box<dyn std::error::Error + Send + Sync>> {
        if !self.desk.is_linked() {
            return Err(Box::new(TransportError::Disconnected));
        }
        Ok(Box::new(SimWriter {
            desk: self.desk.clone(),
        }))
    }

    fn subscribe_telemetry(
        &mut self,
        sink: TelemetrySink,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.desk.lock();
        if !st.linked {
            return Err(Box::new(TransportError::Disconnected));
        }
        if st.hide_telemetry {
            return Err(Box::new(TransportError::EndpointMissing("telemetry")));
        }
        st.sink = Some(Arc::new(sink));
        Ok(())
    }

    fn disconnect(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.desk.lock();
        st.linked = false;
        st.sink = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.desk.is_linked()
    }
}

struct SimWriter {
    desk: SimulatedDesk,
}

impl ControlWriter for SimWriter {
    fn write(&mut self, frame: &[u8]) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.desk.accept(frame).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    const RAISE: [u8; 6] = [0xF1, 0xF1, 0x01, 0x00, 0x01, 0x7E];
    const STOP: [u8; 6] = [0xF1, 0xF1, 0x2B, 0x00, 0x2B, 0x7E];

    #[test]
    fn raise_moves_and_notifies() {
        let mut desk = SimulatedDesk::new(SimConfig::default());
        let mut link = desk.connect("SIM-DESK").unwrap();
        let seen = Arc::new(AtomicI32::new(0));
        let seen_cb = seen.clone();
        link.subscribe_telemetry(Box::new(move |b: &[u8]| {
            seen_cb.store(i32::from(i16::from_be_bytes([b[4], b[5]])), Ordering::Relaxed);
        }))
        .unwrap();
        let mut w = link.open_control_channel().unwrap();
        w.write(&RAISE).unwrap();
        assert_eq!(seen.load(Ordering::Relaxed), 6570);
        w.write(&STOP).unwrap();
        assert_eq!(desk.height_tenths(), 6580);
        assert_eq!(desk.received_opcodes(), vec![0x01, 0x2B]);
    }

    #[test]
    fn unknown_device_is_not_found() {
        let mut desk = SimulatedDesk::new(SimConfig::default());
        let err = desk.connect("nope").err().unwrap();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn write_after_drop_fails() {
        let mut desk = SimulatedDesk::new(SimConfig::default());
        let mut link = desk.connect("SIM-DESK").unwrap();
        let mut w = link.open_control_channel().unwrap();
        desk.drop_link();
        assert!(!link.is_connected());
        let err = w.write(&RAISE).unwrap_err();
        assert!(err.to_string().contains("disconnected"));
    }
}
