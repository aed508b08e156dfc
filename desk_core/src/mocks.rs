//! Test and helper mocks for desk_core

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use desk_traits::{Connection, ControlWriter, TelemetrySink, Transport};

use crate::codec::{Frame, Opcode};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Default)]
struct MockState {
    frames: Vec<Vec<u8>>,
    fail_writes: usize,
    fail_all_writes: bool,
    fail_connects: usize,
    connects: u32,
    disconnects: u32,
    linked: bool,
    sink: Option<Arc<TelemetrySink>>,
}

/// In-memory transport that records every written frame and lets tests
/// inject telemetry and faults. Clones share state.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `n` writes, then recover.
    pub fn fail_next_writes(&self, n: usize) {
        self.lock().fail_writes = n;
    }

    pub fn set_fail_all_writes(&self, on: bool) {
        self.lock().fail_all_writes = on;
    }

    /// Refuse the next `n` connection attempts.
    pub fn fail_next_connects(&self, n: usize) {
        self.lock().fail_connects = n;
    }

    /// Simulate the peer going away: the link reports disconnected and
    /// further writes fail.
    pub fn drop_link(&self) {
        let mut s = self.lock();
        s.linked = false;
        s.sink = None;
    }

    /// Deliver raw notification bytes. Returns false if nobody is subscribed.
    pub fn push_telemetry(&self, bytes: &[u8]) -> bool {
        let sink = self.lock().sink.clone();
        match sink {
            Some(sink) => {
                (**sink)(bytes);
                true
            }
            None => false,
        }
    }

    /// Deliver a 6-byte notification with the height at offset 4.
    pub fn push_height(&self, tenths: i16) -> bool {
        let [hi, lo] = tenths.to_be_bytes();
        self.push_telemetry(&[0x98, 0x98, 0x00, 0x00, hi, lo])
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.lock().frames.clone()
    }

    /// Decoded opcodes of every written frame, in order.
    pub fn opcodes(&self) -> Vec<Opcode> {
        self.lock()
            .frames
            .iter()
            .filter_map(|f| Frame::parse(f).ok().map(|f| f.opcode()))
            .collect()
    }

    pub fn clear_frames(&self) {
        self.lock().frames.clear();
    }

    pub fn connects(&self) -> u32 {
        self.lock().connects
    }

    pub fn disconnects(&self) -> u32 {
        self.lock().disconnects
    }

    pub fn is_linked(&self) -> bool {
        self.lock().linked
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, _device_id: &str) -> Result<Box<dyn Connection>, BoxError> {
        let mut s = self.lock();
        if s.fail_connects > 0 {
            s.fail_connects -= 1;
            return Err(Box::new(std::io::Error::other("connect refused")));
        }
        s.connects += 1;
        s.linked = true;
        Ok(Box::new(MockLink {
            state: self.state.clone(),
        }))
    }
}

/// Link handed out by [`MockTransport::connect`].
pub struct MockLink {
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connection for MockLink {
    fn open_control_channel(&mut self) -> Result<Box<dyn ControlWriter>, BoxError> {
        Ok(Box::new(MockWriter {
            state: self.state.clone(),
        }))
    }

    fn subscribe_telemetry(&mut self, sink: TelemetrySink) -> Result<(), BoxError> {
        self.lock().sink = Some(Arc::new(sink));
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BoxError> {
        let mut s = self.lock();
        s.linked = false;
        s.sink = None;
        s.disconnects += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().linked
    }
}

struct MockWriter {
    state: Arc<Mutex<MockState>>,
}

impl ControlWriter for MockWriter {
    fn write(&mut self, frame: &[u8]) -> Result<(), BoxError> {
        let mut s = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !s.linked {
            return Err(Box::new(std::io::Error::other("not linked")));
        }
        if s.fail_all_writes {
            return Err(Box::new(std::io::Error::other("write rejected")));
        }
        if s.fail_writes > 0 {
            s.fail_writes -= 1;
            return Err(Box::new(std::io::Error::other("write rejected")));
        }
        s.frames.push(frame.to_vec());
        Ok(())
    }
}
