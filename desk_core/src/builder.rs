//! Type-state builder for `Desk`.
//!
//! The builder enforces at compile time that a transport, a calibration and a
//! device id are provided before `build()` is available. `try_build()` is
//! always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use crossbeam_channel as xch;
use desk_traits::Transport;
use desk_traits::clock::{Clock, MonotonicClock};

use crate::codec::TelemetryLayout;
use crate::config::{ControlCfg, HandshakeKind};
use crate::control_loop::ControlLoop;
use crate::error::{BuildError, Result};
use crate::position::Calibration;
use crate::reconciler::Reconciler;
use crate::runner::ControlLoopHandle;
use crate::session::SessionManager;
use crate::state::{DeskHandle, LinkStatus};

/// A fully wired desk controller that has not started running yet.
pub struct Desk {
    control_loop: ControlLoop,
}

impl core::fmt::Debug for Desk {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Desk")
            .field("device_id", &self.control_loop.session().device_id())
            .field("status", &self.control_loop.handle().status())
            .finish()
    }
}

impl Desk {
    /// Start building a Desk.
    pub fn builder() -> DeskBuilder<Missing, Missing, Missing> {
        DeskBuilder::default()
    }

    /// Handle for the external layer; clone freely.
    pub fn handle(&self) -> DeskHandle {
        self.control_loop.handle()
    }

    /// Drive the loop manually (tests, single-threaded callers).
    pub fn control_loop(&mut self) -> &mut ControlLoop {
        &mut self.control_loop
    }

    pub fn into_control_loop(self) -> ControlLoop {
        self.control_loop
    }

    /// Run the control loop on its own thread.
    pub fn spawn(self) -> std::io::Result<ControlLoopHandle> {
        ControlLoopHandle::spawn(self.control_loop)
    }

    /// Connect once, apply any handshake telemetry, and disconnect.
    pub fn self_check(&mut self) -> std::result::Result<(), crate::error::DeskError> {
        self.control_loop.probe()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Desk`. All fields are validated on `build()`.
pub struct DeskBuilder<T, C, D> {
    transport: Option<Box<dyn Transport>>,
    calibration: Option<(f64, f64)>,
    device_id: Option<String>,
    control: Option<ControlCfg>,
    layout: Option<TelemetryLayout>,
    handshake: Option<HandshakeKind>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _t: PhantomData<T>,
    _c: PhantomData<C>,
    _d: PhantomData<D>,
}

impl Default for DeskBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            transport: None,
            calibration: None,
            device_id: None,
            control: None,
            layout: None,
            handshake: None,
            clock: None,
            _t: PhantomData,
            _c: PhantomData,
            _d: PhantomData,
        }
    }
}

fn validate_control(control: &ControlCfg) -> std::result::Result<(), BuildError> {
    if control.hysteresis_pct > 10 {
        return Err(BuildError::InvalidConfig("hysteresis_pct must be <= 10"));
    }
    if control.command_interval_ms == 0 {
        return Err(BuildError::InvalidConfig("command_interval_ms must be >= 1"));
    }
    if control.idle_poll_ms == 0 {
        return Err(BuildError::InvalidConfig("idle_poll_ms must be >= 1"));
    }
    if control.heartbeat_every == 0 {
        return Err(BuildError::InvalidConfig("heartbeat_every must be >= 1"));
    }
    if control.telemetry_queue == 0 {
        return Err(BuildError::InvalidConfig("telemetry_queue must be >= 1"));
    }
    Ok(())
}

impl<T, C, D> DeskBuilder<T, C, D> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Desk> {
        let transport = self
            .transport
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTransport))?;
        let (base, max) = self
            .calibration
            .ok_or_else(|| eyre::Report::new(BuildError::MissingCalibration))?;
        let device_id = self
            .device_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| eyre::Report::new(BuildError::MissingDeviceId))?;
        let calibration = Calibration::new(base, max).map_err(eyre::Report::new)?;
        let control = self.control.unwrap_or_default();
        validate_control(&control).map_err(eyre::Report::new)?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let (tx, rx) = xch::bounded(control.telemetry_queue);
        let link = Arc::new(LinkStatus::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let motion = Arc::new(Mutex::new(Reconciler::new(
            control.hysteresis_pct,
            control.heartbeat_every,
        )));
        let session = SessionManager::new(
            transport,
            device_id,
            self.layout.unwrap_or_default(),
            self.handshake.unwrap_or_default(),
            tx,
            link.clone(),
            shutdown.clone(),
        );

        Ok(Desk {
            control_loop: ControlLoop::new(
                session,
                motion,
                link,
                calibration,
                rx,
                control,
                clock,
                shutdown,
            ),
        })
    }

    fn retype<T2, C2, D2>(self) -> DeskBuilder<T2, C2, D2> {
        DeskBuilder {
            transport: self.transport,
            calibration: self.calibration,
            device_id: self.device_id,
            control: self.control,
            layout: self.layout,
            handshake: self.handshake,
            clock: self.clock,
            _t: PhantomData,
            _c: PhantomData,
            _d: PhantomData,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<T, C, D> DeskBuilder<T, C, D> {
    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = Some(control);
        self
    }
    pub fn with_layout(mut self, layout: TelemetryLayout) -> Self {
        self.layout = Some(layout);
        self
    }
    pub fn with_handshake(mut self, handshake: HandshakeKind) -> Self {
        self.handshake = Some(handshake);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<C, D> DeskBuilder<Missing, C, D> {
    pub fn with_transport(self, transport: impl Transport + 'static) -> DeskBuilder<Set, C, D> {
        let mut next = self.retype();
        next.transport = Some(Box::new(transport));
        next
    }
}

impl<T, D> DeskBuilder<T, Missing, D> {
    /// Calibration bounds in native height units; validated on build.
    pub fn with_calibration(self, base_height: f64, max_height: f64) -> DeskBuilder<T, Set, D> {
        let mut next = self.retype();
        next.calibration = Some((base_height, max_height));
        next
    }
}

impl<T, C> DeskBuilder<T, C, Missing> {
    pub fn with_device_id(self, device_id: impl Into<String>) -> DeskBuilder<T, C, Set> {
        let mut next = self.retype();
        next.device_id = Some(device_id.into());
        next
    }
}

impl DeskBuilder<Set, Set, Set> {
    /// Validate and build the Desk. Only available when transport, calibration
    /// and device id are set.
    pub fn build(self) -> Result<Desk> {
        self.try_build()
    }
}
