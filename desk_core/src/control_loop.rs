//! The control loop: one thread that owns the session and drives the
//! reconciler.
//!
//! Each tick, in order:
//! 1. While faulted, tear down and reconnect; on failure wait the backoff.
//! 2. If not yet connected, connect. Readings left from an old link are
//!    discarded before either connect.
//! 3. Apply every queued telemetry reading (a convergence Stop goes out
//!    immediately), so the command decision below sees fresh state.
//! 4. Ask the reconciler for the next command and send it.
//!
//! Between ticks the loop keeps draining telemetry while it waits, paced by
//! the command interval after a command and the idle poll otherwise.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use desk_traits::clock::Clock;
use tracing::{debug, error, info, trace, warn};

use crate::codec::{Frame, TelemetryReading};
use crate::config::ControlCfg;
use crate::error::DeskError;
use crate::position::Calibration;
use crate::session::SessionManager;
use crate::state::{DeskHandle, LinkStatus, SharedMotion, lock_motion};

/// How long the loop should wait before the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Nothing to send; wait one idle poll.
    Idle,
    /// A command went out; respect the command interval.
    Command,
    /// Connecting failed; wait the reconnect backoff.
    Backoff,
    /// State changed (connected, fault observed); tick again right away.
    Immediate,
}

pub struct ControlLoop {
    session: SessionManager,
    motion: SharedMotion,
    link: Arc<LinkStatus>,
    calibration: Calibration,
    telemetry: xch::Receiver<TelemetryReading>,
    control: ControlCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
}

impl ControlLoop {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        session: SessionManager,
        motion: SharedMotion,
        link: Arc<LinkStatus>,
        calibration: Calibration,
        telemetry: xch::Receiver<TelemetryReading>,
        control: ControlCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            session,
            motion,
            link,
            calibration,
            telemetry,
            control,
            clock,
            shutdown,
        }
    }

    pub fn handle(&self) -> DeskHandle {
        DeskHandle::new(self.motion.clone(), self.link.clone(), self.calibration)
    }

    /// Flag polled by `run`; setting it stops the loop after the current tick.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Run one iteration without pausing.
    pub fn tick(&mut self) -> Pace {
        if self.link.is_faulted() {
            self.session.teardown();
            self.discard_queued();
            return match self.session.connect() {
                Ok(()) => {
                    self.link.clear_fault();
                    self.on_connected();
                    info!(device_id = %self.session.device_id(), "reconnected; fault cleared");
                    Pace::Immediate
                }
                Err(e) => {
                    error!(
                        error = %e,
                        backoff_ms = self.control.reconnect_backoff_ms,
                        "reconnect failed"
                    );
                    Pace::Backoff
                }
            };
        }

        if !self.session.is_connected() {
            self.discard_queued();
            return match self.session.connect() {
                Ok(()) => {
                    self.on_connected();
                    Pace::Immediate
                }
                Err(e) => {
                    if !self.shutdown.load(Ordering::Relaxed) {
                        self.link.latch_fault();
                    }
                    warn!(error = %e, "connect failed");
                    Pace::Backoff
                }
            };
        }

        if self.session.check_link().is_err() || self.drain_telemetry().is_err() {
            return Pace::Immediate;
        }

        let next = lock_motion(&self.motion).next_command();
        match next {
            None => Pace::Idle,
            Some(op) => match self.session.send(&Frame::encode(op)) {
                Ok(()) => {
                    trace!(?op, "command sent");
                    Pace::Command
                }
                Err(_) => Pace::Immediate,
            },
        }
    }

    /// Drop readings left over from a previous link. Runs before connecting
    /// so the new link's handshake report is kept.
    fn discard_queued(&self) {
        let discarded = self.telemetry.try_iter().count();
        if discarded > 0 {
            debug!(discarded, "discarded readings from previous link");
        }
    }

    fn on_connected(&mut self) {
        // Readings from before this link no longer describe the desk.
        lock_motion(&self.motion).mark_stale();
    }

    /// Apply queued readings without blocking.
    pub fn drain_telemetry(&mut self) -> Result<(), DeskError> {
        while let Ok(reading) = self.telemetry.try_recv() {
            self.apply_reading(reading)?;
        }
        Ok(())
    }

    fn apply_reading(&mut self, reading: TelemetryReading) -> Result<(), DeskError> {
        let pct = self.calibration.height_to_percentage(reading.height());
        let stop = lock_motion(&self.motion).on_position_report(pct);
        trace!(height_tenths = reading.height_tenths, current_pct = pct, "position report");
        // Nothing but reconnection goes out while faulted.
        if let Some(op) = stop
            && !self.link.is_faulted()
        {
            self.session.send(&Frame::encode(op))?;
        }
        Ok(())
    }

    /// Wait according to `pace`, applying telemetry as it arrives.
    pub fn pause(&mut self, pace: Pace) {
        match pace {
            Pace::Immediate => {}
            Pace::Idle => self.wait_for_telemetry(self.control.idle_poll()),
            Pace::Command => self.wait_for_telemetry(self.control.command_interval()),
            Pace::Backoff => self.clock.sleep(self.control.reconnect_backoff()),
        }
    }

    fn wait_for_telemetry(&mut self, d: Duration) {
        let deadline = self.clock.now() + d;
        loop {
            if self.shutdown.load(Ordering::Relaxed) || self.link.is_faulted() {
                return;
            }
            let remaining = deadline.saturating_duration_since(self.clock.now());
            if remaining.is_zero() {
                return;
            }
            match self.telemetry.recv_timeout(remaining) {
                Ok(reading) => {
                    if self.apply_reading(reading).is_err() {
                        return;
                    }
                }
                Err(xch::RecvTimeoutError::Timeout) => return,
                Err(xch::RecvTimeoutError::Disconnected) => {
                    self.clock.sleep(remaining);
                    return;
                }
            }
        }
    }

    /// Connect once and tear down again; used by health checks.
    pub fn probe(&mut self) -> Result<(), DeskError> {
        self.session.connect()?;
        self.drain_telemetry()?;
        self.session.teardown();
        Ok(())
    }

    /// Tick until the shutdown flag is set, then release the link.
    pub fn run(&mut self) {
        info!(device_id = %self.session.device_id(), "control loop started");
        while !self.shutdown.load(Ordering::Relaxed) {
            let pace = self.tick();
            self.pause(pace);
        }
        self.session.teardown();
        debug!(
            dropped_samples = self.session.dropped_samples(),
            "control loop stopped"
        );
    }
}
