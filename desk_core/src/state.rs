//! Shared state between the control loop and the external layer.
//!
//! The reconciler lives behind a short-held mutex; link status is a pair of
//! atomics so the telemetry path and getters never contend on a lock. The
//! external layer only ever writes the target.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::position::Calibration;
use crate::reconciler::{MotionState, Reconciler};

/// Connection status shared by the session manager and readers.
#[derive(Debug, Default)]
pub struct LinkStatus {
    connected: AtomicBool,
    faulted: AtomicBool,
}

impl LinkStatus {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    pub(crate) fn set_connected(&self, v: bool) {
        self.connected.store(v, Ordering::Release);
    }

    /// Latch the sticky fault flag. Returns true if it was newly set.
    pub(crate) fn latch_fault(&self) -> bool {
        !self.faulted.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn clear_fault(&self) {
        self.faulted.store(false, Ordering::Release);
    }
}

/// Current position as seen by the external layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentPosition {
    Known(u8),
    /// No usable connection, or no report on the current one yet; distinct
    /// from every valid reading.
    Fault,
}

impl CurrentPosition {
    pub fn percent(self) -> Option<u8> {
        match self {
            Self::Known(p) => Some(p),
            Self::Fault => None,
        }
    }
}

/// Point-in-time snapshot for logging and CLI output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeskStatus {
    pub current: CurrentPosition,
    pub target: u8,
    pub motion: MotionState,
    pub connected: bool,
    pub faulted: bool,
    pub has_telemetry: bool,
    /// Target expressed in native height units (informational).
    pub target_height: f64,
}

pub(crate) type SharedMotion = Arc<Mutex<Reconciler>>;

pub(crate) fn lock_motion(m: &Mutex<Reconciler>) -> MutexGuard<'_, Reconciler> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable handle used by the external layer.
#[derive(Debug, Clone)]
pub struct DeskHandle {
    motion: SharedMotion,
    link: Arc<LinkStatus>,
    calibration: Calibration,
}

impl DeskHandle {
    pub(crate) fn new(motion: SharedMotion, link: Arc<LinkStatus>, calibration: Calibration) -> Self {
        Self {
            motion,
            link,
            calibration,
        }
    }

    pub fn current_position(&self) -> CurrentPosition {
        if !self.link.is_connected() || self.link.is_faulted() {
            return CurrentPosition::Fault;
        }
        let m = lock_motion(&self.motion);
        if m.has_report() {
            CurrentPosition::Known(m.current())
        } else {
            CurrentPosition::Fault
        }
    }

    pub fn target_position(&self) -> u8 {
        lock_motion(&self.motion).target()
    }

    /// Accepted in every link state; takes effect once connected.
    pub fn set_target_position(&self, pct: u8) -> MotionState {
        lock_motion(&self.motion).set_target(pct)
    }

    pub fn motion_state(&self) -> MotionState {
        lock_motion(&self.motion).state()
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn status(&self) -> DeskStatus {
        let (target, motion, has_telemetry) = {
            let m = lock_motion(&self.motion);
            (m.target(), m.state(), m.has_report())
        };
        DeskStatus {
            current: self.current_position(),
            target,
            motion,
            connected: self.link.is_connected(),
            faulted: self.link.is_faulted(),
            has_telemetry,
            target_height: self.calibration.percentage_to_height(target),
        }
    }
}

/// Direction implied by target vs. current, for position-state getters that
/// derive it on demand rather than reading the reconciler's state.
pub fn reported_motion(current: u8, target: u8) -> MotionState {
    match target.cmp(&current) {
        std::cmp::Ordering::Greater => MotionState::Increasing,
        std::cmp::Ordering::Less => MotionState::Decreasing,
        std::cmp::Ordering::Equal => MotionState::Stopped,
    }
}
