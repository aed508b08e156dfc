//! Motion reconciler: the state machine comparing target vs. current position.
//!
//! The actuator has no absolute positioning primitive; it moves while a
//! steady stream of Raise/Lower frames arrives. The reconciler decides which
//! frame (if any) each tick should emit and declares convergence from
//! telemetry, within a hysteresis band `H` that absorbs reporting latency
//! and actuator coasting.
//!
//! - `set_target(pct)`: Increasing if `pct > current`, Decreasing if below,
//!   Stopped otherwise. Always records the target.
//! - `on_position_report(pct)`: records `current`. While Stopped, the target
//!   mirrors the report. While moving, reaching `target - H` (up) or
//!   `target + H` (down) stops and yields exactly one Stop.
//! - `next_command()`: Raise/Lower while moving; while Stopped, a Query on
//!   every `heartbeat_every`-th idle tick and nothing otherwise.
//!
//! Until a position has been reported (at start, and again after
//! [`Reconciler::mark_stale`]) `current` is not trusted: targets are stored
//! without choosing a direction, and the first report picks the direction
//! from the stored target instead of mirroring it away.

use std::fmt;

use tracing::debug;

use crate::codec::Opcode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionState {
    #[default]
    Stopped,
    Increasing,
    Decreasing,
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    current: u8,
    target: u8,
    state: MotionState,
    hysteresis: u8,
    heartbeat_every: u32,
    idle_ticks: u32,
    /// A move was cancelled by a new target; the next tick sends one Stop.
    stop_pending: bool,
    has_report: bool,
    /// The target was set (or a move interrupted) without a trusted
    /// position; the next report resumes toward it.
    resume_pending: bool,
}

impl Reconciler {
    pub fn new(hysteresis_pct: u8, heartbeat_every: u32) -> Self {
        Self {
            current: 0,
            target: 0,
            state: MotionState::Stopped,
            hysteresis: hysteresis_pct,
            heartbeat_every: heartbeat_every.max(1),
            idle_ticks: 0,
            stop_pending: false,
            has_report: false,
            resume_pending: false,
        }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn target(&self) -> u8 {
        self.target
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    /// Whether any position report arrived since construction or the last
    /// [`Reconciler::mark_stale`].
    pub fn has_report(&self) -> bool {
        self.has_report
    }

    /// Forget that `current` was reported; called when the link is replaced.
    /// An interrupted move is parked and resumes on the next report.
    pub fn mark_stale(&mut self) {
        self.has_report = false;
        if self.state != MotionState::Stopped {
            self.state = MotionState::Stopped;
            self.resume_pending = true;
        }
    }

    pub fn set_target(&mut self, pct: u8) -> MotionState {
        let pct = pct.min(100);
        let was_moving = self.state != MotionState::Stopped;
        self.target = pct;
        if !self.has_report {
            self.resume_pending = true;
            debug!(target_pct = pct, "target stored until a position is reported");
            return self.state;
        }
        self.state = self.direction();
        self.stop_pending =
            self.state == MotionState::Stopped && (was_moving || self.stop_pending);
        debug!(
            target_pct = pct,
            current_pct = self.current,
            state = %self.state,
            "target set"
        );
        self.state
    }

    /// Apply a telemetry-derived position. Returns `Some(Stop)` on convergence.
    pub fn on_position_report(&mut self, pct: u8) -> Option<Opcode> {
        self.current = pct.min(100);
        self.has_report = true;
        if std::mem::take(&mut self.resume_pending) {
            self.resume();
            return None;
        }
        match self.state {
            MotionState::Stopped => {
                self.target = self.current;
                None
            }
            MotionState::Increasing | MotionState::Decreasing if self.converged() => {
                self.stop();
                Some(Opcode::Stop)
            }
            _ => None,
        }
    }

    /// Decide the command for one control-loop tick.
    pub fn next_command(&mut self) -> Option<Opcode> {
        if self.stop_pending {
            self.stop_pending = false;
            self.idle_ticks = 0;
            return Some(Opcode::Stop);
        }
        match self.state {
            MotionState::Stopped => {
                self.idle_ticks = self.idle_ticks.saturating_add(1);
                if self.idle_ticks >= self.heartbeat_every {
                    self.idle_ticks = 0;
                    debug!(current_pct = self.current, "idle heartbeat");
                    Some(Opcode::Query)
                } else {
                    None
                }
            }
            _ if self.converged() => {
                // Already inside the band, e.g. the target moved toward us.
                self.stop();
                Some(Opcode::Stop)
            }
            MotionState::Increasing => {
                self.idle_ticks = 0;
                Some(Opcode::Raise)
            }
            MotionState::Decreasing => {
                self.idle_ticks = 0;
                Some(Opcode::Lower)
            }
        }
    }

    fn direction(&self) -> MotionState {
        match self.target.cmp(&self.current) {
            std::cmp::Ordering::Greater => MotionState::Increasing,
            std::cmp::Ordering::Less => MotionState::Decreasing,
            std::cmp::Ordering::Equal => MotionState::Stopped,
        }
    }

    /// First trusted report after a stored target: head toward it, or stay
    /// put if already inside the band.
    fn resume(&mut self) {
        self.state = self.direction();
        if self.converged() {
            self.state = MotionState::Stopped;
        }
        self.idle_ticks = 0;
        debug!(
            target_pct = self.target,
            current_pct = self.current,
            state = %self.state,
            "resuming stored target"
        );
    }

    fn converged(&self) -> bool {
        let cur = i16::from(self.current);
        let tgt = i16::from(self.target);
        let h = i16::from(self.hysteresis);
        match self.state {
            MotionState::Increasing => cur >= tgt - h,
            MotionState::Decreasing => cur <= tgt + h,
            MotionState::Stopped => true,
        }
    }

    fn stop(&mut self) {
        debug!(
            current_pct = self.current,
            target_pct = self.target,
            from = %self.state,
            "converged"
        );
        self.state = MotionState::Stopped;
        self.idle_ticks = 0;
    }
}
