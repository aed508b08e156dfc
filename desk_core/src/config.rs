//! Runtime configuration for the control loop and session.
//!
//! These are the structs `desk_core` runs on. They are separate from the
//! TOML-deserialized config in `desk_config`; see `conversions`.

use std::time::Duration;

use crate::codec::Opcode;

/// Loop pacing and reconciler tuning.
#[derive(Debug, Clone)]
pub struct ControlCfg {
    /// Convergence tolerance `H` in percentage points.
    pub hysteresis_pct: u8,
    /// Pause after each outgoing command; the actuator cannot absorb frames faster.
    pub command_interval_ms: u64,
    /// Pause between idle ticks while stopped.
    pub idle_poll_ms: u64,
    /// Idle ticks between Query heartbeats.
    pub heartbeat_every: u32,
    /// Fixed wait after a failed reconnect. Retries never give up.
    pub reconnect_backoff_ms: u64,
    /// Bounded telemetry queue capacity.
    pub telemetry_queue: usize,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            hysteresis_pct: 2,
            command_interval_ms: 200,
            idle_poll_ms: 100,
            heartbeat_every: 100,
            reconnect_backoff_ms: 1000,
            telemetry_queue: 64,
        }
    }
}

impl ControlCfg {
    pub fn command_interval(&self) -> Duration {
        Duration::from_millis(self.command_interval_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}

/// Frames written right after connecting to prove the link is writable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeKind {
    /// Raise, Lower, Stop: nets out to no motion.
    MovePair,
    #[default]
    Query,
}

impl HandshakeKind {
    pub fn frames(self) -> &'static [Opcode] {
        match self {
            Self::MovePair => &[Opcode::Raise, Opcode::Lower, Opcode::Stop],
            Self::Query => &[Opcode::Query],
        }
    }
}
