#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Desk controller core (transport-agnostic).
//!
//! Drives a motorized standing desk whose actuator only understands
//! "keep moving up", "keep moving down", "stop" and "report height". All
//! link interactions go through the `desk_traits::Transport` seam.
//!
//! ## Architecture
//!
//! - **Position model**: height <-> percentage over the calibration range (`position`)
//! - **Command codec**: fixed 6-byte frames and telemetry decoding (`codec`)
//! - **Motion reconciler**: target vs. current state machine with hysteresis (`reconciler`)
//! - **Session manager**: connect, handshake, send, sticky fault flag (`session`)
//! - **Control loop**: paced ticks, telemetry draining, reconnection (`control_loop`, `runner`)
//!
//! Telemetry is decoded on the transport's delivery context and handed to the
//! control loop over a bounded channel; only the control loop touches the
//! reconciler's motion decisions.

pub mod builder;
pub mod codec;
pub mod config;
pub mod control_loop;
pub mod conversions;
pub mod error;
pub mod mocks;
pub mod position;
pub mod reconciler;
pub mod runner;
pub mod session;
pub mod state;
pub mod transport_error;

pub use builder::{Desk, DeskBuilder};
pub use codec::{Frame, Opcode, TelemetryLayout, TelemetryReading, decode_telemetry, encode};
pub use config::{ControlCfg, HandshakeKind};
pub use control_loop::{ControlLoop, Pace};
pub use error::{BuildError, DeskError, Result};
pub use position::{Calibration, height_to_percentage, percentage_to_height};
pub use reconciler::{MotionState, Reconciler};
pub use runner::ControlLoopHandle;
pub use state::{CurrentPosition, DeskHandle, DeskStatus, LinkStatus, reported_motion};
