//! `From` implementations bridging `desk_config` types to `desk_core` types.

use crate::codec::TelemetryLayout;
use crate::config::{ControlCfg, HandshakeKind};
use crate::error::DeskError;
use crate::position::Calibration;

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&desk_config::ControlCfg> for ControlCfg {
    fn from(c: &desk_config::ControlCfg) -> Self {
        Self {
            hysteresis_pct: c.hysteresis_pct,
            command_interval_ms: c.command_interval_ms,
            idle_poll_ms: c.idle_poll_ms,
            heartbeat_every: c.heartbeat_every,
            reconnect_backoff_ms: c.reconnect_backoff_ms,
            telemetry_queue: c.telemetry_queue,
        }
    }
}

// ── Protocol ─────────────────────────────────────────────────────────────────

impl From<desk_config::Layout> for TelemetryLayout {
    fn from(l: desk_config::Layout) -> Self {
        match l {
            desk_config::Layout::Offset4 => Self::Offset4,
            desk_config::Layout::StatusInterleaved => Self::StatusInterleaved,
        }
    }
}

impl From<desk_config::Handshake> for HandshakeKind {
    fn from(h: desk_config::Handshake) -> Self {
        match h {
            desk_config::Handshake::MovePair => Self::MovePair,
            desk_config::Handshake::Query => Self::Query,
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl TryFrom<&desk_config::DeskCfg> for Calibration {
    type Error = DeskError;

    fn try_from(c: &desk_config::DeskCfg) -> Result<Self, Self::Error> {
        Calibration::new(c.base_height, c.max_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_maps_to_runtime_types() {
        let cfg = desk_config::load_toml(
            r#"
[desk]
name = "Desk"
device_id = "AA"
base_height = 620.0
max_height = 1270.0

[protocol]
layout = "status_interleaved"
handshake = "move_pair"

[control]
hysteresis_pct = 0
command_interval_ms = 500
"#,
        )
        .unwrap();
        let control = ControlCfg::from(&cfg.control);
        assert_eq!(control.hysteresis_pct, 0);
        assert_eq!(control.command_interval_ms, 500);
        assert_eq!(control.idle_poll_ms, 100);
        assert_eq!(
            TelemetryLayout::from(cfg.protocol.layout),
            TelemetryLayout::StatusInterleaved
        );
        assert_eq!(HandshakeKind::from(cfg.protocol.handshake), HandshakeKind::MovePair);
        let cal = Calibration::try_from(&cfg.desk).unwrap();
        assert_eq!(cal.base_height(), 620.0);
    }
}
