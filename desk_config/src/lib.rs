#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the desk controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Only `[desk]` is required; every other table falls back to defaults.
use serde::Deserialize;

/// Per-device identity and calibration bounds (native length units).
#[derive(Debug, Deserialize, Clone)]
pub struct DeskCfg {
    pub name: String,
    pub device_id: String,
    pub base_height: f64,
    pub max_height: f64,
}

/// Telemetry notification layout, chosen per protocol revision.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Height at byte offset 4.
    #[default]
    Offset4,
    /// Two leading fields and two status bytes, then the height.
    StatusInterleaved,
}

/// Writes performed right after connecting to prove the link is writable.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Handshake {
    /// Raise, Lower, Stop.
    MovePair,
    /// A single Query.
    #[default]
    Query,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ProtocolCfg {
    pub layout: Layout,
    pub handshake: Handshake,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    /// Convergence tolerance in percentage points.
    pub hysteresis_pct: u8,
    /// Pause between outgoing move commands.
    pub command_interval_ms: u64,
    /// Pause between idle ticks while stopped.
    pub idle_poll_ms: u64,
    /// Idle ticks between Query heartbeats.
    pub heartbeat_every: u32,
    /// Fixed wait after a failed reconnect.
    pub reconnect_backoff_ms: u64,
    /// Capacity of the telemetry queue between transport and control loop.
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

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub desk: DeskCfg,
    #[serde(default)]
    pub protocol: ProtocolCfg,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse, and validate a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Desk
        if self.desk.name.trim().is_empty() {
            eyre::bail!("desk.name must not be empty");
        }
        if self.desk.device_id.trim().is_empty() {
            eyre::bail!("desk.device_id must not be empty");
        }
        if !self.desk.base_height.is_finite() || !self.desk.max_height.is_finite() {
            eyre::bail!("desk.base_height and desk.max_height must be finite");
        }
        if self.desk.max_height <= self.desk.base_height {
            eyre::bail!(
                "desk.max_height ({}) must be greater than desk.base_height ({})",
                self.desk.max_height,
                self.desk.base_height
            );
        }

        // Control
        if self.control.hysteresis_pct > 10 {
            eyre::bail!("control.hysteresis_pct must be in [0, 10]");
        }
        if !(50..=5000).contains(&self.control.command_interval_ms) {
            eyre::bail!("control.command_interval_ms must be in [50, 5000]");
        }
        if self.control.idle_poll_ms == 0 {
            eyre::bail!("control.idle_poll_ms must be >= 1");
        }
        if self.control.heartbeat_every == 0 {
            eyre::bail!("control.heartbeat_every must be >= 1");
        }
        if self.control.reconnect_backoff_ms == 0 {
            eyre::bail!("control.reconnect_backoff_ms must be >= 1");
        }
        if self.control.reconnect_backoff_ms > 10 * 60 * 1000 {
            eyre::bail!("control.reconnect_backoff_ms is unreasonably large (>10min)");
        }
        if self.control.telemetry_queue == 0 {
            eyre::bail!("control.telemetry_queue must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
