//! Subcommand implementations: config loading, desk assembly, and runs.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use desk_core::error::DeskError;
use desk_core::{Calibration, ControlCfg, Desk, DeskHandle, DeskStatus, MotionState, TelemetryLayout};
use desk_transport::{SimConfig, SimulatedDesk};
use eyre::{Report, WrapErr};
use serde_json::json;

const POLL: Duration = Duration::from_millis(20);

/// Read, parse and validate the config. Calibration problems surface as
/// `CalibrationInvalid`, everything else as `Config`.
pub fn load_config(path: &Path) -> eyre::Result<desk_config::Config> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Report::new(DeskError::Config(format!("cannot read {}: {e}", path.display())))
    })?;
    let cfg = desk_config::load_toml(&text).map_err(|e: toml::de::Error| {
        Report::new(DeskError::Config(format!(
            "{}: {}",
            path.display(),
            e.message()
        )))
    })?;
    Calibration::try_from(&cfg.desk).map_err(Report::new)?;
    cfg.validate()
        .map_err(|e| Report::new(DeskError::Config(e.to_string())))?;
    Ok(cfg)
}

fn to_tenths(h: f64) -> i16 {
    (h * 10.0)
        .round()
        .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

fn env_i16(key: &str) -> Option<i16> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Simulated desk matching the configured calibration and wire layout.
///
/// Test knobs: `DESK_SIM_HEIGHT` (start height, tenths), `DESK_SIM_STEP`
/// (travel per frame, tenths), `DESK_SIM_ABSENT` (desk never answers).
fn sim_transport(cfg: &desk_config::Config) -> SimulatedDesk {
    let layout = TelemetryLayout::from(cfg.protocol.layout);
    let defaults = SimConfig::default();
    let min = to_tenths(cfg.desk.base_height);
    let max = to_tenths(cfg.desk.max_height);
    let device_id = if std::env::var_os("DESK_SIM_ABSENT").is_some() {
        format!("{}-absent", cfg.desk.device_id)
    } else {
        cfg.desk.device_id.clone()
    };
    SimulatedDesk::new(SimConfig {
        device_id,
        initial_height_tenths: env_i16("DESK_SIM_HEIGHT").unwrap_or(min),
        min_height_tenths: min,
        max_height_tenths: max,
        step_tenths: env_i16("DESK_SIM_STEP").unwrap_or(defaults.step_tenths),
        coast_tenths: defaults.coast_tenths,
        height_offset: layout.height_offset(),
        notification_len: layout.min_len(),
    })
}

pub fn build_desk(cfg: &desk_config::Config) -> eyre::Result<Desk> {
    Desk::builder()
        .with_transport(sim_transport(cfg))
        .with_calibration(cfg.desk.base_height, cfg.desk.max_height)
        .with_device_id(cfg.desk.device_id.clone())
        .with_control(ControlCfg::from(&cfg.control))
        .with_layout(cfg.protocol.layout.into())
        .with_handshake(cfg.protocol.handshake.into())
        .build()
}

fn install_ctrlc() -> eyre::Result<Arc<AtomicBool>> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
    })
    .wrap_err("failed to install Ctrl-C handler")?;
    Ok(interrupted)
}

/// Poll `f` until it holds, the deadline passes, or Ctrl-C arrives.
fn wait_for(deadline: Instant, interrupted: &AtomicBool, mut f: impl FnMut() -> bool) -> bool {
    while Instant::now() < deadline {
        if interrupted.load(Ordering::Relaxed) {
            return false;
        }
        if f() {
            return true;
        }
        std::thread::sleep(POLL);
    }
    f()
}

fn not_settled(desk: &DeskHandle, interrupted: &AtomicBool, what: &str) -> Report {
    if interrupted.load(Ordering::Relaxed) {
        return Report::new(DeskError::State("interrupted".into()));
    }
    let status = desk.status();
    if status.faulted || !status.connected {
        Report::new(DeskError::ConnectionFault(format!(
            "desk unreachable while waiting for {what}"
        )))
    } else {
        Report::new(DeskError::State(format!("timed out waiting for {what}")))
    }
}

fn print_status(status: &DeskStatus, json: bool) {
    if json {
        println!(
            "{}",
            json!({
                "current": status.current.percent(),
                "target": status.target,
                "target_height": status.target_height,
                "motion": status.motion.to_string(),
                "connected": status.connected,
                "faulted": status.faulted,
            })
        );
    } else {
        let current = status
            .current
            .percent()
            .map_or_else(|| "unknown".to_string(), |p| format!("{p}%"));
        println!(
            "position {current} (target {}%, height {:.0}), {}",
            status.target, status.target_height, status.motion
        );
    }
}

pub fn move_to(cfg: &desk_config::Config, target: u8, timeout_ms: u64, json: bool) -> eyre::Result<()> {
    let running = build_desk(cfg)?
        .spawn()
        .wrap_err("failed to spawn control thread")?;
    let desk = running.desk().clone();
    let interrupted = install_ctrlc()?;
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);

    // A target is only meaningful against a reported position.
    if !wait_for(deadline, &interrupted, || desk.status().has_telemetry) {
        return Err(not_settled(&desk, &interrupted, "first telemetry"));
    }
    let motion = desk.set_target_position(target);
    tracing::info!(target_pct = target, %motion, "target set");

    // A parked target also reads Stopped, so require a fresh report too.
    if !wait_for(deadline, &interrupted, || {
        let s = desk.status();
        s.motion == MotionState::Stopped && s.has_telemetry
    }) {
        return Err(not_settled(&desk, &interrupted, "the desk to settle"));
    }
    // Let the post-Stop coasting report land.
    std::thread::sleep(Duration::from_millis(cfg.control.command_interval_ms));
    let status = desk.status();
    running.shutdown();
    tracing::info!(current = ?status.current, target_pct = status.target, "move complete");
    print_status(&status, json);
    Ok(())
}

pub fn run(cfg: &desk_config::Config, target: Option<u8>, for_ms: Option<u64>, json: bool) -> eyre::Result<()> {
    let running = build_desk(cfg)?
        .spawn()
        .wrap_err("failed to spawn control thread")?;
    let desk = running.desk().clone();
    let interrupted = install_ctrlc()?;
    let started = Instant::now();
    let mut pending = target;
    let mut last: Option<DeskStatus> = None;

    while !interrupted.load(Ordering::Relaxed) {
        if for_ms.is_some_and(|ms| started.elapsed() >= Duration::from_millis(ms)) {
            break;
        }
        let status = desk.status();
        if let Some(t) = pending
            && status.has_telemetry
        {
            desk.set_target_position(t);
            pending = None;
        }
        if last.as_ref() != Some(&status) {
            tracing::info!(
                current = ?status.current,
                target_pct = status.target,
                motion = %status.motion,
                connected = status.connected,
                faulted = status.faulted,
                "status"
            );
            last = Some(status);
        }
        std::thread::sleep(POLL);
    }

    let status = desk.status();
    running.shutdown();
    print_status(&status, json);
    Ok(())
}

pub fn convert(
    cfg: &desk_config::Config,
    height: Option<f64>,
    percent: Option<u8>,
    json: bool,
) -> eyre::Result<()> {
    let cal = Calibration::try_from(&cfg.desk).map_err(Report::new)?;
    let (h, p) = match (height, percent) {
        (Some(h), _) => (h, cal.height_to_percentage(h)),
        (None, Some(p)) => (cal.percentage_to_height(p), p),
        (None, None) => {
            return Err(Report::new(DeskError::Config(
                "convert needs --height or --percent".into(),
            )));
        }
    };
    if json {
        println!("{}", json!({ "height": h, "percent": p }));
    } else {
        println!("height {h} = {p}%");
    }
    Ok(())
}

pub fn self_check(cfg: &desk_config::Config, json: bool) -> eyre::Result<()> {
    let mut desk = build_desk(cfg)?;
    desk.self_check().map_err(Report::new)?;
    let status = desk.handle().status();
    if json {
        println!(
            "{}",
            json!({
                "ok": true,
                "name": cfg.desk.name,
                "device_id": cfg.desk.device_id,
                "telemetry": status.has_telemetry,
            })
        );
    } else {
        println!(
            "self-check ok: {} ({}) reachable",
            cfg.desk.name, cfg.desk.device_id
        );
    }
    Ok(())
}
