//! Tracing setup: console layer (pretty or JSON) plus an optional rolling
//! file layer configured under `[logging]`.

use std::path::Path;

use eyre::{WrapErr, eyre};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::FILE_GUARD;

fn console_filter(level: &str) -> eyre::Result<EnvFilter> {
    // RUST_LOG wins over --log-level when set.
    match EnvFilter::try_from_default_env() {
        Ok(f) => Ok(f),
        Err(_) => EnvFilter::try_new(level).wrap_err_with(|| format!("invalid log level '{level}'")),
    }
}

pub fn init_tracing(json: bool, level: &str, logging: &desk_config::Logging) -> eyre::Result<()> {
    let pretty = if json {
        None
    } else {
        Some(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(console_filter(level)?),
        )
    };
    let json_layer = if json {
        Some(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter(level)?),
        )
    } else {
        None
    };

    let file_layer = match logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre!("logging.file has no file name: {}", path.display()))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_level = logging.level.as_deref().unwrap_or("info");
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(
                        EnvFilter::try_new(file_level)
                            .wrap_err_with(|| format!("invalid logging.level '{file_level}'"))?,
                    ),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(pretty)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| eyre!("failed to install tracing subscriber: {e}"))
}
