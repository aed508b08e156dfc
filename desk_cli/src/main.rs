#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod commands;
mod error_fmt;
mod logging;

use clap::Parser;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = commands::load_config(&cli.config)?;
    logging::init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), desk = %cfg.desk.name, "config loaded");

    match cli.cmd {
        Commands::Move { target, timeout_ms } => {
            commands::move_to(&cfg, target, timeout_ms, cli.json)
        }
        Commands::Run { target, for_ms } => commands::run(&cfg, target, for_ms, cli.json),
        Commands::Convert { height, percent } => {
            commands::convert(&cfg, height, percent, cli.json)
        }
        Commands::SelfCheck => commands::self_check(&cfg, cli.json),
    }
}
