mod cli;
mod error_fmt;
mod motion;
mod rt;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use turret_config::{Config, SettingsUpdate};
use turret_core::error::{Result, TurretError};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::motion::{MoveCmd, RunOpts, SettingsWatcher};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();
    let verbose = matches!(cli.log_level.as_str(), "debug" | "trace");

    if let Err(e) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
            if verbose {
                eprintln!("\n{e:?}");
            }
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn config_error(e: eyre::Report) -> eyre::Report {
    eyre::Report::new(TurretError::Config(format!("{e:#}")))
}

/// Load and validate the typed config; factory defaults when no file is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    let cfg = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .wrap_err_with(|| format!("read config {}", p.display()))
                .map_err(config_error)?;
            turret_config::load_toml(&text)
                .map_err(|e| config_error(eyre::eyre!("parse {}: {e}", p.display())))?
        }
        None => Config::default(),
    };
    cfg.validate().map_err(config_error)?;
    Ok(cfg)
}

pub(crate) fn read_settings(path: &Path) -> Result<SettingsUpdate> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read settings {}", path.display()))
        .map_err(config_error)?;
    turret_config::load_settings(&text)
        .map_err(|e| config_error(eyre::eyre!("parse {}: {e}", path.display())))
}

fn init_tracing(cli: &Cli, logging: &turret_config::Logging) -> Result<()> {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    // RUST_LOG wins over --log-level
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .map_err(|e| config_error(eyre::eyre!("invalid --log-level {:?}: {e}", cli.log_level)))?;

    // Logs go to stderr so stdout stays machine-readable.
    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| config_error(eyre::eyre!("logging.file has no file name")))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let level = logging.level.as_deref().unwrap_or("info");
            let file_filter = EnvFilter::try_new(level)
                .map_err(|e| config_error(eyre::eyre!("invalid logging.level {level:?}: {e}")))?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(file_filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| eyre::eyre!("install tracing subscriber: {e}"))
}

fn run(cli: Cli) -> Result<()> {
    let mut cfg = load_config(cli.config.as_deref())?;
    if let Some(path) = &cli.settings {
        let update = read_settings(path)?;
        cfg.apply(&update).map_err(config_error)?;
    }
    init_tracing(&cli, &cfg.logging)?;
    tracing::debug!(?cfg, "config loaded");

    rt::setup_rt_once(cli.rt);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let clock = motion::clock_for(cli.virtual_time)?;
    match cli.cmd {
        Commands::Rotate { angle, timeout_s } => {
            let turret = motion::assemble(&cfg, clock)?;
            motion::run_move(
                turret,
                MoveCmd::Angle(angle),
                Duration::from_secs(timeout_s),
                &shutdown,
                cli.json,
            )
        }
        Commands::Goto {
            position,
            timeout_s,
        } => {
            let turret = motion::assemble(&cfg, clock)?;
            motion::run_move(
                turret,
                MoveCmd::Position(position),
                Duration::from_secs(timeout_s),
                &shutdown,
                cli.json,
            )
        }
        Commands::Run {
            seconds,
            auto,
            stats,
        } => {
            let turret = motion::assemble(&cfg, clock)?;
            let watcher = cli
                .settings
                .clone()
                .map(|p| SettingsWatcher::new(p, cfg.clone()));
            let opts = RunOpts {
                seconds,
                auto,
                stats,
                json: cli.json,
                virtual_time: cli.virtual_time,
            };
            motion::run_loop(turret, &opts, watcher, &shutdown)
        }
        Commands::SelfCheck => motion::self_check(&cfg, clock, cli.json),
    }
}
