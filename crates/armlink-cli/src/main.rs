//! `armlink` – runs the robot-arm address-space server.
//!
//! 1. Resolves the config file (`--config <path>`, `ARMLINK_CONFIG`, or
//!    `~/.armlink/config.toml`), writing defaults on first run.
//! 2. Builds the server; any inconsistency in the robot configuration or the
//!    node set aborts start-up.
//! 3. Runs the session sweeper until Ctrl-C, then closes every session.

mod config;
mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use armlink_server::RobotServer;
use tracing::{error, info, warn};

use crate::config::Config;

const USAGE: &str = "usage: armlink [--config <path>]";

fn main() -> ExitCode {
    let path = match parse_args(std::env::args().skip(1)) {
        Ok(Some(path)) => path,
        Ok(None) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let _telemetry = telemetry::init("armlink");

    let cfg = match load_or_init(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(path = %path.display(), error = %e, "configuration error");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(run(cfg)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "armlink stopped");
            ExitCode::FAILURE
        }
    }
}

/// `Ok(None)` means help was requested.
fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<PathBuf>, String> {
    let mut path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "-c" | "--config" => {
                let value = args.next().ok_or("--config needs a path")?;
                path = Some(PathBuf::from(value));
            }
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }
    Ok(Some(path.unwrap_or_else(config::config_path)))
}

fn load_or_init(path: &Path) -> Result<Config, String> {
    if let Some(cfg) = config::load_from(path)? {
        info!(path = %path.display(), "config loaded");
        return Ok(cfg);
    }
    let mut cfg = Config::default();
    match config::save_to(&cfg, path) {
        Ok(()) => info!(path = %path.display(), "no config found; wrote defaults"),
        Err(e) => warn!(error = %e, "no config found; running with defaults"),
    }
    config::apply_env_overrides(&mut cfg);
    Ok(cfg)
}

async fn run(cfg: Config) -> Result<(), String> {
    let users = cfg.security.user_store()?;
    let server = RobotServer::builder(Arc::new(users))
        .robot(cfg.robot.to_robot_config())
        .policy(cfg.security.session_policy())
        .sweep_interval(cfg.security.sweep_interval())
        .build()
        .map_err(|e| format!("server construction failed: {e}"))?;

    println!("{}", server.summary());
    let sweeper = server.spawn_session_sweeper();
    info!(
        robot = %server.robot().name(),
        joints = server.robot().joint_count(),
        "armlink running; press Ctrl-C to stop"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C; shutting down");
    }
    server.shutdown();
    sweeper.abort();
    let _ = sweeper.await;
    Ok(())
}
