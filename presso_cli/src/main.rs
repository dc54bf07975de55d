mod cli;
mod dispatch;
mod error_fmt;
mod profiles;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use presso_config::ProfileDir;
use presso_core::{ActuatorConstants, CsvProfileStore};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::dispatch::{DispatchArgs, backend_name, run_dispatch};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::profiles::App;

fn load_config(path: &Path) -> Result<presso_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg: presso_config::Config = toml::from_str(&text).wrap_err("parse config")?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Console layer to stderr (pretty or JSON), plus an optional JSON-lines
/// file layer from `[logging]`.
fn init_tracing(level: &str, json: bool, logging: Option<&presso_config::Logging>) {
    let level = logging
        .and_then(|l| l.level.as_deref())
        .filter(|_| level == "info")
        .unwrap_or(level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = logging.and_then(|l| l.file.as_deref()).map(|file| {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let name = path
            .file_name()
            .map_or_else(|| "presso.log".into(), |n| n.to_os_string());
        let appender = match logging.and_then(|l| l.rotation.as_deref()) {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_ansi(false).with_writer(writer)
    });

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    let _ = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
}

/// Relative `profiles.dir` is taken from the config file's directory.
fn profiles_root(config_path: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        return dir.to_path_buf();
    }
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| dir.to_path_buf(), |p| p.join(dir))
}

fn run(cli: Cli) -> Result<()> {
    let loaded = load_config(&cli.config);
    init_tracing(
        &cli.log_level,
        cli.json,
        loaded.as_ref().ok().map(|c| &c.logging),
    );
    let cfg = loaded?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let root = profiles_root(&cli.config, &cfg.profiles.dir);
    let mut app = App {
        constants: ActuatorConstants::from(&cfg.actuator),
        store: CsvProfileStore::new(ProfileDir::new(root)),
        cfg,
        json: cli.json,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&cancel);
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    match cli.cmd {
        Commands::List => profiles::list(&app),
        Commands::Show { name } => profiles::show(&app, &name),
        Commands::Save {
            name,
            points,
            classic,
        } => profiles::save(&mut app, &name, &points, classic),
        Commands::Compile { name, classic } => {
            profiles::compile(&app, if classic { None } else { name.as_deref() })
        }
        Commands::Preset { current, name } => profiles::preset(&app, current, &name),
        Commands::Dispatch {
            name,
            credential,
            ack_timeout_ms,
            simulate,
            simulate_silent,
        } => run_dispatch(
            &app,
            &DispatchArgs {
                name: &name,
                credential: credential.as_deref(),
                ack_timeout_ms,
                simulate,
                simulate_silent,
            },
            cancel,
        ),
        Commands::SelfCheck => profiles::self_check(&app, backend_name(false)),
    }
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            tracing::debug!(error = ?e, "command failed");
            exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}
