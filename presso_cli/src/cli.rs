//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "presso", version, about = "Espresso pressure-profile CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/presso.toml")]
    pub config: PathBuf,

    /// Emit JSON instead of human-readable output
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List stored profiles
    List,
    /// Print the points of a stored profile
    Show { name: String },
    /// Create or replace a stored profile
    Save {
        name: String,
        /// A point as TIME:PRESSURE (seconds:bar); repeat for each point
        #[arg(long = "point", value_name = "T:P", value_parser = parse_point, required_unless_present = "classic")]
        points: Vec<(f64, f64)>,
        /// Save the built-in classic profile instead of explicit points
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "points")]
        classic: bool,
    },
    /// Compile a profile and print its motion commands
    Compile {
        #[arg(required_unless_present = "classic")]
        name: Option<String>,
        /// Compile the built-in classic profile
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "name")]
        classic: bool,
    },
    /// Steps to bring the actuator from the current pressure to a profile's start
    Preset {
        /// Pressure the actuator currently holds (bar)
        #[arg(long, value_name = "BAR")]
        current: f64,
        name: String,
    },
    /// Compile a profile and deliver it to the machine
    Dispatch {
        name: String,
        /// Operator credential (falls back to PRESSO_CREDENTIAL)
        #[arg(long, env = "PRESSO_CREDENTIAL", hide_env_values = true)]
        credential: Option<String>,
        /// Override dispatch.ack_timeout_ms
        #[arg(long, value_name = "MS")]
        ack_timeout_ms: Option<u64>,
        /// Use the in-process simulated machine
        #[arg(long, env = "PRESSO_SIMULATE", action = ArgAction::SetTrue)]
        simulate: bool,
        /// Simulated machine that never acknowledges (implies --simulate)
        #[arg(long, action = ArgAction::SetTrue)]
        simulate_silent: bool,
    },
    /// Validate config and the profile directory
    SelfCheck,
}

/// Parse `T:P` into `(time, pressure)`.
pub fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (t, p) = s
        .split_once(':')
        .ok_or_else(|| format!("expected TIME:PRESSURE, got {s:?}"))?;
    let t: f64 = t
        .trim()
        .parse()
        .map_err(|_| format!("invalid time {t:?}"))?;
    let p: f64 = p
        .trim()
        .parse()
        .map_err(|_| format!("invalid pressure {p:?}"))?;
    Ok((t, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_points() {
        assert_eq!(parse_point("5:9"), Ok((5.0, 9.0)));
        assert_eq!(parse_point(" 2.5 : 6.25 "), Ok((2.5, 6.25)));
        assert!(parse_point("5").is_err());
        assert!(parse_point("x:9").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
