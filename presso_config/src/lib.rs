#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and profile file handling for presso.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Profile CSV files enforce an exact `time,pressure` header; `ProfileDir`
//!   maps profile names to one file each inside a directory.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Profile CSV schema.
///
/// Expected headers:
/// time,pressure
///
/// Example:
/// time,pressure
/// 0.0,9.0
/// 5.0,6.0
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct ProfileRow {
    pub time: f64,
    pub pressure: f64,
}

/// Mechanical constants of the pressure actuator.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ActuatorCfg {
    /// Motor microstepping resolution (4096 in half-step mode, 200 on older rigs)
    pub steps_per_revolution: u32,
    /// Pressure change produced by one full revolution of the screw
    pub bar_per_revolution: f64,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            steps_per_revolution: 4096,
            bar_per_revolution: 2.0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BrokerCfg {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    /// Plain-text password; prefer `password_env`.
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the broker password.
    #[serde(default)]
    pub password_env: Option<String>,
    /// MQTT client id; empty lets the backend pick one.
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_true")]
    pub tls: bool,
}

fn default_true() -> bool {
    true
}

impl BrokerCfg {
    /// Resolve the broker password, environment first.
    pub fn resolve_password(&self) -> Option<String> {
        self.password_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .or_else(|| self.password.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Topics {
    /// Topic the compiled command sequence is published on
    pub command: String,
    /// Topic the device acknowledges on
    pub ack: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            command: "pressure_profile".to_string(),
            ack: "espresso_machine".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DispatchCfg {
    /// Wait after connect before the channel is considered ready (ms)
    pub settle_ms: u64,
    /// Bounded wait for the device acknowledgment (ms)
    pub ack_timeout_ms: u64,
    /// Largest serialized command sequence we are willing to publish
    pub max_payload_bytes: usize,
}

impl Default for DispatchCfg {
    fn default() -> Self {
        Self {
            settle_ms: 500,
            ack_timeout_ms: 5_000,
            max_payload_bytes: 500,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AuthCfg {
    /// Operator secret checked before any dispatch; prefer `secret_env`.
    pub secret: Option<String>,
    /// Environment variable holding the operator secret.
    pub secret_env: Option<String>,
}

impl AuthCfg {
    /// Resolve the dispatch secret, environment first.
    pub fn resolve_secret(&self) -> eyre::Result<String> {
        if let Some(var) = self.secret_env.as_deref()
            && let Ok(v) = std::env::var(var)
            && !v.is_empty()
        {
            return Ok(v);
        }
        match self.secret.as_deref() {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => eyre::bail!("auth secret is not configured (set auth.secret or auth.secret_env)"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProfilesCfg {
    /// Directory holding one `<name>.csv` per profile
    pub dir: PathBuf,
}

impl Default for ProfilesCfg {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("profiles"),
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
    #[serde(default)]
    pub actuator: ActuatorCfg,
    pub broker: BrokerCfg,
    #[serde(default)]
    pub topics: Topics,
    #[serde(default)]
    pub dispatch: DispatchCfg,
    #[serde(default)]
    pub auth: AuthCfg,
    #[serde(default)]
    pub profiles: ProfilesCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Actuator
        if self.actuator.steps_per_revolution == 0 {
            eyre::bail!("actuator.steps_per_revolution must be > 0");
        }
        if !self.actuator.bar_per_revolution.is_finite() || self.actuator.bar_per_revolution <= 0.0
        {
            eyre::bail!("actuator.bar_per_revolution must be a positive number");
        }

        // Broker
        if self.broker.host.trim().is_empty() {
            eyre::bail!("broker.host must not be empty");
        }
        if self.broker.port == 0 {
            eyre::bail!("broker.port must be > 0");
        }

        // Topics
        if self.topics.command.trim().is_empty() {
            eyre::bail!("topics.command must not be empty");
        }
        if self.topics.ack.trim().is_empty() {
            eyre::bail!("topics.ack must not be empty");
        }
        if self.topics.command == self.topics.ack {
            eyre::bail!("topics.command and topics.ack must differ");
        }

        // Dispatch
        if self.dispatch.ack_timeout_ms == 0 {
            eyre::bail!("dispatch.ack_timeout_ms must be >= 1");
        }
        if self.dispatch.ack_timeout_ms > 10 * 60 * 1000 {
            eyre::bail!("dispatch.ack_timeout_ms is unreasonably large (>10min)");
        }
        if self.dispatch.settle_ms > 60 * 1000 {
            eyre::bail!("dispatch.settle_ms is unreasonably large (>60s)");
        }
        if self.dispatch.max_payload_bytes == 0 {
            eyre::bail!("dispatch.max_payload_bytes must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        Ok(())
    }
}

/// Read profile rows from any CSV source with an exact `time,pressure` header.
pub fn read_profile_csv<R: std::io::Read>(reader: R) -> eyre::Result<Vec<ProfileRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers: {}", e))?
        .clone();
    let expected = ["time", "pressure"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "profile CSV must have headers 'time,pressure', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<ProfileRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    Ok(rows)
}

pub fn load_profile_csv(path: &Path) -> eyre::Result<Vec<ProfileRow>> {
    let file = std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("open profile CSV {:?}: {}", path, e))?;
    read_profile_csv(file).map_err(|e| eyre::eyre!("{:?}: {}", path, e))
}

/// Write rows with a `time,pressure` header. The file is replaced atomically.
pub fn write_profile_csv(path: &Path, rows: &[ProfileRow]) -> eyre::Result<()> {
    let tmp = path.with_extension("csv.tmp");
    {
        let mut wtr = csv::Writer::from_path(&tmp)
            .map_err(|e| eyre::eyre!("create profile CSV {:?}: {}", tmp, e))?;
        if rows.is_empty() {
            wtr.write_record(["time", "pressure"])?;
        }
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
    }
    std::fs::rename(&tmp, path)
        .map_err(|e| eyre::eyre!("replace profile CSV {:?}: {}", path, e))?;
    Ok(())
}

/// Directory of named profiles, one `<name>.csv` each.
#[derive(Debug, Clone)]
pub struct ProfileDir {
    root: PathBuf,
}

impl ProfileDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Profile names are limited to `[A-Za-z0-9_-]+`.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= 64
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    pub fn path_for(&self, name: &str) -> eyre::Result<PathBuf> {
        if !Self::is_valid_name(name) {
            eyre::bail!("invalid profile name {name:?} (allowed: letters, digits, '_' and '-')");
        }
        Ok(self.root.join(format!("{name}.csv")))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn load(&self, name: &str) -> eyre::Result<Vec<ProfileRow>> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            eyre::bail!("profile {name:?} not found in {:?}", self.root);
        }
        load_profile_csv(&path)
    }

    pub fn save(&self, name: &str, rows: &[ProfileRow]) -> eyre::Result<()> {
        let path = self.path_for(name)?;
        std::fs::create_dir_all(&self.root)
            .map_err(|e| eyre::eyre!("create profile dir {:?}: {}", self.root, e))?;
        write_profile_csv(&path, rows)?;
        tracing::debug!(profile = name, rows = rows.len(), path = ?path, "profile saved");
        Ok(())
    }

    /// Names of all stored profiles. A missing directory is an empty store.
    pub fn list(&self) -> eyre::Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        let entries = match std::fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => eyre::bail!("read profile dir {:?}: {}", self.root, e),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && Self::is_valid_name(stem)
            {
                names.insert(stem.to_string());
            }
        }
        Ok(names)
    }
}
