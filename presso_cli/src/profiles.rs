//! Profile subcommands: list, show, save, compile, preset, self-check.

use eyre::{Result, WrapErr};
use presso_core::{
    ActuatorConstants, CompileReport, CsvProfileStore, Profile, ProfilePoint, ProfileStore,
    SkipReason, compile_report, preset_steps,
};
use serde_json::json;

/// Everything a subcommand needs, assembled once from the config.
pub struct App {
    pub cfg: presso_config::Config,
    pub store: CsvProfileStore,
    pub constants: ActuatorConstants,
    pub json: bool,
}

impl App {
    /// Load a named profile, or the built-in classic one.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, Profile)> {
        match name {
            Some(n) => {
                let p = self.store.load(n).map_err(eyre::Report::new)?;
                Ok((n.to_string(), p))
            }
            None => Ok(("classic".to_string(), Profile::classic())),
        }
    }
}

pub fn list(app: &App) -> Result<()> {
    let names = app.store.list().map_err(eyre::Report::new)?;
    if app.json {
        println!("{}", json!({ "profiles": names }));
    } else if names.is_empty() {
        println!("no profiles in {}", app.store.dir().root().display());
    } else {
        for n in &names {
            println!("{n}");
        }
    }
    Ok(())
}

pub fn show(app: &App, name: &str) -> Result<()> {
    let (name, profile) = app.profile(Some(name))?;
    if app.json {
        let points: Vec<_> = profile
            .points()
            .iter()
            .map(|p| json!({ "time": p.time, "pressure": p.pressure }))
            .collect();
        println!("{}", json!({ "name": name, "points": points }));
        return Ok(());
    }
    println!(
        "{name}: {} points, {:.1} s",
        profile.len(),
        profile.duration()
    );
    for p in profile.points() {
        println!("  {:>6.1} s  {:>5.2} bar", p.time, p.pressure);
    }
    Ok(())
}

pub fn save(app: &mut App, name: &str, points: &[(f64, f64)], classic: bool) -> Result<()> {
    let profile = if classic {
        Profile::classic()
    } else {
        let pts = points
            .iter()
            .map(|&(t, p)| ProfilePoint::new(t, p))
            .collect();
        Profile::from_unsorted(pts).map_err(eyre::Report::new)?
    };
    app.store
        .save(name, &profile)
        .map_err(eyre::Report::new)?;
    tracing::info!(profile = name, points = profile.len(), "profile saved");
    if app.json {
        println!("{}", json!({ "saved": name, "points": profile.len() }));
    } else {
        println!("saved {name} ({} points)", profile.len());
    }
    Ok(())
}

fn skipped_json(report: &CompileReport) -> Vec<serde_json::Value> {
    report
        .skipped
        .iter()
        .map(|(i, reason)| match reason {
            SkipReason::NonPositiveDuration { dt } => {
                json!({ "segment": i, "reason": "non_positive_duration", "dt": dt })
            }
        })
        .collect()
}

pub fn compile(app: &App, name: Option<&str>) -> Result<()> {
    let (name, profile) = app.profile(name)?;
    let report = compile_report(&profile, &app.constants);
    let wire = report
        .sequence
        .to_wire()
        .wrap_err("encode command sequence")?;
    if app.json {
        println!(
            "{}",
            json!({
                "profile": name,
                "commands": report.sequence,
                "payload_bytes": wire.len(),
                "skipped": skipped_json(&report),
            })
        );
        return Ok(());
    }
    println!(
        "{name}: {} commands, {} bytes ({} steps/bar)",
        report.sequence.len(),
        wire.len(),
        app.constants.steps_per_bar()
    );
    for c in &report.sequence {
        println!(
            "  t={:<4} s={:<7} v={:<6} a={:<6} {}",
            c.t,
            c.s,
            c.v,
            c.a,
            c.direction().as_str()
        );
    }
    for (i, SkipReason::NonPositiveDuration { dt }) in &report.skipped {
        println!("  segment {i} skipped (whole-second duration {dt})");
    }
    println!("{}", String::from_utf8_lossy(&wire));
    Ok(())
}

pub fn preset(app: &App, current: f64, name: &str) -> Result<()> {
    let (name, profile) = app.profile(Some(name))?;
    let target = profile
        .start_pressure()
        .ok_or_else(|| eyre::eyre!("profile {name:?} has no points"))?;
    let steps = preset_steps(current, target, &app.constants);
    let direction = presso_core::Direction::of_steps(steps).as_str();
    if app.json {
        println!(
            "{}",
            json!({
                "profile": name,
                "current_bar": current,
                "target_bar": target,
                "steps": steps,
                "direction": direction,
            })
        );
    } else {
        println!("{current:.2} bar -> {target:.2} bar: {steps} steps ({direction})");
    }
    Ok(())
}

pub fn self_check(app: &App, backend: &str) -> Result<()> {
    let names = app.store.list().map_err(eyre::Report::new)?;
    let mut commands = 0usize;
    for n in &names {
        let profile = app.store.load(n).map_err(eyre::Report::new)?;
        commands += compile_report(&profile, &app.constants).sequence.len();
    }
    let secret_ok = app.cfg.auth.resolve_secret().is_ok();
    if !secret_ok {
        tracing::warn!("auth secret is not configured; dispatch will fail");
    }
    if app.json {
        println!(
            "{}",
            json!({
                "ok": true,
                "profiles": names.len(),
                "commands": commands,
                "auth_configured": secret_ok,
                "backend": backend,
                "steps_per_bar": app.constants.steps_per_bar(),
            })
        );
    } else {
        println!(
            "ok: {} profiles ({commands} commands), backend {backend}, auth {}, {} steps/bar",
            names.len(),
            if secret_ok { "configured" } else { "missing" },
            app.constants.steps_per_bar()
        );
    }
    Ok(())
}
