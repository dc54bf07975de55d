//! Dispatch subcommand: channel assembly and the JSON result line.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use eyre::Result;
use presso_core::{DispatchCfg, Dispatcher, SharedSecret, compile};
use presso_link::{SimOptions, SimulatedDevice};
use presso_traits::MessageChannel;

use crate::error_fmt::dispatch_reason_name;
use crate::profiles::App;

type BoxedChannel = Box<dyn MessageChannel + Send>;

pub struct DispatchArgs<'a> {
    pub name: &'a str,
    pub credential: Option<&'a str>,
    pub ack_timeout_ms: Option<u64>,
    pub simulate: bool,
    pub simulate_silent: bool,
}

#[cfg(feature = "mqtt")]
fn broker_channel(cfg: &presso_config::Config) -> Option<BoxedChannel> {
    use presso_link::{MqttChannel, MqttSettings};
    let b = &cfg.broker;
    let settings = MqttSettings {
        client_id: if b.client_id.is_empty() {
            "presso".to_string()
        } else {
            b.client_id.clone()
        },
        username: b.username.clone(),
        password: b.resolve_password(),
        tls: b.tls,
        ..MqttSettings::default()
    };
    Some(Box::new(MqttChannel::new(settings)))
}

#[cfg(not(feature = "mqtt"))]
fn broker_channel(_cfg: &presso_config::Config) -> Option<BoxedChannel> {
    None
}

/// Name of the backend `dispatch` would use with the given flags.
pub fn backend_name(simulate: bool) -> &'static str {
    if simulate || !cfg!(feature = "mqtt") {
        "simulated"
    } else {
        "mqtt"
    }
}

fn make_channel(app: &App, args: &DispatchArgs<'_>) -> BoxedChannel {
    let simulated = args.simulate || args.simulate_silent;
    if !simulated
        && let Some(ch) = broker_channel(&app.cfg)
    {
        return ch;
    }
    let mut opts = SimOptions::from_env();
    opts.silent |= args.simulate_silent;
    Box::new(SimulatedDevice::new(app.cfg.topics.ack.clone(), opts))
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

pub fn run_dispatch(app: &App, args: &DispatchArgs<'_>, cancel: Arc<AtomicBool>) -> Result<()> {
    let (name, profile) = app.profile(Some(args.name))?;
    let sequence = compile(&profile, &app.constants);

    let mut cfg = DispatchCfg::from(&app.cfg);
    if let Some(ms) = args.ack_timeout_ms {
        cfg.ack_timeout = Duration::from_millis(ms.max(1));
    }
    let secret = app.cfg.auth.resolve_secret()?;
    let backend = backend_name(args.simulate || args.simulate_silent);
    tracing::info!(
        profile = %name,
        commands = sequence.len(),
        backend,
        host = %cfg.host,
        port = cfg.port,
        "dispatch start"
    );

    let dispatcher = Dispatcher::new(make_channel(app, args), cfg, SharedSecret::new(secret))
        .with_cancel_flag(cancel);
    let result = dispatcher.dispatch(&sequence, args.credential.unwrap_or_default());

    if app.json {
        let (outcome, payload_bytes, elapsed_ms) = match &result {
            Ok(r) => ("acknowledged", Some(r.payload_bytes), Some(r.elapsed_ms)),
            Err(e) => (dispatch_reason_name(e), None, None),
        };
        println!(
            "{}",
            serde_json::json!({
                "timestamp": unix_ts(),
                "profile": name,
                "commands": sequence.len(),
                "payload_bytes": payload_bytes,
                "elapsed_ms": elapsed_ms,
                "outcome": outcome,
            })
        );
    }

    let report = result.map_err(eyre::Report::new)?;
    if !app.json {
        println!(
            "dispatched {name}: {} commands, {} bytes, acknowledged in {} ms",
            report.commands, report.payload_bytes, report.elapsed_ms
        );
        if let Some(ack) = report.ack.as_deref() {
            println!("machine: {ack}");
        }
    }
    Ok(())
}
