use std::sync::Arc;
use std::time::Duration;

use presso_core::{
    ActuatorConstants, DispatchCfg, DispatchError, DispatchReport, Dispatcher, Profile,
    SharedSecret, compile,
};
use presso_link::{SimOptions, SimRecord, SimulatedDevice};
use presso_traits::ManualClock;

fn run(opts: SimOptions, timeout_ms: u64) -> (Result<DispatchReport, DispatchError>, SimRecord) {
    let cfg = DispatchCfg {
        ack_timeout: Duration::from_millis(timeout_ms),
        ..DispatchCfg::default()
    };
    let device = SimulatedDevice::new(cfg.ack_topic.clone(), opts);
    let stats = device.stats();
    let d = Dispatcher::new(device, cfg, SharedSecret::new("pw"))
        .with_clock(Arc::new(ManualClock::new()));
    let seq = compile(&Profile::classic(), &ActuatorConstants::default());
    let res = d.dispatch(&seq, "pw");
    drop(d);
    (res, stats.snapshot())
}

#[test]
fn simulated_device_acknowledges_dispatch() {
    let (res, rec) = run(SimOptions::default(), 2_000);
    let report = res.unwrap();
    assert_eq!(report.ack.as_deref(), Some("profile received"));
    assert_eq!(rec.connects, 1);
    assert_eq!(rec.disconnects, 1);
    assert_eq!(rec.published.len(), 1);
    assert_eq!(rec.published[0].topic, "pressure_profile");
    assert!(rec.published[0].payload.starts_with(b"[{\"t\":0,"));
}

#[test]
fn silent_device_times_out() {
    let opts = SimOptions {
        silent: true,
        ..SimOptions::default()
    };
    let (res, rec) = run(opts, 150);
    assert_eq!(res.unwrap_err(), DispatchError::AckTimeout { waited_ms: 150 });
    assert_eq!(rec.published.len(), 1);
    assert_eq!(rec.disconnects, 1);
}

#[test]
fn refused_connect_is_transport_error() {
    let opts = SimOptions {
        refuse_connect: true,
        ..SimOptions::default()
    };
    let (res, rec) = run(opts, 1_000);
    match res.unwrap_err() {
        DispatchError::Transport(msg) => assert!(msg.contains("connection refused"), "{msg}"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(rec.published.is_empty());
    assert_eq!(rec.disconnects, 1);
}

#[test]
fn rejected_publish_is_transport_error() {
    let opts = SimOptions {
        reject_publish: true,
        ..SimOptions::default()
    };
    let (res, rec) = run(opts, 1_000);
    assert!(matches!(res, Err(DispatchError::Transport(ref m)) if m.starts_with("publish")));
    assert_eq!(rec.disconnects, 1);
}

#[test]
fn device_limit_is_enforced_before_connect() {
    let opts = SimOptions {
        max_payload: Some(32),
        ..SimOptions::default()
    };
    let (res, rec) = run(opts, 1_000);
    assert!(matches!(
        res,
        Err(DispatchError::PayloadTooLarge { limit: 32, .. })
    ));
    assert_eq!(rec.connects, 0);
}

#[test]
fn device_refuses_oversized_publish_on_the_wire() {
    use presso_link::error::LinkError;
    use presso_traits::{MessageChannel, QoS};

    let mut device = SimulatedDevice::new(
        "espresso_machine",
        SimOptions {
            max_payload: Some(8),
            ..SimOptions::default()
        },
    );
    let stats = device.stats();
    device.connect("localhost", 8883).unwrap();
    let err = device
        .publish("pressure_profile", b"0123456789", QoS::AtLeastOnce)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LinkError>(),
        Some(LinkError::PayloadTooLarge { size: 10, limit: 8 })
    ));
    device
        .publish("pressure_profile", b"[]", QoS::AtLeastOnce)
        .unwrap();
    device.disconnect().unwrap();
    assert_eq!(stats.snapshot().published.len(), 1);
}
