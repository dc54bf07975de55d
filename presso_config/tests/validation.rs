use presso_config::load_toml;
use rstest::rstest;

const MINIMAL: &str = r#"
[broker]
host = "broker.local"
port = 8883
"#;

#[test]
fn minimal_config_uses_defaults() {
    let cfg = load_toml(MINIMAL).expect("parse TOML");
    cfg.validate().expect("minimal config should pass");
    assert_eq!(cfg.actuator.steps_per_revolution, 4096);
    assert!((cfg.actuator.bar_per_revolution - 2.0).abs() < f64::EPSILON);
    assert_eq!(cfg.topics.command, "pressure_profile");
    assert_eq!(cfg.topics.ack, "espresso_machine");
    assert_eq!(cfg.dispatch.settle_ms, 500);
    assert_eq!(cfg.dispatch.ack_timeout_ms, 5_000);
    assert_eq!(cfg.dispatch.max_payload_bytes, 500);
    assert!(cfg.broker.tls);
}

#[test]
fn missing_broker_is_a_parse_error() {
    let err = load_toml("[actuator]\nsteps_per_revolution = 200\n").expect_err("broker required");
    assert!(format!("{err}").contains("broker"));
}

#[rstest]
#[case("[actuator]\nsteps_per_revolution = 0", "steps_per_revolution must be > 0")]
#[case("[actuator]\nbar_per_revolution = 0.0", "bar_per_revolution must be a positive number")]
#[case("[actuator]\nbar_per_revolution = -2.0", "bar_per_revolution must be a positive number")]
#[case("[dispatch]\nack_timeout_ms = 0", "ack_timeout_ms must be >= 1")]
#[case("[dispatch]\nmax_payload_bytes = 0", "max_payload_bytes must be >= 1")]
#[case("[topics]\ncommand = \"same\"\nack = \"same\"", "must differ")]
#[case("[topics]\nack = \"\"", "topics.ack must not be empty")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation")]
fn rejects_invalid_sections(#[case] extra: &str, #[case] needle: &str) {
    let toml = format!("{MINIMAL}\n{extra}\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "expected {needle:?} in {err}"
    );
}

#[test]
fn older_rig_constants_are_accepted() {
    let toml = format!("{MINIMAL}\n[actuator]\nsteps_per_revolution = 200\nbar_per_revolution = 2.0\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    cfg.validate().expect("200 steps/rev is valid");
    assert_eq!(cfg.actuator.steps_per_revolution, 200);
}

#[test]
fn auth_secret_from_config_value() {
    let toml = format!("{MINIMAL}\n[auth]\nsecret = \"brew\"\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    assert_eq!(cfg.auth.resolve_secret().unwrap(), "brew");
}

#[test]
fn auth_secret_missing_is_an_error() {
    let cfg = load_toml(MINIMAL).expect("parse TOML");
    let err = cfg.auth.resolve_secret().expect_err("no secret configured");
    assert!(format!("{err}").contains("auth secret is not configured"));
}

#[test]
fn auth_secret_env_falls_back_to_value_when_unset() {
    let toml = format!(
        "{MINIMAL}\n[auth]\nsecret = \"fallback\"\nsecret_env = \"PRESSO_TEST_SECRET_THAT_IS_NEVER_SET\"\n"
    );
    let cfg = load_toml(&toml).expect("parse TOML");
    assert_eq!(cfg.auth.resolve_secret().unwrap(), "fallback");
}
