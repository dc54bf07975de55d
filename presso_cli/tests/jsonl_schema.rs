use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[broker]
host = "localhost"
port = 8883

[dispatch]
settle_ms = 0
ack_timeout_ms = 300

[auth]
secret = "letmebrew"
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    let profiles = dir.path().join("profiles");
    fs::create_dir_all(&profiles).unwrap();
    fs::write(
        profiles.join("classic.csv"),
        "time,pressure\n0,9\n5,9\n10,6\n20,6\n24,7\n26,7\n30,9\n32,9\n",
    )
    .unwrap();
    path
}

fn json_cmd(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("presso").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(cfg)
        .env("PRESSO_SIMULATE", "true")
        .env_remove("PRESSO_CREDENTIAL")
        .env_remove("PRESSO_SIM_SILENT");
    cmd
}

fn dispatch_line(stdout: &[u8]) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(stdout);
    let line = stdout
        .lines()
        .find(|l| l.contains("\"outcome\""))
        .unwrap_or_else(|| panic!("no JSONL line with outcome; stdout was: {stdout}"));
    serde_json::from_str(line).expect("valid JSON")
}

/// Validate the JSONL schema for an acknowledged dispatch.
#[rstest]
fn jsonl_success_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = json_cmd(&cfg)
        .args(["dispatch", "classic", "--credential", "letmebrew"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v = dispatch_line(&out);

    assert!(v.get("timestamp").and_then(|x| x.as_u64()).is_some());
    assert_eq!(v.get("profile").and_then(|x| x.as_str()), Some("classic"));
    assert_eq!(v.get("commands").and_then(|x| x.as_u64()), Some(7));
    assert!(v.get("payload_bytes").and_then(|x| x.as_u64()).is_some());
    assert!(v.get("elapsed_ms").and_then(|x| x.as_u64()).is_some());
    assert_eq!(v.get("outcome").and_then(|x| x.as_str()), Some("acknowledged"));
}

/// A timed-out dispatch still emits its line, with nulls and the reason.
#[rstest]
fn jsonl_timeout_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let assert = json_cmd(&cfg)
        .args([
            "dispatch",
            "classic",
            "--credential",
            "letmebrew",
            "--simulate-silent",
        ])
        .assert()
        .code(6);
    let output = assert.get_output();
    let v = dispatch_line(&output.stdout);
    assert_eq!(v.get("outcome").and_then(|x| x.as_str()), Some("AckTimeout"));
    assert!(v.get("elapsed_ms").unwrap().is_null());
    assert!(v.get("payload_bytes").unwrap().is_null());

    let stderr = String::from_utf8_lossy(&output.stderr);
    let err_line = stderr
        .lines()
        .find(|l| l.contains("\"reason\""))
        .expect("structured error on stderr");
    let e: serde_json::Value = serde_json::from_str(err_line).unwrap();
    assert_eq!(e["reason"], "AckTimeout");
    assert!(e["message"].as_str().unwrap().contains("300 ms"));
}

#[rstest]
fn compile_json_carries_wire_commands() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let out = json_cmd(&cfg)
        .args(["compile", "classic"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let cmds = v["commands"].as_array().unwrap();
    assert_eq!(cmds.len(), 7);
    for c in cmds {
        let obj = c.as_object().unwrap();
        let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4);
        for k in ["t", "s", "v", "a"] {
            assert!(obj.contains_key(k), "missing {k}");
        }
    }
    assert_eq!(cmds[1]["s"], -6144);
    assert!(v["skipped"].as_array().unwrap().is_empty());
}
