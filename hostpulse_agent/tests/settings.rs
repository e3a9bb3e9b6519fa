use assert_cmd::prelude::*;
use std::fs;
use std::process::Command;

fn agent(xdg: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("hostpulse_agent").expect("binary exists");
    cmd.env("XDG_CONFIG_HOME", xdg)
        .env_remove("HOSTPULSE_INTERVAL_MS")
        .env_remove("HOSTPULSE_TOP_N")
        .env_remove("HOSTPULSE_RANK_BY");
    cmd
}

#[test]
fn save_writes_settings_in_xdg_path() {
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let xdg = tmpdir.path();

    agent(xdg)
        .args(["--save", "-c", "1", "-i", "250", "--top", "4", "--rank-by", "cpu"])
        .assert()
        .success();

    let path = xdg.join("hostpulse").join("config.json");
    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("settings file")).expect("json");
    assert_eq!(saved["interval_ms"], 250);
    assert_eq!(saved["top_n"], 4);
    assert_eq!(saved["rank_by"], "cpu");
}

#[test]
fn settings_file_and_env_are_applied() {
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let xdg = tmpdir.path();
    let dir = xdg.join("hostpulse");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.json"), r#"{"interval_ms": 100, "top_n": 1}"#).unwrap();

    let out = agent(xdg).args(["-c", "1"]).output().expect("run");
    assert!(out.status.success());
    let snap: serde_json::Value =
        serde_json::from_slice(out.stdout.split(|b| *b == b'\n').next().unwrap()).unwrap();
    assert_eq!(snap["top_processes"].as_array().unwrap().len(), 1);

    // environment beats the file
    let out = agent(xdg)
        .env("HOSTPULSE_TOP_N", "2")
        .args(["-c", "1"])
        .output()
        .expect("run");
    let snap: serde_json::Value =
        serde_json::from_slice(out.stdout.split(|b| *b == b'\n').next().unwrap()).unwrap();
    // any real host runs more than two processes
    assert_eq!(snap["top_processes"].as_array().unwrap().len(), 2);
}

#[test]
fn malformed_settings_file_is_ignored() {
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let dir = tmpdir.path().join("hostpulse");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.json"), "interval = fast").unwrap();

    agent(tmpdir.path()).args(["-c", "1", "-i", "100"]).assert().success();
}
