//! End-to-end runs of the `hashroll` binary against a state file.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

const CONFIG: &str = r#"
component: telemeter-client
namespace: openshift-monitoring
image: quay.io/openshift/telemeter:latest
trusted_ca:
  source: telemeter-trusted-ca-bundle-source
  logical_name: telemeter-trusted-ca-bundle
"#;

fn hashroll_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hashroll"));
    cmd.current_dir(dir)
        .env_remove("HASHROLL_CONFIG")
        .env("RUST_LOG", "warn")
        .args(["--config", "hashroll.yaml", "--state", "state.json"]);
    cmd
}

fn workspace(config: &str) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("hashroll.yaml"), config).expect("write config");
    dir
}

fn json_stdout(cmd: &mut Command) -> Value {
    let out = cmd.output().expect("run");
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("json stdout")
}

fn version_of(report: &Value) -> Option<String> {
    report["steps"]
        .as_array()?
        .iter()
        .find_map(|s| s["version"].as_str().map(str::to_owned))
}

#[test]
fn converge_then_roll_bundle_then_teardown() {
    let dir = workspace(CONFIG);
    fs::write(dir.path().join("bundle.pem"), "AAA").unwrap();
    hashroll_cmd(dir.path())
        .args(["seed-source", "bundle.pem"])
        .assert()
        .success()
        .stdout(contains("telemeter-trusted-ca-bundle-source"));

    let first = json_stdout(hashroll_cmd(dir.path()).args(["converge", "--json"]));
    assert_eq!(first["direction"], "converge");
    let v1 = version_of(&first).expect("first version");

    fs::write(dir.path().join("bundle.pem"), "AAA\nBBB").unwrap();
    hashroll_cmd(dir.path())
        .args(["seed-source", "bundle.pem"])
        .assert()
        .success();

    let second = json_stdout(hashroll_cmd(dir.path()).args(["run", "--json"]));
    let v2 = version_of(&second).expect("second version");
    assert_ne!(v1, v2);
    let pruned: Vec<&str> = second["steps"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|s| s["pruned"].as_array().into_iter().flatten())
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(pruned, vec![v1.as_str()]);

    hashroll_cmd(dir.path())
        .args(["status"])
        .assert()
        .success()
        .stdout(contains(v2.as_str()))
        .stdout(contains("Deployment"));

    hashroll_cmd(dir.path())
        .args(["teardown"])
        .assert()
        .success()
        .stdout(contains("torn down"));

    let status = json_stdout(hashroll_cmd(dir.path()).args(["status", "--json"]));
    let names: Vec<&str> = status
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|o| o["name"].as_str())
        .collect();
    assert_eq!(names, vec!["telemeter-trusted-ca-bundle-source"]);
}

#[test]
fn status_selector_lists_only_matching_versions() {
    let dir = workspace(CONFIG);
    fs::write(dir.path().join("bundle.pem"), "AAA").unwrap();
    hashroll_cmd(dir.path())
        .args(["seed-source", "bundle.pem"])
        .assert()
        .success();
    let report = json_stdout(hashroll_cmd(dir.path()).args(["converge", "--json"]));
    let version = version_of(&report).expect("version");

    let status = json_stdout(hashroll_cmd(dir.path()).args([
        "status",
        "--json",
        "--selector",
        "hashroll.io/name=telemeter-trusted-ca-bundle",
    ]));
    let names: Vec<&str> = status
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|o| o["name"].as_str())
        .collect();
    assert_eq!(names, vec![version.as_str()]);

    hashroll_cmd(dir.path())
        .args(["status", "--selector", "hashroll.io/name"])
        .assert()
        .failure()
        .stderr(contains("invalid label selector"));
}

#[test]
fn disabled_config_tears_down_on_run() {
    let dir = workspace(&format!("{CONFIG}enabled: false\n"));
    let report = json_stdout(hashroll_cmd(dir.path()).args(["run", "--json"]));
    assert_eq!(report["direction"], "teardown");
    assert!(report["steps"]
        .as_array()
        .unwrap()
        .iter()
        .all(|s| s["applied"] == "already_absent"));
}

#[test]
fn teardown_of_empty_state_has_nothing_to_do() {
    let dir = workspace(CONFIG);
    hashroll_cmd(dir.path())
        .args(["teardown"])
        .assert()
        .success()
        .stdout(contains("nothing to do"));
}

#[test]
fn hash_prints_deterministic_name() {
    let dir = workspace(CONFIG);
    fs::write(dir.path().join("bundle.pem"), "AAA").unwrap();

    let run = || {
        json_stdout(hashroll_cmd(dir.path()).args([
            "hash",
            "bundle.pem",
            "--logical-name",
            "trusted-ca",
            "--json",
        ]))
    };
    let a = run();
    let b = run();
    assert_eq!(a, b);
    let name = a["name"].as_str().unwrap();
    assert!(name.starts_with("trusted-ca-"));
    assert_eq!(a["hash"].as_str().unwrap().len(), 16);
}

#[test]
fn hash_rejects_bad_logical_name() {
    let dir = workspace(CONFIG);
    fs::write(dir.path().join("bundle.pem"), "AAA").unwrap();
    hashroll_cmd(dir.path())
        .args(["hash", "bundle.pem", "--logical-name", "Not_Valid"])
        .assert()
        .failure()
        .stderr(contains("invalid logical name"));
}

#[test]
fn missing_config_fails_with_path() {
    let dir = TempDir::new().unwrap();
    hashroll_cmd(dir.path())
        .args(["converge"])
        .assert()
        .failure()
        .stderr(contains("hashroll.yaml"));
}

#[test]
fn corrupt_state_file_fails_the_pass() {
    let dir = workspace(CONFIG);
    fs::write(dir.path().join("state.json"), "{ not json").unwrap();
    hashroll_cmd(dir.path())
        .args(["converge"])
        .assert()
        .failure()
        .stderr(contains("pass for 'telemeter-client' failed"));
}
