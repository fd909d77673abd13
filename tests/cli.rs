use assert_cmd::Command;
use predicates::prelude::*;

const VALID_CONFIG: &str = "\
tunnel: 6ff42ae2-765d-4adf-8112-31c55c1551ef
ingress:
  - hostname: app.example.com
    service: http://localhost:8080
  - service: http_status:404
";

fn tunnelkeeper() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tunnelkeeper"));
    cmd.arg("--config").arg("/nonexistent/tunnelkeeper.yaml");
    cmd
}

#[test]
fn test_version_flag() {
    tunnelkeeper()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("tunnelkeeper v"));
}

#[test]
fn test_build_info_flag() {
    tunnelkeeper()
        .arg("--build-info")
        .assert()
        .success()
        .stdout(predicate::str::contains("Journal backends:"));
}

#[test]
fn test_validate_accepts_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(&path, VALID_CONFIG).unwrap();

    tunnelkeeper()
        .args(["tunnel-config", "validate", "--path"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("OK (2 ingress rules)"));
}

#[test]
fn test_validate_rejects_missing_ingress() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(&path, "tunnel: abc\n").unwrap();

    tunnelkeeper()
        .args(["tunnel-config", "validate", "--path"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ingress rules are required"));
}

#[test]
fn test_apply_installs_validated_config() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("new.yml");
    let target = dir.path().join("config.yml");
    std::fs::write(&source, VALID_CONFIG).unwrap();

    tunnelkeeper()
        .args(["tunnel-config", "apply"])
        .arg(&source)
        .arg("--path")
        .arg(&target)
        .assert()
        .success();

    let written = std::fs::read_to_string(&target).unwrap();
    assert!(written.contains("http_status:404"));
}

#[test]
fn test_apply_refuses_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("new.yml");
    let target = dir.path().join("config.yml");
    std::fs::write(&source, "ingress:\n  - hostname: app.example.com\n").unwrap();

    tunnelkeeper()
        .args(["tunnel-config", "apply"])
        .arg(&source)
        .arg("--path")
        .arg(&target)
        .assert()
        .failure()
        .stderr(predicate::str::contains("last ingress rule must have a service"));

    assert!(!target.exists());
}

#[test]
fn test_invalid_app_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("tunnelkeeper.yaml");
    std::fs::write(&config, "follow_poll_millis: 0\n").unwrap();

    Command::new(env!("CARGO_BIN_EXE_tunnelkeeper"))
        .arg("--config")
        .arg(&config)
        .args(["tunnel-config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
