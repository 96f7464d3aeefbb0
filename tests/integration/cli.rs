use assert_cmd::Command;
use ecsgraph::test_utils::fixtures;
use predicates::prelude::*;
use std::path::Path;

/// The binary, isolated from the user's configuration file.
fn ecsgraph_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ecsgraph").unwrap();
    cmd.current_dir(dir).env("ECSGRAPH_CONFIG", dir.join("missing-config.toml")).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_convert_prints_json_template() {
    let temp = tempfile::tempdir().unwrap();
    fixtures::write_project(temp.path(), fixtures::SHOP_PROJECT).unwrap();

    let output = ecsgraph_cmd(temp.path()).arg("convert").output().unwrap();
    assert!(output.status.success());

    let template: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
    assert_eq!(template["Resources"]["webService"]["Properties"]["DesiredCount"], 4);
}

#[test]
fn test_convert_yaml_to_file() {
    let temp = tempfile::tempdir().unwrap();
    let project = fixtures::write_project(temp.path(), fixtures::SHOP_PROJECT).unwrap();
    let output = temp.path().join("stack.yaml");

    ecsgraph_cmd(temp.path())
        .arg("convert")
        .arg(&project)
        .args(["--format", "yaml", "--output"])
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("Wrote"));

    let content = std::fs::read_to_string(&output).unwrap();
    assert!(content.contains("AWSTemplateFormatVersion"));
    assert!(content.contains("webTCP80Listener"));
}

#[test]
fn test_config_output_format_is_used() {
    let temp = tempfile::tempdir().unwrap();
    fixtures::write_project(temp.path(), fixtures::SHOP_PROJECT).unwrap();
    let config = temp.path().join("config.toml");
    std::fs::write(&config, "output = \"yaml\"\n").unwrap();

    ecsgraph_cmd(temp.path())
        .arg("--config")
        .arg(&config)
        .arg("convert")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("AWSTemplateFormatVersion"));
}

#[test]
fn test_configuration_error_exits_non_zero() {
    let temp = tempfile::tempdir().unwrap();
    let content = r#"
name: shop
services:
  web:
    image: nginx
    deploy:
      update_config:
        parallelism: 2
"#;
    fixtures::write_project(temp.path(), content).unwrap();

    ecsgraph_cmd(temp.path())
        .arg("convert")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Invalid configuration for service 'web'"))
        .stderr(predicate::str::contains("suggestion"));
}

#[test]
fn test_validate_reports_summary() {
    let temp = tempfile::tempdir().unwrap();
    fixtures::write_store_project(temp.path()).unwrap();

    ecsgraph_cmd(temp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Project 'store' is compatible"))
        .stdout(predicate::str::contains("Services: 2"));
}

#[test]
fn test_validate_compile_needs_configured_volume() {
    let temp = tempfile::tempdir().unwrap();
    fixtures::write_store_project(temp.path()).unwrap();

    ecsgraph_cmd(temp.path())
        .args(["validate", "--compile"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("uploads"));

    let config = temp.path().join("config.toml");
    std::fs::write(&config, "[filesystems]\nuploads = \"fs-1\"\n").unwrap();
    ecsgraph_cmd(temp.path())
        .args(["validate", "--compile", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Compiles to"));
}

#[test]
fn test_missing_project_file() {
    let temp = tempfile::tempdir().unwrap();
    ecsgraph_cmd(temp.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("compose.yaml"));
}
