//! Tests for the `camera-timelapse` binary: argument handling, configuration
//! validation and the offline `assemble` and `record` failure paths.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

mod common;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("camera-timelapse").unwrap();
    cmd.env_remove("RUST_LOG").env_remove("TIMELAPSE_CONFIG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("record"))
        .stdout(predicate::str::contains("assemble"));
}

#[test]
fn test_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_record_requires_camera() {
    cmd()
        .arg("record")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--camera"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_dir, config_path) = common::temp_config_file("timelapse:\n  default_interval: 0\n");
    let frames = TempDir::new().unwrap();

    cmd()
        .arg("--config")
        .arg(&config_path)
        .arg("assemble")
        .arg("--frames")
        .arg(frames.path())
        .arg("--output")
        .arg(frames.path().join("out.mp4"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("default_interval"));
}

#[test]
fn test_assemble_empty_directory_fails() {
    let (_dir, config_path) = common::temp_config_file("logging:\n  level: warn\n");
    let frames = TempDir::new().unwrap();

    cmd()
        .arg("--config")
        .arg(&config_path)
        .arg("assemble")
        .arg("--frames")
        .arg(frames.path())
        .arg("--output")
        .arg(frames.path().join("out.mp4"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No frames captured"));
}

#[test]
fn test_assemble_reports_missing_encoder() {
    let (_dir, config_path) = common::temp_config_file(
        "logging:\n  level: warn\nencoder:\n  ffmpeg_path: /nonexistent/bin/ffmpeg\n",
    );
    let work = TempDir::new().unwrap();
    let frames = work.path().join("timelapse_porch_20240101_000000");
    common::write_frames(&frames, 3);

    cmd()
        .arg("--config")
        .arg(&config_path)
        .arg("assemble")
        .arg("--frames")
        .arg(&frames)
        .arg("--output")
        .arg(work.path().join("out.mp4"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_record_rejects_non_positive_interval() {
    let (_dir, config_path) = common::temp_config_file("logging:\n  level: warn\n");

    cmd()
        .arg("--config")
        .arg(&config_path)
        .arg("record")
        .arg("--camera")
        .arg("camera.porch")
        .arg("--interval")
        .arg("-5")
        .assert()
        .failure()
        .stderr(predicate::str::contains("interval must be greater than 0"));
}

#[test]
fn test_record_rejects_malformed_entity_id() {
    let (_dir, config_path) = common::temp_config_file("logging:\n  level: warn\n");

    cmd()
        .arg("--config")
        .arg(&config_path)
        .arg("record")
        .arg("--camera")
        .arg("Front Door")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid entity id"));
}
