//! End-to-end CLI tests for the segment-loader binary.

use assert_cmd::Command;
use predicates::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn segment_body() -> Vec<u8> {
    let mut body = Vec::new();
    for (tag, size) in [(b"moof", 40u32), (b"mdat", 60u32)] {
        body.extend_from_slice(&size.to_be_bytes());
        body.extend_from_slice(tag);
        body.resize(body.len() + size as usize - 8, 0);
    }
    body
}

/// Test that the binary can be invoked and exits with code 0.
#[test]
fn test_binary_invocation_returns_zero() {
    let mut cmd = Command::cargo_bin("segment-loader").unwrap();
    cmd.assert().success();
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("segment-loader").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fetch media segments"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("segment-loader").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("segment-loader"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("segment-loader").unwrap();
    cmd.arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_verbose_flag_accepted() {
    let mut cmd = Command::cargo_bin("segment-loader").unwrap();
    cmd.arg("-v").assert().success();
}

#[test]
fn test_binary_quiet_flag_accepted() {
    let mut cmd = Command::cargo_bin("segment-loader").unwrap();
    cmd.arg("-q").assert().success();
}

#[test]
fn test_binary_rejects_retries_above_limit() {
    let mut cmd = Command::cargo_bin("segment-loader").unwrap();
    cmd.args(["--max-retries", "11", "https://cdn.invalid/seg.m4s"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("11"));
}

#[test]
fn test_binary_missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.json");
    let mut cmd = Command::cargo_bin("segment-loader").unwrap();
    cmd.arg("--config")
        .arg(&missing)
        .arg("https://cdn.invalid/seg.m4s")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load settings"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_loads_segment_from_server() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video/seg1.m4s"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(segment_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/video/seg1.m4s", mock_server.uri());
    let mut cmd = Command::cargo_bin("segment-loader").unwrap();
    cmd.arg(url).env("RUST_LOG", "info").assert().success();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_probe_reports_missing_segment() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/video/gone.m4s"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let url = format!("{}/video/gone.m4s", mock_server.uri());
    let mut cmd = Command::cargo_bin("segment-loader").unwrap();
    cmd.args(["--probe", url.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("did not load"));
}

#[test]
fn test_binary_unreachable_segment_fails() {
    let mut cmd = Command::cargo_bin("segment-loader").unwrap();
    cmd.args(["-r", "0", "http://127.0.0.1:1/seg.m4s"])
        .assert()
        .failure();
}
