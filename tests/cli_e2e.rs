//! End-to-end CLI tests for the search-downloader binary.

use assert_cmd::Command;
use predicates::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::{empty_page, mount_bootstrap, start_mock_server_or_skip};

fn bin() -> Command {
    Command::cargo_bin("search-downloader").unwrap()
}

#[test]
fn test_binary_help_displays_usage() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Search term"))
        .stdout(predicate::str::contains("--concurrency"));
}

#[test]
fn test_binary_version_displays_version() {
    bin()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("search-downloader"));
}

#[test]
fn test_binary_requires_target() {
    bin()
        .assert()
        .failure()
        .stderr(predicate::str::contains("<TARGET>"));
}

#[test]
fn test_binary_rejects_zero_concurrency() {
    bin().args(["cars", "-c", "0"]).assert().failure();
}

#[test]
fn test_binary_rejects_excess_concurrency() {
    bin().args(["cars", "--concurrency", "101"]).assert().failure();
}

#[test]
fn test_binary_rejects_bad_page_list() {
    bin()
        .args(["cars", "--pages", "9-2", "-q"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("9-2"));
}

#[test]
fn test_binary_rejects_unknown_config_key() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "concurrency = 4\nbogus = true\n").unwrap();

    bin()
        .args(["cars", "-q", "--config"])
        .arg(&config)
        .assert()
        .failure();
}

#[tokio::test]
async fn test_binary_crawls_mock_source_and_writes_session_file() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = tempfile::TempDir::new().unwrap();

    mount_bootstrap(&server, "cars").await;
    Mock::given(method("POST"))
        .and(path("/search/cars/post_page/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_page()))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let out = dir.path().to_path_buf();
    tokio::task::spawn_blocking(move || {
        bin()
            .args(["cars", "-q", "-c", "1", "--base-url", &uri, "--output-dir"])
            .arg(&out)
            .env("XDG_CONFIG_HOME", &out)
            .assert()
            .success();
    })
    .await
    .unwrap();

    let saved = std::fs::read_to_string(dir.path().join("cars.json")).unwrap();
    assert!(saved.contains("\"last_complete_crawl\""));
    assert!(saved.contains("\"target\": \"cars\""));
}
