//! Shared helpers for integration tests that talk to a mock search source.

#![allow(dead_code)]

use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SESSION_KEY: &str = "k1";

/// Starts a mock server, or returns `None` when the sandbox forbids binding
/// local sockets.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if let Err(e) = std::net::TcpListener::bind("127.0.0.1:0") {
        eprintln!("skipping: cannot bind local socket ({e})");
        return None;
    }
    Some(MockServer::start().await)
}

/// Bootstrap page carrying `key` in the form-key meta tag.
pub fn bootstrap_html(key: &str) -> String {
    format!(r#"<html><head><meta name="tumblr-form-key" id="tumblr_form_key" content="{key}"></head></html>"#)
}

/// Page envelope whose fragment links the given media file names on `server`.
pub fn page_with_media(server: &MockServer, files: &[&str]) -> serde_json::Value {
    let html: String = files
        .iter()
        .map(|file| format!(r#"<img src="{}/media/{file}">"#, server.uri()))
        .collect();
    json!({ "response": { "posts_html": html } })
}

/// Page envelope marking the end of results.
pub fn empty_page() -> serde_json::Value {
    json!({ "response": { "posts_html": "" } })
}

/// Serves the bootstrap page for `target` once.
pub async fn mount_bootstrap(server: &MockServer, target: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/search/{target}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(bootstrap_html(SESSION_KEY)))
        .expect(1)
        .mount(server)
        .await;
}

/// Serves every media file with a small body.
pub async fn mount_media(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex("^/media/"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"media-bytes".to_vec()))
        .mount(server)
        .await;
}
