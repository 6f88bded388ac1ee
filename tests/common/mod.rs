//! Shared test utilities and fixtures
//!
//! A wiremock server standing in for the Gemini `generateContent` endpoint.
//! Requests are told apart by text the pipeline puts in the request body:
//! the stage instructions for metadata and clocks, the per-ply context for moves.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use scoresheet_engine::{
    ChessRules, GeminiConfig, GeminiRecognizer, MediaType, Pipeline, PipelineConfig,
    ScoresheetImage,
};
use scoresheet_providers::retry::RetryConfig;
use scoresheet_types::{Color, move_number};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_API_KEY: &str = "test-google-key";
pub const MOVE_MODEL: &str = "gemini-test-pro";
pub const FAST_MODEL: &str = "gemini-test-flash";

/// Text unique to the metadata stage instructions.
pub const METADATA_MARKER: &str = "header of a handwritten chess scoresheet";
/// Text unique to the clock stage instructions.
pub const CLOCKS_MARKER: &str = "clock times written next to the moves";

pub async fn start_gemini_mock() -> MockServer {
    MockServer::start().await
}

pub fn gemini_config(server: &MockServer) -> GeminiConfig {
    let mut config = GeminiConfig::new(TEST_API_KEY);
    config.model = MOVE_MODEL.to_string();
    config.fast_model = FAST_MODEL.to_string();
    config.base_url = format!("{}/v1beta", server.uri());
    config.request_timeout = Duration::from_secs(5);
    config.retry = RetryConfig {
        max_retries: 0,
        ..RetryConfig::default()
    };
    config
}

pub fn gemini_pipeline(server: &MockServer, config: PipelineConfig) -> Pipeline {
    let recognizer = GeminiRecognizer::new(gemini_config(server)).expect("valid test config");
    Pipeline::new(Arc::new(recognizer), Arc::new(ChessRules), config)
}

pub fn sheet_image() -> ScoresheetImage {
    ScoresheetImage::new(b"\xFF\xD8\xFF\xE0scoresheet".to_vec(), MediaType::Jpeg)
}

pub fn generate_path(model: &str) -> String {
    format!("/v1beta/models/{model}:generateContent")
}

/// Body of a successful `generateContent` response carrying `text`.
pub fn gemini_reply(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "text": text }]
            },
            "finishReason": "STOP"
        }],
        "modelVersion": MOVE_MODEL
    })
}

/// The move context sentence that identifies a ply in the request body.
pub fn ply_marker(ply: usize) -> String {
    format!("Read {}'s move number {}.", Color::for_ply(ply), move_number(ply))
}

pub async fn mount_metadata(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path(generate_path(FAST_MODEL)))
        .and(body_string_contains(METADATA_MARKER))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(text)))
        .mount(server)
        .await;
}

pub async fn mount_clocks(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path(generate_path(FAST_MODEL)))
        .and(body_string_contains(CLOCKS_MARKER))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(text)))
        .mount(server)
        .await;
}

pub async fn mount_clock_error(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path(generate_path(FAST_MODEL)))
        .and(body_string_contains(CLOCKS_MARKER))
        .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "error": { "code": status, "message": "clock model overloaded", "status": "UNAVAILABLE" }
        })))
        .mount(server)
        .await;
}

pub async fn mount_move(server: &MockServer, ply: usize, text: &str) {
    Mock::given(method("POST"))
        .and(path(generate_path(MOVE_MODEL)))
        .and(header("x-goog-api-key", TEST_API_KEY))
        .and(body_string_contains(ply_marker(ply)))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(text)))
        .mount(server)
        .await;
}

/// One reply per ply, then `END` for the ply after the last.
pub async fn mount_moves(server: &MockServer, moves: &[&str]) {
    for (ply, text) in moves.iter().enumerate() {
        mount_move(server, ply, text).await;
    }
    mount_move(server, moves.len(), "END").await;
}

/// Metadata and clocks that every happy-path test shares.
pub async fn mount_header_and_clocks(server: &MockServer) {
    mount_metadata(
        server,
        "```json\n{\"event\": \"Spring Open\", \"white\": \"Ada\", \"black\": \"Grace\", \"round\": \"2\"}\n```",
    )
    .await;
    mount_clocks(
        server,
        r#"[{"white": "1:29:10", "black": "1:29:55"}, {"white": "1:27:02"}]"#,
    )
    .await;
}
