//! Handwriting recognizer clients.
//!
//! # Architecture
//!
//! Every recognizer implements [`Recognizer`]: given the scoresheet image, the
//! instructions of one pipeline stage and optional prior context, it returns
//! raw text. What the text means is decided downstream; a recognizer never
//! validates chess moves or clock formats.
//!
//! - [`gemini`] - Google Gemini `generateContent` client
//! - [`scripted`] - fixed answers, for offline replay and tests
//!
//! # Error Handling
//!
//! Transport failures and retryable HTTP statuses are retried with backoff
//! (see [`retry`]). Anything left over is returned as a [`RecognizerError`];
//! the pipeline decides whether it costs a stage or only ends a transcript.

pub mod gemini;
pub mod retry;
pub mod scripted;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use scoresheet_types::{RecognitionTask, ScoresheetImage};
use serde_json::Value;
use thiserror::Error;

pub use gemini::{GeminiConfig, GeminiRecognizer};
pub use scripted::ScriptedRecognizer;

pub use scoresheet_types;

/// Canonical Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const CONNECT_TIMEOUT_SECS: u64 = 30;

const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Recognizer future type alias.
pub type RecognizeFut<'a> = Pin<Box<dyn Future<Output = Result<String, RecognizerError>> + Send + 'a>>;

/// One recognizer invocation.
#[derive(Debug, Clone, Copy)]
pub struct RecognitionRequest<'a> {
    pub task: RecognitionTask,
    pub image: &'a ScoresheetImage,
    /// Stage instructions.
    pub prompt: &'a str,
    /// Text describing what has been read so far, if the stage keeps any.
    pub prior_context: Option<&'a str>,
}

#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("recognizer request failed: {0}")]
    Request(String),
    #[error("recognizer API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("recognizer returned no text")]
    EmptyResponse,
    #[error("recognizer response could not be decoded: {0}")]
    InvalidResponse(String),
    #[error("recognizer unavailable: {0}")]
    Unavailable(String),
    #[error("recognizer misconfigured: {0}")]
    Config(String),
}

/// Visual-recognition capability consumed by the pipeline stages.
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn recognize<'a>(&'a self, request: RecognitionRequest<'a>) -> RecognizeFut<'a>;
}

fn base_client_builder(https_only: bool) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .https_only(https_only)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

/// Client with a total request timeout. Plain HTTP is only allowed when
/// `https_only` is false (local endpoints and mock servers).
pub fn http_client_with_timeout(
    timeout: Duration,
    https_only: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder(https_only).timeout(timeout).build()
}

/// Read at most `MAX_ERROR_BODY_BYTES` of an error response body.
pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Pull the human-readable message out of a provider error body.
#[must_use]
pub fn extract_error_message(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body.trim()).ok()?;
    payload
        .pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| payload.pointer("/message").and_then(Value::as_str))
        .map(ToString::to_string)
}
