//! Google Gemini `generateContent` recognizer.
//!
//! Each call is a single non-streaming request carrying the scoresheet image
//! inline (base64) and the stage instructions as the system instruction.
//! Header and clock reads go to the fast model; per-ply move reads go to the
//! main model.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use scoresheet_types::RecognitionTask;
use serde_json::{Value, json};

use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};
use crate::{
    GEMINI_API_BASE_URL, RecognitionRequest, RecognizeFut, Recognizer, RecognizerError,
    extract_error_message, http_client_with_timeout, read_capped_error_body,
};

pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_FAST_MODEL: &str = "gemini-2.5-flash";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default user turn when a stage sends no prior context.
const DEFAULT_USER_TEXT: &str = "Read this chess scoresheet.";

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Model for move transcription.
    pub model: String,
    /// Model for header and clock extraction.
    pub fast_model: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl GeminiConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            base_url: GEMINI_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn model_for(&self, task: RecognitionTask) -> &str {
        match task {
            RecognitionTask::Metadata | RecognitionTask::Clocks => &self.fast_model,
            RecognitionTask::Move { .. } => &self.model,
        }
    }
}

// Manual Debug impl to prevent leaking the API key in logs.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("fast_model", &self.fast_model)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Debug)]
pub struct GeminiRecognizer {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiRecognizer {
    pub fn new(config: GeminiConfig) -> Result<Self, RecognizerError> {
        if config.api_key.trim().is_empty() {
            return Err(RecognizerError::Config("Gemini API key is empty".to_string()));
        }
        let https_only = config.base_url.starts_with("https://");
        let client = http_client_with_timeout(config.request_timeout, https_only)
            .map_err(|e| RecognizerError::Config(format!("HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    async fn generate(&self, request: RecognitionRequest<'_>) -> Result<String, RecognizerError> {
        let model = self.config.model_for(request.task);
        let url = format!(
            "{}/models/{model}:generateContent",
            self.config.base_url.trim_end_matches('/')
        );
        let body = build_request_body(&request);

        tracing::debug!(
            stage = %request.task.stage_key(),
            task = ?request.task,
            model,
            "Sending Gemini recognition request"
        );

        let outcome = send_with_retry(
            || {
                self.client
                    .post(&url)
                    .header("x-goog-api-key", &self.config.api_key)
                    .header("content-type", "application/json")
                    .json(&body)
            },
            &self.config.retry,
        )
        .await;

        let response = match outcome {
            RetryOutcome::Success(response) => response,
            RetryOutcome::HttpError(response) => {
                let status = response.status().as_u16();
                let raw = read_capped_error_body(response).await;
                let message = extract_error_message(&raw).unwrap_or(raw);
                tracing::warn!(status, task = ?request.task, "Gemini request failed");
                return Err(RecognizerError::Api { status, message });
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                return Err(RecognizerError::Request(format!(
                    "connection error after {attempts} attempts: {source}"
                )));
            }
        };

        let payload: Value = response
            .json()
            .await
            .map_err(|e| RecognizerError::InvalidResponse(e.to_string()))?;

        extract_text(&payload).ok_or(RecognizerError::EmptyResponse)
    }
}

impl Recognizer for GeminiRecognizer {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn recognize<'a>(&'a self, request: RecognitionRequest<'a>) -> RecognizeFut<'a> {
        Box::pin(self.generate(request))
    }
}

/// Build the request body for the Gemini API.
///
/// Gemini mixes casing: `system_instruction` and `inline_data` are
/// snake_case, `generationConfig` is camelCase.
fn build_request_body(request: &RecognitionRequest<'_>) -> Value {
    let image = request.image;
    let user_text = request.prior_context.unwrap_or(DEFAULT_USER_TEXT);

    json!({
        "system_instruction": {
            "parts": [{ "text": request.prompt }]
        },
        "contents": [{
            "role": "user",
            "parts": [
                {
                    "inline_data": {
                        "mime_type": image.media_type().mime(),
                        "data": BASE64.encode(image.bytes()),
                    }
                },
                { "text": user_text }
            ]
        }],
        "generationConfig": {
            "temperature": 0.0,
            "candidateCount": 1
        }
    })
}

/// Concatenate the visible text parts of the first candidate.
fn extract_text(payload: &Value) -> Option<String> {
    let parts = payload.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
