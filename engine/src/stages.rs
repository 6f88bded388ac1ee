//! Extraction stages.
//!
//! A stage reads one concern off the scoresheet image and produces the
//! fragment type of the key it owns. Stages never see the state store; the
//! pipeline writes whatever a stage returns (or its failure) into the slot.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use scoresheet_providers::{RecognitionRequest, Recognizer, RecognizerError};
use scoresheet_rules::RulesEngine;
use scoresheet_types::{ClockEntry, Metadata, RecognitionTask, ScoresheetImage};

use crate::cancel::CancelSignal;
use crate::matching::MatchPolicy;
use crate::prompts;
use crate::state::{ClocksKey, FragmentKey, MetadataKey, MovesKey};
use crate::transcriber::{MoveTranscriber, TranscribeError, Transcript, TranscriberSettings};
use crate::util::{enclosed, strip_code_fence};

/// Stage future type alias.
pub type StageFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, StageError>> + Send + 'a>>;

/// Inputs shared by every stage of a run.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub image: &'a ScoresheetImage,
    pub recognizer: &'a dyn Recognizer,
    pub cancel: &'a CancelSignal,
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
    #[error("unreadable {what}: {message}")]
    Malformed { what: &'static str, message: String },
    #[error(transparent)]
    Transcription(#[from] TranscribeError),
    #[error("cancelled")]
    Cancelled,
}

pub trait Stage: Send + Sync {
    /// The one key this stage writes.
    type Key: FragmentKey;

    fn extract<'a>(
        &'a self,
        ctx: StageContext<'a>,
    ) -> StageFut<'a, <Self::Key as FragmentKey>::Value>;
}

/// Ask the recognizer once, giving up early on cancellation.
async fn recognize_once(
    ctx: StageContext<'_>,
    task: RecognitionTask,
    prompt: &str,
) -> Result<String, StageError> {
    let request = RecognitionRequest {
        task,
        image: ctx.image,
        prompt,
        prior_context: None,
    };
    tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => Err(StageError::Cancelled),
        reply = ctx.recognizer.recognize(request) => Ok(reply?),
    }
}

/// Header fields (event, players, date, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataStage;

impl Stage for MetadataStage {
    type Key = MetadataKey;

    fn extract<'a>(&'a self, ctx: StageContext<'a>) -> StageFut<'a, Metadata> {
        Box::pin(async move {
            let raw =
                recognize_once(ctx, RecognitionTask::Metadata, prompts::METADATA_INSTRUCTIONS)
                    .await?;
            let metadata = parse_metadata(&raw)?;
            tracing::debug!(fields = metadata.len(), "Metadata extracted");
            Ok(metadata)
        })
    }
}

/// Clock readings per move row.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClockStage;

impl Stage for ClockStage {
    type Key = ClocksKey;

    fn extract<'a>(&'a self, ctx: StageContext<'a>) -> StageFut<'a, Vec<ClockEntry>> {
        Box::pin(async move {
            let raw = recognize_once(ctx, RecognitionTask::Clocks, prompts::CLOCK_INSTRUCTIONS)
                .await?;
            let clocks = parse_clocks(&raw)?;
            tracing::debug!(rows = clocks.len(), "Clocks extracted");
            Ok(clocks)
        })
    }
}

/// Moves, validated ply by ply against the rules engine.
#[derive(Clone)]
pub struct MoveStage {
    rules: Arc<dyn RulesEngine>,
    policy: Arc<dyn MatchPolicy>,
    settings: TranscriberSettings,
}

impl MoveStage {
    #[must_use]
    pub fn new(
        rules: Arc<dyn RulesEngine>,
        policy: Arc<dyn MatchPolicy>,
        settings: TranscriberSettings,
    ) -> Self {
        Self {
            rules,
            policy,
            settings,
        }
    }
}

impl Stage for MoveStage {
    type Key = MovesKey;

    fn extract<'a>(&'a self, ctx: StageContext<'a>) -> StageFut<'a, Transcript> {
        Box::pin(async move {
            let transcriber = MoveTranscriber::new(
                self.rules.as_ref(),
                ctx.recognizer,
                self.policy.as_ref(),
                self.settings,
            );
            Ok(transcriber.run(ctx.image, ctx.cancel).await?)
        })
    }
}

/// Parse the metadata reply: a JSON object, possibly fenced or wrapped in prose.
pub fn parse_metadata(raw: &str) -> Result<Metadata, StageError> {
    let value = parse_json(raw, '{', '}', "metadata")?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StageError::Malformed {
            what: "metadata",
            message: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

/// Parse the clock reply: a JSON array of `{white, black?}` rows.
///
/// An object with a `clocks` array is accepted too. Readings are kept as
/// literal text; numbers are rendered as written.
pub fn parse_clocks(raw: &str) -> Result<Vec<ClockEntry>, StageError> {
    let malformed = |message: String| StageError::Malformed {
        what: "clocks",
        message,
    };

    let value = match parse_json(raw, '[', ']', "clocks") {
        Ok(value) => value,
        Err(array_err) => match parse_json(raw, '{', '}', "clocks") {
            Ok(value) => value,
            Err(_) => return Err(array_err),
        },
    };
    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("clocks") {
            Some(Value::Array(rows)) => rows,
            _ => return Err(malformed("expected a JSON array of clock rows".into())),
        },
        other => {
            return Err(malformed(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )));
        }
    };

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            let Value::Object(row) = row else {
                return Err(malformed(format!("clock row {} is not an object", index + 1)));
            };
            let white = row
                .get("white")
                .and_then(clock_text)
                .ok_or_else(|| malformed(format!("clock row {} has no white reading", index + 1)))?;
            let black = row.get("black").and_then(clock_text);
            Ok(ClockEntry { white, black })
        })
        .collect()
}

fn parse_json(raw: &str, open: char, close: char, what: &'static str) -> Result<Value, StageError> {
    let text = strip_code_fence(raw);
    match serde_json::from_str::<Value>(text) {
        Ok(value) => Ok(value),
        Err(first) => enclosed(text, open, close)
            .and_then(|inner| serde_json::from_str(inner).ok())
            .ok_or_else(|| StageError::Malformed {
                what,
                message: first.to_string(),
            }),
    }
}

/// A clock reading exactly as written. Blank strings count as no reading.
///
/// Numbers keep their source digits (`1.50` stays `1.50`) because
/// `serde_json` is built with `arbitrary_precision`.
fn clock_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => (!s.trim().is_empty()).then(|| s.clone()),
        other => Some(other.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
