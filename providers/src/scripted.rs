//! Recognizer with fixed answers.
//!
//! Replays a known transcription: header and clock texts are returned as
//! given, move reads are answered from a per-ply list and with [`END_OF_MOVES`]
//! past its end. Used to validate typed-in move lists offline and to drive
//! the pipeline deterministically in tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use scoresheet_types::RecognitionTask;

use crate::{RecognitionRequest, RecognizeFut, Recognizer, RecognizerError};

/// Answer given for a ply past the end of the script.
pub const END_OF_MOVES: &str = "END";

#[derive(Debug, Default)]
pub struct ScriptedRecognizer {
    metadata: Option<String>,
    clocks: Option<String>,
    moves: Vec<String>,
    failing: HashSet<RecognitionTask>,
    fail_moves_from: Option<usize>,
    move_delay: Option<Duration>,
    calls: Mutex<Vec<RecognitionTask>>,
}

impl ScriptedRecognizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recognizer that only knows the moves.
    #[must_use]
    pub fn from_moves<I, S>(moves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().with_moves(moves)
    }

    #[must_use]
    pub fn with_metadata(mut self, text: impl Into<String>) -> Self {
        self.metadata = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_clocks(mut self, text: impl Into<String>) -> Self {
        self.clocks = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_moves<I, S>(mut self, moves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.moves = moves.into_iter().map(Into::into).collect();
        self
    }

    /// Make every request for `task` fail.
    #[must_use]
    pub fn failing(mut self, task: RecognitionTask) -> Self {
        self.failing.insert(task);
        self
    }

    /// Make move reads fail from ply `ply` onwards.
    #[must_use]
    pub fn failing_moves_from(mut self, ply: usize) -> Self {
        self.fail_moves_from = Some(ply);
        self
    }

    /// Delay every move answer, to exercise cancellation.
    #[must_use]
    pub fn with_move_delay(mut self, delay: Duration) -> Self {
        self.move_delay = Some(delay);
        self
    }

    /// Tasks requested so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecognitionTask> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn answer(&self, task: RecognitionTask) -> Result<String, RecognizerError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(task);
        }

        if self.failing.contains(&task) {
            return Err(RecognizerError::Unavailable(format!("scripted failure for {task:?}")));
        }

        match task {
            RecognitionTask::Metadata => Ok(self.metadata.clone().unwrap_or_else(|| "{}".into())),
            RecognitionTask::Clocks => Ok(self.clocks.clone().unwrap_or_else(|| "[]".into())),
            RecognitionTask::Move { ply } => {
                if self.fail_moves_from.is_some_and(|from| ply >= from) {
                    return Err(RecognizerError::Unavailable(format!(
                        "scripted failure at ply {ply}"
                    )));
                }
                Ok(self
                    .moves
                    .get(ply)
                    .cloned()
                    .unwrap_or_else(|| END_OF_MOVES.to_string()))
            }
        }
    }
}

impl Recognizer for ScriptedRecognizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize<'a>(&'a self, request: RecognitionRequest<'a>) -> RecognizeFut<'a> {
        Box::pin(async move {
            if let (RecognitionTask::Move { .. }, Some(delay)) = (request.task, self.move_delay) {
                tokio::time::sleep(delay).await;
            }
            self.answer(request.task)
        })
    }
}
