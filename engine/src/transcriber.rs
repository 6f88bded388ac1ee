//! The move validation loop.
//!
//! Moves are read one ply at a time. Each step asks the recognizer for the
//! notation at the next ply, matches it against the legal moves of the
//! current position, and only then advances the position. The loop is an
//! explicit state machine:
//!
//! ```text
//! AwaitingCandidate --(candidate)--> Matching --(match)--> Accepted --> AwaitingCandidate
//!        |                              |
//!        +--(end/limit/cancel/error)--> Halted <--(no match)
//! ```
//!
//! Accepted plies are never revised. Every prefix of the transcript is a
//! legal game from the starting position.

use serde::Serialize;
use thiserror::Error;

use scoresheet_providers::{RecognitionRequest, Recognizer};
use scoresheet_rules::{AdapterFault, ApplyError, LegalMoveSet, Position, RulesEngine};
use scoresheet_types::{Color, MovePair, Ply, RecognitionTask, ScoresheetImage, move_number, pair_plies};

use crate::cancel::CancelSignal;
use crate::candidate::{Candidate, CandidateRead, parse_candidate};
use crate::matching::MatchPolicy;
use crate::prompts;

/// Upper bound on transcribed plies when none is configured.
pub const DEFAULT_MAX_PLIES: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriberSettings {
    pub max_plies: usize,
    /// Include the legal moves of the current position in the move context.
    pub hint_legal_moves: bool,
}

impl Default for TranscriberSettings {
    fn default() -> Self {
        Self {
            max_plies: DEFAULT_MAX_PLIES,
            hint_legal_moves: true,
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum HaltReason {
    /// The position reached a terminal state.
    GameOver,
    /// The candidate matched no legal move.
    NoMatch { candidate: String },
    /// The recognizer reported that no more moves are written.
    InputExhausted,
    PlyLimit,
    Cancelled,
    RecognizerFailed { message: String },
}

impl HaltReason {
    /// True for halts that mean the scoresheet was read to its end.
    #[must_use]
    pub const fn is_natural(&self) -> bool {
        matches!(self, HaltReason::GameOver | HaltReason::InputExhausted)
    }
}

/// Outcome of one run of the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    plies: Vec<Ply>,
    position: Position,
    halt: HaltReason,
}

impl Transcript {
    #[must_use]
    pub fn plies(&self) -> &[Ply] {
        &self.plies
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plies.is_empty()
    }

    /// Position after the last accepted ply.
    #[must_use]
    pub fn position(&self) -> &Position {
        &self.position
    }

    #[must_use]
    pub fn halt(&self) -> &HaltReason {
        &self.halt
    }

    #[must_use]
    pub fn game_over(&self) -> bool {
        self.halt == HaltReason::GameOver
    }

    /// The candidate that stopped the loop, if matching failed.
    #[must_use]
    pub fn no_match(&self) -> Option<&str> {
        match &self.halt {
            HaltReason::NoMatch { candidate } => Some(candidate),
            _ => None,
        }
    }

    /// Terminal error text. Only a recognizer failure carries one.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.halt {
            HaltReason::RecognizerFailed { message } => Some(message),
            _ => None,
        }
    }

    /// Plies grouped into numbered move pairs.
    #[must_use]
    pub fn moves(&self) -> Vec<MovePair> {
        pair_plies(&self.plies)
    }
}

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("rules engine fault at ply {ply}: {source}")]
    Fault {
        ply: usize,
        #[source]
        source: AdapterFault,
    },
}

enum LoopState {
    AwaitingCandidate,
    Matching {
        candidate: Candidate,
        legal: LegalMoveSet,
    },
    Accepted {
        ply: Ply,
        position: Position,
    },
    Halted(HaltReason),
}

/// Drives the validation loop over borrowed capabilities.
pub struct MoveTranscriber<'a> {
    rules: &'a dyn RulesEngine,
    recognizer: &'a dyn Recognizer,
    policy: &'a dyn MatchPolicy,
    settings: TranscriberSettings,
}

impl<'a> MoveTranscriber<'a> {
    #[must_use]
    pub fn new(
        rules: &'a dyn RulesEngine,
        recognizer: &'a dyn Recognizer,
        policy: &'a dyn MatchPolicy,
        settings: TranscriberSettings,
    ) -> Self {
        Self {
            rules,
            recognizer,
            policy,
            settings,
        }
    }

    /// Transcribe the moves on `image`.
    ///
    /// Returns the accepted plies and why the loop stopped. Only a rules
    /// engine fault is an `Err`; every other stop is a [`HaltReason`].
    pub async fn run(
        &self,
        image: &ScoresheetImage,
        cancel: &CancelSignal,
    ) -> Result<Transcript, TranscribeError> {
        let mut position = self.rules.initial_position();
        let mut plies: Vec<Ply> = Vec::new();
        let mut state = LoopState::AwaitingCandidate;

        let halt = loop {
            state = match state {
                LoopState::AwaitingCandidate => {
                    self.await_candidate(&position, &plies, image, cancel).await?
                }
                LoopState::Matching { candidate, legal } => {
                    self.match_candidate(&position, plies.len(), candidate, &legal)?
                }
                LoopState::Accepted { ply, position: next } => {
                    plies.push(ply);
                    position = next;
                    LoopState::AwaitingCandidate
                }
                LoopState::Halted(reason) => break reason,
            };
        };

        tracing::info!(plies = plies.len(), halt = ?halt, "Move transcription finished");
        Ok(Transcript {
            plies,
            position,
            halt,
        })
    }

    async fn await_candidate(
        &self,
        position: &Position,
        plies: &[Ply],
        image: &ScoresheetImage,
        cancel: &CancelSignal,
    ) -> Result<LoopState, TranscribeError> {
        let ply = plies.len();
        let fault = |source: AdapterFault| TranscribeError::Fault { ply, source };

        if self.rules.is_game_over(position).map_err(fault)? {
            return Ok(LoopState::Halted(HaltReason::GameOver));
        }
        if ply >= self.settings.max_plies {
            tracing::warn!(max_plies = self.settings.max_plies, "Ply limit reached");
            return Ok(LoopState::Halted(HaltReason::PlyLimit));
        }
        if cancel.is_cancelled() {
            return Ok(LoopState::Halted(HaltReason::Cancelled));
        }

        let legal = self.rules.current_moves(position).map_err(fault)?;
        let context = prompts::move_context(
            ply,
            plies,
            self.settings.hint_legal_moves.then_some(&legal),
        );
        let request = RecognitionRequest {
            task: RecognitionTask::Move { ply },
            image,
            prompt: prompts::MOVE_INSTRUCTIONS,
            prior_context: Some(&context),
        };

        let reply = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!(ply, "Move transcription cancelled");
                return Ok(LoopState::Halted(HaltReason::Cancelled));
            }
            reply = self.recognizer.recognize(request) => reply,
        };

        let raw = match reply {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    ply,
                    recognizer = self.recognizer.name(),
                    error = %e,
                    "Recognizer failed during move transcription"
                );
                return Ok(LoopState::Halted(HaltReason::RecognizerFailed {
                    message: e.to_string(),
                }));
            }
        };

        Ok(match parse_candidate(&raw) {
            CandidateRead::EndOfMoves => {
                tracing::debug!(ply, "Recognizer reported end of moves");
                LoopState::Halted(HaltReason::InputExhausted)
            }
            CandidateRead::Candidate(candidate) => LoopState::Matching { candidate, legal },
        })
    }

    fn match_candidate(
        &self,
        position: &Position,
        ply: usize,
        candidate: Candidate,
        legal: &LegalMoveSet,
    ) -> Result<LoopState, TranscribeError> {
        let color = Color::for_ply(ply);
        let Some(found) = self.policy.select(&candidate, legal) else {
            tracing::info!(
                ply,
                move_number = move_number(ply),
                side = %color,
                candidate = %candidate,
                "No legal move matches candidate"
            );
            return Ok(LoopState::Halted(HaltReason::NoMatch {
                candidate: candidate.into_inner(),
            }));
        };

        match self.rules.apply_move(position, &found.notation) {
            Ok(next) => {
                tracing::debug!(
                    ply,
                    candidate = %candidate,
                    notation = %found.notation,
                    distance = found.distance,
                    "Accepted move"
                );
                Ok(LoopState::Accepted {
                    ply: Ply::new(color, found.notation),
                    position: next,
                })
            }
            Err(ApplyError::Illegal(e)) => {
                // The policy picked from the legal set, so this only happens with an
                // inconsistent rules engine. Treat it like any other unmatched read.
                tracing::warn!(ply, error = %e, "Matched move rejected by rules engine");
                Ok(LoopState::Halted(HaltReason::NoMatch {
                    candidate: candidate.into_inner(),
                }))
            }
            Err(ApplyError::Fault(source)) => Err(TranscribeError::Fault { ply, source }),
        }
    }
}
