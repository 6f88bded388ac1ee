//! Core engine for scoresheet transcription - stage orchestration and move validation.
//!
//! This crate wires a [`Recognizer`] and a [`RulesEngine`] into the
//! three-stage pipeline. It has no CLI or HTTP code of its own.

mod config;
mod util;

pub mod cancel;
pub mod candidate;
pub mod matching;
pub mod merge;
pub mod pipeline;
pub mod prompts;
pub mod stages;
pub mod state;
pub mod transcriber;

// Re-export from crates for public API
pub use scoresheet_providers::{
    self, GeminiConfig, GeminiRecognizer, Recognizer, RecognizerError, ScriptedRecognizer,
};
pub use scoresheet_rules::{self, ChessRules, Position, RulesEngine};
pub use scoresheet_types::{
    self, ClockEntry, ConsolidatedResult, MediaType, Metadata, MovePair, ScoresheetImage, StageKey,
};

pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use candidate::{Candidate, CandidateRead, normalize_notation, parse_candidate};
pub use config::{
    ApiKeys, CONFIG_PATH_ENV, ConfigError, MatchingConfig, PipelineSection, RecognizerConfig,
    ScoresheetConfig, expand_env_vars,
};
pub use matching::{EditDistancePolicy, MatchPolicy, MoveMatch};
pub use merge::consolidate;
pub use pipeline::{Pipeline, PipelineConfig};
pub use stages::{ClockStage, MetadataStage, MoveStage, Stage, StageContext, StageError};
pub use state::{CompleteState, Fragment, FragmentKey, StageFailure, StateError, StateStore};
pub use transcriber::{
    HaltReason, MoveTranscriber, TranscribeError, Transcript, TranscriberSettings,
};
