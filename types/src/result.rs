//! Stage keys and the consolidated pipeline output.

use serde::{Deserialize, Serialize};

use crate::{ClockEntry, MovePair};

/// Header metadata as read from the top of the sheet (event, players, date, ...).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Predeclared key of a stage fragment in the shared state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKey {
    Metadata,
    Clocks,
    Moves,
}

impl StageKey {
    pub const ALL: [StageKey; 3] = [StageKey::Metadata, StageKey::Clocks, StageKey::Moves];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StageKey::Metadata => "metadata",
            StageKey::Clocks => "clocks",
            StageKey::Moves => "moves",
        }
    }

    /// Human-readable name of the stage that owns this key.
    #[must_use]
    pub const fn stage_name(self) -> &'static str {
        match self {
            StageKey::Metadata => "metadata extraction",
            StageKey::Clocks => "clock extraction",
            StageKey::Moves => "move extraction",
        }
    }
}

impl std::fmt::Display for StageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a recognizer call is asked to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognitionTask {
    Metadata,
    Clocks,
    /// The handwritten move of one ply (zero-based).
    Move { ply: usize },
}

impl RecognitionTask {
    #[must_use]
    pub const fn stage_key(self) -> StageKey {
        match self {
            RecognitionTask::Metadata => StageKey::Metadata,
            RecognitionTask::Clocks => StageKey::Clocks,
            RecognitionTask::Move { .. } => StageKey::Moves,
        }
    }
}

/// The terminal artifact of a pipeline run.
///
/// A field is absent when its stage failed; `error` then names the failed
/// stage(s).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clocks: Option<Vec<ClockEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moves: Option<Vec<MovePair>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ConsolidatedResult {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
            && self.metadata.is_some()
            && self.clocks.is_some()
            && self.moves.is_some()
    }
}
