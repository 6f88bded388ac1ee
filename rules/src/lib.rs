//! Rules engine adapter.
//!
//! The transcription pipeline never interprets chess itself. It asks a
//! [`RulesEngine`] for the legal continuations of a [`Position`] and for the
//! position reached by one of them:
//!
//! - [`RulesEngine::current_moves`] - every legal continuation, in a stable order
//! - [`RulesEngine::apply_move`] - deterministic; rejection leaves nothing changed
//! - [`RulesEngine::is_game_over`] - mate, stalemate and automatic draws
//!
//! [`ChessRules`] is the standard implementation on top of the `chess` crate,
//! emitting Standard Algebraic Notation.
//!
//! # Errors
//!
//! An illegal move is an expected outcome ([`ApplyError::Illegal`]). A
//! position the engine cannot decode is an [`AdapterFault`] and is fatal for
//! the run that produced it.

mod san;
mod standard;

pub use san::strip_check_suffix;
pub use standard::ChessRules;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// FEN of the standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Opaque, immutable snapshot of a full board state.
///
/// Only a [`RulesEngine`] produces positions. Serialized as its FEN text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position {
    fen: String,
}

impl Position {
    /// Wrap a FEN string. The text is validated lazily by the engine that
    /// consumes it; a malformed one surfaces as [`AdapterFault::MalformedPosition`].
    #[must_use]
    pub fn from_fen(fen: impl Into<String>) -> Self {
        Self { fen: fen.into() }
    }

    #[must_use]
    pub fn fen(&self) -> &str {
        &self.fen
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.fen)
    }
}

/// Every legal continuation from one position, as SAN, in engine order.
///
/// Regenerated for each position; never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegalMoveSet {
    moves: Vec<String>,
}

impl LegalMoveSet {
    #[must_use]
    pub fn new(moves: Vec<String>) -> Self {
        Self { moves }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.moves.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.moves.iter().map(String::as_str)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.moves
    }

    /// Whether `notation` names one of the moves, ignoring check/mate markers.
    #[must_use]
    pub fn contains(&self, notation: &str) -> bool {
        let wanted = strip_check_suffix(notation);
        self.iter().any(|m| strip_check_suffix(m) == wanted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal move {notation:?} in position {fen}")]
pub struct IllegalMoveError {
    pub notation: String,
    pub fen: String,
}

/// Failures that are not a property of the game: the position handed to the
/// engine is broken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterFault {
    #[error("malformed position {fen:?}: {reason}")]
    MalformedPosition { fen: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Illegal(#[from] IllegalMoveError),
    #[error(transparent)]
    Fault(#[from] AdapterFault),
}

/// Chess legality capability consumed by the move validation loop.
pub trait RulesEngine: Send + Sync {
    /// The position every transcription starts from.
    fn initial_position(&self) -> Position;

    /// Every legal continuation of `position`. Empty only when the game has ended.
    fn current_moves(&self, position: &Position) -> Result<LegalMoveSet, AdapterFault>;

    /// Play `notation` from `position`.
    ///
    /// Must be deterministic: the same inputs always give the same position
    /// or the same rejection.
    fn apply_move(&self, position: &Position, notation: &str) -> Result<Position, ApplyError>;

    fn is_game_over(&self, position: &Position) -> Result<bool, AdapterFault>;
}
