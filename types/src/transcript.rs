//! Transcript building blocks: plies, move rows and clock rows.

use serde::{Deserialize, Serialize};

use crate::Color;

/// One accepted half-move. Immutable once appended to a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ply {
    pub color: Color,
    /// Canonical SAN of the legal move that was matched.
    pub notation: String,
}

impl Ply {
    #[must_use]
    pub fn new(color: Color, notation: impl Into<String>) -> Self {
        Self {
            color,
            notation: notation.into(),
        }
    }
}

/// One scoresheet row: white's move and, unless the game stopped after it,
/// black's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePair {
    pub white: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black: Option<String>,
}

/// One row of clock readings, kept exactly as written on the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockEntry {
    pub white: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black: Option<String>,
}

/// Fold a ply sequence that starts with white into scoresheet rows.
#[must_use]
pub fn pair_plies(plies: &[Ply]) -> Vec<MovePair> {
    plies
        .chunks(2)
        .map(|row| MovePair {
            white: row[0].notation.clone(),
            black: row.get(1).map(|ply| ply.notation.clone()),
        })
        .collect()
}
