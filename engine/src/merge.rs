//! Consolidation of stage fragments into the final result.

use scoresheet_types::{Color, ConsolidatedResult, move_number, truncate_with_ellipsis};

use crate::state::{CompleteState, Fragment};
use crate::transcriber::{HaltReason, Transcript};

/// Merge every fragment of a finished run.
///
/// Successful fragments become fields; each failure marker leaves its field
/// absent and adds a line to `error` naming the stage. A transcript that
/// stopped before the end of the game is kept, with a warning that says why.
#[must_use]
pub fn consolidate(state: CompleteState) -> ConsolidatedResult {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    let metadata = take(state.metadata, &mut errors);
    let clocks = take(state.clocks, &mut errors);
    let moves = take(state.moves, &mut errors).map(|transcript| {
        if let Some(message) = transcript.error() {
            errors.push(format!("move extraction stopped early: {message}"));
        }
        if let Some(warning) = halt_warning(&transcript) {
            warnings.push(warning);
        }
        transcript.moves()
    });

    ConsolidatedResult {
        metadata,
        clocks,
        moves,
        error: (!errors.is_empty()).then(|| errors.join("; ")),
        warnings,
    }
}

fn take<T>(fragment: Fragment<T>, errors: &mut Vec<String>) -> Option<T> {
    match fragment {
        Fragment::Data(value) => Some(value),
        Fragment::Failed(failure) => {
            errors.push(failure.to_string());
            None
        }
    }
}

/// Longest candidate quoted back in a warning.
const MAX_QUOTED_CANDIDATE: usize = 40;

/// Where the next unread ply sits, e.g. `move 12 (black)`.
fn next_ply_label(transcript: &Transcript) -> String {
    let ply = transcript.len();
    format!("move {} ({})", move_number(ply), Color::for_ply(ply))
}

fn halt_warning(transcript: &Transcript) -> Option<String> {
    let plies = transcript.len();
    match transcript.halt() {
        HaltReason::GameOver | HaltReason::InputExhausted => None,
        HaltReason::NoMatch { candidate } => Some(format!(
            "transcription stopped at {}: no legal move matches {:?}",
            next_ply_label(transcript),
            truncate_with_ellipsis(candidate, MAX_QUOTED_CANDIDATE)
        )),
        HaltReason::PlyLimit => Some(format!(
            "transcription stopped after {plies} plies: ply limit reached"
        )),
        HaltReason::Cancelled => Some(format!(
            "transcription cancelled after {plies} plies; moves are partial"
        )),
        HaltReason::RecognizerFailed { .. } => Some(format!(
            "transcription stopped at {}: recognizer failed",
            next_ply_label(transcript)
        )),
    }
}
