//! Recognizer instructions for each stage, and the per-ply move context.

use scoresheet_rules::LegalMoveSet;
use scoresheet_types::{Color, Ply, move_number};

/// Legal moves listed in the move context before the list is cut short.
const MAX_HINTED_MOVES: usize = 64;

pub const METADATA_INSTRUCTIONS: &str = "\
You are reading the header of a handwritten chess scoresheet.
Return a single JSON object with the fields you can read, using these keys when present:
event, site, date, round, board, white, black, white_rating, black_rating, result.
Use strings for every value. Omit fields that are blank or illegible.
Return only the JSON object.";

pub const CLOCK_INSTRUCTIONS: &str = "\
You are reading the clock times written next to the moves of a handwritten chess scoresheet.
Return a JSON array with one object per move row, in order: {\"white\": \"...\", \"black\": \"...\"}.
Copy each time exactly as written. Omit \"black\" when the row has no black time.
Return [] if no clock times are written. Return only the JSON array.";

pub const MOVE_INSTRUCTIONS: &str = "\
You are transcribing the moves of a handwritten chess scoresheet one half-move at a time.
You will be told which half-move to read and the moves accepted so far.
Reply with only the notation written in that cell, in standard algebraic notation.
Do not correct the player's notation and do not add commentary.
If the cell is empty or the game record has ended, reply END.";

/// Text sent with the image when asking for the move at `ply`.
#[must_use]
pub fn move_context(ply: usize, accepted: &[Ply], legal: Option<&LegalMoveSet>) -> String {
    let color = Color::for_ply(ply);
    let mut text = format!("Read {color}'s move number {}.", move_number(ply));

    if accepted.is_empty() {
        text.push_str("\nNo moves have been read yet.");
    } else {
        text.push_str("\nMoves so far: ");
        text.push_str(&numbered_moves(accepted));
    }

    if let Some(legal) = legal.filter(|set| !set.is_empty()) {
        text.push_str("\nLegal moves in this position: ");
        let shown: Vec<&str> = legal.iter().take(MAX_HINTED_MOVES).collect();
        text.push_str(&shown.join(", "));
        if legal.len() > MAX_HINTED_MOVES {
            text.push_str(", ...");
        }
        text.push_str("\nThe player may have written an illegal or misspelled move; copy what is written.");
    }

    text
}

/// `1. e4 e5 2. Nf3`
#[must_use]
pub fn numbered_moves(plies: &[Ply]) -> String {
    let mut out = String::new();
    for (index, ply) in plies.iter().enumerate() {
        if !out.is_empty() {
            out.push(' ');
        }
        if index % 2 == 0 {
            out.push_str(&format!("{}. ", move_number(index)));
        }
        out.push_str(&ply.notation);
    }
    out
}
