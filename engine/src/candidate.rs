//! Parsing recognizer output into a candidate move.
//!
//! Recognizers answer in free text. A reply is reduced to its first move token
//! after dropping code fences, quotes and a leading move number (`12.`, `12...`).
//! An empty reply or an explicit end marker means the scoresheet has no more moves.

use scoresheet_types::NonEmptyString;

use crate::util::strip_code_fence;

/// Replies that mean "nothing is written at this ply".
const END_MARKERS: &[&str] = &["END", "NONE", "EMPTY", "-", "--", "N/A"];

/// Game results written after the last move.
const RESULT_MARKERS: &[&str] = &["1-0", "0-1", "1/2-1/2", "½-½", "1/2", "½", "*"];

/// A non-empty move notation exactly as read from the scoresheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate(NonEmptyString);

impl Candidate {
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0.into_inner()
    }

    /// Comparison form of the candidate; see [`normalize_notation`].
    #[must_use]
    pub fn normalized(&self) -> String {
        normalize_notation(self.as_str())
    }
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateRead {
    Candidate(Candidate),
    EndOfMoves,
}

/// Reduce a raw recognizer reply to a candidate or the end-of-moves signal.
#[must_use]
pub fn parse_candidate(raw: &str) -> CandidateRead {
    let text = strip_code_fence(raw);
    let Some(line) = text.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return CandidateRead::EndOfMoves;
    };

    let token = line
        .split_whitespace()
        .map(|token| {
            strip_move_number(token.trim_matches(|c: char| matches!(c, '"' | '\'' | '`')))
                .trim_end_matches([',', ';'])
        })
        .find(|token| !token.is_empty());

    let Some(token) = token else {
        return CandidateRead::EndOfMoves;
    };
    if END_MARKERS
        .iter()
        .any(|marker| token.eq_ignore_ascii_case(marker))
    {
        return CandidateRead::EndOfMoves;
    }
    if RESULT_MARKERS.contains(&token) {
        return CandidateRead::EndOfMoves;
    }

    match NonEmptyString::new(token) {
        Ok(notation) => CandidateRead::Candidate(Candidate(notation)),
        Err(_) => CandidateRead::EndOfMoves,
    }
}

/// `12.e4` -> `e4`, `12...` -> ``. Castling written with zeros is left alone.
fn strip_move_number(token: &str) -> &str {
    let rest = token.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() < token.len() && rest.starts_with('.') {
        rest.trim_start_matches('.')
    } else {
        token
    }
}

/// Comparison form of a move notation.
///
/// Drops check and annotation marks, capture markers, promotion `=`,
/// en passant suffixes and whitespace. Castling written with zeros or a
/// lowercase `o` becomes `O-O` / `O-O-O`.
#[must_use]
pub fn normalize_notation(raw: &str) -> String {
    let without_ep = raw.trim().replace("e.p.", "");
    let stripped: String = without_ep
        .chars()
        .filter(|c| !matches!(c, '+' | '#' | '!' | '?' | 'x' | ':' | '=') && !c.is_whitespace())
        .collect();

    let is_castling = stripped.contains('-')
        && stripped.chars().all(|c| matches!(c, '0' | 'O' | 'o' | '-'));
    if is_castling {
        stripped
            .chars()
            .map(|c| if c == '-' { '-' } else { 'O' })
            .collect()
    } else {
        stripped
    }
}
