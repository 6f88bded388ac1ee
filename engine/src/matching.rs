//! Choosing a legal move for a candidate read off the scoresheet.
//!
//! Both sides are compared in normalized form (see
//! [`normalize_notation`](crate::candidate::normalize_notation)). A lowercase
//! piece letter is read as the piece (`nf3` is `Nf3`); a leading `b` is read
//! both ways since it is also a pawn file. An exact match always wins. Otherwise the legal move with the smallest character
//! edit distance is taken when it is within the configured bound. Ties go to
//! the move listed first, which keeps the choice deterministic for a given
//! legal-move set.

use similar::{ChangeTag, TextDiff};

use scoresheet_rules::LegalMoveSet;

use crate::candidate::{Candidate, normalize_notation};

pub const DEFAULT_MAX_EDIT_DISTANCE: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveMatch {
    /// Index into the legal-move set the match was selected from.
    pub index: usize,
    /// The legal move in canonical notation.
    pub notation: String,
    pub distance: usize,
}

impl MoveMatch {
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        self.distance == 0
    }
}

/// Selects at most one legal move for a candidate.
pub trait MatchPolicy: Send + Sync {
    fn select(&self, candidate: &Candidate, legal: &LegalMoveSet) -> Option<MoveMatch>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditDistancePolicy {
    max_distance: usize,
}

impl EditDistancePolicy {
    #[must_use]
    pub const fn new(max_distance: usize) -> Self {
        Self { max_distance }
    }

    /// Only normalized-exact matches are accepted.
    #[must_use]
    pub const fn exact() -> Self {
        Self::new(0)
    }

    #[must_use]
    pub const fn max_distance(&self) -> usize {
        self.max_distance
    }
}

impl Default for EditDistancePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EDIT_DISTANCE)
    }
}

impl MatchPolicy for EditDistancePolicy {
    fn select(&self, candidate: &Candidate, legal: &LegalMoveSet) -> Option<MoveMatch> {
        let readings = readings(&candidate.normalized());
        if readings.is_empty() {
            return None;
        }

        let mut best: Option<MoveMatch> = None;
        for (index, notation) in legal.iter().enumerate() {
            let normalized = normalize_notation(notation);
            let distance = readings
                .iter()
                .map(|wanted| {
                    if *wanted == normalized {
                        0
                    } else {
                        indel_distance(wanted, &normalized)
                    }
                })
                .min()
                .unwrap_or(usize::MAX);

            if best.as_ref().is_none_or(|b| distance < b.distance) {
                best = Some(MoveMatch {
                    index,
                    notation: notation.to_string(),
                    distance,
                });
                if distance == 0 {
                    break;
                }
            }
        }

        best.filter(|m| m.distance <= self.max_distance)
    }
}

/// The ways a normalized candidate can be read.
///
/// A leading `n`, `r`, `q` or `k` can only be a piece, so it is read as the
/// uppercase piece letter alone. A leading `b` may be a bishop or the b-file,
/// so both readings are kept.
fn readings(normalized: &str) -> Vec<String> {
    let mut chars = normalized.chars();
    let Some(first) = chars.next() else {
        return Vec::new();
    };
    let folded = || format!("{}{}", first.to_ascii_uppercase(), chars.as_str());
    match first {
        'n' | 'r' | 'q' | 'k' => vec![folded()],
        'b' => vec![normalized.to_string(), folded()],
        _ => vec![normalized.to_string()],
    }
}

/// Character-level distance: the larger of deleted and inserted characters
/// in a minimal diff. A single substitution counts as one edit.
#[must_use]
pub fn indel_distance(from: &str, to: &str) -> usize {
    let diff = TextDiff::from_chars(from, to);
    let (mut deleted, mut inserted) = (0usize, 0usize);
    for change in diff.iter_all_changes() {
        let chars = change.value().chars().count();
        match change.tag() {
            ChangeTag::Delete => deleted += chars,
            ChangeTag::Insert => inserted += chars,
            ChangeTag::Equal => {}
        }
    }
    deleted.max(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{CandidateRead, parse_candidate};

    fn candidate(raw: &str) -> Candidate {
        match parse_candidate(raw) {
            CandidateRead::Candidate(c) => c,
            CandidateRead::EndOfMoves => panic!("{raw:?} is not a candidate"),
        }
    }

    fn legal(moves: &[&str]) -> LegalMoveSet {
        LegalMoveSet::new(moves.iter().map(|m| (*m).to_string()).collect())
    }

    #[test]
    fn distances() {
        assert_eq!(indel_distance("Nf3", "Nf3"), 0);
        assert_eq!(indel_distance("Nf5", "Nf3"), 1);
        assert_eq!(indel_distance("e45", "e4"), 1);
        assert_eq!(indel_distance("f3", "Nf3"), 1);
        assert_eq!(indel_distance("Zz9", "Nf3"), 3);
    }

    #[test]
    fn exact_match_after_normalization() {
        let policy = EditDistancePolicy::default();
        let set = legal(&["Nc3", "Nf3", "e4"]);
        let found = policy.select(&candidate("Nf3+"), &set).expect("match");
        assert_eq!(found.notation, "Nf3");
        assert_eq!(found.index, 1);
        assert!(found.is_exact());
    }

    #[test]
    fn exact_match_beats_earlier_fuzzy_match() {
        let policy = EditDistancePolicy::default();
        // "Nf3" is one edit from "Nf2" which comes first.
        let set = legal(&["Nf2", "Nf3"]);
        let found = policy.select(&candidate("Nf3"), &set).expect("match");
        assert_eq!(found.notation, "Nf3");
    }

    #[test]
    fn capture_marks_are_ignored() {
        let policy = EditDistancePolicy::exact();
        let set = legal(&["exd5", "e5"]);
        assert_eq!(
            policy.select(&candidate("ed5"), &set).map(|m| m.notation),
            Some("exd5".to_string())
        );
        assert_eq!(
            policy.select(&candidate("0-0"), &legal(&["O-O", "Kf1"])).map(|m| m.notation),
            Some("O-O".to_string())
        );
    }

    #[test]
    fn returns_canonical_legal_notation() {
        let policy = EditDistancePolicy::exact();
        let found = policy.select(&candidate("Bb5"), &legal(&["Bb5+"])).expect("match");
        assert_eq!(found.notation, "Bb5+");
    }

    #[test]
    fn fuzzy_match_within_bound() {
        let policy = EditDistancePolicy::default();
        let found = policy
            .select(&candidate("Nf4"), &legal(&["e4", "Nf3", "Nc3"]))
            .expect("match");
        assert_eq!(found.notation, "Nf3");
        assert_eq!(found.distance, 1);
    }

    #[test]
    fn fuzzy_ties_take_first_listed() {
        let policy = EditDistancePolicy::default();
        let found = policy
            .select(&candidate("Nd3"), &legal(&["Nc3", "Nf3"]))
            .expect("match");
        assert_eq!(found.notation, "Nc3");
    }

    #[test]
    fn lowercase_piece_letter_reads_as_piece() {
        let policy = EditDistancePolicy::default();
        // Pawn moves are listed first; "nf3" is one edit from "f3" too.
        let set = legal(&["e3", "f3", "Nc3", "Nf3"]);
        let found = policy.select(&candidate("nf3"), &set).expect("match");
        assert_eq!(found.notation, "Nf3");
        assert!(found.is_exact());
        assert_eq!(
            policy.select(&candidate("qh4#"), &legal(&["h4", "Qh4#"])).map(|m| m.notation),
            Some("Qh4#".to_string())
        );
    }

    #[test]
    fn lowercase_b_is_pawn_file_or_bishop() {
        let policy = EditDistancePolicy::exact();
        let set = legal(&["bxc3", "Bc4"]);
        assert_eq!(
            policy.select(&candidate("bxc3"), &set).map(|m| m.notation),
            Some("bxc3".to_string())
        );
        assert_eq!(
            policy.select(&candidate("bc4"), &set).map(|m| m.notation),
            Some("Bc4".to_string())
        );
    }

    #[test]
    fn nothing_within_bound() {
        let policy = EditDistancePolicy::default();
        assert_eq!(policy.select(&candidate("Zz9"), &legal(&["e4", "Nf3"])), None);
        assert_eq!(EditDistancePolicy::exact().select(&candidate("Nf4"), &legal(&["Nf3"])), None);
    }

    #[test]
    fn empty_legal_set_never_matches() {
        assert_eq!(EditDistancePolicy::default().select(&candidate("e4"), &legal(&[])), None);
    }

    #[test]
    fn annotation_only_candidate_never_matches() {
        assert_eq!(EditDistancePolicy::default().select(&candidate("+"), &legal(&["e4"])), None);
    }
}
