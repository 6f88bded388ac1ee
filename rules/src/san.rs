//! Standard Algebraic Notation for moves generated by the `chess` crate.

use ::chess::{Board, BoardStatus, ChessMove, Piece, Square};

/// Drop trailing check/mate markers so `Qh4#` and `Qh4` compare equal.
#[must_use]
pub fn strip_check_suffix(notation: &str) -> &str {
    notation.trim().trim_end_matches(['+', '#'])
}

fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

fn file_char(square: Square) -> char {
    char::from(b'a' + square.get_file().to_index() as u8)
}

fn rank_char(square: Square) -> char {
    char::from(b'1' + square.get_rank().to_index() as u8)
}

/// Render `mv` in SAN. `legal` is the full legal move list of `board`, used
/// for disambiguation.
pub(crate) fn encode(board: &Board, mv: ChessMove, legal: &[ChessMove]) -> String {
    let src = mv.get_source();
    let dst = mv.get_dest();
    let mut out = String::with_capacity(8);

    let Some(piece) = board.piece_on(src) else {
        // MoveGen never yields a move from an empty square; keep coordinates.
        return format!("{src}{dst}");
    };

    let src_file = src.get_file().to_index();
    let dst_file = dst.get_file().to_index();

    if piece == Piece::King && src_file.abs_diff(dst_file) == 2 {
        out.push_str(if dst_file > src_file { "O-O" } else { "O-O-O" });
    } else {
        let capture =
            board.piece_on(dst).is_some() || (piece == Piece::Pawn && src_file != dst_file);

        if piece == Piece::Pawn {
            if capture {
                out.push(file_char(src));
            }
        } else {
            out.push(piece_letter(piece));
            push_disambiguation(&mut out, board, mv, piece, legal);
        }

        if capture {
            out.push('x');
        }
        out.push(file_char(dst));
        out.push(rank_char(dst));

        if let Some(promotion) = mv.get_promotion() {
            out.push('=');
            out.push(piece_letter(promotion));
        }
    }

    let after = board.make_move_new(mv);
    if after.status() == BoardStatus::Checkmate {
        out.push('#');
    } else if after.checkers().popcnt() > 0 {
        out.push('+');
    }

    out
}

fn push_disambiguation(
    out: &mut String,
    board: &Board,
    mv: ChessMove,
    piece: Piece,
    legal: &[ChessMove],
) {
    let src = mv.get_source();
    let rivals: Vec<Square> = legal
        .iter()
        .filter(|other| {
            other.get_dest() == mv.get_dest()
                && other.get_source() != src
                && board.piece_on(other.get_source()) == Some(piece)
        })
        .map(ChessMove::get_source)
        .collect();

    if rivals.is_empty() {
        return;
    }

    let shares_file = rivals.iter().any(|s| s.get_file() == src.get_file());
    let shares_rank = rivals.iter().any(|s| s.get_rank() == src.get_rank());

    if !shares_file {
        out.push(file_char(src));
    } else if !shares_rank {
        out.push(rank_char(src));
    } else {
        out.push(file_char(src));
        out.push(rank_char(src));
    }
}
