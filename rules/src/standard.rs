//! [`RulesEngine`] implementation for standard chess.

use std::str::FromStr;

use ::chess::{Board, BoardStatus, ChessMove, Color, MoveGen, Piece};

use crate::san::{self, strip_check_suffix};
use crate::{
    AdapterFault, ApplyError, IllegalMoveError, LegalMoveSet, Position, RulesEngine, STARTING_FEN,
};

/// Halfmove clock value at which the game is drawn without a claim.
const SEVENTY_FIVE_MOVE_PLIES: u32 = 150;

/// Standard chess rules backed by the `chess` crate.
///
/// The crate does not track move counters, so they are carried in the
/// position's FEN and advanced here.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChessRules;

struct Decoded {
    board: Board,
    halfmove: u32,
    fullmove: u32,
}

impl ChessRules {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn decode(position: &Position) -> Result<Decoded, AdapterFault> {
        let fen = position.fen();
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(AdapterFault::MalformedPosition {
                fen: fen.to_string(),
                reason: format!("expected at least 4 FEN fields, found {}", fields.len()),
            });
        }

        let counter = |index: usize, default: u32| -> Result<u32, AdapterFault> {
            match fields.get(index) {
                None => Ok(default),
                Some(raw) => raw.parse().map_err(|_| AdapterFault::MalformedPosition {
                    fen: fen.to_string(),
                    reason: format!("invalid move counter {raw:?}"),
                }),
            }
        };
        let halfmove = counter(4, 0)?;
        let fullmove = counter(5, 1)?;

        let placement = format!("{} 0 1", fields[..4].join(" "));
        let board = Board::from_str(&placement).map_err(|e| AdapterFault::MalformedPosition {
            fen: fen.to_string(),
            reason: format!("{e:?}"),
        })?;

        Ok(Decoded {
            board,
            halfmove,
            fullmove,
        })
    }

    fn encode(board: &Board, halfmove: u32, fullmove: u32) -> Position {
        let rendered = board.to_string();
        let fields: Vec<&str> = rendered.split_whitespace().take(4).collect();
        Position::from_fen(format!("{} {halfmove} {fullmove}", fields.join(" ")))
    }

    fn legal_moves(board: &Board) -> Vec<ChessMove> {
        MoveGen::new_legal(board).collect()
    }

    fn insufficient_material(board: &Board) -> bool {
        match board.combined().popcnt() {
            2 => true,
            3 => {
                let minors = *board.pieces(Piece::Knight) | *board.pieces(Piece::Bishop);
                minors.popcnt() == 1
            }
            _ => false,
        }
    }
}

impl RulesEngine for ChessRules {
    fn initial_position(&self) -> Position {
        Position::from_fen(STARTING_FEN)
    }

    fn current_moves(&self, position: &Position) -> Result<LegalMoveSet, AdapterFault> {
        let decoded = Self::decode(position)?;
        let legal = Self::legal_moves(&decoded.board);
        let moves = legal
            .iter()
            .map(|mv| san::encode(&decoded.board, *mv, &legal))
            .collect();
        Ok(LegalMoveSet::new(moves))
    }

    fn apply_move(&self, position: &Position, notation: &str) -> Result<Position, ApplyError> {
        let decoded = Self::decode(position)?;
        let board = &decoded.board;
        let legal = Self::legal_moves(board);
        let wanted = strip_check_suffix(notation);

        let Some(mv) = legal
            .iter()
            .copied()
            .find(|mv| strip_check_suffix(&san::encode(board, *mv, &legal)) == wanted)
        else {
            tracing::trace!(notation, fen = position.fen(), "Rejected illegal move");
            return Err(IllegalMoveError {
                notation: notation.to_string(),
                fen: position.fen().to_string(),
            }
            .into());
        };

        let resets_clock = board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            || board.piece_on(mv.get_dest()).is_some();
        let halfmove = if resets_clock { 0 } else { decoded.halfmove + 1 };
        let fullmove = if board.side_to_move() == Color::Black {
            decoded.fullmove + 1
        } else {
            decoded.fullmove
        };

        let next = board.make_move_new(mv);
        Ok(Self::encode(&next, halfmove, fullmove))
    }

    fn is_game_over(&self, position: &Position) -> Result<bool, AdapterFault> {
        let decoded = Self::decode(position)?;
        Ok(decoded.board.status() != BoardStatus::Ongoing
            || Self::insufficient_material(&decoded.board)
            || decoded.halfmove >= SEVENTY_FIVE_MOVE_PLIES)
    }
}
