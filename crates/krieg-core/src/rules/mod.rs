//! Chess rules as consumed by the belief engine.
//!
//! The belief engine never inspects boards directly; it goes through the
//! [`RulesOracle`] seam so that hypotheses stay opaque value snapshots.

mod standard;

pub use standard::{StandardRules, insufficient_material, parse_square, parse_uci_move};

use chess::{Color, Piece, Square};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Piece identity as revealed by the rules oracle (colour is deliberately absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceClass {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceClass {
    pub const fn is_pawn(self) -> bool {
        matches!(self, PieceClass::Pawn)
    }
}

impl From<Piece> for PieceClass {
    fn from(piece: Piece) -> Self {
        match piece {
            Piece::Pawn => PieceClass::Pawn,
            Piece::Knight => PieceClass::Knight,
            Piece::Bishop => PieceClass::Bishop,
            Piece::Rook => PieceClass::Rook,
            Piece::Queen => PieceClass::Queen,
            Piece::King => PieceClass::King,
        }
    }
}

impl fmt::Display for PieceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PieceClass::Pawn => "pawn",
            PieceClass::Knight => "knight",
            PieceClass::Bishop => "bishop",
            PieceClass::Rook => "rook",
            PieceClass::Queen => "queen",
            PieceClass::King => "king",
        };
        f.write_str(label)
    }
}

/// Raised when a move is applied to a state under which it is not legal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("move {mv} is not legal in position {state}")]
pub struct IllegalMoveError {
    pub mv: String,
    pub state: String,
}

impl IllegalMoveError {
    pub fn new(mv: impl fmt::Display, state: impl fmt::Display) -> Self {
        Self {
            mv: mv.to_string(),
            state: state.to_string(),
        }
    }
}

/// Failure to decode a persisted state encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid position encoding '{input}'")]
    InvalidPosition { input: String },
}

/// Full-information chess rules: legality, move application and terminal predicates.
pub trait RulesOracle {
    type State: Clone + fmt::Debug;
    type Move: Copy + Eq + fmt::Debug + fmt::Display;

    /// Canonical initial position.
    fn initial_state(&self) -> Self::State;

    /// All legal moves for the side to move.
    fn legal_moves(&self, state: &Self::State) -> Vec<Self::Move>;

    fn is_legal(&self, state: &Self::State, mv: Self::Move) -> bool {
        self.legal_moves(state).contains(&mv)
    }

    /// Produces the successor state; fails when `mv` is not legal under `state`.
    fn apply(&self, state: &Self::State, mv: Self::Move) -> Result<Self::State, IllegalMoveError>;

    fn destination(&self, mv: Self::Move) -> Square;

    fn side_to_move(&self, state: &Self::State) -> Color;

    fn is_check(&self, state: &Self::State) -> bool;

    fn is_checkmate(&self, state: &Self::State) -> bool;

    fn is_stalemate(&self, state: &Self::State) -> bool;

    /// Any terminal condition: mate or a draw the position itself proves.
    fn is_game_over(&self, state: &Self::State) -> bool;

    fn occupant_at(&self, state: &Self::State, square: Square) -> Option<PieceClass>;
}

/// Text encoding of states used by the persisted prior.
pub trait StateCodec: RulesOracle {
    fn encode(&self, state: &Self::State) -> String;

    fn decode(&self, input: &str) -> Result<Self::State, CodecError>;
}
