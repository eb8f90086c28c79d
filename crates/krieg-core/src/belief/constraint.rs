//! Closed constraint vocabulary and the encoder that produces it from raw
//! umpire announcements. Raw text never crosses into the updater.

use crate::rules::parse_square;
use chess::Square;

const PAWN_GONE_PREFIX: &str = "Pawn gone on ";
const PIECE_GONE_PREFIX: &str = "Piece gone on ";

/// A single typed requirement a post-transition state must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    PawnRevealedAt(Square),
    NonPawnRevealedAt(Square),
    /// Only produced for opponent moves: a hypothetical success paired with a real rejection.
    MoveRejectedByReality,
    MustBeInCheck,
    MustBeCheckmate,
    MustBeStalemate,
    MustBeGameOver,
    Neutral,
}

/// Which kind of ply produced the announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyContext {
    OwnMove,
    OpponentMove,
}

impl Constraint {
    /// Lenient mapping: anything unrecognized becomes [`Constraint::Neutral`].
    pub fn from_announcement(token: &str, context: PlyContext) -> Self {
        let token = token.trim();
        if let Some(rest) = token.strip_prefix(PAWN_GONE_PREFIX) {
            return parse_square(rest)
                .map(Constraint::PawnRevealedAt)
                .unwrap_or(Constraint::Neutral);
        }
        if let Some(rest) = token.strip_prefix(PIECE_GONE_PREFIX) {
            return parse_square(rest)
                .map(Constraint::NonPawnRevealedAt)
                .unwrap_or(Constraint::Neutral);
        }
        match token {
            "No" | "Hell no" => match context {
                PlyContext::OpponentMove => Constraint::MoveRejectedByReality,
                PlyContext::OwnMove => Constraint::Neutral,
            },
            "Checkmate" => Constraint::MustBeCheckmate,
            "Stalemate" => Constraint::MustBeStalemate,
            _ if token.starts_with("Check") => Constraint::MustBeInCheck,
            _ if token.starts_with("draw") => Constraint::MustBeGameOver,
            _ => Constraint::Neutral,
        }
    }
}

/// Evidence from the agent's own attempted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnMoveObservation {
    pub succeeded: bool,
    pub constraints: Vec<Constraint>,
}

/// Evidence from the opponent's move: its destination square plus announcements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpponentMoveObservation {
    pub destination: Square,
    pub constraints: Vec<Constraint>,
}

/// Turns raw per-ply umpire output into ordered constraint sequences.
#[derive(Debug, Default)]
pub struct ConstraintEncoder;

impl ConstraintEncoder {
    pub fn encode<I, T>(tokens: I, context: PlyContext) -> Vec<Constraint>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        tokens
            .into_iter()
            .map(|token| Constraint::from_announcement(token.as_ref(), context))
            .collect()
    }

    pub fn own_move<I, T>(succeeded: bool, tokens: I) -> OwnMoveObservation
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        OwnMoveObservation {
            succeeded,
            constraints: Self::encode(tokens, PlyContext::OwnMove),
        }
    }

    pub fn opponent_move<I, T>(destination: Square, tokens: I) -> OpponentMoveObservation
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        OpponentMoveObservation {
            destination,
            constraints: Self::encode(tokens, PlyContext::OpponentMove),
        }
    }
}
