//! Checks a post-transition state against an ordered constraint sequence.

use super::Constraint;
use crate::rules::RulesOracle;

/// Result of evaluating one candidate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Consistent,
    /// `index` is the position of the first failing constraint; later ones were not evaluated.
    Rejected { index: usize, constraint: Constraint },
}

impl Verdict {
    pub fn is_consistent(self) -> bool {
        matches!(self, Verdict::Consistent)
    }
}

pub fn satisfies<R: RulesOracle>(rules: &R, state: &R::State, constraint: Constraint) -> bool {
    match constraint {
        // The occupant is read after the move was applied.
        Constraint::PawnRevealedAt(square) => rules
            .occupant_at(state, square)
            .is_some_and(|piece| piece.is_pawn()),
        Constraint::NonPawnRevealedAt(square) => rules
            .occupant_at(state, square)
            .is_some_and(|piece| !piece.is_pawn()),
        Constraint::MoveRejectedByReality => false,
        Constraint::MustBeInCheck => rules.is_check(state),
        Constraint::MustBeCheckmate => rules.is_checkmate(state),
        Constraint::MustBeStalemate => rules.is_stalemate(state),
        Constraint::MustBeGameOver => rules.is_game_over(state),
        Constraint::Neutral => true,
    }
}

/// Evaluates `constraints` in order, stopping at the first failure.
pub fn evaluate<R: RulesOracle>(rules: &R, state: &R::State, constraints: &[Constraint]) -> Verdict {
    for (index, constraint) in constraints.iter().copied().enumerate() {
        if !satisfies(rules, state, constraint) {
            return Verdict::Rejected { index, constraint };
        }
    }
    Verdict::Consistent
}
