use super::{MoveRecommender, RecommenderError};
use crate::eval::material_balance;
use chess::{Board, BoardStatus, ChessMove, MoveGen};
use krieg_core::rules::StandardRules;

const MATE_SCORE: i32 = 100_000;
const DEFAULT_MAX_DEPTH: u32 = 3;

/// Alpha-beta negamax over material. Deterministic: among equal scores the
/// first move in generation order is kept.
#[derive(Debug, Clone)]
pub struct MaterialSearch {
    max_depth: u32,
    nodes: u64,
}

impl Default for MaterialSearch {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl MaterialSearch {
    pub fn new(max_depth: u32) -> Self {
        Self {
            max_depth: max_depth.max(1),
            nodes: 0,
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Nodes visited by the most recent search.
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    fn negamax(&mut self, board: &Board, depth: u32, ply: i32, mut alpha: i32, beta: i32) -> i32 {
        self.nodes += 1;
        match board.status() {
            BoardStatus::Checkmate => return -(MATE_SCORE - ply),
            BoardStatus::Stalemate => return 0,
            BoardStatus::Ongoing => {}
        }
        if depth == 0 {
            return material_balance(board, board.side_to_move());
        }

        let mut best = -MATE_SCORE - 1;
        for mv in MoveGen::new_legal(board) {
            let child = board.make_move_new(mv);
            let score = -self.negamax(&child, depth - 1, ply + 1, -beta, -alpha);
            if score > best {
                best = score;
            }
            if best > alpha {
                alpha = best;
            }
            if alpha >= beta {
                break;
            }
        }
        best
    }
}

impl MoveRecommender<StandardRules> for MaterialSearch {
    fn name(&self) -> &str {
        "material"
    }

    fn suggest(
        &mut self,
        _rules: &StandardRules,
        state: &Board,
        depth: u32,
    ) -> Result<ChessMove, RecommenderError> {
        let depth = depth.clamp(1, self.max_depth);
        self.nodes = 0;

        let mut best: Option<(ChessMove, i32)> = None;
        let mut alpha = -MATE_SCORE - 1;
        let beta = MATE_SCORE + 1;
        for mv in MoveGen::new_legal(state) {
            let child = state.make_move_new(mv);
            let score = -self.negamax(&child, depth - 1, 1, -beta, -alpha);
            if best.is_none_or(|(_, current)| score > current) {
                best = Some((mv, score));
                alpha = alpha.max(score);
            }
        }
        best.map(|(mv, _)| mv).ok_or(RecommenderError::NoLegalMoves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use krieg_core::rules::{RulesOracle, parse_uci_move};
    use std::str::FromStr;

    fn suggest(fen: &str, depth: u32) -> ChessMove {
        let board = Board::from_str(fen).expect("valid fen");
        MaterialSearch::new(4)
            .suggest(&StandardRules, &board, depth)
            .expect("a move")
    }

    #[test]
    fn captures_hanging_queen() {
        let mv = suggest("4k3/8/8/3q4/8/8/3R4/4K3 w - - 0 1", 1);
        assert_eq!(mv, parse_uci_move("d2d5").unwrap());
    }

    #[test]
    fn finds_mate_in_one() {
        // Back-rank mate.
        let mv = suggest("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1", 2);
        assert_eq!(mv, parse_uci_move("a1a8").unwrap());
    }

    #[test]
    fn avoids_losing_the_rook_at_depth_two() {
        // Taking the pawn on d5 loses the rook to the c6 pawn.
        let mv = suggest("4k3/8/2p5/3p4/8/8/8/3RK3 w - - 0 1", 2);
        assert_ne!(mv, parse_uci_move("d1d5").unwrap());
    }

    #[test]
    fn is_deterministic() {
        let board = StandardRules.initial_state();
        let mut search = MaterialSearch::new(2);
        let first = search.suggest(&StandardRules, &board, 2).unwrap();
        let second = search.suggest(&StandardRules, &board, 2).unwrap();
        assert_eq!(first, second);
        assert!(search.nodes() > 0);
    }

    #[test]
    fn no_moves_is_an_error() {
        let board = Board::from_str("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let err = MaterialSearch::default()
            .suggest(&StandardRules, &board, 2)
            .unwrap_err();
        assert!(matches!(err, RecommenderError::NoLegalMoves));
    }
}
