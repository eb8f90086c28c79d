//! Ground-truth move pickers for the hidden side.

use crate::eval::material_balance;
use chess::{Board, ChessMove, MoveGen};
use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

pub const DEFAULT_LAMBDA: f64 = 0.004;

pub trait OpponentPolicy {
    fn name(&self) -> &'static str;

    /// `None` when the position has no legal moves.
    fn choose(&mut self, board: &Board) -> Option<ChessMove>;
}

/// Quantal response over material: P(m) is proportional to exp(lambda * U(m)),
/// with U the mover's material balance after m.
#[derive(Debug, Clone)]
pub struct QuantalOpponent {
    lambda: f64,
    rng: StdRng,
}

impl QuantalOpponent {
    pub fn new(lambda: f64, seed: u64) -> Self {
        Self {
            lambda,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Move probabilities in generation order.
    pub fn distribution(&self, board: &Board) -> Vec<(ChessMove, f64)> {
        let mover = board.side_to_move();
        let scored: Vec<(ChessMove, f64)> = MoveGen::new_legal(board)
            .map(|mv| {
                let after = board.make_move_new(mv);
                (mv, self.lambda * material_balance(&after, mover) as f64)
            })
            .collect();
        let Some(max) = scored.iter().map(|(_, u)| *u).reduce(f64::max) else {
            return Vec::new();
        };
        let exps: Vec<f64> = scored.iter().map(|(_, u)| (u - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        scored
            .into_iter()
            .zip(exps)
            .map(|((mv, _), weight)| (mv, weight / total))
            .collect()
    }
}

impl OpponentPolicy for QuantalOpponent {
    fn name(&self) -> &'static str {
        "quantal"
    }

    fn choose(&mut self, board: &Board) -> Option<ChessMove> {
        let distribution = self.distribution(board);
        let index = WeightedIndex::new(distribution.iter().map(|(_, p)| *p)).ok()?;
        Some(distribution[index.sample(&mut self.rng)].0)
    }
}

#[derive(Debug, Clone)]
pub struct RandomOpponent {
    rng: StdRng,
}

impl RandomOpponent {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl OpponentPolicy for RandomOpponent {
    fn name(&self) -> &'static str {
        "random"
    }

    fn choose(&mut self, board: &Board) -> Option<ChessMove> {
        let moves: Vec<ChessMove> = MoveGen::new_legal(board).collect();
        moves.choose(&mut self.rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use krieg_core::rules::parse_uci_move;
    use std::str::FromStr;

    const HANGING_QUEEN: &str = "4k3/8/8/3Q4/8/8/3r4/4K3 b - - 0 1";

    #[test]
    fn distribution_sums_to_one_and_favours_material() {
        let board = Board::from_str(HANGING_QUEEN).unwrap();
        let opponent = QuantalOpponent::new(1.0, 0);
        let distribution = opponent.distribution(&board);
        let total: f64 = distribution.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-9);

        let capture = parse_uci_move("d2d5").unwrap();
        let (_, capture_p) = distribution
            .iter()
            .find(|(mv, _)| *mv == capture)
            .copied()
            .unwrap();
        assert!(distribution.iter().all(|(_, p)| *p <= capture_p));
    }

    #[test]
    fn default_lambda_is_nearly_uniform() {
        let board = Board::default();
        let distribution = QuantalOpponent::new(DEFAULT_LAMBDA, 0).distribution(&board);
        assert_eq!(distribution.len(), 20);
        for (_, p) in distribution {
            assert!((p - 0.05).abs() < 1e-9);
        }
    }

    #[test]
    fn seeded_choices_repeat() {
        let board = Board::default();
        let mut a = QuantalOpponent::new(DEFAULT_LAMBDA, 99);
        let mut b = QuantalOpponent::new(DEFAULT_LAMBDA, 99);
        for _ in 0..10 {
            assert_eq!(a.choose(&board), b.choose(&board));
        }
        let mut c = RandomOpponent::new(5);
        let mut d = RandomOpponent::new(5);
        for _ in 0..10 {
            let mv = c.choose(&board);
            assert_eq!(mv, d.choose(&board));
            assert!(mv.is_some_and(|mv| board.legal(mv)));
        }
    }

    #[test]
    fn no_moves_yields_none() {
        let stalemate = Board::from_str("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(QuantalOpponent::new(DEFAULT_LAMBDA, 1).choose(&stalemate), None);
        assert_eq!(RandomOpponent::new(1).choose(&stalemate), None);
    }
}
