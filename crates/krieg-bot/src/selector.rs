use crate::recommender::{MoveRecommender, RecommenderError};
use krieg_core::belief::HypothesisSet;
use krieg_core::rules::RulesOracle;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{Level, event};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    Recommender,
    /// Belief collapsed; the move was drawn from the ground-truth position.
    GroundTruthFallback,
}

impl SelectionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionSource::Recommender => "recommender",
            SelectionSource::GroundTruthFallback => "ground_truth_fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection<M> {
    pub mv: M,
    pub source: SelectionSource,
}

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("move recommender failed: {0}")]
    Recommender(#[from] RecommenderError),
    #[error("ground-truth position has no legal moves")]
    NoLegalMoves,
}

/// Picks the move to attempt from the current beliefs.
pub struct MoveSelector<R, M> {
    rules: R,
    recommender: M,
    depth: u32,
    rng: StdRng,
}

impl<R, M> MoveSelector<R, M>
where
    R: RulesOracle,
    M: MoveRecommender<R>,
{
    pub fn new(rules: R, recommender: M, depth: u32, seed: u64) -> Self {
        Self {
            rules,
            recommender,
            depth,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn recommender(&self) -> &M {
        &self.recommender
    }

    /// Consults the recommender on the most likely hypothesis. `truth` is a
    /// privileged channel read only when the beliefs have collapsed.
    pub fn select(
        &mut self,
        beliefs: &HypothesisSet<R::State>,
        truth: &R::State,
    ) -> Result<Selection<R::Move>, SelectError> {
        match beliefs.most_likely() {
            Some(top) => {
                let mv = self
                    .recommender
                    .suggest(&self.rules, top.state(), self.depth)?;
                event!(
                    target: "krieg_bot::selector",
                    Level::DEBUG,
                    mv = %mv,
                    weight = top.weight(),
                    hypotheses = beliefs.len(),
                    recommender = self.recommender.name(),
                    "recommended move"
                );
                Ok(Selection {
                    mv,
                    source: SelectionSource::Recommender,
                })
            }
            None => {
                let mv = self.random_legal(truth)?;
                event!(
                    target: "krieg_bot::selector",
                    Level::DEBUG,
                    mv = %mv,
                    "beliefs collapsed; using ground-truth fallback"
                );
                Ok(Selection {
                    mv,
                    source: SelectionSource::GroundTruthFallback,
                })
            }
        }
    }

    /// Uniformly random legal move in `truth`, drawn from the seeded stream.
    pub fn random_legal(&mut self, truth: &R::State) -> Result<R::Move, SelectError> {
        self.rules
            .legal_moves(truth)
            .choose(&mut self.rng)
            .copied()
            .ok_or(SelectError::NoLegalMoves)
    }

    pub fn shutdown(&mut self) {
        self.recommender.shutdown();
    }
}
