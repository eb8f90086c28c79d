//! Full-information move search consulted on the most likely hypothesis.

mod material;
mod uci;

pub use material::MaterialSearch;
pub use uci::UciEngine;

use krieg_core::rules::RulesOracle;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecommenderError {
    #[error("position has no legal moves")]
    NoLegalMoves,
    #[error("failed to start engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("engine i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("engine protocol error: {0}")]
    Protocol(String),
    #[error("engine exited unexpectedly")]
    EngineExited,
    #[error("engine has been shut down")]
    NotRunning,
    #[error("engine suggested illegal move {0}")]
    IllegalSuggestion(String),
}

/// Synchronous search service. A call may block; there is no timeout.
pub trait MoveRecommender<R: RulesOracle> {
    fn name(&self) -> &str;

    fn suggest(
        &mut self,
        rules: &R,
        state: &R::State,
        depth: u32,
    ) -> Result<R::Move, RecommenderError>;

    /// Releases any held resources. Must be safe to call more than once.
    fn shutdown(&mut self) {}
}

impl<R: RulesOracle, T: MoveRecommender<R> + ?Sized> MoveRecommender<R> for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn suggest(
        &mut self,
        rules: &R,
        state: &R::State,
        depth: u32,
    ) -> Result<R::Move, RecommenderError> {
        (**self).suggest(rules, state, depth)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}
