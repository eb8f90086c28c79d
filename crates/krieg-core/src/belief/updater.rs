//! Self-move and opponent-move transitions over the hypothesis set.

use super::evaluator::{Verdict, evaluate};
use super::{BeliefStatus, HypothesisSet, OpponentMoveObservation, OwnMoveObservation};
use crate::rules::{IllegalMoveError, RulesOracle};
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{Level, event};

const DEFAULT_MAX_HYPOTHESES: usize = 2_000;

/// How a parent's weight is handed to the children produced by opponent-move expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpansionPolicy {
    /// Every child inherits the parent's full weight.
    #[default]
    NoSplit,
    /// The parent's weight is divided evenly across its children.
    UniformSplit,
}

impl ExpansionPolicy {
    pub fn child_weight(self, parent_weight: f64, branches: usize) -> f64 {
        match self {
            ExpansionPolicy::NoSplit => parent_weight,
            ExpansionPolicy::UniformSplit => parent_weight / branches.max(1) as f64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExpansionPolicy::NoSplit => "no-split",
            ExpansionPolicy::UniformSplit => "uniform-split",
        }
    }
}

impl fmt::Display for ExpansionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown expansion policy '{0}' (expected 'no-split' or 'uniform-split')")]
pub struct UnknownPolicy(pub String);

impl FromStr for ExpansionPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "no-split" | "nosplit" => Ok(ExpansionPolicy::NoSplit),
            "uniform-split" | "uniform" => Ok(ExpansionPolicy::UniformSplit),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

/// Tunable bounds for the updater.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdaterConfig {
    /// Upper bound enforced by pruning after every ply.
    pub max_hypotheses: usize,
    pub expansion: ExpansionPolicy,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            max_hypotheses: DEFAULT_MAX_HYPOTHESES,
            expansion: ExpansionPolicy::default(),
        }
    }
}

impl UpdaterConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// `KRIEG_MAX_HYPOTHESES` and `KRIEG_EXPANSION` read through `lookup`;
    /// missing or unparsable values keep the defaults.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();
        let max_hypotheses = lookup("KRIEG_MAX_HYPOTHESES")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(base.max_hypotheses);
        let expansion = lookup("KRIEG_EXPANSION")
            .and_then(|value| value.parse::<ExpansionPolicy>().ok())
            .unwrap_or(base.expansion);
        Self {
            max_hypotheses,
            expansion,
        }
    }
}

/// Bookkeeping for one ply's update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReport {
    /// Hypotheses entering the update.
    pub parents: usize,
    /// Parents dropped because they cannot explain the observation at all.
    pub discarded: usize,
    /// Children produced by applying candidate moves.
    pub expanded: usize,
    /// Children rejected by the constraint filter.
    pub filtered: usize,
    /// Survivors evicted by the size bound.
    pub pruned: usize,
    pub status: BeliefStatus,
}

/// Output of a transition: the next generation plus its report.
#[derive(Debug, Clone)]
pub struct BeliefUpdate<S> {
    pub beliefs: HypothesisSet<S>,
    pub report: UpdateReport,
}

#[derive(Debug, Error)]
pub enum BeliefError {
    #[error("belief invariant violated: {0}")]
    IllegalApply(#[from] IllegalMoveError),
}

/// Produces the next hypothesis set from the previous one and one ply's evidence.
#[derive(Debug, Clone)]
pub struct BeliefUpdater<R> {
    rules: R,
    config: UpdaterConfig,
}

impl<R: RulesOracle> BeliefUpdater<R> {
    pub fn new(rules: R, config: UpdaterConfig) -> Self {
        Self { rules, config }
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub fn config(&self) -> UpdaterConfig {
        self.config
    }

    /// Applies the outcome of the agent's own attempted move.
    pub fn on_own_move(
        &self,
        beliefs: HypothesisSet<R::State>,
        mv: R::Move,
        observation: &OwnMoveObservation,
    ) -> Result<BeliefUpdate<R::State>, BeliefError> {
        let parents = beliefs.len();
        let mut next = HypothesisSet::new();
        let mut discarded = 0usize;
        let mut expanded = 0usize;
        let mut filtered = 0usize;

        if !observation.succeeded {
            // Rejection already filters; announcements are not consulted here.
            for hypothesis in beliefs {
                let (state, weight) = hypothesis.into_parts();
                if self.rules.is_legal(&state, mv) {
                    discarded += 1;
                } else {
                    next.push(state, weight);
                }
            }
        } else {
            for hypothesis in beliefs {
                let (state, weight) = hypothesis.into_parts();
                if !self.rules.is_legal(&state, mv) {
                    discarded += 1;
                    continue;
                }
                let child = self.rules.apply(&state, mv)?;
                expanded += 1;
                match evaluate(&self.rules, &child, &observation.constraints) {
                    Verdict::Consistent => next.push(child, weight),
                    Verdict::Rejected { .. } => filtered += 1,
                }
            }
        }

        let update = self.finish(next, parents, discarded, expanded, filtered);
        event!(
            target: "krieg_core::belief",
            Level::DEBUG,
            transition = "own_move",
            mv = %mv,
            succeeded = observation.succeeded,
            parents,
            discarded,
            expanded,
            filtered,
            pruned = update.report.pruned,
            hypotheses = update.beliefs.len(),
            status = update.report.status.as_str(),
        );
        Ok(update)
    }

    /// Applies the opponent's move, known only by its destination square.
    pub fn on_opponent_move(
        &self,
        beliefs: HypothesisSet<R::State>,
        observation: &OpponentMoveObservation,
    ) -> Result<BeliefUpdate<R::State>, BeliefError> {
        let parents = beliefs.len();
        let mut next = HypothesisSet::new();
        let mut discarded = 0usize;
        let mut expanded = 0usize;
        let mut filtered = 0usize;

        for hypothesis in beliefs {
            let (state, weight) = hypothesis.into_parts();
            let candidates: Vec<R::Move> = self
                .rules
                .legal_moves(&state)
                .into_iter()
                .filter(|mv| self.rules.destination(*mv) == observation.destination)
                .collect();
            if candidates.is_empty() {
                discarded += 1;
                continue;
            }

            let child_weight = self.config.expansion.child_weight(weight, candidates.len());
            for mv in candidates {
                let child = self.rules.apply(&state, mv)?;
                expanded += 1;
                match evaluate(&self.rules, &child, &observation.constraints) {
                    Verdict::Consistent => next.push(child, child_weight),
                    Verdict::Rejected { .. } => filtered += 1,
                }
            }
        }

        let update = self.finish(next, parents, discarded, expanded, filtered);
        event!(
            target: "krieg_core::belief",
            Level::DEBUG,
            transition = "opponent_move",
            destination = %observation.destination,
            policy = self.config.expansion.as_str(),
            parents,
            discarded,
            expanded,
            filtered,
            pruned = update.report.pruned,
            hypotheses = update.beliefs.len(),
            status = update.report.status.as_str(),
        );
        Ok(update)
    }

    fn finish(
        &self,
        mut next: HypothesisSet<R::State>,
        parents: usize,
        discarded: usize,
        expanded: usize,
        filtered: usize,
    ) -> BeliefUpdate<R::State> {
        next.normalize();
        let before_prune = next.len();
        next.prune(self.config.max_hypotheses);
        let report = UpdateReport {
            parents,
            discarded,
            expanded,
            filtered,
            pruned: before_prune - next.len(),
            status: next.status(),
        };
        if report.status.is_collapsed() && parents > 0 {
            event!(
                target: "krieg_core::belief",
                Level::INFO,
                parents,
                discarded,
                filtered,
                "belief collapsed: no hypothesis survived the update"
            );
        }
        BeliefUpdate {
            beliefs: next,
            report,
        }
    }
}
