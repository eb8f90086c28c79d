//! Belief-state estimation over hidden opponent pieces.
//!
//! This module is composed of:
//! - `hypothesis`: weighted candidate states (`HypothesisSet`) with normalize/prune.
//! - `constraint`: the closed constraint vocabulary and the announcement encoder.
//! - `evaluator`: ordered, short-circuiting constraint checks.
//! - `updater`: the self-move and opponent-move transitions.
//! - `prior`: persisted prior exchange.
//! - `telemetry`: summary metrics for logging.

mod constraint;
mod evaluator;
mod hypothesis;
pub mod prior;
pub mod telemetry;
mod updater;

pub use constraint::{
    Constraint, ConstraintEncoder, OpponentMoveObservation, OwnMoveObservation, PlyContext,
};
pub use evaluator::{Verdict, evaluate, satisfies};
pub use hypothesis::{BeliefStatus, Hypothesis, HypothesisSet, WEIGHT_TOLERANCE};
pub use prior::{PriorError, PriorSnapshot, load_prior, load_prior_or_start, save_prior};
pub use telemetry::BeliefMetrics;
pub use updater::{
    BeliefError, BeliefUpdate, BeliefUpdater, ExpansionPolicy, UnknownPolicy, UpdateReport,
    UpdaterConfig,
};
