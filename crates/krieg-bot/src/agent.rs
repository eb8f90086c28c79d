use crate::recommender::MoveRecommender;
use crate::selector::{MoveSelector, SelectError, Selection};
use krieg_core::belief::{
    BeliefError, BeliefMetrics, BeliefStatus, BeliefUpdater, HypothesisSet,
    OpponentMoveObservation, OwnMoveObservation, UpdateReport, UpdaterConfig,
};
use krieg_core::rules::RulesOracle;
use std::mem;
use tracing::{Level, event};

const DEFAULT_SEARCH_DEPTH: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentConfig {
    pub updater: UpdaterConfig,
    pub search_depth: u32,
    pub seed: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            updater: UpdaterConfig::default(),
            search_depth: DEFAULT_SEARCH_DEPTH,
            seed: 0,
        }
    }
}

/// Kriegspiel player: tracks beliefs about the hidden board and asks the
/// recommender about the most likely one.
pub struct KriegAgent<R: RulesOracle, M> {
    updater: BeliefUpdater<R>,
    selector: MoveSelector<R, M>,
    beliefs: HypothesisSet<R::State>,
    collapses: usize,
}

impl<R, M> KriegAgent<R, M>
where
    R: RulesOracle + Clone,
    M: MoveRecommender<R>,
{
    /// Starts from the canonical initial position with weight 1.0.
    pub fn new(rules: R, recommender: M, config: AgentConfig) -> Self {
        let beliefs = HypothesisSet::single(rules.initial_state());
        Self::with_prior(rules, recommender, config, beliefs)
    }

    pub fn with_prior(
        rules: R,
        recommender: M,
        config: AgentConfig,
        beliefs: HypothesisSet<R::State>,
    ) -> Self {
        Self {
            updater: BeliefUpdater::new(rules.clone(), config.updater),
            selector: MoveSelector::new(rules, recommender, config.search_depth, config.seed),
            beliefs,
            collapses: 0,
        }
    }

    pub fn beliefs(&self) -> &HypothesisSet<R::State> {
        &self.beliefs
    }

    pub fn status(&self) -> BeliefStatus {
        self.beliefs.status()
    }

    pub fn metrics(&self) -> BeliefMetrics {
        BeliefMetrics::from_beliefs(&self.beliefs)
    }

    /// Number of updates that turned a non-empty set into an empty one.
    pub fn collapses(&self) -> usize {
        self.collapses
    }

    pub fn choose_move(&mut self, truth: &R::State) -> Result<Selection<R::Move>, SelectError> {
        self.selector.select(&self.beliefs, truth)
    }

    /// Random legal move from the ground truth, for the orchestrator's recovery paths.
    pub fn fallback_move(&mut self, truth: &R::State) -> Result<R::Move, SelectError> {
        self.selector.random_legal(truth)
    }

    pub fn observe_own_move(
        &mut self,
        mv: R::Move,
        observation: &OwnMoveObservation,
    ) -> Result<UpdateReport, BeliefError> {
        let beliefs = mem::take(&mut self.beliefs);
        let update = self.updater.on_own_move(beliefs, mv, observation)?;
        Ok(self.accept(update.beliefs, update.report))
    }

    pub fn observe_opponent_move(
        &mut self,
        observation: &OpponentMoveObservation,
    ) -> Result<UpdateReport, BeliefError> {
        let beliefs = mem::take(&mut self.beliefs);
        let update = self.updater.on_opponent_move(beliefs, observation)?;
        Ok(self.accept(update.beliefs, update.report))
    }

    pub fn shutdown(&mut self) {
        self.selector.shutdown();
    }

    fn accept(&mut self, beliefs: HypothesisSet<R::State>, report: UpdateReport) -> UpdateReport {
        if report.parents > 0 && report.status.is_collapsed() {
            self.collapses += 1;
            event!(
                target: "krieg_bot::agent",
                Level::WARN,
                collapses = self.collapses,
                "belief collapsed; moves will come from the ground-truth fallback"
            );
        }
        self.beliefs = beliefs;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommender::MaterialSearch;
    use crate::selector::SelectionSource;
    use krieg_core::belief::ConstraintEncoder;
    use krieg_core::game::Umpire;
    use krieg_core::rules::{StandardRules, parse_uci_move};

    fn agent() -> KriegAgent<StandardRules, MaterialSearch> {
        KriegAgent::new(StandardRules, MaterialSearch::new(1), AgentConfig::default())
    }

    #[test]
    fn starts_with_single_hypothesis() {
        let agent = agent();
        assert_eq!(agent.status(), BeliefStatus::Tracking { hypotheses: 1 });
        assert_eq!(agent.metrics().entropy, 0.0);
    }

    #[test]
    fn follows_a_short_exchange() {
        let mut agent = agent();
        let mut umpire = Umpire::new();

        let selection = agent.choose_move(umpire.board()).unwrap();
        assert_eq!(selection.source, SelectionSource::Recommender);
        let outcome = umpire.try_move(selection.mv).unwrap();
        assert!(outcome.succeeded);
        agent
            .observe_own_move(
                selection.mv,
                &ConstraintEncoder::own_move(outcome.succeeded, &outcome.announcements),
            )
            .unwrap();

        let reply = umpire.try_move(parse_uci_move("b8c6").unwrap()).unwrap();
        let report = agent
            .observe_opponent_move(&ConstraintEncoder::opponent_move(
                reply.destination.unwrap(),
                &reply.announcements,
            ))
            .unwrap();
        assert!(!report.status.is_collapsed());
        assert!(
            agent
                .beliefs()
                .iter()
                .any(|h| h.state() == umpire.board())
        );
        assert_eq!(agent.collapses(), 0);
    }

    #[test]
    fn collapse_is_counted_and_fallback_used() {
        let mut agent = agent();
        let umpire = Umpire::new();
        let mv = parse_uci_move("e2e4").unwrap();
        // Claim the legal e2e4 was rejected: contradicts the only hypothesis.
        let report = agent
            .observe_own_move(mv, &ConstraintEncoder::own_move(false, ["No"]))
            .unwrap();
        assert!(report.status.is_collapsed());
        assert_eq!(agent.collapses(), 1);

        let selection = agent.choose_move(umpire.board()).unwrap();
        assert_eq!(selection.source, SelectionSource::GroundTruthFallback);
        assert!(umpire.board().legal(selection.mv));

        // Updating an already-empty set is not a new collapse.
        agent
            .observe_own_move(mv, &ConstraintEncoder::own_move(false, ["No"]))
            .unwrap();
        assert_eq!(agent.collapses(), 1);
    }
}
