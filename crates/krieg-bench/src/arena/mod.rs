//! Orchestrates agent-vs-opponent games against the ground-truth umpire.

mod blueprint;

pub use blueprint::{AgentError, BoxedRecommender};

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chess::{ChessMove, Color};
use krieg_bot::agent::{AgentConfig as BotAgentConfig, KriegAgent};
use krieg_bot::opponent::OpponentPolicy;
use krieg_bot::selector::{SelectError, SelectionSource};
use krieg_core::belief::{
    BeliefError, ConstraintEncoder, HypothesisSet, UpdaterConfig, load_prior_or_start, save_prior,
};
use krieg_core::game::{GameResult, Termination, Umpire, UmpireError};
use krieg_core::rules::{RulesOracle, StandardRules};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::analytics::{AnalyticsCollector, AnalyticsError};
use crate::config::{BenchConfig, ResolvedOutputs};
use blueprint::{RecommenderBlueprint, spawn_opponent};

const OPPONENT_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Primary entry point for running a batch of games.
pub struct ArenaRunner {
    config: BenchConfig,
    outputs: ResolvedOutputs,
    recommender: RecommenderBlueprint,
    updater: UpdaterConfig,
}

/// Summary details returned after a run.
#[derive(Debug)]
pub struct RunSummary {
    pub games_played: usize,
    pub rows_written: usize,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    pub score_rate: f64,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    Win,
    Draw,
    Loss,
}

impl GameOutcome {
    /// Outcome for the agent, which always plays White. `None` means the ply cap was hit.
    pub fn for_agent(result: Option<GameResult>) -> Self {
        match result.and_then(GameResult::winner) {
            Some(Color::White) => GameOutcome::Win,
            Some(Color::Black) => GameOutcome::Loss,
            None => GameOutcome::Draw,
        }
    }

    pub fn score(self) -> f64 {
        match self {
            GameOutcome::Win => 1.0,
            GameOutcome::Draw => 0.5,
            GameOutcome::Loss => 0.0,
        }
    }
}

/// Per-game result, written as one JSONL row.
#[derive(Debug, Clone, Serialize)]
pub struct GameRecord {
    pub game_index: usize,
    pub seed: u64,
    /// `1-0`, `0-1`, `1/2-1/2`, or `*` when the ply cap ended the game.
    pub result: String,
    pub outcome: GameOutcome,
    pub termination: String,
    pub plies: usize,
    pub illegal_attempts: usize,
    pub forced_moves: usize,
    pub recommender_failures: usize,
    pub collapses: usize,
    pub fallbacks: usize,
    pub final_hypotheses: usize,
    pub elapsed_ms: f64,
}

#[derive(Debug, Serialize)]
struct GameLogRow<'a> {
    run_id: &'a str,
    #[serde(flatten)]
    record: &'a GameRecord,
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Agent(#[from] AgentError),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("belief update failed: {0}")]
    Belief(#[from] BeliefError),
    #[error("umpire rejected the game flow: {0}")]
    Umpire(#[from] UmpireError),
    #[error("move selection failed: {0}")]
    Select(#[from] SelectError),
    #[error("failed to start recommender: {0}")]
    Recommender(#[from] krieg_bot::recommender::RecommenderError),
    #[error("failed to save beliefs: {0}")]
    Prior(#[from] krieg_core::belief::PriorError),
    #[error("analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
    #[error("game execution failed: {message}")]
    Game { message: String },
}

impl RunnerError {
    fn game(message: String) -> Self {
        RunnerError::Game { message }
    }
}

/// Counters for one game.
#[derive(Debug, Default)]
struct TurnStats {
    illegal_attempts: usize,
    forced_moves: usize,
    recommender_failures: usize,
    fallbacks: usize,
}

type Agent = KriegAgent<StandardRules, BoxedRecommender>;

impl ArenaRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: BenchConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let recommender = RecommenderBlueprint::from_config(&config.agent)?;
        let updater = config.agent.updater_config();
        Ok(Self {
            config,
            outputs,
            recommender,
            updater,
        })
    }

    /// Play every configured game, streaming JSONL rows to disk.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;
        if let Some(dir) = &self.outputs.beliefs_dir {
            fs::create_dir_all(dir)?;
        }

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut rng = StdRng::seed_from_u64(self.config.games.seed.unwrap_or(0));
        let mut analytics = AnalyticsCollector::new();
        let mut rows_written = 0usize;

        event!(
            target: "krieg_bench::arena",
            Level::INFO,
            run_id = %self.config.run_id,
            games = self.config.games.count,
            max_hypotheses = self.updater.max_hypotheses,
            expansion = self.updater.expansion.as_str(),
            "arena run starting"
        );

        for game_index in 0..self.config.games.count {
            let seed = rng.next_u64();
            let record = self.play_game(game_index, seed)?;
            analytics.record_game(&record);
            serde_json::to_writer(
                &mut writer,
                &GameLogRow {
                    run_id: &self.config.run_id,
                    record: &record,
                },
            )?;
            writer.write_all(b"\n")?;
            rows_written += 1;
        }
        writer.flush()?;

        let summary = analytics.finalize(&self.config.run_id);
        summary.write_markdown(&self.outputs.summary_md)?;

        Ok(RunSummary {
            games_played: summary.games,
            rows_written,
            wins: summary.wins,
            draws: summary.draws,
            losses: summary.losses,
            score_rate: summary.score_rate,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
        })
    }

    fn initial_beliefs(&self, rules: &StandardRules) -> HypothesisSet<chess::Board> {
        match &self.config.agent.prior {
            Some(path) => load_prior_or_start(rules, path),
            None => HypothesisSet::single(rules.initial_state()),
        }
    }

    fn play_game(&self, game_index: usize, seed: u64) -> Result<GameRecord, RunnerError> {
        let start = Instant::now();
        let rules = StandardRules::new();
        let recommender = self.recommender.spawn()?;
        let agent_config = BotAgentConfig {
            updater: self.updater,
            search_depth: self.config.agent.depth,
            seed,
        };
        let mut agent = KriegAgent::with_prior(
            rules,
            recommender,
            agent_config,
            self.initial_beliefs(&rules),
        );
        let mut opponent = spawn_opponent(&self.config.opponent, seed ^ OPPONENT_SEED_SALT);
        let mut umpire = Umpire::new();
        let mut stats = TurnStats::default();

        let played = self.play_out(&mut agent, opponent.as_mut(), &mut umpire, &mut stats);
        // The recommender is released on every exit path.
        agent.shutdown();
        played?;

        if let Some(dir) = &self.outputs.beliefs_dir {
            save_prior(
                &rules,
                dir.join(format!("game_{game_index:04}.json")),
                agent.beliefs(),
            )?;
        }

        let outcome = GameOutcome::for_agent(umpire.result());
        let record = GameRecord {
            game_index,
            seed,
            result: umpire
                .result()
                .map(|result| result.as_str().to_string())
                .unwrap_or_else(|| "*".to_string()),
            outcome,
            termination: umpire
                .termination()
                .map(|termination| termination_label(termination).to_string())
                .unwrap_or_else(|| "max_plies".to_string()),
            plies: umpire.plies(),
            illegal_attempts: stats.illegal_attempts,
            forced_moves: stats.forced_moves,
            recommender_failures: stats.recommender_failures,
            collapses: agent.collapses(),
            fallbacks: stats.fallbacks,
            final_hypotheses: agent.beliefs().len(),
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        };
        event!(
            target: "krieg_bench::arena",
            Level::INFO,
            game_index,
            seed,
            result = %record.result,
            termination = %record.termination,
            plies = record.plies,
            illegal_attempts = record.illegal_attempts,
            collapses = record.collapses,
            "game finished"
        );
        Ok(record)
    }

    fn play_out(
        &self,
        agent: &mut Agent,
        opponent: &mut dyn OpponentPolicy,
        umpire: &mut Umpire,
        stats: &mut TurnStats,
    ) -> Result<(), RunnerError> {
        while !umpire.is_over() && umpire.plies() < self.config.games.max_plies {
            match umpire.side_to_move() {
                Color::White => self.agent_turn(agent, umpire, stats)?,
                Color::Black => opponent_turn(agent, opponent, umpire)?,
            }
        }
        Ok(())
    }

    /// Select, submit, observe; rejected attempts re-select up to the cap.
    fn agent_turn(
        &self,
        agent: &mut Agent,
        umpire: &mut Umpire,
        stats: &mut TurnStats,
    ) -> Result<(), RunnerError> {
        let cap = self.config.games.max_attempts_per_turn;
        for _ in 0..cap {
            let mv = match agent.choose_move(umpire.board()) {
                Ok(selection) => {
                    if selection.source == SelectionSource::GroundTruthFallback {
                        stats.fallbacks += 1;
                    }
                    selection.mv
                }
                Err(SelectError::Recommender(err)) => {
                    stats.recommender_failures += 1;
                    event!(
                        target: "krieg_bench::arena",
                        Level::WARN,
                        error = %err,
                        plies = umpire.plies(),
                        "recommender failed; substituting a random legal move"
                    );
                    agent.fallback_move(umpire.board())?
                }
                Err(err) => return Err(err.into()),
            };

            if submit_own_move(agent, umpire, mv)? {
                return Ok(());
            }
            stats.illegal_attempts += 1;
        }

        stats.forced_moves += 1;
        let mv = agent.fallback_move(umpire.board())?;
        event!(
            target: "krieg_bench::arena",
            Level::DEBUG,
            mv = %mv,
            cap,
            "attempt cap reached; forcing a ground-truth move"
        );
        if submit_own_move(agent, umpire, mv)? {
            Ok(())
        } else {
            Err(RunnerError::game(format!(
                "forced legal move {mv} was rejected by the umpire"
            )))
        }
    }
}

/// Returns whether the umpire accepted the move.
fn submit_own_move(agent: &mut Agent, umpire: &mut Umpire, mv: ChessMove) -> Result<bool, RunnerError> {
    let outcome = umpire.try_move(mv)?;
    let observation = ConstraintEncoder::own_move(outcome.succeeded, &outcome.announcements);
    agent.observe_own_move(mv, &observation)?;
    Ok(outcome.succeeded)
}

fn opponent_turn(
    agent: &mut Agent,
    opponent: &mut dyn OpponentPolicy,
    umpire: &mut Umpire,
) -> Result<(), RunnerError> {
    let mv = opponent.choose(umpire.board()).ok_or_else(|| {
        RunnerError::game("opponent has no legal move in an unfinished game".to_string())
    })?;
    let outcome = umpire.try_move(mv)?;
    let destination = outcome.destination.ok_or_else(|| {
        RunnerError::game(format!("opponent move {mv} was rejected by the umpire"))
    })?;
    let observation = ConstraintEncoder::opponent_move(destination, &outcome.announcements);
    agent.observe_opponent_move(&observation)?;
    Ok(())
}

fn termination_label(termination: Termination) -> &'static str {
    match termination {
        Termination::Checkmate => "checkmate",
        Termination::Stalemate => "stalemate",
        Termination::InsufficientMaterial => "insufficient_material",
        Termination::Repetition => "repetition",
        Termination::SeventyFiveMoves => "seventy_five_moves",
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}
