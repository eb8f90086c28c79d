use std::fs;
use std::path::Path;

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;
use thiserror::Error;

use crate::arena::{GameOutcome, GameRecord};

const CONFIDENCE_LEVEL: f64 = 0.95;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Accumulates per-game records into the run summary.
#[derive(Debug, Default)]
pub struct AnalyticsCollector {
    scores: Vec<f64>,
    wins: usize,
    draws: usize,
    losses: usize,
    plies: usize,
    illegal_attempts: usize,
    collapses: usize,
    fallbacks: usize,
    forced_moves: usize,
    recommender_failures: usize,
    final_hypotheses: usize,
}

impl AnalyticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_game(&mut self, record: &GameRecord) {
        match record.outcome {
            GameOutcome::Win => self.wins += 1,
            GameOutcome::Draw => self.draws += 1,
            GameOutcome::Loss => self.losses += 1,
        }
        self.scores.push(record.outcome.score());
        self.plies += record.plies;
        self.illegal_attempts += record.illegal_attempts;
        self.collapses += record.collapses;
        self.fallbacks += record.fallbacks;
        self.forced_moves += record.forced_moves;
        self.recommender_failures += record.recommender_failures;
        self.final_hypotheses += record.final_hypotheses;
    }

    pub fn finalize(self, run_id: &str) -> ArenaSummary {
        let games = self.scores.len();
        let per_game = |total: usize| {
            if games == 0 {
                0.0
            } else {
                total as f64 / games as f64
            }
        };
        ArenaSummary {
            run_id: run_id.to_string(),
            games,
            wins: self.wins,
            draws: self.draws,
            losses: self.losses,
            score_rate: if games == 0 {
                0.0
            } else {
                self.scores.iter().sum::<f64>() / games as f64
            },
            ci95: confidence_interval(&self.scores),
            avg_plies: per_game(self.plies),
            avg_illegal_attempts: per_game(self.illegal_attempts),
            avg_final_hypotheses: per_game(self.final_hypotheses),
            collapses: self.collapses,
            fallbacks: self.fallbacks,
            forced_moves: self.forced_moves,
            recommender_failures: self.recommender_failures,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArenaSummary {
    pub run_id: String,
    pub games: usize,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    /// Mean of 1 / 0.5 / 0 per game from the agent's perspective.
    pub score_rate: f64,
    pub ci95: (f64, f64),
    pub avg_plies: f64,
    pub avg_illegal_attempts: f64,
    pub avg_final_hypotheses: f64,
    pub collapses: usize,
    pub fallbacks: usize,
    pub forced_moves: usize,
    pub recommender_failures: usize,
}

impl ArenaSummary {
    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), AnalyticsError> {
        let mut rows = String::new();
        rows.push_str(&format!("# Arena Summary: {}\n\n", self.run_id));
        rows.push_str("| Games | Wins | Draws | Losses | Score | 95% CI | Avg plies | Avg illegal attempts | Avg final hypotheses |\n");
        rows.push_str("|-------|------|-------|--------|-------|--------|-----------|----------------------|----------------------|\n");
        rows.push_str(&format!(
            "| {games} | {wins} | {draws} | {losses} | {score:.3} | [{low:.3}, {high:.3}] | {plies:.1} | {illegal:.2} | {hyps:.1} |\n\n",
            games = self.games,
            wins = self.wins,
            draws = self.draws,
            losses = self.losses,
            score = self.score_rate,
            low = self.ci95.0,
            high = self.ci95.1,
            plies = self.avg_plies,
            illegal = self.avg_illegal_attempts,
            hyps = self.avg_final_hypotheses,
        ));
        rows.push_str("## Degraded turns\n\n");
        rows.push_str(&format!("- Belief collapses: {}\n", self.collapses));
        rows.push_str(&format!("- Ground-truth fallback moves: {}\n", self.fallbacks));
        rows.push_str(&format!(
            "- Moves forced after the attempt cap: {}\n",
            self.forced_moves
        ));
        rows.push_str(&format!(
            "- Recommender failures: {}\n",
            self.recommender_failures
        ));

        fs::write(path.as_ref(), rows).map_err(|source| AnalyticsError::Io {
            context: "writing summary markdown",
            source,
        })
    }
}

/// Normal-approximation interval for the mean score, clamped to [0, 1].
fn confidence_interval(scores: &[f64]) -> (f64, f64) {
    if scores.is_empty() {
        return (0.0, 0.0);
    }
    let mean = scores.mean();
    if scores.len() == 1 {
        return (mean, mean);
    }
    let std_error = (scores.variance() / scores.len() as f64).sqrt();
    let margin = z_score(CONFIDENCE_LEVEL) * std_error;
    ((mean - margin).max(0.0), (mean + margin).min(1.0))
}

fn z_score(confidence: f64) -> f64 {
    let quantile = 1.0 - (1.0 - confidence) / 2.0;
    Normal::new(0.0, 1.0)
        .map(|normal| normal.inverse_cdf(quantile))
        .unwrap_or(1.96)
}
