//! Persisted prior exchange: an ordered JSON array of `{ state, weight }` pairs.

use super::HypothesisSet;
use crate::rules::{CodecError, StateCodec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{Level, event};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorEntry {
    /// State encoding produced by [`StateCodec::encode`] (FEN for standard chess).
    pub state: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct PriorSnapshot {
    pub entries: Vec<PriorEntry>,
}

#[derive(Debug, Error)]
pub enum PriorError {
    #[error("failed to access prior {path:?}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse prior: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("prior entry {index}: {source}")]
    Codec {
        index: usize,
        #[source]
        source: CodecError,
    },
    #[error("prior entry {index} has invalid weight {weight}")]
    InvalidWeight { index: usize, weight: f64 },
    #[error("prior carries no positive weight")]
    Empty,
}

impl PriorSnapshot {
    pub fn capture<R: StateCodec>(rules: &R, beliefs: &HypothesisSet<R::State>) -> Self {
        let entries = beliefs
            .iter()
            .map(|hypothesis| PriorEntry {
                state: rules.encode(hypothesis.state()),
                weight: hypothesis.weight(),
            })
            .collect();
        Self { entries }
    }

    /// Decodes every entry and normalizes; order is preserved.
    pub fn restore<R: StateCodec>(&self, rules: &R) -> Result<HypothesisSet<R::State>, PriorError> {
        let mut beliefs = HypothesisSet::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if !entry.weight.is_finite() || entry.weight < 0.0 {
                return Err(PriorError::InvalidWeight {
                    index,
                    weight: entry.weight,
                });
            }
            let state = rules
                .decode(&entry.state)
                .map_err(|source| PriorError::Codec { index, source })?;
            beliefs.push(state, entry.weight);
        }
        beliefs.normalize();
        if beliefs.is_empty() {
            return Err(PriorError::Empty);
        }
        Ok(beliefs)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

pub fn save_prior<R: StateCodec>(
    rules: &R,
    path: impl AsRef<Path>,
    beliefs: &HypothesisSet<R::State>,
) -> Result<(), PriorError> {
    let path = path.as_ref();
    let json = PriorSnapshot::capture(rules, beliefs).to_json()?;
    fs::write(path, json).map_err(|source| PriorError::Io {
        source,
        path: path.to_path_buf(),
    })
}

pub fn load_prior<R: StateCodec>(
    rules: &R,
    path: impl AsRef<Path>,
) -> Result<HypothesisSet<R::State>, PriorError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| PriorError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    PriorSnapshot::from_json(&json)?.restore(rules)
}

/// Loads the prior, falling back to the canonical start with weight 1.0 on any failure.
pub fn load_prior_or_start<R: StateCodec>(rules: &R, path: impl AsRef<Path>) -> HypothesisSet<R::State> {
    let path = path.as_ref();
    match load_prior(rules, path) {
        Ok(beliefs) => {
            event!(
                target: "krieg_core::prior",
                Level::INFO,
                path = %path.display(),
                hypotheses = beliefs.len(),
                "loaded prior belief states"
            );
            beliefs
        }
        Err(err) => {
            event!(
                target: "krieg_core::prior",
                Level::WARN,
                path = %path.display(),
                error = %err,
                "failed to load prior; falling back to the start position"
            );
            HypothesisSet::single(rules.initial_state())
        }
    }
}
