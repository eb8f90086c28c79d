use krieg_bot::opponent::{OpponentPolicy, QuantalOpponent, RandomOpponent};
use krieg_bot::recommender::{MaterialSearch, MoveRecommender, RecommenderError, UciEngine};
use krieg_core::rules::StandardRules;
use thiserror::Error;

use crate::config::{AgentConfig, OpponentConfig, OpponentKind, RecommenderKind};

pub type BoxedRecommender = Box<dyn MoveRecommender<StandardRules>>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid {kind} recommender parameter: {message}")]
    InvalidParam { kind: &'static str, message: String },
}

/// Parsed recommender settings; a fresh recommender is built for every game.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum RecommenderBlueprint {
    Material { max_depth: u32 },
    Uci { command: String, args: Vec<String> },
}

impl RecommenderBlueprint {
    pub(super) fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        match config.recommender {
            RecommenderKind::Material => Self::material_from_params(config),
            RecommenderKind::Uci => Self::uci_from_params(&config.params),
        }
    }

    fn material_from_params(config: &AgentConfig) -> Result<Self, AgentError> {
        let invalid = |message: &str| AgentError::InvalidParam {
            kind: "material",
            message: message.to_string(),
        };
        let mut max_depth = config.depth;
        if let Some(mapping) = config.params.as_mapping() {
            for (key, value) in mapping {
                if key.as_str() == Some("max_depth") {
                    max_depth = value
                        .as_u64()
                        .filter(|depth| *depth > 0)
                        .and_then(|depth| u32::try_from(depth).ok())
                        .ok_or_else(|| invalid("max_depth must be a positive integer"))?;
                }
            }
        } else if !config.params.is_null() {
            return Err(invalid("expected mapping for material params"));
        }
        Ok(RecommenderBlueprint::Material { max_depth })
    }

    fn uci_from_params(params: &serde_yaml::Value) -> Result<Self, AgentError> {
        let invalid = |message: &str| AgentError::InvalidParam {
            kind: "uci",
            message: message.to_string(),
        };
        let mapping = params
            .as_mapping()
            .ok_or_else(|| invalid("expected mapping with a 'command' entry"))?;

        let mut command = None;
        let mut args = Vec::new();
        for (key, value) in mapping {
            match key.as_str() {
                Some("command") => {
                    command = Some(
                        value
                            .as_str()
                            .ok_or_else(|| invalid("command must be a string"))?
                            .to_string(),
                    );
                }
                Some("args") => {
                    let seq = value
                        .as_sequence()
                        .ok_or_else(|| invalid("args must be an array of strings"))?;
                    args = seq
                        .iter()
                        .filter_map(|v| v.as_str().map(|s| s.to_string()))
                        .collect();
                }
                _ => {}
            }
        }

        let command = command
            .filter(|cmd| !cmd.trim().is_empty())
            .ok_or_else(|| invalid("command is required"))?;
        Ok(RecommenderBlueprint::Uci { command, args })
    }

    pub(super) fn spawn(&self) -> Result<BoxedRecommender, RecommenderError> {
        match self {
            RecommenderBlueprint::Material { max_depth } => {
                Ok(Box::new(MaterialSearch::new(*max_depth)))
            }
            RecommenderBlueprint::Uci { command, args } => {
                Ok(Box::new(UciEngine::spawn(command, args)?))
            }
        }
    }
}

pub(super) fn spawn_opponent(config: &OpponentConfig, seed: u64) -> Box<dyn OpponentPolicy> {
    match config.kind {
        OpponentKind::Quantal => Box::new(QuantalOpponent::new(config.lambda, seed)),
        OpponentKind::Random => Box::new(RandomOpponent::new(seed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(yaml: &str) -> AgentConfig {
        serde_yaml::from_str(yaml).expect("agent yaml")
    }

    #[test]
    fn material_defaults_to_search_depth() {
        let config = agent("recommender: material\ndepth: 3\n");
        assert_eq!(
            RecommenderBlueprint::from_config(&config).unwrap(),
            RecommenderBlueprint::Material { max_depth: 3 }
        );
        let config = agent("recommender: material\nparams:\n  max_depth: 5\n");
        assert_eq!(
            RecommenderBlueprint::from_config(&config).unwrap(),
            RecommenderBlueprint::Material { max_depth: 5 }
        );
    }

    #[test]
    fn uci_requires_command() {
        let config = agent("recommender: uci\nparams:\n  args: [\"--threads\", \"1\"]\n");
        assert!(matches!(
            RecommenderBlueprint::from_config(&config),
            Err(AgentError::InvalidParam { kind: "uci", .. })
        ));

        let config = agent("recommender: uci\nparams:\n  command: stockfish\n  args: [\"-q\"]\n");
        assert_eq!(
            RecommenderBlueprint::from_config(&config).unwrap(),
            RecommenderBlueprint::Uci {
                command: "stockfish".into(),
                args: vec!["-q".into()],
            }
        );
    }

    #[test]
    fn rejects_zero_max_depth() {
        let config = agent("recommender: material\nparams:\n  max_depth: 0\n");
        assert!(RecommenderBlueprint::from_config(&config).is_err());
    }

    #[test]
    fn missing_engine_binary_fails_at_spawn() {
        let blueprint = RecommenderBlueprint::Uci {
            command: "krieg-no-such-engine-binary".into(),
            args: Vec::new(),
        };
        assert!(matches!(
            blueprint.spawn(),
            Err(RecommenderError::Spawn { .. })
        ));
    }
}
