pub mod agent;
pub mod eval;
pub mod opponent;
pub mod recommender;
pub mod selector;

pub use agent::{AgentConfig, KriegAgent};
pub use opponent::{OpponentPolicy, QuantalOpponent, RandomOpponent};
pub use recommender::{MaterialSearch, MoveRecommender, RecommenderError, UciEngine};
pub use selector::{MoveSelector, SelectError, Selection, SelectionSource};
