//! Ground-truth side of a Kriegspiel game: the umpire that knows the real
//! board and discloses only announcements.

mod umpire;

pub use umpire::{GameResult, MoveOutcome, Termination, Umpire, UmpireError, pseudo_legal};
