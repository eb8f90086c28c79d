#![deny(warnings)]
pub mod belief;
pub mod game;
pub mod rules;

pub struct AppInfo;

impl AppInfo {
    pub const fn name() -> &'static str {
        "kriegspiel"
    }

    pub const fn codename() -> &'static str {
        "Blindfold Filter"
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
