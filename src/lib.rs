//! Mini Games - Memory Match, Number Rush and Color Blast
//!
//! Core modules:
//! - `sim`: Game engines and the session state machine (pure, seeded)
//! - `scoreboard`: Persistent score history and leaderboards
//! - `menu`: Owns the running session and commits its scores
//! - `persistence`: File storage with versioned, backed-up JSON
//! - `settings`: Data-driven level tables and themes

pub mod error;
pub mod menu;
pub mod persistence;
pub mod scoreboard;
pub mod settings;
pub mod sim;

pub use error::{GameError, Result};
pub use menu::MenuController;
pub use scoreboard::{GameType, ScoreRecord, Scoreboard};
pub use settings::{Difficulty, Settings};
pub use sim::{GameEvent, GameSession, InputEvent, SessionConfig};

/// Game configuration constants
pub mod consts {
    pub const MIN_PLAYERS: usize = 1;
    pub const MAX_PLAYERS: usize = 4;

    pub const MIN_LEVEL: u8 = 1;
    pub const MAX_LEVEL: u8 = 5;

    /// Number Rush layout slot relative to the click-target size
    pub const SLOT_SCALE: f32 = 1.25;
}
