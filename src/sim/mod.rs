//! Game logic module
//!
//! Every mini-game lives here. This module must stay pure and deterministic:
//! - Time only arrives as the `now` argument of each input
//! - Seeded RNG only
//! - Timers are data; the caller decides when to fire them
//! - No storage or presentation dependencies

pub mod engine;
pub mod event;
pub mod matching;
pub mod reaction;
pub mod sequencing;
pub mod session;

pub use engine::{Engine, EngineSetup, GameEngine, TimerQueue, time_weighted_points};
pub use event::{GameEvent, InputEvent, RoundEnd, SessionId, Timer, TimerId, TimerKind};
pub use matching::{Board, Card, CardState, MatchingEngine};
pub use reaction::{BlastPhase, Prompt, ReactionEngine};
pub use sequencing::{RushPhase, SequencingEngine, Target};
pub use session::{GameSession, SessionConfig, SessionPhase};
