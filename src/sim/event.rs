//! Inputs consumed by the game engines and the events they report back

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Identifies one session handed out by the menu
pub type SessionId = u64;

/// A scheduled callback. Only ids that are still pending have any effect when fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId {
    pub session: SessionId,
    pub seq: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerKind {
    /// Round time limit (Memory Match, Number Rush)
    RoundLimit,
    /// Hide a mismatched pair of cards
    HidePair,
    /// Skip an unanswered Color Blast prompt
    PromptTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    pub id: TimerId,
    pub kind: TimerKind,
    /// Session clock (seconds) at which the timer should fire
    pub fire_at: f32,
}

/// Player input or timer callback, as delivered by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Memory Match: reveal the card at this index
    CellClicked { cell: usize },
    /// Number Rush: a target was clicked
    NumberClicked { value: u32 },
    /// Color Blast: an option of the current prompt was clicked
    ColorClicked { choice: usize },
    TimerExpired(TimerId),
    /// Start the next player's round
    Ready,
    /// Memory Match: after clearing a level, play the next one (`accept`) or stop
    ContinueLevel { accept: bool },
    AbortRequested,
}

impl InputEvent {
    /// Short name for logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            InputEvent::CellClicked { .. } => "cell click",
            InputEvent::NumberClicked { .. } => "number click",
            InputEvent::ColorClicked { .. } => "color click",
            InputEvent::TimerExpired(_) => "timer",
            InputEvent::Ready => "ready",
            InputEvent::ContinueLevel { .. } => "level choice",
            InputEvent::AbortRequested => "abort",
        }
    }
}

/// Why a round stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundEnd {
    /// Every pair matched / every number clicked / every prompt resolved
    Completed,
    /// Round clock ran out
    TimeUp,
    Aborted,
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GameEvent {
    /// A player's round began
    RoundStarted { player: usize },
    TimerScheduled(Timer),
    TurnChanged { player: usize },

    // Memory Match
    CardRevealed { cell: usize, symbol: String },
    MatchFound {
        player: usize,
        cells: (usize, usize),
        points: u64,
        combo: u64,
    },
    Mismatch { player: usize, cells: (usize, usize) },
    CardsHidden { cells: (usize, usize) },
    /// Board cleared below the top level; waiting for `ContinueLevel`
    LevelCleared { level: u8, next: u8 },

    // Number Rush
    NumberAccepted { value: u32, points: u64, next: u32 },
    WrongNumber { value: u32, expected: u32, penalty: u64 },
    TargetsPlaced { positions: Vec<(u32, Vec2)> },

    // Color Blast
    PromptShown {
        round: u32,
        word: String,
        ink: String,
        choices: Vec<String>,
    },
    ColorHit { points: u64, latency: f32 },
    ColorMiss { chosen: String, target: String },
    PromptTimedOut { round: u32 },
    /// The player reached the level's target of correct answers
    TargetReached { player: usize, correct: u32 },

    /// Bonus points added at the end of a round
    BonusAwarded { player: usize, points: u64 },
    RoundEnded { player: usize, reason: RoundEnd },
    /// The input had no effect in the current state
    InputIgnored { reason: &'static str },
    /// Final scores, in player order
    SessionFinished { scores: Vec<(String, u64)> },
    /// Final scores could not be written; they are kept in memory
    ScoresNotSaved { error: String },
}
