//! Common engine interface and shared helpers

use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::event::{GameEvent, InputEvent, SessionId, Timer, TimerId, TimerKind};
use super::matching::MatchingEngine;
use super::reaction::ReactionEngine;
use super::sequencing::SequencingEngine;
use crate::error::{GameError, Result};
use crate::scoreboard::GameType;
use crate::settings::{Difficulty, Settings};

/// What every mini-game exposes to its session
pub trait GameEngine {
    /// Begin play at session time `now` (seconds)
    fn start(&mut self, now: f32, events: &mut Vec<GameEvent>);

    /// Apply one input. Errors leave the engine untouched.
    fn apply_input(
        &mut self,
        input: InputEvent,
        now: f32,
        events: &mut Vec<GameEvent>,
    ) -> Result<()>;

    /// Stop immediately, cancelling every pending timer
    fn abort(&mut self, events: &mut Vec<GameEvent>);

    fn is_finished(&self) -> bool;

    /// Level being played; Memory Match can move past the starting level
    fn difficulty(&self) -> Difficulty;

    /// Score per player, in player order (final once finished)
    fn final_scores(&self) -> Vec<u64>;

    fn pending_timers(&self) -> &[Timer];
}

/// Pending timers for one engine
#[derive(Debug, Clone)]
pub struct TimerQueue {
    session: SessionId,
    next_seq: u32,
    pending: Vec<Timer>,
}

impl TimerQueue {
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            next_seq: 1,
            pending: Vec::new(),
        }
    }

    /// Schedule a timer and announce it
    pub fn schedule(
        &mut self,
        kind: TimerKind,
        fire_at: f32,
        events: &mut Vec<GameEvent>,
    ) -> TimerId {
        let id = TimerId {
            session: self.session,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        let timer = Timer { id, kind, fire_at };
        self.pending.push(timer);
        events.push(GameEvent::TimerScheduled(timer));
        id
    }

    /// Remove and return a pending timer; `None` if it was cancelled or already fired
    pub fn take(&mut self, id: TimerId) -> Option<Timer> {
        let idx = self.pending.iter().position(|t| t.id == id)?;
        Some(self.pending.remove(idx))
    }

    pub fn cancel(&mut self, id: TimerId) {
        self.pending.retain(|t| t.id != id);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn pending(&self) -> &[Timer] {
        &self.pending
    }
}

/// Points that shrink linearly from `base` to 1 across `window` seconds
pub fn time_weighted_points(base: u64, elapsed: f32, window: f32) -> u64 {
    if window <= 0.0 {
        return 1;
    }
    let remaining = (1.0 - elapsed.max(0.0) / window).clamp(0.0, 1.0);
    ((base as f32 * remaining).ceil() as u64).max(1)
}

pub fn seeded_rng(seed: u64) -> Pcg32 {
    Pcg32::seed_from_u64(seed)
}

/// Parameters shared by all engines when a session starts
#[derive(Debug, Clone)]
pub struct EngineSetup<'a> {
    pub session: SessionId,
    pub difficulty: Difficulty,
    pub player_count: usize,
    pub theme: Option<&'a str>,
    pub seed: u64,
}

/// One engine per game type
#[derive(Debug, Clone)]
pub enum Engine {
    Matching(MatchingEngine),
    Sequencing(SequencingEngine),
    Reaction(ReactionEngine),
}

impl Engine {
    pub fn new(game_type: GameType, settings: &Settings, setup: &EngineSetup<'_>) -> Result<Self> {
        let rng = seeded_rng(setup.seed);
        Ok(match game_type {
            GameType::Matching => {
                let name = setup.theme.unwrap_or(settings.default_theme.as_str());
                let theme = settings
                    .theme(name)
                    .ok_or_else(|| GameError::validation(format!("unknown theme {name}")))?;
                Engine::Matching(MatchingEngine::new(
                    settings.matching.clone(),
                    setup.difficulty,
                    settings.hide_delay,
                    theme.clone(),
                    setup.player_count,
                    setup.session,
                    rng,
                )?)
            }
            GameType::Sequencing => Engine::Sequencing(SequencingEngine::new(
                settings.sequencing_level(setup.difficulty)?.clone(),
                setup.difficulty,
                settings.playfield.clone(),
                setup.player_count,
                setup.session,
                rng,
            )?),
            GameType::Reaction => Engine::Reaction(ReactionEngine::new(
                settings.reaction_level(setup.difficulty)?.clone(),
                setup.difficulty,
                settings.palette.clone(),
                setup.player_count,
                setup.session,
                rng,
            )?),
        })
    }

    pub fn game_type(&self) -> GameType {
        match self {
            Engine::Matching(_) => GameType::Matching,
            Engine::Sequencing(_) => GameType::Sequencing,
            Engine::Reaction(_) => GameType::Reaction,
        }
    }

    pub fn as_matching(&self) -> Option<&MatchingEngine> {
        match self {
            Engine::Matching(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_sequencing(&self) -> Option<&SequencingEngine> {
        match self {
            Engine::Sequencing(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_reaction(&self) -> Option<&ReactionEngine> {
        match self {
            Engine::Reaction(e) => Some(e),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn GameEngine {
        match self {
            Engine::Matching(e) => e,
            Engine::Sequencing(e) => e,
            Engine::Reaction(e) => e,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn GameEngine {
        match self {
            Engine::Matching(e) => e,
            Engine::Sequencing(e) => e,
            Engine::Reaction(e) => e,
        }
    }
}

impl GameEngine for Engine {
    fn start(&mut self, now: f32, events: &mut Vec<GameEvent>) {
        self.inner_mut().start(now, events)
    }

    fn apply_input(
        &mut self,
        input: InputEvent,
        now: f32,
        events: &mut Vec<GameEvent>,
    ) -> Result<()> {
        self.inner_mut().apply_input(input, now, events)
    }

    fn abort(&mut self, events: &mut Vec<GameEvent>) {
        self.inner_mut().abort(events)
    }

    fn is_finished(&self) -> bool {
        self.inner().is_finished()
    }

    fn difficulty(&self) -> Difficulty {
        self.inner().difficulty()
    }

    fn final_scores(&self) -> Vec<u64> {
        self.inner().final_scores()
    }

    fn pending_timers(&self) -> &[Timer] {
        self.inner().pending_timers()
    }
}

/// Error for an input the current game has no use for
pub(crate) fn unsupported(game_type: GameType, input: &InputEvent) -> GameError {
    GameError::validation(format!("{} does not accept a {}", game_type, input.name()))
}

/// Error for input arriving after the engine stopped
pub(crate) fn already_finished(input: &InputEvent) -> GameError {
    GameError::InvalidState {
        action: input.name(),
        state: "finished",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_weighted_points_monotonic() {
        assert_eq!(time_weighted_points(10, 0.0, 30.0), 10);
        assert_eq!(time_weighted_points(10, 15.0, 30.0), 5);
        assert_eq!(time_weighted_points(10, 30.0, 30.0), 1);
        assert_eq!(time_weighted_points(10, 99.0, 30.0), 1);
        let mut last = u64::MAX;
        for step in 0..=60 {
            let points = time_weighted_points(50, step as f32 * 0.5, 30.0);
            assert!(points <= last);
            last = points;
        }
    }

    #[test]
    fn test_timer_queue_take_once() {
        let mut events = Vec::new();
        let mut timers = TimerQueue::new(7);
        let a = timers.schedule(TimerKind::RoundLimit, 30.0, &mut events);
        let b = timers.schedule(TimerKind::HidePair, 1.0, &mut events);
        assert_eq!(events.len(), 2);
        assert_eq!(a.session, 7);
        assert_ne!(a, b);

        timers.cancel(b);
        assert!(timers.take(b).is_none());
        assert_eq!(timers.take(a).map(|t| t.kind), Some(TimerKind::RoundLimit));
        assert!(timers.take(a).is_none());
        assert!(timers.pending().is_empty());
    }

    #[test]
    fn test_engine_rejects_unknown_theme() {
        let settings = Settings::default();
        let setup = EngineSetup {
            session: 1,
            difficulty: Difficulty::new(1).unwrap(),
            player_count: 1,
            theme: Some("Planets"),
            seed: 1,
        };
        assert!(matches!(
            Engine::new(GameType::Matching, &settings, &setup),
            Err(GameError::Validation(_))
        ));
    }
}
