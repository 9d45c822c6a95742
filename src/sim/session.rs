//! One playthrough of one mini-game: Setup -> Active -> Finished
//!
//! The session validates the setup, owns the running engine and turns its
//! final scores into score records. It never touches storage itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::engine::{Engine, EngineSetup, GameEngine};
use super::event::{GameEvent, InputEvent, SessionId, Timer, TimerId};
use crate::consts::{MAX_PLAYERS, MIN_PLAYERS};
use crate::error::{GameError, Result};
use crate::scoreboard::{GameType, ScoreRecord};
use crate::settings::{Difficulty, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Setup,
    Active,
    Finished,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Setup => "setup",
            SessionPhase::Active => "active",
            SessionPhase::Finished => "finished",
        }
    }
}

/// Everything the menu collects before a game starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub game_type: GameType,
    pub players: Vec<String>,
    pub difficulty: u8,
    /// Memory Match symbol theme; the configured default when `None`
    #[serde(default)]
    pub theme: Option<String>,
    /// Fixed seed for reproducible round content
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SessionConfig {
    pub fn new(game_type: GameType, players: Vec<String>, difficulty: u8) -> Self {
        Self {
            game_type,
            players,
            difficulty,
            theme: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameSession {
    id: SessionId,
    game_type: GameType,
    players: Vec<String>,
    difficulty: Option<Difficulty>,
    theme: Option<String>,
    seed: Option<u64>,
    phase: SessionPhase,
    engine: Option<Engine>,
    aborted: bool,
}

impl GameSession {
    pub fn new(id: SessionId, game_type: GameType) -> Self {
        Self {
            id,
            game_type,
            players: Vec::new(),
            difficulty: None,
            theme: None,
            seed: None,
            phase: SessionPhase::Setup,
            engine: None,
            aborted: false,
        }
    }

    /// Validate `config`, then start the game. Nothing is created on error.
    pub fn create(
        id: SessionId,
        config: SessionConfig,
        settings: &Settings,
        now: f32,
    ) -> Result<(Self, Vec<GameEvent>)> {
        let mut session = Self::new(id, config.game_type);
        session.set_players(config.players)?;
        session.set_difficulty(config.difficulty)?;
        if let Some(theme) = config.theme {
            session.set_theme(theme)?;
        }
        if let Some(seed) = config.seed {
            session.set_seed(seed)?;
        }
        let events = session.start(settings, now)?;
        Ok((session, events))
    }

    fn require_setup(&self, action: &'static str) -> Result<()> {
        if self.phase != SessionPhase::Setup {
            return Err(GameError::InvalidState {
                action,
                state: self.phase.as_str(),
            });
        }
        Ok(())
    }

    /// Set 1 to 4 player names. Blank names become "Player N".
    pub fn set_players<S: AsRef<str>>(&mut self, names: impl IntoIterator<Item = S>) -> Result<()> {
        self.require_setup("change players")?;
        let names: Vec<String> = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let name = name.as_ref().trim();
                if name.is_empty() {
                    format!("Player {}", i + 1)
                } else {
                    name.to_string()
                }
            })
            .collect();
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&names.len()) {
            return Err(GameError::validation(format!(
                "{} players requested, expected {MIN_PLAYERS} to {MAX_PLAYERS}",
                names.len()
            )));
        }
        self.players = names;
        Ok(())
    }

    pub fn set_difficulty(&mut self, level: u8) -> Result<()> {
        self.require_setup("change difficulty")?;
        self.difficulty = Some(Difficulty::new(level)?);
        Ok(())
    }

    pub fn set_theme(&mut self, theme: impl Into<String>) -> Result<()> {
        self.require_setup("change theme")?;
        self.theme = Some(theme.into());
        Ok(())
    }

    pub fn set_seed(&mut self, seed: u64) -> Result<()> {
        self.require_setup("change seed")?;
        self.seed = Some(seed);
        Ok(())
    }

    /// Move to Active and generate the round content
    pub fn start(&mut self, settings: &Settings, now: f32) -> Result<Vec<GameEvent>> {
        self.require_setup("start")?;
        if self.players.is_empty() {
            return Err(GameError::validation("no players set"));
        }
        let Some(difficulty) = self.difficulty else {
            return Err(GameError::validation("no difficulty set"));
        };

        let seed = self.seed.unwrap_or_else(rand::random);
        let setup = EngineSetup {
            session: self.id,
            difficulty,
            player_count: self.players.len(),
            theme: self.theme.as_deref(),
            seed,
        };
        let mut engine = Engine::new(self.game_type, settings, &setup)?;

        let mut events = Vec::new();
        engine.start(now, &mut events);
        self.seed = Some(seed);
        self.engine = Some(engine);
        self.phase = SessionPhase::Active;
        log::info!(
            "Session {} started: {} at level {} for {} player(s), seed {seed}",
            self.id,
            self.game_type,
            difficulty,
            self.players.len()
        );
        Ok(events)
    }

    /// Route one input to the engine.
    ///
    /// Timers from another session, or arriving after the session finished,
    /// are silently dropped.
    pub fn apply(&mut self, input: InputEvent, now: f32) -> Result<Vec<GameEvent>> {
        let mut events = Vec::new();
        if let InputEvent::TimerExpired(id) = input {
            if id.session != self.id || self.phase == SessionPhase::Finished {
                log::debug!("Dropping stale timer {id:?} in session {}", self.id);
                return Ok(events);
            }
        }

        let engine = match (self.phase, self.engine.as_mut()) {
            (SessionPhase::Active, Some(engine)) => engine,
            _ => {
                return Err(GameError::InvalidState {
                    action: input.name(),
                    state: self.phase.as_str(),
                });
            }
        };

        engine.apply_input(input, now, &mut events)?;
        if input == InputEvent::AbortRequested {
            self.aborted = true;
        }
        if engine.is_finished() {
            self.finish(&mut events);
        }
        Ok(events)
    }

    /// Abort from outside the input stream (menu closing, app exit)
    pub fn abort(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.phase == SessionPhase::Active {
            if let Some(engine) = self.engine.as_mut() {
                engine.abort(&mut events);
            }
            self.aborted = true;
            self.finish(&mut events);
        }
        events
    }

    fn finish(&mut self, events: &mut Vec<GameEvent>) {
        self.phase = SessionPhase::Finished;
        let scores: Vec<(String, u64)> = self
            .players
            .iter()
            .cloned()
            .zip(self.final_scores())
            .collect();
        log::info!(
            "Session {} finished{}: {:?}",
            self.id,
            if self.aborted { " (aborted)" } else { "" },
            scores
        );
        events.push(GameEvent::SessionFinished { scores });
    }

    /// One record per player, available once the session is Finished
    pub fn score_records(&self, timestamp: DateTime<Utc>) -> Result<Vec<ScoreRecord>> {
        // Records carry the level reached, which may be past the starting one
        let difficulty = match (self.phase, &self.engine, self.difficulty) {
            (SessionPhase::Finished, Some(engine), _) => engine.difficulty(),
            (SessionPhase::Finished, None, Some(d)) => d,
            _ => {
                return Err(GameError::InvalidState {
                    action: "record scores",
                    state: self.phase.as_str(),
                });
            }
        };
        Ok(self
            .players
            .iter()
            .zip(self.final_scores())
            .map(|(name, score)| {
                ScoreRecord::new(name.clone(), self.game_type, score, difficulty, timestamp)
            })
            .collect())
    }

    /// Running score per player, final once Finished
    pub fn final_scores(&self) -> Vec<u64> {
        match &self.engine {
            Some(engine) => engine.final_scores(),
            None => vec![0; self.players.len()],
        }
    }

    pub fn pending_timers(&self) -> &[Timer] {
        match (&self.engine, self.phase) {
            (Some(engine), SessionPhase::Active) => engine.pending_timers(),
            _ => &[],
        }
    }

    /// Earliest pending timer due at or before `now`
    pub fn next_due_timer(&self, now: f32) -> Option<TimerId> {
        self.pending_timers()
            .iter()
            .filter(|t| t.fire_at <= now)
            .min_by(|a, b| a.fire_at.total_cmp(&b.fire_at))
            .map(|t| t.id)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn game_type(&self) -> GameType {
        self.game_type
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn players(&self) -> &[String] {
        &self.players
    }

    pub fn difficulty(&self) -> Option<Difficulty> {
        self.difficulty
    }

    /// Seed in use, once started
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Finished
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted
    }

    pub fn engine(&self) -> Option<&Engine> {
        self.engine.as_ref()
    }
}
