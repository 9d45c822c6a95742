//! Menu controller
//!
//! Owns the settings, the scoreboard and at most one running session, and
//! commits finished sessions to the scoreboard.

use chrono::Utc;

use crate::error::{GameError, Result};
use crate::scoreboard::{GameType, ScoreRecord, Scoreboard};
use crate::settings::Settings;
use crate::sim::{GameEvent, GameSession, InputEvent, SessionConfig, SessionId};

#[derive(Debug)]
pub struct MenuController {
    settings: Settings,
    scoreboard: Scoreboard,
    session: Option<GameSession>,
    next_id: SessionId,
}

impl MenuController {
    pub fn new(settings: Settings, scoreboard: Scoreboard) -> Self {
        Self {
            settings,
            scoreboard,
            session: None,
            next_id: 1,
        }
    }

    /// Create and start a session. Refused while another one is running.
    pub fn start_game(&mut self, config: SessionConfig, now: f32) -> Result<Vec<GameEvent>> {
        if self.session.as_ref().is_some_and(|s| !s.is_finished()) {
            return Err(GameError::InvalidState {
                action: "start a game",
                state: "active",
            });
        }
        let id = self.next_id;
        let (session, events) = GameSession::create(id, config, &self.settings, now)?;
        self.next_id += 1;
        self.session = Some(session);
        Ok(events)
    }

    /// Route an input to the running session.
    ///
    /// When the session finishes its scores are committed and the session
    /// is released. A failed write does not fail the input: the events are
    /// returned with a trailing `ScoresNotSaved` and the records stay in
    /// memory.
    pub fn handle(&mut self, input: InputEvent, now: f32) -> Result<Vec<GameEvent>> {
        let Some(session) = self.session.as_mut() else {
            if let InputEvent::TimerExpired(id) = input {
                log::debug!("Dropping timer {id:?}, no session running");
                return Ok(Vec::new());
            }
            return Err(GameError::InvalidState {
                action: input.name(),
                state: "in the menu",
            });
        };
        let mut events = session.apply(input, now)?;
        if session.is_finished() {
            self.commit(&mut events);
        }
        Ok(events)
    }

    /// Abort the running session, keeping what was earned
    pub fn abort(&mut self) -> Vec<GameEvent> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let mut events = session.abort();
        self.commit(&mut events);
        events
    }

    fn commit(&mut self, events: &mut Vec<GameEvent>) {
        if let Err(err) = self.save_session() {
            events.push(GameEvent::ScoresNotSaved {
                error: err.to_string(),
            });
        }
    }

    /// Record every score of the released session; the first failure is returned
    fn save_session(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let records = session.score_records(Utc::now())?;
        let mut first_err = None;
        for record in records {
            if let Err(err) = self.scoreboard.record(record) {
                log::error!("Failed to save score: {err}");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// The session being played, if any
    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn leaderboard(&self, game_type: GameType) -> Vec<ScoreRecord> {
        self.scoreboard.leaderboard(game_type)
    }

    pub fn player_rank(&self, game_type: GameType, player_name: &str) -> Option<usize> {
        self.scoreboard.rank_of(game_type, player_name)
    }

    pub fn clear_scores(&mut self, game_type: Option<GameType>) -> Result<()> {
        self.scoreboard.clear(game_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStorage;

    fn menu(storage: &MemoryStorage) -> MenuController {
        let settings = Settings::default();
        let scoreboard = Scoreboard::load(Box::new(storage.clone()), settings.scoreboard.clone());
        MenuController::new(settings, scoreboard)
    }

    fn rush(players: &[&str]) -> SessionConfig {
        SessionConfig {
            seed: Some(5),
            ..SessionConfig::new(
                GameType::Sequencing,
                players.iter().map(|s| s.to_string()).collect(),
                1,
            )
        }
    }

    fn play_rush(menu: &mut MenuController) {
        for value in 1..=15 {
            menu.handle(InputEvent::NumberClicked { value }, 0.0).unwrap();
        }
    }

    #[test]
    fn test_corrupt_store_starts_empty() {
        let storage = MemoryStorage::new();
        storage.put(Scoreboard::STORAGE_KEY, "{ not json");
        let menu = menu(&storage);
        assert!(menu.scoreboard().all().is_empty());
        assert!(menu.leaderboard(GameType::Matching).is_empty());
    }

    #[test]
    fn test_finished_session_is_committed() {
        let storage = MemoryStorage::new();
        let mut menu = menu(&storage);
        menu.start_game(rush(&["Ann"]), 0.0).unwrap();
        play_rush(&mut menu);

        assert!(menu.session().is_none());
        let board = menu.leaderboard(GameType::Sequencing);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].player_name(), "Ann");
        assert_eq!(board[0].score(), 15 * 10 + 300);
        assert_eq!(menu.player_rank(GameType::Sequencing, "Ann"), Some(1));

        // Durable: a fresh load sees it
        let reloaded = Scoreboard::load(Box::new(storage.clone()), Settings::default().scoreboard);
        assert_eq!(reloaded.all(), menu.scoreboard().all());
    }

    #[test]
    fn test_one_session_at_a_time() {
        let storage = MemoryStorage::new();
        let mut menu = menu(&storage);
        menu.start_game(rush(&["Ann"]), 0.0).unwrap();
        assert!(matches!(
            menu.start_game(rush(&["Bo"]), 0.0),
            Err(GameError::InvalidState { .. })
        ));
        let id = menu.session().unwrap().id();

        menu.abort();
        assert!(menu.session().is_none());
        assert_eq!(menu.scoreboard().all().len(), 1);

        menu.start_game(rush(&["Bo"]), 0.0).unwrap();
        assert_eq!(menu.session().unwrap().id(), id + 1);
    }

    #[test]
    fn test_stale_timer_after_session_is_noop() {
        let storage = MemoryStorage::new();
        let mut menu = menu(&storage);
        menu.start_game(rush(&["Ann"]), 0.0).unwrap();
        let timer = menu.session().unwrap().pending_timers()[0].id;
        menu.handle(InputEvent::AbortRequested, 1.0).unwrap();
        assert!(menu.session().is_none());
        assert!(menu
            .handle(InputEvent::TimerExpired(timer), 30.0)
            .unwrap()
            .is_empty());
        assert!(matches!(
            menu.handle(InputEvent::NumberClicked { value: 1 }, 30.0),
            Err(GameError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_write_failure_surfaces_but_keeps_records() {
        let storage = MemoryStorage::new();
        let mut menu = menu(&storage);
        menu.start_game(rush(&["Ann", "Bo"]), 0.0).unwrap();
        storage.set_fail_writes(true);
        let events = menu.abort();
        assert!(matches!(
            events.last(),
            Some(GameEvent::ScoresNotSaved { .. })
        ));
        assert_eq!(menu.scoreboard().all().len(), 2);
        assert!(menu.session().is_none());
        assert!(storage.get(Scoreboard::STORAGE_KEY).is_none());
    }

    #[test]
    fn test_finishing_move_keeps_events_when_save_fails() {
        let storage = MemoryStorage::new();
        let mut menu = menu(&storage);
        menu.start_game(rush(&["Ann"]), 0.0).unwrap();
        for value in 1..15 {
            menu.handle(InputEvent::NumberClicked { value }, 0.0).unwrap();
        }
        storage.set_fail_writes(true);

        let events = menu
            .handle(InputEvent::NumberClicked { value: 15 }, 0.0)
            .unwrap();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::NumberAccepted { value: 15, .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::SessionFinished { scores } if scores[0].1 == 15 * 10 + 300
        )));
        assert!(matches!(
            events.last(),
            Some(GameEvent::ScoresNotSaved { error }) if !error.is_empty()
        ));
        assert!(menu.session().is_none());
        assert_eq!(menu.leaderboard(GameType::Sequencing).len(), 1);
        assert!(storage.get(Scoreboard::STORAGE_KEY).is_none());
    }

    #[test]
    fn test_invalid_setup_creates_nothing() {
        let storage = MemoryStorage::new();
        let mut menu = menu(&storage);
        let mut cfg = rush(&["Ann"]);
        cfg.difficulty = 6;
        assert!(matches!(
            menu.start_game(cfg, 0.0),
            Err(GameError::Validation(_))
        ));
        assert!(menu.session().is_none());
        menu.start_game(rush(&["Ann"]), 0.0).unwrap();
        assert_eq!(menu.session().unwrap().id(), 1);
    }

    #[test]
    fn test_clear_scores() {
        let storage = MemoryStorage::new();
        let mut menu = menu(&storage);
        menu.start_game(rush(&["Ann"]), 0.0).unwrap();
        play_rush(&mut menu);
        menu.clear_scores(Some(GameType::Sequencing)).unwrap();
        assert!(menu.leaderboard(GameType::Sequencing).is_empty());
    }
}
