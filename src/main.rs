//! Mini Games entry point
//!
//! Line-oriented front end: reads commands from stdin, feeds them to the
//! menu controller and prints what happened. Timers are fired from the wall
//! clock before every command.

use std::io::{self, BufRead, Lines, StdinLock, Write};
use std::time::Instant;

use mini_games::persistence::LocalFileStorage;
use mini_games::sim::{CardState, Engine, GameEvent, InputEvent};
use mini_games::{GameType, MenuController, Scoreboard, SessionConfig, Settings};

const HELP: &str = "\
Menu:    play | scores [game] | clear [game] | help | quit
In game: c N (reveal card) | n N (click number) | k N (pick colour)
         ready (next player) | next / stop (after a cleared board)
         show | abort";

struct App {
    menu: MenuController,
    /// Wall-clock origin of the running session
    epoch: Option<Instant>,
}

impl App {
    fn now(&self) -> f32 {
        self.epoch.map(|e| e.elapsed().as_secs_f32()).unwrap_or(0.0)
    }

    fn in_game(&self) -> bool {
        self.menu.session().is_some()
    }

    /// Fire every timer that is due by now
    fn fire_due_timers(&mut self) {
        let now = self.now();
        while let Some(id) = self.menu.session().and_then(|s| s.next_due_timer(now)) {
            if !self.send(InputEvent::TimerExpired(id), now) {
                break;
            }
        }
    }

    /// Apply one input and print the outcome; false on error
    fn send(&mut self, input: InputEvent, now: f32) -> bool {
        match self.menu.handle(input, now) {
            Ok(events) => {
                print_events(&events);
                if !self.in_game() {
                    self.epoch = None;
                }
                true
            }
            Err(err) => {
                println!("! {err}");
                if !self.in_game() {
                    self.epoch = None;
                }
                false
            }
        }
    }

    fn play(&mut self, lines: &mut Lines<StdinLock<'_>>) {
        let Some(game) = ask(lines, "Game (memory / rush / blast): ") else {
            return;
        };
        let Some(game_type) = parse_game(&game) else {
            println!("! unknown game '{game}'");
            return;
        };
        let Some(names) = ask(lines, "Players (comma separated, up to 4): ") else {
            return;
        };
        let players: Vec<String> = names.split(',').map(str::to_string).collect();
        let Some(level) = ask(lines, "Level (1-5): ") else {
            return;
        };
        let Ok(difficulty) = level.trim().parse::<u8>() else {
            println!("! level must be a number");
            return;
        };

        let mut config = SessionConfig::new(game_type, players, difficulty);
        if game_type == GameType::Matching {
            let themes: Vec<&str> = self
                .menu
                .settings()
                .themes
                .iter()
                .map(|t| t.name.as_str())
                .collect();
            let prompt = format!("Theme ({}; blank for default): ", themes.join(", "));
            if let Some(theme) = ask(lines, &prompt) {
                if !theme.trim().is_empty() {
                    config.theme = Some(theme.trim().to_string());
                }
            }
        }

        let epoch = Instant::now();
        match self.menu.start_game(config, 0.0) {
            Ok(events) => {
                self.epoch = Some(epoch);
                print_events(&events);
                self.show();
            }
            Err(err) => println!("! {err}"),
        }
    }

    fn show(&self) {
        let Some(session) = self.menu.session() else {
            return;
        };
        let now = self.now();
        match session.engine() {
            Some(Engine::Matching(game)) => {
                let board = game.board();
                println!(
                    "Player {} to move, {:.0}s left",
                    game.current_player() + 1,
                    game.time_left(now)
                );
                for (row, cards) in board.cards().chunks(board.cols() as usize).enumerate() {
                    let cells: Vec<String> = cards
                        .iter()
                        .enumerate()
                        .map(|(col, card)| {
                            let idx = row * board.cols() as usize + col;
                            match card.state {
                                CardState::Hidden => format!("{idx:>3}"),
                                _ => format!("{:>3}", card.symbol),
                            }
                        })
                        .collect();
                    println!("  {}", cells.join(" "));
                }
            }
            Some(Engine::Sequencing(game)) => {
                println!(
                    "Player {}: next {}, {:.0}s left",
                    game.current_player() + 1,
                    game.expected(),
                    game.time_left(now)
                );
                let mut targets: Vec<_> = game.targets().iter().filter(|t| !t.clicked).collect();
                targets.sort_by(|a, b| a.pos.y.total_cmp(&b.pos.y).then(a.pos.x.total_cmp(&b.pos.x)));
                let row: Vec<String> = targets
                    .iter()
                    .map(|t| format!("{}@({:.0},{:.0})", t.value, t.pos.x, t.pos.y))
                    .collect();
                println!("  {}", row.join(" "));
            }
            Some(Engine::Reaction(game)) => {
                println!(
                    "Player {}: {} of {} needed, {:.0}s left",
                    game.current_player() + 1,
                    game.player(game.current_player()).map_or(0, |p| p.correct),
                    game.target(),
                    game.time_left(now)
                );
                if let Some(prompt) = game.prompt() {
                    print_prompt(
                        game.color_name(prompt.word),
                        game.color_name(prompt.ink),
                        prompt.choices.iter().map(|&c| game.color_name(c)),
                    );
                }
            }
            None => {}
        }
    }

    fn scores(&self, arg: &str) {
        let games: Vec<GameType> = match parse_game(arg) {
            Some(game) => vec![game],
            None => GameType::ALL.to_vec(),
        };
        for game in games {
            println!("== {game} ==");
            let board = self.menu.leaderboard(game);
            if board.is_empty() {
                println!("  (no scores yet)");
            }
            for (rank, record) in board.iter().enumerate() {
                println!(
                    "  {:>2}. {:<16} {:>6}  L{}  {}",
                    rank + 1,
                    record.player_name(),
                    record.score(),
                    record.level(),
                    record.timestamp().format("%Y-%m-%d %H:%M")
                );
            }
        }
    }

    fn clear(&mut self, arg: &str) {
        let game = parse_game(arg);
        if !arg.is_empty() && game.is_none() {
            println!("! unknown game '{arg}'");
            return;
        }
        match self.menu.clear_scores(game) {
            Ok(()) => println!("Scores cleared"),
            Err(err) => println!("! {err}"),
        }
    }

    fn game_command(&mut self, cmd: &str, arg: &str) {
        if cmd == "show" {
            self.show();
            return;
        }
        let input = match parse_input(cmd, arg) {
            Some(Ok(input)) => input,
            Some(Err(msg)) => {
                println!("! {msg}");
                return;
            }
            None => {
                println!("{HELP}");
                return;
            }
        };
        let now = self.now();
        if self.send(input, now) && self.in_game() && matches!(cmd, "ready" | "c" | "next") {
            self.show();
        }
    }
}

/// Map an in-game command to its input; `None` for unknown commands
fn parse_input(cmd: &str, arg: &str) -> Option<Result<InputEvent, String>> {
    let index = |arg: &str| {
        arg.parse::<usize>()
            .map_err(|_| format!("'{cmd}' needs a number"))
    };
    Some(match cmd {
        "ready" => Ok(InputEvent::Ready),
        "next" => Ok(InputEvent::ContinueLevel { accept: true }),
        "stop" => Ok(InputEvent::ContinueLevel { accept: false }),
        "abort" => Ok(InputEvent::AbortRequested),
        "n" => arg
            .parse::<u32>()
            .map(|value| InputEvent::NumberClicked { value })
            .map_err(|_| format!("'n' needs a number up to {}", u32::MAX)),
        "c" => index(arg).map(|cell| InputEvent::CellClicked { cell }),
        "k" => index(arg).map(|choice| InputEvent::ColorClicked { choice }),
        _ => return None,
    })
}

fn parse_game(s: &str) -> Option<GameType> {
    match s.trim() {
        "1" => Some(GameType::Matching),
        "2" => Some(GameType::Sequencing),
        "3" => Some(GameType::Reaction),
        other => other.parse().ok(),
    }
}

fn ask(lines: &mut Lines<StdinLock<'_>>, prompt: &str) -> Option<String> {
    print!("{prompt}");
    let _ = io::stdout().flush();
    match lines.next() {
        Some(Ok(line)) => Some(line),
        Some(Err(err)) => {
            log::warn!("Failed to read input: {err}");
            None
        }
        None => None,
    }
}

fn print_prompt<'a>(word: &str, ink: &str, choices: impl Iterator<Item = &'a str>) {
    let options: Vec<String> = choices
        .enumerate()
        .map(|(i, name)| format!("[{i}] {name}"))
        .collect();
    println!("'{}' written in {}?  {}", word.to_uppercase(), ink, options.join("  "));
}

fn print_events(events: &[GameEvent]) {
    for event in events {
        match event {
            GameEvent::RoundStarted { player } => println!("-- Player {} go! --", player + 1),
            GameEvent::TurnChanged { player } => println!("Player {}'s turn", player + 1),
            GameEvent::CardRevealed { cell, symbol } => println!("Card {cell}: {symbol}"),
            GameEvent::MatchFound { points, combo, .. } => {
                println!("Match! +{points} (x{combo})")
            }
            GameEvent::Mismatch { .. } => println!("No match"),
            GameEvent::CardsHidden { cells } => {
                println!("Cards {} and {} hidden", cells.0, cells.1)
            }
            GameEvent::LevelCleared { level, next } => {
                println!("Level {level} cleared! 'next' for level {next}, 'stop' to finish")
            }
            GameEvent::NumberAccepted { value, points, .. } => println!("{value} +{points}"),
            GameEvent::WrongNumber {
                value,
                expected,
                penalty,
            } => println!("{value} is wrong, looking for {expected} (-{penalty})"),
            GameEvent::TargetsPlaced { positions } => {
                println!("{} numbers placed", positions.len())
            }
            GameEvent::PromptShown {
                round,
                word,
                ink,
                choices,
            } => {
                print!("#{round} ");
                print_prompt(word, ink, choices.iter().map(String::as_str));
            }
            GameEvent::ColorHit { points, latency } => {
                println!("Correct! +{points} ({latency:.2}s)")
            }
            GameEvent::ColorMiss { chosen, target } => {
                println!("{chosen} is wrong, it was {target}")
            }
            GameEvent::PromptTimedOut { round } => println!("#{round} too slow"),
            GameEvent::TargetReached { player, correct } => {
                println!("Player {} reached the target with {correct} correct!", player + 1)
            }
            GameEvent::BonusAwarded { player, points } => {
                println!("Player {} bonus +{points}", player + 1)
            }
            GameEvent::RoundEnded { player, reason } => {
                println!("Round over for player {} ({reason:?})", player + 1)
            }
            GameEvent::InputIgnored { reason } => println!("({reason})"),
            GameEvent::SessionFinished { scores } => {
                println!("== Final scores ==");
                for (name, score) in scores {
                    println!("  {name:<16} {score:>6}");
                }
            }
            GameEvent::ScoresNotSaved { error } => {
                println!("! scores kept for this run only: {error}")
            }
            GameEvent::TimerScheduled(_) => {}
        }
    }
}

fn main() {
    env_logger::init();
    log::info!("Mini Games starting...");

    let storage = LocalFileStorage::default_dir();
    log::info!("Data directory: {}", storage.base_dir().display());
    let settings = Settings::load(&storage);
    let scoreboard = Scoreboard::load(Box::new(storage), settings.scoreboard.clone());
    let mut app = App {
        menu: MenuController::new(settings, scoreboard),
        epoch: None,
    };

    println!("Mini Games: Memory Match, Number Rush, Color Blast");
    println!("{HELP}");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        app.fire_due_timers();
        let prompt = if app.in_game() { "game> " } else { "menu> " };
        let Some(line) = ask(&mut lines, prompt) else {
            break;
        };
        let line = line.trim();
        let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
        let arg = arg.trim();

        if app.in_game() {
            app.game_command(cmd, arg);
            continue;
        }
        match cmd {
            "" => {}
            "play" => app.play(&mut lines),
            "scores" => app.scores(arg),
            "clear" => app.clear(arg),
            "quit" | "exit" => break,
            _ => println!("{HELP}"),
        }
    }

    if app.in_game() {
        print_events(&app.menu.abort());
    }
    log::info!("Mini Games exiting");
}
