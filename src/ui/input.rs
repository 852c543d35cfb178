/// Keyboard input → turn commands.
///
/// The game is turn-based, so only key presses matter: every Press (or
/// auto-repeat) event becomes at most one `Command`. Releases are ignored.
///
/// Bindings:
///   Arrows / wasd        →  Step
///   Shift+Arrows / WASD  →  Leap
///   '.' / Space          →  Wait
///   r                    →  Restart level
///   v                    →  Toggle see-all
///   Enter                →  Continue (title / level end screens)
///   q / Esc / Ctrl+C     →  Quit

use std::time::Duration;

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use heist::domain::entity::PlayerAction;
use heist::domain::grid::Pos;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Command {
    Act(PlayerAction),
    Restart,
    ToggleSeeAll,
    Continue,
    Quit,
}

pub struct InputState {
    /// Commands decoded during the most recent `drain_events()` call.
    commands: Vec<Command>,
}

impl InputState {
    pub fn new() -> Self {
        InputState { commands: Vec::with_capacity(8) }
    }

    /// Wait up to `timeout` for input, then drain everything pending.
    pub fn drain_events(&mut self, timeout: Duration) {
        self.commands.clear();

        let mut wait = timeout;
        while poll(wait).unwrap_or(false) {
            wait = Duration::ZERO;
            if let Ok(Event::Key(key)) = event::read() {
                if key.kind == KeyEventKind::Release { continue; }
                if let Some(cmd) = command_for(key) {
                    self.commands.push(cmd);
                }
            }
        }
    }

    /// Commands from the last drain, oldest first.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

fn direction_for(code: KeyCode) -> Option<(Pos, bool)> {
    // (direction, implied leap)
    match code {
        KeyCode::Up | KeyCode::Char('w') => Some((Pos::NORTH, false)),
        KeyCode::Down | KeyCode::Char('s') => Some((Pos::SOUTH, false)),
        KeyCode::Left | KeyCode::Char('a') => Some((Pos::WEST, false)),
        KeyCode::Right | KeyCode::Char('d') => Some((Pos::EAST, false)),
        KeyCode::Char('W') => Some((Pos::NORTH, true)),
        KeyCode::Char('S') => Some((Pos::SOUTH, true)),
        KeyCode::Char('A') => Some((Pos::WEST, true)),
        KeyCode::Char('D') => Some((Pos::EAST, true)),
        _ => None,
    }
}

/// Decode one key event.
pub fn command_for(key: KeyEvent) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C')).then_some(Command::Quit);
    }

    if let Some((dir, leap)) = direction_for(key.code) {
        let leap = leap || key.modifiers.contains(KeyModifiers::SHIFT);
        let action = if leap { PlayerAction::Leap(dir) } else { PlayerAction::Step(dir) };
        return Some(Command::Act(action));
    }

    match key.code {
        KeyCode::Char('.') | KeyCode::Char(' ') => Some(Command::Act(PlayerAction::Wait)),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(Command::Restart),
        KeyCode::Char('v') | KeyCode::Char('V') => Some(Command::ToggleSeeAll),
        KeyCode::Enter => Some(Command::Continue),
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}
