/// Gamepad input via gilrs, folded into the same `Command`s the keyboard
/// produces.
///
/// Turn-based: only edges count. A fresh D-pad or stick push is one step;
/// pushing a direction while a leap button is held is one leap.
///
/// Default mapping (overridable in `[gamepad]` of config.toml):
///   D-pad / Left Stick    →  Step
///   A / R1 + direction    →  Leap
///   B                     →  Wait
///   Start                 →  Restart / Continue
///   Select                →  Quit

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use heist::config::GamepadConfig;
use heist::domain::entity::PlayerAction;
use heist::domain::grid::Pos;

use super::input::Command;

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
const STICK_DEADZONE: f32 = 0.5;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,       // South
    B,       // East
    X,       // West
    Y,       // North
    L1,
    R1,
    L2,
    R2,
    Start,
    Select,
}

const BTN_COUNT: usize = 10;

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH"  => Some(Btn::A),
            "B" | "EAST"   => Some(Btn::B),
            "X" | "WEST"   => Some(Btn::X),
            "Y" | "NORTH"  => Some(Btn::Y),
            "L1" | "LB" => Some(Btn::L1),
            "R1" | "RB" => Some(Btn::R1),
            "L2" | "LT" => Some(Btn::L2),
            "R2" | "RT" => Some(Btn::R2),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South => Some(Btn::A),
            Button::East  => Some(Btn::B),
            Button::West  => Some(Btn::X),
            Button::North => Some(Btn::Y),
            Button::LeftTrigger   => Some(Btn::L1),
            Button::RightTrigger  => Some(Btn::R1),
            Button::LeftTrigger2  => Some(Btn::L2),
            Button::RightTrigger2 => Some(Btn::R2),
            Button::Start  => Some(Btn::Start),
            Button::Select => Some(Btn::Select),
            _ => None,
        }
    }
}

/// Which buttons trigger which command.
#[derive(Clone, Debug, PartialEq)]
struct ActionMap {
    leap: Vec<Btn>,
    wait: Vec<Btn>,
    restart: Vec<Btn>,
    quit: Vec<Btn>,
}

impl ActionMap {
    /// Unknown names are dropped; a binding that ends up empty keeps the default.
    fn from_config(cfg: &GamepadConfig) -> Self {
        fn parse(names: &[String], fallback: Vec<Btn>) -> Vec<Btn> {
            let parsed: Vec<Btn> = names.iter().filter_map(|s| Btn::from_name(s)).collect();
            if parsed.is_empty() { fallback } else { parsed }
        }
        ActionMap {
            leap: parse(&cfg.leap, vec![Btn::A, Btn::R1]),
            wait: parse(&cfg.wait, vec![Btn::B]),
            restart: parse(&cfg.restart, vec![Btn::Start]),
            quit: parse(&cfg.quit, vec![Btn::Select]),
        }
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    held: [bool; BTN_COUNT],
    /// Buttons pressed since the last `update()`, in arrival order.
    presses: Vec<Btn>,
    /// Directions pushed since the last `update()`, D-pad or stick.
    pushes: Vec<Pos>,

    stick: (f32, f32),
    stick_dir: Option<Pos>,

    action_map: ActionMap,

    pub connected: bool,
}

impl GamepadState {
    pub fn new(cfg: &GamepadConfig) -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs, connected) = match Gilrs::new() {
            Ok(g) => {
                let has_pad = g.gamepads().next().is_some();
                (Some(g), has_pad)
            }
            Err(e) => {
                tracing::warn!(error = %e, "gamepad support unavailable");
                (None, false)
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs,
            held: [false; BTN_COUNT],
            presses: Vec::new(),
            pushes: Vec::new(),
            stick: (0.0, 0.0),
            stick_dir: None,
            action_map: ActionMap::from_config(cfg),
            connected,
        }
    }

    /// Poll the pad and return the commands it produced this frame.
    pub fn update(&mut self) -> Vec<Command> {
        self.presses.clear();
        self.pushes.clear();

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();

        self.commands()
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let Some(gilrs) = &mut self.gilrs else { return };
        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, true);
                }
                EventType::ButtonReleased(btn, _) => self.set_button(btn, false),
                EventType::AxisChanged(axis, value, _) => {
                    match axis {
                        Axis::LeftStickX => self.stick.0 = value,
                        Axis::LeftStickY => self.stick.1 = value,
                        _ => {}
                    }
                    self.update_stick();
                }
                EventType::Connected => self.connected = true,
                EventType::Disconnected => {
                    self.connected = false;
                    self.held = [false; BTN_COUNT];
                    self.stick = (0.0, 0.0);
                    self.stick_dir = None;
                }
                _ => {}
            }
        }
    }

    #[cfg(feature = "gamepad")]
    fn set_button(&mut self, gilrs_btn: Button, down: bool) {
        let dir = match gilrs_btn {
            Button::DPadUp => Some(Pos::NORTH),
            Button::DPadDown => Some(Pos::SOUTH),
            Button::DPadLeft => Some(Pos::WEST),
            Button::DPadRight => Some(Pos::EAST),
            _ => None,
        };
        if let Some(dir) = dir {
            if down { self.pushes.push(dir); }
            return;
        }
        if let Some(btn) = Btn::from_gilrs(gilrs_btn) {
            self.held[btn as usize] = down;
            if down { self.presses.push(btn); }
        }
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn update_stick(&mut self) {
        let dir = stick_direction(self.stick.0, self.stick.1);
        if dir.is_some() && dir != self.stick_dir {
            self.pushes.extend(dir);
        }
        self.stick_dir = dir;
    }

    fn commands(&self) -> Vec<Command> {
        let map = &self.action_map;
        let leaping = map.leap.iter().any(|&b| self.held[b as usize]);
        let mut out = Vec::new();

        for &dir in &self.pushes {
            let action = if leaping { PlayerAction::Leap(dir) } else { PlayerAction::Step(dir) };
            out.push(Command::Act(action));
        }
        for &btn in &self.presses {
            if map.quit.contains(&btn) {
                out.push(Command::Quit);
            } else if map.restart.contains(&btn) {
                out.push(Command::Restart);
            } else if map.wait.contains(&btn) {
                out.push(Command::Act(PlayerAction::Wait));
            }
        }
        out
    }
}

/// Dominant stick axis past the deadzone. Stick y grows upward, like Pos.
fn stick_direction(x: f32, y: f32) -> Option<Pos> {
    if x.abs() < STICK_DEADZONE && y.abs() < STICK_DEADZONE {
        return None;
    }
    if x.abs() >= y.abs() {
        Some(if x > 0.0 { Pos::EAST } else { Pos::WEST })
    } else {
        Some(if y > 0.0 { Pos::NORTH } else { Pos::SOUTH })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad() -> GamepadState {
        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: None,
            held: [false; BTN_COUNT],
            presses: Vec::new(),
            pushes: Vec::new(),
            stick: (0.0, 0.0),
            stick_dir: None,
            action_map: ActionMap::from_config(&GamepadConfig::default()),
            connected: false,
        }
    }

    #[test]
    fn direction_push_steps_and_leap_held_leaps() {
        let mut p = pad();
        p.pushes.push(Pos::EAST);
        assert_eq!(p.commands(), vec![Command::Act(PlayerAction::Step(Pos::EAST))]);
        p.held[Btn::R1 as usize] = true;
        assert_eq!(p.commands(), vec![Command::Act(PlayerAction::Leap(Pos::EAST))]);
    }

    #[test]
    fn stick_fires_once_per_push() {
        let mut p = pad();
        p.stick = (0.0, 0.9);
        p.update_stick();
        p.stick = (0.1, 1.0);
        p.update_stick();
        assert_eq!(p.pushes, vec![Pos::NORTH]);
        p.stick = (0.0, 0.0);
        p.update_stick();
        p.stick = (-0.8, 0.2);
        p.update_stick();
        assert_eq!(p.pushes, vec![Pos::NORTH, Pos::WEST]);
    }

    #[test]
    fn config_names_parse_and_empty_keeps_default() {
        let cfg = GamepadConfig {
            leap: vec!["lb".into(), "bogus".into()],
            wait: vec![],
            restart: vec!["Start".into()],
            quit: vec!["Back".into()],
        };
        let map = ActionMap::from_config(&cfg);
        assert_eq!(map.leap, vec![Btn::L1]);
        assert_eq!(map.wait, vec![Btn::B]);
        assert_eq!(map.quit, vec![Btn::Select]);
    }

    #[test]
    fn buttons_map_to_commands() {
        let mut p = pad();
        p.presses = vec![Btn::B, Btn::Select];
        assert_eq!(p.commands(), vec![Command::Act(PlayerAction::Wait), Command::Quit]);
    }
}
