/// Entities: Player, Guard, and the ephemeral NoiseEvent.
/// Guard behaviour is a tagged union: each mode carries only the data it needs.

use crate::config::NoiseConfig;

use super::grid::Pos;

/// A guard's behavioural state. Exactly one is active at a time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GuardMode {
    Patrol,
    /// Stands still, facing the noise.
    Listen { toward: Pos, timeout: u32 },
    MoveToLastSound { target: Pos, timeout: u32 },
    /// Searching around the last place the thief (or a downed colleague) was.
    Investigate { target: Pos, timeout: u32 },
    /// Lasts exactly as long as the player stays visible.
    ChaseVisibleTarget { target: Pos },
    Unconscious { timeout: u32 },
}

impl GuardMode {
    /// Not aware of or searching for the player.
    pub fn is_relaxed(self) -> bool {
        matches!(self, GuardMode::Patrol | GuardMode::Listen { .. })
    }

    /// Actively pursuing: hiding spots no longer work against this guard.
    pub fn is_pursuit(self) -> bool {
        matches!(
            self,
            GuardMode::ChaseVisibleTarget { .. }
                | GuardMode::Investigate { .. }
                | GuardMode::MoveToLastSound { .. }
        )
    }

    pub fn is_unconscious(self) -> bool {
        matches!(self, GuardMode::Unconscious { .. })
    }

    pub fn is_chasing(self) -> bool {
        matches!(self, GuardMode::ChaseVisibleTarget { .. })
    }

    /// Remaining turns for timed modes.
    pub fn timeout(self) -> Option<u32> {
        match self {
            GuardMode::Listen { timeout, .. }
            | GuardMode::MoveToLastSound { timeout, .. }
            | GuardMode::Investigate { timeout, .. }
            | GuardMode::Unconscious { timeout } => Some(timeout),
            GuardMode::Patrol | GuardMode::ChaseVisibleTarget { .. } => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GuardMode::Patrol => "patrol",
            GuardMode::Listen { .. } => "listen",
            GuardMode::MoveToLastSound { .. } => "move-to-last-sound",
            GuardMode::Investigate { .. } => "investigate",
            GuardMode::ChaseVisibleTarget { .. } => "chase",
            GuardMode::Unconscious { .. } => "unconscious",
        }
    }
}

/// Display state above a guard's head. Derived, never stored.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OverheadIcon {
    Relaxed,
    Angry,
    Listening,
    Searching,
    Alerted,
    Unconscious,
}

#[derive(Clone, Debug)]
pub struct Guard {
    pub id: usize,
    pub pos: Pos,
    /// Unit cardinal facing.
    pub dir: Pos,
    pub mode: GuardMode,
    pub patrol_path: Vec<Pos>,
    /// Index of the waypoint currently being walked to.
    pub patrol_index: usize,
    pub has_purse: bool,
    pub has_vault_key: bool,
    pub has_torch: bool,
    pub angry: bool,
    // Set by this turn's noise broadcast, cleared at the start of each turn.
    pub heard_thief: bool,
    pub heard_thief_closest: bool,
    pub heard_alarm: bool,
    pub last_sound_pos: Option<Pos>,
    pub last_target_pos: Option<Pos>,
}

impl Guard {
    pub fn new(id: usize, pos: Pos, patrol_path: Vec<Pos>) -> Self {
        let dir = patrol_path
            .iter()
            .find(|&&p| p != pos)
            .and_then(|&p| pos.facing_toward(p))
            .unwrap_or(Pos::NORTH);
        Guard {
            id,
            pos,
            dir,
            mode: GuardMode::Patrol,
            patrol_path,
            patrol_index: 0,
            has_purse: false,
            has_vault_key: false,
            has_torch: false,
            angry: false,
            heard_thief: false,
            heard_thief_closest: false,
            heard_alarm: false,
            last_sound_pos: None,
            last_target_pos: None,
        }
    }

    pub fn clear_heard(&mut self) {
        self.heard_thief = false;
        self.heard_thief_closest = false;
        self.heard_alarm = false;
    }

    pub fn overhead_icon(&self) -> OverheadIcon {
        match self.mode {
            GuardMode::Unconscious { .. } => OverheadIcon::Unconscious,
            GuardMode::ChaseVisibleTarget { .. } => OverheadIcon::Alerted,
            GuardMode::Investigate { .. } | GuardMode::MoveToLastSound { .. } => OverheadIcon::Searching,
            GuardMode::Listen { .. } => OverheadIcon::Listening,
            GuardMode::Patrol if self.angry => OverheadIcon::Angry,
            GuardMode::Patrol => OverheadIcon::Relaxed,
        }
    }

    /// Is the thief at `from` outside this guard's forward half-plane?
    pub fn facing_away_from(&self, from: Pos) -> bool {
        self.dir.dot(from - self.pos) <= 0
    }
}

/// Is any guard actively aware of the player?
pub fn any_guard_aware(guards: &[Guard]) -> bool {
    guards.iter().any(|g| !g.mode.is_relaxed() && !g.mode.is_unconscious())
}

#[derive(Clone, Debug)]
pub struct Player {
    pub pos: Pos,
    pub dir: Pos,
    pub health: u32,
    pub max_health: u32,
    pub loot: u32,
    pub has_vault_key: bool,
    /// Made a noise this turn.
    pub noisy: bool,
    /// Interacted with an item this turn.
    pub item_used: bool,
}

impl Player {
    pub fn new(pos: Pos, max_health: u32) -> Self {
        Player {
            pos,
            dir: Pos::NORTH,
            health: max_health,
            max_health,
            loot: 0,
            has_vault_key: false,
            noisy: false,
            item_used: false,
        }
    }
}

/// One turn-triggering player input.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlayerAction {
    Step(Pos),
    Leap(Pos),
    Wait,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NoiseKind {
    Creak,
    Splash,
    DoorBang,
    Thud,
    /// A guard shouting for help.
    Alarm,
}

impl NoiseKind {
    pub fn radius(self, cfg: &NoiseConfig) -> i32 {
        match self {
            NoiseKind::Creak => cfg.creak_radius,
            NoiseKind::Splash => cfg.splash_radius,
            NoiseKind::DoorBang => cfg.door_radius,
            NoiseKind::Thud => cfg.thud_radius,
            NoiseKind::Alarm => cfg.alarm_radius,
        }
    }

    /// Noises made by the thief, as opposed to guard shouts.
    pub fn from_thief(self) -> bool {
        !matches!(self, NoiseKind::Alarm)
    }
}

/// Consumed during the turn it is raised (alarms: the following turn).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NoiseEvent {
    pub origin: Pos,
    pub radius: i32,
    pub kind: NoiseKind,
    pub makes_angry: bool,
    /// Guard that raised it; it does not hear itself.
    pub source_guard: Option<usize>,
}

impl NoiseEvent {
    pub fn new(kind: NoiseKind, origin: Pos, cfg: &NoiseConfig) -> Self {
        NoiseEvent {
            origin,
            radius: kind.radius(cfg),
            kind,
            makes_angry: matches!(kind, NoiseKind::Alarm),
            source_guard: None,
        }
    }

    pub fn shout(guard: &Guard, cfg: &NoiseConfig) -> Self {
        NoiseEvent { source_guard: Some(guard.id), ..NoiseEvent::new(NoiseKind::Alarm, guard.pos, cfg) }
    }
}
