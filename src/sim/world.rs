/// WorldState: the complete snapshot of a running level.
///
/// ## Layers
///
///   - `base`  the level as parsed. **Never mutated** after install.
///   - `grid`, `items`, `guards`, `player`  the live state one turn mutates.
///
/// `restart_level` clones the base back over the live state and reseeds the
/// RNG, so a restart replays bit-for-bit under the same action sequence.
///
/// ## Simulation context
///
/// The world owns the only random source (`rng`). Nothing reaches for
/// ambient randomness; every draw happens inside `step`, in guard order.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::RulesConfig;
use crate::domain::entity::{any_guard_aware, Guard, NoiseEvent, Player};
use crate::domain::grid::{CellGrid, GridError, Item, Pos};
use crate::domain::tile::ItemKind;
use crate::domain::visibility;
use crate::sim::level::Level;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Title,
    Playing,
    Escaped,
    Caught,
    GameComplete,
}

/// Per-level tallies for scoring and notifications. Each qualifying event
/// bumps its counter exactly once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub turns: u32,
    pub spottings: u32,
    pub knockouts: u32,
    pub pickpockets: u32,
    pub loot: u32,
    pub damage_taken: u32,
}

#[derive(Clone, Debug)]
pub struct WorldState {
    // ── Level layers ──
    /// Level as installed. Never mutated.
    pub base: Level,
    pub grid: CellGrid,
    pub items: Vec<Item>,

    // ── Entities ──
    pub player: Player,
    pub guards: Vec<Guard>,
    /// Guard shouts raised this turn, heard next turn.
    pub pending_noises: Vec<NoiseEvent>,

    // ── Rules / randomness ──
    pub rules: RulesConfig,
    pub seed: u64,
    pub rng: ChaCha8Rng,

    // ── Meta ──
    pub phase: Phase,
    pub stats: Counters,
    pub current_level: usize,
    pub total_levels: usize,
    pub level_name: String,
    /// Cheat: draw every guard regardless of the player's view.
    pub see_all: bool,

    // ── UI ──
    pub message: String,
    pub message_timer: u32,
}

// ── Construction ──

impl WorldState {
    pub fn new(rules: RulesConfig) -> Self {
        let base = Level::empty();
        WorldState {
            grid: base.grid.clone(),
            items: vec![],
            player: Player::new(Pos::default(), rules.player.max_health),
            guards: vec![],
            base,
            pending_noises: vec![],
            rules,
            seed: 0,
            rng: ChaCha8Rng::seed_from_u64(0),
            phase: Phase::Title,
            stats: Counters::default(),
            current_level: 0,
            total_levels: 0,
            level_name: String::new(),
            see_all: false,
            message: String::new(),
            message_timer: 0,
        }
    }

    /// Build a world already playing `level`. Handy for tests and tools.
    pub fn from_level(level: Level, rules: RulesConfig, seed: u64) -> Result<Self, GridError> {
        let mut world = WorldState::new(rules);
        world.install_level(level, seed)?;
        Ok(world)
    }

    /// Replace the current level and start playing it.
    pub fn install_level(&mut self, level: Level, seed: u64) -> Result<(), GridError> {
        self.level_name = level.name.clone();
        self.base = level;
        self.seed = seed;
        self.restart_level()
    }

    /// Reset live state to the installed level. Preserves `see_all`.
    pub fn restart_level(&mut self) -> Result<(), GridError> {
        self.grid = self.base.grid.clone();
        self.items = self.base.items.clone();
        self.guards = self.base.guards.clone();
        self.player = Player::new(self.base.player_spawn, self.rules.player.max_health);
        self.pending_noises.clear();
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.stats = Counters::default();
        self.phase = Phase::Playing;
        self.refresh_view()
    }

    /// Lighting and the player's view, as the turn orchestrator leaves them.
    pub fn refresh_view(&mut self) -> Result<(), GridError> {
        visibility::recompute_lighting(&mut self.grid, &self.items, &self.guards, &self.rules.perception)?;
        visibility::recompute_player_view(&mut self.grid, self.player.pos, self.rules.perception.player_view_radius)
    }

    pub fn set_message(&mut self, msg: &str, duration: u32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }
}

// ── Queries ──

impl WorldState {
    /// Index of the guard standing on `pos`.
    pub fn guard_at(&self, pos: Pos) -> Option<usize> {
        self.guards.iter().position(|g| g.pos == pos)
    }

    pub fn item_at(&self, pos: Pos) -> Option<usize> {
        self.items.iter().position(|it| it.pos == pos)
    }

    /// Can the player stand on `pos` right now? Guards count as obstacles.
    pub fn player_can_enter(&self, pos: Pos) -> bool {
        let Ok(terrain) = self.grid.terrain(pos) else { return false };
        !terrain.blocks_player(self.player.has_vault_key)
            && !self.items.iter().any(|it| it.pos == pos && it.kind.blocks_player())
            && self.guard_at(pos).is_none()
    }

    /// Should the renderer draw guard `idx`?
    pub fn guard_visible_to_player(&self, idx: usize) -> bool {
        if self.see_all {
            return true;
        }
        self.guards
            .get(idx)
            .and_then(|g| self.grid.cell(g.pos).ok())
            .map_or(false, |c| c.in_view)
    }

    pub fn any_guard_aware(&self) -> bool {
        any_guard_aware(&self.guards)
    }

    pub fn coins_remaining(&self) -> usize {
        self.items.iter().filter(|it| it.kind == ItemKind::Coin).count()
    }

    /// Escaped without a single guard ever spotting the player.
    pub fn ghosted(&self) -> bool {
        self.phase == Phase::Escaped && self.stats.spottings == 0
    }
}
