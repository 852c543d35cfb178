/// The step function: advances the world by one turn.
///
/// Processing order:
///   1. Turn bookkeeping (clear per-turn flags)
///   2. Player action (move / leap / interact) + noise broadcast
///   3. Lighting
///   4. Perception for every guard, then every transition
///   5. Guard move selection + collision resolution
///   6. Guard strikes on the player
///   7. Player field of view
///   8. Win / lose check
///
/// Perception in stage 4 is computed for the whole roster before any guard
/// transitions, so a guard entering chase never changes what another guard
/// perceived this turn. Noise flags are the exception: they are set on all
/// hearers at once in stage 2.
///
/// The only random draw is the knockout duration jitter in stage 2.

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::domain::ai::{self, GuardSpeech, Perception};
use crate::domain::entity::{GuardMode, NoiseEvent, NoiseKind, PlayerAction};
use crate::domain::grid::{GridError, Pos};
use crate::domain::pathing::{self, Ctx};
use crate::domain::tile::ItemKind;
use crate::domain::visibility;
use super::event::GameEvent;
use super::world::{Phase, WorldState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    #[error("grid query failed: {0}")]
    Grid(#[from] GridError),
    #[error("({dx}, {dy}) is not a single cardinal step")]
    BadDirection { dx: i32, dy: i32 },
}

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, action: PlayerAction) -> Result<Vec<GameEvent>, SimError> {
    if world.phase != Phase::Playing { return Ok(vec![]); }
    validate_action(action)?;

    let mut events: Vec<GameEvent> = Vec::new();
    world.stats.turns += 1;

    if world.message_timer > 0 {
        world.message_timer -= 1;
        if world.message_timer == 0 { world.message.clear(); }
    }

    begin_turn(world);

    let mut noises = std::mem::take(&mut world.pending_noises);
    resolve_player_action(world, action, &mut noises, &mut events)?;
    for noise in &noises {
        broadcast_noise(world, noise, &mut events);
    }

    visibility::recompute_lighting(&mut world.grid, &world.items, &world.guards, &world.rules.perception)?;

    let seen = perceive_all(world)?;
    resolve_transitions(world, &seen, &mut events);

    let strikers = resolve_guard_movement(world)?;
    rouse_downed_guards(world, &mut events);
    resolve_strikes(world, &strikers, &mut events);

    world.refresh_view()?;
    resolve_outcome(world, &mut events)?;

    debug_check_invariants(world);
    Ok(events)
}

fn validate_action(action: PlayerAction) -> Result<(), SimError> {
    match action {
        PlayerAction::Step(d) | PlayerAction::Leap(d) if !Pos::CARDINALS.contains(&d) => {
            Err(SimError::BadDirection { dx: d.x, dy: d.y })
        }
        _ => Ok(()),
    }
}

fn begin_turn(world: &mut WorldState) {
    world.player.noisy = false;
    world.player.item_used = false;
    for g in &mut world.guards {
        g.clear_heard();
    }
}

// ══════════════════════════════════════════════════════════════
// Noise
// ══════════════════════════════════════════════════════════════

/// Flag every guard in earshot of `noise`. The nearest conscious hearer of
/// a thief noise is marked closest; a guard never hears its own shout.
pub fn broadcast_noise(world: &mut WorldState, noise: &NoiseEvent, events: &mut Vec<GameEvent>) {
    let hearers = visibility::guards_in_earshot(&world.guards, noise.origin, noise.radius);
    let mut closest_marked = false;

    for i in hearers {
        if noise.source_guard == Some(i) { continue; }
        let g = &mut world.guards[i];
        if noise.kind.from_thief() {
            g.heard_thief = true;
            if !closest_marked && !g.mode.is_unconscious() {
                g.heard_thief_closest = true;
                closest_marked = true;
            }
        } else {
            g.heard_alarm = true;
        }
        if noise.makes_angry && !g.mode.is_unconscious() {
            g.angry = true;
        }
        g.last_sound_pos = Some(noise.origin);
    }

    debug!(kind = ?noise.kind, origin = ?noise.origin, radius = noise.radius, "noise");
    events.push(GameEvent::Noise { kind: noise.kind, origin: noise.origin });
}

// ══════════════════════════════════════════════════════════════
// Player action
// ══════════════════════════════════════════════════════════════

fn resolve_player_action(
    world: &mut WorldState,
    action: PlayerAction,
    noises: &mut Vec<NoiseEvent>,
    events: &mut Vec<GameEvent>,
) -> Result<(), GridError> {
    match action {
        PlayerAction::Wait => Ok(()),
        PlayerAction::Step(dir) => player_step(world, dir, noises, events),
        PlayerAction::Leap(dir) => player_leap(world, dir, noises, events),
    }
}

fn player_step(
    world: &mut WorldState,
    dir: Pos,
    noises: &mut Vec<NoiseEvent>,
    events: &mut Vec<GameEvent>,
) -> Result<(), GridError> {
    world.player.dir = dir;
    let from = world.player.pos;
    let to = from + dir;

    if !world.grid.contains(to) {
        events.push(GameEvent::PlayerBlocked { at: to });
        return Ok(());
    }

    if let Some(gi) = world.guard_at(to) {
        return step_into_guard(world, gi, noises, events);
    }

    let torch = world.items.iter().position(|it| it.pos == to && it.kind == ItemKind::TorchLit);
    if let Some(idx) = torch {
        world.items[idx].kind = ItemKind::TorchUnlit;
        world.player.item_used = true;
        debug!(pos = ?to, "torch snuffed");
        events.push(GameEvent::TorchSnuffed { pos: to });
        return Ok(());
    }

    if !world.player_can_enter(to) {
        events.push(GameEvent::PlayerBlocked { at: to });
        return Ok(());
    }

    events.push(GameEvent::PlayerMoved { from, to });
    enter_cell(world, to, noises, events)
}

/// Stepping into an occupied cell: swap with the unconscious, rob the
/// unsuspecting, bump into everyone else.
fn step_into_guard(
    world: &mut WorldState,
    gi: usize,
    noises: &mut Vec<NoiseEvent>,
    events: &mut Vec<GameEvent>,
) -> Result<(), GridError> {
    let from = world.player.pos;
    let guard = &world.guards[gi];
    let to = guard.pos;

    if guard.mode.is_unconscious() {
        let guard_fits = Ctx::new(&world.grid, &world.items).guard_walkable(from);
        let player_fits = !world.grid.terrain(to)?.blocks_player(world.player.has_vault_key);
        if guard_fits && player_fits {
            world.guards[gi].pos = from;
            events.push(GameEvent::PlayerSwapped { guard: gi });
            events.push(GameEvent::PlayerMoved { from, to });
            return enter_cell(world, to, noises, events);
        }
    } else if guard.mode.is_relaxed() && guard.facing_away_from(from) && (guard.has_purse || guard.has_vault_key) {
        let (purse, key) = loot_guard(world, gi);
        world.stats.pickpockets += 1;
        world.player.item_used = true;
        debug!(guard = gi, purse, key, "pickpocketed");
        events.push(GameEvent::Pickpocketed { guard: gi, purse, key });
        return Ok(());
    }

    events.push(GameEvent::PlayerBlocked { at: to });
    Ok(())
}

fn player_leap(
    world: &mut WorldState,
    dir: Pos,
    noises: &mut Vec<NoiseEvent>,
    events: &mut Vec<GameEvent>,
) -> Result<(), GridError> {
    world.player.dir = dir;
    let from = world.player.pos;
    let mid = from + dir;

    if !world.grid.contains(mid) {
        events.push(GameEvent::PlayerBlocked { at: mid });
        return Ok(());
    }

    if let Some(gi) = world.guard_at(mid) {
        let mode = world.guards[gi].mode;
        if mode.is_unconscious() || mode.is_pursuit() {
            events.push(GameEvent::PlayerBlocked { at: mid });
        } else {
            knock_out(world, gi, noises, events);
        }
        return Ok(());
    }

    let far = mid + dir;
    let landing = if world.grid.terrain(mid)?.leapable() && world.player_can_enter(far) {
        Some(far)
    } else if world.player_can_enter(mid) {
        Some(mid)
    } else {
        None
    };

    match landing {
        Some(to) => {
            events.push(GameEvent::PlayerLeapt { from, to });
            enter_cell(world, to, noises, events)
        }
        None => {
            events.push(GameEvent::PlayerBlocked { at: mid });
            Ok(())
        }
    }
}

fn knock_out(world: &mut WorldState, gi: usize, noises: &mut Vec<NoiseEvent>, events: &mut Vec<GameEvent>) {
    let timers = &world.rules.timers;
    let jitter = world.rng.gen_range(0..=timers.unconscious_jitter);
    let timeout = (timers.unconscious_turns + jitter).max(1);

    let (purse, key) = loot_guard(world, gi);
    let guard = &mut world.guards[gi];
    guard.mode = GuardMode::Unconscious { timeout };
    guard.clear_heard();
    let origin = guard.pos;

    world.stats.knockouts += 1;
    world.player.noisy = true;
    debug!(guard = gi, timeout, purse, key, "knocked out");
    events.push(GameEvent::GuardKnockedOut { guard: gi, purse, key });
    events.push(GameEvent::GuardSpoke { guard: gi, speech: GuardSpeech::TookDamage });
    noises.push(NoiseEvent::new(NoiseKind::Thud, origin, &world.rules.noise));
}

/// Move purse and key from the guard to the player.
fn loot_guard(world: &mut WorldState, gi: usize) -> (bool, bool) {
    let guard = &mut world.guards[gi];
    let purse = std::mem::take(&mut guard.has_purse);
    let key = std::mem::take(&mut guard.has_vault_key);
    if purse {
        world.player.loot += 1;
        world.stats.loot += 1;
    }
    if key {
        world.player.has_vault_key = true;
    }
    (purse, key)
}

/// Put the player on `to`: pick up coins, make whatever noise the floor makes.
fn enter_cell(
    world: &mut WorldState,
    to: Pos,
    noises: &mut Vec<NoiseEvent>,
    events: &mut Vec<GameEvent>,
) -> Result<(), GridError> {
    world.player.pos = to;

    let before = world.items.len();
    world.items.retain(|it| !(it.pos == to && it.kind == ItemKind::Coin));
    let picked = (before - world.items.len()) as u32;
    if picked > 0 {
        world.player.loot += picked;
        world.stats.loot += picked;
        world.player.item_used = true;
        events.push(GameEvent::CoinPicked { pos: to });
    }

    let terrain = world.grid.terrain(to)?;
    let noise = if terrain.is_creaky() {
        let cell = world.grid.cell_mut(to)?;
        if !cell.identified {
            cell.identified = true;
            events.push(GameEvent::CreakRevealed { pos: to });
        }
        Some(NoiseKind::Creak)
    } else if terrain.is_water() {
        Some(NoiseKind::Splash)
    } else if terrain.is_door() {
        Some(NoiseKind::DoorBang)
    } else {
        None
    };

    if let Some(kind) = noise {
        noises.push(NoiseEvent::new(kind, to, &world.rules.noise));
        world.player.noisy = true;
    }
    Ok(())
}

// ══════════════════════════════════════════════════════════════
// Perception + transitions
// ══════════════════════════════════════════════════════════════

/// What every guard perceives right now. Pure: calling it twice on the same
/// world gives the same answer.
pub fn perceive_all(world: &WorldState) -> Result<Vec<Perception>, GridError> {
    let cfg = &world.rules.perception;
    world
        .guards
        .iter()
        .enumerate()
        .map(|(i, g)| -> Result<Perception, GridError> {
            let sees_player = visibility::guard_sees(&world.grid, &world.items, g, world.player.pos, cfg)?;
            let downed_in_sight = if g.mode.is_relaxed() { nearest_downed(world, i)? } else { None };
            trace!(guard = i, sees_player, ?downed_in_sight, "perception");
            Ok(Perception { sees_player, downed_in_sight })
        })
        .collect()
}

fn nearest_downed(world: &WorldState, observer: usize) -> Result<Option<Pos>, GridError> {
    let me = &world.guards[observer];
    let mut best: Option<(i32, Pos)> = None;
    for (j, other) in world.guards.iter().enumerate() {
        if j == observer || !other.mode.is_unconscious() { continue; }
        if !visibility::guard_sees(&world.grid, &world.items, me, other.pos, &world.rules.perception)? {
            continue;
        }
        let d2 = me.pos.distance_squared(other.pos);
        if best.map_or(true, |(bd, _)| d2 < bd) {
            best = Some((d2, other.pos));
        }
    }
    Ok(best.map(|(_, p)| p))
}

fn resolve_transitions(world: &mut WorldState, seen: &[Perception], events: &mut Vec<GameEvent>) {
    let player = world.player.pos;
    for (i, (guard, perception)) in world.guards.iter_mut().zip(seen).enumerate() {
        let was_chasing = guard.mode.is_chasing();
        if let Some(speech) = ai::transition(guard, perception, player, &world.rules.timers) {
            if speech.is_spotting() {
                world.stats.spottings += 1;
            }
            events.push(GameEvent::GuardSpoke { guard: i, speech });
        }
        if !was_chasing && guard.mode.is_chasing() {
            world.pending_noises.push(NoiseEvent::shout(guard, &world.rules.noise));
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Guard movement
// ══════════════════════════════════════════════════════════════

/// Plan, resolve and apply guard moves. Returns the chasing guards whose
/// step would land on the player: they strike instead of moving.
fn resolve_guard_movement(world: &mut WorldState) -> Result<Vec<usize>, GridError> {
    let player = world.player.pos;
    let ctx = Ctx::new(&world.grid, &world.items);

    // ── Phase 1: Collect intents ──
    let mut intents = Vec::with_capacity(world.guards.len());
    let mut strikers = vec![];
    for (i, guard) in world.guards.iter_mut().enumerate() {
        let intent = pathing::plan_move(&ctx, guard)?;
        if intent == Some(player) {
            if guard.mode.is_chasing() { strikers.push(i); }
            intents.push(None);
        } else {
            intents.push(intent);
        }
    }

    // ── Phase 2: Resolve conflicts ──
    let positions: Vec<Pos> = world.guards.iter().map(|g| g.pos).collect();
    let accepted = pathing::resolve_collisions(&ctx, &positions, &intents);

    // ── Phase 3: Apply moves ──
    for (guard, dest) in world.guards.iter_mut().zip(accepted) {
        if let Some(dest) = dest {
            if let Some(dir) = guard.pos.facing_toward(dest) { guard.dir = dir; }
            guard.pos = dest;
        }
    }

    Ok(strikers)
}

/// An investigating guard next to the colleague it is checking on shakes
/// it awake; it comes round on the following turn.
fn rouse_downed_guards(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    for i in 0..world.guards.len() {
        let GuardMode::Investigate { target, .. } = world.guards[i].mode else { continue };
        if world.guards[i].pos.chebyshev(target) > 1 { continue; }
        let Some(j) = world.guard_at(target) else { continue };
        if j == i { continue; }
        if let GuardMode::Unconscious { timeout } = world.guards[j].mode {
            if timeout > 1 {
                world.guards[j].mode = GuardMode::Unconscious { timeout: 1 };
                debug!(guard = j, by = i, "guard roused");
                events.push(GameEvent::GuardRoused { guard: j, by: i });
            }
        }
    }
}

fn resolve_strikes(world: &mut WorldState, strikers: &[usize], events: &mut Vec<GameEvent>) {
    for &i in strikers {
        if world.player.health == 0 { break; }
        let guard = &mut world.guards[i];
        if let Some(dir) = guard.pos.facing_toward(world.player.pos) { guard.dir = dir; }
        world.player.health -= 1;
        world.stats.damage_taken += 1;
        debug!(guard = i, health = world.player.health, "player hit");
        events.push(GameEvent::PlayerHit { by: i });
    }
}

// ══════════════════════════════════════════════════════════════
// Win / lose
// ══════════════════════════════════════════════════════════════

fn resolve_outcome(world: &mut WorldState, events: &mut Vec<GameEvent>) -> Result<(), GridError> {
    if world.player.health == 0 {
        world.phase = Phase::Caught;
        info!(level = world.current_level, turns = world.stats.turns, "caught");
        events.push(GameEvent::Caught);
    } else if world.grid.terrain(world.player.pos)?.is_exit() {
        world.phase = Phase::Escaped;
        info!(
            level = world.current_level,
            turns = world.stats.turns,
            spottings = world.stats.spottings,
            loot = world.stats.loot,
            ghosted = world.ghosted(),
            "escaped"
        );
        events.push(GameEvent::Escaped);
    }
    Ok(())
}

fn debug_check_invariants(world: &WorldState) {
    if !cfg!(debug_assertions) { return; }
    let ctx = Ctx::new(&world.grid, &world.items);
    for (i, a) in world.guards.iter().enumerate() {
        debug_assert!(ctx.guard_walkable(a.pos), "guard {i} ended the turn on blocked cell {:?}", a.pos);
        debug_assert_ne!(a.pos, world.player.pos, "guard {i} shares the player's cell");
        for b in &world.guards[i + 1..] {
            debug_assert_ne!(a.pos, b.pos, "guards {} and {} share a cell", a.id, b.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::sim::level::parse_level;

    fn world(text: &str) -> WorldState {
        WorldState::from_level(parse_level(text).unwrap(), RulesConfig::default(), 1).unwrap()
    }

    const POCKET: &str = "\
# Pocket
@guard 0 purse key
.....
.PG..
.....
";

    // ── Contact ──

    #[test]
    fn stepping_into_guard_from_behind_pickpockets() {
        let mut w = world(POCKET);
        let events = step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
        assert!(events.contains(&GameEvent::Pickpocketed { guard: 0, purse: true, key: true }));
        assert_eq!(w.player.pos, Pos::new(1, 1));
        assert_eq!(w.player.loot, 1);
        assert!(w.player.has_vault_key);
        assert!(!w.guards[0].has_purse && !w.guards[0].has_vault_key);
        assert_eq!(w.stats.pickpockets, 1);
    }

    #[test]
    fn guard_facing_the_thief_cannot_be_pickpocketed() {
        let mut w = world(POCKET);
        w.guards[0].dir = Pos::WEST;
        let events = step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
        assert!(events.contains(&GameEvent::PlayerBlocked { at: Pos::new(2, 1) }));
        assert_eq!(w.player.loot, 0);
    }

    #[test]
    fn leap_knocks_out_unaware_guard_and_loots_it() {
        let mut w = world(POCKET);
        let events = step(&mut w, PlayerAction::Leap(Pos::EAST)).unwrap();
        assert!(events.contains(&GameEvent::GuardKnockedOut { guard: 0, purse: true, key: true }));
        assert!(events.contains(&GameEvent::Noise { kind: NoiseKind::Thud, origin: Pos::new(2, 1) }));
        // Knockout duration is 30..=40, then one turn already ticked off
        match w.guards[0].mode {
            GuardMode::Unconscious { timeout } => assert!((29..=39).contains(&timeout), "{timeout}"),
            other => panic!("expected unconscious, got {other:?}"),
        }
        assert_eq!(w.player.pos, Pos::new(1, 1));
        assert_eq!(w.stats.knockouts, 1);
        assert_eq!(w.player.loot, 1);
    }

    #[test]
    fn leap_at_chasing_guard_is_blocked_and_punished() {
        let mut w = world(POCKET);
        w.guards[0].mode = GuardMode::ChaseVisibleTarget { target: Pos::new(1, 1) };
        let events = step(&mut w, PlayerAction::Leap(Pos::EAST)).unwrap();
        assert!(events.contains(&GameEvent::PlayerBlocked { at: Pos::new(2, 1) }));
        assert!(events.contains(&GameEvent::PlayerHit { by: 0 }));
        assert_eq!(w.player.health, 2);
        assert_eq!(w.guards[0].pos, Pos::new(2, 1));
    }

    #[test]
    fn stepping_into_unconscious_guard_swaps_places() {
        let mut w = world("# Swap\nPG.\n");
        w.guards[0].mode = GuardMode::Unconscious { timeout: 10 };
        let events = step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
        assert!(events.contains(&GameEvent::PlayerSwapped { guard: 0 }));
        assert_eq!(w.player.pos, Pos::new(1, 0));
        assert_eq!(w.guards[0].pos, Pos::new(0, 0));
        assert_eq!(w.guards[0].mode, GuardMode::Unconscious { timeout: 9 });
    }

    // ── Terrain and items ──

    #[test]
    fn leap_clears_a_window() {
        let mut w = world("# Window\nP=.\n");
        let events = step(&mut w, PlayerAction::Leap(Pos::EAST)).unwrap();
        assert_eq!(events[0], GameEvent::PlayerLeapt { from: Pos::new(0, 0), to: Pos::new(2, 0) });
        assert_eq!(w.player.pos, Pos::new(2, 0));
    }

    #[test]
    fn leap_falls_short_when_landing_is_blocked() {
        let mut w = world("# Short\nP.#\n");
        step(&mut w, PlayerAction::Leap(Pos::EAST)).unwrap();
        assert_eq!(w.player.pos, Pos::new(1, 0));
    }

    #[test]
    fn windows_cannot_be_walked_through() {
        let mut w = world("# Window\nP=.\n");
        let events = step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
        assert_eq!(events, vec![GameEvent::PlayerBlocked { at: Pos::new(1, 0) }]);
    }

    #[test]
    fn bumping_a_lit_torch_snuffs_it() {
        let mut w = world("# Torch\nPT.\n");
        assert!(w.grid.cell(Pos::new(0, 0)).unwrap().lit);
        let events = step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
        assert!(events.contains(&GameEvent::TorchSnuffed { pos: Pos::new(1, 0) }));
        assert_eq!(w.player.pos, Pos::new(0, 0));
        assert!(w.player.item_used);
        assert!(!w.grid.cell(Pos::new(0, 0)).unwrap().lit);
        // Unlit torch is just an obstacle
        let events = step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
        assert!(events.contains(&GameEvent::PlayerBlocked { at: Pos::new(1, 0) }));
    }

    #[test]
    fn coins_are_collected_on_entry() {
        let mut w = world("# Coin\nP$$\n");
        step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
        step(&mut w, PlayerAction::Leap(Pos::WEST)).unwrap();
        step(&mut w, PlayerAction::Leap(Pos::EAST)).unwrap();
        assert_eq!(w.player.loot, 2);
        assert_eq!(w.coins_remaining(), 0);
    }

    #[test]
    fn portcullis_opens_for_the_vault_key() {
        let mut w = world("# Vault\nP|X\n");
        step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
        assert_eq!(w.player.pos, Pos::new(0, 0));

        w.player.has_vault_key = true;
        step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
        let events = step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
        assert!(events.contains(&GameEvent::Escaped));
        assert_eq!(w.phase, Phase::Escaped);
        assert!(w.ghosted());
    }

    #[test]
    fn creaky_floor_reveals_itself_and_draws_the_closest_guard() {
        let mut w = world("# Creak\nP;....G.\n");
        let events = step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
        assert!(events.contains(&GameEvent::CreakRevealed { pos: Pos::new(1, 0) }));
        assert!(events.contains(&GameEvent::GuardSpoke { guard: 0, speech: GuardSpeech::HeardNoise }));
        assert!(w.grid.cell(Pos::new(1, 0)).unwrap().identified);
        assert!(w.player.noisy);
        assert_eq!(w.guards[0].mode, GuardMode::MoveToLastSound { target: Pos::new(1, 0), timeout: 10 });
        assert_eq!(w.guards[0].pos, Pos::new(5, 0));
    }

    // ── Guards ──

    #[test]
    fn alarm_shout_is_heard_the_following_turn() {
        let mut w = world("# Alarm\n.........\nP.G....G.\n");
        w.guards[0].dir = Pos::WEST;

        step(&mut w, PlayerAction::Wait).unwrap();
        assert!(w.guards[0].mode.is_chasing());
        assert_eq!(w.pending_noises.len(), 1);
        assert_eq!(w.guards[1].mode, GuardMode::Patrol);

        step(&mut w, PlayerAction::Wait).unwrap();
        assert!(w.guards[1].angry);
        assert_eq!(w.guards[1].mode, GuardMode::MoveToLastSound { target: Pos::new(2, 0), timeout: 10 + 6 });
        assert!(w.pending_noises.is_empty());
    }

    #[test]
    fn adjacent_chaser_strikes_until_caught() {
        let mut rules = RulesConfig::default();
        rules.player.max_health = 1;
        let mut w = WorldState::from_level(parse_level("# Caught\nPG\n").unwrap(), rules, 1).unwrap();
        w.guards[0].dir = Pos::WEST;
        let events = step(&mut w, PlayerAction::Wait).unwrap();
        assert!(events.contains(&GameEvent::PlayerHit { by: 0 }));
        assert_eq!(events.last(), Some(&GameEvent::Caught));
        assert_eq!(w.phase, Phase::Caught);
        assert_eq!(w.stats.spottings, 1);
        assert_eq!(w.stats.damage_taken, 1);
    }

    #[test]
    fn relaxed_guard_finds_and_rouses_downed_colleague() {
        let mut w = world("# Downed\nP.....G.G\n");
        w.guards[0].dir = Pos::EAST;
        w.guards[1].mode = GuardMode::Unconscious { timeout: 20 };

        let events = step(&mut w, PlayerAction::Wait).unwrap();
        assert!(events.contains(&GameEvent::GuardSpoke { guard: 0, speech: GuardSpeech::FoundDowned }));
        assert!(events.contains(&GameEvent::GuardRoused { guard: 1, by: 0 }));
        assert_eq!(w.guards[0].pos, Pos::new(7, 0));
        assert!(w.guards[0].angry);

        step(&mut w, PlayerAction::Wait).unwrap();
        assert_eq!(w.guards[1].mode, GuardMode::Patrol);
        assert!(w.guards[1].angry);
        assert_eq!(w.guards[0].pos, Pos::new(7, 0));
    }

    // ── Entry point ──

    #[test]
    fn finished_level_ignores_actions() {
        let mut w = world(POCKET);
        w.phase = Phase::Escaped;
        assert_eq!(step(&mut w, PlayerAction::Wait).unwrap(), vec![]);
        assert_eq!(w.stats.turns, 0);
    }

    #[test]
    fn diagonal_actions_are_rejected() {
        let mut w = world(POCKET);
        assert_eq!(
            step(&mut w, PlayerAction::Step(Pos::new(1, 1))),
            Err(SimError::BadDirection { dx: 1, dy: 1 })
        );
        assert_eq!(w.stats.turns, 0);
    }

    /// Guard 0 faces the player hidden in the bush at (2,1), guard 1 stands
    /// next to the player, guard 2 faces downed guard 3 two cells ahead.
    const WATCH: &str = "\
# Watch
G.bG.G.G
P.......
";

    #[test]
    fn perception_and_transitions_are_idempotent() {
        let mut w = world(WATCH);
        w.player.pos = Pos::new(2, 1);
        w.guards[0].dir = Pos::EAST;
        w.guards[1].dir = Pos::WEST;
        w.guards[2].dir = Pos::EAST;
        w.guards[3].mode = GuardMode::Unconscious { timeout: 20 };

        let seen = perceive_all(&w).unwrap();
        assert_eq!(seen, perceive_all(&w).unwrap());
        assert!(!seen[0].sees_player, "bush hides from a relaxed guard two cells off");
        assert!(seen[1].sees_player);
        assert_eq!(seen[2].downed_in_sight, Some(Pos::new(7, 1)));

        let (mut a, mut b) = (w.clone(), w.clone());
        let (mut ev_a, mut ev_b) = (vec![], vec![]);
        resolve_transitions(&mut a, &seen, &mut ev_a);
        resolve_transitions(&mut b, &perceive_all(&w).unwrap(), &mut ev_b);

        let modes = |w: &WorldState| w.guards.iter().map(|g| g.mode).collect::<Vec<_>>();
        assert_eq!(modes(&a), modes(&b));
        assert_eq!(ev_a, ev_b);
        assert_eq!(a.guards[0].mode, GuardMode::Patrol);
        assert_eq!(a.guards[1].mode, GuardMode::ChaseVisibleTarget { target: Pos::new(2, 1) });
        assert!(matches!(a.guards[2].mode, GuardMode::Investigate { target, .. } if target == Pos::new(7, 1)));
        assert_eq!(a.guards[3].mode, GuardMode::Unconscious { timeout: 19 });
    }
}
