//! Property tests: sight symmetry, sight-to-chase, noise propagation, patrol cycling.

use proptest::prelude::*;

use heist::config::RulesConfig;
use heist::domain::entity::{Guard, GuardMode, NoiseEvent, NoiseKind, PlayerAction};
use heist::domain::grid::{CellGrid, Item, Pos};
use heist::domain::tile::{ItemKind, Terrain};
use heist::domain::visibility::{guards_in_earshot, line_of_sight, sight_cutoff, target_hidden};
use heist::sim::level::{parse_level, Level};
use heist::sim::step::{broadcast_noise, step};
use heist::sim::world::WorldState;

const SIDE: i32 = 8;

fn walled(walls: &[bool]) -> CellGrid {
    let mut g = CellGrid::new(SIDE as usize, SIDE as usize, Terrain::Ground);
    for (i, &wall) in walls.iter().enumerate() {
        if wall {
            let p = Pos::new(i as i32 % SIDE, i as i32 / SIDE);
            g.set_terrain(p, Terrain::Wall).unwrap();
        }
    }
    g
}

fn pos_in(side: i32) -> impl Strategy<Value = Pos> {
    (0..side, 0..side).prop_map(|(x, y)| Pos::new(x, y))
}

/// One guard and the player on a random walled grid, lit by random torches
/// and optionally the guard's own. The guard never moves off its post.
#[derive(Clone, Debug)]
struct Stakeout {
    walls: Vec<bool>,
    torches: Vec<Pos>,
    guard: Pos,
    facing: usize,
    guard_torch: bool,
    searching: bool,
    player: Pos,
    in_bush: bool,
}

fn stakeout() -> impl Strategy<Value = Stakeout> {
    (
        proptest::collection::vec(prop::bool::weighted(0.25), (SIDE * SIDE) as usize),
        proptest::collection::vec(pos_in(SIDE), 0..3),
        pos_in(SIDE),
        0usize..4,
        any::<bool>(),
        any::<bool>(),
        pos_in(SIDE),
        any::<bool>(),
    )
        .prop_filter("guard and player apart", |t| t.2 != t.6)
        .prop_map(|(walls, torches, guard, facing, guard_torch, searching, player, in_bush)| Stakeout {
            walls,
            torches,
            guard,
            facing,
            guard_torch,
            searching,
            player,
            in_bush,
        })
}

fn stakeout_world(s: &Stakeout) -> WorldState {
    let mut grid = walled(&s.walls);
    let mut items = vec![];
    for &t in s.torches.iter().filter(|&&t| t != s.guard && t != s.player) {
        grid.set_terrain(t, Terrain::Ground).unwrap();
        items.push(Item { pos: t, kind: ItemKind::TorchLit });
    }
    grid.set_terrain(s.guard, Terrain::Ground).unwrap();
    grid.set_terrain(s.player, Terrain::Ground).unwrap();
    if s.in_bush {
        items.push(Item { pos: s.player, kind: ItemKind::Bush });
    }

    let mut guard = Guard::new(0, s.guard, vec![s.guard]);
    guard.dir = Pos::CARDINALS[s.facing];
    guard.has_torch = s.guard_torch;
    if s.searching {
        guard.mode = GuardMode::Investigate { target: s.guard, timeout: 5 };
    }

    let level = Level { name: "Stakeout".into(), grid, items, guards: vec![guard], player_spawn: s.player };
    WorldState::from_level(level, RulesConfig::default(), 9).unwrap()
}

/// Open room (x 1..=12, y 1..=13) with the player shut in a closet at (14,7).
fn patrol_level(spawn: Pos, path: &[Pos]) -> String {
    let (w, h) = (16, 15);
    let mut text = String::from("# Loop\n@patrol 0");
    for p in path {
        text.push_str(&format!(" {},{}", p.x, p.y));
    }
    text.push('\n');
    for y in (0..h).rev() {
        for x in 0..w {
            let p = Pos::new(x, y);
            let ch = if p == spawn {
                'G'
            } else if p == Pos::new(14, 7) {
                'P'
            } else if x == 0 || y == 0 || y == h - 1 || x >= 13 {
                '#'
            } else {
                '.'
            };
            text.push(ch);
        }
        text.push('\n');
    }
    text
}

/// Where a guard walking the rectangle's perimeter is after `k` turns.
fn along_perimeter(origin: Pos, w: i32, h: i32, k: i32) -> Pos {
    let mut t = k % (2 * (w + h));
    if t <= w {
        return Pos::new(origin.x + t, origin.y);
    }
    t -= w;
    if t <= h {
        return Pos::new(origin.x + w, origin.y + t);
    }
    t -= h;
    if t <= w {
        return Pos::new(origin.x + w - t, origin.y + h);
    }
    t -= w;
    Pos::new(origin.x, origin.y + h - t)
}

proptest! {
    #[test]
    fn line_of_sight_is_symmetric(
        walls in proptest::collection::vec(prop::bool::weighted(0.3), (SIDE * SIDE) as usize),
        a in pos_in(SIDE),
        b in pos_in(SIDE),
    ) {
        let g = walled(&walls);
        prop_assert_eq!(line_of_sight(&g, a, b).unwrap(), line_of_sight(&g, b, a).unwrap());
    }

    #[test]
    fn adjacent_cells_always_see_each_other(
        walls in proptest::collection::vec(prop::bool::weighted(0.5), (SIDE * SIDE) as usize),
        a in pos_in(SIDE),
        dir in 0usize..4,
    ) {
        let b = a + Pos::CARDINALS[dir];
        prop_assume!(b.x >= 0 && b.y >= 0 && b.x < SIDE && b.y < SIDE);
        prop_assert!(line_of_sight(&walled(&walls), a, b).unwrap());
    }

    #[test]
    fn earshot_is_exactly_the_open_disc_nearest_first(
        spots in proptest::collection::vec(pos_in(20), 0..10),
        origin in pos_in(20),
        radius in 1i32..12,
    ) {
        let guards: Vec<Guard> = spots.iter().enumerate().map(|(i, &p)| Guard::new(i, p, vec![p])).collect();
        let hits = guards_in_earshot(&guards, origin, radius);

        for (i, g) in guards.iter().enumerate() {
            prop_assert_eq!(hits.contains(&i), g.pos.distance_squared(origin) < radius * radius);
        }
        for pair in hits.windows(2) {
            let (d0, d1) = (guards[pair[0]].pos.distance_squared(origin), guards[pair[1]].pos.distance_squared(origin));
            prop_assert!(d0 < d1 || (d0 == d1 && pair[0] < pair[1]));
        }
    }

    #[test]
    fn broadcast_marks_hearers_and_one_closest_conscious_guard(
        spots in proptest::collection::vec((pos_in(20), any::<bool>()), 1..10),
        origin in pos_in(20),
        radius in 1i32..12,
    ) {
        let mut world = WorldState::new(RulesConfig::default());
        world.guards = spots
            .iter()
            .enumerate()
            .map(|(i, &(p, downed))| {
                let mut g = Guard::new(i, p, vec![p]);
                if downed {
                    g.mode = GuardMode::Unconscious { timeout: 5 };
                }
                g
            })
            .collect();
        let noise = NoiseEvent { origin, radius, kind: NoiseKind::Creak, makes_angry: false, source_guard: None };
        let mut events = vec![];
        broadcast_noise(&mut world, &noise, &mut events);

        let r2 = radius * radius;
        for g in &world.guards {
            prop_assert_eq!(g.heard_thief, g.pos.distance_squared(origin) < r2);
            prop_assert!(!g.heard_alarm);
        }

        let closest: Vec<usize> = (0..world.guards.len()).filter(|&i| world.guards[i].heard_thief_closest).collect();
        let expected = (0..world.guards.len())
            .filter(|&i| world.guards[i].heard_thief && !world.guards[i].mode.is_unconscious())
            .min_by_key(|&i| (world.guards[i].pos.distance_squared(origin), i));
        prop_assert_eq!(closest, expected.into_iter().collect::<Vec<_>>());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn guard_chases_exactly_when_sight_holds(s in stakeout()) {
        let mut world = stakeout_world(&s);
        let cfg = world.rules.perception.clone();
        let guard = world.guards[0].clone();
        let offset = s.player - s.guard;

        let lit = world.grid.cell(s.player).unwrap().lit;
        let in_range = offset.length_squared() < sight_cutoff(lit, &cfg) || offset == guard.dir * 2;
        let clear = line_of_sight(&world.grid, s.guard, s.player).unwrap();
        let hidden = target_hidden(&world.grid, &world.items, &guard, s.player).unwrap();
        let expected = in_range && clear && !hidden;

        step(&mut world, PlayerAction::Wait).unwrap();
        let chasing = world.guards[0].mode == GuardMode::ChaseVisibleTarget { target: s.player };
        prop_assert_eq!(chasing, expected, "lit={} in_range={} clear={} hidden={}", lit, in_range, clear, hidden);
        prop_assert_eq!(world.guards[0].mode.is_chasing(), expected);
    }

    #[test]
    fn unseen_patrol_walks_the_loop(
        x0 in 1i32..=6,
        y0 in 1i32..=6,
        w in 1i32..=5,
        h in 1i32..=5,
        turns in 0i32..30,
    ) {
        let origin = Pos::new(x0, y0);
        let path = [origin, Pos::new(x0 + w, y0), Pos::new(x0 + w, y0 + h), Pos::new(x0, y0 + h)];
        let level = parse_level(&patrol_level(origin, &path)).unwrap();
        let mut world = WorldState::from_level(level, RulesConfig::default(), 5).unwrap();

        for _ in 0..turns {
            step(&mut world, PlayerAction::Wait).unwrap();
        }
        prop_assert_eq!(world.guards[0].mode, GuardMode::Patrol);
        prop_assert_eq!(world.guards[0].pos, along_perimeter(origin, w, h, turns));
    }
}
