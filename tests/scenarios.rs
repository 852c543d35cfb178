//! End-to-end turns through `step`, built from ASCII levels.

use heist::config::RulesConfig;
use heist::domain::ai::GuardSpeech;
use heist::domain::entity::{GuardMode, PlayerAction};
use heist::domain::grid::Pos;
use heist::domain::pathing::{self, Ctx};
use heist::sim::event::GameEvent;
use heist::sim::level::parse_level;
use heist::sim::step::step;
use heist::sim::world::WorldState;

/// Guard at (5,5) facing north, torch at (7,7), player at (4,7).
const CORRIDOR: &str = "\
# Corridor
###########
#.........#
#.........#
#...P..T..#
#.........#
#....G....#
#.........#
#.........#
#.........#
#.........#
###########
";

/// Open dark room; the player is sealed in a closet at (9,3).
const CLOISTER: &str = "\
# Cloister
@patrol 0 2,2 4,2 4,4 2,4
###########
#.......###
#.......###
#.......#P#
#.G.....###
#.......###
###########
";

/// Player at (9,5) beside a creaky board at (10,5).
/// Guards in reading order: 0 (13,9), 1 (10,7), 2 (16,5), 3 (3,4).
const HALL_OF_ECHOES: &str = "\
# Hall of Echoes
######################
#............G.......#
#....................#
#.........G..........#
#....................#
#........P;.....G....#
#..G.................#
#....................#
#....................#
#....................#
######################
";

const CROSSING: &str = "\
# Crossing
@patrol 0 3,4 3,2
@patrol 1 4,3 2,3
###########
#.......###
#.......###
#..G....###
#...G...#P#
#.......###
#.......###
###########
";

fn world(text: &str) -> WorldState {
    WorldState::from_level(parse_level(text).unwrap(), RulesConfig::default(), 3).unwrap()
}

fn wait(w: &mut WorldState, turns: usize) -> Vec<Vec<GameEvent>> {
    (0..turns).map(|_| step(w, PlayerAction::Wait).unwrap()).collect()
}

#[test]
fn guard_spots_player_in_lit_corridor_and_closes_in() {
    let mut w = world(CORRIDOR);
    assert_eq!(w.guards[0].pos, Pos::new(5, 5));
    assert_eq!(w.guards[0].dir, Pos::NORTH);

    let ctx = Ctx::new(&w.grid, &w.items);
    assert_eq!(pathing::step_toward(&ctx, Pos::new(5, 5), Pos::new(5, 7)).unwrap(), Some(Pos::new(5, 6)));

    let events = step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
    assert_eq!(w.player.pos, Pos::new(5, 7));
    assert!(w.grid.cell(Pos::new(5, 7)).unwrap().lit);
    assert_eq!(w.guards[0].mode, GuardMode::ChaseVisibleTarget { target: Pos::new(5, 7) });
    assert_eq!(w.guards[0].pos, Pos::new(5, 6));
    assert!(events.contains(&GameEvent::GuardSpoke { guard: 0, speech: GuardSpeech::Spotted }));
    assert_eq!(w.stats.spottings, 1);
}

#[test]
fn adjacent_chaser_strikes_instead_of_moving() {
    let mut w = world(CORRIDOR);
    step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
    let events = step(&mut w, PlayerAction::Wait).unwrap();
    assert!(events.contains(&GameEvent::PlayerHit { by: 0 }));
    assert_eq!(w.guards[0].pos, Pos::new(5, 6));
    assert_eq!(w.player.health, w.player.max_health - 1);
    // still in sight: no second spotting
    assert_eq!(w.stats.spottings, 1);
}

#[test]
fn patrol_cycles_through_waypoints() {
    let mut w = world(CLOISTER);
    let lap = [
        Pos::new(3, 2),
        Pos::new(4, 2),
        Pos::new(4, 3),
        Pos::new(4, 4),
        Pos::new(3, 4),
        Pos::new(2, 4),
        Pos::new(2, 3),
        Pos::new(2, 2),
    ];
    for round in 0..3 {
        for (i, expected) in lap.iter().enumerate() {
            step(&mut w, PlayerAction::Wait).unwrap();
            assert_eq!(w.guards[0].pos, *expected, "round {round}, turn {}", i + 1);
        }
    }
    assert_eq!(w.guards[0].mode, GuardMode::Patrol);
    assert_eq!(w.stats.spottings, 0);
}

#[test]
fn dark_target_two_cells_ahead_is_seen() {
    // unlit torch: the whole room is dark
    let mut w = world(&CORRIDOR.replace('T', "u"));
    w.guards[0].dir = Pos::EAST;

    // behind the guard, 2 cells away: unseen
    w.player.pos = Pos::new(3, 6);
    step(&mut w, PlayerAction::Step(Pos::SOUTH)).unwrap();
    assert_eq!(w.player.pos, Pos::new(3, 5));
    assert!(!w.grid.cell(Pos::new(3, 5)).unwrap().lit);
    assert_eq!(w.guards[0].mode, GuardMode::Patrol);

    // exactly 2 ahead: seen despite the dark
    w.player.pos = Pos::new(7, 6);
    step(&mut w, PlayerAction::Step(Pos::SOUTH)).unwrap();
    assert_eq!(w.player.pos, Pos::new(7, 5));
    assert_eq!(w.guards[0].mode, GuardMode::ChaseVisibleTarget { target: Pos::new(7, 5) });
}

#[test]
fn creak_reaches_guards_in_radius_and_marks_one_closest() {
    let mut w = world(HALL_OF_ECHOES);
    let events = step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
    let origin = Pos::new(10, 5);
    assert_eq!(w.player.pos, origin);
    assert!(events.contains(&GameEvent::CreakRevealed { pos: origin }));
    assert!(events.contains(&GameEvent::Noise { kind: heist::domain::entity::NoiseKind::Creak, origin }));

    let heard: Vec<bool> = w.guards.iter().map(|g| g.heard_thief).collect();
    let closest: Vec<bool> = w.guards.iter().map(|g| g.heard_thief_closest).collect();
    assert_eq!(heard, vec![true, true, false, false]);
    assert_eq!(closest, vec![false, true, false, false]);

    // nearest hearer walks over, the other one listens
    assert_eq!(w.guards[1].mode, GuardMode::MoveToLastSound { target: origin, timeout: 10 });
    assert_eq!(w.guards[1].pos, Pos::new(10, 6));
    assert_eq!(w.guards[0].mode, GuardMode::Listen { toward: origin, timeout: 4 });
    assert_eq!(w.guards[2].mode, GuardMode::Patrol);
}

#[test]
fn waking_guard_with_player_in_view_goes_straight_to_chase() {
    let mut w = world(CORRIDOR);
    w.guards[0].mode = GuardMode::Unconscious { timeout: 1 };
    let events = step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
    assert!(w.guards[0].angry);
    assert_eq!(w.guards[0].mode, GuardMode::ChaseVisibleTarget { target: Pos::new(5, 7) });
    assert!(events.contains(&GameEvent::GuardSpoke { guard: 0, speech: GuardSpeech::Spotted }));

    let mut w = world(CLOISTER);
    w.guards[0].mode = GuardMode::Unconscious { timeout: 1 };
    step(&mut w, PlayerAction::Wait).unwrap();
    assert_eq!(w.guards[0].mode, GuardMode::Patrol);
    assert!(w.guards[0].angry);
}

#[test]
fn investigation_times_out_and_patrol_resumes_where_it_left_off() {
    let mut w = world(CLOISTER);
    let target = Pos::new(3, 3);
    w.guards[0].patrol_index = 2;
    w.guards[0].mode = GuardMode::Investigate { target, timeout: 5 };

    let turns = wait(&mut w, 5);
    assert_eq!(w.guards[0].mode, GuardMode::Patrol);
    assert!(turns[4].contains(&GameEvent::GuardSpoke { guard: 0, speech: GuardSpeech::EndedChase }));
    assert_eq!(w.guards[0].patrol_index, 2);
    // heading for waypoint 2 at (4,4), not back to (2,2)
    assert_eq!(w.guards[0].pos, Pos::new(4, 3));
}

#[test]
fn lower_index_wins_a_contested_cell() {
    let mut w = world(CROSSING);
    assert_eq!(w.guards[0].pos, Pos::new(3, 4));
    assert_eq!(w.guards[1].pos, Pos::new(4, 3));

    step(&mut w, PlayerAction::Wait).unwrap();
    assert_eq!(w.guards[0].pos, Pos::new(3, 3));
    assert_eq!(w.guards[1].pos, Pos::new(4, 3));

    // the cell the winner stood on is off limits this turn, even as it leaves
    step(&mut w, PlayerAction::Wait).unwrap();
    assert_eq!(w.guards[0].pos, Pos::new(3, 2));
    assert_eq!(w.guards[1].pos, Pos::new(4, 3));
}

#[test]
fn alarm_shout_pulls_in_a_distant_colleague_next_turn() {
    let text = "\
# Alarm
@patrol 1 9,1
###########
#.........#
#.........#
#.........#
#...P.....#
#....G....#
#.........#
#........G#
###########
";
    let mut w = world(text);
    // guard 0 at (5,3) faces north; the player steps right in front of it
    step(&mut w, PlayerAction::Step(Pos::EAST)).unwrap();
    assert!(w.guards[0].mode.is_chasing());
    assert_eq!(w.guards[1].mode, GuardMode::Patrol);

    step(&mut w, PlayerAction::Wait).unwrap();
    assert!(w.guards[1].heard_alarm);
    assert!(w.guards[1].angry);
    assert!(matches!(w.guards[1].mode, GuardMode::MoveToLastSound { .. } | GuardMode::ChaseVisibleTarget { .. }));
}
