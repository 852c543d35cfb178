/// Guard move selection: one intended destination per guard per turn,
/// then collision resolution across the whole roster.
///
/// Walkability = what the cell IS (terrain) plus what lies on it (items).
/// Other guards are not obstacles for pathing; they are handled by
/// `resolve_collisions` once every intent is known.
///
/// ## Greedy step
///
/// Distance to the target is the breadth-first path length over
/// guard-walkable cells. If the target cannot be reached the guard falls
/// back to Manhattan distance and only moves when that strictly helps.
/// Ties between equally good neighbours:
///   1. the move along the axis with the larger |delta| to the target
///      (equal deltas favour the horizontal axis);
///   2. fixed order North, East, South, West.

use std::collections::{HashSet, VecDeque};

use tracing::trace;

use super::entity::{Guard, GuardMode};
use super::grid::{CellGrid, GridError, Item, Pos};

/// Terrain + items for walkability queries.
pub struct Ctx<'a> {
    pub grid: &'a CellGrid,
    pub items: &'a [Item],
}

impl<'a> Ctx<'a> {
    pub fn new(grid: &'a CellGrid, items: &'a [Item]) -> Self {
        Ctx { grid, items }
    }

    /// Can a guard stand on `p`? Out of bounds is simply "no".
    pub fn guard_walkable(&self, p: Pos) -> bool {
        match self.grid.terrain(p) {
            Ok(t) if !t.blocks_guard() => !self.items.iter().any(|it| it.pos == p && it.kind.blocks_guard()),
            _ => false,
        }
    }

    fn index(&self, p: Pos) -> usize {
        p.y as usize * self.grid.width() + p.x as usize
    }

    /// Breadth-first distances from `target` over guard-walkable cells.
    /// The target itself is always a root, walkable or not.
    fn distance_field(&self, target: Pos) -> Vec<Option<u32>> {
        let mut dist = vec![None; self.grid.width() * self.grid.height()];
        let mut queue = VecDeque::with_capacity(256);
        dist[self.index(target)] = Some(0);
        queue.push_back((target, 0u32));

        while let Some((p, d)) = queue.pop_front() {
            for dir in Pos::CARDINALS {
                let n = p + dir;
                if !self.guard_walkable(n) {
                    continue;
                }
                let slot = &mut dist[self.index(n)];
                if slot.is_none() {
                    *slot = Some(d + 1);
                    queue.push_back((n, d + 1));
                }
            }
        }
        dist
    }
}

/// Rank of a move for tie-breaking: preferred axis first, then N/E/S/W.
fn tie_rank(dir: Pos, delta: Pos) -> (u8, usize) {
    let horizontal_first = delta.x.abs() >= delta.y.abs();
    let on_preferred_axis = (dir.x != 0) == horizontal_first;
    let order = Pos::CARDINALS.iter().position(|&c| c == dir).unwrap_or(Pos::CARDINALS.len());
    (if on_preferred_axis { 0 } else { 1 }, order)
}

/// Next cell on the way from `from` to `target`, or `None` to stay put.
pub fn step_toward(ctx: &Ctx, from: Pos, target: Pos) -> Result<Option<Pos>, GridError> {
    ctx.grid.cell(from)?;
    ctx.grid.cell(target)?;
    if from == target {
        return Ok(None);
    }

    let delta = target - from;
    let dist = ctx.distance_field(target);
    let candidates = Pos::CARDINALS
        .into_iter()
        .map(|dir| (dir, from + dir))
        .filter(|&(_, n)| n == target || ctx.guard_walkable(n));

    let best = if dist[ctx.index(from)].is_some() {
        candidates
            .filter_map(|(dir, n)| dist[ctx.index(n)].map(|d| (d, tie_rank(dir, delta), n)))
            .min()
            .map(|(_, _, n)| n)
    } else {
        fallback_step(candidates, from, target, delta)
    };
    Ok(best)
}

/// Unreachable target: close Manhattan distance if any neighbour does.
fn fallback_step(
    candidates: impl Iterator<Item = (Pos, Pos)>,
    from: Pos,
    target: Pos,
    delta: Pos,
) -> Option<Pos> {
    let here = from.manhattan(target);
    candidates
        .map(|(dir, n)| (n.manhattan(target), tie_rank(dir, delta), n))
        .filter(|&(m, _, _)| m < here)
        .min()
        .map(|(_, _, n)| n)
}

/// If the guard already stands on its current waypoint, move on to the next.
pub fn advance_patrol(guard: &mut Guard) {
    let len = guard.patrol_path.len();
    if len == 0 {
        return;
    }
    guard.patrol_index %= len;
    if guard.pos == guard.patrol_path[guard.patrol_index] {
        guard.patrol_index = (guard.patrol_index + 1) % len;
    }
}

/// Compute this turn's intended destination. Patrol guards advance their
/// waypoint index here; listening guards turn toward the noise.
pub fn plan_move(ctx: &Ctx, guard: &mut Guard) -> Result<Option<Pos>, GridError> {
    match guard.mode {
        GuardMode::Patrol => {
            advance_patrol(guard);
            match guard.patrol_path.get(guard.patrol_index) {
                Some(&waypoint) => step_toward(ctx, guard.pos, waypoint),
                None => Ok(None),
            }
        }
        GuardMode::ChaseVisibleTarget { target }
        | GuardMode::Investigate { target, .. }
        | GuardMode::MoveToLastSound { target, .. } => step_toward(ctx, guard.pos, target),
        GuardMode::Listen { toward, .. } => {
            if let Some(dir) = guard.pos.facing_toward(toward) {
                guard.dir = dir;
            }
            Ok(None)
        }
        GuardMode::Unconscious { .. } => Ok(None),
    }
}

/// Reject conflicting intents. Guards are processed by ascending index; an
/// intent is dropped when it leaves the grid, lands on a blocked cell, lands
/// on any cell a guard stands on at the start of the turn, or collides with
/// a lower-index claim. Dropped guards stay in place; nobody retries.
pub fn resolve_collisions(ctx: &Ctx, positions: &[Pos], intents: &[Option<Pos>]) -> Vec<Option<Pos>> {
    let mut claimed: HashSet<Pos> = HashSet::new();
    intents
        .iter()
        .enumerate()
        .map(|(i, &dest)| {
            let dest = dest?;
            let occupied = positions.iter().enumerate().any(|(j, &p)| j != i && p == dest);
            if !ctx.guard_walkable(dest) || occupied || !claimed.insert(dest) {
                trace!(guard = i, ?dest, "move rejected");
                return None;
            }
            Some(dest)
        })
        .collect()
}
