/// Grid & visibility primitives: line of sight, sight cutoffs, hiding,
/// earshot, lighting and the player's field of view.
///
/// ## Line of sight
///
/// Supercover traversal between cell centres: every cell the segment
/// passes through is tested, endpoints excluded. When the segment crosses
/// exactly through a cell corner it is blocked only if BOTH cells beside
/// the corner block sight. Endpoints are put in canonical order first, so
/// `line_of_sight(a, b)` and `line_of_sight(b, a)` walk the same cells.
///
/// ## Perception
///
/// ┌──────────────────────────────────────┬───────────┐
/// │ Condition (guard → target)            │ Sees?     │
/// ├──────────────────────────────────────┼───────────┤
/// │ target hidden (see `target_hidden`)   │ NO        │
/// │ d² < cutoff(target cell lit)          │ if LOS    │
/// │ target exactly 2 cells straight ahead │ if LOS    │
/// │ otherwise                             │ NO        │
/// └──────────────────────────────────────┴───────────┘

use tracing::trace;

use crate::config::PerceptionConfig;

use super::entity::Guard;
use super::grid::{CellGrid, GridError, Item, Pos};

/// Is there an unobstructed line between the two cells?
pub fn line_of_sight(grid: &CellGrid, from: Pos, to: Pos) -> Result<bool, GridError> {
    grid.cell(from)?;
    grid.cell(to)?;

    let (a, b) = if from <= to { (from, to) } else { (to, from) };
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let (nx, ny) = (dx.abs(), dy.abs());
    let (sx, sy) = (dx.signum(), dy.signum());

    let mut p = a;
    let (mut ix, mut iy) = (0, 0);
    while ix < nx || iy < ny {
        let decision = (1 + 2 * ix) * ny - (1 + 2 * iy) * nx;
        if decision == 0 {
            // Passing exactly through a corner
            let side_x = Pos::new(p.x + sx, p.y);
            let side_y = Pos::new(p.x, p.y + sy);
            if grid.blocks_sight(side_x)? && grid.blocks_sight(side_y)? {
                return Ok(false);
            }
            p = Pos::new(p.x + sx, p.y + sy);
            ix += 1;
            iy += 1;
        } else if decision < 0 {
            p.x += sx;
            ix += 1;
        } else {
            p.y += sy;
            iy += 1;
        }
        if p == b {
            break;
        }
        if grid.blocks_sight(p)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Squared-distance sight threshold for a target standing in a lit or unlit cell.
/// Darkness never extends the range, whatever the config says.
pub fn sight_cutoff(lit: bool, cfg: &PerceptionConfig) -> i32 {
    if lit { cfg.lit_sight_cutoff } else { cfg.unlit_sight_cutoff.min(cfg.lit_sight_cutoff) }
}

/// Does anything at `pos` hide whoever stands there?
pub fn hides_occupant(grid: &CellGrid, items: &[Item], pos: Pos) -> Result<bool, GridError> {
    if grid.terrain(pos)?.hides_occupant() {
        return Ok(true);
    }
    Ok(items.iter().any(|it| it.pos == pos && it.kind.hides_occupant()))
}

/// A hiding spot works unless the observer is adjacent or actively pursuing.
pub fn target_hidden(grid: &CellGrid, items: &[Item], observer: &Guard, target: Pos) -> Result<bool, GridError> {
    if !hides_occupant(grid, items, target)? {
        return Ok(false);
    }
    Ok(observer.pos.chebyshev(target) > 1 && !observer.mode.is_pursuit())
}

/// Range and line-of-sight test, ignoring hiding.
pub fn in_sight(grid: &CellGrid, observer: &Guard, target: Pos, cfg: &PerceptionConfig) -> Result<bool, GridError> {
    let lit = grid.cell(target)?.lit;
    let offset = target - observer.pos;
    let in_range = offset.length_squared() < sight_cutoff(lit, cfg) || offset == observer.dir * 2;
    if !in_range {
        return Ok(false);
    }
    line_of_sight(grid, observer.pos, target)
}

/// Full perception test: can this guard see someone standing at `target`?
pub fn guard_sees(
    grid: &CellGrid,
    items: &[Item],
    observer: &Guard,
    target: Pos,
    cfg: &PerceptionConfig,
) -> Result<bool, GridError> {
    if target_hidden(grid, items, observer, target)? {
        trace!(guard = observer.id, ?target, "target hidden");
        return Ok(false);
    }
    in_sight(grid, observer, target, cfg)
}

/// Indices of guards with `d² < radius²` from `pos`, nearest first.
/// Equal distances keep roster order, so "closest" is never ambiguous.
pub fn guards_in_earshot(guards: &[Guard], pos: Pos, radius: i32) -> Vec<usize> {
    let r2 = radius * radius;
    let mut hits: Vec<(i32, usize)> = guards
        .iter()
        .enumerate()
        .map(|(i, g)| (g.pos.distance_squared(pos), i))
        .filter(|&(d2, _)| d2 < r2)
        .collect();
    hits.sort();
    hits.into_iter().map(|(_, i)| i).collect()
}

/// Every cell strictly within `radius` of `centre` that `centre` can see.
fn visible_disc(grid: &CellGrid, centre: Pos, radius: i32) -> Result<Vec<Pos>, GridError> {
    let r2 = radius * radius;
    let mut out = Vec::new();
    for y in (centre.y - radius)..=(centre.y + radius) {
        for x in (centre.x - radius)..=(centre.x + radius) {
            let p = Pos::new(x, y);
            if !grid.contains(p) || centre.distance_squared(p) >= r2 {
                continue;
            }
            if line_of_sight(grid, centre, p)? {
                out.push(p);
            }
        }
    }
    Ok(out)
}

/// Recompute the `lit` flag of every cell from lit torches and
/// conscious torch-carrying guards.
pub fn recompute_lighting(
    grid: &mut CellGrid,
    items: &[Item],
    guards: &[Guard],
    cfg: &PerceptionConfig,
) -> Result<(), GridError> {
    let mut sources: Vec<(Pos, i32)> = items
        .iter()
        .filter(|it| it.kind.is_light_source())
        .map(|it| (it.pos, cfg.torch_radius))
        .collect();
    sources.extend(
        guards
            .iter()
            .filter(|g| g.has_torch && !g.mode.is_unconscious())
            .map(|g| (g.pos, cfg.guard_torch_radius)),
    );

    let mut lit = Vec::new();
    for (pos, radius) in sources {
        lit.extend(visible_disc(grid, pos, radius)?);
    }

    for cell in grid.cells_mut() {
        cell.lit = false;
    }
    for p in lit {
        grid.cell_mut(p)?.lit = true;
    }
    Ok(())
}

/// Mark what the player can see this turn (`in_view`) and has ever seen (`seen`).
pub fn recompute_player_view(grid: &mut CellGrid, player: Pos, radius: i32) -> Result<(), GridError> {
    // radius + 1 so the boundary ring (d² == r²) is included
    let visible = visible_disc(grid, player, radius + 1)?;
    for cell in grid.cells_mut() {
        cell.in_view = false;
    }
    for p in visible {
        if player.distance_squared(p) > radius * radius {
            continue;
        }
        let cell = grid.cell_mut(p)?;
        cell.in_view = true;
        cell.seen = true;
    }
    Ok(())
}
