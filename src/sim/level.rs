/// Level loader.
///
/// ## Sources (priority order):
///   1. `levels/` directory (individual `.txt` files, sorted by file name)
///   2. Built-in embedded levels
///
/// ## Level format (`.txt`):
///   ```text
///   # Level Name
///   @guard 0 purse key torch
///   @patrol 0 3,5 3,7 9,7 9,5
///   <map rows>
///   ```
///
/// The name line is `#` followed by a space; map rows never contain
/// spaces, so a wall row can not be mistaken for a name. The top map row
/// has the highest `y` (north is up on screen). Guards are numbered in
/// reading order. `@patrol` coordinates are `x,y` in that same system; a
/// guard without a patrol line stands on its spawn cell.
///
/// ## Legend:
///   '#' = Wall        '"' = Hedge       '.' = Ground      ',' = Grass
///   '_' = Marble      ':' = Wood        ';' = Creaky wood '~' = Water
///   '+' = Door        '=' = Window      '|' = Portcullis  'X' = Exit
///   '$' = Coin        'b' = Bush        't' = Table
///   'T' = Lit torch   'u' = Unlit torch
///   'P' = Player spawn                  'G' = Guard spawn

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::GameConfig;
use crate::domain::entity::Guard;
use crate::domain::grid::{CellGrid, GridError, Item, Pos};
use crate::domain::pathing::Ctx;
use crate::domain::tile::{ItemKind, Terrain};
use crate::sim::world::{Phase, WorldState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelError {
    #[error("level has no map rows")]
    Empty,
    #[error("line {line}: row is {found} cells wide, expected {expected}")]
    RaggedRow { line: usize, expected: usize, found: usize },
    #[error("line {line}, column {column}: unknown map character {ch:?}")]
    UnknownTile { line: usize, column: usize, ch: char },
    #[error("line {line}: {reason}")]
    BadMetadata { line: usize, reason: String },
    #[error("metadata refers to guard {0}, but the map has no such guard")]
    UnknownGuard(usize),
    #[error("guard {guard} patrols through ({x}, {y}), which is off the map")]
    PatrolOffMap { guard: usize, x: i32, y: i32 },
    #[error("guard {guard} patrols through ({x}, {y}), where no guard can stand")]
    PatrolBlocked { guard: usize, x: i32, y: i32 },
    #[error("level has no player start")]
    NoPlayer,
    #[error("level has {0} player starts, expected one")]
    ManyPlayers(usize),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// A parsed level, ready to install into a `WorldState`.
#[derive(Clone, Debug)]
pub struct Level {
    pub name: String,
    pub grid: CellGrid,
    pub items: Vec<Item>,
    pub guards: Vec<Guard>,
    pub player_spawn: Pos,
}

impl Level {
    pub fn empty() -> Self {
        Level {
            name: String::new(),
            grid: CellGrid::new(0, 0, Terrain::Ground),
            items: vec![],
            guards: vec![],
            player_spawn: Pos::default(),
        }
    }
}

#[derive(Default)]
struct GuardMeta {
    purse: bool,
    key: bool,
    torch: bool,
    patrol: Option<Vec<Pos>>,
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Load a level into the world state. Past the last level the game is complete.
pub fn load_level(world: &mut WorldState, level_idx: usize, config: &GameConfig) -> Result<(), LevelError> {
    let levels = level_texts(config);

    if level_idx >= levels.len() {
        world.phase = Phase::GameComplete;
        return Ok(());
    }

    let level = parse_level(&levels[level_idx])?;
    info!(level = level_idx, name = %level.name, guards = level.guards.len(), "level loaded");

    world.current_level = level_idx;
    world.total_levels = levels.len();
    world.install_level(level, level_seed(config.seed, level_idx))?;
    let name = world.level_name.clone();
    world.set_message(&name, 40);
    Ok(())
}

/// RNG seed for a level. A configured seed is offset by the level index so
/// each level of a seeded run still differs; 0 derives one from the index.
pub fn level_seed(configured: u64, level_idx: usize) -> u64 {
    if configured != 0 {
        configured.wrapping_add(level_idx as u64)
    } else {
        (level_idx as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

/// Names of every level available under `config`, in play order.
pub fn level_names(config: &GameConfig) -> Vec<String> {
    level_texts(config)
        .iter()
        .filter_map(|text| parse_level(text).ok())
        .map(|l| l.name)
        .collect()
}

fn level_texts(config: &GameConfig) -> Vec<String> {
    let from_dir = load_from_directory(&config.levels_dir);
    if from_dir.is_empty() { embedded_levels() } else { from_dir }
}

// ══════════════════════════════════════════════════════════════
// Single-level parsing
// ══════════════════════════════════════════════════════════════

/// Map character → terrain underneath plus the item lying on it.
fn legend(ch: char) -> Option<(Terrain, Option<ItemKind>)> {
    let cell = match ch {
        '#' => (Terrain::Wall, None),
        '"' => (Terrain::Hedge, None),
        '.' | 'P' | 'G' => (Terrain::Ground, None),
        ',' => (Terrain::Grass, None),
        '_' => (Terrain::Marble, None),
        ':' => (Terrain::Wood, None),
        ';' => (Terrain::WoodCreaky, None),
        '~' => (Terrain::Water, None),
        '+' => (Terrain::Door, None),
        '=' => (Terrain::Window, None),
        '|' => (Terrain::Portcullis, None),
        'X' => (Terrain::Exit, None),
        '$' => (Terrain::Ground, Some(ItemKind::Coin)),
        'b' => (Terrain::Grass, Some(ItemKind::Bush)),
        't' => (Terrain::Wood, Some(ItemKind::Table)),
        'T' => (Terrain::Ground, Some(ItemKind::TorchLit)),
        'u' => (Terrain::Ground, Some(ItemKind::TorchUnlit)),
        _ => return None,
    };
    Some(cell)
}

fn bad(line: usize, reason: impl Into<String>) -> LevelError {
    LevelError::BadMetadata { line, reason: reason.into() }
}

fn parse_guard_index(token: Option<&str>, line: usize) -> Result<usize, LevelError> {
    let token = token.ok_or_else(|| bad(line, "missing guard index"))?;
    token.parse::<usize>().map_err(|_| bad(line, format!("bad guard index {token:?}")))
}

fn parse_waypoint(token: &str, line: usize) -> Result<Pos, LevelError> {
    let (x, y) = token.split_once(',').ok_or_else(|| bad(line, format!("bad waypoint {token:?}")))?;
    match (x.trim().parse::<i32>(), y.trim().parse::<i32>()) {
        (Ok(x), Ok(y)) => Ok(Pos::new(x, y)),
        _ => Err(bad(line, format!("bad waypoint {token:?}"))),
    }
}

/// Parse a single level from text content.
pub fn parse_level(content: &str) -> Result<Level, LevelError> {
    let mut name = String::new();
    let mut rows: Vec<(usize, &str)> = vec![];
    let mut meta: BTreeMap<usize, GuardMeta> = BTreeMap::new();

    for (n, raw) in content.lines().enumerate() {
        let line_no = n + 1;
        let line = raw.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("# ") {
            if name.is_empty() {
                name = rest.trim().to_string();
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("@guard") {
            let mut tokens = rest.split_whitespace();
            let idx = parse_guard_index(tokens.next(), line_no)?;
            let entry = meta.entry(idx).or_default();
            for flag in tokens {
                match flag {
                    "purse" => entry.purse = true,
                    "key" => entry.key = true,
                    "torch" => entry.torch = true,
                    other => return Err(bad(line_no, format!("unknown guard flag {other:?}"))),
                }
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("@patrol") {
            let mut tokens = rest.split_whitespace();
            let idx = parse_guard_index(tokens.next(), line_no)?;
            let path = tokens.map(|t| parse_waypoint(t, line_no)).collect::<Result<Vec<_>, _>>()?;
            meta.entry(idx).or_default().patrol = Some(path);
            continue;
        }
        if line.starts_with('@') {
            return Err(bad(line_no, format!("unknown directive {line:?}")));
        }
        rows.push((line_no, line));
    }

    let Some(&(_, first)) = rows.first() else { return Err(LevelError::Empty) };
    let width = first.chars().count();
    let height = rows.len();

    let mut grid = CellGrid::new(width, height, Terrain::Ground);
    let mut items = vec![];
    let mut players = vec![];
    let mut guard_spawns = vec![];

    for (row_idx, &(line_no, row)) in rows.iter().enumerate() {
        let found = row.chars().count();
        if found != width {
            return Err(LevelError::RaggedRow { line: line_no, expected: width, found });
        }
        let y = (height - 1 - row_idx) as i32;
        for (x, ch) in row.chars().enumerate() {
            let pos = Pos::new(x as i32, y);
            let (terrain, item) =
                legend(ch).ok_or(LevelError::UnknownTile { line: line_no, column: x + 1, ch })?;
            grid.set_terrain(pos, terrain)?;
            if let Some(kind) = item {
                items.push(Item { pos, kind });
            }
            match ch {
                'P' => players.push(pos),
                'G' => guard_spawns.push(pos),
                _ => {}
            }
        }
    }

    let player_spawn = match players.as_slice() {
        [] => return Err(LevelError::NoPlayer),
        [p] => *p,
        many => return Err(LevelError::ManyPlayers(many.len())),
    };

    if let Some((&idx, _)) = meta.range(guard_spawns.len()..).next() {
        return Err(LevelError::UnknownGuard(idx));
    }

    let walkable = Ctx::new(&grid, &items);
    let mut guards = Vec::with_capacity(guard_spawns.len());
    for (id, spawn) in guard_spawns.into_iter().enumerate() {
        let m = meta.remove(&id).unwrap_or_default();
        let patrol = m.patrol.unwrap_or_else(|| vec![spawn]);
        if let Some(off) = patrol.iter().find(|p| !grid.contains(**p)) {
            return Err(LevelError::PatrolOffMap { guard: id, x: off.x, y: off.y });
        }
        if let Some(blocked) = patrol.iter().find(|p| !walkable.guard_walkable(**p)) {
            return Err(LevelError::PatrolBlocked { guard: id, x: blocked.x, y: blocked.y });
        }
        let mut guard = Guard::new(id, spawn, patrol);
        guard.has_purse = m.purse;
        guard.has_vault_key = m.key;
        guard.has_torch = m.torch;
        guards.push(guard);
    }

    if name.is_empty() {
        name = "Unnamed Estate".to_string();
    }

    Ok(Level { name, grid, items, guards, player_spawn })
}

// ══════════════════════════════════════════════════════════════
// Directory loading (individual .txt files)
// ══════════════════════════════════════════════════════════════

fn load_from_directory(dir: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return vec![],
    };

    let mut files: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().map_or(false, |e| e == "txt"))
        .collect();
    files.sort();

    let mut results = vec![];
    for path in files {
        match std::fs::read_to_string(&path) {
            Ok(content) => match parse_level(&content) {
                Ok(_) => results.push(content),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping level file"),
            },
            Err(e) => warn!(path = %path.display(), error = %e, "could not read level file"),
        }
    }
    results
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback levels
// ══════════════════════════════════════════════════════════════

fn embedded_levels() -> Vec<String> {
    vec![
        make_embedded(
            "Estate 1 - The Courtyard",
            &[
                "@guard 0 torch",
                "@patrol 0 2,5 13,5 13,8 2,8",
                "@guard 1 purse key",
                "@patrol 1 2,2 8,2 8,1 2,1",
            ],
            &[
                "####################",
                "#P.....,,,,,,,.....#",
                "#......,,b,,,,..T..#",
                "#..T...,,,,,,,.....#",
                "#.....G........t.$.#",
                "#####+######=#######",
                "#:::;:::::#........#",
                "#::::::G::#..~~~.$.#",
                "#::$:::::;+..~~~...#",
                "###############X####",
            ],
        ),
        make_embedded(
            "Estate 2 - The Gallery",
            &[
                "@patrol 0 3,5 3,7 9,7 9,5",
                "@guard 1 torch",
                "@patrol 1 12,4 12,6 14,6 14,4",
                "@guard 2 key purse",
                "@patrol 2 2,1 6,1 6,2 2,2",
            ],
            &[
                "################",
                "#P..._____..u..#",
                "#....__$__.....#",
                "#..G._____..G..#",
                "#....._b_......#",
                "##+#=###########",
                "#......|..$..T.#",
                "#.G....|.......#",
                "##########X#####",
            ],
        ),
        make_embedded(
            "Estate 3 - The Hedge Maze",
            &[
                "@guard 0 torch purse",
                "@patrol 0 12,1 12,6",
                "@patrol 1 1,2 8,2",
            ],
            &[
                "##############",
                "#P,,,\"\",,,b,,#",
                "#,\"\",,\",,\"\",,#",
                "#,\",,b,,,,\",,#",
                "#,\",,\"\"\"\",\",G#",
                "#,,,,,,G,,\"$,#",
                "#,\"\",,,,,,\",,#",
                "#########X####",
            ],
        ),
    ]
}

fn make_embedded(name: &str, meta: &[&str], map: &[&str]) -> String {
    let mut text = format!("# {name}\n");
    for line in meta.iter().chain(map) {
        text.push_str(line);
        text.push('\n');
    }
    text
}
