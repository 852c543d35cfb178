/// Presentation layer: double-buffered, diff-based terminal renderer.
///
///   1. Compose the next frame into `front`
///   2. Emit terminal commands only for cells that differ from `back`
///   3. Flush once, then swap the buffers
///
/// Each map cell takes two terminal columns: the occupant glyph and, for
/// guards, the overhead icon. The map is drawn only where the player has
/// looked; cells out of the current view are dimmed, lit cells are warm.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use heist::domain::entity::{Guard, OverheadIcon};
use heist::domain::grid::Pos;
use heist::domain::tile::{ItemKind, Terrain};
use heist::sim::world::{Phase, WorldState};

// ── Glyph: the unit of the frame buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Glyph {
    ch: char,
    fg: Color,
    bg: Color,
}

const BASE_BG: Color = Color::Rgb { r: 18, g: 18, b: 28 };
const LIT_BG: Color = Color::Rgb { r: 58, g: 46, b: 22 };
const MEMORY_FG: Color = Color::Rgb { r: 70, g: 70, b: 90 };
const HUD_BG: Color = Color::Rgb { r: 24, g: 24, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };

impl Glyph {
    const BLANK: Glyph = Glyph { ch: ' ', fg: Color::White, bg: BASE_BG };
    /// Differs from every real glyph; filling `back` with it forces a repaint.
    const INVALID: Glyph = Glyph { ch: '\u{0}', fg: Color::Magenta, bg: Color::Magenta };

    const fn new(ch: char, fg: Color, bg: Color) -> Self {
        Glyph { ch, fg, bg }
    }
}

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Glyph>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Glyph::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Glyph::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Glyph::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, g: Glyph) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = g;
        }
    }

    fn get(&self, x: usize, y: usize) -> Glyph {
        if x < self.width && y < self.height { self.cells[y * self.width + x] } else { Glyph::BLANK }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Glyph::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Glyph::new(' ', Color::White, bg));
        }
    }
}

// ── Camera ──

/// Viewport over the map in screen coordinates (row 0 = north edge).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Camera {
    /// Screen column of the leftmost visible map cell (negative centres a small map).
    pub x: i32,
    pub y: i32,
    pub view_w: usize,
    pub view_h: usize,
}

impl Camera {
    /// Scroll only when the target leaves the inner dead zone. Maps smaller
    /// than the view are centred.
    pub fn follow(&mut self, target_col: i32, target_row: i32, map_w: usize, map_h: usize) {
        if self.view_w == 0 || self.view_h == 0 { return; }
        self.x = follow_axis(self.x, target_col, self.view_w as i32, map_w as i32);
        self.y = follow_axis(self.y, target_row, self.view_h as i32, map_h as i32);
    }
}

fn follow_axis(origin: i32, target: i32, view: i32, map: i32) -> i32 {
    if map <= view {
        return -((view - map) / 2);
    }
    let margin = view / 5;
    let mut origin = origin;
    if target < origin + margin {
        origin = target - margin;
    } else if target > origin + view - margin - 1 {
        origin = target - view + margin + 1;
    }
    origin.clamp(0, map - view)
}

// ── Cell appearance ──

fn terrain_glyph(t: Terrain) -> (char, Color) {
    match t {
        Terrain::Ground => ('.', Color::Rgb { r: 110, g: 100, b: 90 }),
        Terrain::Grass => (',', Color::Rgb { r: 70, g: 150, b: 60 }),
        Terrain::Marble => ('_', Color::Rgb { r: 200, g: 200, b: 210 }),
        Terrain::Wood | Terrain::WoodCreaky => (':', Color::Rgb { r: 150, g: 100, b: 50 }),
        Terrain::Water => ('~', Color::Rgb { r: 70, g: 120, b: 220 }),
        Terrain::Wall => ('#', Color::Rgb { r: 150, g: 150, b: 150 }),
        Terrain::Hedge => ('"', Color::Rgb { r: 40, g: 110, b: 40 }),
        Terrain::Door => ('+', Color::Rgb { r: 170, g: 110, b: 40 }),
        Terrain::Window => ('=', Color::Rgb { r: 130, g: 190, b: 230 }),
        Terrain::Portcullis => ('|', Color::Rgb { r: 160, g: 160, b: 180 }),
        Terrain::Exit => ('X', Color::Rgb { r: 80, g: 255, b: 80 }),
    }
}

fn item_glyph(kind: ItemKind) -> (char, Color) {
    match kind {
        ItemKind::Coin => ('$', Color::Rgb { r: 255, g: 210, b: 40 }),
        ItemKind::Bush => ('*', Color::Rgb { r: 60, g: 170, b: 60 }),
        ItemKind::Table => ('T', Color::Rgb { r: 170, g: 120, b: 70 }),
        ItemKind::TorchLit => ('Y', Color::Rgb { r: 255, g: 150, b: 30 }),
        ItemKind::TorchUnlit => ('y', Color::Rgb { r: 110, g: 90, b: 70 }),
    }
}

fn guard_glyph(g: &Guard) -> [Glyph; 2] {
    let body = match (g.dir.x, g.dir.y) {
        (0, 1) => '^',
        (1, 0) => '>',
        (0, -1) => 'v',
        _ => '<',
    };
    let (icon, icon_fg) = match g.overhead_icon() {
        OverheadIcon::Relaxed => (' ', Color::White),
        OverheadIcon::Angry => ('#', Color::Rgb { r: 255, g: 120, b: 40 }),
        OverheadIcon::Listening => ('?', Color::Rgb { r: 200, g: 200, b: 80 }),
        OverheadIcon::Searching => ('?', Color::Rgb { r: 255, g: 150, b: 40 }),
        OverheadIcon::Alerted => ('!', Color::Rgb { r: 255, g: 60, b: 60 }),
        OverheadIcon::Unconscious => ('z', Color::Rgb { r: 130, g: 130, b: 200 }),
    };
    let body_fg = if g.mode.is_unconscious() {
        Color::Rgb { r: 120, g: 120, b: 160 }
    } else {
        Color::Rgb { r: 230, g: 80, b: 80 }
    };
    [Glyph::new(body, body_fg, BASE_BG), Glyph::new(icon, icon_fg, BASE_BG)]
}

/// The two terminal columns drawn for map cell `pos`.
fn cell_glyphs(w: &WorldState, pos: Pos) -> [Glyph; 2] {
    let Ok(cell) = w.grid.cell(pos) else { return [Glyph::BLANK; 2] };
    if !cell.seen && !w.see_all {
        return [Glyph::BLANK; 2];
    }

    let bg = if cell.in_view && cell.lit { LIT_BG } else { BASE_BG };
    let tint = |g: Glyph| -> Glyph {
        let fg = if cell.in_view || w.see_all { g.fg } else { MEMORY_FG };
        Glyph { fg, bg, ..g }
    };

    if w.player.pos == pos {
        let fg = if w.player.health <= 1 { Color::Rgb { r: 255, g: 90, b: 90 } } else { Color::White };
        return [tint(Glyph::new('@', fg, bg)), Glyph::new(' ', fg, bg)];
    }

    if let Some(idx) = w.guard_at(pos) {
        if w.guard_visible_to_player(idx) {
            return guard_glyph(&w.guards[idx]).map(tint);
        }
    }

    let (ch, fg) = match w.item_at(pos) {
        Some(i) => item_glyph(w.items[i].kind),
        None => terrain_glyph(cell.terrain),
    };
    let creak_marker = if cell.terrain.is_creaky() && cell.identified { ';' } else { ' ' };
    [tint(Glyph::new(ch, fg, bg)), tint(Glyph::new(creak_marker, fg, bg))]
}

// ── Renderer ──

const CELL_W: usize = 2;
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
    camera: Camera,
    /// Shown on the title screen.
    pub level_names: Vec<String>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
            camera: Camera::default(),
            level_names: Vec::new(),
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(BASE_BG),
            Clear(ClearType::All)
        )?;
        self.fit_terminal()?;
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    fn fit_terminal(&mut self) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Glyph::INVALID);
            queue!(self.writer, SetBackgroundColor(BASE_BG), Clear(ClearType::All))?;
        }
        Ok(())
    }

    pub fn render(&mut self, world: &WorldState) -> io::Result<()> {
        self.fit_terminal()?;

        if self.last_phase != Some(world.phase) {
            self.back.cells.fill(Glyph::INVALID);
            queue!(self.writer, SetBackgroundColor(BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(world.phase);
        }

        let map_w = world.grid.width();
        let map_h = world.grid.height();
        let reserved_rows = MAP_ROW + 4; // HUD, gap, message, help
        self.camera.view_w = (self.term_w / CELL_W).min(map_w.max(1));
        self.camera.view_h = self.term_h.saturating_sub(reserved_rows).max(1).min(map_h.max(1));
        let player_row = map_h as i32 - 1 - world.player.pos.y;
        self.camera.follow(world.player.pos.x, player_row, map_w, map_h);

        self.front.clear();
        match world.phase {
            Phase::Title => self.compose_title(),
            Phase::Playing => self.compose_game(world),
            Phase::Escaped | Phase::Caught => {
                self.compose_game(world);
                self.compose_level_end(world);
            }
            Phase::GameComplete => self.compose_game_complete(world),
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let g = self.front.get(x, y);
                if g == self.back.get(x, y) { continue; }

                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if g.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(g.fg))?;
                    last_fg = g.fg;
                }
                if g.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(g.bg))?;
                    last_bg = g.bg;
                }
                queue!(self.writer, Print(g.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Compose ──

    fn compose_game(&mut self, w: &WorldState) {
        let p = &w.player;
        let alert = if w.any_guard_aware() { "  ALERT" } else { "" };
        let key = if p.has_vault_key { "  [key]" } else { "" };
        let hud = format!(
            " {} ({}/{})  health {}/{}  loot {}  coins left {}  turn {}  spotted {}{}{} ",
            w.level_name, w.current_level + 1, w.total_levels.max(1),
            p.health, p.max_health, p.loot, w.coins_remaining(),
            w.stats.turns, w.stats.spottings, key, alert,
        );
        self.front.fill_row(HUD_ROW, HUD_BG);
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);

        let cam = self.camera;
        let map_h = w.grid.height() as i32;
        for vy in 0..cam.view_h {
            let row = MAP_ROW + vy;
            if row >= self.front.height { break; }
            let world_y = map_h - 1 - (cam.y + vy as i32);
            for vx in 0..cam.view_w {
                let col = vx * CELL_W;
                if col + 1 >= self.front.width { break; }
                let [a, b] = cell_glyphs(w, Pos::new(cam.x + vx as i32, world_y));
                self.front.set(col, row, a);
                self.front.set(col + 1, row, b);
            }
        }

        let msg_row = MAP_ROW + cam.view_h + 1;
        if !w.message.is_empty() && msg_row < self.front.height {
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_str(1, msg_row, &w.message, Color::Black, MSG_BG);
        }

        let help_row = MAP_ROW + cam.view_h + 3;
        if help_row < self.front.height {
            let help = " arrows/wasd: step  shift: leap  .: wait  r: restart  v: see all  q: quit";
            self.front.put_str(0, help_row, help, Color::DarkGrey, BASE_BG);
        }
    }

    fn compose_title(&mut self) {
        let banner = [
            r"  _   _        _       _   ",
            r" | | | | ___  (_) ___ | |_ ",
            r" | |_| |/ _ \ | |/ __|| __|",
            r" |  _  |  __/ | |\__ \| |_ ",
            r" |_| |_|\___| |_||___/ \__|",
        ];
        let gold = Color::Rgb { r: 255, g: 200, b: 50 };
        for (i, line) in banner.iter().enumerate() {
            self.front.put_str(4, 2 + i, line, gold, BASE_BG);
        }
        self.front.put_str(6, 8, "Slip past the guards, lift what you can, get out.", Color::White, BASE_BG);

        let mut row = 10;
        self.front.put_str(6, row, "Levels", gold, BASE_BG);
        for (i, name) in self.level_names.clone().iter().enumerate() {
            row += 1;
            self.front.put_str(8, row, &format!("{}. {}", i + 1, name), Color::Grey, BASE_BG);
        }

        let help = [
            "ENTER  start",
            "Step into a guard from behind to lift its purse.",
            "Leap onto a guard's back to knock it out.",
            "Bushes and tables hide you from guards that are not hunting.",
            "q / ESC  quit",
        ];
        for (i, line) in help.iter().enumerate() {
            let fg = if i == 0 { Color::Rgb { r: 80, g: 255, b: 80 } } else { Color::White };
            self.front.put_str(6, row + 2 + i, line, fg, BASE_BG);
        }
    }

    fn compose_level_end(&mut self, w: &WorldState) {
        let (title, fg) = match w.phase {
            Phase::Escaped if w.ghosted() => ("ESCAPED UNSEEN", Color::Rgb { r: 120, g: 220, b: 255 }),
            Phase::Escaped => ("ESCAPED", Color::Rgb { r: 80, g: 255, b: 80 }),
            _ => ("CAUGHT", Color::Rgb { r: 255, g: 60, b: 60 }),
        };
        let s = &w.stats;
        let lines = [
            format!("  {title}  "),
            format!("  turns {}  loot {}  spotted {}  ", s.turns, s.loot, s.spottings),
            format!("  knockouts {}  pickpockets {}  damage {}  ", s.knockouts, s.pickpockets, s.damage_taken),
            if w.phase == Phase::Escaped {
                "  ENTER: next level   q: quit  ".to_string()
            } else {
                "  ENTER / r: try again   q: quit  ".to_string()
            },
        ];
        let box_bg = Color::Rgb { r: 40, g: 40, b: 40 };
        let box_w = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let x0 = (self.camera.view_w * CELL_W).saturating_sub(box_w) / 2;
        let y0 = MAP_ROW + self.camera.view_h.saturating_sub(lines.len()) / 2;
        for (i, line) in lines.iter().enumerate() {
            let padded = format!("{line:<box_w$}");
            self.front.put_str(x0, y0 + i, &padded, if i == 0 { fg } else { Color::White }, box_bg);
        }
    }

    fn compose_game_complete(&mut self, w: &WorldState) {
        let gold = Color::Rgb { r: 255, g: 220, b: 50 };
        self.front.put_str(6, 4, "+--------------------------------+", gold, BASE_BG);
        self.front.put_str(6, 5, "|   EVERY VAULT EMPTIED. WELL    |", gold, BASE_BG);
        self.front.put_str(6, 6, "|   DONE, THIEF.                 |", gold, BASE_BG);
        self.front.put_str(6, 7, "+--------------------------------+", gold, BASE_BG);
        let levels = format!("All {} levels cleared.", w.total_levels);
        self.front.put_str(8, 9, &levels, Color::White, BASE_BG);
        self.front.put_str(8, 11, "ENTER / ESC: quit", Color::Rgb { r: 80, g: 255, b: 80 }, BASE_BG);
    }
}
