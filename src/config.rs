/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::PathBuf;

use tracing::warn;

// ── Public Config Structs ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub rules: RulesConfig,
    pub gamepad: GamepadConfig,
    pub levels_dir: PathBuf,
    /// 0 = derive the RNG seed from the level index.
    pub seed: u64,
    pub log_filter: String,
}

/// Everything the simulation reads. Cloned into each level's world.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RulesConfig {
    pub perception: PerceptionConfig,
    pub noise: NoiseConfig,
    pub timers: TimerConfig,
    pub player: PlayerConfig,
}

/// Sight cutoffs are squared distances.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct PerceptionConfig {
    #[serde(default = "default_lit_cutoff")]
    pub lit_sight_cutoff: i32,
    #[serde(default = "default_unlit_cutoff")]
    pub unlit_sight_cutoff: i32,
    #[serde(default = "default_torch_radius")]
    pub torch_radius: i32,
    #[serde(default = "default_guard_torch_radius")]
    pub guard_torch_radius: i32,
    #[serde(default = "default_view_radius")]
    pub player_view_radius: i32,
}

/// Earshot radii, in cells.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct NoiseConfig {
    #[serde(default = "default_creak")]
    pub creak_radius: i32,
    #[serde(default = "default_splash")]
    pub splash_radius: i32,
    #[serde(default = "default_door")]
    pub door_radius: i32,
    #[serde(default = "default_thud")]
    pub thud_radius: i32,
    #[serde(default = "default_alarm")]
    pub alarm_radius: i32,
}

/// Mode countdowns, in turns.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TimerConfig {
    #[serde(default = "default_listen")]
    pub listen_turns: u32,
    #[serde(default = "default_move_to_sound")]
    pub move_to_sound_turns: u32,
    #[serde(default = "default_investigate")]
    pub investigate_turns: u32,
    #[serde(default = "default_angry_bonus")]
    pub angry_bonus_turns: u32,
    #[serde(default = "default_unconscious")]
    pub unconscious_turns: u32,
    #[serde(default = "default_unconscious_jitter")]
    pub unconscious_jitter: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct PlayerConfig {
    #[serde(default = "default_max_health")]
    pub max_health: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct GamepadConfig {
    #[serde(default = "default_leap")]
    pub leap: Vec<String>,
    #[serde(default = "default_wait")]
    pub wait: Vec<String>,
    #[serde(default = "default_restart")]
    pub restart: Vec<String>,
    #[serde(default = "default_quit")]
    pub quit: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    perception: PerceptionConfig,
    #[serde(default)]
    noise: NoiseConfig,
    #[serde(default)]
    timers: TimerConfig,
    #[serde(default)]
    player: PlayerConfig,
    #[serde(default)]
    gamepad: GamepadConfig,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default)]
    seed: u64,
    #[serde(default = "default_log_filter")]
    log_filter: String,
}

// ── Defaults ──

fn default_lit_cutoff() -> i32 { 75 }
fn default_unlit_cutoff() -> i32 { 3 }   // adjacent cells only
fn default_torch_radius() -> i32 { 4 }
fn default_guard_torch_radius() -> i32 { 2 }
fn default_view_radius() -> i32 { 12 }

fn default_creak() -> i32 { 6 }
fn default_splash() -> i32 { 6 }
fn default_door() -> i32 { 5 }
fn default_thud() -> i32 { 7 }
fn default_alarm() -> i32 { 10 }

fn default_listen() -> u32 { 4 }
fn default_move_to_sound() -> u32 { 10 }
fn default_investigate() -> u32 { 8 }
fn default_angry_bonus() -> u32 { 6 }
fn default_unconscious() -> u32 { 30 }
fn default_unconscious_jitter() -> u32 { 10 }

fn default_max_health() -> u32 { 3 }

fn default_leap() -> Vec<String> { vec!["A".into(), "R1".into()] }
fn default_wait() -> Vec<String> { vec!["B".into()] }
fn default_restart() -> Vec<String> { vec!["Start".into()] }
fn default_quit() -> Vec<String> { vec!["Select".into()] }
fn default_levels_dir() -> String { "levels".into() }
fn default_log_filter() -> String { "heist=info".into() }

impl Default for PerceptionConfig {
    fn default() -> Self {
        PerceptionConfig {
            lit_sight_cutoff: default_lit_cutoff(),
            unlit_sight_cutoff: default_unlit_cutoff(),
            torch_radius: default_torch_radius(),
            guard_torch_radius: default_guard_torch_radius(),
            player_view_radius: default_view_radius(),
        }
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig {
            creak_radius: default_creak(),
            splash_radius: default_splash(),
            door_radius: default_door(),
            thud_radius: default_thud(),
            alarm_radius: default_alarm(),
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        TimerConfig {
            listen_turns: default_listen(),
            move_to_sound_turns: default_move_to_sound(),
            investigate_turns: default_investigate(),
            angry_bonus_turns: default_angry_bonus(),
            unconscious_turns: default_unconscious(),
            unconscious_jitter: default_unconscious_jitter(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig { max_health: default_max_health() }
    }
}

impl Default for GamepadConfig {
    fn default() -> Self {
        GamepadConfig {
            leap: default_leap(),
            wait: default_wait(),
            restart: default_restart(),
            quit: default_quit(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_dir: default_levels_dir(),
            seed: 0,
            log_filter: default_log_filter(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[])
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::from_toml(toml_cfg, &search_dirs)
    }

    /// Parse a config document directly; relative paths resolve against CWD.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let toml_cfg = toml::from_str::<TomlConfig>(text)?;
        Ok(GameConfig::from_toml(toml_cfg, &[]))
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let levels_dir_str = &toml_cfg.general.levels_dir;
        let levels_dir = if PathBuf::from(levels_dir_str).is_absolute() {
            PathBuf::from(levels_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(levels_dir_str))
        };

        let mut perception = toml_cfg.perception;
        if perception.unlit_sight_cutoff > perception.lit_sight_cutoff {
            warn!(
                lit = perception.lit_sight_cutoff,
                unlit = perception.unlit_sight_cutoff,
                "unlit_sight_cutoff exceeds lit_sight_cutoff, clamping"
            );
            perception.unlit_sight_cutoff = perception.lit_sight_cutoff;
        }

        GameConfig {
            rules: RulesConfig {
                perception,
                noise: toml_cfg.noise,
                timers: toml_cfg.timers,
                player: toml_cfg.player,
            },
            gamepad: toml_cfg.gamepad,
            levels_dir,
            seed: toml_cfg.general.seed,
            log_filter: toml_cfg.general.log_filter,
        }
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "config.toml parse error, using defaults");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not read config.toml");
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = GameConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.rules, RulesConfig::default());
        assert_eq!(cfg.seed, 0);
        assert_eq!(cfg.log_filter, "heist=info");
        assert_eq!(cfg.levels_dir, PathBuf::from("levels"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = GameConfig::from_toml_str(
            "[perception]\nunlit_sight_cutoff = 2\n\n[general]\nseed = 42\n",
        )
        .unwrap();
        assert_eq!(cfg.rules.perception.unlit_sight_cutoff, 2);
        assert_eq!(cfg.rules.perception.lit_sight_cutoff, 75);
        assert_eq!(cfg.rules.timers, TimerConfig::default());
        assert_eq!(cfg.seed, 42);
    }

    #[test]
    fn lit_cutoff_exceeds_unlit_by_default() {
        let p = PerceptionConfig::default();
        assert!(p.lit_sight_cutoff > p.unlit_sight_cutoff);
    }

    #[test]
    fn unlit_cutoff_is_clamped_to_lit() {
        let cfg = GameConfig::from_toml_str("[perception]\nlit_sight_cutoff = 10\nunlit_sight_cutoff = 50\n").unwrap();
        assert_eq!(cfg.rules.perception.lit_sight_cutoff, 10);
        assert_eq!(cfg.rules.perception.unlit_sight_cutoff, 10);
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(GameConfig::from_toml_str("[timers]\nlisten_turns = \"soon\"").is_err());
    }
}
