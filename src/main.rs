/// Entry point and game loop.
///
/// The loop is input-driven: nothing advances until the player acts. Each
/// frame drains keyboard and gamepad commands, applies them, then redraws.

mod ui;

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

use heist::config::GameConfig;
use heist::domain::ai::GuardSpeech;
use heist::sim::event::GameEvent;
use heist::sim::level::{level_names, load_level};
use heist::sim::step;
use heist::sim::world::{Phase, WorldState};
use ui::gamepad::GamepadState;
use ui::input::{Command, InputState};
use ui::renderer::Renderer;
use ui::sound::{cue_for, SoundEngine};

const INPUT_POLL: Duration = Duration::from_millis(30);
const DEFAULT_FILTER: &str = "heist=info";

type FilterHandle = reload::Handle<EnvFilter, Registry>;

fn main() -> Result<(), Box<dyn Error>> {
    let (_log_guard, filter) = init_logging()?;

    let config = GameConfig::load();
    if std::env::var_os("RUST_LOG").is_none() && config.log_filter != DEFAULT_FILTER {
        match EnvFilter::try_new(&config.log_filter) {
            Ok(f) => filter.reload(f)?,
            Err(e) => warn!(filter = %config.log_filter, error = %e, "bad log_filter, keeping default"),
        }
    }

    let mut world = WorldState::new(config.rules.clone());
    let mut renderer = Renderer::new();
    renderer.level_names = level_names(&config);
    world.total_levels = renderer.level_names.len();
    info!(levels = world.total_levels, "starting");

    renderer.init()?;
    let sound = SoundEngine::new();

    let result = game_loop(&mut world, &mut renderer, sound.as_ref(), &config);
    let cleanup = renderer.cleanup();
    result?;
    cleanup?;

    println!();
    println!("Thanks for playing Heist!");
    println!("Loot carried out of the last level: {}", world.player.loot);
    Ok(())
}

/// File logging (the terminal belongs to the renderer). `RUST_LOG` wins over
/// everything; the filter can be swapped once the config is read.
fn init_logging() -> Result<(WorkerGuard, FilterHandle), Box<dyn Error>> {
    let log_dir: PathBuf = std::env::temp_dir().join("heist");
    std::fs::create_dir_all(&log_dir)?;

    let appender = tracing_appender::rolling::never(&log_dir, "heist.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let (filter_layer, handle) = reload::Layer::new(env_filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()?;

    info!(path = %log_dir.join("heist.log").display(), "logging initialized");
    Ok((guard, handle))
}

enum Flow {
    Continue,
    Quit,
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    config: &GameConfig,
) -> Result<(), Box<dyn Error>> {
    let mut kb = InputState::new();
    let mut gp = GamepadState::new(&config.gamepad);
    if gp.connected {
        info!("gamepad connected");
    }

    loop {
        renderer.render(world)?;

        kb.drain_events(INPUT_POLL);
        let mut commands = kb.commands().to_vec();
        commands.extend(gp.update());

        for cmd in commands {
            if let Flow::Quit = apply_command(world, cmd, sound, config)? {
                return Ok(());
            }
        }
    }
}

/// Start (Enter / pad restart button) advances every non-playing screen.
fn apply_command(
    world: &mut WorldState,
    cmd: Command,
    sound: Option<&SoundEngine>,
    config: &GameConfig,
) -> Result<Flow, Box<dyn Error>> {
    match cmd {
        Command::Quit => return Ok(Flow::Quit),
        Command::ToggleSeeAll => {
            world.see_all = !world.see_all;
            let msg = if world.see_all { "See-all on" } else { "See-all off" };
            world.set_message(msg, 5);
            return Ok(Flow::Continue);
        }
        _ => {}
    }

    match (world.phase, cmd) {
        (Phase::Title, Command::Continue | Command::Restart | Command::Act(_)) => {
            load_level(world, 0, config)?;
        }
        (Phase::Playing, Command::Act(action)) => {
            let events = step::step(world, action)?;
            announce(world, sound, &events);
        }
        (Phase::Playing, Command::Restart) => {
            world.restart_level()?;
            world.set_message("Level restarted", 10);
        }
        (Phase::Escaped, Command::Continue | Command::Restart) => {
            let next = world.current_level + 1;
            load_level(world, next, config)?;
        }
        (Phase::Caught, Command::Continue | Command::Restart) => {
            world.restart_level()?;
            world.set_message("Try again", 10);
        }
        (Phase::GameComplete, Command::Continue | Command::Restart) => return Ok(Flow::Quit),
        _ => {}
    }
    Ok(Flow::Continue)
}

fn speech_line(speech: GuardSpeech) -> &'static str {
    match speech {
        GuardSpeech::Spotted => "Hey! You there!",
        GuardSpeech::BeganChase => "There you are!",
        GuardSpeech::LostPlayer => "Where did they go?",
        GuardSpeech::HeardNoise => "What was that?",
        GuardSpeech::EndedChase => "Must have been rats.",
        GuardSpeech::TookDamage => "Oof!",
        GuardSpeech::FoundDowned => "Man down! Intruder!",
    }
}

/// Sound and status line for one turn's events. The last message wins.
fn announce(world: &mut WorldState, sound: Option<&SoundEngine>, events: &[GameEvent]) {
    for ev in events {
        if let (Some(engine), Some(sfx)) = (sound, cue_for(ev)) {
            engine.play(sfx);
        }

        let msg = match *ev {
            GameEvent::GuardSpoke { guard, speech } => {
                if !world.guard_visible_to_player(guard) && speech != GuardSpeech::Spotted {
                    continue;
                }
                format!("Guard {}: {}", guard + 1, speech_line(speech))
            }
            GameEvent::Pickpocketed { purse, key, .. } | GameEvent::GuardKnockedOut { purse, key, .. } => {
                match (purse, key) {
                    (true, true) => "You take a purse and the vault key.".to_string(),
                    (true, false) => "You take a purse.".to_string(),
                    (false, true) => "You take the vault key.".to_string(),
                    (false, false) => continue,
                }
            }
            GameEvent::GuardRoused { guard, .. } => format!("Guard {} is shaken awake.", guard + 1),
            GameEvent::PlayerHit { by } => format!("Guard {} strikes you!", by + 1),
            GameEvent::TorchSnuffed { .. } => "You snuff out the torch.".to_string(),
            GameEvent::CreakRevealed { .. } => "The floorboard creaks.".to_string(),
            _ => continue,
        };
        world.set_message(&msg, 6);
    }
}
