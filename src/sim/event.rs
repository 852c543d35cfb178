/// Events emitted during a simulation step.
/// The presentation layer consumes these for sound and status messages;
/// the engine never reads them back.

use crate::domain::ai::GuardSpeech;
use crate::domain::entity::NoiseKind;
use crate::domain::grid::Pos;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEvent {
    PlayerMoved { from: Pos, to: Pos },
    PlayerLeapt { from: Pos, to: Pos },
    /// Walked into something that did not give way.
    PlayerBlocked { at: Pos },
    /// Traded places with an unconscious guard.
    PlayerSwapped { guard: usize },
    CoinPicked { pos: Pos },
    TorchSnuffed { pos: Pos },
    CreakRevealed { pos: Pos },
    Noise { kind: NoiseKind, origin: Pos },
    Pickpocketed { guard: usize, purse: bool, key: bool },
    /// Knocked out; whatever it carried went to the player.
    GuardKnockedOut { guard: usize, purse: bool, key: bool },
    /// A colleague shook this guard awake.
    GuardRoused { guard: usize, by: usize },
    GuardSpoke { guard: usize, speech: GuardSpeech },
    PlayerHit { by: usize },
    Escaped,
    Caught,
}
