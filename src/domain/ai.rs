/// Guard state machine: one transition per guard per turn.
///
/// Rules are evaluated in priority order, first match wins:
///   1. **Unconscious** counts down; on waking the guard goes straight to
///      chase if the player is in sight, otherwise back to patrol. Either
///      way it wakes up angry.
///   2. **Sees the player**: chase, retargeting every turn.
///   3. **Lost sight** after chasing: investigate the last known position.
///   4. **Heard something**: listen, or walk to the noise when the noise
///      was an alarm, this guard was the closest hearer, it is angry, or it
///      was already listening.
///   5. **Found a downed colleague** while relaxed: investigate it.
///   6. **Timer expired**: back to patrol, keeping the patrol index.
///
/// Perception is an input here; the turn orchestrator computes it for all
/// guards before any transition runs.

use tracing::debug;

use crate::config::TimerConfig;

use super::entity::{Guard, GuardMode};
use super::grid::Pos;

/// What one guard perceives this turn. Computed from a snapshot of the
/// world before any guard transitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Perception {
    pub sees_player: bool,
    /// Cell of an unconscious guard in sight, nearest first.
    pub downed_in_sight: Option<Pos>,
}

/// Vocalization tag raised by a transition. Sound and subtitles are the
/// presentation layer's business.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardSpeech {
    /// Relaxed (or just woken) guard spots the player.
    Spotted,
    /// Searching guard re-acquires the player.
    BeganChase,
    LostPlayer,
    HeardNoise,
    /// Search abandoned, back to patrol.
    EndedChase,
    TookDamage,
    FoundDowned,
}

impl GuardSpeech {
    /// Does this vocalization mark a new sighting of the player?
    pub fn is_spotting(self) -> bool {
        matches!(self, GuardSpeech::Spotted | GuardSpeech::BeganChase)
    }
}

fn with_bonus(base: u32, guard: &Guard, timers: &TimerConfig) -> u32 {
    if guard.angry { base + timers.angry_bonus_turns } else { base }
}

fn begin_chase(guard: &mut Guard, player: Pos) -> GuardSpeech {
    let speech = if guard.mode.is_relaxed() || guard.mode.is_unconscious() {
        GuardSpeech::Spotted
    } else {
        GuardSpeech::BeganChase
    };
    guard.mode = GuardMode::ChaseVisibleTarget { target: player };
    guard.last_target_pos = Some(player);
    if let Some(dir) = guard.pos.facing_toward(player) {
        guard.dir = dir;
    }
    speech
}

/// Apply one turn's transition to `guard`. Returns the vocalization, if any.
pub fn transition(
    guard: &mut Guard,
    seen: &Perception,
    player: Pos,
    timers: &TimerConfig,
) -> Option<GuardSpeech> {
    let before = guard.mode;
    let speech = next_mode(guard, seen, player, timers);
    if guard.mode != before {
        debug!(guard = guard.id, from = before.name(), to = guard.mode.name(), "guard mode");
    }
    speech
}

fn next_mode(guard: &mut Guard, seen: &Perception, player: Pos, timers: &TimerConfig) -> Option<GuardSpeech> {
    // 1. Unconscious
    if let GuardMode::Unconscious { timeout } = guard.mode {
        let left = timeout.saturating_sub(1);
        if left > 0 {
            guard.mode = GuardMode::Unconscious { timeout: left };
            return None;
        }
        guard.angry = true;
        if seen.sees_player {
            return Some(begin_chase(guard, player));
        }
        guard.mode = GuardMode::Patrol;
        return None;
    }

    // 2. Sees the player
    if seen.sees_player {
        if guard.mode.is_chasing() {
            guard.mode = GuardMode::ChaseVisibleTarget { target: player };
            guard.last_target_pos = Some(player);
            return None;
        }
        return Some(begin_chase(guard, player));
    }

    // 3. Lost sight
    if let GuardMode::ChaseVisibleTarget { target } = guard.mode {
        guard.mode = GuardMode::Investigate {
            target,
            timeout: with_bonus(timers.investigate_turns, guard, timers),
        };
        return Some(GuardSpeech::LostPlayer);
    }

    // 4. Heard something
    if guard.heard_thief || guard.heard_alarm {
        if let Some(origin) = guard.last_sound_pos {
            let was_relaxed = guard.mode.is_relaxed();
            let walk = guard.heard_alarm
                || guard.heard_thief_closest
                || guard.angry
                || matches!(guard.mode, GuardMode::Listen { .. });
            if walk {
                guard.mode = GuardMode::MoveToLastSound {
                    target: origin,
                    timeout: with_bonus(timers.move_to_sound_turns, guard, timers),
                };
            } else {
                guard.mode = GuardMode::Listen { toward: origin, timeout: timers.listen_turns };
                if let Some(dir) = guard.pos.facing_toward(origin) {
                    guard.dir = dir;
                }
            }
            return was_relaxed.then_some(GuardSpeech::HeardNoise);
        }
    }

    // 5. Downed colleague
    if guard.mode.is_relaxed() {
        if let Some(downed) = seen.downed_in_sight {
            guard.angry = true;
            guard.mode = GuardMode::Investigate {
                target: downed,
                timeout: with_bonus(timers.investigate_turns, guard, timers),
            };
            return Some(GuardSpeech::FoundDowned);
        }
    }

    // 6. Timers
    match guard.mode {
        GuardMode::Listen { toward, timeout } => {
            let left = timeout.saturating_sub(1);
            guard.mode = if left == 0 { GuardMode::Patrol } else { GuardMode::Listen { toward, timeout: left } };
            None
        }
        GuardMode::MoveToLastSound { target, timeout } => {
            let left = timeout.saturating_sub(1);
            if left == 0 {
                guard.mode = GuardMode::Patrol;
                return Some(GuardSpeech::EndedChase);
            }
            guard.mode = GuardMode::MoveToLastSound { target, timeout: left };
            None
        }
        GuardMode::Investigate { target, timeout } => {
            let left = timeout.saturating_sub(1);
            if left == 0 {
                guard.mode = GuardMode::Patrol;
                return Some(GuardSpeech::EndedChase);
            }
            guard.mode = GuardMode::Investigate { target, timeout: left };
            None
        }
        GuardMode::Patrol | GuardMode::ChaseVisibleTarget { .. } | GuardMode::Unconscious { .. } => None,
    }
}
