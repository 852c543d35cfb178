/// Sound cues for game events, synthesized at startup and played through rodio.
///
/// `cue_for` maps a `GameEvent` to at most one `Sfx`; the engine owns one
/// pre-rendered WAV buffer per cue. Without the "sound" feature the engine
/// is a silent stub with the same API.

use heist::domain::ai::GuardSpeech;
use heist::domain::entity::NoiseKind;
use heist::sim::event::GameEvent;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sfx {
    Coin,
    Snuff,
    Creak,
    Splash,
    Thud,
    Lift,
    Knockout,
    Hit,
    /// A guard noticed something (short rising "huh?").
    Alert,
    /// A guard gave up (falling two-note sigh).
    Relax,
    Escape,
    Caught,
}

const SFX_COUNT: usize = 12;

/// The cue an event deserves, if any.
pub fn cue_for(event: &GameEvent) -> Option<Sfx> {
    match *event {
        GameEvent::CoinPicked { .. } => Some(Sfx::Coin),
        GameEvent::TorchSnuffed { .. } => Some(Sfx::Snuff),
        GameEvent::Noise { kind, .. } => match kind {
            NoiseKind::Creak => Some(Sfx::Creak),
            NoiseKind::Splash => Some(Sfx::Splash),
            NoiseKind::DoorBang | NoiseKind::Thud => Some(Sfx::Thud),
            // guard shouts are voiced through GuardSpoke
            NoiseKind::Alarm => None,
        },
        GameEvent::Pickpocketed { .. } => Some(Sfx::Lift),
        GameEvent::GuardKnockedOut { .. } => Some(Sfx::Knockout),
        GameEvent::PlayerHit { .. } => Some(Sfx::Hit),
        GameEvent::GuardSpoke { speech, .. } => match speech {
            GuardSpeech::EndedChase | GuardSpeech::LostPlayer => Some(Sfx::Relax),
            GuardSpeech::TookDamage => None,
            _ => Some(Sfx::Alert),
        },
        GameEvent::Escaped => Some(Sfx::Escape),
        GameEvent::Caught => Some(Sfx::Caught),
        _ => None,
    }
}

#[cfg(feature = "sound")]
mod inner {
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};

    use super::{Sfx, SFX_COUNT};

    const SAMPLE_RATE: u32 = 22050;
    const TAU: f32 = std::f32::consts::TAU;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        buffers: [Arc<Vec<u8>>; SFX_COUNT],
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "no audio output, running silent");
                    return None;
                }
            };

            let buffers = [
                Sfx::Coin, Sfx::Snuff, Sfx::Creak, Sfx::Splash, Sfx::Thud, Sfx::Lift,
                Sfx::Knockout, Sfx::Hit, Sfx::Alert, Sfx::Relax, Sfx::Escape, Sfx::Caught,
            ]
            .map(|sfx| Arc::new(make_wav(&render(sfx))));

            Some(SoundEngine { _stream: stream, handle, buffers })
        }

        pub fn play(&self, sfx: Sfx) {
            let buf = &self.buffers[sfx as usize];
            if let Ok(sink) = Sink::try_new(&self.handle) {
                if let Ok(src) = rodio::Decoder::new(Cursor::new(buf.as_ref().clone())) {
                    sink.append(src);
                    sink.detach();
                }
            }
        }
    }

    fn render(sfx: Sfx) -> Vec<f32> {
        match sfx {
            Sfx::Coin => notes(&[(1319.0, 0.04), (1760.0, 0.07)], 0.25),
            Sfx::Snuff => sweep(900.0, 200.0, 0.18, 0.8, 0.2),
            Sfx::Creak => sweep(180.0, 140.0, 0.22, 0.2, 0.25),
            Sfx::Splash => sweep(700.0, 300.0, 0.25, 0.9, 0.25),
            Sfx::Thud => sweep(120.0, 60.0, 0.12, 0.3, 0.4),
            Sfx::Lift => notes(&[(880.0, 0.03), (1175.0, 0.03), (1568.0, 0.05)], 0.2),
            Sfx::Knockout => sweep(220.0, 70.0, 0.2, 0.5, 0.4),
            Sfx::Hit => sweep(300.0, 150.0, 0.1, 0.7, 0.4),
            Sfx::Alert => sweep(330.0, 660.0, 0.14, 0.0, 0.3),
            Sfx::Relax => notes(&[(440.0, 0.1), (330.0, 0.16)], 0.25),
            Sfx::Escape => notes(&[(523.0, 0.1), (659.0, 0.1), (784.0, 0.1), (1047.0, 0.3)], 0.3),
            Sfx::Caught => notes(&[(392.0, 0.14), (330.0, 0.14), (262.0, 0.35)], 0.3),
        }
    }

    /// Sequence of tones with a soft octave harmonic and a per-note fade.
    fn notes(seq: &[(f32, f32)], volume: f32) -> Vec<f32> {
        let mut samples = Vec::new();
        for &(freq, dur) in seq {
            let n = (SAMPLE_RATE as f32 * dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.6);
                let wave = (t * freq * TAU).sin() * 0.75 + (t * freq * 2.0 * TAU).sin() * 0.25;
                samples.push(wave * env * volume);
            }
        }
        samples
    }

    /// Linear pitch glide mixed with `noise_mix` of white noise.
    fn sweep(from: f32, to: f32, dur: f32, noise_mix: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * dur) as usize;
        let mut lcg: u32 = 0x2545_F491;
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let k = i as f32 / n as f32;
                phase += (from + (to - from) * k) / SAMPLE_RATE as f32;
                let tone = (phase * TAU).sin();
                lcg = lcg.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let noise = (lcg >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0;
                (tone * (1.0 - noise_mix) + noise * noise_mix) * (1.0 - k).powf(0.7) * volume
            })
            .collect()
    }

    /// 16-bit mono PCM WAV.
    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let data_size = samples.len() as u32 * 2;
        let mut buf = Vec::with_capacity(44 + data_size as usize);

        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_size).to_le_bytes());
        buf.extend_from_slice(b"WAVEfmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&1u16.to_le_bytes()); // mono
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());

        for &s in samples {
            let val = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }
        buf
    }
}

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play(&self, _sfx: Sfx) {}
}
