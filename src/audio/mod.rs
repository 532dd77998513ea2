/// Audio output using cpal
///
/// Each instrument gets a small pool of synthesized percussive voices. A
/// trigger starts the next voice in the pool, so a retrigger overlaps the
/// tail of the previous hit instead of cutting it.
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::error::{Result, SamplerError, SequencerError};
use crate::sequencer::dispatch::Sampler;

/// Voices per instrument.
const POLYPHONY: usize = 4;
const OUTPUT_GAIN: f32 = 0.5;
const SILENCE: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Kick,
    Snare,
    Hat,
    Clap,
    Tom,
    Rim,
}

struct VoiceParams {
    freq: f64,
    decay_secs: f32,
    noise_amount: f32,
    pitch_amount: f64,
    pitch_decay_secs: f32,
}

impl Voice {
    fn params(self) -> VoiceParams {
        match self {
            Voice::Kick => VoiceParams {
                freq: 55.0,
                decay_secs: 0.30,
                noise_amount: 0.05,
                pitch_amount: 200.0,
                pitch_decay_secs: 0.05,
            },
            Voice::Snare => VoiceParams {
                freq: 180.0,
                decay_secs: 0.20,
                noise_amount: 0.6,
                pitch_amount: 80.0,
                pitch_decay_secs: 0.03,
            },
            Voice::Hat => VoiceParams {
                freq: 800.0,
                decay_secs: 0.08,
                noise_amount: 0.95,
                pitch_amount: 0.0,
                pitch_decay_secs: 0.05,
            },
            Voice::Clap => VoiceParams {
                freq: 400.0,
                decay_secs: 0.12,
                noise_amount: 0.8,
                pitch_amount: 50.0,
                pitch_decay_secs: 0.02,
            },
            Voice::Tom => VoiceParams {
                freq: 100.0,
                decay_secs: 0.25,
                noise_amount: 0.1,
                pitch_amount: 150.0,
                pitch_decay_secs: 0.1,
            },
            Voice::Rim => VoiceParams {
                freq: 600.0,
                decay_secs: 0.06,
                noise_amount: 0.3,
                pitch_amount: 100.0,
                pitch_decay_secs: 0.015,
            },
        }
    }
}

/// Per-sample multiplier that takes 1.0 down to `SILENCE` in `secs`.
fn decay_factor(secs: f32, sample_rate: f32) -> f32 {
    SILENCE.powf(1.0 / (secs * sample_rate).max(1.0))
}

struct DrumVoice {
    freq: f64,
    noise_amount: f32,
    pitch_amount: f64,
    decay: f32,
    pitch_decay: f32,
    sample_rate: f64,
    phase: f64,
    envelope: f32,
    pitch_env: f32,
    noise_state: u32,
    active: bool,
}

impl DrumVoice {
    fn new(voice: Voice, sample_rate: f32, seed: u32) -> Self {
        let params = voice.params();
        Self {
            freq: params.freq,
            noise_amount: params.noise_amount,
            pitch_amount: params.pitch_amount,
            decay: decay_factor(params.decay_secs, sample_rate),
            pitch_decay: decay_factor(params.pitch_decay_secs, sample_rate),
            sample_rate: sample_rate as f64,
            phase: 0.0,
            envelope: 0.0,
            pitch_env: 0.0,
            noise_state: seed.max(1),
            active: false,
        }
    }

    fn trigger(&mut self) {
        self.phase = 0.0;
        self.envelope = 1.0;
        self.pitch_env = 1.0;
        self.active = true;
    }

    fn process(&mut self) -> f32 {
        if !self.active {
            return 0.0;
        }

        self.pitch_env *= self.pitch_decay;
        let freq = self.freq + self.pitch_amount * self.pitch_env as f64;

        let osc = (self.phase * std::f64::consts::TAU).sin() as f32;
        self.phase += freq / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        self.noise_state = self
            .noise_state
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        let noise = (self.noise_state as f32 / u32::MAX as f32) * 2.0 - 1.0;

        let sample = osc * (1.0 - self.noise_amount) + noise * self.noise_amount;

        self.envelope *= self.decay;
        if self.envelope < SILENCE {
            self.active = false;
        }

        sample * self.envelope
    }
}

struct VoicePool {
    voices: Vec<DrumVoice>,
    next: usize,
}

impl VoicePool {
    fn new(voice: Voice, sample_rate: f32, seed: u32) -> Self {
        Self {
            voices: (0..POLYPHONY)
                .map(|i| DrumVoice::new(voice, sample_rate, seed.wrapping_add(i as u32 * 7919)))
                .collect(),
            next: 0,
        }
    }

    fn trigger(&mut self) {
        self.voices[self.next].trigger();
        self.next = (self.next + 1) % self.voices.len();
    }

    fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.active).count()
    }
}

struct VoiceBank {
    sample_rate: f32,
    pools: Vec<VoicePool>,
}

impl VoiceBank {
    fn process(&mut self) -> f32 {
        let mut sum = 0.0f32;
        for pool in &mut self.pools {
            for voice in &mut pool.voices {
                sum += voice.process();
            }
        }
        (sum * OUTPUT_GAIN).clamp(-1.0, 1.0)
    }
}

pub struct AudioOutput {
    _stream: Option<cpal::Stream>,
    bank: Arc<Mutex<VoiceBank>>,
}

impl AudioOutput {
    /// Open the default output device.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SequencerError::Audio("no default output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| SequencerError::Audio(e.to_string()))?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        let bank = Arc::new(Mutex::new(VoiceBank {
            sample_rate,
            pools: Vec::new(),
        }));

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                let bank = Arc::clone(&bank);
                device
                    .build_output_stream(
                        &config.into(),
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            let mut bank = bank.lock().unwrap_or_else(|e| e.into_inner());
                            for frame in data.chunks_mut(channels.max(1)) {
                                let sample = bank.process();
                                for out in frame.iter_mut() {
                                    *out = sample;
                                }
                            }
                        },
                        |err| tracing::error!(error = %err, "audio stream error"),
                        None,
                    )
                    .map_err(|e| SequencerError::Audio(e.to_string()))?
            }
            format => {
                return Err(SequencerError::Audio(format!(
                    "unsupported sample format {format:?}"
                )))
            }
        };

        stream
            .play()
            .map_err(|e| SequencerError::Audio(e.to_string()))?;
        tracing::info!(sample_rate, channels, "audio output opened");

        Ok(Self {
            _stream: Some(stream),
            bank,
        })
    }

    /// No device attached; triggers still run the voices but nothing is heard.
    pub fn silent(sample_rate: f32) -> Self {
        Self {
            _stream: None,
            bank: Arc::new(Mutex::new(VoiceBank {
                sample_rate,
                pools: Vec::new(),
            })),
        }
    }

    pub fn is_connected(&self) -> bool {
        self._stream.is_some()
    }

    /// Register a voice pool and return the handle that triggers it.
    pub fn sampler(&self, voice: Voice) -> AudioSampler {
        let mut bank = self.bank.lock().unwrap_or_else(|e| e.into_inner());
        let pool = bank.pools.len();
        let seed = pool as u32 + 1;
        let sample_rate = bank.sample_rate;
        bank.pools.push(VoicePool::new(voice, sample_rate, seed));
        AudioSampler {
            bank: Arc::clone(&self.bank),
            pool,
        }
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "audio unavailable, continuing silently");
            Self::silent(48_000.0)
        })
    }
}

#[derive(Clone)]
pub struct AudioSampler {
    bank: Arc<Mutex<VoiceBank>>,
    pool: usize,
}

impl AudioSampler {
    pub fn active_voices(&self) -> usize {
        self.bank
            .lock()
            .map(|bank| bank.pools.get(self.pool).map_or(0, VoicePool::active_voices))
            .unwrap_or(0)
    }
}

impl Sampler for AudioSampler {
    fn trigger(&self) -> std::result::Result<(), SamplerError> {
        let mut bank = self
            .bank
            .lock()
            .map_err(|_| SamplerError::Other("voice bank lock poisoned".into()))?;
        bank.pools
            .get_mut(self.pool)
            .ok_or(SamplerError::Unavailable)?
            .trigger();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrigger_overlaps() {
        let output = AudioOutput::silent(48_000.0);
        assert!(!output.is_connected());
        let kick = output.sampler(Voice::Kick);
        kick.trigger().unwrap();
        kick.trigger().unwrap();
        assert_eq!(kick.active_voices(), 2);
    }

    #[test]
    fn test_samplers_are_independent() {
        let output = AudioOutput::silent(48_000.0);
        let kick = output.sampler(Voice::Kick);
        let hat = output.sampler(Voice::Hat);
        hat.trigger().unwrap();
        assert_eq!(kick.active_voices(), 0);
        assert_eq!(hat.active_voices(), 1);
    }

    #[test]
    fn test_voice_decays_to_silence() {
        let mut voice = DrumVoice::new(Voice::Hat, 48_000.0, 1);
        voice.trigger();
        let mut peak = 0.0f32;
        for _ in 0..48_000 {
            peak = peak.max(voice.process().abs());
        }
        assert!(peak > 0.0);
        assert!(!voice.active);
    }

    #[test]
    fn test_decay_factor_reaches_silence() {
        let factor = decay_factor(0.1, 1000.0);
        let level = factor.powi(100);
        assert!((level - SILENCE).abs() < 1e-4);
    }
}
