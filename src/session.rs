use std::sync::{Arc, Mutex};

use stepgrid::{
    note_name, AudioOutput, Engine, InstrumentRack, Layered, MidiOutputDevice, MidiSampler,
    PlaybackEngine, Result, SessionConfig, SystemTime,
};

/// Devices plus the running playback loop. The audio output has to stay
/// alive for as long as the samplers built from it are in use.
pub struct Session {
    pub playback: PlaybackEngine,
    pub midi: Arc<Mutex<MidiOutputDevice>>,
    audio: AudioOutput,
}

impl Session {
    pub fn open(config: &SessionConfig, midi_port: Option<usize>, midi_channel: u8) -> Result<Self> {
        let audio = AudioOutput::default();

        let mut midi = MidiOutputDevice::new();
        if let Some(port) = midi_port {
            if let Err(err) = midi.connect(port) {
                tracing::warn!(error = %err, "continuing without MIDI output");
            }
        }
        let midi = midi.shared();

        let mut rack = InstrumentRack::new();
        for instrument in &config.instruments {
            let sampler = Layered(
                audio.sampler(instrument.voice),
                MidiSampler::new(Arc::clone(&midi), instrument.midi_note)
                    .with_channel(midi_channel - 1),
            );
            rack.add(instrument.id.clone(), instrument.label.clone(), sampler)?;
            tracing::info!(
                instrument = %instrument.id,
                voice = ?instrument.voice,
                note = %note_name(instrument.midi_note),
                channel = midi_channel,
                "instrument routed"
            );
        }

        let mut engine = Engine::new(rack, SystemTime::new())?;
        for command in config.initial_commands()? {
            engine.send(command)?;
        }

        let mut playback = PlaybackEngine::new();
        playback.start(engine);

        Ok(Self {
            playback,
            midi,
            audio,
        })
    }

    /// False when no audio device could be opened and voices run silently.
    pub fn audio_connected(&self) -> bool {
        self.audio.is_connected()
    }

    pub fn disconnect_midi(&self) {
        self.midi
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .disconnect();
    }
}
