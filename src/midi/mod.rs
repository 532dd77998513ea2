/// MIDI output using midir
use midir::{MidiOutput, MidiOutputConnection};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::{Result, SamplerError, SequencerError};
use crate::sequencer::dispatch::Sampler;

const CLIENT_NAME: &str = "stepgrid MIDI Output";

/// General MIDI percussion channel (10), zero-based.
pub const DRUM_CHANNEL: u8 = 9;

/// How long a note is held before its note-off. Shorter than the fastest
/// step (1/32 at 240 BPM is 31.25 ms) so a retrigger is never cut short.
pub const DEFAULT_GATE: Duration = Duration::from_millis(25);

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Anything raw MIDI messages can be written to.
pub trait MidiSink: Send + 'static {
    fn is_connected(&self) -> bool;
    fn send_message(&mut self, message: &[u8]) -> Result<()>;
}

pub struct MidiOutputDevice {
    connection: Option<MidiOutputConnection>,
}

impl MidiOutputDevice {
    pub fn new() -> Self {
        Self { connection: None }
    }

    pub fn available_ports() -> Vec<String> {
        match MidiOutput::new(CLIENT_NAME) {
            Ok(midi_out) => midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "MIDI unavailable");
                vec![]
            }
        }
    }

    pub fn connect(&mut self, port_index: usize) -> Result<()> {
        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| SequencerError::Midi(format!("failed to create MIDI output: {e}")))?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| SequencerError::Midi(format!("no MIDI port {port_index}")))?;
        let name = midi_out.port_name(port).unwrap_or_default();

        let connection = midi_out
            .connect(port, "stepgrid")
            .map_err(|e| SequencerError::Midi(format!("failed to connect: {e}")))?;

        tracing::info!(port = %name, "MIDI output connected");
        self.connection = Some(connection);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
            tracing::info!("MIDI output disconnected");
        }
    }

    /// Wrap for sharing between several [`MidiSampler`]s.
    pub fn shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }
}

impl MidiSink for MidiOutputDevice {
    fn is_connected(&self) -> bool {
        MidiOutputDevice::is_connected(self)
    }

    fn send_message(&mut self, message: &[u8]) -> Result<()> {
        if let Some(ref mut conn) = self.connection {
            conn.send(message)
                .map_err(|e| SequencerError::Midi(format!("failed to send: {e}")))?;
        }
        Ok(())
    }
}

impl Default for MidiOutputDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn note_on(channel: u8, note: u8, velocity: u8) -> [u8; 3] {
    [0x90 | (channel & 0x0f), note & 0x7f, velocity & 0x7f]
}

fn note_off(channel: u8, note: u8) -> [u8; 3] {
    [0x80 | (channel & 0x0f), note & 0x7f, 0]
}

/// Plays an instrument as a drum note on a shared MIDI output. The note-off
/// is sent from a short-lived thread once the gate has elapsed.
pub struct MidiSampler<D: MidiSink = MidiOutputDevice> {
    device: Arc<Mutex<D>>,
    channel: u8,
    note: u8,
    velocity: u8,
    gate: Duration,
}

impl<D: MidiSink> MidiSampler<D> {
    pub fn new(device: Arc<Mutex<D>>, note: u8) -> Self {
        Self {
            device,
            channel: DRUM_CHANNEL,
            note: note.min(127),
            velocity: 100,
            gate: DEFAULT_GATE,
        }
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel.min(15);
        self
    }

    pub fn with_gate(mut self, gate: Duration) -> Self {
        self.gate = gate;
        self
    }
}

impl<D: MidiSink> Sampler for MidiSampler<D> {
    fn trigger(&self) -> std::result::Result<(), SamplerError> {
        {
            let mut device = self
                .device
                .lock()
                .map_err(|_| SamplerError::Other("MIDI device lock poisoned".into()))?;
            if !device.is_connected() {
                return Ok(());
            }
            device
                .send_message(&note_on(self.channel, self.note, self.velocity))
                .map_err(|e| SamplerError::Midi(e.to_string()))?;
        }

        let device = Arc::clone(&self.device);
        let (channel, note, gate) = (self.channel, self.note, self.gate);
        thread::spawn(move || {
            thread::sleep(gate);
            let mut device = device.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(err) = device.send_message(&note_off(channel, note)) {
                tracing::warn!(note, error = %err, "note-off failed");
            }
        });
        Ok(())
    }
}

/// Combines two samplers so an instrument can sound on both outputs.
pub struct Layered<A, B>(pub A, pub B);

impl<A: Sampler, B: Sampler> Sampler for Layered<A, B> {
    fn trigger(&self) -> std::result::Result<(), SamplerError> {
        let first = self.0.trigger();
        let second = self.1.trigger();
        first.and(second)
    }
}

/// Scientific pitch name of a MIDI note, with middle C (60) as `C4`.
pub fn note_name(note: u8) -> String {
    let note = note.min(127);
    let octave = i32::from(note / 12) - 1;
    format!("{}{octave}", PITCH_CLASSES[usize::from(note % 12)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_messages() {
        assert_eq!(note_on(DRUM_CHANNEL, 36, 100), [0x99, 36, 100]);
        assert_eq!(note_off(DRUM_CHANNEL, 36), [0x89, 36, 0]);
        assert_eq!(note_on(0, 200, 200), [0x90, 200 & 0x7f, 200 & 0x7f]);
    }

    #[test]
    fn test_disconnected_sampler_is_silent_ok() {
        let device = MidiOutputDevice::new().shared();
        let sampler = MidiSampler::new(device, 36);
        assert_eq!(sampler.trigger(), Ok(()));
    }

    #[test]
    fn test_layered_triggers_both_even_if_first_fails() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&hits);
        let layered = Layered(
            || -> std::result::Result<(), SamplerError> { Err(SamplerError::Unavailable) },
            move || -> std::result::Result<(), SamplerError> {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );
        assert_eq!(layered.trigger(), Err(SamplerError::Unavailable));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(36), "C2");
        assert_eq!(note_name(42), "F#2");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(200), "G9");
    }

    #[derive(Default)]
    struct Recorder {
        connected: bool,
        sent: Vec<(Instant, [u8; 3])>,
    }

    impl MidiSink for Recorder {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn send_message(&mut self, message: &[u8]) -> Result<()> {
            let mut bytes = [0; 3];
            bytes.copy_from_slice(message);
            self.sent.push((Instant::now(), bytes));
            Ok(())
        }
    }

    fn recorder() -> Arc<Mutex<Recorder>> {
        Arc::new(Mutex::new(Recorder {
            connected: true,
            ..Recorder::default()
        }))
    }

    fn sent(device: &Arc<Mutex<Recorder>>) -> Vec<[u8; 3]> {
        device.lock().unwrap().sent.iter().map(|(_, m)| *m).collect()
    }

    #[test]
    fn test_note_off_waits_for_gate() {
        let device = recorder();
        let gate = Duration::from_millis(40);
        let sampler = MidiSampler::new(Arc::clone(&device), 38).with_gate(gate);

        let started = Instant::now();
        sampler.trigger().unwrap();
        assert_eq!(sent(&device), vec![note_on(DRUM_CHANNEL, 38, 100)]);

        let deadline = started + Duration::from_secs(2);
        while sent(&device).len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        let log = device.lock().unwrap().sent.clone();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].1, note_off(DRUM_CHANNEL, 38));
        assert!(log[1].0.duration_since(started) >= gate);
    }

    #[test]
    fn test_disconnected_sink_gets_nothing() {
        let device = Arc::new(Mutex::new(Recorder::default()));
        let sampler = MidiSampler::new(Arc::clone(&device), 36).with_gate(Duration::ZERO);
        assert_eq!(sampler.trigger(), Ok(()));
        thread::sleep(Duration::from_millis(20));
        assert!(sent(&device).is_empty());
    }
}
