/// STEPGRID - a drum step sequencer library
///
/// This library provides the core components of a grid step sequencer:
/// - Per-instrument step patterns that grow and shrink by 16-step pages
/// - A pure state machine for transport, tempo and pattern edits
/// - A drift-tolerant step clock with an injectable time source
/// - Trigger dispatch to per-instrument samplers (audio or MIDI)
/// - A playback engine that runs it all on one loop thread

pub mod audio;
pub mod config;
pub mod controls;
pub mod error;
pub mod midi;
pub mod sequencer;

// Re-export commonly used types
pub use audio::{AudioOutput, AudioSampler, Voice};
pub use config::{InstrumentConfig, SessionConfig};
pub use controls::{parse_command, validate_bpm, validate_page, StepCount, Subdivision};
pub use error::{Result, SamplerError, SequencerError};
pub use midi::{note_name, Layered, MidiOutputDevice, MidiSampler, MidiSink};
pub use sequencer::clock::{Clock, ManualTime, SystemTime, TimeSource};
pub use sequencer::dispatch::{dispatch, DispatchReport, InstrumentRack, Sampler};
pub use sequencer::engine::Engine;
pub use sequencer::paint::{Cell, PaintGesture};
pub use sequencer::playback::{PlaybackEngine, PlaybackEvent};
pub use sequencer::{Command, Instrument, InstrumentId, Sequence, SequencerState};
