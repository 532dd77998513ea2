/// Error types for the sequencer core and its device backends.
use crate::sequencer::InstrumentId;

/// Result alias that carries [`SequencerError`].
pub type Result<T> = std::result::Result<T, SequencerError>;

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    /// The instrument set is fixed at startup, so this is a programming error.
    #[error("unknown instrument `{0}`")]
    UnknownInstrument(InstrumentId),
    #[error("instrument `{0}` is already registered")]
    DuplicateInstrument(InstrumentId),
    #[error("step index {index} is outside a {len}-step sequence")]
    StepOutOfRange { index: usize, len: usize },
    #[error("step count {0} is not a positive multiple of 16")]
    InvalidStepCount(usize),
    #[error("invalid BPM {0}")]
    InvalidBpm(f64),
    #[error("invalid subdivision {0}")]
    InvalidSubdivision(u32),
    #[error("page {page} is outside 1..={page_count}")]
    InvalidPage { page: usize, page_count: usize },
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("playback engine is not running")]
    EngineStopped,
    #[error("audio device error: {0}")]
    Audio(String),
    #[error("MIDI error: {0}")]
    Midi(String),
    #[error("GUI error: {0}")]
    Gui(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Failure of a single sampler `trigger()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SamplerError {
    #[error("sampler output is unavailable")]
    Unavailable,
    #[error("failed to send MIDI message: {0}")]
    Midi(String),
    #[error("{0}")]
    Other(String),
}
