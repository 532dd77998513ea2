/// Core sequencer logic - playback state and the transition function.
///
/// `SequencerState` is a plain value. The only way to change it is
/// [`SequencerState::apply`], which takes a [`Command`] and returns the next
/// state, leaving the old one untouched.
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SequencerError};

pub mod clock;
pub mod dispatch;
pub mod engine;
pub mod paint;
pub mod pattern;
pub mod playback;

pub use pattern::{Sequence, PAGE_SIZE};

pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_SUBDIVISION: u32 = 4;
pub const DEFAULT_STEP_COUNT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for InstrumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One row of the grid: identity plus its pattern. The sampler that plays it
/// lives in the [`dispatch::InstrumentRack`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub label: String,
    pub sequence: Sequence,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    /// Stops playback and rewinds to step 1.
    Pause,
    /// Play when stopped, pause when running.
    TogglePlay,
    AdvanceStep,
    SetBpm(f64),
    SetSubdivision(u32),
    SetStepCount(usize),
    ToggleStepAt { instrument: InstrumentId, index: usize },
    SetSelectedPage(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequencerState {
    step: usize,
    is_playing: bool,
    bpm: f64,
    subdivision: u32,
    step_count: usize,
    selected_page: usize,
    instruments: Vec<Instrument>,
}

impl SequencerState {
    /// Default session: paused on step 1, 120 BPM, 16 empty steps.
    pub fn new<I, L>(instruments: I) -> Result<Self>
    where
        I: IntoIterator<Item = (InstrumentId, L)>,
        L: Into<String>,
    {
        let mut rows: Vec<Instrument> = Vec::new();
        for (id, label) in instruments {
            if rows.iter().any(|row| row.id == id) {
                return Err(SequencerError::DuplicateInstrument(id));
            }
            rows.push(Instrument {
                id,
                label: label.into(),
                sequence: Sequence::new(DEFAULT_STEP_COUNT),
            });
        }

        Ok(Self {
            step: 1,
            is_playing: false,
            bpm: DEFAULT_BPM,
            subdivision: DEFAULT_SUBDIVISION,
            step_count: DEFAULT_STEP_COUNT,
            selected_page: 1,
            instruments: rows,
        })
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn subdivision(&self) -> u32 {
        self.subdivision
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn selected_page(&self) -> usize {
        self.selected_page
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn instrument(&self, id: &InstrumentId) -> Option<&Instrument> {
        self.instruments.iter().find(|row| &row.id == id)
    }

    /// Length of one step in milliseconds.
    pub fn interval_ms(&self) -> f64 {
        interval_ms(self.bpm, self.subdivision)
    }

    pub fn page_count(&self) -> usize {
        self.step_count / PAGE_SIZE
    }

    /// 1-based page containing a 1-based step.
    pub fn page_of(&self, step: usize) -> usize {
        step.saturating_sub(1) / PAGE_SIZE + 1
    }

    /// 0-based step indices shown for the selected page.
    pub fn visible_range(&self) -> Range<usize> {
        let start = self.selected_page.saturating_sub(1) * PAGE_SIZE;
        let end = (start + PAGE_SIZE).min(self.step_count);
        start.min(end)..end
    }

    /// Whether a 0-based index starts a beat under the current subdivision.
    pub fn is_beat_start(&self, index: usize) -> bool {
        self.subdivision == 0 || index % self.subdivision as usize == 0
    }

    pub fn apply(&self, command: Command) -> Result<Self> {
        let mut next = self.clone();
        match command {
            Command::Play => next.is_playing = true,
            Command::Pause => {
                next.is_playing = false;
                next.step = 1;
            }
            Command::TogglePlay => {
                let toggled = if self.is_playing {
                    Command::Pause
                } else {
                    Command::Play
                };
                return self.apply(toggled);
            }
            Command::AdvanceStep => {
                if self.is_playing {
                    next.step = if self.step >= self.step_count {
                        1
                    } else {
                        self.step + 1
                    };
                }
            }
            Command::SetBpm(bpm) => next.bpm = bpm,
            Command::SetSubdivision(subdivision) => next.subdivision = subdivision,
            Command::SetStepCount(count) => {
                if count == 0 || count % PAGE_SIZE != 0 {
                    return Err(SequencerError::InvalidStepCount(count));
                }
                for row in &mut next.instruments {
                    row.sequence.resize(count);
                }
                next.step_count = count;
                next.step = 1;
                next.selected_page = 1;
            }
            Command::ToggleStepAt { instrument, index } => {
                let row = next
                    .instruments
                    .iter_mut()
                    .find(|row| row.id == instrument)
                    .ok_or(SequencerError::UnknownInstrument(instrument))?;
                row.sequence.toggle(index)?;
            }
            Command::SetSelectedPage(page) => next.selected_page = page,
        }
        Ok(next)
    }
}

/// `(60000 / bpm) / subdivision`.
pub fn interval_ms(bpm: f64, subdivision: u32) -> f64 {
    (60_000.0 / bpm) / subdivision as f64
}
