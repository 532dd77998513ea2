/// Input validation for values coming from the view.
///
/// The core accepts any BPM, subdivision or page. This layer is where user
/// input gets clamped or rejected before it becomes a [`Command`].
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SequencerError};
use crate::sequencer::{Command, InstrumentId, SequencerState};

pub const BPM_RANGE: RangeInclusive<f64> = 40.0..=240.0;

/// Step length as a division of a quarter note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Subdivision {
    Eighth,
    EighthTriplet,
    #[default]
    Sixteenth,
    SixteenthTriplet,
    ThirtySecond,
}

impl Subdivision {
    pub const ALL: [Subdivision; 5] = [
        Subdivision::Eighth,
        Subdivision::EighthTriplet,
        Subdivision::Sixteenth,
        Subdivision::SixteenthTriplet,
        Subdivision::ThirtySecond,
    ];

    pub fn divisor(self) -> u32 {
        match self {
            Subdivision::Eighth => 2,
            Subdivision::EighthTriplet => 3,
            Subdivision::Sixteenth => 4,
            Subdivision::SixteenthTriplet => 6,
            Subdivision::ThirtySecond => 8,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Subdivision::Eighth => "1/8",
            Subdivision::EighthTriplet => "1/8T",
            Subdivision::Sixteenth => "1/16",
            Subdivision::SixteenthTriplet => "1/16T",
            Subdivision::ThirtySecond => "1/32",
        }
    }
}

impl fmt::Display for Subdivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<u32> for Subdivision {
    type Error = SequencerError;

    fn try_from(value: u32) -> Result<Self> {
        Subdivision::ALL
            .into_iter()
            .find(|s| s.divisor() == value)
            .ok_or(SequencerError::InvalidSubdivision(value))
    }
}

impl From<Subdivision> for u32 {
    fn from(value: Subdivision) -> Self {
        value.divisor()
    }
}

impl From<Subdivision> for Command {
    fn from(value: Subdivision) -> Self {
        Command::SetSubdivision(value.divisor())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum StepCount {
    #[default]
    Sixteen,
    ThirtyTwo,
    FortyEight,
    SixtyFour,
}

impl StepCount {
    pub const ALL: [StepCount; 4] = [
        StepCount::Sixteen,
        StepCount::ThirtyTwo,
        StepCount::FortyEight,
        StepCount::SixtyFour,
    ];

    pub fn steps(self) -> usize {
        match self {
            StepCount::Sixteen => 16,
            StepCount::ThirtyTwo => 32,
            StepCount::FortyEight => 48,
            StepCount::SixtyFour => 64,
        }
    }
}

impl TryFrom<usize> for StepCount {
    type Error = SequencerError;

    fn try_from(value: usize) -> Result<Self> {
        StepCount::ALL
            .into_iter()
            .find(|s| s.steps() == value)
            .ok_or(SequencerError::InvalidStepCount(value))
    }
}

impl From<StepCount> for usize {
    fn from(value: StepCount) -> Self {
        value.steps()
    }
}

impl From<StepCount> for Command {
    fn from(value: StepCount) -> Self {
        Command::SetStepCount(value.steps())
    }
}

/// Rejects non-finite or non-positive input and clamps the rest into
/// [`BPM_RANGE`].
pub fn validate_bpm(bpm: f64) -> Result<f64> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(SequencerError::InvalidBpm(bpm));
    }
    Ok(bpm.clamp(*BPM_RANGE.start(), *BPM_RANGE.end()))
}

pub fn validate_page(page: usize, state: &SequencerState) -> Result<usize> {
    let page_count = state.page_count();
    if page == 0 || page > page_count {
        return Err(SequencerError::InvalidPage { page, page_count });
    }
    Ok(page)
}

/// Parse one line of textual input into a validated command.
///
/// ```text
/// play | pause | stop | toggle
/// bpm <n> | subdivision <n> | steps <n> | page <n>
/// toggle-step <instrument> <index>
/// ```
pub fn parse_command(line: &str, state: &SequencerState) -> Result<Command> {
    let mut words = line.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();
    let unknown = || SequencerError::UnknownCommand(line.trim().to_string());

    let command = match (name, args.as_slice()) {
        ("play", []) => Command::Play,
        ("pause" | "stop", []) => Command::Pause,
        ("toggle", []) => Command::TogglePlay,
        ("bpm", [value]) => {
            let bpm = value.parse::<f64>().map_err(|_| unknown())?;
            Command::SetBpm(validate_bpm(bpm)?)
        }
        ("subdivision", [value]) => {
            let value = value.parse::<u32>().map_err(|_| unknown())?;
            Subdivision::try_from(value)?.into()
        }
        ("steps", [value]) => {
            let value = value.parse::<usize>().map_err(|_| unknown())?;
            StepCount::try_from(value)?.into()
        }
        ("page", [value]) => {
            let page = value.parse::<usize>().map_err(|_| unknown())?;
            Command::SetSelectedPage(validate_page(page, state)?)
        }
        ("toggle-step", [instrument, index]) => {
            let instrument = InstrumentId::from(*instrument);
            if state.instrument(&instrument).is_none() {
                return Err(SequencerError::UnknownInstrument(instrument));
            }
            let index = index.parse::<usize>().map_err(|_| unknown())?;
            Command::ToggleStepAt { instrument, index }
        }
        _ => return Err(unknown()),
    };
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SequencerState {
        SequencerState::new([(InstrumentId::from("kick"), "KICK")]).unwrap()
    }

    #[test]
    fn test_subdivision_values() {
        let divisors: Vec<u32> = Subdivision::ALL.iter().map(|s| s.divisor()).collect();
        assert_eq!(divisors, vec![2, 3, 4, 6, 8]);
        assert_eq!(Subdivision::try_from(6).unwrap(), Subdivision::SixteenthTriplet);
        assert!(matches!(
            Subdivision::try_from(5),
            Err(SequencerError::InvalidSubdivision(5))
        ));
        assert_eq!(Subdivision::EighthTriplet.to_string(), "1/8T");
    }

    #[test]
    fn test_step_count_values() {
        assert_eq!(StepCount::try_from(48).unwrap(), StepCount::FortyEight);
        assert!(StepCount::try_from(80).is_err());
        assert_eq!(Command::from(StepCount::SixtyFour), Command::SetStepCount(64));
    }

    #[test]
    fn test_defaults_match_initial_state() {
        let state = state();
        assert_eq!(Subdivision::default().divisor(), state.subdivision());
        assert_eq!(StepCount::default().steps(), state.step_count());
    }

    #[test]
    fn test_bpm_validation() {
        assert!(validate_bpm(0.0).is_err());
        assert!(validate_bpm(-90.0).is_err());
        assert!(validate_bpm(f64::NAN).is_err());
        assert!(validate_bpm(f64::INFINITY).is_err());
        assert_eq!(validate_bpm(10.0).unwrap(), 40.0);
        assert_eq!(validate_bpm(999.0).unwrap(), 240.0);
        assert_eq!(validate_bpm(128.0).unwrap(), 128.0);
    }

    #[test]
    fn test_page_validation() {
        let s = state().apply(Command::SetStepCount(32)).unwrap();
        assert_eq!(validate_page(2, &s).unwrap(), 2);
        assert!(validate_page(0, &s).is_err());
        assert!(validate_page(3, &s).is_err());
    }

    #[test]
    fn test_parse_commands() {
        let s = state();
        assert_eq!(parse_command("play", &s).unwrap(), Command::Play);
        assert_eq!(parse_command("  stop ", &s).unwrap(), Command::Pause);
        assert_eq!(parse_command("bpm 140", &s).unwrap(), Command::SetBpm(140.0));
        assert_eq!(
            parse_command("subdivision 3", &s).unwrap(),
            Command::SetSubdivision(3)
        );
        assert_eq!(parse_command("steps 32", &s).unwrap(), Command::SetStepCount(32));
        assert_eq!(
            parse_command("toggle-step kick 4", &s).unwrap(),
            Command::ToggleStepAt {
                instrument: InstrumentId::from("kick"),
                index: 4
            }
        );
    }

    #[test]
    fn test_parse_rejects() {
        let s = state();
        assert!(matches!(
            parse_command("rewind", &s),
            Err(SequencerError::UnknownCommand(_))
        ));
        assert!(matches!(
            parse_command("bpm fast", &s),
            Err(SequencerError::UnknownCommand(_))
        ));
        assert!(matches!(
            parse_command("bpm 0", &s),
            Err(SequencerError::InvalidBpm(_))
        ));
        assert!(matches!(
            parse_command("page 2", &s),
            Err(SequencerError::InvalidPage { page: 2, page_count: 1 })
        ));
        assert!(matches!(
            parse_command("toggle-step cowbell 0", &s),
            Err(SequencerError::UnknownInstrument(_))
        ));
        assert!(matches!(parse_command("", &s), Err(SequencerError::UnknownCommand(_))));
    }
}
