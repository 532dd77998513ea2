use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::Voice;
use crate::controls::{validate_bpm, StepCount, Subdivision};
use crate::error::Result;
use crate::sequencer::{Command, InstrumentId};

/// Startup configuration for a session. Patterns themselves are not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub bpm: f64,
    pub subdivision: Subdivision,
    pub step_count: StepCount,
    pub instruments: Vec<InstrumentConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub id: InstrumentId,
    pub label: String,
    pub voice: Voice,
    /// General MIDI drum note.
    pub midi_note: u8,
}

impl InstrumentConfig {
    pub fn new(id: &str, label: &str, voice: Voice, midi_note: u8) -> Self {
        Self {
            id: InstrumentId::from(id),
            label: label.to_string(),
            voice,
            midi_note,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            subdivision: Subdivision::Sixteenth,
            step_count: StepCount::Sixteen,
            instruments: vec![
                InstrumentConfig::new("kick", "KICK", Voice::Kick, 36),
                InstrumentConfig::new("snare", "SNARE", Voice::Snare, 38),
                InstrumentConfig::new("hat", "HAT", Voice::Hat, 42),
            ],
        }
    }
}

impl SessionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded session config");
        Ok(config)
    }

    /// Commands that take a fresh state to this configuration's transport
    /// settings.
    pub fn initial_commands(&self) -> Result<Vec<Command>> {
        Ok(vec![
            Command::SetBpm(validate_bpm(self.bpm)?),
            self.subdivision.into(),
            self.step_count.into(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SequencerError;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.instruments.len(), 3);
        assert_eq!(
            config.initial_commands().unwrap(),
            vec![
                Command::SetBpm(120.0),
                Command::SetSubdivision(4),
                Command::SetStepCount(16)
            ]
        );
    }

    #[test]
    fn test_parse_partial_json() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "bpm": 96, "subdivision": 3, "step_count": 32 }"#).unwrap();
        assert_eq!(config.bpm, 96.0);
        assert_eq!(config.subdivision, Subdivision::EighthTriplet);
        assert_eq!(config.step_count, StepCount::ThirtyTwo);
        assert_eq!(config.instruments, SessionConfig::default().instruments);
    }

    #[test]
    fn test_parse_instruments() {
        let config: SessionConfig = serde_json::from_str(
            r#"{ "instruments": [ { "id": "rim", "label": "RIM", "voice": "rim", "midi_note": 37 } ] }"#,
        )
        .unwrap();
        assert_eq!(config.instruments[0].id, InstrumentId::from("rim"));
        assert_eq!(config.instruments[0].voice, Voice::Rim);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(serde_json::from_str::<SessionConfig>(r#"{ "step_count": 20 }"#).is_err());
        assert!(serde_json::from_str::<SessionConfig>(r#"{ "subdivision": 5 }"#).is_err());
        let config = SessionConfig {
            bpm: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.initial_commands(),
            Err(SequencerError::InvalidBpm(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            SessionConfig::load("/nonexistent/stepgrid.json"),
            Err(SequencerError::Io(_))
        ));
    }
}
