/// Single-threaded sequencer engine.
///
/// Owns the state, the instrument rack and the clock. Commands are applied in
/// the order they are sent; `poll` is one scheduler turn.
use crate::error::Result;
use crate::sequencer::clock::{Clock, SystemTime, TimeSource};
use crate::sequencer::dispatch::{dispatch, DispatchReport, InstrumentRack};
use crate::sequencer::{Command, SequencerState};

pub struct Engine<T = SystemTime> {
    state: SequencerState,
    rack: InstrumentRack,
    clock: Clock,
    time: T,
}

impl<T: TimeSource> Engine<T> {
    pub fn new(rack: InstrumentRack, time: T) -> Result<Self> {
        let state = rack.initial_state()?;
        let clock = Clock::new(state.interval_ms());
        Ok(Self {
            state,
            rack,
            clock,
            time,
        })
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn rack(&self) -> &InstrumentRack {
        &self.rack
    }

    pub fn interval_ms(&self) -> f64 {
        self.clock.interval_ms()
    }

    /// Apply one command. On error the state is unchanged.
    ///
    /// `AdvanceStep` while playing goes through the same path as a clock
    /// fire, so the step under the playhead sounds before it moves; the
    /// report of that step is returned.
    pub fn send(&mut self, command: Command) -> Result<Option<DispatchReport>> {
        tracing::debug!(?command, "applying command");
        if command == Command::AdvanceStep && self.state.is_playing() {
            return self.play_step().map(Some);
        }
        let next = self.state.apply(command)?;
        if next.bpm() != self.state.bpm() || next.subdivision() != self.state.subdivision() {
            self.clock.set_interval_ms(next.interval_ms());
            tracing::debug!(interval_ms = next.interval_ms(), "step interval changed");
        }
        self.state = next;
        Ok(None)
    }

    /// Observe the time source once. When a step is due while playing, the
    /// step under the playhead is dispatched and the playhead advances.
    pub fn poll(&mut self) -> Result<Option<DispatchReport>> {
        let now = self.time.now_ms();
        if !self.clock.tick(now, !self.state.is_playing()) {
            return Ok(None);
        }
        self.play_step().map(Some)
    }

    fn play_step(&mut self) -> Result<DispatchReport> {
        let report = dispatch(&self.state, &self.rack);
        self.state = self.state.apply(Command::AdvanceStep)?;
        tracing::trace!(played = report.step, next = self.state.step(), "step advanced");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SamplerError;
    use crate::sequencer::clock::ManualTime;
    use crate::sequencer::InstrumentId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn engine(hits: &Arc<AtomicUsize>) -> (Engine<ManualTime>, ManualTime) {
        let hits = Arc::clone(hits);
        let mut rack = InstrumentRack::new();
        rack.add("kick", "KICK", move || -> std::result::Result<(), SamplerError> {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        let time = ManualTime::new();
        let engine = Engine::new(rack, time.clone()).unwrap();
        (engine, time)
    }

    #[test]
    fn test_interval_follows_bpm_and_subdivision() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (mut engine, _) = engine(&hits);
        assert_eq!(engine.interval_ms(), 125.0);
        engine.send(Command::SetBpm(60.0)).unwrap();
        assert_eq!(engine.interval_ms(), 250.0);
        engine.send(Command::SetSubdivision(2)).unwrap();
        assert_eq!(engine.interval_ms(), 500.0);
    }

    #[test]
    fn test_rejected_command_keeps_state() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (mut engine, _) = engine(&hits);
        let before = engine.state().clone();
        assert!(engine
            .send(Command::ToggleStepAt {
                instrument: InstrumentId::from("tom"),
                index: 0,
            })
            .is_err());
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn test_every_step_of_all_on_pattern_plays_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (mut engine, time) = engine(&hits);
        for index in 0..16 {
            engine
                .send(Command::ToggleStepAt {
                    instrument: InstrumentId::from("kick"),
                    index,
                })
                .unwrap();
        }
        engine.poll().unwrap();
        engine.send(Command::Play).unwrap();

        for _ in 0..32 {
            time.advance(124.0);
            assert!(engine.poll().unwrap().is_none());
            time.advance(1.0);
            assert!(engine.poll().unwrap().is_some());
        }
        assert_eq!(hits.load(Ordering::SeqCst), 32);
        assert_eq!(engine.state().step(), 1);
    }

    #[test]
    fn test_advance_command_plays_each_step() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (mut engine, _) = engine(&hits);
        for index in 0..16 {
            engine
                .send(Command::ToggleStepAt {
                    instrument: InstrumentId::from("kick"),
                    index,
                })
                .unwrap();
        }
        engine.send(Command::Play).unwrap();

        for played in 1..=4 {
            let report = engine.send(Command::AdvanceStep).unwrap().expect("step played");
            assert_eq!(report.step, played);
            assert_eq!(report.triggered, vec![InstrumentId::from("kick")]);
        }
        assert_eq!(engine.state().step(), 5);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_advance_command_ignored_while_stopped() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (mut engine, _) = engine(&hits);
        engine
            .send(Command::ToggleStepAt {
                instrument: InstrumentId::from("kick"),
                index: 0,
            })
            .unwrap();
        assert!(engine.send(Command::AdvanceStep).unwrap().is_none());
        assert_eq!(engine.state().step(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stopped_engine_never_advances() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (mut engine, time) = engine(&hits);
        engine
            .send(Command::ToggleStepAt {
                instrument: InstrumentId::from("kick"),
                index: 0,
            })
            .unwrap();
        for _ in 0..10 {
            engine.poll().unwrap();
            time.advance(500.0);
        }
        assert_eq!(engine.state().step(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
