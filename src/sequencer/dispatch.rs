/// Trigger dispatch - plays every instrument active on the current step.
use crate::error::{Result, SamplerError, SequencerError};
use crate::sequencer::{InstrumentId, SequencerState};

/// Something that can play an instrument's sound.
///
/// `trigger` may be called again before the previous sound has finished.
pub trait Sampler: Send {
    fn trigger(&self) -> std::result::Result<(), SamplerError>;
}

impl<F> Sampler for F
where
    F: Fn() -> std::result::Result<(), SamplerError> + Send,
{
    fn trigger(&self) -> std::result::Result<(), SamplerError> {
        self()
    }
}

struct RackSlot {
    id: InstrumentId,
    label: String,
    sampler: Box<dyn Sampler>,
}

/// The fixed instrument set: id, label and sampler, in display order.
#[derive(Default)]
pub struct InstrumentRack {
    slots: Vec<RackSlot>,
}

impl InstrumentRack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        id: impl Into<InstrumentId>,
        label: impl Into<String>,
        sampler: impl Sampler + 'static,
    ) -> Result<()> {
        let id = id.into();
        if self.slots.iter().any(|slot| slot.id == id) {
            return Err(SequencerError::DuplicateInstrument(id));
        }
        self.slots.push(RackSlot {
            id,
            label: label.into(),
            sampler: Box::new(sampler),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn sampler(&self, id: &InstrumentId) -> Option<&dyn Sampler> {
        self.slots
            .iter()
            .find(|slot| &slot.id == id)
            .map(|slot| slot.sampler.as_ref())
    }

    /// Initial state with one empty row per slot, in rack order.
    pub fn initial_state(&self) -> Result<SequencerState> {
        SequencerState::new(
            self.slots
                .iter()
                .map(|slot| (slot.id.clone(), slot.label.clone())),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub step: usize,
    pub triggered: Vec<InstrumentId>,
    pub failed: Vec<(InstrumentId, SamplerError)>,
}

impl DispatchReport {
    pub fn is_empty(&self) -> bool {
        self.triggered.is_empty() && self.failed.is_empty()
    }
}

/// Trigger each instrument whose sequence is active at the current step.
///
/// Nothing is played while stopped. A failing sampler is logged and recorded
/// but does not stop the remaining instruments from playing.
pub fn dispatch(state: &SequencerState, rack: &InstrumentRack) -> DispatchReport {
    let step = state.step();
    let mut report = DispatchReport {
        step,
        ..Default::default()
    };
    if !state.is_playing() {
        return report;
    }

    for row in state.instruments() {
        if !row.sequence.is_active_at(step) {
            continue;
        }
        let Some(sampler) = rack.sampler(&row.id) else {
            tracing::warn!(instrument = %row.id, "no sampler registered");
            continue;
        };
        match sampler.trigger() {
            Ok(()) => report.triggered.push(row.id.clone()),
            Err(err) => {
                tracing::warn!(instrument = %row.id, step, error = %err, "sampler trigger failed");
                report.failed.push((row.id.clone(), err));
            }
        }
    }
    report
}
