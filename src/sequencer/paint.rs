/// Drag-to-paint over the step grid.
///
/// Pressing on a cell toggles it; while still pressed, each cell the pointer
/// enters is toggled once. Staying inside a cell, or moving while released,
/// toggles nothing.
use crate::sequencer::{Command, InstrumentId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub instrument: InstrumentId,
    pub index: usize,
}

impl Cell {
    pub fn new(instrument: impl Into<InstrumentId>, index: usize) -> Self {
        Self {
            instrument: instrument.into(),
            index,
        }
    }

    fn toggle(&self) -> Command {
        Command::ToggleStepAt {
            instrument: self.instrument.clone(),
            index: self.index,
        }
    }
}

/// What the primary button is doing, as far as the grid is concerned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Press {
    #[default]
    Released,
    /// Pressed on a cell; entered cells are toggled.
    Painting,
    /// Pressed somewhere off the grid. Nothing paints until release.
    HeldElsewhere,
}

#[derive(Debug, Default)]
pub struct PaintGesture {
    press: Press,
    current: Option<Cell>,
}

impl PaintGesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, cell: Cell) -> Option<Command> {
        self.press = Press::Painting;
        let command = cell.toggle();
        self.current = Some(cell);
        Some(command)
    }

    pub fn enter(&mut self, cell: Cell) -> Option<Command> {
        if self.current.as_ref() == Some(&cell) {
            return None;
        }
        let command = (self.press == Press::Painting).then(|| cell.toggle());
        self.current = Some(cell);
        command
    }

    pub fn leave(&mut self) {
        self.current = None;
    }

    pub fn release(&mut self) {
        self.press = Press::Released;
    }

    /// Feed the hovered cell and button state once per frame, for hosts that
    /// only expose polled pointer state.
    pub fn update(&mut self, hovered: Option<Cell>, down: bool) -> Option<Command> {
        if !down {
            self.release();
            match hovered {
                Some(cell) => {
                    self.enter(cell);
                }
                None => self.leave(),
            }
            return None;
        }

        match (self.press, hovered) {
            (Press::Released, Some(cell)) => self.press(cell),
            (Press::Released, None) => {
                self.press = Press::HeldElsewhere;
                self.leave();
                None
            }
            (_, Some(cell)) => self.enter(cell),
            (_, None) => {
                self.leave();
                None
            }
        }
    }
}
