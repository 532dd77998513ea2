/// Per-instrument step sequence and the resize rules applied when the
/// global step count changes.
use serde::{Deserialize, Serialize};

use crate::error::{Result, SequencerError};

/// Steps per page. Patterns grow and shrink in whole pages.
pub const PAGE_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    steps: Vec<bool>,
}

impl Sequence {
    /// An all-inactive sequence of `len` steps.
    pub fn new(len: usize) -> Self {
        Self {
            steps: vec![false; len],
        }
    }

    pub fn from_steps(steps: Vec<bool>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[bool] {
        &self.steps
    }

    /// Value at a 0-based index; out of range reads as inactive.
    pub fn get(&self, index: usize) -> bool {
        self.steps.get(index).copied().unwrap_or(false)
    }

    /// Value at a 1-based step.
    pub fn is_active_at(&self, step: usize) -> bool {
        step >= 1 && self.get(step - 1)
    }

    pub fn toggle(&mut self, index: usize) -> Result<()> {
        let len = self.steps.len();
        let cell = self
            .steps
            .get_mut(index)
            .ok_or(SequencerError::StepOutOfRange { index, len })?;
        *cell = !*cell;
        Ok(())
    }

    pub fn active_count(&self) -> usize {
        self.steps.iter().filter(|s| **s).count()
    }

    /// Resize to `new_len` steps.
    ///
    /// Shrinking keeps the first `new_len` steps. Growing appends copies of
    /// the first page (steps 1-16), one per added page, so a 32-step pattern
    /// grown to 48 gets page 1 copied into page 3, not page 2.
    pub fn resize(&mut self, new_len: usize) {
        let old_len = self.steps.len();
        if new_len <= old_len {
            self.steps.truncate(new_len);
            return;
        }

        let motif: Vec<bool> = self.steps.iter().copied().take(PAGE_SIZE).collect();
        let repeats = new_len / PAGE_SIZE - old_len / PAGE_SIZE;
        for _ in 0..repeats {
            self.steps.extend_from_slice(&motif);
        }
        // Only reachable with lengths that are not whole pages.
        self.steps.resize(new_len, false);
    }
}
