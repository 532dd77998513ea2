/// Playback engine - runs the sequencer engine on its own loop thread.
///
/// Every command and every clock turn is handled by that one thread, in the
/// order received. The view sends commands and polls events.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Result, SequencerError};
use crate::sequencer::clock::TimeSource;
use crate::sequencer::dispatch::DispatchReport;
use crate::sequencer::engine::Engine;
use crate::sequencer::{Command, InstrumentId, SequencerState};

/// How long the loop yields between turns.
const TURN: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// Snapshot after any change, for rendering.
    StateChanged(SequencerState),
    /// A step (1-based) was played, whether or not anything sounded on it.
    StepPlayed(usize),
    /// Instruments played on a step (1-based).
    Triggered { step: usize, instruments: Vec<InstrumentId> },
    CommandRejected(String),
}

pub struct PlaybackEngine {
    commands: Option<Sender<Command>>,
    sender: Sender<PlaybackEvent>,
    receiver: Receiver<PlaybackEvent>,
    is_running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    pub fn new() -> Self {
        let (sender, receiver) = channel();

        Self {
            commands: None,
            sender,
            receiver,
            is_running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Move `engine` onto the loop thread. Does nothing if already running.
    pub fn start<T>(&mut self, mut engine: Engine<T>)
    where
        T: TimeSource + Send + 'static,
    {
        if self.is_running() {
            return;
        }

        self.is_running.store(true, Ordering::SeqCst);

        let (command_tx, command_rx) = channel::<Command>();
        self.commands = Some(command_tx);
        let is_running = Arc::clone(&self.is_running);
        let sender = self.sender.clone();

        let _ = sender.send(PlaybackEvent::StateChanged(engine.state().clone()));
        tracing::info!(
            instruments = engine.rack().len(),
            interval_ms = engine.interval_ms(),
            "playback loop started"
        );

        self.worker = Some(thread::spawn(move || {
            while is_running.load(Ordering::SeqCst) {
                loop {
                    match command_rx.try_recv() {
                        Ok(command) => {
                            match engine.send(command) {
                                Ok(report) => {
                                    if let Some(report) = report {
                                        emit_step(&sender, report);
                                    }
                                    let _ = sender
                                        .send(PlaybackEvent::StateChanged(engine.state().clone()));
                                }
                                Err(err) => {
                                    tracing::warn!(error = %err, "command rejected");
                                    let _ = sender
                                        .send(PlaybackEvent::CommandRejected(err.to_string()));
                                }
                            }
                        }
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => return,
                    }
                }

                match engine.poll() {
                    Ok(Some(report)) => {
                        emit_step(&sender, report);
                        let _ = sender.send(PlaybackEvent::StateChanged(engine.state().clone()));
                    }
                    Ok(None) => {}
                    Err(err) => tracing::error!(error = %err, "step advance failed"),
                }

                thread::sleep(TURN);
            }
        }));
    }

    pub fn send(&self, command: Command) -> Result<()> {
        if !self.is_running() {
            return Err(SequencerError::EngineStopped);
        }
        self.commands
            .as_ref()
            .ok_or(SequencerError::EngineStopped)?
            .send(command)
            .map_err(|_| SequencerError::EngineStopped)
    }

    /// Halt the loop and wait for it, so no step fires after this returns.
    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
        self.commands = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("playback loop panicked");
            }
            tracing::info!("playback loop stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn poll_events(&self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

fn emit_step(sender: &Sender<PlaybackEvent>, report: DispatchReport) {
    let _ = sender.send(PlaybackEvent::StepPlayed(report.step));
    if !report.triggered.is_empty() {
        let _ = sender.send(PlaybackEvent::Triggered {
            step: report.step,
            instruments: report.triggered,
        });
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
