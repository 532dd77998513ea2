/// Stdin-driven front end: one command per line.
use std::io::BufRead;
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use stepgrid::{parse_command, MidiOutputDevice, PlaybackEvent, Result, SequencerState};

use crate::session::Session;

const HELP: &str = "commands: play | pause | stop | toggle | bpm N | subdivision N | steps N \
                    | page N | toggle-step ID INDEX | status | ports | midi PORT | midi off | quit";

pub fn run(mut session: Session) -> Result<()> {
    let (line_tx, line_rx) = channel::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to read stdin");
                    break;
                }
            }
        }
    });

    println!("{HELP}");
    if !session.audio_connected() {
        println!("no audio device; voices are silent");
    }
    let mut state: Option<SequencerState> = None;

    loop {
        for event in session.playback.poll_events() {
            match event {
                PlaybackEvent::StateChanged(next) => state = Some(next),
                PlaybackEvent::StepPlayed(step) => tracing::trace!(step, "step played"),
                PlaybackEvent::Triggered { step, instruments } => {
                    let names: Vec<&str> = instruments.iter().map(|id| id.as_str()).collect();
                    tracing::info!(step, instruments = ?names, "hit");
                }
                PlaybackEvent::CommandRejected(reason) => println!("rejected: {reason}"),
            }
        }

        let line = match line_rx.recv_timeout(Duration::from_millis(10)) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let line = line.trim();
        let mut words = line.split_whitespace();

        match (words.next(), words.next()) {
            (None, _) => {}
            (Some("quit" | "exit"), _) => break,
            (Some("help"), _) => println!("{HELP}"),
            (Some("status"), _) => match &state {
                Some(state) => println!("{}", serde_json::to_string_pretty(state)?),
                None => println!("no state yet"),
            },
            (Some("ports"), _) => {
                for (i, name) in MidiOutputDevice::available_ports().iter().enumerate() {
                    println!("{i}: {name}");
                }
            }
            (Some("midi"), Some("off")) => {
                session.disconnect_midi();
                println!("MIDI output disconnected");
            }
            (Some("midi"), Some(port)) => match port.parse::<usize>() {
                Ok(port) => {
                    let mut midi = session.midi.lock().unwrap_or_else(|e| e.into_inner());
                    match midi.connect(port) {
                        Ok(()) => println!("connected to MIDI port {port}"),
                        Err(err) => println!("error: {err}"),
                    }
                }
                Err(_) => println!("error: bad port `{port}`"),
            },
            _ => {
                let Some(current) = &state else {
                    println!("no state yet");
                    continue;
                };
                match parse_command(line, current).and_then(|c| session.playback.send(c)) {
                    Ok(()) => {}
                    Err(err) => println!("error: {err}"),
                }
            }
        }
    }

    session.playback.stop();
    Ok(())
}
