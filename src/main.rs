use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use stepgrid::{Result, SessionConfig, StepCount, Subdivision};

#[cfg(feature = "gui")]
mod gui;
mod headless;
mod session;

use session::Session;

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let session = Session::open(&config, cli.midi_port, cli.midi_channel)?;

    run(session, cli.headless)
}

#[cfg(feature = "gui")]
fn run(session: Session, headless: bool) -> Result<()> {
    if headless {
        headless::run(session)
    } else {
        gui::run(session)
    }
}

#[cfg(not(feature = "gui"))]
fn run(session: Session, _headless: bool) -> Result<()> {
    headless::run(session)
}

fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(bpm) = cli.bpm {
        config.bpm = stepgrid::validate_bpm(bpm)?;
    }
    if let Some(subdivision) = cli.subdivision {
        config.subdivision = Subdivision::try_from(subdivision)?;
    }
    if let Some(steps) = cli.steps {
        config.step_count = StepCount::try_from(steps)?;
    }
    tracing::info!(
        bpm = config.bpm,
        subdivision = %config.subdivision,
        steps = config.step_count.steps(),
        instruments = config.instruments.len(),
        "session configured"
    );
    Ok(config)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Grid step sequencer", long_about = None)]
struct Cli {
    /// JSON session config (tempo, step length, instruments).
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    bpm: Option<f64>,
    /// Steps per quarter note: 2, 3, 4, 6 or 8.
    #[arg(long)]
    subdivision: Option<u32>,
    /// Pattern length: 16, 32, 48 or 64.
    #[arg(long)]
    steps: Option<usize>,
    /// MIDI output port index to connect on startup.
    #[arg(long)]
    midi_port: Option<usize>,
    /// MIDI channel, 1-16.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u8).range(1..=16))]
    midi_channel: u8,
    /// Read commands from stdin instead of opening a window.
    #[arg(long)]
    headless: bool,
}
