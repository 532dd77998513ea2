use eframe::egui;

use stepgrid::{
    Cell, Command, MidiOutputDevice, PaintGesture, PlaybackEvent, Result, SequencerError,
    SequencerState, StepCount, Subdivision,
};
use stepgrid::sequencer::PAGE_SIZE;

use crate::session::Session;

const CELL_SIZE: f32 = 36.0;
const CELL_GAP: f32 = 2.0;
const LABEL_WIDTH: f32 = 64.0;

pub fn run(session: Session) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([720.0, 360.0])
            .with_title("STEPGRID - Step Sequencer"),
        ..Default::default()
    };

    eframe::run_native(
        "STEPGRID",
        options,
        Box::new(|_cc| Ok(Box::new(SequencerApp::new(session)))),
    )
    .map_err(|e| SequencerError::Gui(e.to_string()))
}

struct SequencerApp {
    session: Session,
    state: Option<SequencerState>,
    /// Step (1-based) that sounded last, shown as the playhead.
    playing_step: Option<usize>,
    gesture: PaintGesture,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    status: Option<String>,
}

impl SequencerApp {
    fn new(session: Session) -> Self {
        Self {
            session,
            state: None,
            playing_step: None,
            gesture: PaintGesture::new(),
            available_midi_ports: MidiOutputDevice::available_ports(),
            selected_port: None,
            status: None,
        }
    }

    fn handle_playback_events(&mut self) {
        for event in self.session.playback.poll_events() {
            match event {
                PlaybackEvent::StateChanged(state) => {
                    if !state.is_playing() {
                        self.playing_step = None;
                    }
                    self.state = Some(state);
                }
                PlaybackEvent::StepPlayed(step) => self.playing_step = Some(step),
                PlaybackEvent::Triggered { .. } => {}
                PlaybackEvent::CommandRejected(reason) => self.status = Some(reason),
            }
        }
    }

    fn send(&mut self, command: Command) {
        if let Err(err) = self.session.playback.send(command) {
            self.status = Some(err.to_string());
        }
    }

    fn midi_port_row(&mut self, ui: &mut egui::Ui) {
        let mut selected_port_changed = None;
        let mut disconnect = false;
        ui.horizontal(|ui| {
            ui.label("MIDI Output:");
            if self.available_midi_ports.is_empty() {
                ui.label("No MIDI ports available");
            } else {
                egui::ComboBox::from_id_source("midi_port")
                    .selected_text(
                        self.selected_port
                            .and_then(|i| self.available_midi_ports.get(i))
                            .map(String::as_str)
                            .unwrap_or("Select port..."),
                    )
                    .show_ui(ui, |ui| {
                        for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                            if ui
                                .selectable_label(self.selected_port == Some(i), port_name)
                                .clicked()
                            {
                                selected_port_changed = Some(i);
                            }
                        }
                    });
                if self.selected_port.is_some() && ui.button("Disconnect").clicked() {
                    disconnect = true;
                }
            }
        });

        if disconnect {
            self.session.disconnect_midi();
            self.selected_port = None;
        }

        if let Some(port_idx) = selected_port_changed {
            let mut midi = self.session.midi.lock().unwrap_or_else(|e| e.into_inner());
            match midi.connect(port_idx) {
                Ok(()) => self.selected_port = Some(port_idx),
                Err(err) => self.status = Some(err.to_string()),
            }
        }
    }

    fn transport_row(&mut self, ui: &mut egui::Ui, state: &SequencerState) {
        let mut commands = Vec::new();
        ui.horizontal(|ui| {
            let label = if state.is_playing() { "⏸ Stop" } else { "▶ Play" };
            if ui.button(label).clicked() {
                commands.push(Command::TogglePlay);
            }

            ui.add_space(20.0);

            ui.label("BPM:");
            let mut bpm = state.bpm();
            if ui
                .add(egui::Slider::new(&mut bpm, stepgrid::controls::BPM_RANGE).step_by(1.0))
                .changed()
            {
                if let Ok(bpm) = stepgrid::validate_bpm(bpm) {
                    commands.push(Command::SetBpm(bpm));
                }
            }

            ui.add_space(20.0);

            ui.label("Step:");
            let current = Subdivision::try_from(state.subdivision()).ok();
            egui::ComboBox::from_id_source("step_length")
                .selected_text(current.map_or("?", Subdivision::label))
                .show_ui(ui, |ui| {
                    for subdivision in Subdivision::ALL {
                        if ui
                            .selectable_label(current == Some(subdivision), subdivision.label())
                            .clicked()
                        {
                            commands.push(subdivision.into());
                        }
                    }
                });

            ui.label("Length:");
            egui::ComboBox::from_id_source("step_count")
                .selected_text(state.step_count().to_string())
                .show_ui(ui, |ui| {
                    for count in StepCount::ALL {
                        if ui
                            .selectable_label(state.step_count() == count.steps(), count.steps().to_string())
                            .clicked()
                        {
                            commands.push(count.into());
                        }
                    }
                });
        });

        ui.horizontal(|ui| {
            match self.playing_step {
                Some(step) => ui.label(format!("Step {step}")),
                None => ui.label("Step -"),
            };
            ui.add_space(20.0);
            ui.label("Page:");
            for page in 1..=state.page_count() {
                let playing_here = self
                    .playing_step
                    .is_some_and(|step| state.page_of(step) == page);
                let text = if playing_here {
                    format!("● {page}")
                } else {
                    page.to_string()
                };
                if ui
                    .selectable_label(state.selected_page() == page, text)
                    .clicked()
                {
                    if let Ok(page) = stepgrid::validate_page(page, state) {
                        commands.push(Command::SetSelectedPage(page));
                    }
                }
            }
        });

        for command in commands {
            self.send(command);
        }
    }

    /// Draw the visible page of the grid and run the paint gesture over it.
    fn grid(&mut self, ui: &mut egui::Ui, state: &SequencerState) {
        let visible = state.visible_range();
        let playhead = self.playing_step.map(|step| step - 1);
        let (pointer, down) = ui.input(|i| (i.pointer.latest_pos(), i.pointer.primary_down()));
        let mut hovered = None;

        for instrument in state.instruments() {
            ui.horizontal(|ui| {
                ui.add_sized([LABEL_WIDTH, CELL_SIZE], egui::Label::new(instrument.label.as_str()));
                for index in visible.clone() {
                    let (rect, _) = ui.allocate_exact_size(
                        egui::vec2(CELL_SIZE, CELL_SIZE),
                        egui::Sense::hover(),
                    );
                    let active = instrument.sequence.get(index);
                    let fill = if playhead == Some(index) {
                        egui::Color32::from_rgb(220, 60, 60)
                    } else if active {
                        egui::Color32::from_rgb(60, 60, 200)
                    } else if state.is_beat_start(index) {
                        egui::Color32::from_rgb(70, 70, 70)
                    } else {
                        egui::Color32::from_rgb(40, 40, 40)
                    };
                    ui.painter().rect_filled(rect, 3.0, fill);
                    ui.painter().text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        if active { "1" } else { "0" },
                        egui::FontId::monospace(12.0),
                        egui::Color32::LIGHT_GRAY,
                    );
                    if pointer.is_some_and(|p| rect.contains(p)) {
                        hovered = Some(Cell::new(instrument.id.clone(), index));
                    }
                    ui.add_space(CELL_GAP);
                }
            });
        }

        if let Some(command) = self.gesture.update(hovered, down) {
            self.send(command);
        }

        let first = visible.start + 1;
        let last = (visible.start + PAGE_SIZE).min(state.step_count());
        ui.label(format!("Steps {first}-{last} of {}", state.step_count()));
    }
}

impl eframe::App for SequencerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.handle_playback_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("STEPGRID - Step Sequencer");
            ui.add_space(10.0);

            self.midi_port_row(ui);
            ui.add_space(10.0);

            let Some(state) = self.state.clone() else {
                ui.label("Starting...");
                return;
            };

            self.transport_row(ui, &state);
            ui.add_space(20.0);
            self.grid(ui, &state);

            // Info
            ui.separator();
            ui.label("Click or drag across steps to toggle them");
            if let Some(status) = &self.status {
                ui.colored_label(egui::Color32::LIGHT_RED, status);
            }
            let midi_connected = self
                .session
                .midi
                .lock()
                .map(|midi| midi.is_connected())
                .unwrap_or(false);
            match (self.session.audio_connected(), midi_connected) {
                (true, true) => {}
                (true, false) => {
                    ui.colored_label(
                        egui::Color32::YELLOW,
                        "⚠ No MIDI output connected - audio playback only",
                    );
                }
                (false, true) => {
                    ui.colored_label(
                        egui::Color32::YELLOW,
                        "⚠ No audio device - MIDI playback only",
                    );
                }
                (false, false) => {
                    ui.colored_label(
                        egui::Color32::LIGHT_RED,
                        "⚠ No audio device and no MIDI output - nothing will sound",
                    );
                }
            }
        });
    }
}
