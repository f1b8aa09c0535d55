use std::{
    fmt::Write,
    path::{Path, PathBuf},
    sync::{mpsc::Receiver, Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::NaiveTime;
use eframe::egui::{
    self, Button, CentralPanel, Color32, Layout, RichText, TopBottomPanel, Window,
};

use crate::{
    alarm::{AlarmScheduler, AlarmState},
    communication::AlarmEvent,
    config::{Config, Theme},
    error::AlarmError,
    playback::PlaybackController,
    time::{TargetTime, TimeSource},
    time_edit::TimeBuilder,
};

const REDRAW_INTERVAL: Duration = Duration::from_secs(1);

/// the alarm clock window, it only drives the scheduler and shows its state
pub struct AlarmClock {
    config: Config,
    config_path: Option<PathBuf>,
    scheduler: AlarmScheduler,
    playback: Arc<Mutex<PlaybackController>>,
    clock: Arc<dyn TimeSource>,
    events: Receiver<AlarmEvent>,
    editor: TimeBuilder,
    status: (String, Color32),
    error: Option<String>,
}

impl AlarmClock {
    #[must_use]
    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        scheduler: AlarmScheduler,
        playback: Arc<Mutex<PlaybackController>>,
        clock: Arc<dyn TimeSource>,
        events: Receiver<AlarmEvent>,
    ) -> Self {
        let status = scheduler.target().map_or_else(idle_status, |target| {
            (format!("Alarm set for {target}"), Color32::GREEN)
        });
        Self {
            editor: TimeBuilder::at(clock.now()),
            config,
            config_path,
            scheduler,
            playback,
            clock,
            events,
            status,
            error: None,
        }
    }

    fn handle_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                AlarmEvent::Ringing(target) => {
                    log::debug!("ui got ringing for {target}");
                    self.status = ("WAKE UP!".to_string(), Color32::RED);
                }
                AlarmEvent::PlaybackFailed(error) => self.error = Some(error),
            }
        }
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        TopBottomPanel::top("time_and_ctrl").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let theme_btn = ui.add(Button::new({
                    if self.config.theme == Theme::Dark {
                        "🌞"
                    } else {
                        "🌙"
                    }
                }));
                if theme_btn.clicked() {
                    self.config.theme = !self.config.theme;
                    self.save();
                }
                ui.with_layout(Layout::right_to_left(egui::Align::Min), |ui| {
                    if ui.button("🔔").on_hover_text("pick alarm sound").clicked() {
                        self.pick_sound();
                    }
                });
            });
            ui.vertical_centered(|ui| {
                ui.label(
                    RichText::new(format_clock(self.clock.now(), &self.config.time_format))
                        .size(32.0)
                        .strong(),
                );
            });
        });
    }

    fn render_controls(&mut self, ui: &mut egui::Ui) {
        let state = self.scheduler.state();
        ui.vertical_centered(|ui| {
            ui.label("Set Alarm Time (24-Hour Format)");
            self.editor.render_time_editor(ui);
            ui.label(RichText::new(&self.status.0).italics().color(self.status.1));
        });
        ui.horizontal(|ui| {
            if ui
                .add_enabled(state != AlarmState::Ringing, Button::new("Set Alarm"))
                .clicked()
            {
                self.set_alarm();
            }
            let snooze_label = format!("Snooze ({}m)", self.config.snooze_minutes);
            if ui
                .add_enabled(state == AlarmState::Ringing, Button::new(snooze_label))
                .clicked()
            {
                self.snooze();
            }
            if ui
                .add_enabled(state != AlarmState::Idle, Button::new("Stop Alarm"))
                .clicked()
            {
                self.stop();
            }
        });
    }

    fn render_error(&mut self, ctx: &egui::Context) {
        let Some(error) = &self.error else {
            return;
        };
        let mut dismissed = false;
        Window::new("Error")
            .collapsible(false)
            .auto_sized()
            .show(ctx, |ui| {
                ui.label(error);
                if ui.button("ok").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.error = None;
        }
    }

    fn set_alarm(&mut self) {
        match self.editor.build() {
            Ok(target) => match self.scheduler.arm(target) {
                Ok(()) => {
                    self.status =
                        (format!("Alarm successfully set for {target}"), Color32::GREEN);
                }
                Err(e) => self.error = Some(e.to_string()),
            },
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    fn snooze(&mut self) {
        match self.scheduler.snooze_default() {
            Ok(target) => {
                self.status = (format!("Snoozed. Next alarm at {target}"), Color32::ORANGE);
            }
            Err(e @ AlarmError::Poller(_)) => self.error = Some(e.to_string()),
            Err(e) => log::warn!("{e}"),
        }
    }

    fn stop(&mut self) {
        match self.scheduler.disarm() {
            Ok(()) => self.status = ("Alarm stopped.".to_string(), Color32::GRAY),
            Err(e) => log::warn!("{e}"),
        }
    }

    fn pick_sound(&mut self) {
        // TODO: rfd with gnome opens Recents not audio folder https://github.com/PolyMeilex/rfd/issues/237
        let file_dialog = rfd::FileDialog::new()
            .set_title("Pick alarm sound")
            .add_filter("audio", &["mp3", "wav", "ogg", "oga", "flac"]);
        let file_dialog = match directories::UserDirs::new()
            .and_then(|u| u.audio_dir().map(Path::to_path_buf))
        {
            Some(audio_path) => file_dialog.set_directory(audio_path),
            None => file_dialog,
        };
        if let Some(path) = file_dialog.pick_file() {
            log::info!("alarm sound changed to {}", path.display());
            self.playback
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .set_sound(path.clone());
            self.config.sound = path;
            self.save();
        }
    }

    fn save(&self) {
        if let Some(path) = &self.config_path {
            if let Err(e) = self.config.save(path) {
                log::error!("{e}");
            }
        }
    }
}

fn idle_status() -> (String, Color32) {
    ("No alarm set.".to_string(), Color32::GRAY)
}

/// falls back to `HH:MM:SS` if the configured format is invalid
#[must_use]
pub fn format_clock(now: NaiveTime, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", now.format(format)).is_err() {
        return TargetTime::from(now).to_string();
    }
    out
}

impl eframe::App for AlarmClock {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_events();
        ctx.set_visuals(self.config.theme.into());
        self.render_header(ctx);
        CentralPanel::default().show(ctx, |ui| {
            self.render_controls(ui);
        });
        self.render_error(ctx);
        // keep the clock ticking and pick up alarm events
        ctx.request_repaint_after(REDRAW_INTERVAL);
    }
}
