use chrono::Timelike;
use eframe::egui::{self, TextEdit, Widget};

use crate::{error::AlarmError, time::TargetTime};

/// hour, minute and second selectors for picking the alarm time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBuilder {
    hour: Field,
    minute: Field,
    second: Field,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    label: &'static str,
    value: u32,
    max: u32,
    // what is in the text box
    text: String,
}

impl Field {
    fn new(label: &'static str, value: u32, max: u32) -> Self {
        Self {
            label,
            value,
            max,
            text: format!("{value:02}"),
        }
    }

    // up and down wrap around like a clock
    fn step_up(&mut self) {
        self.value = if self.value >= self.max { 0 } else { self.value + 1 };
        self.sync();
    }

    fn step_down(&mut self) {
        self.value = if self.value == 0 { self.max } else { self.value - 1 };
        self.sync();
    }

    fn commit_text(&mut self) {
        // if the input value is vaild, update the value
        if let Ok(parsed_value) = self.text.trim().parse::<u32>() {
            self.value = parsed_value.min(self.max);
        }
        // sync the input value and the value regardless
        self.sync();
    }

    fn sync(&mut self) {
        self.text = format!("{:02}", self.value);
    }

    fn render(&mut self, ui: &mut egui::Ui) {
        ui.vertical(|ui| {
            ui.label(self.label);
            if ui.button("Up").clicked() {
                self.step_up();
            }
            if TextEdit::singleline(&mut self.text)
                .desired_width(20.0)
                .char_limit(2)
                .ui(&mut *ui)
                .lost_focus()
            {
                self.commit_text();
            }
            if ui.button("Down").clicked() {
                self.step_down();
            }
        });
    }
}

impl TimeBuilder {
    #[must_use]
    pub fn at(time: impl Timelike) -> Self {
        Self {
            hour: Field::new("Hour", time.hour(), 23),
            minute: Field::new("Minute", time.minute(), 59),
            second: Field::new("Second", time.second().min(59), 59),
        }
    }

    /// # Errors
    /// never for values set through the selectors
    pub fn build(&self) -> Result<TargetTime, AlarmError> {
        TargetTime::new(self.hour.value, self.minute.value, self.second.value)
    }

    pub fn render_time_editor(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            self.hour.render(ui);
            ui.label(":");
            self.minute.render(ui);
            ui.label(":");
            self.second.render(ui);
        });
    }
}
