use std::{
    ops::Not,
    path::{Path, PathBuf},
    time::Duration,
};

use eframe::egui;
use serde::{Deserialize, Serialize};

use crate::{alarm::MatchRule, error::ConfigError};

const APP_NAME: &str = "rooster_alarm";

#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Not for Theme {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }
}

impl From<Theme> for egui::Visuals {
    fn from(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self::dark(),
            Theme::Light => Self::light(),
        }
    }
}

/// user settings, there is deliberately no alarm in here
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub time_format: String,
    pub theme: Theme,
    pub sound: PathBuf,
    /// percent
    pub volume: f32,
    pub snooze_minutes: u32,
    pub match_rule: MatchRule,
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_format: "%H:%M:%S".to_string(),
            theme: Theme::Dark,
            sound: Self::sounds_path()
                .unwrap_or_default()
                .join("alarm.mp3"),
            volume: 100.0,
            snooze_minutes: 5,
            match_rule: MatchRule::Exact,
            poll_interval_ms: 1000,
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// if the file can't be read or isn't valid toml
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&config)?)
    }

    /// # Errors
    /// if the config dir can't be created or the file can't be written
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = toml::to_string(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, config)?;
        Ok(())
    }

    #[must_use]
    pub fn snooze(&self) -> Duration {
        Duration::from_secs(u64::from(self.snooze_minutes) * 60)
    }

    /// never faster than every 10ms
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    /// # Errors
    /// if there is no home directory
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let mut path = directories::ProjectDirs::from("", "", APP_NAME)
            .ok_or(ConfigError::NoProjectDir)?
            .config_dir()
            .to_path_buf();
        path.push("config.toml");
        Ok(path)
    }

    /// # Errors
    /// if there is no home directory
    pub fn sounds_path() -> Result<PathBuf, ConfigError> {
        let mut path = directories::ProjectDirs::from("", "", APP_NAME)
            .ok_or(ConfigError::NoProjectDir)?
            .data_dir()
            .to_path_buf();
        path.push("sounds");
        Ok(path)
    }

    #[must_use]
    pub fn is_config_present(path: &Path) -> bool {
        path.exists()
    }
}
