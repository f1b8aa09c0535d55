#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

pub mod alarm;
pub mod audio;
pub mod communication;
pub mod config;
pub mod error;
pub mod playback;
pub mod time;

/// the egui window
pub mod app;
/// hour/minute/second pickers for egui
pub mod time_edit;

pub use alarm::{AlarmScheduler, AlarmState, MatchRule};
pub use app::AlarmClock;
pub use communication::AlarmEvent;
pub use error::{AlarmError, ConfigError, PlaybackError};
pub use playback::{AudioOutput, PlaybackController, PlaybackState};
pub use time::{SystemClock, TargetTime, TimeSource};
