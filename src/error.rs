use std::path::PathBuf;

use thiserror::Error;

use crate::alarm::AlarmState;

/// errors from the alarm state machine and from building alarm times
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlarmError {
    #[error("{field} must be at most {max}, got {value}")]
    InvalidInput {
        field: &'static str,
        value: u32,
        max: u32,
    },
    #[error("cannot {operation} while the alarm is {from}")]
    InvalidStateTransition {
        from: AlarmState,
        operation: &'static str,
    },
    #[error("couldn't parse alarm time {0:?}, expected HH:MM:SS")]
    Parse(String),
    #[error("couldn't start the alarm poller: {0}")]
    Poller(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("sound file {} not found", .0.display())]
    ResourceNotFound(PathBuf),
    #[error("couldn't decode sound file: {0}")]
    Decode(String),
    #[error("audio output unavailable: {0}")]
    Output(String),
    #[error("audio thread is no longer running")]
    Disconnected,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("couldn't find a home directory for the config")]
    NoProjectDir,
    #[error("couldn't access config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("couldn't parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("couldn't serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
