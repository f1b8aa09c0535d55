//! Looping alarm sound playback.
//!
//! [`PlaybackController`] holds the playing/stopped state and opens the sound
//! file, the actual audio device is behind an [`AudioOutput`] handed to it on
//! construction.

use std::{
    fmt,
    fs::File,
    io::{BufReader, ErrorKind},
    path::{Path, PathBuf},
};

use crate::error::PlaybackError;

/// something that can loop a sound until told to stop
pub trait AudioOutput: Send {
    /// start looping `sound` at `volume` (0.0 to 1.0) until [`AudioOutput::stop`]
    ///
    /// # Errors
    /// if the sound can't be decoded or there is no output device
    fn play_looping(&mut self, sound: BufReader<File>, volume: f32) -> Result<(), PlaybackError>;

    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

pub struct PlaybackController {
    output: Box<dyn AudioOutput>,
    sound: PathBuf,
    // percent
    volume: f32,
    state: PlaybackState,
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("sound", &self.sound)
            .field("volume", &self.volume)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PlaybackController {
    #[must_use]
    pub fn new(output: Box<dyn AudioOutput>, sound: PathBuf, volume: f32) -> Self {
        Self {
            output,
            sound,
            volume: volume.clamp(0.0, 100.0),
            state: PlaybackState::Stopped,
        }
    }

    /// Start looping the configured sound.
    ///
    /// Does nothing if already playing, so there is never a second stream.
    ///
    /// # Errors
    /// [`PlaybackError::ResourceNotFound`] if the sound file can't be opened,
    /// or whatever the output reports if it can't play it.
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        if self.state == PlaybackState::Playing {
            log::debug!("alarm sound already playing");
            return Ok(());
        }
        let sound = open_sound(&self.sound)?;
        self.output.play_looping(sound, self.volume / 100.0)?;
        log::info!("playing alarm sound {}", self.sound.display());
        self.state = PlaybackState::Playing;
        Ok(())
    }

    /// stopping when nothing is playing is fine
    pub fn stop(&mut self) {
        if self.state == PlaybackState::Playing {
            log::info!("stopping alarm sound");
            self.output.stop();
        }
        self.state = PlaybackState::Stopped;
    }

    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    #[must_use]
    pub fn sound(&self) -> &Path {
        &self.sound
    }

    /// takes effect on the next start
    pub fn set_sound(&mut self, sound: PathBuf) {
        self.sound = sound;
    }

    #[must_use]
    pub const fn volume(&self) -> f32 {
        self.volume
    }

    /// takes effect on the next start
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 100.0);
    }
}

fn open_sound(path: &Path) -> Result<BufReader<File>, PlaybackError> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                log::warn!("couldn't open sound file {}: {e}", path.display());
            }
            Err(PlaybackError::ResourceNotFound(path.to_path_buf()))
        }
    }
}
