use std::{fs::File, io::BufReader, sync::mpsc::Sender};

use crate::{error::PlaybackError, time::TargetTime};

/// sent from the scheduler to whoever is displaying the alarm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmEvent {
    Ringing(TargetTime),
    // the alarm is ringing but nothing is audible
    PlaybackFailed(String),
}

/// sent to the audio thread
#[derive(Debug)]
pub enum AudioCommand {
    Play {
        volume: f32,
        sound: BufReader<File>,
        reply: Sender<Result<(), PlaybackError>>,
    },
    Stop,
}
