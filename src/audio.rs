//! rodio backed [`AudioOutput`].
//!
//! The output stream lives on its own thread for the lifetime of the process
//! and is driven with [`AudioCommand`]s, so the handle itself can be moved
//! between the ui and the alarm polling thread.

use std::{
    fs::File,
    io::BufReader,
    sync::mpsc::{self, Receiver, Sender},
    thread,
};

use rodio::{Decoder, OutputStream, Sink, Source};

use crate::{communication::AudioCommand, error::PlaybackError, playback::AudioOutput};

#[derive(Debug)]
pub struct RodioOutput {
    sender: Sender<AudioCommand>,
}

impl RodioOutput {
    /// spawns the audio thread, the default output device is opened there
    #[must_use]
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::channel();
        if let Err(e) = thread::Builder::new()
            .name("alarm-audio".to_string())
            .spawn(move || audio_thread(&receiver))
        {
            log::error!("couldn't start audio thread: {e}");
        }
        Self { sender }
    }
}

impl AudioOutput for RodioOutput {
    fn play_looping(&mut self, sound: BufReader<File>, volume: f32) -> Result<(), PlaybackError> {
        let (reply, response) = mpsc::channel();
        self.sender
            .send(AudioCommand::Play {
                volume,
                sound,
                reply,
            })
            .map_err(|_| PlaybackError::Disconnected)?;
        response.recv().map_err(|_| PlaybackError::Disconnected)?
    }

    fn stop(&mut self) {
        if self.sender.send(AudioCommand::Stop).is_err() {
            log::warn!("audio thread gone, nothing to stop");
        }
    }
}

fn audio_thread(receiver: &Receiver<AudioCommand>) {
    let stream = match rodio::OutputStreamBuilder::open_default_stream() {
        Ok(mut stream) => {
            stream.log_on_drop(false);
            Ok(stream)
        }
        Err(e) => {
            log::error!("couldn't open audio output: {e}");
            Err(e.to_string())
        }
    };
    let mut sink: Option<Sink> = None;
    // exits once the RodioOutput is dropped
    while let Ok(command) = receiver.recv() {
        match command {
            AudioCommand::Play {
                volume,
                sound,
                reply,
            } => {
                let result = stream
                    .as_ref()
                    .map_err(|e| PlaybackError::Output(e.clone()))
                    .and_then(|stream| play(stream, sound, volume));
                match result {
                    Ok(new_sink) => {
                        // only ever one stream playing
                        if let Some(old) = sink.replace(new_sink) {
                            old.stop();
                        }
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            AudioCommand::Stop => {
                if let Some(sink) = sink.take() {
                    sink.stop();
                }
            }
        }
    }
    log::debug!("audio thread exiting");
}

fn play(stream: &OutputStream, sound: BufReader<File>, volume: f32) -> Result<Sink, PlaybackError> {
    // create source that repeatedly plays the sound at the specified volume
    let input = Decoder::new(sound)
        .map_err(|e| PlaybackError::Decode(e.to_string()))?
        .repeat_infinite();
    let sink = Sink::connect_new(stream.mixer());
    sink.set_volume(volume);
    sink.append(input);
    sink.play();
    Ok(sink)
}
