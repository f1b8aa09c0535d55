use std::{
    error::Error,
    path::PathBuf,
    sync::{mpsc, Arc, Mutex},
};

use clap::{Parser, Subcommand};
use eframe::{egui::ViewportBuilder, run_native};
use rooster_alarm::{
    audio::RodioOutput, config::Config, AlarmClock, AlarmScheduler, PlaybackController,
    SystemClock, TargetTime, TimeSource,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Option<Command>,
    /// use this config file instead of the default one
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    /// sound to play, overrides the config for this run
    #[clap(long)]
    sound: Option<PathBuf>,
    /// arm the alarm on startup (HH:MM:SS)
    #[clap(long)]
    at: Option<TargetTime>,
}

#[derive(Subcommand)]
enum Command {
    /// write a default config file
    Init {
        #[clap(long, short)]
        force: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    // initilize the logger
    simple_file_logger::init_logger!("rooster_alarm").expect("couldn't initialize logger");

    let args = Args::parse();
    let config_path = match args.config {
        Some(path) => Some(path),
        None => Config::config_path()
            .map_err(|e| log::warn!("{e}, settings won't be saved"))
            .ok(),
    };

    if let Some(Command::Init { force }) = args.command {
        let path = config_path.ok_or("no config path to write to")?;
        if force || !Config::is_config_present(&path) {
            Config::new().save(&path)?;
            std::fs::create_dir_all(Config::sounds_path()?)?;
            println!("wrote {}", path.display());
        } else {
            println!("{} already exists, use --force to overwrite", path.display());
        }
        return Ok(());
    }

    let mut config = match &config_path {
        Some(path) if Config::is_config_present(path) => Config::load(path).unwrap_or_else(|e| {
            log::warn!("{e}, using default settings");
            Config::default()
        }),
        _ => Config::default(),
    };
    if let Some(sound) = args.sound {
        config.sound = sound;
    }

    let clock: Arc<dyn TimeSource> = Arc::new(SystemClock);
    let playback = Arc::new(Mutex::new(PlaybackController::new(
        Box::new(RodioOutput::spawn()),
        config.sound.clone(),
        config.volume,
    )));
    let (tx, rx) = mpsc::channel();
    let scheduler = AlarmScheduler::new(Arc::clone(&playback), Arc::clone(&clock), tx)
        .with_poll_interval(config.poll_interval())
        .with_match_rule(config.match_rule)
        .with_snooze(config.snooze());
    if let Some(target) = args.at {
        scheduler.arm(target)?;
    }

    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_inner_size([400.0, 350.0])
            .with_resizable(false),
        ..Default::default()
    };
    let app = AlarmClock::new(config, config_path, scheduler, playback, clock, rx);
    // run the gui
    run_native(
        "Rooster Alarm",
        native_options,
        Box::new(|_| Ok(Box::new(app))),
    )
    .map_err(|e| e.to_string().into())
}
