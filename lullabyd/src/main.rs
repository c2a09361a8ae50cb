use std::{error::Error, path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use lullabyd::{
    config::Config,
    daemon::{Daemon, DeliveryQueue, Platform},
    platform::{
        desktop::{DesktopNotifier, FocusArbiter, NoVibrator},
        rodio_backend::{Channel, RodioEngine},
    },
    scheduler::SystemClock,
    server,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Use this config file instead of the one in the user's config directory
    #[clap(long, short)]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config
    Init {
        #[clap(long, short)]
        force: bool,
    },
    /// Run the daemon (the default)
    Run,
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_file_logger::init_logger!("lullabyd").expect("couldn't initialize logger");

    let args = Args::parse();
    let config_path = match args.config {
        Some(path) => path,
        None => Config::config_path()?,
    };

    match args.command {
        Some(Command::Init { force }) => {
            if Config::init(&config_path, force)? {
                info!("wrote default config to {}", config_path.display());
            } else {
                warn!("{} already exists, use --force to overwrite", config_path.display());
            }
            Ok(())
        }
        Some(Command::Run) | None => run(&Config::load(&config_path)?),
    }
}

fn run(config: &Config) -> Result<(), Box<dyn Error>> {
    let queue = DeliveryQueue::new();
    let (events, audio_events) = crossbeam_channel::unbounded();
    let engine = RodioEngine::spawn(config.system_alarm_sound.clone(), events).map_err(|e| {
        error!("no audio output: {e}");
        e
    })?;
    let platform = Platform {
        alarm_output: Box::new(engine.output(Channel::Alarm)),
        ambient_output: Box::new(engine.output(Channel::Ambient)),
        focus: Arc::new(FocusArbiter::new()),
        vibrator: Arc::new(NoVibrator),
        notifier: Arc::new(DesktopNotifier::new(
            config.notification.app_name.clone(),
            config.permissions.notifications,
            queue.sender.clone(),
        )),
    };

    let daemon = Daemon::start(config, platform, Arc::new(SystemClock), queue)?;
    daemon.spawn_audio_events(audio_events)?;
    server::serve(&config.socket_name, daemon.bridge())?;
    Ok(())
}
