use std::error::Error;

use clap::{Parser, Subcommand};
use log::info;
use lullaby::{communication, Companion, UiEvent};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Socket the daemon listens on
    #[clap(long, default_value = lullabyd::DEFAULT_SOCKET_NAME)]
    socket: String,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ring the alarm after a delay
    ScheduleAlarm {
        delay_seconds: u32,
        #[clap(long)]
        no_vibration: bool,
    },
    CancelAlarm,
    IsAlarmSet,
    /// Ring the alarm now
    PlayAlarm {
        sound: String,
        #[clap(long)]
        no_vibration: bool,
    },
    StopAlarm,
    DismissAlarm,
    IsPlaying,
    TestVibration,
    /// End a meditation session after a delay, optionally ringing the alarm
    ScheduleTimer {
        delay_seconds: u32,
        #[clap(long)]
        alarm: bool,
        #[clap(long)]
        no_vibration: bool,
        /// Session length reported back to the UI
        #[clap(long, default_value_t = 0)]
        minutes: i32,
    },
    CancelTimer,
    IsTimerSet,
    Notify {
        title: String,
        body: String,
    },
    HasPermissions,
    Version,
    PlayAmbient {
        file_name: String,
        #[clap(long, default_value_t = 1.0)]
        volume: f32,
        #[clap(long)]
        once: bool,
    },
    StopAmbient,
    PauseAmbient,
    ResumeAmbient,
    IsAmbientPlaying,
    /// Attach as the UI and print callbacks as they arrive
    Watch,
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_file_logger::init_logger!("lullaby").expect("couldn't initialize logger");

    let args = Args::parse();
    let mut companion = Companion::new(communication::connect(&args.socket)?);
    let status = match args.command {
        Command::ScheduleAlarm {
            delay_seconds,
            no_vibration,
        } => companion.schedule_alarm(delay_seconds, !no_vibration),
        Command::CancelAlarm => companion.cancel_alarm(),
        Command::IsAlarmSet => companion.is_alarm_set(),
        Command::PlayAlarm {
            sound,
            no_vibration,
        } => companion.play_alarm(&sound, !no_vibration),
        Command::StopAlarm => companion.stop_alarm(),
        Command::DismissAlarm => companion.dismiss_alarm(),
        Command::IsPlaying => companion.is_playing(),
        Command::TestVibration => companion.test_vibration(),
        Command::ScheduleTimer {
            delay_seconds,
            alarm,
            no_vibration,
            minutes,
        } => companion.schedule_timer(delay_seconds, alarm, !no_vibration, minutes),
        Command::CancelTimer => companion.cancel_timer(),
        Command::IsTimerSet => companion.is_timer_set(),
        Command::Notify { title, body } => companion.send_notification(&title, &body),
        Command::HasPermissions => companion.has_permissions(),
        Command::Version => {
            let version = companion
                .app_version()
                .ok_or("couldn't get the daemon's version")?;
            println!("{version}");
            return Ok(());
        }
        Command::PlayAmbient {
            file_name,
            volume,
            once,
        } => companion.play_ambient(&file_name, volume, !once),
        Command::StopAmbient => companion.stop_ambient(),
        Command::PauseAmbient => companion.pause_ambient(),
        Command::ResumeAmbient => companion.resume_ambient(),
        Command::IsAmbientPlaying => companion.is_ambient_playing(),
        Command::Watch => return watch(&mut companion),
    };
    println!("{status}");
    Ok(())
}

fn watch<R, W>(companion: &mut Companion<R, W>) -> Result<(), Box<dyn Error>>
where
    R: std::io::BufRead,
    W: std::io::Write,
{
    if !companion.attach() {
        return Err("daemon refused the attachment".into());
    }
    info!("attached, waiting for callbacks");
    while let Some(event) = companion.next_event()? {
        match event {
            UiEvent::TimerComplete {
                enable_alarm,
                timer_duration_minutes,
            } => println!(
                "session of {timer_duration_minutes} min complete{}",
                if enable_alarm { ", alarm ringing" } else { "" }
            ),
            UiEvent::AmbientComplete { file_name } => println!("{file_name} finished"),
        }
    }
    println!("daemon went away");
    Ok(())
}
