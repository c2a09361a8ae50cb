//! Audio output through `rodio`.
//!
//! The output stream can't leave the thread that opened it, so one audio
//! thread owns it together with a sink per channel, and every
//! [`RodioOutput`] talks to that thread over a channel.

use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use rodio::{source::SineWave, Decoder, OutputStream, Sink, Source};

use crate::{
    error::AudioError,
    platform::{AudioOutput, PlaybackId},
    sound::SoundSource,
};

/// How often the audio thread checks for sounds that ran out.
const POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Alarm,
    Ambient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEvent {
    /// A sound that wasn't looping played to its end.
    Finished(Channel, PlaybackId),
}

enum Command {
    Start {
        channel: Channel,
        source: SoundSource,
        volume: f32,
        looping: bool,
        reply: Sender<Result<PlaybackId, AudioError>>,
    },
    Stop(Channel, Sender<()>),
    Pause(Channel, Sender<()>),
    Resume(Channel, Sender<()>),
    IsPlaying(Channel, Sender<bool>),
}

struct Playing {
    id: PlaybackId,
    sink: Sink,
    looping: bool,
}

/// Handle to the audio thread. The thread exits once every handle and every
/// output created from it is dropped.
#[derive(Debug, Clone)]
pub struct RodioEngine {
    commands: Sender<Command>,
}

impl RodioEngine {
    /// Opens the default output device on a new audio thread.
    /// `system_alarm_sound` is what [`SoundSource::SystemDefault`] plays.
    ///
    /// # Errors
    /// Fails if there is no usable output device.
    pub fn spawn(
        system_alarm_sound: PathBuf,
        events: Sender<AudioEvent>,
    ) -> Result<Self, AudioError> {
        let (commands, inbox) = crossbeam_channel::unbounded();
        let (ready, opened) = crossbeam_channel::bounded(1);
        thread::Builder::new()
            .name("lullaby-audio".to_string())
            .spawn(move || {
                let stream = match rodio::OutputStreamBuilder::open_default_stream() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready.send(Err(AudioError::Output(e.to_string())));
                        return;
                    }
                };
                let _ = ready.send(Ok(()));
                run(&stream, &system_alarm_sound, &inbox, &events);
            })
            .map_err(|e| AudioError::Output(e.to_string()))?;
        opened.recv().map_err(|_| AudioError::EngineGone)??;
        info!("audio output opened");
        Ok(Self { commands })
    }

    #[must_use]
    pub fn output(&self, channel: Channel) -> RodioOutput {
        RodioOutput {
            channel,
            commands: self.commands.clone(),
        }
    }
}

fn run(
    stream: &OutputStream,
    system_alarm_sound: &Path,
    inbox: &Receiver<Command>,
    events: &Sender<AudioEvent>,
) {
    let mut playing: HashMap<Channel, Playing> = HashMap::new();
    let mut last_id: PlaybackId = 0;
    loop {
        match inbox.recv_timeout(POLL) {
            Ok(Command::Start {
                channel,
                source,
                volume,
                looping,
                reply,
            }) => {
                if let Some(old) = playing.remove(&channel) {
                    old.sink.stop();
                }
                let sink = Sink::connect_new(stream.mixer());
                sink.set_volume(volume);
                let result = append(&sink, &source, system_alarm_sound, looping).map(|()| {
                    last_id += 1;
                    sink.play();
                    playing.insert(
                        channel,
                        Playing {
                            id: last_id,
                            sink,
                            looping,
                        },
                    );
                    last_id
                });
                let _ = reply.send(result);
            }
            Ok(Command::Stop(channel, reply)) => {
                if let Some(old) = playing.remove(&channel) {
                    old.sink.stop();
                }
                let _ = reply.send(());
            }
            Ok(Command::Pause(channel, reply)) => {
                if let Some(current) = playing.get(&channel) {
                    current.sink.pause();
                }
                let _ = reply.send(());
            }
            Ok(Command::Resume(channel, reply)) => {
                if let Some(current) = playing.get(&channel) {
                    current.sink.play();
                }
                let _ = reply.send(());
            }
            Ok(Command::IsPlaying(channel, reply)) => {
                let answer = playing
                    .get(&channel)
                    .is_some_and(|current| !current.sink.is_paused() && !current.sink.empty());
                let _ = reply.send(answer);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let finished: Vec<(Channel, PlaybackId)> = playing
            .iter()
            .filter(|(_, current)| !current.looping && current.sink.empty())
            .map(|(channel, current)| (*channel, current.id))
            .collect();
        for (channel, id) in finished {
            playing.remove(&channel);
            debug!("{channel:?} sound {id} finished");
            if events.send(AudioEvent::Finished(channel, id)).is_err() {
                debug!("nobody listening for audio events");
            }
        }
    }
    for (_, current) in playing {
        current.sink.stop();
    }
    debug!("audio thread stopped");
}

fn decode(path: &Path) -> Result<Decoder<BufReader<File>>, AudioError> {
    let file = File::open(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            AudioError::NotFound(path.to_path_buf())
        } else {
            AudioError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    Decoder::new(BufReader::new(file)).map_err(|e| AudioError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn play_on<S>(sink: &Sink, source: S, looping: bool)
where
    S: Source + Send + 'static,
{
    if looping {
        sink.append(source.repeat_infinite());
    } else {
        sink.append(source);
    }
}

fn append(
    sink: &Sink,
    source: &SoundSource,
    system_alarm_sound: &Path,
    looping: bool,
) -> Result<(), AudioError> {
    match source {
        SoundSource::File(path) => {
            play_on(sink, decode(path)?, looping);
        }
        SoundSource::SystemDefault => match decode(system_alarm_sound) {
            Ok(decoder) => play_on(sink, decoder, looping),
            Err(e) => {
                warn!("system alarm sound unavailable ({e}), beeping instead");
                let beep = SineWave::new(880.0)
                    .take_duration(Duration::from_millis(500))
                    .amplify(0.3)
                    .delay(Duration::from_millis(500));
                play_on(sink, beep, looping);
            }
        },
    }
    Ok(())
}

/// One channel of the audio thread.
#[derive(Debug)]
pub struct RodioOutput {
    channel: Channel,
    commands: Sender<Command>,
}

impl RodioOutput {
    fn request<R>(&self, command: impl FnOnce(Sender<R>) -> Command) -> Result<R, AudioError> {
        let (reply, answer) = crossbeam_channel::bounded(1);
        self.commands
            .send(command(reply))
            .map_err(|_| AudioError::EngineGone)?;
        answer.recv().map_err(|_| {
            error!("audio thread went away mid-request");
            AudioError::EngineGone
        })
    }
}

impl AudioOutput for RodioOutput {
    fn probe(&self, path: &Path) -> Result<(), AudioError> {
        decode(path).map(drop)
    }

    fn start(
        &mut self,
        source: &SoundSource,
        volume: f32,
        looping: bool,
    ) -> Result<PlaybackId, AudioError> {
        let channel = self.channel;
        self.request(|reply| Command::Start {
            channel,
            source: source.clone(),
            volume,
            looping,
            reply,
        })?
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        let channel = self.channel;
        self.request(|reply| Command::Stop(channel, reply))
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        let channel = self.channel;
        self.request(|reply| Command::Pause(channel, reply))
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let channel = self.channel;
        self.request(|reply| Command::Resume(channel, reply))
    }

    fn is_playing(&self) -> Result<bool, AudioError> {
        let channel = self.channel;
        self.request(|reply| Command::IsPlaying(channel, reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_reports_missing_and_undecodable_files() {
        let (commands, _inbox) = crossbeam_channel::unbounded();
        let output = RodioOutput {
            channel: Channel::Alarm,
            commands,
        };
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.mp3");
        assert!(matches!(output.probe(&missing), Err(AudioError::NotFound(_))));

        let garbage = dir.path().join("garbage.mp3");
        std::fs::write(&garbage, b"definitely not audio").unwrap();
        assert!(matches!(output.probe(&garbage), Err(AudioError::Decode { .. })));
    }

    #[test]
    fn requests_fail_once_the_audio_thread_is_gone() {
        let (commands, inbox) = crossbeam_channel::unbounded();
        drop(inbox);
        let mut output = RodioOutput {
            channel: Channel::Ambient,
            commands,
        };
        assert!(matches!(output.stop(), Err(AudioError::EngineGone)));
        assert!(matches!(output.is_playing(), Err(AudioError::EngineGone)));
    }
}
