//! The local socket the UI talks to the daemon over.
//!
//! Each connection gets a reader loop on its own thread and a writer thread
//! fed by a channel, so callbacks to an attached UI can be written while the
//! reader waits for the next request.

use std::{
    io::{self, BufRead, BufReader, Write},
    sync::Arc,
    thread,
};

use crossbeam_channel::{Receiver, Sender};
use interprocess::local_socket::{
    prelude::*, GenericFilePath, GenericNamespaced, ListenerOptions, Name, Stream,
};
use log::{debug, error, info, warn};

use crate::{
    attachment::UiSurface, bridge::Bridge, error::WireError, receive, send, ClientMessage,
    ServerMessage,
};

/// Resolves `name` to a namespaced socket where the platform has them, and
/// to a file under `/tmp` otherwise.
///
/// # Errors
/// Fails if `name` isn't valid for the platform.
pub fn socket_name(name: &str) -> io::Result<Name<'static>> {
    if GenericNamespaced::is_supported() {
        name.to_string().to_ns_name::<GenericNamespaced>()
    } else {
        format!("/tmp/{name}").to_fs_name::<GenericFilePath>()
    }
}

/// Accepts connections forever, serving each on its own thread.
///
/// # Errors
/// Fails if the socket can't be created.
pub fn serve(name: &str, bridge: &Arc<Bridge>) -> io::Result<()> {
    fn handle_error(conn: io::Result<Stream>) -> Option<Stream> {
        match conn {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("incoming connection failed: {e}");
                None
            }
        }
    }

    let listener = match ListenerOptions::new().name(socket_name(name)?).create_sync() {
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
            error!("couldn't start server: {name} is in use, is another lullabyd running?");
            return Err(e);
        }
        x => x?,
    };
    info!("listening on {name}");

    for conn in listener.incoming().filter_map(handle_error) {
        let bridge = bridge.clone();
        let spawned = thread::Builder::new()
            .name("lullaby-connection".to_string())
            .spawn(move || {
                debug!("client connected");
                let (recv, send) = conn.split();
                match serve_connection(BufReader::new(recv), send, &bridge) {
                    Ok(()) => debug!("client disconnected"),
                    Err(e) => warn!("client connection ended: {e}"),
                }
            });
        if let Err(e) = spawned {
            error!("couldn't spawn connection thread: {e}");
        }
    }
    Ok(())
}

/// A connected client seen as a UI surface: callbacks are queued for the
/// connection's writer.
#[derive(Debug)]
struct ConnectionSurface {
    outbox: Sender<ServerMessage>,
}

impl ConnectionSurface {
    fn post(&self, message: ServerMessage) {
        if self.outbox.send(message).is_err() {
            debug!("client gone, dropping callback");
        }
    }
}

impl UiSurface for ConnectionSurface {
    fn on_timer_complete(&self, enable_alarm: bool, timer_duration_minutes: i32) {
        self.post(ServerMessage::TimerComplete {
            enable_alarm,
            timer_duration_minutes,
        });
    }

    fn on_ambient_complete(&self, file_name: &str) {
        self.post(ServerMessage::AmbientComplete {
            file_name: file_name.to_string(),
        });
    }
}

fn write_loop<W: Write>(mut writer: W, queued: &Receiver<ServerMessage>) {
    for message in queued {
        if let Err(e) = send(&mut writer, &message) {
            debug!("couldn't write to client: {e}");
            break;
        }
    }
}

/// Serves one client until it hangs up. A connection that attached is
/// detached again on the way out.
///
/// # Errors
/// Fails if reading from the client fails.
pub fn serve_connection<R, W>(mut reader: R, writer: W, bridge: &Bridge) -> Result<(), WireError>
where
    R: BufRead,
    W: Write + Send + 'static,
{
    let (outbox, queued) = crossbeam_channel::unbounded();
    let writer = thread::Builder::new()
        .name("lullaby-connection-writer".to_string())
        .spawn(move || write_loop(writer, &queued))?;
    let surface: Arc<dyn UiSurface> = Arc::new(ConnectionSurface {
        outbox: outbox.clone(),
    });

    let result = loop {
        let answer = match receive::<_, ClientMessage>(&mut reader) {
            Ok(None) => break Ok(()),
            Ok(Some(ClientMessage::Attach)) => {
                bridge.attach(&surface);
                ServerMessage::Status(true)
            }
            Ok(Some(ClientMessage::Detach)) => {
                bridge.detach(&surface);
                ServerMessage::Status(true)
            }
            Ok(Some(message)) => match bridge.handle(&message) {
                Some(answer) => answer,
                None => continue,
            },
            Err(WireError::Json(e)) => {
                warn!("malformed request: {e}");
                ServerMessage::Error(e.to_string())
            }
            Err(e) => break Err(e),
        };
        if outbox.send(answer).is_err() {
            break Err(WireError::Closed);
        }
    };

    bridge.detach(&surface);
    drop(surface);
    drop(outbox);
    if writer.join().is_err() {
        error!("connection writer panicked");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::{
        io::Cursor,
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::{
        config::Config,
        daemon::{tests::platform, Daemon, DeliveryQueue},
        lock,
        scheduler::tests::ManualClock,
    };

    #[derive(Debug, Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            lock(&self.0).extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn requests(messages: &[ClientMessage]) -> Cursor<Vec<u8>> {
        let mut buf = Vec::new();
        for message in messages {
            send(&mut buf, message).unwrap();
        }
        Cursor::new(buf)
    }

    fn answers(out: &SharedBuf) -> Vec<ServerMessage> {
        let mut reader = Cursor::new(lock(&out.0).clone());
        let mut answers = Vec::new();
        while let Some(answer) = receive(&mut reader).unwrap() {
            answers.push(answer);
        }
        answers
    }

    fn daemon() -> Daemon {
        Daemon::start(
            &Config::default(),
            platform(),
            ManualClock::at(0),
            DeliveryQueue::new(),
        )
        .unwrap()
    }

    #[test]
    fn answers_each_request_in_order() {
        let daemon = daemon();
        let out = SharedBuf::default();
        let mut input = requests(&[
            ClientMessage::IsTimerSet,
            ClientMessage::ScheduleTimer {
                delay_seconds: 60,
                enable_alarm: false,
                enable_vibration: true,
                timer_duration_minutes: 1,
            },
            ClientMessage::IsTimerSet,
            ClientMessage::GetAppVersion,
        ])
        .into_inner();
        input.extend_from_slice(b"{\"Bogus\":1}\n");
        send(&mut input, &ClientMessage::CancelTimer).unwrap();

        serve_connection(Cursor::new(input), out.clone(), daemon.bridge()).unwrap();

        let answers = answers(&out);
        assert_eq!(answers.len(), 6);
        assert_eq!(answers[0], ServerMessage::Status(false));
        assert_eq!(answers[1], ServerMessage::Status(true));
        assert_eq!(answers[2], ServerMessage::Status(true));
        assert!(matches!(answers[3], ServerMessage::Version(_)));
        assert!(matches!(answers[4], ServerMessage::Error(_)));
        assert_eq!(answers[5], ServerMessage::Status(true));
    }

    #[test]
    fn hanging_up_detaches_the_ui() {
        let daemon = daemon();
        let out = SharedBuf::default();
        serve_connection(
            requests(&[ClientMessage::Attach]),
            out.clone(),
            daemon.bridge(),
        )
        .unwrap();
        assert_eq!(answers(&out), vec![ServerMessage::Status(true)]);
        assert!(!daemon.attachment().is_attached());
    }

    #[test]
    fn callbacks_are_queued_for_the_writer() {
        let (outbox, queued) = crossbeam_channel::unbounded();
        let surface = ConnectionSurface { outbox };
        surface.on_timer_complete(true, 25);
        surface.on_ambient_complete("bell.mp3");
        assert!(queued.try_recv().unwrap().is_callback());
        assert_eq!(
            queued.try_recv().unwrap(),
            ServerMessage::AmbientComplete {
                file_name: "bell.mp3".to_string()
            }
        );
    }
}
