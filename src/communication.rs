use std::{
    collections::VecDeque,
    io::{self, BufRead, BufReader, Write},
};

use interprocess::local_socket::{prelude::*, RecvHalf, SendHalf, Stream};
use log::debug;
use lullabyd::{receive, send, ClientMessage, ServerMessage};

use crate::{ClientError, UiEvent};

/// A request/response channel to the daemon. Callbacks that arrive while a
/// request is waiting for its answer are held back for [`Self::next_event`].
#[derive(Debug)]
pub struct Connection<R, W> {
    reader: R,
    writer: W,
    held: VecDeque<UiEvent>,
}

impl<R: BufRead, W: Write> Connection<R, W> {
    pub const fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            held: VecDeque::new(),
        }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Sends `message` and waits for the answer to it.
    ///
    /// # Errors
    /// Fails if the daemon hangs up or the connection breaks.
    pub fn request(&mut self, message: &ClientMessage) -> Result<ServerMessage, ClientError> {
        send(&mut self.writer, message)?;
        loop {
            match receive::<_, ServerMessage>(&mut self.reader)? {
                None => return Err(ClientError::Closed),
                Some(answer) => match UiEvent::from_message(answer) {
                    Ok(event) => {
                        debug!("holding {event:?} until the current request is answered");
                        self.held.push_back(event);
                    }
                    Err(answer) => return Ok(answer),
                },
            }
        }
    }

    /// The next callback from the daemon, waiting for one if none is held.
    /// Returns `Ok(None)` once the daemon hangs up.
    ///
    /// # Errors
    /// Fails if the connection breaks.
    pub fn next_event(&mut self) -> Result<Option<UiEvent>, ClientError> {
        if let Some(event) = self.held.pop_front() {
            return Ok(Some(event));
        }
        loop {
            match receive::<_, ServerMessage>(&mut self.reader)? {
                None => return Ok(None),
                Some(message) => match UiEvent::from_message(message) {
                    Ok(event) => return Ok(Some(event)),
                    Err(stray) => debug!("ignoring unsolicited {stray:?}"),
                },
            }
        }
    }
}

/// Connects to the daemon listening on `name`.
///
/// # Errors
/// Fails if no daemon is listening.
pub fn connect(name: &str) -> io::Result<Connection<BufReader<RecvHalf>, SendHalf>> {
    let conn = Stream::connect(lullabyd::server::socket_name(name)?)?;
    let (recv, send) = conn.split();
    Ok(Connection::new(BufReader::new(recv), send))
}
