use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use eibot_line::{LineConfig, LineError, LineReader, LineWriter, DEFAULT_MAX_LINE};
use eibot_transport::{BoardStream, LinkConfig, SerialLink, TransportError};
use tracing::{debug, info, trace, warn};

use crate::command::Command;
use crate::decode::decode_reply;
use crate::error::{BoardError, Result};
use crate::push::{PushKind, PushRouter};

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a command waits for its reply. `None` waits until the board
    /// answers or the connection ends.
    pub response_timeout: Option<Duration>,
    /// Longest accepted inbound line; longer lines are discarded.
    pub max_line_len: usize,
    /// Read timeout of the ingest thread. Bounds how long `close` takes on
    /// transports that cannot be interrupted.
    pub poll_interval: Duration,
    /// Send `R` right after [`Session::open`] so the board starts from a known state.
    pub reset_on_open: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_timeout: None,
            max_line_len: DEFAULT_MAX_LINE,
            poll_interval: Duration::from_millis(100),
            reset_on_open: true,
        }
    }
}

/// Messages from the ingest thread to the reply path.
enum Inbound {
    Line(String),
    Closed(String),
}

type Closer = Box<dyn FnOnce() + Send>;

/// A live command/response session with one board.
///
/// Every command method takes `&mut self`, so at most one command is in
/// flight. A background thread reads the board continuously and routes each
/// line either to the reply queue or to the active push subscription.
pub struct Session<W: Write = BoardStream> {
    writer: LineWriter<W>,
    replies: mpsc::Receiver<Inbound>,
    pub(crate) router: Arc<PushRouter>,
    pub(crate) dispatcher: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    ingest: Option<JoinHandle<()>>,
    closer: Option<Closer>,
    config: SessionConfig,
    disconnected: Option<String>,
    closed: bool,
}

impl Session<BoardStream> {
    /// Open the serial port at `path` and start a session on it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, &LinkConfig::default(), SessionConfig::default())
    }

    /// Open with explicit link and session configuration.
    ///
    /// Resets the board afterwards when `config.reset_on_open` is set.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        link: &LinkConfig,
        config: SessionConfig,
    ) -> Result<Self> {
        let stream = SerialLink::open_with_config(path, link)?;
        let reset = config.reset_on_open;
        let mut session = Self::from_stream(stream, config)?;
        if reset {
            session.reset()?;
        }
        Ok(session)
    }

    /// Start a session on an already opened stream.
    pub fn from_stream(stream: BoardStream, config: SessionConfig) -> Result<Self> {
        let mut reader = stream.try_clone()?;
        reader.set_read_timeout(Some(config.poll_interval))?;
        let closer = stream.try_clone()?;

        let mut session = Self::from_parts(reader, stream, config)?;
        session.closer = Some(Box::new(move || {
            if let Err(err) = closer.shutdown() {
                debug!(%err, "stream shutdown failed");
            }
        }));
        Ok(session)
    }
}

impl<W: Write> Session<W> {
    /// Start a session on explicit read and write halves.
    ///
    /// `close` joins the ingest thread, so `reader` must eventually return
    /// EOF, an error, or a read timeout once the session is closed.
    pub fn from_parts<R>(reader: R, writer: W, config: SessionConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let line_config = LineConfig {
            max_line_len: config.max_line_len,
        };
        let reader = LineReader::with_config(reader, line_config.clone());
        let writer = LineWriter::with_config(writer, line_config);

        let (tx, replies) = mpsc::channel();
        let router = Arc::new(PushRouter::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let ingest = {
            let router = Arc::clone(&router);
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name("eibot-ingest".to_string())
                .spawn(move || ingest(reader, tx, &router, &shutdown))
                .map_err(TransportError::Io)?
        };

        info!("board session started");
        Ok(Self {
            writer,
            replies,
            router,
            dispatcher: None,
            shutdown,
            ingest: Some(ingest),
            closer: None,
            config,
            disconnected: None,
            closed: false,
        })
    }

    /// Send `command` and return the payload of its reply.
    ///
    /// Replies left over from earlier commands are discarded first. An error
    /// sentinel in the reply is raised as [`BoardError::Protocol`].
    pub fn execute(&mut self, command: &Command) -> Result<String> {
        self.transact(&command.to_string())
    }

    /// Send a pre-formatted command line and return the payload of its reply.
    pub fn execute_raw(&mut self, line: &str) -> Result<String> {
        self.transact(line)
    }

    /// `execute` plus the trailing acknowledgement that query commands send
    /// after their value.
    pub fn query(&mut self, command: &Command) -> Result<String> {
        let value = self.execute(command)?;
        self.read_ack()?;
        Ok(value)
    }

    /// Read and decode the next reply line.
    pub fn read_response(&mut self) -> Result<String> {
        let line = self.next_reply()?;
        decode_reply(&line).map(str::to_string)
    }

    /// Whether a push subscription is currently routing packets.
    pub fn push_active(&self) -> bool {
        self.router.is_active()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Cancel any subscription, stop the ingest thread and release the transport.
    ///
    /// Idempotent. Every later command fails with [`BoardError::Closed`].
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(mode) = self.router.clear() {
            if self.disconnected.is_none() {
                let line = format!("T,0,{}", mode.code());
                if let Err(err) = self.writer.send(&line) {
                    debug!(%err, "could not stop board timer");
                }
            }
        }

        self.shutdown.store(true, Ordering::Release);
        if let Some(closer) = self.closer.take() {
            closer();
        }
        if let Some(handle) = self.ingest.take() {
            if handle.join().is_err() {
                warn!("ingest thread panicked");
            }
        }
        if let Some(handle) = self.dispatcher.take() {
            if handle.join().is_err() {
                warn!("push listener panicked");
            }
        }

        info!("board session closed");
        Ok(())
    }

    /// Send `command` and wait for its acknowledgement.
    ///
    /// Push packets that reach the reply path in the meantime are dropped.
    pub(crate) fn acknowledge(&mut self, command: &Command) -> Result<()> {
        let line = command.to_string();
        self.prepare()?;
        debug!(command = %line, "sending command");
        self.writer.send(&line)?;
        self.await_ack(command.opcode())
    }

    /// Send `head`, the raw `payload`, and the terminator, then read the ack.
    pub(crate) fn acknowledge_raw(&mut self, head: &str, payload: &[u8]) -> Result<()> {
        self.prepare()?;
        debug!(command = head, len = payload.len(), "sending raw command");
        self.writer.send_raw(head, payload)?;
        self.await_ack(head)
    }

    pub(crate) fn ensure_open(&mut self) -> Result<()> {
        if self.closed {
            return Err(BoardError::Closed);
        }
        match &self.disconnected {
            Some(reason) => Err(BoardError::Disconnected(reason.clone())),
            None => Ok(()),
        }
    }

    fn transact(&mut self, line: &str) -> Result<String> {
        self.prepare()?;
        debug!(command = line, "sending command");
        self.writer.send(line)?;
        self.read_response()
    }

    fn read_ack(&mut self) -> Result<()> {
        self.await_ack("query")
    }

    fn await_ack(&mut self, context: &str) -> Result<()> {
        loop {
            let reply = self.read_response()?;
            if PushKind::of_line(&reply).is_some() {
                trace!(%reply, "dropping push packet while awaiting acknowledgement");
                continue;
            }
            check_ack(context, &reply);
            return Ok(());
        }
    }

    /// Drop stale replies and make sure the connection is still usable.
    fn prepare(&mut self) -> Result<()> {
        self.ensure_open()?;
        while let Ok(message) = self.replies.try_recv() {
            match message {
                Inbound::Line(line) => debug!(%line, "discarding stale reply"),
                Inbound::Closed(reason) => self.disconnected = Some(reason),
            }
        }
        self.ensure_open()
    }

    fn next_reply(&mut self) -> Result<String> {
        self.ensure_open()?;

        let message = match self.config.response_timeout {
            None => self.replies.recv().ok(),
            Some(timeout) => match self.replies.recv_timeout(timeout) {
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => return Err(BoardError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => None,
            },
        };

        match message {
            Some(Inbound::Line(line)) => {
                debug!(%line, "received reply");
                Ok(line)
            }
            Some(Inbound::Closed(reason)) => {
                self.disconnected = Some(reason.clone());
                Err(BoardError::Disconnected(reason))
            }
            None => {
                let reason = "ingest thread stopped".to_string();
                self.disconnected = Some(reason.clone());
                Err(BoardError::Disconnected(reason))
            }
        }
    }
}

impl<W: Write> Drop for Session<W> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn check_ack(context: &str, reply: &str) {
    if !reply.eq_ignore_ascii_case("OK") {
        debug!(context, %reply, "unexpected acknowledgement");
    }
}

fn ingest<R: Read>(
    mut reader: LineReader<R>,
    replies: mpsc::Sender<Inbound>,
    router: &PushRouter,
    shutdown: &AtomicBool,
) {
    let reason = loop {
        if shutdown.load(Ordering::Acquire) {
            break "session closed".to_string();
        }

        match reader.read_line() {
            Ok(line) => {
                trace!(%line, "ingested line");
                if let Some(line) = router.route(line) {
                    if replies.send(Inbound::Line(line)).is_err() {
                        break "session dropped".to_string();
                    }
                }
            }
            Err(LineError::Io(err))
                if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) =>
            {
                continue
            }
            Err(LineError::LineTooLong { size, max }) => {
                warn!(size, max, "discarding overlong line");
            }
            Err(LineError::ConnectionClosed) => break "connection closed by board".to_string(),
            Err(err) => break err.to_string(),
        }
    };

    if shutdown.load(Ordering::Acquire) {
        debug!(%reason, "ingest stopped");
    } else {
        warn!(%reason, "board connection lost");
    }
    let _ = replies.send(Inbound::Closed(reason));
}
