//! A scripted stand-in for a board: answers each command line through a
//! responder closure and lets tests inject unsolicited lines.

#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use eibot_board::{Session, SessionConfig};

type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

/// Handle the test keeps to drive the fake board.
pub struct Board {
    inject: mpsc::Sender<Vec<u8>>,
    hung_up: Arc<AtomicBool>,
    written: Arc<Mutex<Vec<String>>>,
}

impl Board {
    /// Push raw bytes towards the host as if the board sent them.
    pub fn inject(&self, bytes: &str) {
        self.inject
            .send(bytes.as_bytes().to_vec())
            .expect("reader should still be alive");
    }

    /// Make the read side report EOF from now on.
    pub fn hang_up(&self) {
        self.hung_up.store(true, Ordering::SeqCst);
    }

    /// Every command line the host wrote, without terminators.
    pub fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }
}

pub struct BoardReader {
    incoming: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
    hung_up: Arc<AtomicBool>,
}

impl Read for BoardReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.hung_up.load(Ordering::SeqCst) {
            return Ok(0);
        }
        if self.pending.is_empty() {
            match self.incoming.recv_timeout(Duration::from_millis(10)) {
                Ok(bytes) => self.pending = bytes,
                Err(RecvTimeoutError::Timeout) => return Err(io::ErrorKind::TimedOut.into()),
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
            if self.hung_up.load(Ordering::SeqCst) {
                return Ok(0);
            }
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

pub struct BoardWriter {
    partial: Vec<u8>,
    written: Arc<Mutex<Vec<String>>>,
    replies: mpsc::Sender<Vec<u8>>,
    responder: Responder,
}

impl Write for BoardWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.partial.extend_from_slice(buf);
        while let Some(pos) = self.partial.iter().position(|b| *b == b'\r') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.written.lock().unwrap().push(text.clone());
            if let Some(reply) = (self.responder)(&text) {
                let _ = self.replies.send(reply.into_bytes());
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn board<F>(responder: F) -> (BoardReader, BoardWriter, Board)
where
    F: FnMut(&str) -> Option<String> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let hung_up = Arc::new(AtomicBool::new(false));
    let written = Arc::new(Mutex::new(Vec::new()));

    let reader = BoardReader {
        incoming: rx,
        pending: Vec::new(),
        hung_up: Arc::clone(&hung_up),
    };
    let writer = BoardWriter {
        partial: Vec::new(),
        written: Arc::clone(&written),
        replies: tx.clone(),
        responder: Box::new(responder),
    };
    let handle = Board {
        inject: tx,
        hung_up,
        written,
    };
    (reader, writer, handle)
}

/// Config that keeps a broken test from hanging forever.
pub fn test_config() -> SessionConfig {
    SessionConfig {
        response_timeout: Some(Duration::from_secs(5)),
        poll_interval: Duration::from_millis(10),
        ..SessionConfig::default()
    }
}

pub fn session<F>(responder: F) -> (Session<BoardWriter>, Board)
where
    F: FnMut(&str) -> Option<String> + Send + 'static,
{
    session_with_config(responder, test_config())
}

pub fn session_with_config<F>(responder: F, config: SessionConfig) -> (Session<BoardWriter>, Board)
where
    F: FnMut(&str) -> Option<String> + Send + 'static,
{
    let (reader, writer, handle) = board(responder);
    let session = Session::from_parts(reader, writer, config).expect("session should start");
    (session, handle)
}

/// Answer every command with a bare acknowledgement.
pub fn ack_all(_line: &str) -> Option<String> {
    Some("OK\r\n".to_string())
}

/// Poll `condition` until it holds or a few seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
