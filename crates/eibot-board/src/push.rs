use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::decode::parse_tagged;
use crate::error::{BoardError, Result};
use crate::types::TimerMode;

/// Which input class a push packet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushKind {
    /// `I,...` digital port state.
    Digital,
    /// `A,...` analog channel values.
    Analog,
}

impl PushKind {
    /// Classify a line by its first character, case-insensitively.
    pub fn of_line(line: &str) -> Option<Self> {
        match line.chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('I') => Some(PushKind::Digital),
            Some('A') => Some(PushKind::Analog),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            PushKind::Digital => "I",
            PushKind::Analog => "A",
        }
    }
}

/// One unsolicited sample delivered while a timer subscription is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushPacket {
    pub kind: PushKind,
    pub values: Vec<u32>,
}

impl PushPacket {
    /// Parse an `I,...` or `A,...` line.
    pub fn parse(line: &str) -> Result<Self> {
        let kind = PushKind::of_line(line)
            .ok_or_else(|| BoardError::parse(line, "not a push packet"))?;
        let values = parse_tagged(line, kind.tag())?;
        Ok(Self { kind, values })
    }
}

/// Receives push packets on the subscription's dispatcher thread.
///
/// Closures taking a [`PushPacket`] implement this trait.
pub trait PushListener: Send + 'static {
    fn on_packet(&mut self, packet: PushPacket);

    /// Called for a push-tagged line that does not parse.
    fn on_error(&mut self, line: &str, error: BoardError) {
        warn!(%line, %error, "dropping malformed push packet");
    }
}

impl<F> PushListener for F
where
    F: FnMut(PushPacket) + Send + 'static,
{
    fn on_packet(&mut self, packet: PushPacket) {
        self(packet)
    }
}

pub(crate) enum PushSink {
    Queue(mpsc::Sender<String>),
    #[cfg(feature = "async")]
    Async(tokio::sync::mpsc::UnboundedSender<String>),
}

impl PushSink {
    fn deliver(&self, line: String) -> std::result::Result<(), String> {
        match self {
            PushSink::Queue(tx) => tx.send(line).map_err(|err| err.0),
            #[cfg(feature = "async")]
            PushSink::Async(tx) => tx.send(line).map_err(|err| err.0),
        }
    }
}

/// The live subscription: where push lines go and whether they still may.
pub(crate) struct PushRoute {
    pub(crate) sink: PushSink,
    pub(crate) active: Arc<AtomicBool>,
    pub(crate) mode: TimerMode,
    pub(crate) interval_ms: u32,
}

/// Shared slot read by the ingest thread and swapped by subscribe/cancel.
#[derive(Default)]
pub(crate) struct PushRouter {
    slot: RwLock<Option<PushRoute>>,
}

impl PushRouter {
    /// Hand `line` to the active subscription.
    ///
    /// Returns the line back when it belongs on the reply path.
    pub(crate) fn route(&self, line: String) -> Option<String> {
        let Some(kind) = PushKind::of_line(&line) else {
            return Some(line);
        };

        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(route) if route.active.load(Ordering::Acquire) => match route.sink.deliver(line) {
                Ok(()) => None,
                Err(line) => {
                    trace!(%line, "push consumer gone; routing to replies");
                    Some(line)
                }
            },
            _ => {
                trace!(?kind, %line, "no push subscription; routing to replies");
                Some(line)
            }
        }
    }

    /// Install `route`, deactivating any route it replaces.
    pub(crate) fn install(&self, route: PushRoute) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(route) {
            previous.active.store(false, Ordering::Release);
            debug!(interval_ms = previous.interval_ms, "replaced push subscription");
        }
    }

    /// Deactivate and remove the current route. Returns its mode, if any.
    pub(crate) fn clear(&self) -> Option<TimerMode> {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        slot.take().map(|route| {
            route.active.store(false, Ordering::Release);
            route.mode
        })
    }

    pub(crate) fn is_active(&self) -> bool {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        slot.as_ref()
            .is_some_and(|route| route.active.load(Ordering::Acquire))
    }
}

/// Spawn the dispatcher thread that feeds `listener` in arrival order.
pub(crate) fn spawn_dispatcher<L: PushListener>(
    lines: mpsc::Receiver<String>,
    active: Arc<AtomicBool>,
    listener: L,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("eibot-push".to_string())
        .spawn(move || dispatch(lines, &active, listener))
}

fn dispatch<L: PushListener>(lines: mpsc::Receiver<String>, active: &AtomicBool, mut listener: L) {
    while let Ok(line) = lines.recv() {
        if !active.load(Ordering::Acquire) {
            break;
        }
        match PushPacket::parse(&line) {
            Ok(packet) => listener.on_packet(packet),
            Err(err) => listener.on_error(&line, err),
        }
    }
    debug!("push dispatcher stopped");
}

/// Blocking iterator over push packets.
///
/// Ends when the subscription is cancelled, replaced, or the session closes.
pub struct PushStream {
    lines: mpsc::Receiver<String>,
    active: Arc<AtomicBool>,
}

impl PushStream {
    pub(crate) fn new(lines: mpsc::Receiver<String>, active: Arc<AtomicBool>) -> Self {
        Self { lines, active }
    }

    /// Whether the subscription feeding this stream is still live.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Iterator for PushStream {
    type Item = Result<PushPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.is_active() {
            return None;
        }
        let line = self.lines.recv().ok()?;
        if !self.is_active() {
            return None;
        }
        Some(PushPacket::parse(&line))
    }
}

#[cfg(feature = "async")]
pub use async_stream::AsyncPushStream;

#[cfg(feature = "async")]
mod async_stream {
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::PushPacket;
    use crate::error::Result;

    /// `futures_core::Stream` of push packets for async callers.
    pub struct AsyncPushStream {
        lines: UnboundedReceiver<String>,
        active: Arc<AtomicBool>,
    }

    impl AsyncPushStream {
        pub(crate) fn new(lines: UnboundedReceiver<String>, active: Arc<AtomicBool>) -> Self {
            Self { lines, active }
        }
    }

    impl futures_core::Stream for AsyncPushStream {
        type Item = Result<PushPacket>;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            if !self.active.load(Ordering::Acquire) {
                return Poll::Ready(None);
            }
            match self.lines.poll_recv(cx) {
                Poll::Ready(Some(line)) if self.active.load(Ordering::Acquire) => {
                    Poll::Ready(Some(PushPacket::parse(&line)))
                }
                Poll::Ready(_) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn queue_route(mode: TimerMode) -> (PushRoute, mpsc::Receiver<String>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel();
        let active = Arc::new(AtomicBool::new(true));
        let route = PushRoute {
            sink: PushSink::Queue(tx),
            active: Arc::clone(&active),
            mode,
            interval_ms: 100,
        };
        (route, rx, active)
    }

    #[test]
    fn parses_packets() {
        assert_eq!(
            PushPacket::parse("I,1,2,3").unwrap(),
            PushPacket {
                kind: PushKind::Digital,
                values: vec![1, 2, 3]
            }
        );
        assert_eq!(
            PushPacket::parse("a,500").unwrap(),
            PushPacket {
                kind: PushKind::Analog,
                values: vec![500]
            }
        );
        assert!(PushPacket::parse("OK").is_err());
    }

    #[test]
    fn lines_go_to_replies_without_subscription() {
        let router = PushRouter::default();
        assert_eq!(router.route("I,1,2,3".into()).as_deref(), Some("I,1,2,3"));
        assert!(!router.is_active());
    }

    #[test]
    fn tagged_lines_go_to_subscription() {
        let router = PushRouter::default();
        let (route, rx, _active) = queue_route(TimerMode::Digital);
        router.install(route);

        assert!(router.route("I,1,2,3".into()).is_none());
        assert!(router.route("a,7".into()).is_none());
        assert_eq!(router.route("OK".into()).as_deref(), Some("OK"));
        assert_eq!(rx.try_recv().unwrap(), "I,1,2,3");
        assert_eq!(rx.try_recv().unwrap(), "a,7");
    }

    #[test]
    fn install_deactivates_previous_route() {
        let router = PushRouter::default();
        let (first, _rx1, first_active) = queue_route(TimerMode::Digital);
        let (second, _rx2, second_active) = queue_route(TimerMode::Analog);

        router.install(first);
        router.install(second);

        assert!(!first_active.load(Ordering::SeqCst));
        assert!(second_active.load(Ordering::SeqCst));
        assert_eq!(router.clear(), Some(TimerMode::Analog));
        assert!(!second_active.load(Ordering::SeqCst));
        assert_eq!(router.clear(), None);
    }

    #[test]
    fn dropped_consumer_falls_back_to_replies() {
        let router = PushRouter::default();
        let (route, rx, _active) = queue_route(TimerMode::Digital);
        router.install(route);
        drop(rx);

        assert_eq!(router.route("I,0,0,0".into()).as_deref(), Some("I,0,0,0"));
    }

    #[test]
    fn deactivated_listener_gets_nothing_already_queued() {
        let (tx, rx) = mpsc::channel();
        for _ in 0..5 {
            tx.send("I,1,2,3".to_string()).unwrap();
        }
        drop(tx);

        let active = AtomicBool::new(false);
        let seen = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&seen);
        dispatch(rx, &active, move |_packet: PushPacket| {
            *counter.lock().unwrap() += 1;
        });

        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn dispatcher_delivers_in_order_and_reports_garbage() {
        struct Recorder {
            packets: Arc<Mutex<Vec<PushPacket>>>,
            errors: Arc<Mutex<Vec<String>>>,
        }

        impl PushListener for Recorder {
            fn on_packet(&mut self, packet: PushPacket) {
                self.packets.lock().unwrap().push(packet);
            }

            fn on_error(&mut self, line: &str, _error: BoardError) {
                self.errors.lock().unwrap().push(line.to_string());
            }
        }

        let packets = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();
        for line in ["I,1,2,3", "I,x", "A,500"] {
            tx.send(line.to_string()).unwrap();
        }
        drop(tx);

        let active = AtomicBool::new(true);
        dispatch(
            rx,
            &active,
            Recorder {
                packets: Arc::clone(&packets),
                errors: Arc::clone(&errors),
            },
        );

        let packets = packets.lock().unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].kind, PushKind::Digital);
        assert_eq!(packets[1].values, vec![500]);
        assert_eq!(*errors.lock().unwrap(), vec!["I,x".to_string()]);
    }

    #[test]
    fn stream_ends_when_deactivated() {
        let (tx, rx) = mpsc::channel();
        let active = Arc::new(AtomicBool::new(true));
        let mut stream = PushStream::new(rx, Arc::clone(&active));

        tx.send("A,1,2".to_string()).unwrap();
        let packet = stream.next().unwrap().unwrap();
        assert_eq!(packet.values, vec![1, 2]);

        tx.send("A,3".to_string()).unwrap();
        active.store(false, Ordering::SeqCst);
        assert!(stream.next().is_none());
    }

    #[test]
    fn packet_serializes() {
        let json = serde_json::to_string(&PushPacket {
            kind: PushKind::Analog,
            values: vec![1, 2],
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"analog","values":[1,2]}"#);
    }
}
