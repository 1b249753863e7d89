//! WebSocket implementation of the `chat_protocol` transport contract.
//!
//! The socket is driven by a single-threaded tokio runtime on a dedicated I/O
//! thread. Outgoing turn frames are handed to that thread through a channel;
//! every incoming notification and lifecycle change is attributed by a
//! [`TurnTagger`] and forwarded through one [`EventSink`], so the session
//! observes a single serialized event stream.

pub mod config;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use chat_protocol::{
    EventSink, FragmentNotification, Transport, TransportError, TransportEvent, TurnId,
    TurnRequest, TurnTagger,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;

pub use config::{
    normalize_server_url, WsConfigError, WsTransportConfig, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_SERVER_URL,
};

/// Stable transport identifier used for explicit startup selection.
pub const WS_TRANSPORT_ID: &str = "ws";

#[derive(Debug)]
struct Shared {
    open: AtomicBool,
    tagger: Mutex<TurnTagger>,
    sink: EventSink,
}

impl Shared {
    fn deliver(&self, event: TransportEvent) {
        if self.sink.send(event).is_err() {
            tracing::debug!("websocket transport event dropped: receiver gone");
        }
    }

    fn notify(&self, notification: FragmentNotification) {
        let event = lock_unpoisoned(&self.tagger).tag(notification);
        if event.turn.is_none() {
            tracing::warn!(kind = ?event.kind, "notification received with no outstanding turn");
        }
        self.deliver(TransportEvent::Fragment(event));
    }

    fn mark_closed(&self) -> Vec<TurnId> {
        self.open.store(false, Ordering::SeqCst);
        lock_unpoisoned(&self.tagger).drain()
    }
}

/// WebSocket Transport Adapter.
#[derive(Debug)]
pub struct WsTransport {
    shared: Arc<Shared>,
    outgoing: UnboundedSender<String>,
    worker: Option<JoinHandle<()>>,
}

impl WsTransport {
    /// Starts connecting in the background and returns immediately.
    ///
    /// `Opened` is delivered on `sink` once the handshake succeeds; a failed
    /// handshake delivers `Error` followed by `Closed`.
    pub fn connect(config: WsTransportConfig, sink: EventSink) -> Result<Self, TransportError> {
        let shared = Arc::new(Shared {
            open: AtomicBool::new(false),
            tagger: Mutex::new(TurnTagger::new()),
            sink,
        });
        let (outgoing, frames) = unbounded_channel();

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("chat-transport-ws".to_string())
            .spawn(move || run_io_thread(config, frames, worker_shared))
            .map_err(|error| TransportError::Send(format!("failed to spawn I/O thread: {error}")))?;

        Ok(Self {
            shared,
            outgoing,
            worker: Some(worker),
        })
    }
}

impl Transport for WsTransport {
    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    fn send_turn(&mut self, turn: TurnId, request: &TurnRequest) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotConnected);
        }

        let frame = request.to_json()?;
        lock_unpoisoned(&self.shared.tagger).sent(turn);
        if self.outgoing.send(frame).is_err() {
            self.shared.mark_closed();
            return Err(TransportError::Closed);
        }

        tracing::debug!(turn, messages = request.messages.len(), "turn frame queued");
        Ok(())
    }

    fn abandon_turn(&mut self, turn: TurnId) {
        if lock_unpoisoned(&self.shared.tagger).retire(turn) {
            tracing::debug!(turn, "turn abandoned");
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                let _ = worker.join();
            }
        }
    }
}

fn run_io_thread(
    config: WsTransportConfig,
    frames: UnboundedReceiver<String>,
    shared: Arc<Shared>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            shared.deliver(TransportEvent::Error {
                message: format!("failed to initialize tokio runtime: {error}"),
            });
            shared.deliver(TransportEvent::Closed { reason: None });
            return;
        }
    };

    runtime.block_on(run_connection(config, frames, &shared));
}

async fn run_connection(
    config: WsTransportConfig,
    mut frames: UnboundedReceiver<String>,
    shared: &Shared,
) {
    let handshake = tokio::time::timeout(
        config.connect_timeout,
        tokio_tungstenite::connect_async(config.url.as_str()),
    )
    .await;

    let stream = match handshake {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(error)) => {
            fail_connection(shared, format!("WebSocket connection failed: {error}"));
            return;
        }
        Err(_) => {
            fail_connection(
                shared,
                format!(
                    "WebSocket connection timed out after {}s",
                    config.connect_timeout.as_secs()
                ),
            );
            return;
        }
    };

    tracing::info!(url = %config.url, "websocket connected");
    shared.open.store(true, Ordering::SeqCst);
    shared.deliver(TransportEvent::Opened);

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    let _ = write.close().await;
                    shared.mark_closed();
                    return;
                };

                if let Err(error) = write.send(Message::Text(frame)).await {
                    abandon(shared, format!("WebSocket send failed: {error}"));
                    return;
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => handle_frame(shared, &text),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => handle_frame(shared, &text),
                        Err(_) => tracing::warn!("dropping non UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|frame| frame.reason.to_string())
                            .filter(|reason| !reason.is_empty());
                        close_connection(shared, reason);
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        abandon(shared, format!("WebSocket error: {error}"));
                        return;
                    }
                    None => {
                        close_connection(shared, None);
                        return;
                    }
                }
            }
        }
    }
}

fn handle_frame(shared: &Shared, frame: &str) {
    match FragmentNotification::parse(frame) {
        Ok(notification) => shared.notify(notification),
        Err(error) => tracing::warn!(%error, "dropping malformed notification frame"),
    }
}

fn fail_connection(shared: &Shared, message: String) {
    tracing::warn!(%message, "websocket unavailable");
    abandon(shared, message);
}

fn abandon(shared: &Shared, message: String) {
    let abandoned = shared.mark_closed();
    if !abandoned.is_empty() {
        tracing::debug!(?abandoned, "turns abandoned by transport error");
    }
    shared.deliver(TransportEvent::Error { message });
    shared.deliver(TransportEvent::Closed { reason: None });
}

fn close_connection(shared: &Shared, reason: Option<String>) {
    tracing::info!(?reason, "websocket disconnected");
    shared.mark_closed();
    shared.deliver(TransportEvent::Closed { reason });
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
