//! Deterministic scripted implementation of the `chat_protocol` transport
//! contract.
//!
//! This crate contains no socket code. Each submitted turn plays back a
//! scripted reply through the shared event sink, either synchronously or on a
//! pacing worker thread for interactive demos.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chat_protocol::{
    EventSink, FragmentNotification, Transport, TransportError, TransportEvent, TurnId,
    TurnRequest, TurnTagger,
};

/// Stable transport identifier used for explicit startup selection.
pub const MOCK_TRANSPORT_ID: &str = "mock";

/// One scripted action played back in response to a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyStep {
    Notify(FragmentNotification),
    Fail(String),
    Close(Option<String>),
}

/// Builds a reply that streams `lines` as partial notifications and ends with
/// the last line as the terminal notification.
#[must_use]
pub fn reply_lines(lines: &[&str]) -> Vec<ReplyStep> {
    let Some((last, rest)) = lines.split_last() else {
        return vec![ReplyStep::Notify(FragmentNotification::terminal(""))];
    };

    let mut steps: Vec<ReplyStep> = rest
        .iter()
        .map(|line| ReplyStep::Notify(FragmentNotification::partial(*line, "thinking")))
        .collect();
    steps.push(ReplyStep::Notify(FragmentNotification::terminal(*last)));
    steps
}

/// Reply played when the script has no entry left for a turn.
#[must_use]
pub fn default_reply() -> Vec<ReplyStep> {
    reply_lines(&[
        "Here is a Python function that sorts a list of dictionaries by a key:",
        "```python",
        "def sort_by_key(items, key):",
        "    return sorted(items, key=lambda item: item[key])",
        "```",
        "Call it with the list and the name of the key to sort on.",
    ])
}

/// Request captured by the mock when a turn is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTurn {
    pub turn: TurnId,
    pub request: TurnRequest,
}

#[derive(Debug)]
struct MockState {
    open: bool,
    tagger: TurnTagger,
    replies: VecDeque<Vec<ReplyStep>>,
    sent: Vec<SentTurn>,
}

/// Test and demo control over a [`ScriptedTransport`] after it was handed to
/// the session.
#[derive(Debug, Clone)]
pub struct MockHandle {
    sink: EventSink,
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Marks the channel open and reports it.
    pub fn open(&self) {
        lock_unpoisoned(&self.state).open = true;
        deliver(&self.sink, TransportEvent::Opened);
    }

    /// Closes the channel, abandoning outstanding turns.
    pub fn close(&self, reason: Option<&str>) {
        play_step(
            &self.sink,
            &self.state,
            ReplyStep::Close(reason.map(str::to_string)),
        );
    }

    /// Reports a channel error, abandoning outstanding turns.
    pub fn fail(&self, message: &str) {
        play_step(&self.sink, &self.state, ReplyStep::Fail(message.to_string()));
    }

    /// Delivers an unscripted notification through the tagger.
    pub fn notify(&self, notification: FragmentNotification) {
        play_step(&self.sink, &self.state, ReplyStep::Notify(notification));
    }

    /// Queues a reply for the next turn that is sent.
    pub fn push_reply(&self, reply: Vec<ReplyStep>) {
        lock_unpoisoned(&self.state).replies.push_back(reply);
    }

    #[must_use]
    pub fn sent_turns(&self) -> Vec<SentTurn> {
        lock_unpoisoned(&self.state).sent.clone()
    }

    #[must_use]
    pub fn outstanding_turns(&self) -> usize {
        lock_unpoisoned(&self.state).tagger.outstanding()
    }
}

/// Scripted transport used by `genie_session` tests and offline demo runs.
#[derive(Debug)]
pub struct ScriptedTransport {
    handle: MockHandle,
    pacer: Option<Sender<Vec<ReplyStep>>>,
}

impl ScriptedTransport {
    /// Creates an open transport and reports `Opened` on the sink.
    #[must_use]
    pub fn new(sink: EventSink) -> Self {
        let transport = Self::connecting(sink);
        transport.handle.open();
        transport
    }

    /// Creates a transport that stays closed until [`MockHandle::open`].
    #[must_use]
    pub fn connecting(sink: EventSink) -> Self {
        Self {
            handle: MockHandle {
                sink,
                state: Arc::new(Mutex::new(MockState {
                    open: false,
                    tagger: TurnTagger::new(),
                    replies: VecDeque::new(),
                    sent: Vec::new(),
                })),
            },
            pacer: None,
        }
    }

    /// Replaces the queued per-turn replies.
    #[must_use]
    pub fn with_replies(self, replies: Vec<Vec<ReplyStep>>) -> Self {
        lock_unpoisoned(&self.handle.state).replies = replies.into();
        self
    }

    /// Plays replies on a worker thread with `delay` between steps.
    ///
    /// Replies are played one turn at a time in send order.
    pub fn with_step_delay(mut self, delay: Duration) -> Result<Self, TransportError> {
        let (tx, rx) = mpsc::channel();
        let sink = self.handle.sink.clone();
        let state = Arc::clone(&self.handle.state);
        thread::Builder::new()
            .name("chat-transport-mock-pacer".to_string())
            .spawn(move || pace_replies(rx, &sink, &state, delay))
            .map_err(|error| TransportError::Send(format!("failed to spawn pacer: {error}")))?;
        self.pacer = Some(tx);
        Ok(self)
    }

    #[must_use]
    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }
}

impl Transport for ScriptedTransport {
    fn is_open(&self) -> bool {
        lock_unpoisoned(&self.handle.state).open
    }

    fn send_turn(&mut self, turn: TurnId, request: &TurnRequest) -> Result<(), TransportError> {
        let reply = {
            let mut state = lock_unpoisoned(&self.handle.state);
            if !state.open {
                return Err(TransportError::NotConnected);
            }

            state.sent.push(SentTurn {
                turn,
                request: request.clone(),
            });
            state.tagger.sent(turn);
            state.replies.pop_front().unwrap_or_else(default_reply)
        };

        match self.pacer.as_ref() {
            Some(pacer) => pacer.send(reply).map_err(|_| TransportError::Closed),
            None => {
                for step in reply {
                    play_step(&self.handle.sink, &self.handle.state, step);
                }
                Ok(())
            }
        }
    }

    fn abandon_turn(&mut self, turn: TurnId) {
        if lock_unpoisoned(&self.handle.state).tagger.retire(turn) {
            tracing::debug!(turn, "mock turn abandoned");
        }
    }
}

fn pace_replies(
    replies: Receiver<Vec<ReplyStep>>,
    sink: &EventSink,
    state: &Arc<Mutex<MockState>>,
    delay: Duration,
) {
    for reply in replies {
        for step in reply {
            thread::sleep(delay);
            play_step(sink, state, step);
        }
    }
}

fn play_step(sink: &EventSink, state: &Arc<Mutex<MockState>>, step: ReplyStep) {
    let event = {
        let mut state = lock_unpoisoned(state);
        match step {
            ReplyStep::Notify(notification) => {
                TransportEvent::Fragment(state.tagger.tag(notification))
            }
            ReplyStep::Fail(message) => {
                state.tagger.drain();
                TransportEvent::Error { message }
            }
            ReplyStep::Close(reason) => {
                state.open = false;
                state.tagger.drain();
                TransportEvent::Closed { reason }
            }
        }
    };

    deliver(sink, event);
}

fn deliver(sink: &EventSink, event: TransportEvent) {
    if sink.send(event).is_err() {
        tracing::debug!("mock transport event dropped: receiver gone");
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;
    use std::time::Instant;

    use chat_protocol::{FragmentEvent, Role, WireMessage};

    use super::*;

    fn request(text: &str) -> TurnRequest {
        TurnRequest::new(vec![WireMessage::new("u1", Role::User, text)])
    }

    #[test]
    fn new_transport_reports_opened() {
        let (tx, rx) = channel();
        let transport = ScriptedTransport::new(tx);

        assert!(transport.is_open());
        assert_eq!(rx.try_recv().ok(), Some(TransportEvent::Opened));
    }

    #[test]
    fn send_plays_scripted_reply_tagged_with_turn() {
        let (tx, rx) = channel();
        let mut transport = ScriptedTransport::new(tx)
            .with_replies(vec![reply_lines(&["Hi", " there", "!"])]);
        let _ = rx.try_recv();

        transport.send_turn(9, &request("hello")).expect("send");

        let events: Vec<TransportEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                TransportEvent::Fragment(FragmentEvent::partial(9, "Hi")),
                TransportEvent::Fragment(FragmentEvent::partial(9, " there")),
                TransportEvent::Fragment(FragmentEvent::terminal(9, "!")),
            ]
        );
        assert_eq!(transport.handle().sent_turns()[0].turn, 9);
    }

    #[test]
    fn send_on_closed_transport_fails_without_recording() {
        let (tx, _rx) = channel();
        let mut transport = ScriptedTransport::connecting(tx);

        let error = transport
            .send_turn(1, &request("hello"))
            .expect_err("closed transport must reject sends");

        assert!(matches!(error, TransportError::NotConnected));
        assert!(transport.handle().sent_turns().is_empty());
    }

    #[test]
    fn close_step_marks_transport_closed_and_drops_outstanding_turns() {
        let (tx, rx) = channel();
        let mut transport = ScriptedTransport::new(tx).with_replies(vec![vec![
            ReplyStep::Notify(FragmentNotification::partial("partial", "thinking")),
            ReplyStep::Close(Some("server gone".to_string())),
        ]]);

        transport.send_turn(2, &request("hello")).expect("send");

        let events: Vec<TransportEvent> = rx.try_iter().collect();
        assert_eq!(
            events.last(),
            Some(&TransportEvent::Closed {
                reason: Some("server gone".to_string())
            })
        );
        assert!(!transport.is_open());
        assert_eq!(transport.handle().outstanding_turns(), 0);
    }

    #[test]
    fn abandoned_turn_no_longer_claims_notifications() {
        let (tx, rx) = channel();
        let mut transport = ScriptedTransport::new(tx).with_replies(vec![
            vec![ReplyStep::Notify(FragmentNotification::partial("stuck", "thinking"))],
            reply_lines(&["fresh"]),
        ]);
        let _ = rx.try_recv();

        transport.send_turn(1, &request("first")).expect("send first");
        transport.abandon_turn(1);
        assert_eq!(transport.handle().outstanding_turns(), 0);

        transport.send_turn(2, &request("second")).expect("send second");
        let events: Vec<TransportEvent> = rx.try_iter().collect();
        assert_eq!(
            events.last(),
            Some(&TransportEvent::Fragment(FragmentEvent::terminal(2, "fresh")))
        );
        assert_eq!(transport.handle().outstanding_turns(), 0);
    }

    #[test]
    fn empty_reply_lines_still_terminate_the_turn() {
        assert_eq!(
            reply_lines(&[]),
            vec![ReplyStep::Notify(FragmentNotification::terminal(""))]
        );
    }

    #[test]
    fn paced_replies_arrive_in_order() {
        let (tx, rx) = channel();
        let mut transport = ScriptedTransport::new(tx)
            .with_replies(vec![reply_lines(&["a", "b"])])
            .with_step_delay(Duration::from_millis(1))
            .expect("spawn pacer");
        let _ = rx.recv();

        transport.send_turn(3, &request("go")).expect("send");

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while events.len() < 2 && Instant::now() < deadline {
            if let Ok(event) = rx.recv_timeout(Duration::from_millis(50)) {
                events.push(event);
            }
        }

        assert_eq!(
            events,
            vec![
                TransportEvent::Fragment(FragmentEvent::partial(3, "a")),
                TransportEvent::Fragment(FragmentEvent::terminal(3, "b")),
            ]
        );
    }
}
