//! Session controller: owns the transcript and drives one turn at a time.

use std::time::Instant;

use chat_protocol::{TransportError, TransportEvent, TurnId, TurnRequest};

use crate::assembler::{AssemblerConfig, Assembly, StreamAssembler, TurnPhase};
use crate::error::{Notice, SessionError};
use crate::message::Message;

/// Effects the controller asks of its host.
pub trait SessionHost {
    /// Hands the transcript snapshot for `turn` to the transport.
    fn send_turn(&mut self, turn: TurnId, request: &TurnRequest) -> Result<(), TransportError>;
    /// Tells the transport the session no longer waits on `turn`.
    fn abandon_turn(&mut self, turn: TurnId);
    fn notify(&mut self, notice: Notice);
    fn request_render(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed { reason: Option<String> },
}

#[derive(Debug, Clone)]
pub struct SessionController {
    transcript: Vec<Message>,
    assembler: StreamAssembler,
    pending: Option<TurnId>,
    next_turn: TurnId,
    connection: ConnectionState,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(AssemblerConfig::default())
    }
}

impl SessionController {
    #[must_use]
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            transcript: Vec::new(),
            assembler: StreamAssembler::new(config),
            pending: None,
            next_turn: 1,
            connection: ConnectionState::Connecting,
        }
    }

    /// Appends a user message and sends the transcript for a new turn.
    ///
    /// Returns as soon as the request is handed to the host. Replies arrive
    /// later through [`SessionController::apply_event`].
    pub fn submit(
        &mut self,
        text: &str,
        host: &mut dyn SessionHost,
        now: Instant,
    ) -> Result<TurnId, SessionError> {
        if text.trim().is_empty() {
            return Err(self.reject(SessionError::empty_input(), host));
        }
        if self.pending.is_some() {
            return Err(self.reject(SessionError::turn_pending(), host));
        }

        self.transcript.push(Message::user(text));
        let turn = self.next_turn;
        self.next_turn += 1;

        if self.connection != ConnectionState::Open {
            host.request_render();
            return Err(self.reject(
                SessionError::TransportUnavailable(TransportError::NotConnected),
                host,
            ));
        }

        let request = TurnRequest::new(self.transcript.iter().map(Message::to_wire).collect());
        self.pending = Some(turn);
        self.assembler.begin(turn, now);

        if let Err(error) = host.send_turn(turn, &request) {
            self.pending = None;
            self.assembler.abort();
            host.request_render();
            return Err(self.reject(SessionError::TransportUnavailable(error), host));
        }

        tracing::debug!(turn, messages = request.messages.len(), "turn submitted");
        host.request_render();
        Ok(turn)
    }

    /// Empties the transcript and abandons any turn in progress.
    pub fn clear(&mut self, host: &mut dyn SessionHost) {
        if let Some(turn) = self.assembler.abort() {
            tracing::debug!(turn, "turn abandoned by clear");
        }
        self.transcript.clear();
        self.pending = None;
        host.notify(Notice::info("Chat cleared", "All messages have been removed"));
        host.request_render();
    }

    /// Flat text form of the finalized transcript.
    #[must_use]
    pub fn export(&self) -> String {
        self.transcript
            .iter()
            .map(Message::export_line)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Applies one transport event. Events must be fed in delivery order.
    pub fn apply_event(&mut self, event: TransportEvent, host: &mut dyn SessionHost, now: Instant) {
        match event {
            TransportEvent::Opened => {
                tracing::info!("connected to chat server");
                self.connection = ConnectionState::Open;
                host.request_render();
            }
            TransportEvent::Fragment(fragment) => match self.assembler.apply(fragment, now) {
                Assembly::Streaming => host.request_render(),
                Assembly::Completed { turn, message } => {
                    self.finish_turn(turn);
                    if let Some(message) = message {
                        self.transcript.push(message);
                    }
                    host.request_render();
                }
                Assembly::Failed { turn, reason } => {
                    self.finish_turn(turn);
                    host.abandon_turn(turn);
                    host.notify(SessionError::StreamInterrupted { turn, reason }.notice());
                    host.request_render();
                }
                Assembly::Stale { .. } | Assembly::Anomaly => {}
            },
            TransportEvent::Error { message } => {
                tracing::warn!(%message, "transport error");
                self.interrupt(&message, host);
                host.notify(Notice::error("Connection Error", message));
                host.request_render();
            }
            TransportEvent::Closed { reason } => {
                tracing::info!(?reason, "disconnected from chat server");
                let description = reason.clone().unwrap_or_else(|| "connection closed".to_string());
                self.interrupt(&description, host);
                self.connection = ConnectionState::Closed { reason };
                host.request_render();
            }
        }
    }

    /// Errors the open turn if it has been silent past the configured timeout.
    pub fn check_timeout(&mut self, host: &mut dyn SessionHost, now: Instant) -> bool {
        let Some(turn) = self.assembler.poll_timeout(now) else {
            return false;
        };

        self.finish_turn(turn);
        host.abandon_turn(turn);
        let error = SessionError::StreamTimedOut {
            turn,
            after: self.assembler.config().timeout,
        };
        host.notify(error.notice());
        host.request_render();
        true
    }

    /// Instant at which the open turn times out, if a turn is open.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.assembler.deadline()
    }

    #[must_use]
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<&Message> {
        self.assembler.in_flight()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn pending_turn(&self) -> Option<TurnId> {
        self.pending
    }

    /// True while the assistant reply is streaming in.
    #[must_use]
    pub fn is_composing(&self) -> bool {
        matches!(self.assembler.phase(), TurnPhase::Streaming { .. })
    }

    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.pending.is_none() && self.connection == ConnectionState::Open
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    #[must_use]
    pub fn can_export(&self) -> bool {
        !self.transcript.is_empty()
    }

    fn finish_turn(&mut self, turn: TurnId) {
        if self.pending == Some(turn) {
            self.pending = None;
        }
    }

    fn interrupt(&mut self, reason: &str, host: &mut dyn SessionHost) {
        let Some(turn) = self.assembler.abort() else {
            return;
        };

        self.finish_turn(turn);
        host.notify(
            SessionError::StreamInterrupted {
                turn,
                reason: reason.to_string(),
            }
            .notice(),
        );
    }

    fn reject(&self, error: SessionError, host: &mut dyn SessionHost) -> SessionError {
        tracing::debug!(%error, "submission rejected");
        host.notify(error.notice());
        error
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use chat_protocol::FragmentEvent;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<(TurnId, TurnRequest)>,
        abandoned: Vec<TurnId>,
        notices: Vec<Notice>,
        renders: usize,
    }

    impl SessionHost for Recorder {
        fn send_turn(&mut self, turn: TurnId, request: &TurnRequest) -> Result<(), TransportError> {
            self.sent.push((turn, request.clone()));
            Ok(())
        }

        fn abandon_turn(&mut self, turn: TurnId) {
            self.abandoned.push(turn);
        }

        fn notify(&mut self, notice: Notice) {
            self.notices.push(notice);
        }

        fn request_render(&mut self) {
            self.renders += 1;
        }
    }

    fn open_session(host: &mut Recorder) -> SessionController {
        let mut session = SessionController::default();
        session.apply_event(TransportEvent::Opened, host, Instant::now());
        session
    }

    #[test]
    fn new_session_is_connecting_and_empty() {
        let session = SessionController::default();
        assert_eq!(session.connection(), &ConnectionState::Connecting);
        assert!(!session.can_submit());
        assert!(!session.can_export());
        assert!(session.in_flight().is_none());
    }

    #[test]
    fn turn_ids_increase_per_submission() {
        let mut host = Recorder::default();
        let mut session = open_session(&mut host);
        let now = Instant::now();

        let first = session.submit("one", &mut host, now).expect("first turn");
        session.apply_event(
            TransportEvent::Fragment(FragmentEvent::terminal(first, "ok")),
            &mut host,
            now,
        );
        let second = session.submit("two", &mut host, now).expect("second turn");

        assert_eq!((first, second), (1, 2));
        assert_eq!(host.sent[1].1.messages.len(), 3);
    }

    #[test]
    fn composing_tracks_streaming_phase() {
        let mut host = Recorder::default();
        let mut session = open_session(&mut host);
        let now = Instant::now();

        let turn = session.submit("go", &mut host, now).expect("submit");
        assert!(session.is_pending());
        assert!(!session.is_composing());

        session.apply_event(
            TransportEvent::Fragment(FragmentEvent::partial(turn, "x")),
            &mut host,
            now,
        );
        assert!(session.is_composing());
        assert_eq!(session.pending_turn(), Some(turn));
    }

    #[test]
    fn timed_out_turn_is_abandoned_with_the_host() {
        let mut host = Recorder::default();
        let mut session = SessionController::new(AssemblerConfig {
            timeout: Duration::from_millis(10),
            ..AssemblerConfig::default()
        });
        session.apply_event(TransportEvent::Opened, &mut host, Instant::now());
        let start = Instant::now();

        let turn = session.submit("anyone?", &mut host, start).expect("submit");
        assert!(session.check_timeout(&mut host, start + Duration::from_secs(1)));

        assert_eq!(host.abandoned, vec![turn]);
        assert!(session.can_submit());
    }
}
