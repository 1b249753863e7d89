//! Provider-neutral contract between the chat session core and a transport.
//!
//! This crate defines the wire payloads exchanged per turn, the fragment and
//! connection events a transport delivers, and the [`Transport`] seam the
//! session drives. It contains no socket code and no session state.
//!
//! Wire contract: one UTF-8 JSON object `{"messages": [{id, role, content}]}`
//! is sent per submitted turn; the peer answers with a sequence of
//! `{"content": "...", "step": "..."}` notifications where `step == "output"`
//! terminates the turn.

use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monotonic identifier of one submitted turn within a session.
pub type TurnId = u64;

/// Step value that marks the terminal notification of a turn.
pub const TERMINAL_STEP: &str = "output";

/// Serialized event path from a transport to the session runtime.
///
/// Transports may run their I/O anywhere, but every notification goes through
/// one sender so the receiver observes a single ordered stream.
pub type EventSink = Sender<TransportEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transcript entry as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl WireMessage {
    #[must_use]
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
        }
    }
}

/// Full transcript snapshot sent for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    pub messages: Vec<WireMessage>,
}

impl TurnRequest {
    #[must_use]
    pub fn new(messages: Vec<WireMessage>) -> Self {
        Self { messages }
    }

    /// Encodes the request as the JSON text frame sent to the peer.
    pub fn to_json(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(TransportError::Encode)
    }
}

/// One notification received from the peer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FragmentNotification {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub step: String,
}

impl FragmentNotification {
    #[must_use]
    pub fn partial(content: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            step: step.into(),
        }
    }

    #[must_use]
    pub fn terminal(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            step: TERMINAL_STEP.to_string(),
        }
    }

    /// Decodes a JSON text frame.
    pub fn parse(frame: &str) -> Result<Self, TransportError> {
        serde_json::from_str(frame).map_err(TransportError::Decode)
    }

    /// Returns true when this notification ends its turn.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.step == TERMINAL_STEP
    }

    #[must_use]
    pub fn kind(&self) -> FragmentKind {
        if self.is_terminal() {
            FragmentKind::Terminal
        } else {
            FragmentKind::Partial
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Partial,
    Terminal,
    Error,
}

/// A fragment attributed to the turn it answers.
///
/// `turn` is `None` when the transport received a notification while no turn
/// was outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentEvent {
    pub turn: Option<TurnId>,
    pub kind: FragmentKind,
    pub payload: String,
}

impl FragmentEvent {
    #[must_use]
    pub fn partial(turn: TurnId, payload: impl Into<String>) -> Self {
        Self {
            turn: Some(turn),
            kind: FragmentKind::Partial,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn terminal(turn: TurnId, payload: impl Into<String>) -> Self {
        Self {
            turn: Some(turn),
            kind: FragmentKind::Terminal,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn error(turn: TurnId, message: impl Into<String>) -> Self {
        Self {
            turn: Some(turn),
            kind: FragmentKind::Error,
            payload: message.into(),
        }
    }
}

/// Everything a transport reports to the session, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Fragment(FragmentEvent),
    Error { message: String },
    Closed { reason: Option<String> },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("transport channel closed")]
    Closed,

    #[error("failed to encode turn request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode fragment notification: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("transport send failed: {0}")]
    Send(String),
}

/// Transport Adapter seam driven by the session controller.
pub trait Transport: Send {
    /// Returns true when the channel is open and ready to send.
    fn is_open(&self) -> bool;

    /// Queues the transcript snapshot for `turn` and returns without waiting
    /// for any reply.
    fn send_turn(&mut self, turn: TurnId, request: &TurnRequest) -> Result<(), TransportError>;

    /// Stops attributing notifications to `turn`, which the session gave up
    /// on before its terminal notification arrived.
    fn abandon_turn(&mut self, turn: TurnId);
}

/// Attributes incoming notifications to outstanding turns in send order.
///
/// The wire carries no turn identifier, so a turn owns every notification
/// received after it was sent until its terminal notification arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnTagger {
    outstanding: VecDeque<TurnId>,
}

impl TurnTagger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `turn` was handed to the channel.
    pub fn sent(&mut self, turn: TurnId) {
        self.outstanding.push_back(turn);
    }

    /// Attributes one notification, retiring the owning turn on terminal.
    pub fn tag(&mut self, notification: FragmentNotification) -> FragmentEvent {
        let kind = notification.kind();
        let turn = match kind {
            FragmentKind::Terminal => self.outstanding.pop_front(),
            _ => self.outstanding.front().copied(),
        };

        FragmentEvent {
            turn,
            kind,
            payload: notification.content,
        }
    }

    /// Forgets `turn` so later notifications go to the turns sent after it.
    ///
    /// Returns false when `turn` was not outstanding.
    pub fn retire(&mut self, turn: TurnId) -> bool {
        match self.outstanding.iter().position(|&sent| sent == turn) {
            Some(index) => {
                self.outstanding.remove(index);
                true
            }
            None => false,
        }
    }

    /// Forgets every outstanding turn, returning them in send order.
    pub fn drain(&mut self) -> Vec<TurnId> {
        self.outstanding.drain(..).collect()
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_request_serializes_messages_array_with_lowercase_roles() {
        let request = TurnRequest::new(vec![
            WireMessage::new("m1", Role::User, "hi"),
            WireMessage::new("m2", Role::Assistant, "hello"),
        ]);

        let json: serde_json::Value =
            serde_json::from_str(&request.to_json().expect("encode request")).expect("valid json");

        assert_eq!(json["messages"][0]["id"], "m1");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][1]["role"], "assistant");
        assert_eq!(json["messages"][1]["content"], "hello");
    }

    #[test]
    fn notification_step_output_is_terminal_and_others_are_partial() {
        let thinking = FragmentNotification::parse(r#"{"content":"a","step":"thinking"}"#)
            .expect("parse thinking");
        let output = FragmentNotification::parse(r#"{"content":"b","step":"output"}"#)
            .expect("parse output");
        let bare = FragmentNotification::parse(r#"{"content":"c"}"#).expect("parse bare");

        assert_eq!(thinking.kind(), FragmentKind::Partial);
        assert_eq!(output.kind(), FragmentKind::Terminal);
        assert_eq!(bare.kind(), FragmentKind::Partial);
        assert_eq!(bare.step, "");
    }

    #[test]
    fn notification_parse_rejects_non_json_frames() {
        let error = FragmentNotification::parse("not json").expect_err("must fail");
        assert!(matches!(error, TransportError::Decode(_)));
    }

    #[test]
    fn tagger_attributes_fragments_to_turns_in_send_order() {
        let mut tagger = TurnTagger::new();
        tagger.sent(1);
        tagger.sent(2);

        let first = tagger.tag(FragmentNotification::partial("a", "thinking"));
        let end_first = tagger.tag(FragmentNotification::terminal("b"));
        let second = tagger.tag(FragmentNotification::partial("c", "thinking"));

        assert_eq!(first, FragmentEvent::partial(1, "a"));
        assert_eq!(end_first, FragmentEvent::terminal(1, "b"));
        assert_eq!(second, FragmentEvent::partial(2, "c"));
        assert_eq!(tagger.outstanding(), 1);
    }

    #[test]
    fn tagger_leaves_unsolicited_fragments_unattributed() {
        let mut tagger = TurnTagger::new();
        let stray = tagger.tag(FragmentNotification::terminal("late"));

        assert_eq!(stray.turn, None);
        assert_eq!(stray.kind, FragmentKind::Terminal);
    }

    #[test]
    fn tagger_drain_forgets_outstanding_turns() {
        let mut tagger = TurnTagger::new();
        tagger.sent(4);
        tagger.sent(5);

        assert_eq!(tagger.drain(), vec![4, 5]);
        assert_eq!(tagger.outstanding(), 0);
    }

    #[test]
    fn retired_turn_hands_later_notifications_to_the_next_turn() {
        let mut tagger = TurnTagger::new();
        tagger.sent(1);
        tagger.sent(2);

        assert!(tagger.retire(1));
        assert!(!tagger.retire(1));
        assert_eq!(
            tagger.tag(FragmentNotification::partial("a", "thinking")),
            FragmentEvent::partial(2, "a")
        );
        assert_eq!(
            tagger.tag(FragmentNotification::terminal("b")),
            FragmentEvent::terminal(2, "b")
        );
        assert_eq!(tagger.outstanding(), 0);
    }
}
