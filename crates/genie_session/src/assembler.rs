//! Folds a turn's fragment events into one assistant message.
//!
//! A turn is opened at submission. Partial fragments grow the in-flight
//! message, a terminal fragment promotes it to final, and an error fragment,
//! transport loss or timeout discards it. Fragments attributed to another
//! turn are stale and dropped; fragments arriving with no open turn are
//! protocol anomalies and only logged.

use std::time::{Duration, Instant};

use chat_protocol::{FragmentEvent, FragmentKind, TurnId};

use crate::message::{Message, MessageStatus};

pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Separator placed between consecutive fragment payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinPolicy {
    #[default]
    Newline,
    Concat,
}

impl JoinPolicy {
    #[must_use]
    pub fn separator(self) -> &'static str {
        match self {
            Self::Newline => "\n",
            Self::Concat => "",
        }
    }
}

/// Whether a terminal fragment's payload is appended before finalizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminalPayloadPolicy {
    #[default]
    Append,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerConfig {
    pub join: JoinPolicy,
    pub terminal_payload: TerminalPayloadPolicy,
    pub timeout: Duration,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            join: JoinPolicy::default(),
            terminal_payload: TerminalPayloadPolicy::default(),
            timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    /// Turn opened, no partial received yet.
    Awaiting { turn: TurnId },
    Streaming { turn: TurnId },
}

/// Result of folding one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    /// The in-flight message was created or extended.
    Streaming,
    /// The turn finished. `None` when the reply had no content.
    Completed { turn: TurnId, message: Option<Message> },
    /// The peer reported an error; the in-flight message was discarded.
    Failed { turn: TurnId, reason: String },
    /// Fragment for a superseded turn.
    Stale { turn: TurnId },
    /// Fragment with no open turn to receive it.
    Anomaly,
}

#[derive(Debug, Clone)]
struct OpenTurn {
    turn: TurnId,
    in_flight: Option<Message>,
    last_activity: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct StreamAssembler {
    config: AssemblerConfig,
    open: Option<OpenTurn>,
}

impl StreamAssembler {
    #[must_use]
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config, open: None }
    }

    #[must_use]
    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Opens `turn`, superseding any turn still open.
    pub fn begin(&mut self, turn: TurnId, now: Instant) {
        if let Some(previous) = self.open.replace(OpenTurn {
            turn,
            in_flight: None,
            last_activity: now,
        }) {
            tracing::debug!(previous = previous.turn, turn, "open turn superseded");
        }
    }

    pub fn apply(&mut self, fragment: FragmentEvent, now: Instant) -> Assembly {
        let Some(open) = self.open.as_mut() else {
            tracing::warn!(
                turn = ?fragment.turn,
                kind = ?fragment.kind,
                "protocol anomaly: fragment with no open turn"
            );
            return Assembly::Anomaly;
        };

        match fragment.turn {
            Some(turn) if turn == open.turn => {}
            Some(turn) => {
                tracing::debug!(turn, open = open.turn, "dropping stale-turn fragment");
                return Assembly::Stale { turn };
            }
            None => {
                tracing::warn!(open = open.turn, "protocol anomaly: unattributed fragment");
                return Assembly::Anomaly;
            }
        }

        let separator = self.config.join.separator();
        match fragment.kind {
            FragmentKind::Partial => {
                open.last_activity = now;
                match open.in_flight.as_mut() {
                    Some(message) => append(&mut message.content, &fragment.payload, separator),
                    None => open.in_flight = Some(Message::in_flight(fragment.payload)),
                }
                Assembly::Streaming
            }
            FragmentKind::Terminal => {
                let turn = open.turn;
                let mut message = open
                    .in_flight
                    .take()
                    .unwrap_or_else(|| Message::in_flight(String::new()));
                if self.config.terminal_payload == TerminalPayloadPolicy::Append {
                    append(&mut message.content, &fragment.payload, separator);
                }
                self.open = None;

                message.status = MessageStatus::Final;
                let message = (!message.content.is_empty()).then_some(message);
                tracing::debug!(turn, empty = message.is_none(), "turn completed");
                Assembly::Completed { turn, message }
            }
            FragmentKind::Error => {
                let turn = open.turn;
                self.open = None;
                tracing::warn!(turn, reason = %fragment.payload, "turn failed");
                Assembly::Failed {
                    turn,
                    reason: fragment.payload,
                }
            }
        }
    }

    /// Discards the open turn, returning its id.
    pub fn abort(&mut self) -> Option<TurnId> {
        self.open.take().map(|open| open.turn)
    }

    /// Errors the open turn once it has been silent longer than the timeout.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<TurnId> {
        let open = self.open.as_ref()?;
        if now.saturating_duration_since(open.last_activity) < self.config.timeout {
            return None;
        }

        let turn = open.turn;
        self.open = None;
        tracing::warn!(turn, timeout = ?self.config.timeout, "turn timed out");
        Some(turn)
    }

    /// Instant at which the open turn times out.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.open
            .as_ref()
            .map(|open| open.last_activity + self.config.timeout)
    }

    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        match &self.open {
            None => TurnPhase::Idle,
            Some(open) if open.in_flight.is_some() => TurnPhase::Streaming { turn: open.turn },
            Some(open) => TurnPhase::Awaiting { turn: open.turn },
        }
    }

    #[must_use]
    pub fn open_turn(&self) -> Option<TurnId> {
        self.open.as_ref().map(|open| open.turn)
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<&Message> {
        self.open.as_ref().and_then(|open| open.in_flight.as_ref())
    }
}

fn append(content: &mut String, payload: &str, separator: &str) {
    if payload.is_empty() {
        return;
    }
    if !content.is_empty() {
        content.push_str(separator);
    }
    content.push_str(payload);
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn streaming(config: AssemblerConfig, turn: TurnId) -> (StreamAssembler, Instant) {
        let now = Instant::now();
        let mut assembler = StreamAssembler::new(config);
        assembler.begin(turn, now);
        (assembler, now)
    }

    fn completed_content(assembly: Assembly) -> Option<String> {
        match assembly {
            Assembly::Completed { message, .. } => message.map(|message| message.content),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn partials_join_with_newline_and_terminal_appends() {
        let (mut assembler, now) = streaming(AssemblerConfig::default(), 1);

        assert_eq!(assembler.apply(FragmentEvent::partial(1, "Hi"), now), Assembly::Streaming);
        assert_eq!(assembler.phase(), TurnPhase::Streaming { turn: 1 });
        assembler.apply(FragmentEvent::partial(1, " there"), now);
        assert_eq!(
            assembler.in_flight().map(|message| message.content.as_str()),
            Some("Hi\n there")
        );

        let finished = assembler.apply(FragmentEvent::terminal(1, "!"), now);
        assert_eq!(completed_content(finished).as_deref(), Some("Hi\n there\n!"));
        assert_eq!(assembler.phase(), TurnPhase::Idle);
    }

    #[test]
    fn concat_policy_joins_raw_tokens() {
        let config = AssemblerConfig {
            join: JoinPolicy::Concat,
            ..AssemblerConfig::default()
        };
        let (mut assembler, now) = streaming(config, 1);
        assembler.apply(FragmentEvent::partial(1, "Hi"), now);
        assembler.apply(FragmentEvent::partial(1, " there"), now);

        let finished = assembler.apply(FragmentEvent::terminal(1, "!"), now);
        assert_eq!(completed_content(finished).as_deref(), Some("Hi there!"));
    }

    #[test]
    fn ignore_policy_drops_terminal_payload() {
        let config = AssemblerConfig {
            terminal_payload: TerminalPayloadPolicy::Ignore,
            ..AssemblerConfig::default()
        };
        let (mut assembler, now) = streaming(config, 1);
        assembler.apply(FragmentEvent::partial(1, "full reply"), now);

        let finished = assembler.apply(FragmentEvent::terminal(1, "full reply"), now);
        assert_eq!(completed_content(finished).as_deref(), Some("full reply"));
    }

    #[test]
    fn terminal_without_partials_uses_its_own_payload() {
        let (mut assembler, now) = streaming(AssemblerConfig::default(), 4);
        assert_eq!(assembler.phase(), TurnPhase::Awaiting { turn: 4 });

        let finished = assembler.apply(FragmentEvent::terminal(4, "only"), now);
        assert_eq!(completed_content(finished).as_deref(), Some("only"));
    }

    #[test]
    fn empty_reply_completes_without_message() {
        let (mut assembler, now) = streaming(AssemblerConfig::default(), 2);
        assert_eq!(
            assembler.apply(FragmentEvent::terminal(2, ""), now),
            Assembly::Completed {
                turn: 2,
                message: None
            }
        );
    }

    #[test]
    fn completed_message_is_final_assistant() {
        let (mut assembler, now) = streaming(AssemblerConfig::default(), 1);
        assembler.apply(FragmentEvent::partial(1, "a"), now);
        let in_flight_id = assembler.in_flight().map(|message| message.id.clone());

        let Assembly::Completed {
            message: Some(message),
            ..
        } = assembler.apply(FragmentEvent::terminal(1, ""), now)
        else {
            panic!("expected a completed message");
        };
        assert!(message.is_final());
        assert_eq!(message.role, chat_protocol::Role::Assistant);
        assert_eq!(Some(message.id), in_flight_id);
    }

    #[test]
    fn error_fragment_discards_in_flight() {
        let (mut assembler, now) = streaming(AssemblerConfig::default(), 1);
        assembler.apply(FragmentEvent::partial(1, "half"), now);

        assert_eq!(
            assembler.apply(FragmentEvent::error(1, "upstream failed"), now),
            Assembly::Failed {
                turn: 1,
                reason: "upstream failed".to_string()
            }
        );
        assert!(assembler.in_flight().is_none());
        assert_eq!(assembler.phase(), TurnPhase::Idle);
    }

    #[test]
    fn stale_and_unowned_fragments_do_not_mutate_state() {
        let (mut assembler, now) = streaming(AssemblerConfig::default(), 2);
        assembler.apply(FragmentEvent::partial(2, "live"), now);

        assert_eq!(
            assembler.apply(FragmentEvent::partial(1, "old"), now),
            Assembly::Stale { turn: 1 }
        );
        assert_eq!(
            assembler.apply(FragmentEvent::terminal(1, "old end"), now),
            Assembly::Stale { turn: 1 }
        );
        let unattributed = FragmentEvent {
            turn: None,
            kind: FragmentKind::Partial,
            payload: "?".to_string(),
        };
        assert_eq!(assembler.apply(unattributed, now), Assembly::Anomaly);
        assert_eq!(
            assembler.in_flight().map(|message| message.content.as_str()),
            Some("live")
        );

        let mut idle = StreamAssembler::default();
        assert_eq!(idle.apply(FragmentEvent::partial(2, "x"), now), Assembly::Anomaly);
        assert!(idle.in_flight().is_none());
    }

    #[test]
    fn timeout_counts_from_last_activity() {
        let config = AssemblerConfig {
            timeout: Duration::from_secs(5),
            ..AssemblerConfig::default()
        };
        let (mut assembler, start) = streaming(config, 1);

        assert_eq!(assembler.poll_timeout(start + Duration::from_secs(4)), None);
        assembler.apply(
            FragmentEvent::partial(1, "tick"),
            start + Duration::from_secs(4),
        );
        assert_eq!(
            assembler.deadline(),
            Some(start + Duration::from_secs(9))
        );
        assert_eq!(assembler.poll_timeout(start + Duration::from_secs(8)), None);
        assert_eq!(assembler.poll_timeout(start + Duration::from_secs(9)), Some(1));
        assert_eq!(assembler.phase(), TurnPhase::Idle);
        assert_eq!(assembler.poll_timeout(start + Duration::from_secs(60)), None);
    }

    #[test]
    fn begin_supersedes_open_turn() {
        let (mut assembler, now) = streaming(AssemblerConfig::default(), 1);
        assembler.apply(FragmentEvent::partial(1, "first"), now);
        assembler.begin(2, now);

        assert!(assembler.in_flight().is_none());
        assert_eq!(
            assembler.apply(FragmentEvent::partial(1, "late"), now),
            Assembly::Stale { turn: 1 }
        );
        assert_eq!(assembler.abort(), Some(2));
        assert_eq!(assembler.abort(), None);
    }
}
