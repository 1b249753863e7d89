use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chat_protocol::{TransportError, TurnId};
use chat_transport_ws::WsConfigError;
use thiserror::Error;

/// Why a submission was rejected locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidInputReason {
    Empty,
    TurnPending,
}

impl fmt::Display for InvalidInputReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "message is empty",
            Self::TurnPending => "a reply is still being generated",
        })
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{reason}")]
    InvalidInput { reason: InvalidInputReason },

    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[source] TransportError),

    #[error("turn {turn} interrupted: {reason}")]
    StreamInterrupted { turn: TurnId, reason: String },

    #[error("no reply for turn {turn} within {after:?}")]
    StreamTimedOut { turn: TurnId, after: Duration },
}

impl SessionError {
    #[must_use]
    pub fn empty_input() -> Self {
        Self::InvalidInput {
            reason: InvalidInputReason::Empty,
        }
    }

    #[must_use]
    pub fn turn_pending() -> Self {
        Self::InvalidInput {
            reason: InvalidInputReason::TurnPending,
        }
    }

    /// User-facing notice for this error.
    #[must_use]
    pub fn notice(&self) -> Notice {
        match self {
            Self::InvalidInput { .. } => Notice::warning("Cannot send message", self.to_string()),
            Self::TransportUnavailable(_) => Notice::error(
                "Connection Error",
                "WebSocket is not connected. Please try again later.",
            ),
            Self::StreamInterrupted { reason, .. } => {
                Notice::error("Stream interrupted", reason.clone())
            }
            Self::StreamTimedOut { .. } => Notice::error("Stream interrupted", self.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("message has no code block {index}")]
    NoSuchSegment { index: usize },

    #[error("no assistant reply yet")]
    NoReply,

    #[error("transcript is empty")]
    EmptyTranscript,
}

impl ActionError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value '{value}'; expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("CODEGENIE_SERVER_URL is invalid: {0}")]
    ServerUrl(#[source] WsConfigError),

    #[error("failed to start transport: {0}")]
    TransportStart(#[source] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible notification raised by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    #[must_use]
    pub fn new(
        level: NoticeLevel,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.into(),
        }
    }

    #[must_use]
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title, description)
    }

    #[must_use]
    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, title, description)
    }

    #[must_use]
    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title, description)
    }
}
