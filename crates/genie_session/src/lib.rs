//! Streaming chat session core for the `codegenie` client.
//!
//! [`SessionController`] owns the transcript and enforces one turn in flight;
//! [`StreamAssembler`] folds a turn's fragments into a single assistant
//! message; [`SessionRuntime`] pumps transport events into the controller.

pub mod actions;
pub mod assembler;
pub mod commands;
pub mod config;
pub mod error;
pub mod message;
pub mod runtime;
pub mod session;

pub use actions::{
    copy_message, copy_segment, download_segment, export_transcript, Clipboard, DirectorySink,
    FileSink, SystemClipboard,
};
pub use assembler::{
    AssemblerConfig, Assembly, JoinPolicy, StreamAssembler, TerminalPayloadPolicy, TurnPhase,
};
pub use config::{SessionConfig, TransportKind};
pub use error::{ActionError, ConfigError, InvalidInputReason, Notice, NoticeLevel, SessionError};
pub use message::{Message, MessageStatus};
pub use runtime::SessionRuntime;
pub use session::{ConnectionState, SessionController, SessionHost};
