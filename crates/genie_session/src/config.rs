use std::time::Duration;

use chat_transport_ws::{normalize_server_url, DEFAULT_CONNECT_TIMEOUT, DEFAULT_SERVER_URL};
use codegenie::{env_parse, env_string_opt};

use crate::assembler::{AssemblerConfig, JoinPolicy, TerminalPayloadPolicy, DEFAULT_STREAM_TIMEOUT};
use crate::error::ConfigError;

pub const TRANSPORT_ENV_VAR: &str = "CODEGENIE_TRANSPORT";
pub const SERVER_URL_ENV_VAR: &str = "CODEGENIE_SERVER_URL";
pub const CONNECT_TIMEOUT_ENV_VAR: &str = "CODEGENIE_CONNECT_TIMEOUT_SECS";
pub const STREAM_TIMEOUT_ENV_VAR: &str = "CODEGENIE_STREAM_TIMEOUT_SECS";
pub const FRAGMENT_JOIN_ENV_VAR: &str = "CODEGENIE_FRAGMENT_JOIN";
pub const TERMINAL_PAYLOAD_ENV_VAR: &str = "CODEGENIE_TERMINAL_PAYLOAD";
pub const EXPORT_PREFIX_ENV_VAR: &str = "CODEGENIE_EXPORT_PREFIX";

pub const DEFAULT_EXPORT_PREFIX: &str = "ai-code-chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    Ws,
    Mock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub transport: TransportKind,
    pub server_url: String,
    /// Bound on the WebSocket opening handshake.
    pub connect_timeout: Duration,
    pub assembler: AssemblerConfig,
    pub export_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            assembler: AssemblerConfig::default(),
            export_prefix: DEFAULT_EXPORT_PREFIX.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let transport = match env_string_opt(TRANSPORT_ENV_VAR) {
            None => TransportKind::default(),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                chat_transport_ws::WS_TRANSPORT_ID => TransportKind::Ws,
                chat_transport_mock::MOCK_TRANSPORT_ID => TransportKind::Mock,
                _ => return Err(invalid(TRANSPORT_ENV_VAR, value, "ws or mock")),
            },
        };

        let server_url = env_string_opt(SERVER_URL_ENV_VAR)
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        normalize_server_url(&server_url).map_err(ConfigError::ServerUrl)?;

        let connect_timeout = positive_secs(CONNECT_TIMEOUT_ENV_VAR, DEFAULT_CONNECT_TIMEOUT)?;
        let timeout = positive_secs(STREAM_TIMEOUT_ENV_VAR, DEFAULT_STREAM_TIMEOUT)?;

        let join = match env_string_opt(FRAGMENT_JOIN_ENV_VAR) {
            None => JoinPolicy::default(),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "newline" => JoinPolicy::Newline,
                "concat" => JoinPolicy::Concat,
                _ => return Err(invalid(FRAGMENT_JOIN_ENV_VAR, value, "newline or concat")),
            },
        };

        let terminal_payload = match env_string_opt(TERMINAL_PAYLOAD_ENV_VAR) {
            None => TerminalPayloadPolicy::default(),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "append" => TerminalPayloadPolicy::Append,
                "ignore" => TerminalPayloadPolicy::Ignore,
                _ => return Err(invalid(TERMINAL_PAYLOAD_ENV_VAR, value, "append or ignore")),
            },
        };

        let export_prefix = env_string_opt(EXPORT_PREFIX_ENV_VAR)
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|| DEFAULT_EXPORT_PREFIX.to_string());

        Ok(Self {
            transport,
            server_url,
            connect_timeout,
            assembler: AssemblerConfig {
                join,
                terminal_payload,
                timeout,
            },
            export_prefix,
        })
    }
}

fn positive_secs(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match env_parse::<u64>(key) {
        None => Ok(default),
        Some(Ok(secs)) if secs > 0 => Ok(Duration::from_secs(secs)),
        Some(_) => {
            let value = env_string_opt(key).unwrap_or_default();
            Err(invalid(key, value, "a positive number of seconds"))
        }
    }
}

fn invalid(key: &'static str, value: String, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value,
        expected,
    }
}
