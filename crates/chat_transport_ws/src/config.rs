use std::fmt;
use std::time::Duration;

use url::Url;

/// Default chat server endpoint.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:3001";

/// Default bound on the initial WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsConfigError {
    InvalidUrl(String),
    UnsupportedScheme(String),
}

impl fmt::Display for WsConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(message) => write!(f, "invalid server URL: {message}"),
            Self::UnsupportedScheme(scheme) => {
                write!(f, "unsupported URL scheme '{scheme}'; expected ws or wss")
            }
        }
    }
}

impl std::error::Error for WsConfigError {}

/// Connection settings for [`crate::WsTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsTransportConfig {
    /// Validated `ws://` or `wss://` endpoint.
    pub url: Url,
    /// Bound on the opening handshake.
    pub connect_timeout: Duration,
}

impl WsTransportConfig {
    /// Parses and validates `url`. `http`/`https` are rewritten to `ws`/`wss`.
    pub fn new(url: &str) -> Result<Self, WsConfigError> {
        Ok(Self {
            url: normalize_server_url(url)?,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Normalizes a server URL to a WebSocket URL.
pub fn normalize_server_url(raw: &str) -> Result<Url, WsConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WsConfigError::InvalidUrl("empty URL".to_string()));
    }

    let mut url =
        Url::parse(trimmed).map_err(|error| WsConfigError::InvalidUrl(error.to_string()))?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(WsConfigError::UnsupportedScheme(other.to_string())),
    };

    if url.scheme() != scheme {
        url.set_scheme(scheme).map_err(|()| {
            WsConfigError::InvalidUrl(format!("cannot rewrite scheme of {trimmed}"))
        })?;
    }

    if url.host_str().is_none() {
        return Err(WsConfigError::InvalidUrl(format!("missing host in {trimmed}")));
    }

    Ok(url)
}
