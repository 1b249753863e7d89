//! Environment configuration.

use std::env;
use std::str::FromStr;

pub const DEFAULT_THEME: &str = "base16-ocean.dark";
pub const DEFAULT_WIDTH: usize = 80;
const MIN_WIDTH: usize = 20;

/// Terminal rendering options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub highlight: bool,
    pub theme: String,
    pub width: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            highlight: true,
            theme: DEFAULT_THEME.to_string(),
            width: DEFAULT_WIDTH,
        }
    }
}

impl RenderConfig {
    pub fn from_env() -> Self {
        Self {
            highlight: !env_flag("CODEGENIE_NO_HIGHLIGHT"),
            theme: env_string_opt("CODEGENIE_THEME").unwrap_or_else(|| DEFAULT_THEME.to_string()),
            width: env_parse::<usize>("CODEGENIE_WIDTH")
                .and_then(Result::ok)
                .map_or(DEFAULT_WIDTH, |width| width.max(MIN_WIDTH)),
        }
    }

    /// Plain output: no ANSI escapes at all.
    #[must_use]
    pub fn plain() -> Self {
        Self {
            highlight: false,
            ..Self::default()
        }
    }
}

/// Returns true when `key` is set to `1`.
pub fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

/// Returns the value of `key` unless it is unset or blank.
pub fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

/// Parses the trimmed value of `key`; `None` when unset or blank.
pub fn env_parse<T: FromStr>(key: &str) -> Option<Result<T, T::Err>> {
    env_string_opt(key).map(|value| value.trim().parse::<T>())
}
