//! Message presentation core for a terminal code-generation chat client.
//!
//! # Public API Overview
//! - Split finalized assistant text into prose and fenced code with [`parse`].
//! - Resolve fence tags to labels, download extensions and badge colors with
//!   [`resolve`].
//! - Render transcript messages for the terminal with [`render_message`],
//!   highlighting code through syntect.
//! - Read rendering options from the environment with [`RenderConfig::from_env`].

pub mod config;
pub mod highlight;
pub mod language;
pub mod logging;
pub mod render;
pub mod segment;

pub use crate::config::{env_flag, env_parse, env_string_opt, RenderConfig};
pub use crate::highlight::{highlight_code, prewarm_highlighting, strip_ansi};
pub use crate::language::{resolve, ColorKey, LanguageInfo, FALLBACK};
pub use crate::logging::init_logging;
pub use crate::render::{render_message, render_streaming};
pub use crate::segment::{has_unterminated_fence, parse, Segment, SegmentKind, Segments};
