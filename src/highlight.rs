//! Syntax highlighting of code segments into ANSI terminal lines.

use once_cell::sync::OnceCell;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::{as_24_bit_terminal_escaped, LinesWithEndings};

use crate::config::DEFAULT_THEME;

const RESET: &str = "\x1b[0m";

static SYNTAXES: OnceCell<SyntaxSet> = OnceCell::new();
static THEMES: OnceCell<ThemeSet> = OnceCell::new();

fn syntax_set() -> &'static SyntaxSet {
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn themes() -> &'static ThemeSet {
    THEMES.get_or_init(ThemeSet::load_defaults)
}

/// Loads the syntax and theme sets ahead of the first highlighted block.
pub fn prewarm_highlighting() {
    let _ = syntax_set();
    let _ = themes();
}

fn theme_named(name: &str) -> Option<&'static Theme> {
    let themes = themes();
    themes
        .themes
        .get(name)
        .or_else(|| themes.themes.get(DEFAULT_THEME))
        .or_else(|| themes.themes.values().next())
}

fn syntax_for<'a>(syntaxes: &'a SyntaxSet, language: Option<&str>) -> &'a SyntaxReference {
    language
        .map(str::trim)
        .filter(|language| !language.is_empty())
        .and_then(|language| {
            syntaxes
                .find_syntax_by_token(language)
                .or_else(|| syntaxes.find_syntax_by_extension(language))
                .or_else(|| syntaxes.find_syntax_by_name(language))
        })
        .unwrap_or_else(|| syntaxes.find_syntax_plain_text())
}

/// Returns true when `language` maps to a known syntax definition.
#[must_use]
pub fn is_supported(language: &str) -> bool {
    let syntaxes = syntax_set();
    syntax_for(syntaxes, Some(language)).name != syntaxes.find_syntax_plain_text().name
}

/// Highlights `code` with the default theme, one escaped string per line.
#[must_use]
pub fn highlight_code(code: &str, language: Option<&str>) -> Vec<String> {
    highlight_code_with_theme(code, language, DEFAULT_THEME)
}

/// Highlights `code` with the named syntect theme.
///
/// Unknown themes fall back to the default theme. Lines that fail to
/// highlight are returned unstyled; the line count always matches `code`.
#[must_use]
pub fn highlight_code_with_theme(code: &str, language: Option<&str>, theme: &str) -> Vec<String> {
    let Some(theme) = theme_named(theme) else {
        return code.split('\n').map(str::to_string).collect();
    };
    let syntaxes = syntax_set();
    let mut highlighter = HighlightLines::new(syntax_for(syntaxes, language), theme);

    let mut lines = Vec::new();
    for line in LinesWithEndings::from(code) {
        let text = line.strip_suffix('\n').unwrap_or(line);
        let text = text.strip_suffix('\r').unwrap_or(text);
        match highlighter.highlight_line(line, syntaxes) {
            Ok(ranges) => {
                let escaped = as_24_bit_terminal_escaped(&ranges, false);
                let escaped = escaped.trim_end_matches(['\n', '\r']);
                lines.push(format!("{escaped}{RESET}"));
            }
            Err(error) => {
                tracing::debug!(%error, "highlighting failed; emitting plain line");
                lines.push(text.to_string());
            }
        }
    }

    // LinesWithEndings yields nothing for a trailing empty line.
    if code.is_empty() || code.ends_with('\n') {
        lines.push(String::new());
    }
    lines
}

/// Strips ANSI CSI escape sequences from `text`.
#[must_use]
pub fn strip_ansi(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            if chars.next() == Some('[') {
                for code in chars.by_ref() {
                    if ('@'..='~').contains(&code) {
                        break;
                    }
                }
            }
            continue;
        }
        plain.push(ch);
    }
    plain
}
