//! Terminal rendering of transcript messages.

use unicode_width::UnicodeWidthStr;

use crate::config::RenderConfig;
use crate::highlight::{highlight_code_with_theme, is_supported};
use crate::language::LanguageInfo;
use crate::segment::{parse, Segment};

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const RULE: char = '─';

/// Renders a finalized message: role header, prose verbatim, framed code.
#[must_use]
pub fn render_message(role: &str, content: &str, config: &RenderConfig) -> Vec<String> {
    let mut lines = vec![role_header(role, config)];

    for segment in parse(content) {
        match segment.language_info() {
            Some(info) => render_code(&mut lines, &segment, info, config),
            None => lines.extend(segment.text.split('\n').map(str::to_string)),
        }
    }

    lines
}

/// Renders in-flight assistant text without segmentation.
#[must_use]
pub fn render_streaming(content: &str) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    content.split('\n').map(str::to_string).collect()
}

fn role_header(role: &str, config: &RenderConfig) -> String {
    let label = role.to_uppercase();
    if config.highlight {
        format!("{BOLD}{label}{RESET}")
    } else {
        label
    }
}

fn render_code(
    lines: &mut Vec<String>,
    segment: &Segment<'_>,
    info: LanguageInfo,
    config: &RenderConfig,
) {
    lines.push(code_header(info, segment.line_count(), config));

    let syntax = if info.is_fallback() {
        segment.language
    } else {
        Some(info.label)
    };
    match syntax.filter(|syntax| config.highlight && is_supported(syntax)) {
        Some(syntax) => {
            lines.extend(highlight_code_with_theme(segment.text, Some(syntax), &config.theme));
        }
        None => lines.extend(segment.text.split('\n').map(str::to_string)),
    }

    let rule = RULE.to_string().repeat(config.width);
    lines.push(if config.highlight {
        format!("{DIM}{rule}{RESET}")
    } else {
        rule
    });
}

/// Header bar: ` label ` badge, a rule, then the line count, padded to width.
#[must_use]
pub fn code_header(info: LanguageInfo, line_count: usize, config: &RenderConfig) -> String {
    let badge = format!(" {} ", info.label);
    let count = if line_count == 1 {
        " 1 line".to_string()
    } else {
        format!(" {line_count} lines")
    };

    let used = badge.width() + count.width() + 1;
    let fill = config.width.saturating_sub(used).max(1);
    let rule = format!(" {}", RULE.to_string().repeat(fill));

    if config.highlight {
        format!(
            "\x1b[{}m{badge}{RESET}{DIM}{rule}{count}{RESET}",
            info.color.ansi()
        )
    } else {
        format!("{badge}{rule}{count}")
    }
}
