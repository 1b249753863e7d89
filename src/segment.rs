//! Prose/code segmentation of finalized assistant messages.
//!
//! Fence delimiters are lines whose left-trimmed text starts with three
//! backticks. Delimiters pair up in document order; text outside a pair is
//! prose and text inside is code. An odd trailing delimiter opens a code
//! segment that runs to the end of the text.

use crate::language::{resolve, LanguageInfo};

const FENCE: &str = "```";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Prose,
    Code,
}

/// A contiguous prose or code region of a message, borrowed from its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub kind: SegmentKind,
    pub text: &'a str,
    /// Raw fence tag for code segments, as written after the opening fence.
    pub language: Option<&'a str>,
}

impl<'a> Segment<'a> {
    #[must_use]
    pub fn prose(text: &'a str) -> Self {
        Self {
            kind: SegmentKind::Prose,
            text,
            language: None,
        }
    }

    #[must_use]
    pub fn code(text: &'a str, language: Option<&'a str>) -> Self {
        Self {
            kind: SegmentKind::Code,
            text,
            language,
        }
    }

    #[must_use]
    pub fn is_code(&self) -> bool {
        self.kind == SegmentKind::Code
    }

    /// Number of lines in the segment text.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    /// Display metadata for code segments; `None` for prose.
    #[must_use]
    pub fn language_info(&self) -> Option<LanguageInfo> {
        match self.kind {
            SegmentKind::Code => Some(resolve(self.language.unwrap_or_default())),
            SegmentKind::Prose => None,
        }
    }
}

/// Splits `content` into segments in document order.
///
/// The iterator is lazy and allocation free. A clone resumes from the same
/// position; calling `parse` again restarts from the beginning.
#[must_use]
pub fn parse(content: &str) -> Segments<'_> {
    Segments {
        source: content,
        pos: Some(0),
        pending: None,
    }
}

/// Returns true when `content` has an opening fence without a matching close.
#[must_use]
pub fn has_unterminated_fence(content: &str) -> bool {
    content.split('\n').filter(|line| is_fence(line)).count() % 2 == 1
}

/// Lazy segment iterator returned by [`parse`].
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    source: &'a str,
    pos: Option<usize>,
    pending: Option<Segment<'a>>,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(segment) = self.pending.take() {
            return Some(segment);
        }

        loop {
            let start = self.pos?;
            let mut line_start = start;

            loop {
                let (line_end, next_start) = line_bounds(self.source, line_start);
                let line = &self.source[line_start..line_end];

                if is_fence(line) {
                    let prose = strip_line_break(&self.source[start..line_start]);
                    let (code, after) = self.scan_code(line_start, line_end, next_start);
                    self.pos = after;

                    match (non_blank(prose), code) {
                        (Some(prose), code) => {
                            self.pending = code;
                            return Some(Segment::prose(prose));
                        }
                        (None, Some(code)) => return Some(code),
                        (None, None) => break,
                    }
                }

                match next_start {
                    Some(next) => line_start = next,
                    None => {
                        self.pos = None;
                        let rest = strip_line_break(&self.source[start..]);
                        return non_blank(rest).map(Segment::prose);
                    }
                }
            }
        }
    }
}

impl<'a> Segments<'a> {
    /// Scans the code body opened by the fence line at `fence_start..fence_end`.
    ///
    /// Returns the code segment (if its body is not blank) and the position
    /// after the closing fence line.
    fn scan_code(
        &self,
        fence_start: usize,
        fence_end: usize,
        next_start: Option<usize>,
    ) -> (Option<Segment<'a>>, Option<usize>) {
        let source = self.source;
        let fence_line = &source[fence_start..fence_end];
        let after_ticks =
            fence_start + (fence_line.len() - fence_line.trim_start().len()) + FENCE.len();
        let info_raw = &source[after_ticks..fence_end];
        let info = info_raw.trim();

        // Info text that is not shaped like a tag is the first line of code.
        let (language, body_start) = if is_language_tag(info) {
            (Some(info).filter(|tag| !tag.is_empty()), next_start)
        } else {
            let leading = info_raw.len() - info_raw.trim_start().len();
            (None, Some(after_ticks + leading))
        };

        let mut search = next_start;
        while let Some(current) = search {
            let (line_end, following) = line_bounds(source, current);
            if is_fence(&source[current..line_end]) {
                let body = match body_start {
                    Some(body_start) if current > body_start => {
                        strip_line_break(&source[body_start..current])
                    }
                    _ => "",
                };
                return (code_segment(body, language), following);
            }
            search = following;
        }

        let body = body_start.map_or("", |body_start| strip_line_break(&source[body_start..]));
        (code_segment(body, language), None)
    }
}

fn code_segment<'a>(body: &'a str, language: Option<&'a str>) -> Option<Segment<'a>> {
    if body.trim().is_empty() {
        None
    } else {
        Some(Segment::code(body, language))
    }
}

/// Returns `(end of line, start of next line)` for the line at `start`.
fn line_bounds(source: &str, start: usize) -> (usize, Option<usize>) {
    match source[start..].find('\n') {
        Some(offset) => (start + offset, Some(start + offset + 1)),
        None => (source.len(), None),
    }
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with(FENCE)
}

fn is_language_tag(info: &str) -> bool {
    info.chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '#' | '-' | '.' | '_'))
}

fn strip_line_break(text: &str) -> &str {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.strip_suffix('\r').unwrap_or(text)
}

fn non_blank(text: &str) -> Option<&str> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
