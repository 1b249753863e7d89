//! Copy, download and export actions over capability traits.

use std::fs;
use std::path::{Path, PathBuf};

use codegenie::{parse, Segment};
use time::{Date, OffsetDateTime};

use crate::error::{ActionError, Notice};
use crate::message::Message;
use crate::session::SessionController;

pub const DOWNLOAD_STEM: &str = "generated-code";

pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ActionError>;
}

pub trait FileSink {
    /// Writes `contents` under `name`, returning where it landed.
    fn write_file(&mut self, name: &str, contents: &str) -> Result<PathBuf, ActionError>;
}

/// Writes files into one directory on disk.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSink for DirectorySink {
    fn write_file(&mut self, name: &str, contents: &str) -> Result<PathBuf, ActionError> {
        fs::create_dir_all(&self.root)
            .map_err(|source| ActionError::io("creating directory", &self.root, source))?;
        let path = self.root.join(name);
        fs::write(&path, contents)
            .map_err(|source| ActionError::io("writing file", &path, source))?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "file written");
        Ok(path)
    }
}

/// System clipboard backed by `arboard`.
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ActionError> {
        arboard::Clipboard::new()
            .map(|inner| Self { inner })
            .map_err(|error| ActionError::Clipboard(error.to_string()))
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ActionError> {
        self.inner
            .set_text(text.to_string())
            .map_err(|error| ActionError::Clipboard(error.to_string()))
    }
}

/// Code segments of a message, in document order.
pub fn code_segments(message: &Message) -> impl Iterator<Item = Segment<'_>> {
    parse(&message.content).filter(Segment::is_code)
}

/// Stable id of a code segment: `<message-id>-<index>`.
#[must_use]
pub fn segment_id(message: &Message, index: usize) -> String {
    format!("{}-{index}", message.id)
}

fn code_segment(message: &Message, index: usize) -> Result<Segment<'_>, ActionError> {
    code_segments(message)
        .nth(index)
        .ok_or(ActionError::NoSuchSegment { index })
}

pub fn copy_message(clipboard: &mut dyn Clipboard, message: &Message) -> Result<(), ActionError> {
    clipboard.set_text(&message.content)
}

/// Copies code segment `index` (zero based) and returns its segment id.
pub fn copy_segment(
    clipboard: &mut dyn Clipboard,
    message: &Message,
    index: usize,
) -> Result<String, ActionError> {
    let segment = code_segment(message, index)?;
    clipboard.set_text(segment.text)?;
    Ok(segment_id(message, index))
}

/// File name for a downloaded code segment, e.g. `generated-code.py`.
#[must_use]
pub fn download_file_name(segment: &Segment<'_>) -> String {
    let extension = segment
        .language_info()
        .map_or(codegenie::FALLBACK.extension, |info| info.extension);
    format!("{DOWNLOAD_STEM}.{extension}")
}

/// Writes code segment `index` verbatim to `sink`.
pub fn download_segment(
    sink: &mut dyn FileSink,
    message: &Message,
    index: usize,
) -> Result<PathBuf, ActionError> {
    let segment = code_segment(message, index)?;
    sink.write_file(&download_file_name(&segment), segment.text)
}

/// Export file name: `<prefix>-<YYYY-MM-DD>.txt`.
#[must_use]
pub fn export_file_name(prefix: &str, date: Date) -> String {
    format!(
        "{prefix}-{:04}-{:02}-{:02}.txt",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Writes the session's export text to `sink`, named for `date`.
pub fn export_transcript(
    sink: &mut dyn FileSink,
    session: &SessionController,
    prefix: &str,
    date: Date,
) -> Result<PathBuf, ActionError> {
    if !session.can_export() {
        return Err(ActionError::EmptyTranscript);
    }
    sink.write_file(&export_file_name(prefix, date), &session.export())
}

/// Today's UTC date, used for export file names.
#[must_use]
pub fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}

#[must_use]
pub fn copied_notice() -> Notice {
    Notice::info("Copied to clipboard", "Content has been copied to your clipboard")
}

#[must_use]
pub fn copy_failed_notice(error: &ActionError) -> Notice {
    Notice::error("Failed to copy", error.to_string())
}

#[must_use]
pub fn downloaded_notice(path: &Path) -> Notice {
    Notice::info("Code downloaded", format!("Saved to {}", path.display()))
}

#[must_use]
pub fn exported_notice(path: &Path) -> Notice {
    Notice::info("Chat exported", format!("Saved to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use time::Month;

    use super::*;

    #[derive(Default)]
    struct MemoryClipboard {
        text: Option<String>,
    }

    impl Clipboard for MemoryClipboard {
        fn set_text(&mut self, text: &str) -> Result<(), ActionError> {
            self.text = Some(text.to_string());
            Ok(())
        }
    }

    fn reply(content: &str) -> Message {
        let mut message = Message::in_flight(content);
        message.status = crate::message::MessageStatus::Final;
        message
    }

    #[test]
    fn segment_ids_follow_message_id() {
        let message = reply("```js\nx\n```");
        assert_eq!(segment_id(&message, 2), format!("{}-2", message.id));
    }

    #[test]
    fn copy_segment_copies_code_text_only() {
        let message = reply("intro\n```sql\nSELECT 1;\n```\n```py\nprint(2)\n```");
        let mut clipboard = MemoryClipboard::default();

        let id = copy_segment(&mut clipboard, &message, 1).expect("second block");
        assert_eq!(clipboard.text.as_deref(), Some("print(2)"));
        assert_eq!(id, segment_id(&message, 1));

        let missing = copy_segment(&mut clipboard, &message, 2).expect_err("no third block");
        assert!(matches!(missing, ActionError::NoSuchSegment { index: 2 }));
    }

    #[test]
    fn download_names_use_resolved_extension() {
        let message = reply("```typescript\nconst a = 1;\n```\n```\nplain\n```");
        let segments = code_segments(&message).collect::<Vec<_>>();

        assert_eq!(download_file_name(&segments[0]), "generated-code.ts");
        assert_eq!(download_file_name(&segments[1]), "generated-code.txt");
    }

    #[test]
    fn export_file_name_uses_iso_date() {
        let date = Date::from_calendar_date(2026, Month::March, 7).expect("valid date");
        assert_eq!(export_file_name("ai-code-chat", date), "ai-code-chat-2026-03-07.txt");
    }

    #[test]
    fn copy_message_copies_full_content() {
        let message = reply("all of it");
        let mut clipboard = MemoryClipboard::default();
        copy_message(&mut clipboard, &message).expect("copy");
        assert_eq!(clipboard.text.as_deref(), Some("all of it"));
    }
}
