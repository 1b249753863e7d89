//! Fence tag to display metadata lookup.

/// Badge color bucket for a code segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorKey {
    Yellow,
    Blue,
    Green,
    Orange,
    Purple,
    Red,
    Pink,
    Indigo,
    Neutral,
}

impl ColorKey {
    /// ANSI SGR parameters used for the segment header badge.
    #[must_use]
    pub fn ansi(self) -> &'static str {
        match self {
            Self::Yellow => "30;43",
            Self::Blue => "97;44",
            Self::Green => "97;42",
            Self::Orange => "30;48;5;208",
            Self::Purple => "97;45",
            Self::Red => "97;41",
            Self::Pink => "30;48;5;218",
            Self::Indigo => "97;48;5;54",
            Self::Neutral => "97;100",
        }
    }
}

/// Resolved display metadata for a fence tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageInfo {
    pub label: &'static str,
    pub extension: &'static str,
    pub color: ColorKey,
}

impl LanguageInfo {
    const fn new(label: &'static str, extension: &'static str, color: ColorKey) -> Self {
        Self {
            label,
            extension,
            color,
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        *self == FALLBACK
    }
}

/// Metadata for empty or unknown tags.
pub const FALLBACK: LanguageInfo = LanguageInfo::new("text", "txt", ColorKey::Neutral);

/// Resolves a fence tag. Matching ignores ASCII case and surrounding
/// whitespace; unknown tags resolve to [`FALLBACK`].
#[must_use]
pub fn resolve(tag: &str) -> LanguageInfo {
    let tag = tag.trim();
    if tag.is_empty() || tag.len() > 16 {
        return FALLBACK;
    }

    match tag.to_ascii_lowercase().as_str() {
        "javascript" | "js" | "jsx" | "mjs" => {
            LanguageInfo::new("javascript", "js", ColorKey::Yellow)
        }
        "typescript" | "ts" | "tsx" => LanguageInfo::new("typescript", "ts", ColorKey::Blue),
        "python" | "py" | "python3" => LanguageInfo::new("python", "py", ColorKey::Green),
        "java" => LanguageInfo::new("java", "java", ColorKey::Orange),
        "cpp" | "c++" | "cc" | "cxx" => LanguageInfo::new("cpp", "cpp", ColorKey::Purple),
        "c" => LanguageInfo::new("c", "c", ColorKey::Neutral),
        "html" | "htm" => LanguageInfo::new("html", "html", ColorKey::Red),
        "css" => LanguageInfo::new("css", "css", ColorKey::Pink),
        "sql" => LanguageInfo::new("sql", "sql", ColorKey::Indigo),
        "bash" | "sh" | "shell" | "zsh" => LanguageInfo::new("bash", "sh", ColorKey::Neutral),
        "json" => LanguageInfo::new("json", "json", ColorKey::Neutral),
        "xml" => LanguageInfo::new("xml", "xml", ColorKey::Neutral),
        "yaml" | "yml" => LanguageInfo::new("yaml", "yml", ColorKey::Neutral),
        "go" | "golang" => LanguageInfo::new("go", "go", ColorKey::Neutral),
        "rust" | "rs" => LanguageInfo::new("rust", "rs", ColorKey::Neutral),
        "php" => LanguageInfo::new("php", "php", ColorKey::Neutral),
        "ruby" | "rb" => LanguageInfo::new("ruby", "rb", ColorKey::Neutral),
        _ => FALLBACK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_languages_map_to_extensions() {
        let table = [
            ("javascript", "js"),
            ("typescript", "ts"),
            ("python", "py"),
            ("py", "py"),
            ("java", "java"),
            ("cpp", "cpp"),
            ("html", "html"),
            ("css", "css"),
            ("sql", "sql"),
            ("go", "go"),
            ("rust", "rs"),
            ("bash", "sh"),
            ("shell", "sh"),
            ("yaml", "yml"),
            ("ruby", "rb"),
        ];

        for (tag, extension) in table {
            assert_eq!(resolve(tag).extension, extension, "tag {tag}");
        }
    }

    #[test]
    fn resolution_ignores_case_and_whitespace() {
        assert_eq!(resolve("  PyThOn "), resolve("python"));
        assert_eq!(resolve("RS").label, "rust");
    }

    #[test]
    fn unknown_and_empty_tags_fall_back_to_text() {
        let oversized = "x".repeat(64);
        for tag in ["", "   ", "brainfuck", oversized.as_str()] {
            let info = resolve(tag);
            assert_eq!(info.label, "text");
            assert_eq!(info.extension, "txt");
            assert_eq!(info.color, ColorKey::Neutral);
            assert!(info.is_fallback());
        }
    }

    #[test]
    fn highlighted_languages_get_distinct_color_buckets() {
        assert_eq!(resolve("js").color, ColorKey::Yellow);
        assert_eq!(resolve("ts").color, ColorKey::Blue);
        assert_eq!(resolve("python").color, ColorKey::Green);
        assert_eq!(resolve("java").color, ColorKey::Orange);
        assert_eq!(resolve("c++").color, ColorKey::Purple);
        assert_eq!(resolve("html").color, ColorKey::Red);
        assert_eq!(resolve("css").color, ColorKey::Pink);
        assert_eq!(resolve("sql").color, ColorKey::Indigo);
        assert_eq!(resolve("go").color, ColorKey::Neutral);
    }
}
