use std::sync::LazyLock;

use regex::Regex;

use super::range::ExportRange;

// Invalid on Windows: < > : " / \ | ? * and control characters
static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("valid pattern"));

static RESERVED_NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(CON|PRN|AUX|NUL|COM[1-9]|LPT[1-9])$").expect("valid pattern")
});

/// Longest stem kept, in bytes, leaving room for the range suffix
const MAX_STEM_LEN: usize = 180;

/// Make a file stem safe on Windows, macOS and Linux
pub fn sanitize_filename(name: &str) -> String {
    let replaced = INVALID_CHARS.replace_all(name, "_");
    let trimmed = replaced.trim_matches(|c| c == ' ' || c == '.');

    if RESERVED_NAMES.is_match(trimmed) {
        return format!("_{trimmed}");
    }

    let mut end = trimmed.len().min(MAX_STEM_LEN);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = &trimmed[..end];

    if truncated.is_empty() {
        "untitled".to_string()
    } else {
        truncated.to_string()
    }
}

/// `{stem}-from-0001-to-0003.pdf` for pages 1 through 3
pub fn export_file_name(stem: &str, range: ExportRange) -> String {
    format!(
        "{}-from-{:04}-to-{:04}.pdf",
        sanitize_filename(stem),
        range.start() + 1,
        range.end() + 1
    )
}
