//! Text extraction dispatch by file kind (spec §4.7 step 3).
//!
//! Plain text/code read with a UTF-8-then-latin-1 fallback; everything else
//! goes through a format-specific reader. Extraction never fails outright:
//! a reader error yields a placeholder string rather than dropping the
//! event, matching the daemon's "keep processing" posture.

use std::path::Path;

use scrybe_core::FileKind;

pub mod docx;
pub mod odt;
pub mod pdf;
pub mod rtf;

/// Classify a file by its extension (spec §4.7 step 2 / `FileKind`).
pub fn classify(path: &Path) -> FileKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "md" | "markdown" | "rst" => FileKind::Text,
        "py" | "js" | "ts" | "jsx" | "tsx" | "java" | "c" | "cpp" | "h" | "cs" | "go" | "rs"
        | "rb" | "php" | "swift" | "kt" | "scala" | "r" | "m" | "sh" | "bash" | "zsh" | "fish"
        | "sql" | "html" | "css" | "scss" | "sass" | "less" | "xml" | "json" | "yaml" | "yml"
        | "toml" | "ini" | "conf" | "cfg" => FileKind::Code,
        "pdf" => FileKind::Pdf,
        "docx" | "doc" | "odt" | "rtf" => FileKind::Document,
        _ => FileKind::Unknown,
    }
}

/// Extract text content for a file whose kind was already classified.
pub fn extract_text(path: &Path, kind: FileKind) -> String {
    match kind {
        FileKind::Text | FileKind::Code => extract_plain_text(path),
        FileKind::Pdf => pdf::extract(path),
        FileKind::Document => extract_document(path),
        FileKind::Unknown => String::new(),
    }
}

fn extract_document(path: &Path) -> String {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("docx") | Some("doc") => docx::extract(path),
        Some("odt") => odt::extract(path),
        Some("rtf") => rtf::extract(path),
        _ => String::new(),
    }
}

/// Read a text/code file as UTF-8, falling back to Latin-1 on decode error
/// (spec §4.7 step 3).
fn extract_plain_text(path: &Path) -> String {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => return format!("[error reading file: {e}]"),
    };

    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e
            .into_bytes()
            .iter()
            .map(|&b| b as char)
            .collect::<String>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_extensions() {
        assert_eq!(classify(Path::new("notes.md")), FileKind::Text);
        assert_eq!(classify(Path::new("main.rs")), FileKind::Code);
        assert_eq!(classify(Path::new("report.pdf")), FileKind::Pdf);
        assert_eq!(classify(Path::new("letter.docx")), FileKind::Document);
        assert_eq!(classify(Path::new("archive.zip")), FileKind::Unknown);
    }

    #[test]
    fn reads_utf8_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello world").unwrap();
        assert_eq!(extract_plain_text(&path), "hello world");
    }

    #[test]
    fn falls_back_to_latin1_on_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, [0x48, 0x65, 0x6c, 0x6c, 0xE9]).unwrap();
        let text = extract_plain_text(&path);
        assert!(text.starts_with("Hell"));
    }
}
