//! RTF text extraction (spec §4.7 step 3).
//!
//! `rtf-parser` does the tokenizing; we just join each body block's text.

use std::path::Path;

pub fn extract(path: &Path) -> String {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => return format!("[error reading rtf: {e}]"),
    };

    match rtf_parser::RtfDocument::try_from(content.as_str()) {
        Ok(doc) => doc
            .body
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        Err(e) => format!("[error extracting rtf: {e}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_paragraph() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.rtf");
        std::fs::write(
            &path,
            r"{\rtf1\ansi\deff0 {\fonttbl {\f0 Times New Roman;}}
\f0\fs24 Hello, World!
}",
        )
        .unwrap();
        let text = extract(&path);
        assert!(text.contains("Hello, World!"));
    }

    #[test]
    fn missing_file_yields_placeholder() {
        let text = extract(Path::new("/nonexistent/does-not-exist.rtf"));
        assert!(text.starts_with("[error"));
    }
}
