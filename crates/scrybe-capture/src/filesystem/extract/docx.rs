//! DOCX (OOXML) text extraction (spec §4.7 step 3).
//!
//! A `.docx` is a ZIP archive; `word/document.xml` holds the body as a
//! sequence of `w:p` paragraphs and `w:tbl` tables. Paragraph runs
//! (`w:r`/`w:t`) are concatenated in document order; table cells are joined
//! with `" | "` and rows with a newline, per the fixed DOCX format.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

pub fn extract(path: &Path) -> String {
    match extract_inner(path) {
        Ok(text) => text,
        Err(e) => format!("[error extracting docx: {e}]"),
    }
}

fn extract_inner(path: &Path) -> anyhow::Result<String> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")?
        .read_to_string(&mut xml)?;
    Ok(parse_document_xml(&xml)?)
}

fn parse_document_xml(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current_run = String::new();
    let mut current_cell = String::new();
    let mut current_row: Vec<String> = Vec::new();
    let mut table_rows: Vec<String> = Vec::new();
    let mut in_table_cell = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) => match e.name().as_ref() {
                b"w:p" => current_run.clear(),
                b"w:tc" => {
                    in_table_cell = true;
                    current_cell.clear();
                }
                b"w:tab" => current_run.push('\t'),
                b"w:br" => current_run.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                let text = e.unescape()?.into_owned();
                current_run.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:p" => {
                    if in_table_cell {
                        current_cell.push_str(&current_run);
                    } else {
                        let trimmed = current_run.trim();
                        if !trimmed.is_empty() {
                            paragraphs.push(trimmed.to_string());
                        }
                    }
                    current_run.clear();
                }
                b"w:tc" => {
                    current_row.push(current_cell.trim().to_string());
                    in_table_cell = false;
                }
                b"w:tr" => {
                    if !current_row.is_empty() {
                        table_rows.push(current_row.join(" | "));
                        current_row.clear();
                    }
                }
                b"w:tbl" => {
                    if !table_rows.is_empty() {
                        paragraphs.push(table_rows.join("\n"));
                        table_rows.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_paragraphs_and_tables() {
        let xml = r#"<?xml version="1.0"?>
        <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
          <w:body>
            <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t> World</w:t></w:r></w:p>
            <w:tbl>
              <w:tr>
                <w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc>
                <w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc>
              </w:tr>
              <w:tr>
                <w:tc><w:p><w:r><w:t>1</w:t></w:r></w:p></w:tc>
                <w:tc><w:p><w:r><w:t>2</w:t></w:r></w:p></w:tc>
              </w:tr>
            </w:tbl>
          </w:body>
        </w:document>"#;

        let text = parse_document_xml(xml).unwrap();
        assert!(text.contains("Hello World"));
        assert!(text.contains("a | b"));
        assert!(text.contains("1 | 2"));
    }
}
