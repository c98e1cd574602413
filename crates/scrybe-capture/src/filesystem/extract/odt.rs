//! ODT (`OpenDocument` Text) extraction (spec §4.7 step 3).
//!
//! `.odt` is a ZIP archive; `content.xml` holds the body as `text:p`
//! paragraphs, `text:h` headings, and `table:table` tables. Table cells are
//! joined with `" | "` and rows with a newline, matching the DOCX convention.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

pub fn extract(path: &Path) -> String {
    match extract_inner(path) {
        Ok(text) => text,
        Err(e) => format!("[error extracting odt: {e}]"),
    }
}

fn extract_inner(path: &Path) -> anyhow::Result<String> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let mut xml = String::new();
    archive.by_name("content.xml")?.read_to_string(&mut xml)?;
    Ok(parse_content_xml(&xml)?)
}

fn parse_content_xml(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut blocks: Vec<String> = Vec::new();
    let mut current_text = String::new();
    let mut in_paragraph = false;
    let mut in_heading = false;
    let mut in_table_cell = false;
    let mut current_row: Vec<String> = Vec::new();
    let mut table_rows: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) => match e.name().as_ref() {
                b"text:p" => {
                    in_paragraph = true;
                    current_text.clear();
                }
                b"text:h" => {
                    in_heading = true;
                    current_text.clear();
                }
                b"text:s" => current_text.push(' '),
                b"text:tab" => current_text.push('\t'),
                b"text:line-break" => current_text.push('\n'),
                b"table:table-cell" => in_table_cell = true,
                _ => {}
            },
            Ok(Event::Text(e)) if in_paragraph || in_heading || in_table_cell => {
                let text = e.unescape()?.into_owned();
                current_text.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"text:p" => {
                    if in_paragraph {
                        let trimmed = current_text.trim();
                        if in_table_cell {
                            current_text = trimmed.to_string();
                        } else if !trimmed.is_empty() {
                            blocks.push(trimmed.to_string());
                        }
                        in_paragraph = false;
                    }
                }
                b"text:h" => {
                    if in_heading {
                        let trimmed = current_text.trim();
                        if !trimmed.is_empty() {
                            blocks.push(format!("# {trimmed}"));
                        }
                        in_heading = false;
                        current_text.clear();
                    }
                }
                b"table:table-cell" => {
                    current_row.push(current_text.trim().to_string());
                    current_text.clear();
                    in_table_cell = false;
                }
                b"table:table-row" => {
                    if !current_row.is_empty() {
                        table_rows.push(current_row.join(" | "));
                        current_row.clear();
                    }
                }
                b"table:table" => {
                    if !table_rows.is_empty() {
                        blocks.push(table_rows.join("\n"));
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

    Ok(blocks.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_paragraph() {
        let xml = r#"<?xml version="1.0"?>
        <office:document-content>
            <office:body>
                <office:text>
                    <text:p>Hello World</text:p>
                </office:text>
            </office:body>
        </office:document-content>"#;
        let text = parse_content_xml(xml).unwrap();
        assert_eq!(text, "Hello World");
    }

    #[test]
    fn extracts_heading_and_table() {
        let xml = r#"<?xml version="1.0"?>
        <office:document-content>
            <office:body>
                <office:text>
                    <text:h>Chapter 1</text:h>
                    <table:table>
                        <table:table-row>
                            <table:table-cell><text:p>a</text:p></table:table-cell>
                            <table:table-cell><text:p>b</text:p></table:table-cell>
                        </table:table-row>
                    </table:table>
                </office:text>
            </office:body>
        </office:document-content>"#;
        let text = parse_content_xml(xml).unwrap();
        assert!(text.contains("# Chapter 1"));
        assert!(text.contains("a | b"));
    }
}
