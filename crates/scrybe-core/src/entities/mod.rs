//! Named-Entity Extraction (C2)
//!
//! A small trait seam over entity extraction so the storage/ingestion layer
//! never depends on a concrete NLP implementation. Two implementations ship
//! here: a regex/heuristic extractor that is always available, and a null
//! extractor used when entity tagging is disabled entirely. There is no
//! bundled ML-backed extractor — the retrieval pack has no NER crate, and
//! pulling in a large model runtime (e.g. ONNX token classification) for a
//! feature this narrow isn't worth the dependency weight. See DESIGN.md.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::EntityKind;

/// One extracted span, in the extractor's own words before being persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEntity {
    pub text: String,
    pub kind: EntityKind,
    pub span_start: usize,
    pub span_end: usize,
    pub source_label: String,
}

/// Maps a source-specific NER label to the canonical [`EntityKind`].
///
/// This is the table from the glossary, reproduced verbatim: `PERSON`,
/// `ORG`, `DATE`, `TIME`, `MONEY`, `GPE`, `PRODUCT`, anything else → `other`.
pub fn map_source_label(label: &str) -> EntityKind {
    match label {
        "PERSON" => EntityKind::Person,
        "ORG" => EntityKind::Org,
        "DATE" | "TIME" => EntityKind::Date,
        "MONEY" => EntityKind::Money,
        "GPE" => EntityKind::Geopolitical,
        "PRODUCT" => EntityKind::Product,
        _ => EntityKind::Other,
    }
}

/// C2's trait seam: `is_available()` lets callers skip extraction work
/// entirely rather than calling into a no-op; `extract()` never panics and
/// never blocks on anything the caller didn't already provide.
pub trait EntityExtractor: Send + Sync {
    fn is_available(&self) -> bool;
    fn extract(&self, text: &str) -> Vec<ExtractedEntity>;
}

/// Always returns an empty list. Used when entity extraction is disabled by
/// configuration, or as the fallback the pipeline holds onto so downstream
/// code never has to branch on `Option<Box<dyn EntityExtractor>>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullExtractor;

impl EntityExtractor for NullExtractor {
    fn is_available(&self) -> bool {
        false
    }

    fn extract(&self, _text: &str) -> Vec<ExtractedEntity> {
        Vec::new()
    }
}

struct Patterns {
    person: Regex,
    org: Regex,
    money: Regex,
    date: Regex,
    geopolitical: Regex,
}

/// Sentence-initial function words that would otherwise be misread as a
/// single-token proper name purely because of capitalization (e.g. "Alice"
/// is indistinguishable from "The" by shape alone). Single-word `person`
/// matches against this list are dropped; multi-word matches are unaffected
/// since a run of two or more capitalized words is already a strong signal.
const SINGLE_WORD_STOPWORDS: &[&str] = &[
    "The", "This", "That", "These", "Those", "It", "A", "An", "In", "On", "At", "If", "When",
    "Then", "But", "And", "Or", "So", "Also", "There", "Here", "Now", "Yesterday", "Today",
    "Tomorrow", "We", "They", "He", "She", "You", "I",
];

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        // One to three capitalized words in a row, e.g. "Alice" or "Jane
        // Doe". Single-token matches are filtered against
        // `SINGLE_WORD_STOPWORDS` in `extract` to cut down on false
        // positives from sentence-initial capitalization.
        person: Regex::new(r"\b[A-Z][a-z]+(?:\s[A-Z][a-z]+){0,2}\b").unwrap(),
        // A capitalized run ending in a common corporate suffix.
        org: Regex::new(
            r"\b[A-Z][\w&]*(?:\s[A-Z][\w&]*)*\s(?:Inc|Corp|LLC|Ltd|Co|Company|Group|Labs|Technologies)\.?\b",
        )
        .unwrap(),
        money: Regex::new(r"[$€£]\s?\d[\d,]*(?:\.\d+)?\s?(?:million|billion|k|M|B)?").unwrap(),
        date: Regex::new(
            r"\b(?:\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{2,4}|(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\.?\s\d{1,2},?\s\d{4})\b",
        )
        .unwrap(),
        geopolitical: Regex::new(
            r"\b(?:United States|USA|UK|United Kingdom|China|Japan|Germany|France|India|Canada|Australia|Brazil|Russia|California|Texas|New York|London|Paris|Tokyo|Berlin)\b",
        )
        .unwrap(),
    })
}

/// A regex/heuristic extractor with no model dependency. Coverage is
/// intentionally narrow (proper-noun shapes, common date/money formats, a
/// short gazetteer of place names) rather than attempting general NER; it
/// exists so the system always has *some* entity signal even with no NLP
/// runtime installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl EntityExtractor for HeuristicExtractor {
    fn is_available(&self) -> bool {
        true
    }

    fn extract(&self, text: &str) -> Vec<ExtractedEntity> {
        let p = patterns();
        let mut spans: Vec<ExtractedEntity> = Vec::new();

        for m in p.org.find_iter(text) {
            spans.push(ExtractedEntity {
                text: m.as_str().to_string(),
                kind: EntityKind::Org,
                span_start: m.start(),
                span_end: m.end(),
                source_label: "ORG".into(),
            });
        }
        for m in p.geopolitical.find_iter(text) {
            spans.push(ExtractedEntity {
                text: m.as_str().to_string(),
                kind: EntityKind::Geopolitical,
                span_start: m.start(),
                span_end: m.end(),
                source_label: "GPE".into(),
            });
        }
        for m in p.money.find_iter(text) {
            spans.push(ExtractedEntity {
                text: m.as_str().to_string(),
                kind: EntityKind::Money,
                span_start: m.start(),
                span_end: m.end(),
                source_label: "MONEY".into(),
            });
        }
        for m in p.date.find_iter(text) {
            spans.push(ExtractedEntity {
                text: m.as_str().to_string(),
                kind: EntityKind::Date,
                span_start: m.start(),
                span_end: m.end(),
                source_label: "DATE".into(),
            });
        }
        for m in p.person.find_iter(text) {
            let is_single_word = !m.as_str().contains(' ');
            if is_single_word && SINGLE_WORD_STOPWORDS.contains(&m.as_str()) {
                continue;
            }
            spans.push(ExtractedEntity {
                text: m.as_str().to_string(),
                kind: EntityKind::Person,
                span_start: m.start(),
                span_end: m.end(),
                source_label: "PERSON".into(),
            });
        }

        // Non-overlapping, left-to-right: sort by start, drop any span that
        // overlaps one already kept. Earlier patterns in the list above
        // (org, geopolitical, money, date) take precedence over the person
        // pattern, which is the broadest and most prone to false positives.
        spans.sort_by_key(|e| e.span_start);
        let mut kept: Vec<ExtractedEntity> = Vec::with_capacity(spans.len());
        for span in spans {
            let overlaps = kept
                .iter()
                .any(|k| span.span_start < k.span_end && k.span_start < span.span_end);
            if !overlaps {
                kept.push(span);
            }
        }
        kept.sort_by_key(|e| e.span_start);
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_source_label_matches_glossary_table() {
        assert_eq!(map_source_label("PERSON"), EntityKind::Person);
        assert_eq!(map_source_label("ORG"), EntityKind::Org);
        assert_eq!(map_source_label("DATE"), EntityKind::Date);
        assert_eq!(map_source_label("TIME"), EntityKind::Date);
        assert_eq!(map_source_label("MONEY"), EntityKind::Money);
        assert_eq!(map_source_label("GPE"), EntityKind::Geopolitical);
        assert_eq!(map_source_label("PRODUCT"), EntityKind::Product);
        assert_eq!(map_source_label("NORP"), EntityKind::Other);
    }

    #[test]
    fn null_extractor_is_always_empty_and_unavailable() {
        let e = NullExtractor;
        assert!(!e.is_available());
        assert!(e.extract("Jane Doe works at Acme Corp.").is_empty());
    }

    #[test]
    fn heuristic_extractor_finds_person_and_org() {
        let e = HeuristicExtractor::new();
        assert!(e.is_available());
        let found = e.extract("Jane Doe met with Acme Corp in London.");
        assert!(found.iter().any(|m| m.kind == EntityKind::Org));
        assert!(found.iter().any(|m| m.kind == EntityKind::Geopolitical));
    }

    #[test]
    fn single_token_name_is_extracted_as_person() {
        let e = HeuristicExtractor::new();
        let found = e.extract("Alice works with Acme Corp.");
        assert!(found.iter().any(|m| m.kind == EntityKind::Person && m.text == "Alice"));
        assert!(found.iter().any(|m| m.kind == EntityKind::Org && m.text == "Acme Corp"));
    }

    #[test]
    fn sentence_initial_stopwords_are_not_mistaken_for_names() {
        let e = HeuristicExtractor::new();
        let found = e.extract("The report was filed on time.");
        assert!(!found.iter().any(|m| m.kind == EntityKind::Person && m.text == "The"));
    }

    #[test]
    fn spans_are_non_overlapping_and_sorted() {
        let e = HeuristicExtractor::new();
        let found = e.extract("Acme Corp paid $5 million on 2024-01-05 in Paris.");
        for w in found.windows(2) {
            assert!(w[0].span_end <= w[1].span_start);
            assert!(w[0].span_start <= w[1].span_start);
        }
    }

    #[test]
    fn spans_stay_within_text_bounds() {
        let e = HeuristicExtractor::new();
        let text = "Jane Doe and Acme Corp, $3.5 million, 03/04/2024.";
        for m in e.extract(text) {
            assert!(m.span_start < m.span_end);
            assert!(m.span_end <= text.len());
            assert_eq!(&text[m.span_start..m.span_end], m.text);
        }
    }
}
