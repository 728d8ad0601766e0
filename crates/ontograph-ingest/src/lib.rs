//! Relation-source ingestion for Ontograph (boundary adapter).
//!
//! The ontology provider publishes its topic graph as a flat, delimited file of
//! `subject;predicate;object` records. This crate turns that file into typed
//! [`Relation`] values and nothing more:
//!
//! - it recognizes four predicate semantics (broader, same-as, label, primary label),
//! - the wire tokens for those predicates are configurable ([`PredicateVocabulary`]),
//! - records with any other predicate are skipped and counted,
//! - a record with the wrong field count aborts the whole load.
//!
//! Quoted fields may contain the delimiter, `""` escapes and line breaks; a
//! record whose quote never closes is rejected with the line it started on.
//!
//! Graph construction lives in `ontograph-graph`.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;

pub const DEFAULT_DELIMITER: char = ';';

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("malformed record at line {line}: expected 3 fields, found {fields}")]
    Malformed { line: usize, fields: usize },
    #[error("unterminated quoted field at line {line}")]
    UnterminatedQuote { line: usize },
    #[error("relation source is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("failed to read relation source {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, IngestError>;

// ============================================================================
// Vocabulary
// ============================================================================

/// Which end of a broader record is the narrower topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroaderSubject {
    /// `narrower;broader-generic;broader`
    #[default]
    Narrower,
    /// `broader;broader-generic;narrower`
    Broader,
}

/// Wire tokens for the predicates the graph consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredicateVocabulary {
    pub broader_generic: String,
    pub related_equivalent: String,
    pub label: String,
    pub primary_label: String,
    pub broader_subject: BroaderSubject,
}

impl Default for PredicateVocabulary {
    fn default() -> Self {
        Self {
            broader_generic: "klink:broaderGeneric".to_string(),
            related_equivalent: "klink:relatedEquivalent".to_string(),
            label: "rdfs:label".to_string(),
            primary_label: "klink:primaryLabel".to_string(),
            broader_subject: BroaderSubject::Narrower,
        }
    }
}

/// Delimiter + vocabulary: everything needed to read one relation source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripleFormat {
    pub delimiter: char,
    pub vocabulary: PredicateVocabulary,
}

impl Default for TripleFormat {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            vocabulary: PredicateVocabulary::default(),
        }
    }
}

impl TripleFormat {
    /// Layout of the published CSO dumps, where the subject of a
    /// broader-generic record is the broader topic.
    pub fn cso() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            vocabulary: PredicateVocabulary {
                broader_subject: BroaderSubject::Broader,
                ..PredicateVocabulary::default()
            },
        }
    }
}

// ============================================================================
// Relations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    Broader { narrower: String, broader: String },
    /// `primary` is the record's object, `alias` its subject.
    SameAs { primary: String, alias: String },
    Label { topic: String, text: String },
    PrimaryLabel { topic: String, primary: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    pub records: usize,
    pub broader: usize,
    pub same_as: usize,
    pub labels: usize,
    pub primary_labels: usize,
    pub ignored: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationSet {
    pub relations: Vec<Relation>,
    pub stats: LoadStats,
}

impl RelationSet {
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Split one record on `delimiter`, honoring double-quoted fields.
///
/// Inside quotes the delimiter is literal and `""` is an escaped quote.
/// Fields are trimmed.
fn split_record(line: &str, delimiter: char, line_no: usize) -> Result<Vec<String>> {
    let mut fields = Vec::with_capacity(3);
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == '"' && current.trim().is_empty() {
            current.clear();
            in_quotes = true;
        } else if c == delimiter {
            fields.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }

    if in_quotes {
        return Err(IngestError::UnterminatedQuote { line: line_no });
    }
    fields.push(current.trim().to_string());
    Ok(fields)
}

fn classify(
    subject: String,
    predicate: &str,
    object: String,
    vocabulary: &PredicateVocabulary,
) -> Option<Relation> {
    if predicate == vocabulary.broader_generic {
        let (narrower, broader) = match vocabulary.broader_subject {
            BroaderSubject::Narrower => (subject, object),
            BroaderSubject::Broader => (object, subject),
        };
        Some(Relation::Broader { narrower, broader })
    } else if predicate == vocabulary.related_equivalent {
        Some(Relation::SameAs {
            primary: object,
            alias: subject,
        })
    } else if predicate == vocabulary.label {
        Some(Relation::Label {
            topic: subject,
            text: object,
        })
    } else if predicate == vocabulary.primary_label {
        Some(Relation::PrimaryLabel {
            topic: subject,
            primary: object,
        })
    } else {
        None
    }
}

/// Parse a relation source held in memory.
pub fn parse_relations(text: &str, format: &TripleFormat) -> Result<RelationSet> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut set = RelationSet::default();

    let mut lines = text.lines().enumerate();
    while let Some((idx, line)) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;

        // A quoted field may span lines; keep appending until the quote closes.
        let mut record = Cow::Borrowed(line);
        let mut fields = loop {
            let parsed = split_record(&record, format.delimiter, line_no);
            match parsed {
                Err(IngestError::UnterminatedQuote { .. }) => match lines.next() {
                    Some((_, more)) => {
                        let mut joined = record.into_owned();
                        joined.push('\n');
                        joined.push_str(more);
                        record = Cow::Owned(joined);
                    }
                    None => return Err(IngestError::UnterminatedQuote { line: line_no }),
                },
                other => break other?,
            }
        };
        if fields.len() != 3 {
            return Err(IngestError::Malformed {
                line: line_no,
                fields: fields.len(),
            });
        }

        set.stats.records += 1;
        let object = fields.pop().unwrap_or_default();
        let predicate = fields.pop().unwrap_or_default();
        let subject = fields.pop().unwrap_or_default();

        match classify(subject, &predicate, object, &format.vocabulary) {
            Some(relation) => {
                match &relation {
                    Relation::Broader { .. } => set.stats.broader += 1,
                    Relation::SameAs { .. } => set.stats.same_as += 1,
                    Relation::Label { .. } => set.stats.labels += 1,
                    Relation::PrimaryLabel { .. } => set.stats.primary_labels += 1,
                }
                set.relations.push(relation);
            }
            None => set.stats.ignored += 1,
        }
    }

    tracing::debug!(
        records = set.stats.records,
        broader = set.stats.broader,
        same_as = set.stats.same_as,
        labels = set.stats.labels,
        primary_labels = set.stats.primary_labels,
        ignored = set.stats.ignored,
        "parsed relation source"
    );
    Ok(set)
}

pub fn parse_relations_from_bytes(bytes: &[u8], format: &TripleFormat) -> Result<RelationSet> {
    let text = std::str::from_utf8(bytes)?;
    parse_relations(text, format)
}

pub fn parse_relations_from_file(path: &Path, format: &TripleFormat) -> Result<RelationSet> {
    let bytes = std::fs::read(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_relations_from_bytes(&bytes, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
"machine learning";"klink:broaderGeneric";"artificial intelligence"
"ml";"klink:relatedEquivalent";"machine learning"
"machine learning";"rdfs:label";"machine learning"
"ml";"klink:primaryLabel";"machine learning"
"machine learning";"owl:sameAs";"https://example.org/ml"
"#;

    #[test]
    fn parses_the_four_predicates_and_skips_the_rest() {
        let set = parse_relations(SAMPLE, &TripleFormat::default()).expect("parse");

        assert_eq!(set.stats.records, 5);
        assert_eq!(set.stats.ignored, 1);
        assert_eq!(
            set.relations,
            vec![
                Relation::Broader {
                    narrower: "machine learning".to_string(),
                    broader: "artificial intelligence".to_string(),
                },
                Relation::SameAs {
                    primary: "machine learning".to_string(),
                    alias: "ml".to_string(),
                },
                Relation::Label {
                    topic: "machine learning".to_string(),
                    text: "machine learning".to_string(),
                },
                Relation::PrimaryLabel {
                    topic: "ml".to_string(),
                    primary: "machine learning".to_string(),
                },
            ]
        );
    }

    #[test]
    fn broader_subject_flips_edge_direction() {
        let mut format = TripleFormat::default();
        format.vocabulary.broader_subject = BroaderSubject::Broader;

        let set = parse_relations("ai;klink:broaderGeneric;ml\n", &format).expect("parse");
        assert_eq!(
            set.relations,
            vec![Relation::Broader {
                narrower: "ml".to_string(),
                broader: "ai".to_string(),
            }]
        );
    }

    #[test]
    fn wrong_field_count_is_fatal_with_line_number() {
        let text = "a;rdfs:label;a\n\nb;rdfs:label\n";
        let err = parse_relations(text, &TripleFormat::default()).unwrap_err();
        match err {
            IngestError::Malformed { line, fields } => {
                assert_eq!(line, 3);
                assert_eq!(fields, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn quoted_fields_may_contain_delimiter_and_escaped_quotes() {
        let fields = split_record(r#""a;b" ; "say ""hi""" ;c"#, ';', 1).expect("split");
        assert_eq!(fields, vec!["a;b", r#"say "hi""#, "c"]);

        let err = split_record(r#""open;b;c"#, ';', 7).unwrap_err();
        assert!(matches!(err, IngestError::UnterminatedQuote { line: 7 }));
    }

    #[test]
    fn quoted_field_may_span_lines() {
        let text = "\"a\";rdfs:label;\"first\nsecond\"\nb;rdfs:label;b\n";
        let set = parse_relations(text, &TripleFormat::default()).expect("parse");
        assert_eq!(
            set.relations,
            vec![
                Relation::Label {
                    topic: "a".to_string(),
                    text: "first\nsecond".to_string(),
                },
                Relation::Label {
                    topic: "b".to_string(),
                    text: "b".to_string(),
                },
            ]
        );

        let unterminated = "a;rdfs:label;a\nb;rdfs:label;\"open\nstill open\n";
        let err = parse_relations(unterminated, &TripleFormat::default()).unwrap_err();
        assert!(matches!(err, IngestError::UnterminatedQuote { line: 2 }));
    }

    #[test]
    fn cso_layout_reads_subject_as_broader() {
        let format = TripleFormat::cso();
        assert_eq!(format.vocabulary.broader_subject, BroaderSubject::Broader);
        assert_eq!(TripleFormat::default().vocabulary.broader_subject, BroaderSubject::Narrower);

        let set = parse_relations(
            "computer science;klink:broaderGeneric;artificial intelligence\n",
            &format,
        )
        .expect("parse");
        assert_eq!(
            set.relations,
            vec![Relation::Broader {
                narrower: "artificial intelligence".to_string(),
                broader: "computer science".to_string(),
            }]
        );
    }

    #[test]
    fn custom_vocabulary_and_delimiter() {
        let format = TripleFormat {
            delimiter: '\t',
            vocabulary: PredicateVocabulary {
                broader_generic: "skos:broader".to_string(),
                related_equivalent: "skos:exactMatch".to_string(),
                label: "skos:prefLabel".to_string(),
                primary_label: "ex:canonical".to_string(),
                broader_subject: BroaderSubject::Narrower,
            },
        };
        let text = "x\tskos:broader\ty\nx\tskos:prefLabel\tx\n";
        let set = parse_relations(text, &format).expect("parse");
        assert_eq!(set.stats.broader, 1);
        assert_eq!(set.stats.labels, 1);
        assert_eq!(set.stats.ignored, 0);
    }

    #[test]
    fn reads_from_file_and_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("relations.csv");
        std::fs::write(&path, "a;rdfs:label;a\r\nb;klink:broaderGeneric;a\r\n").expect("write");

        let set = parse_relations_from_file(&path, &TripleFormat::default()).expect("parse");
        assert_eq!(set.len(), 2);

        let err = parse_relations_from_bytes(&[0xff, 0xfe, b';'], &TripleFormat::default())
            .unwrap_err();
        assert!(matches!(err, IngestError::Encoding(_)));

        let missing = parse_relations_from_file(&dir.path().join("nope.csv"), &TripleFormat::default())
            .unwrap_err();
        assert!(matches!(missing, IngestError::Io { .. }));
    }
}
