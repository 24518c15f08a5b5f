use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use crate::config::{RosterOptions, TextEncoding};
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRecord {
    /// Trimmed and uppercased; unique within a roster.
    pub identifier: String,
    pub name: String,
}

/// Row counts gathered while cleaning a roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterStats {
    pub rows_read: usize,
    pub missing_fields: usize,
    pub duplicates: usize,
}

/// Cleaned, deduplicated students in first-occurrence order.
#[derive(Debug, Clone)]
pub struct Roster {
    records: Vec<RosterRecord>,
    encoding: Option<TextEncoding>,
    stats: RosterStats,
}

impl Roster {
    /// Builds a roster from records already in memory, keeping the first
    /// record seen for each identifier.
    pub fn from_records(records: impl IntoIterator<Item = RosterRecord>) -> Self {
        let mut stats = RosterStats::default();
        let mut seen = HashSet::<String>::new();
        let mut out = Vec::new();
        for record in records {
            stats.rows_read += 1;
            if seen.insert(record.identifier.clone()) {
                out.push(record);
            } else {
                stats.duplicates += 1;
            }
        }
        Self {
            records: out,
            encoding: None,
            stats,
        }
    }

    pub fn records(&self) -> &[RosterRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RosterRecord> {
        self.records.iter()
    }

    /// Encoding that decoded the source file, if the roster came from one.
    pub fn encoding(&self) -> Option<TextEncoding> {
        self.encoding
    }

    pub fn stats(&self) -> RosterStats {
        self.stats
    }
}

/// Reads, validates and cleans the roster at `path`.
pub fn parse_roster(path: &Path, options: &RosterOptions) -> Result<Roster> {
    if !path.is_file() {
        return Err(SyncError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path).map_err(|source| SyncError::SourceRead {
        path: path.to_path_buf(),
        source,
    })?;

    let (text, encoding) = decode_roster(path, &bytes, &options.encodings)?;
    info!(encoding = %encoding, path = %path.display(), "roster decoded");

    let (records, stats) = clean_records(path, &text, options)?;
    info!(
        students = records.len(),
        rows = stats.rows_read,
        missing_fields = stats.missing_fields,
        duplicates = stats.duplicates,
        "roster processed"
    );

    Ok(Roster {
        records,
        encoding: Some(encoding),
        stats,
    })
}

fn decode_roster(
    path: &Path,
    bytes: &[u8],
    encodings: &[TextEncoding],
) -> Result<(String, TextEncoding)> {
    for &encoding in encodings {
        match encoding.decode(bytes) {
            Some(text) => return Ok((text, encoding)),
            None => debug!(encoding = %encoding, "roster is not valid in encoding, trying next"),
        }
    }
    Err(SyncError::UnreadableSource {
        path: path.to_path_buf(),
        tried: encodings.iter().map(|e| e.label().to_string()).collect(),
    })
}

fn normalize_header(s: &str) -> String {
    s.trim().to_lowercase()
}

fn non_empty_trimmed(s: &str) -> Option<&str> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}

fn clean_records(
    path: &Path,
    text: &str,
    options: &RosterOptions,
) -> Result<(Vec<RosterRecord>, RosterStats)> {
    let malformed = |source: csv::Error| SyncError::MalformedSource {
        path: path.to_path_buf(),
        line: source.position().map(|p| p.line()).unwrap_or(0),
        reason: source.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(malformed)?.clone();
    let mut idx = HashMap::<String, usize>::new();
    for (i, h) in headers.iter().enumerate() {
        // Keep the first column when a header name repeats.
        idx.entry(normalize_header(h)).or_insert(i);
    }

    let name_col = idx.get(&normalize_header(&options.name_column)).copied();
    let id_col = idx
        .get(&normalize_header(&options.identifier_column))
        .copied();
    let (name_col, id_col) = match (name_col, id_col) {
        (Some(n), Some(c)) => (n, c),
        _ => {
            let mut missing = Vec::new();
            if name_col.is_none() {
                missing.push(options.name_column.clone());
            }
            if id_col.is_none() {
                missing.push(options.identifier_column.clone());
            }
            return Err(SyncError::SchemaMismatch { missing });
        }
    };

    let mut stats = RosterStats::default();
    let mut seen = HashSet::<String>::new();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(malformed)?;
        // Short rows just lack values; extra cells mean the row is misaligned.
        if row.len() > headers.len() {
            return Err(SyncError::MalformedSource {
                path: path.to_path_buf(),
                line: row.position().map(|p| p.line()).unwrap_or(0),
                reason: format!(
                    "expected at most {} fields, found {}",
                    headers.len(),
                    row.len()
                ),
            });
        }
        stats.rows_read += 1;

        let name = row.get(name_col).and_then(non_empty_trimmed);
        let identifier = row.get(id_col).and_then(non_empty_trimmed);
        let (Some(name), Some(identifier)) = (name, identifier) else {
            stats.missing_fields += 1;
            continue;
        };

        let identifier = identifier.to_uppercase();
        if !seen.insert(identifier.clone()) {
            stats.duplicates += 1;
            continue;
        }
        records.push(RosterRecord {
            identifier,
            name: name.to_string(),
        });
    }

    Ok((records, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(text: &str) -> Result<(Vec<RosterRecord>, RosterStats)> {
        clean_records(Path::new("roster.csv"), text, &RosterOptions::default())
    }

    fn record(identifier: &str, name: &str) -> RosterRecord {
        RosterRecord {
            identifier: identifier.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn duplicate_and_incomplete_rows_are_dropped() {
        let text = "nombre,codigo\n Ana Pérez ,abc1\nLuis,ABC1\n,xyz2\n";
        let (records, stats) = clean(text).expect("clean roster");
        assert_eq!(records, vec![record("ABC1", "Ana Pérez")]);
        assert_eq!(
            stats,
            RosterStats {
                rows_read: 3,
                missing_fields: 1,
                duplicates: 1,
            }
        );
    }

    #[test]
    fn identifiers_dedup_ignoring_case_and_whitespace() {
        let text = "codigo,nombre\n  st01 ,Marta\nST01,Otra Marta\nst02,Pedro\n";
        let (records, _) = clean(text).expect("clean roster");
        assert_eq!(records, vec![record("ST01", "Marta"), record("ST02", "Pedro")]);
    }

    #[test]
    fn whitespace_only_values_count_as_missing() {
        let text = "nombre,codigo\n   ,A1\nJuan,   \nRosa,B2\n";
        let (records, stats) = clean(text).expect("clean roster");
        assert_eq!(records, vec![record("B2", "Rosa")]);
        assert_eq!(stats.missing_fields, 2);
    }

    #[test]
    fn short_rows_are_treated_as_missing_values() {
        let text = "nombre,codigo,grado\nJuan\nRosa,B2,11\n";
        let (records, stats) = clean(text).expect("clean roster");
        assert_eq!(records, vec![record("B2", "Rosa")]);
        assert_eq!(stats.rows_read, 2);
        assert_eq!(stats.missing_fields, 1);
    }

    #[test]
    fn rows_wider_than_the_header_are_rejected() {
        let text = "nombre,codigo\nAna,a1\nPérez, Luis,b2\n";
        let err = clean(text).expect_err("misaligned row");
        match err {
            SyncError::MalformedSource { line, ref reason, .. } => {
                assert_eq!(line, 3);
                assert!(reason.contains("found 3"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.stage(), crate::error::Stage::Parse);
    }

    #[test]
    fn headers_match_by_name_not_position() {
        let text = "grado, CODIGO ,Nombre\n11,c9,Lucia\n";
        let (records, _) = clean(text).expect("clean roster");
        assert_eq!(records, vec![record("C9", "Lucia")]);
    }

    #[test]
    fn missing_columns_are_reported_by_name() {
        let err = clean("name,id\nAna,1\n").expect_err("schema mismatch");
        match err {
            SyncError::SchemaMismatch { missing } => {
                assert_eq!(missing, vec!["nombre".to_string(), "codigo".to_string()])
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = clean("nombre,grado\nAna,11\n").expect_err("schema mismatch");
        assert!(matches!(
            err,
            SyncError::SchemaMismatch { ref missing } if missing == &vec!["codigo".to_string()]
        ));
    }

    #[test]
    fn quoted_fields_keep_embedded_delimiters() {
        let text = "nombre,codigo\n\"Pérez, Ana\",a1\n";
        let (records, _) = clean(text).expect("clean roster");
        assert_eq!(records, vec![record("A1", "Pérez, Ana")]);
    }

    #[test]
    fn configured_delimiter_and_columns_are_used() {
        let options = RosterOptions {
            name_column: "estudiante".to_string(),
            identifier_column: "documento".to_string(),
            delimiter: b';',
            ..RosterOptions::default()
        };
        let text = "documento;estudiante\nd1;Camilo\n";
        let (records, _) =
            clean_records(Path::new("roster.csv"), text, &options).expect("clean roster");
        assert_eq!(records, vec![record("D1", "Camilo")]);
    }

    #[test]
    fn decoding_falls_back_in_configured_order() {
        let bytes = b"nombre,codigo\nJos\xe9,a1\n";
        let (text, encoding) = decode_roster(
            Path::new("roster.csv"),
            bytes,
            &[TextEncoding::Utf8, TextEncoding::Windows1252, TextEncoding::Latin1],
        )
        .expect("decode roster");
        assert_eq!(encoding, TextEncoding::Windows1252);
        assert!(text.contains("José"));
    }

    #[test]
    fn decoding_fails_when_no_encoding_fits() {
        let err = decode_roster(Path::new("roster.csv"), b"\xff\xfe", &[TextEncoding::Utf8])
            .expect_err("undecodable");
        match err {
            SyncError::UnreadableSource { tried, .. } => assert_eq!(tried, vec!["utf-8"]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
