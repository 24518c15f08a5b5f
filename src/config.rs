use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_ROSTER_PATH: &str = "data/PRECIFES.csv";
pub const DEFAULT_REGISTRY_PATH: &str = "data/usuarios.json";
pub const DEFAULT_NAME_COLUMN: &str = "nombre";
pub const DEFAULT_IDENTIFIER_COLUMN: &str = "codigo";
pub const DEFAULT_SUPPORT_CONTACT: &str = "soporte@iem_cauca.edu.co";

/// Text encodings a roster file may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Windows1252,
}

impl TextEncoding {
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Windows1252 => "windows-1252",
        }
    }

    /// Decodes `bytes`, returning `None` when they are not valid in this encoding.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => {
                let text = std::str::from_utf8(bytes).ok()?;
                Some(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
            }
            // ISO-8859-1 maps every byte to the code point of the same value.
            TextEncoding::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
            TextEncoding::Windows1252 => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(Cow::into_owned),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(TextEncoding::Latin1),
            "windows-1252" | "cp1252" => Ok(TextEncoding::Windows1252),
            other => Err(format!("unsupported encoding: {}", other)),
        }
    }
}

pub fn default_encodings() -> Vec<TextEncoding> {
    vec![
        TextEncoding::Utf8,
        TextEncoding::Latin1,
        TextEncoding::Windows1252,
    ]
}

/// How the roster file is decoded and which columns carry the student fields.
#[derive(Debug, Clone)]
pub struct RosterOptions {
    /// Tried in order; the first one that decodes the file wins.
    pub encodings: Vec<TextEncoding>,
    pub name_column: String,
    pub identifier_column: String,
    pub delimiter: u8,
}

impl Default for RosterOptions {
    fn default() -> Self {
        Self {
            encodings: default_encodings(),
            name_column: DEFAULT_NAME_COLUMN.to_string(),
            identifier_column: DEFAULT_IDENTIFIER_COLUMN.to_string(),
            delimiter: b',',
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Used when the prior registry carries no support contact.
    pub support_contact: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            support_contact: DEFAULT_SUPPORT_CONTACT.to_string(),
        }
    }
}

/// Everything a sync run needs besides the current date.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub roster_path: PathBuf,
    pub registry_path: PathBuf,
    pub roster: RosterOptions,
    pub merge: MergeOptions,
}

impl SyncConfig {
    pub fn new(roster_path: impl Into<PathBuf>, registry_path: impl Into<PathBuf>) -> Self {
        Self {
            roster_path: roster_path.into(),
            registry_path: registry_path.into(),
            roster: RosterOptions::default(),
            merge: MergeOptions::default(),
        }
    }

    pub fn with_encodings(mut self, encodings: Vec<TextEncoding>) -> Self {
        self.roster.encodings = encodings;
        self
    }

    pub fn with_columns(mut self, name: impl Into<String>, identifier: impl Into<String>) -> Self {
        self.roster.name_column = name.into();
        self.roster.identifier_column = identifier.into();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.roster.delimiter = delimiter;
        self
    }

    pub fn with_support_contact(mut self, contact: impl Into<String>) -> Self {
        self.merge.support_contact = contact.into();
        self
    }

    pub fn roster_path(&self) -> &Path {
        &self.roster_path
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_labels_accept_common_aliases() {
        assert_eq!("UTF-8".parse::<TextEncoding>(), Ok(TextEncoding::Utf8));
        assert_eq!("iso-8859-1".parse::<TextEncoding>(), Ok(TextEncoding::Latin1));
        assert_eq!("latin_1".parse::<TextEncoding>(), Ok(TextEncoding::Latin1));
        assert_eq!("cp1252".parse::<TextEncoding>(), Ok(TextEncoding::Windows1252));
        assert!("ebcdic".parse::<TextEncoding>().is_err());
    }

    #[test]
    fn utf8_rejects_latin1_bytes_and_strips_bom() {
        // "Pérez" in latin-1
        let latin1 = b"P\xe9rez";
        assert_eq!(TextEncoding::Utf8.decode(latin1), None);
        assert_eq!(TextEncoding::Latin1.decode(latin1).as_deref(), Some("Pérez"));

        let with_bom = "\u{feff}nombre,codigo".as_bytes();
        assert_eq!(
            TextEncoding::Utf8.decode(with_bom).as_deref(),
            Some("nombre,codigo")
        );
    }

    #[test]
    fn windows_1252_maps_typographic_quotes() {
        let bytes = b"\x93Ana\x94";
        assert_eq!(
            TextEncoding::Windows1252.decode(bytes).as_deref(),
            Some("\u{201c}Ana\u{201d}")
        );
    }

    #[test]
    fn defaults_follow_school_export() {
        let cfg = SyncConfig::new("in.csv", "out.json");
        assert_eq!(cfg.roster.encodings, default_encodings());
        assert_eq!(cfg.roster.name_column, "nombre");
        assert_eq!(cfg.roster.identifier_column, "codigo");
        assert_eq!(cfg.roster.delimiter, b',');
        assert_eq!(cfg.merge.support_contact, DEFAULT_SUPPORT_CONTACT);
    }
}
