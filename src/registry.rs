use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

pub const PERMITTED_KEY: &str = "usuarios_permitidos";
pub const NAMES_KEY: &str = "nombres";
pub const INFO_KEY: &str = "informacion";
const LAST_UPDATE_KEY: &str = "ultima_actualizacion";
const TOTAL_KEY: &str = "total_usuarios";
const CONTACT_KEY: &str = "contacto_soporte";

/// Free-text comment keys and the text they get when a registry has none.
pub const ANNOTATION_DEFAULTS: [(&str, &str); 3] = [
    ("comentario_1", "Datos de usuario para la aplicación web"),
    (
        "comentario_2",
        "Puedes agregar aquí información adicional para el frontend o administración",
    ),
    (
        "comentario_3",
        "Puedes agregar más secciones según necesidades futuras",
    ),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    #[serde(rename = "ultima_actualizacion", skip_serializing_if = "Option::is_none")]
    pub last_update: Option<NaiveDate>,
    #[serde(rename = "total_usuarios")]
    pub total_count: usize,
    #[serde(rename = "contacto_soporte", skip_serializing_if = "Option::is_none")]
    pub support_contact: Option<String>,
}

/// The persisted user registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    pub permitted_identifiers: Vec<String>,
    pub name_by_identifier: IndexMap<String, String>,
    pub metadata: Metadata,
    /// `comentario_*` entries, kept as whatever JSON value they hold.
    pub annotations: Map<String, Value>,
    /// Top-level keys this tool does not own, in document order.
    pub extra_fields: Map<String, Value>,
}

pub fn is_owned_key(key: &str) -> bool {
    key == PERMITTED_KEY
        || key == NAMES_KEY
        || key == INFO_KEY
        || ANNOTATION_DEFAULTS.iter().any(|(k, _)| *k == key)
}

impl Registry {
    /// Builds a registry from a parsed document. Schema fields holding
    /// unexpected types are skipped instead of rejecting the document.
    pub fn from_document(doc: Map<String, Value>) -> Self {
        let mut registry = Registry::default();
        for (key, value) in doc {
            match key.as_str() {
                PERMITTED_KEY => {
                    if let Value::Array(items) = value {
                        registry.permitted_identifiers = items
                            .into_iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect();
                    }
                }
                NAMES_KEY => {
                    if let Value::Object(m) = value {
                        registry.name_by_identifier = m
                            .into_iter()
                            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                            .collect();
                    }
                }
                INFO_KEY => {
                    if let Value::Object(info) = value {
                        registry.metadata = metadata_from_info(&info);
                    }
                }
                k if is_owned_key(k) => {
                    registry.annotations.insert(key, value);
                }
                _ => {
                    registry.extra_fields.insert(key, value);
                }
            }
        }
        registry
    }

    /// Flattens the registry back into a single JSON object.
    pub fn to_document(&self) -> serde_json::Result<Value> {
        let [c1, c2, c3] = ANNOTATION_DEFAULTS.map(|(k, _)| k);
        let mut doc = Map::new();
        if let Some(v) = self.annotations.get(c1) {
            doc.insert(c1.to_string(), v.clone());
        }
        doc.insert(
            PERMITTED_KEY.to_string(),
            serde_json::to_value(&self.permitted_identifiers)?,
        );
        doc.insert(
            NAMES_KEY.to_string(),
            serde_json::to_value(&self.name_by_identifier)?,
        );
        if let Some(v) = self.annotations.get(c2) {
            doc.insert(c2.to_string(), v.clone());
        }
        doc.insert(INFO_KEY.to_string(), serde_json::to_value(&self.metadata)?);
        if let Some(v) = self.annotations.get(c3) {
            doc.insert(c3.to_string(), v.clone());
        }
        for (k, v) in &self.extra_fields {
            if !doc.contains_key(k) {
                doc.insert(k.clone(), v.clone());
            }
        }
        Ok(Value::Object(doc))
    }
}

fn metadata_from_info(info: &Map<String, Value>) -> Metadata {
    Metadata {
        last_update: info
            .get(LAST_UPDATE_KEY)
            .and_then(|v| v.as_str())
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()),
        total_count: info
            .get(TOTAL_KEY)
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(0),
        support_contact: info
            .get(CONTACT_KEY)
            .and_then(|v| v.as_str())
            .map(str::to_string),
    }
}

/// Reads the registry at `path`. A missing file yields `Ok(None)`.
pub fn read_registry(path: &Path) -> Result<Option<Registry>> {
    let malformed = |reason: String| SyncError::MalformedPriorState {
        path: path.to_path_buf(),
        reason,
    };
    if !path.try_exists().map_err(|e| malformed(e.to_string()))? {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| malformed(e.to_string()))?;
    match serde_json::from_str::<Value>(&text).map_err(|e| malformed(e.to_string()))? {
        Value::Object(doc) => Ok(Some(Registry::from_document(doc))),
        _ => Err(malformed("top-level value is not an object".to_string())),
    }
}

/// Loads the prior registry, falling back to an empty one when the file is
/// missing or cannot be parsed.
pub fn load_registry(path: &Path) -> Registry {
    match read_registry(path) {
        Ok(Some(registry)) => {
            info!(path = %path.display(), "existing registry found, updating");
            registry
        }
        Ok(None) => {
            info!(path = %path.display(), "no registry found, creating a new one");
            Registry::default()
        }
        Err(e) => {
            warn!(error = %e, "discarding unreadable registry, starting fresh");
            Registry::default()
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "registry".into());
    name.push(".writing");
    path.with_file_name(name)
}

/// Replaces the registry at `path` with `registry`.
pub fn write_registry(path: &Path, registry: &Registry) -> Result<()> {
    let failure = |source: std::io::Error| SyncError::WriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let mut payload = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut payload, formatter);
    let doc = registry.to_document().map_err(|e| failure(e.into()))?;
    doc.serialize(&mut ser).map_err(|e| failure(e.into()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(failure)?;
    }

    let tmp = temp_path_for(path);
    let written = File::create(&tmp).and_then(|mut f| {
        f.write_all(&payload)?;
        f.sync_all()
    });
    if let Err(e) = written.and_then(|_| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(failure(e));
    }
    debug!(path = %path.display(), bytes = payload.len(), "registry written");
    Ok(())
}
