use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::config::MergeOptions;
use crate::registry::{is_owned_key, Metadata, Registry, ANNOTATION_DEFAULTS};
use crate::roster::Roster;

/// Builds the next registry from a freshly parsed roster.
///
/// Identifiers and names are replaced wholesale by the roster; students that
/// only exist in `prior` are dropped. The support contact, the `comentario_*`
/// notes and every key this tool does not own carry over from `prior`.
pub fn merge(
    roster: &Roster,
    prior: &Registry,
    today: NaiveDate,
    options: &MergeOptions,
) -> Registry {
    let permitted_identifiers = roster
        .iter()
        .map(|r| r.identifier.clone())
        .collect::<Vec<_>>();
    let name_by_identifier = roster
        .iter()
        .map(|r| (r.identifier.clone(), r.name.clone()))
        .collect();

    let support_contact = prior
        .metadata
        .support_contact
        .clone()
        .unwrap_or_else(|| options.support_contact.clone());

    let mut annotations = Map::new();
    for (key, default) in ANNOTATION_DEFAULTS {
        let value = prior
            .annotations
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::String(default.to_string()));
        annotations.insert(key.to_string(), value);
    }

    let extra_fields = prior
        .extra_fields
        .iter()
        .filter(|(k, _)| !is_owned_key(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Registry {
        permitted_identifiers,
        name_by_identifier,
        metadata: Metadata {
            last_update: Some(today),
            total_count: roster.len(),
            support_contact: Some(support_contact),
        },
        annotations,
        extra_fields,
    }
}
