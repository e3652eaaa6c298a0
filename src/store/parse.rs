//! Alias-list parsing of store responses
//!
//! Deployments of the document API disagree on field names. Each helper tries
//! an ordered list of aliases and returns a typed value or
//! [`RemoteError::Unparsable`].

use super::traits::{Listing, MetadataField, RemoteContainer, RemoteDocument};
use crate::resilience::RemoteError;
use serde_json::Value;

const CONTAINER_ID_KEYS: &[&str] = &["id", "dataset_id", "uuid"];
const CONTAINER_NAME_KEYS: &[&str] = &["name", "title", "dataset_name"];
const DOCUMENT_ID_KEYS: &[&str] = &["id", "document_id", "uuid"];
const DOCUMENT_NAME_KEYS: &[&str] = &["name", "title", "document_name"];
const LIST_KEYS: &[&str] = &["data", "items", "datasets", "documents", "doc_metadata", "fields"];
const HAS_MORE_KEYS: &[&str] = &["has_more", "hasMore"];

/// First alias holding a non-empty string or a number, as a string
pub fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn required(value: &Value, keys: &[&str], what: &str) -> Result<String, RemoteError> {
    pick_string(value, keys).ok_or_else(|| {
        RemoteError::Unparsable(format!("{} missing (tried {}) in {}", what, keys.join("/"), preview(value)))
    })
}

fn preview(value: &Value) -> String {
    value.to_string().chars().take(120).collect()
}

pub fn parse_container(value: &Value) -> Result<RemoteContainer, RemoteError> {
    Ok(RemoteContainer {
        id: required(value, CONTAINER_ID_KEYS, "container id")?,
        name: required(value, CONTAINER_NAME_KEYS, "container name")?,
    })
}

/// Parses a document; a missing name falls back to `fallback_name`
pub fn parse_document(value: &Value, fallback_name: Option<&str>) -> Result<RemoteDocument, RemoteError> {
    let id = required(value, DOCUMENT_ID_KEYS, "document id")?;
    let name = match (pick_string(value, DOCUMENT_NAME_KEYS), fallback_name) {
        (Some(name), _) => name,
        (None, Some(fallback)) => fallback.to_string(),
        (None, None) => required(value, DOCUMENT_NAME_KEYS, "document name")?,
    };
    Ok(RemoteDocument { id, name })
}

pub fn parse_metadata_field(value: &Value) -> Result<MetadataField, RemoteError> {
    Ok(MetadataField {
        id: required(value, &["id", "field_id"], "metadata field id")?,
        name: required(value, &["name", "field_name"], "metadata field name")?,
    })
}

/// Items of a listing: a bare array or the first array under a list alias
pub fn list_items(value: &Value) -> Result<&Vec<Value>, RemoteError> {
    if let Value::Array(items) = value {
        return Ok(items);
    }
    LIST_KEYS
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_array))
        .ok_or_else(|| RemoteError::Unparsable(format!("no list in {}", preview(value))))
}

pub fn has_more(value: &Value) -> bool {
    HAS_MORE_KEYS
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_bool))
        .unwrap_or(false)
}

/// Parses a paginated listing with `item` applied to every element
pub fn parse_listing<T, F>(value: &Value, item: F) -> Result<Listing<T>, RemoteError>
where
    F: Fn(&Value) -> Result<T, RemoteError>,
{
    let items = list_items(value)?
        .iter()
        .map(item)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Listing {
        items,
        has_more: has_more(value),
    })
}

/// The created object: under `key`, under `data`, or the body itself
pub fn created_object<'a>(value: &'a Value, key: &str) -> &'a Value {
    [key, "data"]
        .iter()
        .find_map(|k| value.get(*k).filter(|v| v.is_object()))
        .unwrap_or(value)
}
