//! Registry wire format.
//!
//! Records arrive as `{"data": {id: {field: {"value": ...}}}}`. Values may
//! be strings or numbers, and an empty `data` may be sent as `[]`.

use serde::Deserialize;
use serde_json::Value;

/// One entry of the custom-lists index.
#[derive(Debug, Deserialize)]
pub(crate) struct ListEntry {
    pub link: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub list_email_key: Option<String>,
    #[serde(default)]
    pub aliases: Value,
}

impl ListEntry {
    /// Alias addresses, deduplicated, in the order the registry sent them.
    pub fn alias_addresses(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let values: Vec<&Value> = match &self.aliases {
            Value::Object(map) => map.values().collect(),
            Value::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        };
        for alias in values.into_iter().filter_map(Value::as_str) {
            let alias = alias.trim();
            if !alias.is_empty() && !out.iter().any(|seen| seen == alias) {
                out.push(alias.to_string());
            }
        }
        out
    }

    /// The list id: `list_email_key`, or the index key when that is empty.
    pub fn id(&self, key: &str) -> String {
        match self.list_email_key.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => key.to_string(),
        }
    }
}

/// Parses the custom-lists index, keeping the registry's order. `[]` is an
/// empty index.
pub(crate) fn parse_index(body: Value) -> Result<Vec<(String, ListEntry)>, String> {
    match body {
        Value::Array(items) if items.is_empty() => Ok(Vec::new()),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, entry)| match serde_json::from_value(entry) {
                Ok(entry) => Ok((key, entry)),
                Err(e) => Err(format!("list {key}: {e}")),
            })
            .collect(),
        _ => Err("index is not an object".to_string()),
    }
}

/// The `(id, record)` pairs under `data`.
pub(crate) fn records(body: &Value) -> Result<Vec<(&str, &Value)>, String> {
    match body.get("data") {
        Some(Value::Object(map)) => Ok(map.iter().map(|(k, v)| (k.as_str(), v)).collect()),
        Some(Value::Array(items)) if items.is_empty() => Ok(Vec::new()),
        Some(Value::Null) => Ok(Vec::new()),
        Some(_) => Err("`data` is not an object".to_string()),
        None => Err("missing `data`".to_string()),
    }
}

/// A field's value as text. Numbers are rendered, blanks are absent.
pub(crate) fn field(record: &Value, key: &str) -> Option<String> {
    let text = match record.get(key)?.get("value")? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Additional addresses from `extra_emails`: a JSON array, or a string
/// holding one.
pub(crate) fn extra_emails(record: &Value) -> Vec<String> {
    let value = match record.get("extra_emails").and_then(|f| f.get("value")) {
        Some(value) => value,
        None => return Vec::new(),
    };
    let parsed;
    let items = match value {
        Value::Array(items) => items,
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => {
                parsed = items;
                &parsed
            }
            _ if text.contains('@') => return vec![text.trim().to_string()],
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
