//! Global metadata attached to the output container
//!
//! New containers get a CF-style set of global attributes. Users may extend or
//! override them with a flat JSON object of strings and numbers.

use crate::errors::{Result, RuNeStackError};
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Value of a global attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

/// Ordered set of global attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalMetadata {
    attributes: BTreeMap<String, AttrValue>,
}

impl GlobalMetadata {
    /// Empty set of attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// The attributes every new container carries: title, institution,
    /// source, history, references and Conventions.
    pub fn defaults() -> Self {
        let mut meta = Self::new();
        meta.set("title", "PCRaster map stack time series");
        meta.set("institution", "RuNeStack");
        meta.set("source", "runestack");
        meta.set(
            "history",
            format!("Created by RuNeStack on {}", Utc::now().to_rfc3339()),
        );
        meta.set("references", "https://github.com/user/RuNeStack");
        meta.set("Conventions", "CF-1.4");
        meta
    }

    /// Insert or replace an attribute.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Overlay attributes from a JSON object. Strings, integers and floats
    /// are accepted; booleans are stored as `"true"`/`"false"`.
    ///
    /// # Errors
    ///
    /// Returns [`RuNeStackError::InvalidMetadata`] if the document is not an
    /// object or holds nested values.
    pub fn merge_json(&mut self, json: &str) -> Result<()> {
        let value: JsonValue = serde_json::from_str(json)?;
        let JsonValue::Object(map) = value else {
            return Err(RuNeStackError::InvalidMetadata(
                "expected a JSON object of attribute names to values".to_string(),
            ));
        };

        for (name, value) in map {
            let attr = match value {
                JsonValue::String(s) => AttrValue::Text(s),
                JsonValue::Bool(b) => AttrValue::Text(b.to_string()),
                JsonValue::Number(n) => match n.as_i64() {
                    Some(i) => AttrValue::Int(i),
                    None => AttrValue::Float(n.as_f64().ok_or_else(|| {
                        RuNeStackError::InvalidMetadata(format!("'{name}' is out of range"))
                    })?),
                },
                other => {
                    return Err(RuNeStackError::InvalidMetadata(format!(
                        "'{name}' must be a string or number, got {other}"
                    )))
                }
            };
            self.attributes.insert(name, attr);
        }
        Ok(())
    }

    /// Overlay attributes from a JSON file, see [`GlobalMetadata::merge_json`].
    pub fn merge_json_file(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path)?;
        self.merge_json(&text)
    }
}
