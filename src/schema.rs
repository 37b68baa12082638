//! Task data contracts
//!
//! Minimal schema shape needed for compatibility checks: a map of
//! `properties` (name -> declared type) plus an ordered `required` list.
//! Property order is the declaration order of the source document and is
//! significant for type-based matching.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A reusable task with its input and output data contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub name: String,
    #[serde(default)]
    pub input_schema: SchemaDefinition,
    #[serde(default)]
    pub output_schema: SchemaDefinition,
}

impl TaskDefinition {
    pub fn new(
        name: impl Into<String>,
        input_schema: SchemaDefinition,
        output_schema: SchemaDefinition,
    ) -> Self {
        Self {
            name: name.into(),
            input_schema,
            output_schema,
        }
    }
}

/// Object schema: `properties` + `required`
///
/// Keys other than these are kept in `extra` so a schema passed through
/// into a workflow's input contract is not silently truncated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,

    #[serde(default)]
    pub properties: IndexMap<String, PropertySchema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A single declared field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PropertySchema {
    pub fn of_type(field_type: impl Into<String>) -> Self {
        Self {
            field_type: Some(field_type.into()),
            extra: BTreeMap::new(),
        }
    }
}

impl SchemaDefinition {
    /// Empty `type: object` schema
    pub fn object() -> Self {
        Self {
            schema_type: Some("object".to_string()),
            ..Default::default()
        }
    }

    /// Add an optional property (builder style)
    pub fn property(mut self, name: impl Into<String>, field_type: impl Into<String>) -> Self {
        self.properties
            .insert(name.into(), PropertySchema::of_type(field_type));
        self
    }

    /// Add a property and mark it required (builder style)
    pub fn required_property(
        mut self,
        name: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.properties
            .insert(name.clone(), PropertySchema::of_type(field_type));
        if !self.required.contains(&name) {
            self.required.push(name);
        }
        self
    }

    /// Declared type of a property, if the property exists
    pub fn type_of(&self, field: &str) -> Option<Option<&str>> {
        self.properties
            .get(field)
            .map(|p| p.field_type.as_deref())
    }

    /// Required field names in declaration order, duplicates removed
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        let mut seen = Vec::with_capacity(self.required.len());
        self.required.iter().filter_map(move |name| {
            if seen.contains(name) {
                None
            } else {
                seen.push(name.clone());
                Some(name.as_str())
            }
        })
    }
}
