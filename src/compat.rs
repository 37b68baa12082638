//! Schema compatibility checking
//!
//! Two checks live here:
//!
//! - [`is_schema_compatible`] - strict same-name, same-type contract check,
//!   used when a whole output object is piped verbatim into another input.
//! - [`analyze_task_compatibility`] - field-by-field matching that decides
//!   which producer output satisfies each consumer requirement.
//!
//! ## Matching priority
//!
//! For every field the consumer requires, in order:
//!
//! 1. identical name and identical type
//! 2. a semantic name affinity from the [`AffinityTable`] (types must match)
//! 3. any still-unassigned producer field of the same type, in declaration order
//!
//! Each tier runs over all required fields before the next tier starts, so a
//! looser rule never steals a field that an exact match needed.
//!
//! A required input field with no declared type (absent from `properties`,
//! or present without `type`) accepts an output field of any type. Both
//! checks apply this rule.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::schema::{SchemaDefinition, TaskDefinition};

/// One producer field wired into one consumer field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldMapping {
    pub from: String,
    pub to: String,
}

impl FieldMapping {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityResult {
    pub compatible: bool,
    pub field_mappings: Vec<FieldMapping>,
    pub missing_fields: Vec<String>,
}

// ============================================================================
// SEMANTIC NAME AFFINITIES
// ============================================================================

/// A producer-name pattern that may satisfy a consumer-name pattern
#[derive(Debug, Clone)]
pub struct NameAffinity {
    pub label: String,
    pub source: Regex,
    pub target: Regex,
}

impl NameAffinity {
    pub fn new(label: impl Into<String>, source: Regex, target: Regex) -> Self {
        Self {
            label: label.into(),
            source,
            target,
        }
    }

    pub fn matches(&self, source_field: &str, target_field: &str) -> bool {
        self.source.is_match(source_field) && self.target.is_match(target_field)
    }
}

/// Ordered, extensible list of name affinities. Earlier entries win.
#[derive(Debug, Clone, Default)]
pub struct AffinityTable {
    entries: Vec<NameAffinity>,
}

static DEFAULT_AFFINITIES: Lazy<AffinityTable> = Lazy::new(|| {
    let rule = |label: &str, source: &str, target: &str| {
        NameAffinity::new(
            label,
            Regex::new(source).expect("built-in affinity pattern"),
            Regex::new(target).expect("built-in affinity pattern"),
        )
    };
    AffinityTable {
        entries: vec![
            rule(
                "identifier",
                r"^(?i:id|uuid|identifier|key)$",
                r"(?:Id|_id|ID|Uuid|_uuid)$",
            ),
            rule(
                "contact-address",
                r"(?i)(?:e-?mail|contact|address)",
                r"^(?i:to|recipients?|email|emailAddress|cc|bcc|address)$",
            ),
            rule(
                "link",
                r"(?i)(?:url|uri|link|href)$",
                r"(?i)(?:url|uri|link|href|location)$",
            ),
        ],
    }
});

impl AffinityTable {
    /// Empty table (disables tier 2)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in affinities: identifiers, contact addresses, links
    pub fn builtin() -> Self {
        DEFAULT_AFFINITIES.clone()
    }

    pub fn with(mut self, affinity: NameAffinity) -> Self {
        self.entries.push(affinity);
        self
    }

    pub fn entries(&self) -> &[NameAffinity] {
        &self.entries
    }

    pub fn matches(&self, source_field: &str, target_field: &str) -> bool {
        self.entries
            .iter()
            .any(|a| a.matches(source_field, target_field))
    }
}

// ============================================================================
// CHECKS
// ============================================================================

/// Strict check: every required input field exists in the output under the
/// same name with the same declared type.
pub fn is_schema_compatible(output_schema: &SchemaDefinition, input_schema: &SchemaDefinition) -> bool {
    input_schema.required_fields().all(|field| match output_schema.type_of(field) {
        Some(out_type) => types_agree(out_type, input_schema.type_of(field).flatten()),
        None => false,
    })
}

/// `wanted` is the consumer's declared type; `None` accepts anything
fn types_agree(produced: Option<&str>, wanted: Option<&str>) -> bool {
    wanted.map_or(true, |wanted| produced == Some(wanted))
}

/// Field-level compatibility using the built-in affinity table
pub fn analyze_task_compatibility(producer: &TaskDefinition, consumer: &TaskDefinition) -> CompatibilityResult {
    analyze_with_affinities(producer, consumer, &DEFAULT_AFFINITIES)
}

/// Field-level compatibility with a caller-supplied affinity table
pub fn analyze_with_affinities(
    producer: &TaskDefinition,
    consumer: &TaskDefinition,
    affinities: &AffinityTable,
) -> CompatibilityResult {
    let outputs = &producer.output_schema;
    let inputs = &consumer.input_schema;
    let required: Vec<&str> = inputs.required_fields().collect();

    let mut assigned_from: HashSet<&str> = HashSet::new();
    let mut chosen: Vec<Option<&str>> = vec![None; required.len()];

    let input_type = |field: &str| inputs.type_of(field).flatten();
    let output_type = |field: &str| outputs.type_of(field).flatten();

    // Tier 1: identical name, identical type
    for (slot, field) in chosen.iter_mut().zip(&required) {
        if let Some(out_type) = outputs.type_of(field) {
            if types_agree(out_type, input_type(*field)) {
                *slot = Some(*field);
                assigned_from.insert(*field);
            }
        }
    }

    // Tier 2: semantic affinity, types must match
    for (slot, field) in chosen.iter_mut().zip(&required) {
        if slot.is_some() {
            continue;
        }
        let candidate = outputs.properties.keys().map(String::as_str).find(|&from| {
            !assigned_from.contains(from)
                && types_agree(output_type(from), input_type(*field))
                && affinities.matches(from, field)
        });
        if let Some(from) = candidate {
            *slot = Some(from);
            assigned_from.insert(from);
        }
    }

    // Tier 3: first unassigned field of the same type
    for (slot, field) in chosen.iter_mut().zip(&required) {
        if slot.is_some() {
            continue;
        }
        let candidate = outputs
            .properties
            .keys()
            .map(String::as_str)
            .find(|&from| {
                !assigned_from.contains(from) && types_agree(output_type(from), input_type(*field))
            });
        if let Some(from) = candidate {
            *slot = Some(from);
            assigned_from.insert(from);
        }
    }

    let mut field_mappings = Vec::new();
    let mut missing_fields = Vec::new();
    for (slot, field) in chosen.into_iter().zip(required) {
        match slot {
            Some(from) => field_mappings.push(FieldMapping::new(from, field)),
            None => missing_fields.push(field.to_string()),
        }
    }

    CompatibilityResult {
        compatible: missing_fields.is_empty(),
        field_mappings,
        missing_fields,
    }
}
