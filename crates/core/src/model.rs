//! Structural models: architecture or code elements the text is traced to.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Architecture,
    Code,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Architecture => write!(f, "architecture"),
            Self::Code => write!(f, "code"),
        }
    }
}

/// A concrete model element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInstance {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: String,
    /// Ids of provided interfaces (components only).
    #[serde(default)]
    pub provided: Vec<String>,
    /// Ids of required interfaces (components only).
    #[serde(default)]
    pub required: Vec<String>,
}

impl ModelInstance {
    pub fn new(id: &str, name: &str, element_type: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            element_type: element_type.to_string(),
            provided: Vec::new(),
            required: Vec::new(),
        }
    }

    /// Lowercased name parts: `PaymentGateway` -> `["payment", "gateway"]`.
    pub fn name_parts(&self) -> Vec<String> {
        split_identifier(&self.name)
    }

    /// Lowercased type parts: `BasicComponent` -> `["basic", "component"]`.
    pub fn type_parts(&self) -> Vec<String> {
        split_identifier(&self.element_type)
    }
}

/// One structural model. Instances keep their ingestion order; every
/// derived ordering in the pipeline starts from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub kind: ModelKind,
    pub instances: Vec<ModelInstance>,
}

impl Model {
    pub fn new(id: &str, kind: ModelKind, instances: Vec<ModelInstance>) -> Self {
        Self {
            id: id.to_string(),
            kind,
            instances,
        }
    }

    pub fn instance(&self, id: &str) -> Option<&ModelInstance> {
        self.instances.iter().find(|i| i.id == id)
    }

    /// Declared type vocabulary, e.g. `{"BasicComponent", "Interface"}`.
    pub fn types(&self) -> BTreeSet<String> {
        self.instances
            .iter()
            .map(|i| i.element_type.clone())
            .collect()
    }

    /// Copy of this model with one element held back.
    pub fn without(&self, instance_id: &str) -> Model {
        Model {
            id: self.id.clone(),
            kind: self.kind,
            instances: self
                .instances
                .iter()
                .filter(|i| i.id != instance_id)
                .cloned()
                .collect(),
        }
    }
}

/// Split an identifier into lowercased words on separators, camel-case
/// humps and acronym boundaries (`HTTPServer` -> `["http", "server"]`).
pub fn split_identifier(identifier: &str) -> Vec<String> {
    let chars: Vec<char> = identifier.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                parts.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
