//! Outbound provider configuration and the property mappings attached to it.

use crate::object::ObjectKind;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Concrete kind of a property mapping.
///
/// A provider may carry mappings meant for other object kinds (or for other
/// provider types entirely); only those matching the object being synced are
/// evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    User,
    Group,
    Other(String),
}

impl MappingKind {
    pub fn applies_to(&self, kind: ObjectKind) -> bool {
        matches!(
            (self, kind),
            (MappingKind::User, ObjectKind::User) | (MappingKind::Group, ObjectKind::Group)
        )
    }
}

/// A user-authored transformation rule producing a fragment of the external document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMapping {
    /// Stable name; mappings are applied in name order.
    pub name: String,
    pub kind: MappingKind,
    /// Source handed to the [`MappingEvaluator`](crate::mapping::MappingEvaluator).
    pub expression: String,
}

impl PropertyMapping {
    pub fn new(name: impl Into<String>, kind: MappingKind, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            expression: expression.into(),
        }
    }

    pub fn user(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::new(name, MappingKind::User, expression)
    }

    pub fn group(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::new(name, MappingKind::Group, expression)
    }
}

/// The provider that owns the mappings and the link rows for one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mappings: Vec<PropertyMapping>,
    /// Domains the directory accepts addresses for. Empty means any domain.
    #[serde(default)]
    pub address_domains: Vec<String>,
}

impl Provider {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mappings: Vec::new(),
            address_domains: Vec::new(),
        }
    }

    pub fn with_mapping(mut self, mapping: PropertyMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    pub fn with_address_domain(mut self, domain: impl Into<String>) -> Self {
        self.address_domains.push(domain.into());
        self
    }

    /// Mappings applicable to `kind`, in name order.
    ///
    /// The sort is stable so mappings sharing a name keep their configured order.
    pub fn mappings_for(&self, kind: ObjectKind) -> Vec<&PropertyMapping> {
        let mut mappings: Vec<&PropertyMapping> = self
            .mappings
            .iter()
            .filter(|mapping| mapping.kind.applies_to(kind))
            .collect();
        mappings.sort_by(|a, b| a.name.cmp(&b.name));
        mappings
    }

    /// JSON view of the provider exposed to property mappings.
    pub fn to_context(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "address_domains": self.address_domains,
        })
    }
}
