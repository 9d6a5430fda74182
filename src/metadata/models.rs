//! Schema models for registered OData services

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Default upper bound accepted for `$top` when the service does not state
/// one.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 1000;

/// A registered OData service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Name the service was registered under. Can be anything; it maps the
    /// endpoint to a meaningful name.
    pub name: String,
    /// Base endpoint path on the host, e.g. "/sap/c4c/odata/v1/c4codataapi".
    pub endpoint: String,
    /// Upper bound accepted for `$top`.
    pub max_page_size: u32,
}

/// Semantic EDM property types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyType {
    String,
    Int32,
    Int64,
    Decimal,
    Double,
    Boolean,
    DateTime,
    DateTimeOffset,
    Guid,
    Other(String),
}

impl PropertyType {
    /// Map an EDM type name from the metadata document.
    pub fn from_edm(name: &str) -> Self {
        match name {
            "Edm.String" => PropertyType::String,
            "Edm.Int16" | "Edm.Int32" | "Edm.Byte" | "Edm.SByte" => PropertyType::Int32,
            "Edm.Int64" => PropertyType::Int64,
            "Edm.Decimal" => PropertyType::Decimal,
            "Edm.Double" | "Edm.Single" => PropertyType::Double,
            "Edm.Boolean" => PropertyType::Boolean,
            "Edm.DateTime" | "Edm.Time" => PropertyType::DateTime,
            "Edm.DateTimeOffset" => PropertyType::DateTimeOffset,
            "Edm.Guid" => PropertyType::Guid,
            other => PropertyType::Other(other.to_string()),
        }
    }

    /// Whether a literal of the given value is compatible with this
    /// property type. Null passes here; nullability is enforced separately.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (PropertyType::String, Value::String(_)) => true,
            (PropertyType::Int32 | PropertyType::Int64, Value::Int(_)) => true,
            (PropertyType::Decimal | PropertyType::Double, Value::Int(_) | Value::Float(_)) => true,
            (PropertyType::Boolean, Value::Bool(_)) => true,
            (
                PropertyType::DateTime | PropertyType::DateTimeOffset,
                Value::DateTime(_),
            ) => true,
            // C4C key fields are frequently declared Edm.Guid but carried
            // around as plain strings.
            (PropertyType::Guid, Value::Guid(_) | Value::String(_)) => true,
            (PropertyType::Other(_), _) => true,
            _ => false,
        }
    }
}

/// One declared property of an entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    pub name: String,
    pub property_type: PropertyType,
    pub nullable: bool,
    pub max_length: Option<u32>,
    /// Whether this property is part of the entity key.
    pub is_key: bool,
}

/// Entity-set capabilities from the SAP annotations on the EntitySet
/// declaration. All default to true when absent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntitySetCapabilities {
    pub creatable: bool,
    pub updatable: bool,
    pub deletable: bool,
}

impl Default for EntitySetCapabilities {
    fn default() -> Self {
        Self {
            creatable: true,
            updatable: true,
            deletable: true,
        }
    }
}

/// Schema of one entity set, built once from the metadata document and
/// read-only afterwards.
///
/// Key properties are guaranteed by the parser to be a non-empty subset of
/// the declared properties.
#[derive(Debug, Clone)]
pub struct EntityTypeSchema {
    /// Entity-set name, the addressable resource, e.g.
    /// "CorporateAccountCollection".
    pub entity_set: String,
    /// Qualified entity-type name from the EDMX, e.g.
    /// "c4codataapi.CorporateAccount".
    pub entity_type: String,
    /// Declared properties, in document order.
    pub properties: Vec<PropertySchema>,
    /// Key property names, in declaration order.
    pub keys: Vec<String>,
    /// Navigation property names, if any.
    pub navigation: Vec<String>,
    pub capabilities: EntitySetCapabilities,
    /// The service this entity set belongs to.
    pub service: Arc<ServiceDescriptor>,
}

impl EntityTypeSchema {
    /// Look up a declared property by name.
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.keys.iter().any(|k| k == name)
    }

    /// Resource path of the entity set below the host, without query
    /// parameters.
    pub fn resource_path(&self) -> String {
        format!("{}/{}", self.service.endpoint, self.entity_set)
    }
}
