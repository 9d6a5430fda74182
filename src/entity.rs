//! Change-tracked entity rows
//!
//! An [`EntityProxy`] is one row of an entity set, bound to its schema. It
//! keeps the snapshot the server sent next to the current values; `set`
//! diffs against the snapshot, so only genuinely changed properties are
//! marked dirty and shipped by the batch engine. Key properties are
//! immutable for the proxy's whole lifetime.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::metadata::{EntityTypeSchema, PropertyType, ServiceDescriptor};
use crate::value::{Value, parse_odata_date};

const NULL: Value = Value::Null;

/// A change-tracked row of one entity set.
#[derive(Debug)]
pub struct EntityProxy {
    schema: Arc<EntityTypeSchema>,
    original: HashMap<String, Value>,
    current: HashMap<String, Value>,
    dirty: BTreeSet<String>,
    etag: Option<String>,
}

impl EntityProxy {
    /// Build a proxy from one response record. Only declared properties are
    /// taken over; envelope bookkeeping like `__metadata` and deferred
    /// navigation links are skipped. The dirty set starts empty.
    pub(crate) fn from_record(
        schema: Arc<EntityTypeSchema>,
        record: &serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let etag = record
            .get("__metadata")
            .and_then(|m| m.get("etag"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let mut original = HashMap::new();
        for property in &schema.properties {
            if let Some(raw) = record.get(&property.name) {
                original.insert(
                    property.name.clone(),
                    value_from_wire(&property.property_type, raw),
                );
            }
        }

        Self {
            current: original.clone(),
            original,
            dirty: BTreeSet::new(),
            etag,
            schema,
        }
    }

    /// The schema this proxy is bound to.
    pub fn schema(&self) -> &EntityTypeSchema {
        &self.schema
    }

    /// The service this proxy's entity set belongs to.
    pub fn service(&self) -> &ServiceDescriptor {
        &self.schema.service
    }

    /// The ETag captured at fetch time, if the server sent one.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Current value of a property. Properties that were not part of the
    /// fetched selection read as null.
    pub fn get(&self, property: &str) -> Result<&Value> {
        if !self.schema.has_property(property) {
            return Err(Error::Validation(format!(
                "unknown property {property:?} on {}",
                self.schema.entity_set
            )));
        }
        Ok(self.current.get(property).unwrap_or(&NULL))
    }

    /// Assign a property, validating the name, key immutability,
    /// nullability and type compatibility. Assigning a value equal to the
    /// original snapshot clears the dirty mark instead of setting it.
    pub fn set(&mut self, property: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let prop = self.schema.property(property).ok_or_else(|| {
            Error::Validation(format!(
                "unknown property {property:?} on {}",
                self.schema.entity_set
            ))
        })?;
        if prop.is_key {
            return Err(Error::Validation(format!(
                "key property {property:?} of {} is immutable",
                self.schema.entity_set
            )));
        }
        if value.is_null() && !prop.nullable {
            return Err(Error::Validation(format!(
                "property {property:?} is not nullable"
            )));
        }
        if !prop.property_type.accepts(&value) {
            return Err(Error::Validation(format!(
                "value {value} is not compatible with {:?} property {property:?}",
                prop.property_type
            )));
        }

        let matches_original = match self.original.get(property) {
            Some(original) => *original == value,
            None => value.is_null(),
        };
        if matches_original {
            self.dirty.remove(property);
        } else {
            self.dirty.insert(property.to_string());
        }
        self.current.insert(property.to_string(), value);
        Ok(())
    }

    /// Whether any property differs from the fetched snapshot.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Names of the properties currently marked dirty.
    pub fn dirty_properties(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Key property name/value pairs, in key declaration order.
    pub fn key_values(&self) -> Vec<(&str, &Value)> {
        self.schema
            .keys
            .iter()
            .map(|k| (k.as_str(), self.current.get(k).unwrap_or(&NULL)))
            .collect()
    }

    /// JSON object carrying exactly the dirty properties.
    pub(crate) fn dirty_payload(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for name in &self.dirty {
            map.insert(
                name.clone(),
                self.current.get(name).unwrap_or(&NULL).to_json(),
            );
        }
        serde_json::Value::Object(map)
    }

    /// Key predicate for the entity URL: `('id')` for a single key,
    /// `(K1='a',K2=2)` for compound keys.
    pub(crate) fn key_predicate(&self) -> Result<String> {
        let mut parts = Vec::with_capacity(self.schema.keys.len());
        for key in &self.schema.keys {
            let value = self.current.get(key).filter(|v| !v.is_null()).ok_or_else(|| {
                Error::Validation(format!(
                    "entity of {} has no value for key property {key:?}",
                    self.schema.entity_set
                ))
            })?;
            parts.push((key, value));
        }
        if parts.len() == 1 {
            Ok(format!("({})", parts[0].1.to_odata_literal()))
        } else {
            let rendered: Vec<String> = parts
                .iter()
                .map(|(k, v)| format!("{}={}", k, v.to_odata_literal()))
                .collect();
            Ok(format!("({})", rendered.join(",")))
        }
    }

    /// Key-addressed resource path below the host, e.g.
    /// `/sap/c4c/odata/v1/c4codataapi/CorporateAccountCollection('X')`.
    pub(crate) fn resource_path(&self) -> Result<String> {
        Ok(format!(
            "{}{}",
            self.schema.resource_path(),
            self.key_predicate()?
        ))
    }

    /// Fold the dirty values into the original snapshot after a successful
    /// batch correlation, adopting the new ETag when the server sent one.
    pub(crate) fn commit(&mut self, new_etag: Option<String>) {
        for name in std::mem::take(&mut self.dirty) {
            if let Some(value) = self.current.get(&name) {
                self.original.insert(name, value.clone());
            }
        }
        if new_etag.is_some() {
            self.etag = new_etag;
        }
    }
}

/// Convert one wire value using the declared property type. OData v2
/// carries Int64/Decimal as JSON strings and datetimes as `/Date(ms)/`.
fn value_from_wire(property_type: &PropertyType, raw: &serde_json::Value) -> Value {
    if raw.is_null() {
        return Value::Null;
    }
    match property_type {
        PropertyType::String => match raw.as_str() {
            Some(s) => Value::String(s.to_string()),
            None => Value::from_json(raw),
        },
        PropertyType::Int32 | PropertyType::Int64 => match raw {
            serde_json::Value::String(s) => {
                s.parse().map(Value::Int).unwrap_or_else(|_| Value::from_json(raw))
            }
            _ => Value::from_json(raw),
        },
        PropertyType::Decimal | PropertyType::Double => match raw {
            serde_json::Value::String(s) => s
                .parse()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::from_json(raw)),
            _ => Value::from_json(raw),
        },
        PropertyType::DateTime | PropertyType::DateTimeOffset => raw
            .as_str()
            .and_then(parse_odata_date)
            .map(Value::DateTime)
            .unwrap_or_else(|| Value::from_json(raw)),
        PropertyType::Guid => raw
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(Value::Guid)
            .unwrap_or_else(|| Value::from_json(raw)),
        PropertyType::Boolean | PropertyType::Other(_) => Value::from_json(raw),
    }
}
