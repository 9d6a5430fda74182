//! EDMX metadata document parsing
//!
//! Consumes the `$metadata` XML a service publishes and produces one
//! [`EntityTypeSchema`] per declared entity set. Namespace prefixes vary
//! between services (the EDM namespace alone has several revisions), so
//! elements are matched on local name; only the SAP annotation attributes
//! are matched fully qualified.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::metadata::models::{
    EntitySetCapabilities, EntityTypeSchema, PropertySchema, PropertyType, ServiceDescriptor,
};

const SAP_NS: &str = "http://www.sap.com/Protocols/SAPData";

struct ParsedType {
    properties: Vec<PropertySchema>,
    keys: Vec<String>,
    navigation: Vec<String>,
}

/// Parse a metadata document into schemas for every entity set it declares.
pub fn parse_service_metadata(
    xml: &str,
    service: &Arc<ServiceDescriptor>,
) -> Result<Vec<Arc<EntityTypeSchema>>> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| Error::MetadataParse(format!("invalid metadata document: {e}")))?;

    let mut types: HashMap<String, ParsedType> = HashMap::new();
    for node in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "EntityType")
    {
        let name = node
            .attribute("Name")
            .ok_or_else(|| Error::MetadataParse("EntityType without a Name".to_string()))?;
        types.insert(name.to_string(), parse_entity_type(&node)?);
    }

    let container = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "EntityContainer")
        .ok_or_else(|| {
            Error::MetadataParse("metadata document has no EntityContainer".to_string())
        })?;

    let mut schemas = Vec::new();
    for set in container
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "EntitySet")
    {
        let set_name = set
            .attribute("Name")
            .ok_or_else(|| Error::MetadataParse("EntitySet without a Name".to_string()))?;
        let type_ref = set.attribute("EntityType").ok_or_else(|| {
            Error::MetadataParse(format!("entity set {set_name} has no EntityType"))
        })?;
        // EntitySet references are namespace-qualified, EntityType
        // declarations are not.
        let bare_type = type_ref.rsplit('.').next().unwrap_or(type_ref);
        let parsed = types.get(bare_type).ok_or_else(|| {
            Error::MetadataParse(format!(
                "entity set {set_name} references undeclared type {type_ref}"
            ))
        })?;

        if parsed.keys.is_empty() {
            return Err(Error::MetadataParse(format!(
                "entity set {set_name} declares no key properties"
            )));
        }
        for key in &parsed.keys {
            if !parsed.properties.iter().any(|p| p.name == *key) {
                return Err(Error::MetadataParse(format!(
                    "entity set {set_name} key {key:?} is not a declared property"
                )));
            }
        }

        schemas.push(Arc::new(EntityTypeSchema {
            entity_set: set_name.to_string(),
            entity_type: type_ref.to_string(),
            properties: parsed.properties.clone(),
            keys: parsed.keys.clone(),
            navigation: parsed.navigation.clone(),
            capabilities: EntitySetCapabilities {
                creatable: sap_flag(&set, "creatable"),
                updatable: sap_flag(&set, "updatable"),
                deletable: sap_flag(&set, "deletable"),
            },
            service: Arc::clone(service),
        }));
    }

    log::debug!(
        "parsed {} entity sets from metadata of service {}",
        schemas.len(),
        service.name
    );
    Ok(schemas)
}

fn parse_entity_type(node: &roxmltree::Node) -> Result<ParsedType> {
    let mut properties = Vec::new();
    let mut keys = Vec::new();
    let mut navigation = Vec::new();

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "Key" => {
                for key_ref in child
                    .children()
                    .filter(|n| n.is_element() && n.tag_name().name() == "PropertyRef")
                {
                    let name = key_ref.attribute("Name").ok_or_else(|| {
                        Error::MetadataParse("PropertyRef without a Name".to_string())
                    })?;
                    keys.push(name.to_string());
                }
            }
            "Property" => {
                let name = child.attribute("Name").ok_or_else(|| {
                    Error::MetadataParse("Property without a Name".to_string())
                })?;
                properties.push(PropertySchema {
                    name: name.to_string(),
                    property_type: PropertyType::from_edm(
                        child.attribute("Type").unwrap_or("Edm.String"),
                    ),
                    nullable: child
                        .attribute("Nullable")
                        .map(|v| v == "true")
                        .unwrap_or(true),
                    max_length: child
                        .attribute("MaxLength")
                        .and_then(|v| v.parse().ok()),
                    is_key: false,
                });
            }
            "NavigationProperty" => {
                if let Some(name) = child.attribute("Name") {
                    navigation.push(name.to_string());
                }
            }
            _ => {}
        }
    }

    for property in &mut properties {
        property.is_key = keys.contains(&property.name);
    }

    Ok(ParsedType {
        properties,
        keys,
        navigation,
    })
}

fn sap_flag(node: &roxmltree::Node, name: &str) -> bool {
    node.attribute((SAP_NS, name))
        .map(|v| v != "false")
        .unwrap_or(true)
}
