//! Registry of services and their entity-type schemas

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::metadata::models::{DEFAULT_MAX_PAGE_SIZE, EntityTypeSchema, ServiceDescriptor};
use crate::metadata::parser;
use crate::query::Query;
use crate::session::Session;

/// Owns the entity-type schemas of every registered service.
///
/// Schemas are handed out behind `Arc`, so re-registering a service
/// replaces what the registry serves without touching schemas that live
/// proxies or queries still reference.
#[derive(Default)]
pub struct MetadataRegistry {
    services: HashMap<String, Arc<ServiceDescriptor>>,
    schemas: HashMap<(String, String), Arc<EntityTypeSchema>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under `name`, fetching and parsing its metadata
    /// document through the session. Registering the same name again
    /// re-parses and replaces the prior descriptors.
    pub fn register_service(
        &mut self,
        session: &mut Session,
        name: &str,
        endpoint: &str,
    ) -> Result<()> {
        let endpoint = endpoint.trim_end_matches('/');
        let response = session.get(&format!("{endpoint}/$metadata"))?;
        if !response.is_success() {
            return Err(Error::Transport(format!(
                "metadata fetch for service {name} failed with HTTP {}",
                response.status
            )));
        }

        let descriptor = Arc::new(ServiceDescriptor {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        });
        let schemas = parser::parse_service_metadata(&response.body, &descriptor)?;

        self.schemas.retain(|(service, _), _| service != name);
        for schema in schemas {
            self.schemas
                .insert((name.to_string(), schema.entity_set.clone()), schema);
        }
        self.services.insert(name.to_string(), descriptor);

        log::info!(
            "registered service {name} at {endpoint} with {} entity sets",
            self.schemas
                .keys()
                .filter(|(service, _)| service == name)
                .count()
        );
        Ok(())
    }

    /// Return a query object bound to the schema of one entity set.
    pub fn get_object(&self, entity_set: &str, service: &str) -> Result<Query> {
        let schema = self.get_schema(entity_set, service)?;
        Ok(Query::new(Arc::clone(schema)))
    }

    /// Look up the stored schema for an entity set.
    pub fn get_schema(&self, entity_set: &str, service: &str) -> Result<&Arc<EntityTypeSchema>> {
        self.schemas
            .get(&(service.to_string(), entity_set.to_string()))
            .ok_or_else(|| Error::UnknownEntity {
                service: service.to_string(),
                entity_set: entity_set.to_string(),
            })
    }

    /// Names of all entity sets registered for a service. Empty when the
    /// service is unknown.
    pub fn list_entities(&self, service: &str) -> Vec<&str> {
        let mut entities: Vec<&str> = self
            .schemas
            .keys()
            .filter(|(svc, _)| svc == service)
            .map(|(_, set)| set.as_str())
            .collect();
        entities.sort_unstable();
        entities
    }
}
