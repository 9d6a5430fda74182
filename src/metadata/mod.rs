//! Service metadata: models, EDMX parsing and the registry
//!
//! A service's published metadata document is parsed once per
//! `register_service` call into read-only entity-type schemas, which every
//! query, proxy and batch item references from then on.

pub mod models;
pub mod parser;
pub mod registry;

pub use models::{
    EntitySetCapabilities, EntityTypeSchema, PropertySchema, PropertyType, ServiceDescriptor,
};
pub use parser::parse_service_metadata;
pub use registry::MetadataRegistry;
