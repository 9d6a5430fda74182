//! Typed OData v2 client and entity mapper
//!
//! This crate maps remote OData v2 entity collections (notably SAP Cloud for
//! Customer entity sets) onto typed, chainable query objects instead of
//! hand-built query strings and raw HTTP calls. A service's published EDMX
//! metadata is parsed into entity-type schemas, queries are composed through
//! a fluent builder with a compositional filter tree, fetched rows become
//! change-tracked entity proxies, and local mutations flow back to the
//! server as a single multipart `$batch` request with per-entity outcome
//! reporting.
//!
//! ```no_run
//! use odata_orm::{Filter, MetadataRegistry, Session, SessionConfig, Value, update_many};
//!
//! # fn main() -> odata_orm::Result<()> {
//! let mut session = Session::new(SessionConfig::new(
//!     "my000000.crm.ondemand.com",
//!     "USER",
//!     "secret",
//! ))?;
//!
//! let mut registry = MetadataRegistry::new();
//! registry.register_service(&mut session, "c4c", "/sap/c4c/odata/v1/c4codataapi")?;
//!
//! let query = registry
//!     .get_object("CorporateAccountCollection", "c4c")?
//!     .filter(Filter::eq("RoleCode", "CRM000").and(Filter::eq("ABCClassification", "A")))
//!     .top(100)?;
//!
//! let mut accounts = query.fetch(&mut session)?;
//! for account in &mut accounts {
//!     account.set("LifeCycleStatusCode", Value::from("2"))?;
//! }
//!
//! let outcome = update_many(&mut session, &mut accounts)?;
//! assert!(outcome.failed().next().is_none());
//!
//! session.close();
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod metadata;
pub mod query;
pub mod session;
pub mod transport;
pub mod value;

#[cfg(test)]
pub(crate) mod testutil;

pub use batch::{BatchOutcome, BatchResult, update_many};
pub use entity::EntityProxy;
pub use error::{Error, Result};
pub use metadata::{
    EntityTypeSchema, MetadataRegistry, PropertySchema, PropertyType, ServiceDescriptor,
};
pub use query::{CompareOp, Filter, OrderBy, Query, SortOrder};
pub use session::{Session, SessionConfig};
pub use transport::{HttpRequest, HttpResponse, HttpTransport};
pub use value::Value;
