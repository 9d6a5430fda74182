//! OData query building
//!
//! Fluent, schema-validated composition of `$filter`, `$select`, `$top`,
//! `$skip` and `$orderby` against a registered entity set.

pub mod builder;
pub mod filter;
pub mod orderby;

pub use builder::Query;
pub use filter::{CompareOp, Filter};
pub use orderby::{OrderBy, SortOrder};
