//! Fluent query specification
//!
//! A [`Query`] accumulates `$filter`, `$select`, `$top`, `$skip` and
//! `$orderby` against one entity set. Validating calls consume and return
//! the query so chains read naturally with `?` between the links;
//! serialization is pure and repeatable.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::metadata::EntityTypeSchema;
use crate::query::filter::Filter;
use crate::query::orderby::{OrderBy, SortOrder};

/// A query against one entity set, obtained from
/// [`crate::MetadataRegistry::get_object`].
#[derive(Debug, Clone)]
pub struct Query {
    schema: Arc<EntityTypeSchema>,
    filter: Option<Filter>,
    select: Vec<String>,
    top: Option<u32>,
    skip: Option<u32>,
    order_by: Vec<OrderBy>,
}

impl Query {
    pub(crate) fn new(schema: Arc<EntityTypeSchema>) -> Self {
        Self {
            schema,
            filter: None,
            select: Vec::new(),
            top: None,
            skip: None,
            order_by: Vec::new(),
        }
    }

    /// The schema this query is bound to.
    pub fn schema(&self) -> &EntityTypeSchema {
        &self.schema
    }

    pub(crate) fn schema_arc(&self) -> &Arc<EntityTypeSchema> {
        &self.schema
    }

    /// Add a filter expression. Successive calls are combined with `and`.
    /// Operand names are validated when the query string is built.
    pub fn filter(mut self, expr: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Restrict the properties returned by the service. Every name must be
    /// a declared property of the entity set.
    pub fn select<I, S>(mut self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.schema.has_property(&name) {
                return Err(Error::Validation(format!(
                    "cannot select unknown property {name:?} on {}",
                    self.schema.entity_set
                )));
            }
            if !self.select.contains(&name) {
                self.select.push(name);
            }
        }
        Ok(self)
    }

    /// Limit the number of records returned. The count must be within
    /// `[1, max_page_size]` of the service.
    pub fn top(mut self, count: u32) -> Result<Self> {
        let max = self.schema.service.max_page_size;
        if count == 0 || count > max {
            return Err(Error::Validation(format!(
                "$top must be between 1 and {max}, got {count}"
            )));
        }
        self.top = Some(count);
        Ok(self)
    }

    /// Skip the first `count` records.
    pub fn skip(mut self, count: u32) -> Self {
        self.skip = Some(count);
        self
    }

    /// Append an ordering clause for a declared property.
    pub fn order_by(mut self, property: &str, order: SortOrder) -> Result<Self> {
        if !self.schema.has_property(property) {
            return Err(Error::Validation(format!(
                "cannot order by unknown property {property:?} on {}",
                self.schema.entity_set
            )));
        }
        self.order_by.push(OrderBy::new(property, order));
        Ok(self)
    }

    /// The accumulated query parameters, in canonical order, unset ones
    /// omitted. Values are not percent-encoded here; the fetch engine
    /// encodes them when composing the URL.
    pub(crate) fn query_params(&self) -> Result<Vec<(&'static str, String)>> {
        let mut params = Vec::new();
        if let Some(filter) = &self.filter {
            params.push(("$filter", filter.render(&self.schema)?));
        }
        if !self.select.is_empty() {
            params.push(("$select", self.select.join(",")));
        }
        if let Some(top) = self.top {
            params.push(("$top", top.to_string()));
        }
        if let Some(skip) = self.skip {
            params.push(("$skip", skip.to_string()));
        }
        if !self.order_by.is_empty() {
            let rendered: Vec<String> = self.order_by.iter().map(OrderBy::render).collect();
            params.push(("$orderby", rendered.join(",")));
        }
        Ok(params)
    }

    /// Serialize the accumulated state into the OData query string.
    /// Side-effect free and repeatable.
    pub fn build_query_string(&self) -> Result<String> {
        let params = self.query_params()?;
        let rendered: Vec<String> = params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        Ok(rendered.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::account_schema;

    fn query() -> Query {
        Query::new(account_schema())
    }

    #[test]
    fn test_filter_and_top_scenario() {
        let q = query()
            .filter(Filter::eq("RoleCode", "CRM000").and(Filter::eq("ABCClassification", "A")))
            .top(100)
            .unwrap();
        assert_eq!(
            q.build_query_string().unwrap(),
            "$filter=RoleCode eq 'CRM000' and ABCClassification eq 'A'&$top=100"
        );
    }

    #[test]
    fn test_empty_query_builds_empty_string() {
        assert_eq!(query().build_query_string().unwrap(), "");
    }

    #[test]
    fn test_all_parameters_in_canonical_order() {
        let q = query()
            .filter(Filter::eq("RoleCode", "CRM000"))
            .select(["ObjectID", "Name"])
            .unwrap()
            .top(50)
            .unwrap()
            .skip(100)
            .order_by("Name", SortOrder::Descending)
            .unwrap();
        assert_eq!(
            q.build_query_string().unwrap(),
            "$filter=RoleCode eq 'CRM000'&$select=ObjectID,Name&$top=50&$skip=100&$orderby=Name desc"
        );
    }

    #[test]
    fn test_build_is_repeatable() {
        let q = query().filter(Filter::eq("RoleCode", "CRM000"));
        assert_eq!(
            q.build_query_string().unwrap(),
            q.build_query_string().unwrap()
        );
    }

    #[test]
    fn test_successive_filters_are_anded() {
        let q = query()
            .filter(Filter::eq("RoleCode", "CRM000"))
            .filter(Filter::eq("ABCClassification", "A"));
        assert_eq!(
            q.build_query_string().unwrap(),
            "$filter=RoleCode eq 'CRM000' and ABCClassification eq 'A'"
        );
    }

    #[test]
    fn test_select_rejects_unknown_property() {
        let err = query().select(["ObjectID", "Bogus"]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_top_range() {
        assert!(matches!(query().top(0), Err(Error::Validation(_))));
        assert!(matches!(query().top(1001), Err(Error::Validation(_))));
        assert!(query().top(1).is_ok());
        assert!(query().top(1000).is_ok());
    }

    #[test]
    fn test_order_by_rejects_unknown_property() {
        let err = query()
            .order_by("Bogus", SortOrder::Ascending)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_filter_validation_deferred_to_build() {
        // Building the tree is schema-agnostic; the error surfaces on build
        let q = query().filter(Filter::eq("Bogus", "x"));
        assert!(matches!(
            q.build_query_string(),
            Err(Error::FilterSyntax(_))
        ));
    }
}
