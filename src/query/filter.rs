//! Compositional filter predicates
//!
//! A [`Filter`] is an immutable expression tree of comparisons and logical
//! combinators. The tree is schema-agnostic while it is being built;
//! operand names and literal types are checked when the tree is rendered
//! against the entity schema the query is bound to.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metadata::EntityTypeSchema;
use crate::value::Value;

/// Comparison operators of the OData filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    fn token(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Lt => "lt",
            CompareOp::Ge => "ge",
            CompareOp::Le => "le",
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// A filter expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// `<property> <op> <literal>`
    Compare {
        property: String,
        op: CompareOp,
        value: Value,
    },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn compare(
        property: impl Into<String>,
        op: CompareOp,
        value: impl Into<Value>,
    ) -> Self {
        Filter::Compare {
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, CompareOp::Eq, value)
    }

    pub fn ne(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, CompareOp::Ne, value)
    }

    pub fn gt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, CompareOp::Gt, value)
    }

    pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, CompareOp::Lt, value)
    }

    pub fn ge(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, CompareOp::Ge, value)
    }

    pub fn le(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, CompareOp::Le, value)
    }

    /// Combine two filters with `and`.
    pub fn and(self, other: Filter) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    /// Combine two filters with `or`.
    pub fn or(self, other: Filter) -> Self {
        Filter::Or(Box::new(self), Box::new(other))
    }

    /// Negate a filter.
    pub fn not(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Render the tree as an OData filter string, validating every operand
    /// name and literal type against the schema.
    pub fn render(&self, schema: &EntityTypeSchema) -> Result<String> {
        match self {
            Filter::Compare {
                property,
                op,
                value,
            } => {
                let prop = schema.property(property).ok_or_else(|| {
                    Error::FilterSyntax(format!(
                        "unknown property {property:?} on {}",
                        schema.entity_set
                    ))
                })?;
                if !prop.property_type.accepts(value) {
                    return Err(Error::FilterSyntax(format!(
                        "literal {value} is not comparable to {:?} property {property:?}",
                        prop.property_type
                    )));
                }
                Ok(format!("{} {} {}", property, op, value.to_odata_literal()))
            }
            Filter::And(left, right) => Ok(format!(
                "{} and {}",
                left.render_child(schema, "and")?,
                right.render_child(schema, "and")?
            )),
            Filter::Or(left, right) => Ok(format!(
                "{} or {}",
                left.render_child(schema, "or")?,
                right.render_child(schema, "or")?
            )),
            Filter::Not(inner) => Ok(format!("not ({})", inner.render(schema)?)),
        }
    }

    /// `and` binds tighter than `or`, so a logical child is parenthesized
    /// when its operator differs from its parent's.
    fn render_child(&self, schema: &EntityTypeSchema, parent: &'static str) -> Result<String> {
        let rendered = self.render(schema)?;
        match self.logical_operator() {
            Some(op) if op != parent => Ok(format!("({rendered})")),
            _ => Ok(rendered),
        }
    }

    fn logical_operator(&self) -> Option<&'static str> {
        match self {
            Filter::And(..) => Some("and"),
            Filter::Or(..) => Some("or"),
            // `not` already parenthesizes its operand
            Filter::Compare { .. } | Filter::Not(_) => None,
        }
    }
}
