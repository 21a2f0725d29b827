//! Schema validation capability

use std::fmt::Debug;

#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::domain::table::Table;

/// Structural problem found while validating a payload
#[derive(Debug, Clone, PartialEq, Error)]
#[error("schema '{schema}' rejected payload: {message}")]
pub struct SchemaViolation {
    pub schema: String,
    pub message: String,
    pub missing: Vec<String>,
}

impl SchemaViolation {
    pub fn new(schema: impl Into<String>, message: impl Into<String>, missing: Vec<String>) -> Self {
        Self {
            schema: schema.into(),
            message: message.into(),
            missing,
        }
    }
}

/// Validates payloads against a named schema
///
/// `lazy` validation reports every structural problem at once and may coerce;
/// strict validation fails at the first problem.
#[cfg_attr(test, automock)]
pub trait SchemaValidator: Send + Sync + Debug {
    fn validate(&self, schema_name: &str, table: Table, lazy: bool)
    -> Result<Table, SchemaViolation>;
}
