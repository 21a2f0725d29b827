//! Validator checking that named schemas carry their required columns

use std::collections::HashMap;

use crate::domain::validator::{SchemaValidator, SchemaViolation};
use crate::domain::Table;

/// Per-schema required column lists
///
/// Unknown schema names pass through untouched. Lazy validation reports
/// every missing column; strict validation stops at the first.
#[derive(Debug, Clone, Default)]
pub struct RequiredColumnsValidator {
    schemas: HashMap<String, Vec<String>>,
}

impl RequiredColumnsValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema<I, S>(mut self, schema_name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemas.insert(
            schema_name.into(),
            columns.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn required_columns(&self, schema_name: &str) -> Option<&[String]> {
        self.schemas.get(schema_name).map(Vec::as_slice)
    }
}

impl SchemaValidator for RequiredColumnsValidator {
    fn validate(
        &self,
        schema_name: &str,
        table: Table,
        lazy: bool,
    ) -> Result<Table, SchemaViolation> {
        let Some(required) = self.schemas.get(schema_name) else {
            return Ok(table);
        };

        let mut missing = required.iter().filter(|column| !table.has_column(column));
        let missing: Vec<String> = if lazy {
            missing.cloned().collect()
        } else {
            missing.next().cloned().into_iter().collect()
        };

        if missing.is_empty() {
            return Ok(table);
        }

        Err(SchemaViolation::new(
            schema_name,
            format!("missing required columns: {}", missing.join(", ")),
            missing,
        ))
    }
}
