//! Configuration validation.

use std::collections::HashSet;

use super::Config;
use crate::core::identifier::validate_identifier;
use crate::error::{BackendError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.backend.trim().is_empty() {
        return Err(BackendError::Config("backend is required".into()));
    }

    if config.trace.product.is_empty() {
        return Err(BackendError::Config("trace.product must not be empty".into()));
    }
    if config.trace.product.contains("*/") {
        return Err(BackendError::Config(
            "trace.product must not contain '*/'".into(),
        ));
    }

    if config.pool.max_open == 0 {
        return Err(BackendError::Config("pool.max_open must be at least 1".into()));
    }
    if config.pool.max_idle > config.pool.max_open {
        return Err(BackendError::Config(format!(
            "pool.max_idle ({}) must not exceed pool.max_open ({})",
            config.pool.max_idle, config.pool.max_open
        )));
    }

    if let Some(mysql) = &config.mysql {
        if mysql.host.is_empty() {
            return Err(BackendError::Config("mysql.host is required".into()));
        }
        if mysql.database.is_empty() {
            return Err(BackendError::Config("mysql.database is required".into()));
        }
        if mysql.user.is_empty() {
            return Err(BackendError::Config("mysql.user is required".into()));
        }
    }

    let mut table_names = HashSet::new();
    for table in &config.tables {
        validate_identifier(&table.name)?;
        if !table_names.insert(table.name.as_str()) {
            return Err(BackendError::Config(format!(
                "table '{}' is declared more than once",
                table.name
            )));
        }
        if table.fields.is_empty() {
            return Err(BackendError::Config(format!(
                "table '{}' has no fields",
                table.name
            )));
        }

        let mut columns = HashSet::new();
        for field in &table.fields {
            let column = field.column_name();
            validate_identifier(column)?;
            if !columns.insert(column) {
                return Err(BackendError::Config(format!(
                    "table '{}' declares column '{}' more than once",
                    table.name, column
                )));
            }
        }

        for index in &table.indexes {
            validate_identifier(&index.name)?;
            if index.columns.is_empty() {
                return Err(BackendError::Config(format!(
                    "index '{}' on table '{}' has no columns",
                    index.name, table.name
                )));
            }
            if let Some(missing) = index.columns.iter().find(|c| !columns.contains(c.as_str())) {
                return Err(BackendError::Config(format!(
                    "index '{}' references unknown column '{}' on table '{}'",
                    index.name, missing, table.name
                )));
            }
        }
    }

    Ok(())
}
