//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use crate::core::schema::TableSpec;
use crate::core::traits::Backend;
use crate::error::Result;
use crate::trace::AttributionRules;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Look up a declared table by name.
    pub fn table(&self, name: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|t| t.name == name)
    }
}

impl TableConfig {
    /// Build the declared table through `backend`'s type mapping.
    pub fn to_table_spec(&self, backend: &dyn Backend) -> Result<TableSpec> {
        let mut table = TableSpec::from_fields(backend, self.name.clone(), &self.fields)?;
        table.indexes = self.indexes.clone();
        Ok(table)
    }
}

impl TraceConfig {
    /// Call-site selection rules for the execution wrapper.
    pub fn rules(&self) -> AttributionRules {
        AttributionRules {
            primary: self.primary_module.clone(),
            secondary: self.secondary_module.clone(),
            secondary_exclude: self.secondary_exclude.clone(),
        }
    }
}
