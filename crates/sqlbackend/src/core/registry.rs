//! Backend registry for explicit dependency injection.
//!
//! The [`BackendRegistry`] maps backend names to shared [`Backend`]
//! instances. It is constructed explicitly and passed to whatever needs it,
//! so initialization order is deterministic and tests can build their own.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::drivers::{ClickHouseBackend, DamengBackend, MysqlBackend, PostgresBackend};
use crate::error::{BackendError, Result};

use super::traits::Backend;

/// Registry of dialect backends keyed by name.
///
/// # Example
///
/// ```
/// use sqlbackend::BackendRegistry;
///
/// let registry = BackendRegistry::with_builtins();
/// let backend = registry.lookup("dameng").unwrap();
/// assert!(backend.can_insert_or_update());
/// ```
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in backend registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [Arc<dyn Backend>; 4] = [
            Arc::new(DamengBackend::new()),
            Arc::new(MysqlBackend::new()),
            Arc::new(PostgresBackend::new()),
            Arc::new(ClickHouseBackend::new()),
        ];
        for backend in builtins {
            let name = backend.name().to_string();
            if let Err(e) = registry.register(name, backend) {
                warn!("Skipping built-in backend: {}", e);
            }
        }
        registry
    }

    /// Register `backend` under `name`.
    ///
    /// Fails with `DuplicateRegistration` if the name is taken; the existing
    /// registration is left in place.
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn Backend>) -> Result<()> {
        let name = name.into();
        if self.backends.contains_key(&name) {
            return Err(BackendError::DuplicateRegistration(name));
        }
        debug!(backend = %name, "Registered backend");
        self.backends.insert(name, backend);
        Ok(())
    }

    /// Look up a backend by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Backend>> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::UnknownBackend(name.to_string()))
    }

    /// Check if a backend is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = BackendRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.lookup("dameng"),
            Err(BackendError::UnknownBackend(name)) if name == "dameng"
        ));
    }

    #[test]
    fn test_builtins() {
        let registry = BackendRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["clickhouse", "dameng", "mysql", "postgres"]);
        assert_eq!(registry.lookup("mysql").unwrap().name(), "mysql");
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = BackendRegistry::new();
        registry.register("dameng", Arc::new(DamengBackend::new())).unwrap();
        assert!(registry.contains("dameng"));
        assert_eq!(registry.lookup("dameng").unwrap().quote_char(), "\"");
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut registry = BackendRegistry::new();
        let first: Arc<dyn Backend> = Arc::new(DamengBackend::new());
        registry.register("dameng", Arc::clone(&first)).unwrap();

        let err = registry
            .register("dameng", Arc::new(PostgresBackend::new()))
            .unwrap_err();
        assert!(matches!(err, BackendError::DuplicateRegistration(name) if name == "dameng"));
        assert!(Arc::ptr_eq(&registry.lookup("dameng").unwrap(), &first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_under_alias() {
        let mut registry = BackendRegistry::with_builtins();
        registry
            .register("pg", Arc::new(PostgresBackend::new()))
            .unwrap();
        assert_eq!(registry.lookup("pg").unwrap().name(), "postgres");
        assert_eq!(registry.len(), 5);

        let err = registry
            .register("mysql", Arc::new(MysqlBackend::new()))
            .unwrap_err();
        assert!(matches!(err, BackendError::DuplicateRegistration(name) if name == "mysql"));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let registry = BackendRegistry::with_builtins();
        assert!(registry.lookup("Dameng").is_err());
    }
}
