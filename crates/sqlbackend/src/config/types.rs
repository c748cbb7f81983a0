//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::field::FieldMeta;
use crate::core::schema::IndexSpec;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name of the backend to use (e.g. "dameng", "mysql").
    pub backend: String,

    /// Caller attribution for executed statements.
    #[serde(default)]
    pub trace: TraceConfig,

    /// Connection pool limits applied by the execution handle.
    #[serde(default)]
    pub pool: PoolConfig,

    /// MySQL connection settings (used with the `mysql` feature).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql: Option<MysqlConfig>,

    /// Declared tables.
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

/// Caller attribution configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Product tag written into every statement comment.
    #[serde(default = "default_product")]
    pub product: String,

    /// Path fragment identifying application call sites. Empty matches any.
    #[serde(default)]
    pub primary_module: String,

    /// Path fragment of preferred call sites (e.g. a service layer).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_module: Option<String>,

    /// Path fragment that disqualifies a secondary match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_exclude: Option<String>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            product: default_product(),
            primary_module: String::new(),
            secondary_module: None,
            secondary_exclude: None,
        }
    }
}

/// Connection pool limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum open connections (default: 16).
    #[serde(default = "default_max_open")]
    pub max_open: usize,

    /// Maximum idle connections kept in the pool (default: 4).
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: default_max_open(),
            max_idle: default_max_idle(),
        }
    }
}

/// MySQL connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct MysqlConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for MysqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MysqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// A declared table: host fields plus secondary indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name.
    pub name: String,

    /// Fields in declared order.
    pub fields: Vec<FieldMeta>,

    /// Secondary indexes over column names.
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
}

// Default value functions for serde
fn default_product() -> String {
    "sqlbackend".to_string()
}

fn default_max_open() -> usize {
    16
}

fn default_max_idle() -> usize {
    4
}

fn default_mysql_port() -> u16 {
    3306
}
