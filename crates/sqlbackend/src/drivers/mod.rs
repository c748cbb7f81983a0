//! Dialect backend implementations.
//!
//! - [`dameng`]: Dameng (MERGE-based upsert)
//! - [`mysql`]: MySQL/MariaDB, plus a `mysql_async` execution handle
//!   behind the `mysql` feature
//! - [`postgres`]: PostgreSQL
//! - [`clickhouse`]: ClickHouse (insert-only)
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/` (e.g., `drivers/oracle/`)
//! 2. Implement `Backend` for a unit struct
//! 3. Register it in `BackendRegistry::with_builtins()`

pub mod clickhouse;
pub mod dameng;
pub mod mysql;
pub mod postgres;

pub use clickhouse::ClickHouseBackend;
pub use dameng::DamengBackend;
pub use mysql::MysqlBackend;
#[cfg(feature = "mysql")]
pub use mysql::MysqlExecutor;
pub use postgres::PostgresBackend;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::Backend;

    #[test]
    fn test_quote_chars() {
        assert_eq!(DamengBackend::new().quote_ident("t"), "\"t\"");
        assert_eq!(PostgresBackend::new().quote_ident("t"), "\"t\"");
        assert_eq!(MysqlBackend::new().quote_ident("t"), "`t`");
        assert_eq!(ClickHouseBackend::new().quote_ident("t"), "`t`");
    }

    #[test]
    fn test_timestamp_expressions() {
        assert_eq!(DamengBackend::new().current_utc_timestamp_expression(), "GETUTCDATE()");
        assert_eq!(DamengBackend::new().current_timestamp_expression(), "GETDATE()");
        assert_eq!(MysqlBackend::new().current_utc_timestamp_expression(), "UTC_TIMESTAMP()");
    }
}
