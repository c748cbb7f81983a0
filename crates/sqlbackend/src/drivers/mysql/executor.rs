//! MySQL execution handle.
//!
//! Uses mysql_async for connection pooling. Pool limits from
//! [`PoolConfig`] are applied once, when the pool is built.

use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, Value};
use tracing::{debug, info, warn};

use crate::config::{MysqlConfig, PoolConfig};
use crate::core::traits::Executor;
use crate::core::value::{ExecResult, PoolStats, Row, SqlValue};
use crate::error::{BackendError, Result};

/// Pooled MySQL connection handle.
pub struct MysqlExecutor {
    pool: Pool,
    max_open: usize,
    in_use: AtomicUsize,
}

impl MysqlExecutor {
    /// Build the pool and verify connectivity with `SELECT 1`.
    pub async fn connect(config: &MysqlConfig, limits: &PoolConfig) -> Result<Self> {
        let builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(Some(&config.database))
            .user(Some(&config.user))
            .pass(Some(&config.password))
            .init(vec!["SET NAMES utf8mb4"]);

        let constraints = PoolConstraints::new(limits.max_idle, limits.max_open).ok_or_else(|| {
            BackendError::Config(format!(
                "invalid pool limits: max_idle={} max_open={}",
                limits.max_idle, limits.max_open
            ))
        })?;
        let pool_opts = PoolOpts::new().with_constraints(constraints);

        let opts: Opts = builder.pool_opts(pool_opts).into();
        let pool = Pool::new(opts);

        let mut conn = pool.get_conn().await?;
        conn.query_drop("SELECT 1").await?;
        drop(conn);

        info!(
            "Connected to MySQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            max_open: limits.max_open,
            in_use: AtomicUsize::new(0),
        })
    }

    async fn checkout(&self) -> Result<Checkout<'_>> {
        let conn = self.pool.get_conn().await?;
        self.in_use.fetch_add(1, Ordering::Relaxed);
        Ok(Checkout {
            conn,
            in_use: &self.in_use,
        })
    }
}

/// A connection taken from the pool, counted while held.
struct Checkout<'a> {
    conn: Conn,
    in_use: &'a AtomicUsize,
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        self.in_use.fetch_sub(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl Executor for MysqlExecutor {
    async fn exec(&self, sql: &str, args: &[SqlValue<'_>]) -> Result<ExecResult> {
        let mut checkout = self.checkout().await?;
        checkout.conn.exec_drop(sql, to_params(args)).await?;
        Ok(ExecResult {
            rows_affected: Some(checkout.conn.affected_rows()),
            last_insert_id: checkout.conn.last_insert_id(),
        })
    }

    async fn query(&self, sql: &str, args: &[SqlValue<'_>]) -> Result<Vec<Row>> {
        let mut checkout = self.checkout().await?;
        let rows: Vec<mysql_async::Row> = checkout.conn.exec(sql, to_params(args)).await?;
        debug!("MySQL: fetched {} rows", rows.len());

        let mut out = Vec::with_capacity(rows.len());
        let mut columns = None;
        for row in &rows {
            let columns = columns
                .get_or_insert_with(|| {
                    row.columns_ref()
                        .iter()
                        .map(|c| c.name_str().into_owned())
                        .collect::<std::sync::Arc<[String]>>()
                })
                .clone();
            let values = (0..row.len())
                .map(|i| row.as_ref(i).map(from_mysql).unwrap_or(SqlValue::Null))
                .collect();
            out.push(Row::new(columns, values));
        }
        Ok(out)
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            max_open: self.max_open,
            open: self.in_use.load(Ordering::Relaxed),
            // mysql_async does not expose idle counts.
            idle: 0,
        }
    }

    async fn close(&self) {
        if let Err(e) = self.pool.clone().disconnect().await {
            warn!("MySQL pool did not shut down cleanly: {}", e);
        }
    }
}

fn to_params(args: &[SqlValue<'_>]) -> Params {
    if args.is_empty() {
        Params::Empty
    } else {
        Params::Positional(args.iter().map(to_mysql).collect())
    }
}

/// Convert SqlValue to mysql_async::Value.
fn to_mysql(value: &SqlValue<'_>) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Bool(b) => Value::from(*b),
        SqlValue::I64(i) => Value::Int(*i),
        SqlValue::U64(u) => Value::UInt(*u),
        SqlValue::F64(f) => Value::Double(*f),
        SqlValue::Text(s) => Value::Bytes(s.as_bytes().to_vec()),
        SqlValue::Bytes(b) => Value::Bytes(b.to_vec()),
        SqlValue::Uuid(u) => Value::Bytes(u.to_string().into_bytes()),
        SqlValue::Decimal(d) => Value::Bytes(d.to_string().into_bytes()),
        SqlValue::DateTime(dt) => Value::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1_000,
        ),
    }
}

/// Convert a result cell back into a SqlValue.
fn from_mysql(value: &Value) -> SqlValue<'static> {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(i) => SqlValue::I64(*i),
        Value::UInt(u) => SqlValue::U64(*u),
        Value::Float(f) => SqlValue::F64(f64::from(*f)),
        Value::Double(f) => SqlValue::F64(*f),
        Value::Bytes(b) => match String::from_utf8(b.clone()) {
            Ok(s) => SqlValue::Text(Cow::Owned(s)),
            Err(e) => SqlValue::Bytes(Cow::Owned(e.into_bytes())),
        },
        Value::Date(y, mo, d, h, mi, s, us) => NaiveDate::from_ymd_opt(
            i32::from(*y),
            u32::from(*mo),
            u32::from(*d),
        )
        .and_then(|date| {
            date.and_hms_micro_opt(u32::from(*h), u32::from(*mi), u32::from(*s), *us)
        })
        .map(SqlValue::DateTime)
        // Zero dates ("0000-00-00") have no NaiveDateTime form.
        .unwrap_or(SqlValue::Null),
        Value::Time(neg, days, h, mi, s, us) => {
            let hours = u32::from(*days) * 24 + u32::from(*h);
            let sign = if *neg { "-" } else { "" };
            SqlValue::Text(Cow::Owned(format!(
                "{sign}{hours:02}:{mi:02}:{s:02}.{us:06}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_conversion() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_micro_opt(13, 5, 7, 250)
            .unwrap();
        let value = to_mysql(&SqlValue::DateTime(dt));
        assert_eq!(value, Value::Date(2024, 3, 9, 13, 5, 7, 250));
        assert_eq!(from_mysql(&value), SqlValue::DateTime(dt));
    }

    #[test]
    fn test_zero_date_is_null() {
        assert_eq!(from_mysql(&Value::Date(0, 0, 0, 0, 0, 0, 0)), SqlValue::Null);
    }

    #[test]
    fn test_bytes_decode_as_text() {
        assert_eq!(
            from_mysql(&Value::Bytes(b"paid".to_vec())),
            SqlValue::Text(Cow::Borrowed("paid"))
        );
        assert!(matches!(
            from_mysql(&Value::Bytes(vec![0xff, 0xfe])),
            SqlValue::Bytes(_)
        ));
    }

    #[test]
    fn test_empty_args_are_empty_params() {
        assert_eq!(to_params(&[]), Params::Empty);
        assert_eq!(
            to_params(&[SqlValue::I64(7)]),
            Params::Positional(vec![Value::Int(7)])
        );
    }

    #[test]
    fn test_time_formatting() {
        assert_eq!(
            from_mysql(&Value::Time(true, 1, 2, 3, 4, 5)),
            SqlValue::Text(Cow::Owned("-26:03:04.000005".to_string()))
        );
    }
}
