//! Caller attribution for executed statements.
//!
//! [`TracedExecutor`] wraps any [`Executor`]. Every statement it runs gets
//! a fresh correlation id, a single-line SQL comment naming the product,
//! the originating call site and the logical action, and one `info` event
//! carrying the same id. Rows, results and errors from the wrapped handle
//! are returned untouched.
//!
//! Call sites are captured with `#[track_caller]` when a [`CallContext`] is
//! built, and again each time it is passed through [`CallContext::enter`],
//! so the chain runs innermost first.

use std::fmt;
use std::panic::Location;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::config::TraceConfig;
use crate::core::identifier::strip_quotes;
use crate::core::traits::Executor;
use crate::core::value::{ExecResult, PoolStats, Row, SqlValue};
use crate::error::Result;

/// A source location in the call chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
}

impl CallSite {
    /// The location of the caller.
    #[track_caller]
    pub fn here() -> Self {
        Location::caller().into()
    }
}

impl From<&'static Location<'static>> for CallSite {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

/// Logical action, logical table and call sites for one statement.
#[derive(Debug, Clone)]
pub struct CallContext {
    action: String,
    table: String,
    sites: Vec<CallSite>,
}

impl CallContext {
    /// Start a context at the caller's location.
    #[track_caller]
    pub fn new(action: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            table: table.into(),
            sites: vec![CallSite::here()],
        }
    }

    /// Record the caller's location as an outer frame.
    #[track_caller]
    #[must_use]
    pub fn enter(mut self) -> Self {
        self.sites.push(CallSite::here());
        self
    }

    /// Record an explicit outer frame.
    #[must_use]
    pub fn with_site(mut self, site: CallSite) -> Self {
        self.sites.push(site);
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Call sites, innermost first.
    pub fn sites(&self) -> &[CallSite] {
        &self.sites
    }
}

/// Path fragments used to pick the attributed call site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributionRules {
    /// Matches application frames. Empty matches every frame.
    pub primary: String,
    /// Matches preferred frames, e.g. a service layer.
    pub secondary: Option<String>,
    /// A frame containing this fragment never counts as secondary.
    pub secondary_exclude: Option<String>,
}

impl AttributionRules {
    /// Pick the first secondary frame, else the first primary frame.
    ///
    /// Returns `None` when no frame matches.
    pub fn resolve(&self, sites: &[CallSite]) -> Option<CallSite> {
        let secondary = self.secondary.as_deref().and_then(|pattern| {
            sites.iter().find(|site| {
                site.file.contains(pattern)
                    && !self
                        .secondary_exclude
                        .as_deref()
                        .is_some_and(|exclude| site.file.contains(exclude))
            })
        });

        secondary
            .or_else(|| sites.iter().find(|site| site.file.contains(&self.primary)))
            .copied()
    }
}

/// Per-execution attribution record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerAttribution {
    pub file: String,
    pub line: u32,
    pub correlation_id: Uuid,
    pub action: String,
    pub table: String,
}

impl CallerAttribution {
    /// Resolve `ctx` against `rules` with a fresh correlation id.
    ///
    /// An unresolved call site degrades to an empty file and line 0.
    pub fn resolve(ctx: &CallContext, rules: &AttributionRules) -> Self {
        let (file, line) = rules
            .resolve(ctx.sites())
            .map(|site| (site.file.to_string(), site.line))
            .unwrap_or_default();

        Self {
            file,
            line,
            correlation_id: Uuid::new_v4(),
            action: ctx.action.clone(),
            table: strip_quotes(&ctx.table).to_string(),
        }
    }
}

/// Neutralize comment terminators inside a comment field.
fn sanitize(field: &str) -> std::borrow::Cow<'_, str> {
    if field.contains("*/") || field.contains(['\r', '\n']) {
        field.replace("*/", "* /").replace(['\r', '\n'], " ").into()
    } else {
        field.into()
    }
}

struct TraceComment<'a> {
    product: &'a str,
    attribution: &'a CallerAttribution,
}

impl fmt::Display for TraceComment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/* product={}, file={}, line={}, flow={}, identity={} */",
            sanitize(self.product),
            sanitize(&self.attribution.file),
            self.attribution.line,
            sanitize(&self.attribution.action),
            self.attribution.correlation_id
        )
    }
}

/// The single-line comment prepended to traced statements.
///
/// External tooling parses this format; keep it stable.
pub fn format_trace_comment(product: &str, attribution: &CallerAttribution) -> String {
    TraceComment {
        product,
        attribution,
    }
    .to_string()
}

/// Executor wrapper that annotates and logs every statement.
pub struct TracedExecutor<E> {
    inner: E,
    product: String,
    rules: AttributionRules,
}

impl<E: Executor> TracedExecutor<E> {
    pub fn new(inner: E, config: &TraceConfig) -> Self {
        Self {
            inner,
            product: config.product.clone(),
            rules: config.rules(),
        }
    }

    /// The wrapped handle.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }

    /// Resolve attribution, log it and return the annotated statement.
    fn annotate(&self, ctx: &CallContext, sql: &str) -> String {
        let attribution = CallerAttribution::resolve(ctx, &self.rules);
        info!(
            table = %attribution.table,
            action = %attribution.action,
            correlation_id = %attribution.correlation_id,
            file = %attribution.file,
            line = attribution.line,
            "Executing statement"
        );
        format!("{} {}", format_trace_comment(&self.product, &attribution), sql)
    }

    /// Execute a statement that returns no rows.
    pub async fn exec(
        &self,
        ctx: &CallContext,
        sql: &str,
        args: &[SqlValue<'_>],
    ) -> Result<ExecResult> {
        let sql = self.annotate(ctx, sql);
        self.inner.exec(&sql, args).await
    }

    /// Execute a query and collect its rows.
    pub async fn query(
        &self,
        ctx: &CallContext,
        sql: &str,
        args: &[SqlValue<'_>],
    ) -> Result<Vec<Row>> {
        let sql = self.annotate(ctx, sql);
        self.inner.query(&sql, args).await
    }

    /// Execute a query and return its first row.
    pub async fn query_row(
        &self,
        ctx: &CallContext,
        sql: &str,
        args: &[SqlValue<'_>],
    ) -> Result<Option<Row>> {
        let sql = self.annotate(ctx, sql);
        self.inner.query_row(&sql, args).await
    }

    /// An [`Executor`] view that traces every statement under `ctx`.
    ///
    /// Lets context-free callers such as catalog introspection run
    /// through the wrapper.
    pub fn scoped(&self, ctx: CallContext) -> Scoped<'_, E> {
        Scoped { traced: self, ctx }
    }
}

/// A [`TracedExecutor`] bound to one [`CallContext`].
pub struct Scoped<'a, E> {
    traced: &'a TracedExecutor<E>,
    ctx: CallContext,
}

#[async_trait]
impl<E: Executor> Executor for Scoped<'_, E> {
    async fn exec(&self, sql: &str, args: &[SqlValue<'_>]) -> Result<ExecResult> {
        self.traced.exec(&self.ctx, sql, args).await
    }

    async fn query(&self, sql: &str, args: &[SqlValue<'_>]) -> Result<Vec<Row>> {
        self.traced.query(&self.ctx, sql, args).await
    }

    async fn query_row(&self, sql: &str, args: &[SqlValue<'_>]) -> Result<Option<Row>> {
        self.traced.query_row(&self.ctx, sql, args).await
    }

    fn stats(&self) -> PoolStats {
        self.traced.inner.stats()
    }

    async fn close(&self) {
        self.traced.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::core::value::rows_from;
    use crate::error::BackendError;

    /// Records statements and answers with fixed rows.
    #[derive(Default)]
    struct ScriptedExecutor {
        seen: Mutex<Vec<String>>,
        rows: Vec<Row>,
        fail: bool,
    }

    #[async_trait]
    impl Executor for ScriptedExecutor {
        async fn exec(&self, sql: &str, _args: &[SqlValue<'_>]) -> Result<ExecResult> {
            self.seen.lock().unwrap().push(sql.to_string());
            if self.fail {
                return Err(BackendError::driver("connection reset"));
            }
            Ok(ExecResult {
                rows_affected: Some(3),
                last_insert_id: None,
            })
        }

        async fn query(&self, sql: &str, _args: &[SqlValue<'_>]) -> Result<Vec<Row>> {
            self.seen.lock().unwrap().push(sql.to_string());
            Ok(self.rows.clone())
        }

        fn stats(&self) -> PoolStats {
            PoolStats {
                max_open: 4,
                ..PoolStats::default()
            }
        }

        async fn close(&self) {}
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn attribution() -> CallerAttribution {
        CallerAttribution {
            file: "app/orders.rs".to_string(),
            line: 42,
            correlation_id: Uuid::nil(),
            action: "create-order".to_string(),
            table: "orders".to_string(),
        }
    }

    fn site(file: &'static str, line: u32) -> CallSite {
        CallSite { file, line }
    }

    #[test]
    fn test_format_trace_comment() {
        assert_eq!(
            format_trace_comment("billing", &attribution()),
            "/* product=billing, file=app/orders.rs, line=42, flow=create-order, \
             identity=00000000-0000-0000-0000-000000000000 */"
        );
    }

    #[test]
    fn test_format_trace_comment_cannot_be_closed_early() {
        let mut attr = attribution();
        attr.action = "x */ DROP TABLE orders; /*".to_string();
        let comment = format_trace_comment("billing", &attr);
        assert_eq!(comment.matches("*/").count(), 1);
        assert!(comment.ends_with(" */"));
    }

    #[test]
    fn test_format_trace_comment_stays_on_one_line() {
        let mut attr = attribution();
        attr.action = "step\rtwo".to_string();
        let comment = format_trace_comment("bill\r\ning", &attr);
        assert!(!comment.contains(['\r', '\n']), "{comment:?}");
        assert!(comment.contains("flow=step two"));
    }

    #[test]
    fn test_resolve_prefers_secondary() {
        let rules = AttributionRules {
            primary: "app/".to_string(),
            secondary: Some("service/".to_string()),
            secondary_exclude: Some("dispatcher".to_string()),
        };
        let sites = [
            site("src/db/helpers.rs", 10),
            site("app/service/dispatcher.rs", 20),
            site("app/handlers.rs", 30),
            site("app/service/orders.rs", 40),
        ];
        assert_eq!(rules.resolve(&sites), Some(site("app/service/orders.rs", 40)));

        let without_service = &sites[..3];
        assert_eq!(rules.resolve(without_service), Some(site("app/service/dispatcher.rs", 20)));
    }

    #[test]
    fn test_resolve_miss_degrades_to_empty() {
        let rules = AttributionRules {
            primary: "nowhere/".to_string(),
            ..AttributionRules::default()
        };
        let ctx = CallContext::new("load", "orders");
        assert_eq!(rules.resolve(ctx.sites()), None);

        let attr = CallerAttribution::resolve(&ctx, &rules);
        assert_eq!(attr.file, "");
        assert_eq!(attr.line, 0);
    }

    #[test]
    fn test_call_context_captures_sites() {
        let line = line!() + 1;
        let ctx = CallContext::new("load", "`orders`").enter();
        assert_eq!(ctx.sites().len(), 2);
        assert!(ctx.sites()[0].file.ends_with("trace.rs"));
        assert_eq!(ctx.sites()[0].line, line);

        let attr = CallerAttribution::resolve(&ctx, &AttributionRules::default());
        assert_eq!(attr.table, "orders");
        assert_eq!(attr.line, line);
    }

    #[test]
    fn test_correlation_ids_are_fresh() {
        let ctx = CallContext::new("load", "orders");
        let rules = AttributionRules::default();
        let a = CallerAttribution::resolve(&ctx, &rules);
        let b = CallerAttribution::resolve(&ctx, &rules);
        assert_ne!(a.correlation_id, b.correlation_id);
    }

    #[tokio::test]
    async fn test_query_rows_unchanged() {
        let rows = rows_from(
            &["id", "status"],
            vec![
                vec![SqlValue::I64(1), SqlValue::from("new".to_string())],
                vec![SqlValue::I64(2), SqlValue::from("paid".to_string())],
            ],
        );
        let inner = ScriptedExecutor {
            rows: rows.clone(),
            ..ScriptedExecutor::default()
        };
        let traced = TracedExecutor::new(inner, &TraceConfig::default());

        let ctx = CallContext::new("list-orders", "orders");
        let got = traced
            .query(&ctx, "SELECT id, status FROM orders", &[])
            .await
            .unwrap();
        assert_eq!(got, rows);

        let first = traced.query_row(&ctx, "SELECT 1", &[]).await.unwrap();
        assert_eq!(first, rows.first().cloned());

        let seen = traced.inner().seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].starts_with("/* product=sqlbackend, file="));
        assert!(seen[0].ends_with(" */ SELECT id, status FROM orders"));
        assert!(!seen[0].contains('\n'));
    }

    #[tokio::test]
    async fn test_exec_passes_errors_through() {
        let inner = ScriptedExecutor {
            fail: true,
            ..ScriptedExecutor::default()
        };
        let traced = TracedExecutor::new(inner, &TraceConfig::default());
        let err = traced
            .exec(&CallContext::new("delete", "orders"), "DELETE FROM orders", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Driver(_)));
        assert_eq!(err.to_string(), "Driver error: connection reset");
    }

    #[tokio::test]
    async fn test_scoped_executor() {
        let traced = TracedExecutor::new(ScriptedExecutor::default(), &TraceConfig::default());
        let scoped = traced.scoped(CallContext::new("migrate", "orders"));

        let result = scoped.exec("UPDATE orders SET status = ?", &[]).await.unwrap();
        assert_eq!(result.rows_affected, Some(3));
        assert_eq!(scoped.stats().max_open, 4);
        assert!(traced.inner().seen.lock().unwrap()[0].contains("flow=migrate"));
    }

    #[tokio::test]
    async fn test_log_event_carries_correlation_id() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let traced = TracedExecutor::new(ScriptedExecutor::default(), &TraceConfig::default());
        traced
            .exec(&CallContext::new("touch", "\"orders\""), "UPDATE orders SET n = n", &[])
            .await
            .unwrap();

        let sql = traced.inner().seen.lock().unwrap()[0].clone();
        let id = sql
            .split("identity=")
            .nth(1)
            .and_then(|rest| rest.split(' ').next())
            .unwrap()
            .to_string();

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.lines().count(), 1);
        assert!(logs.contains(&format!("correlation_id={id}")));
        assert!(logs.contains("table=orders"));
        assert!(logs.contains("action=touch"));
    }
}
