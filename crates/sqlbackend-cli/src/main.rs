//! sqlbackend CLI - render and inspect SQL for pluggable dialect backends.

use clap::{Parser, Subcommand};
use sqlbackend::{Backend, BackendError, BackendRegistry, Config};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "sqlbackend")]
#[command(about = "Render DDL and inspect schemas across SQL dialects")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered backends and their capabilities
    Backends,

    /// Print CREATE statements for the configured tables
    CreateSql {
        /// Override the configured backend
        #[arg(long)]
        backend: Option<String>,

        /// Only render this table
        #[arg(long)]
        table: Option<String>,
    },

    /// Validate the configuration file
    Validate,

    /// Show live columns and indexes of a table
    #[cfg(feature = "mysql")]
    Introspect {
        /// Table to inspect
        #[arg(long)]
        table: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), BackendError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let registry = BackendRegistry::with_builtins();

    // Listing backends doesn't need a config file
    if let Commands::Backends = cli.command {
        print_backends(&registry);
        return Ok(());
    }

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Backends => unreachable!(), // Handled above

        Commands::CreateSql { backend, table } => {
            let name = backend.as_deref().unwrap_or(&config.backend);
            let backend = registry.lookup(name)?;

            let tables: Vec<_> = match &table {
                Some(t) => vec![config
                    .table(t)
                    .ok_or_else(|| BackendError::Config(format!("table '{}' is not declared", t)))?],
                None => config.tables.iter().collect(),
            };

            for table in tables {
                let spec = table.to_table_spec(backend.as_ref())?;
                for sql in backend.get_create_sqls(&spec)? {
                    println!("{};", sql);
                }
            }
        }

        Commands::Validate => {
            let backend = registry.lookup(&config.backend)?;
            for table in &config.tables {
                table.to_table_spec(backend.as_ref())?;
            }
            println!(
                "Configuration is valid: backend '{}', {} table(s)",
                backend.name(),
                config.tables.len()
            );
        }

        #[cfg(feature = "mysql")]
        Commands::Introspect { table } => {
            introspect(&config, registry.lookup(&config.backend)?.as_ref(), &table).await?;
        }
    }

    Ok(())
}

fn print_backends(registry: &BackendRegistry) {
    let flag = |on: bool| if on { "yes" } else { "no" };

    println!(
        "{:<12} {:<7} {:<7} {:<7} {:<14} {}",
        "BACKEND", "UPDATE", "INSERT", "UPSERT", "ROWS-AFFECTED", "INDEXES"
    );
    for name in registry.names() {
        let Ok(backend) = registry.lookup(name) else {
            continue;
        };
        let [update, insert, upsert, rows, indexes] = capability_flags(backend.as_ref()).map(flag);
        println!(
            "{:<12} {:<7} {:<7} {:<7} {:<14} {}",
            name, update, insert, upsert, rows, indexes
        );
    }
}

fn capability_flags(backend: &dyn Backend) -> [bool; 5] {
    [
        backend.can_update(),
        backend.can_insert(),
        backend.can_insert_or_update(),
        backend.can_support_rows_affected(),
        backend.is_support_indexes_and_constraints(),
    ]
}

#[cfg(feature = "mysql")]
async fn introspect(config: &Config, backend: &dyn Backend, table: &str) -> Result<(), BackendError> {
    use sqlbackend::trace::CallContext;
    use sqlbackend::{Executor, MysqlExecutor, TracedExecutor};

    let mysql = config
        .mysql
        .as_ref()
        .ok_or_else(|| BackendError::Config("mysql section is required for introspect".into()))?;

    let executor = MysqlExecutor::connect(mysql, &config.pool).await?;
    let traced = TracedExecutor::new(executor, &config.trace);
    let db = traced.scoped(CallContext::new("introspect", table));

    let result = async {
        let columns = backend.fetch_column_specs(&db, table).await?;
        for column in &columns {
            println!("{}", column.definition_string(backend.quote_char(), ""));
        }
        if backend.is_support_indexes_and_constraints() {
            let (indexes, constraints) = backend.fetch_indexes_and_constraints(&db, table).await?;
            for index in &indexes {
                let kind = if index.unique { "UNIQUE INDEX" } else { "INDEX" };
                println!("{} {} ({})", kind, index.name, index.columns.join(", "));
            }
            for constraint in &constraints {
                println!("{:?} {} ({})", constraint.kind, constraint.name, constraint.columns.join(", "));
            }
        }
        Ok::<(), BackendError>(())
    }
    .await;

    db.close().await;
    result
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so rendered SQL on stdout stays pipeable
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
