//! fieldsql CLI - Compile computed fields of a table definition to SQL
//!
//! Usage:
//!   fieldsql select <table.json> [--missing-table <id>...]
//!   fieldsql batch <table.json> [--fields <id>...] [--update]
//!   fieldsql levels <table.json> [--fields <id>...]
//!
//! Examples:
//!   fieldsql select tasks.json
//!   fieldsql batch tasks.json --fields fldB --fields fldC --update
//!   RUST_LOG=fieldsql=debug fieldsql levels tasks.json

use clap::{Parser, Subcommand};
use fieldsql::compute::{
    build_select_query, compute_field_levels, CompileContext, DirtyRecords, LateralJoinPlan,
    SameTableBatchCompiler, TemplateTranslator,
};
use fieldsql::config::Settings;
use fieldsql::model::loader::{load_table, missing_tables};
use fieldsql::model::{FieldId, Table, TableId};
use fieldsql::sql::{validate_sql, Dialect};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fieldsql")]
#[command(about = "fieldsql - Compile computed fields to PostgreSQL")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to FIELDSQL_CONFIG, ./fieldsql.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Foreign table id to treat as deleted (repeatable)
    #[arg(long = "missing-table", global = true)]
    missing_tables: Vec<String>,

    /// Parse the generated SQL back before printing it
    #[arg(long, global = true)]
    check: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the record read query and the lateral joins it needs
    Select {
        /// Path to the table definition (JSON)
        file: PathBuf,
    },

    /// Print the dependency-ordered recompute query
    Batch {
        /// Path to the table definition (JSON)
        file: PathBuf,

        /// Fields to recompute (defaults to every formula field)
        #[arg(short, long)]
        fields: Vec<String>,

        /// Restrict to records listed in this staging table
        #[arg(long)]
        dirty_table: Option<String>,

        /// Emit an UPDATE ... FROM statement instead of the SELECT
        #[arg(short, long)]
        update: bool,
    },

    /// Print the dependency levels of the formula fields
    Levels {
        /// Path to the table definition (JSON)
        file: PathBuf,

        /// Fields to group (defaults to every formula field)
        #[arg(short, long)]
        fields: Vec<String>,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let run = Run {
        settings,
        missing: missing_tables(&cli.missing_tables),
        check: cli.check,
    };

    match cli.command {
        Commands::Select { file } => run.select(file),
        Commands::Batch {
            file,
            fields,
            dirty_table,
            update,
        } => run.batch(file, fields, dirty_table, update),
        Commands::Levels { file, fields } => run.levels(file, fields),
    }
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct Run {
    settings: Settings,
    missing: HashSet<TableId>,
    check: bool,
}

impl Run {
    fn select(&self, file: PathBuf) -> ExitCode {
        let Some(table) = read_table(&file) else {
            return ExitCode::FAILURE;
        };
        let ctx = CompileContext::new(&table, &self.settings, &self.missing);
        let mut plan = LateralJoinPlan::new(self.settings.compile.lateral_prefix.clone());

        match build_select_query(ctx, &TemplateTranslator, &mut plan) {
            Ok(query) => {
                let sql = query.to_sql();
                if !self.checked(&sql) {
                    return ExitCode::FAILURE;
                }
                println!("{}", sql);
                if !plan.is_empty() {
                    println!();
                    println!("-- Lateral joins:");
                    for request in plan.requests() {
                        println!("--   {}", request);
                    }
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Compilation error: {}", e);
                ExitCode::FAILURE
            }
        }
    }

    fn batch(
        &self,
        file: PathBuf,
        fields: Vec<String>,
        dirty_table: Option<String>,
        update: bool,
    ) -> ExitCode {
        let Some(table) = read_table(&file) else {
            return ExitCode::FAILURE;
        };
        let ids = requested_fields(&table, fields);
        let levels = match compute_field_levels(&table, &ids) {
            Ok(levels) => levels,
            Err(e) => {
                eprintln!("Dependency error: {}", e);
                return ExitCode::FAILURE;
            }
        };

        let ctx = CompileContext::new(&table, &self.settings, &self.missing);
        let dirty = dirty_table.map(|t| DirtyRecords::new(t, self.settings.columns.record_id.clone()));
        let mut compiler = SameTableBatchCompiler::new(ctx, &TemplateTranslator);
        if let Some(dirty) = &dirty {
            compiler = compiler.with_dirty_records(dirty);
        }

        match compiler.build(&levels) {
            Ok(batch) => {
                let sql = if update {
                    batch.to_update().to_sql()
                } else {
                    batch.sql()
                };
                if !self.checked(&sql) {
                    return ExitCode::FAILURE;
                }
                println!("{}", sql);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Compilation error: {}", e);
                ExitCode::FAILURE
            }
        }
    }

    fn levels(&self, file: PathBuf, fields: Vec<String>) -> ExitCode {
        let Some(table) = read_table(&file) else {
            return ExitCode::FAILURE;
        };
        let ids = requested_fields(&table, fields);
        match compute_field_levels(&table, &ids) {
            Ok(levels) => {
                println!("Table: {} ({})", table.name, table.id);
                for level in &levels {
                    let names: Vec<_> = level.field_ids.iter().map(|id| id.as_str()).collect();
                    println!("  level {}: {}", level.level, names.join(", "));
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Dependency error: {}", e);
                ExitCode::FAILURE
            }
        }
    }

    fn checked(&self, sql: &str) -> bool {
        if !self.check {
            return true;
        }
        match validate_sql(sql, Dialect::Postgres) {
            Ok(()) => true,
            Err(e) => {
                eprintln!("Generated SQL does not parse: {}", e);
                false
            }
        }
    }
}

fn read_table(file: &Path) -> Option<Table> {
    match load_table(file) {
        Ok(table) => Some(table),
        Err(e) => {
            eprintln!("Error loading '{}': {}", file.display(), e);
            None
        }
    }
}

fn requested_fields(table: &Table, fields: Vec<String>) -> Vec<FieldId> {
    if fields.is_empty() {
        table
            .fields
            .iter()
            .filter(|f| f.formula().is_some())
            .map(|f| f.id.clone())
            .collect()
    } else {
        fields.into_iter().map(FieldId::new).collect()
    }
}
