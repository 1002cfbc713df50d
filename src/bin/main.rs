//! reportkit CLI - compile, validate, run and render report definitions
//!
//! Usage:
//!   reportkit compile <template.json> [--params <json>] [--page <n>]
//!   reportkit validate <template.json> [--params <json>]
//!   reportkit import <bundle.json>
//!   reportkit run <report-id> --user <id> [--params <json>] [--page <n>]
//!   reportkit render <component-id> --user <id> [--params <json>]
//!   reportkit history <report-id> [--limit <n>]
//!
//! Examples:
//!   reportkit compile reports/transactions.json --params '{"status":"active"}'
//!   reportkit import reports/bundle.json
//!   reportkit run transactions --user u-1 --page 2 --page-size 100

use clap::{Parser, Subcommand};
use reportkit::auth::AdminList;
use reportkit::config::Settings;
use reportkit::model::{
    ParameterValues, ReportTemplate, SavedQuery, VisualizationComponent,
};
use reportkit::sql::{assemble, Pagination, QueryRequest};
use reportkit::store::{ReportCatalog, SqliteStore};
use reportkit::validation::{apply_defaults, validate_parameters, validate_template};
use reportkit::{ExecuteRequest, ReportExecutor, VisualizationRenderer};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reportkit")]
#[command(about = "reportkit - declarative reports compiled to parameterized SQL")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to the standard search locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database, overriding `[database] path`
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL and parameters generated for a template file
    Compile {
        /// Path to the template JSON file
        file: PathBuf,

        /// Parameter values as a JSON object
        #[arg(short, long)]
        params: Option<String>,

        /// Page number (enables pagination)
        #[arg(long)]
        page: Option<u64>,

        /// Page size
        #[arg(long)]
        page_size: Option<u64>,
    },

    /// Check a template definition and, optionally, parameter values
    Validate {
        /// Path to the template JSON file
        file: PathBuf,

        /// Parameter values as a JSON object
        #[arg(short, long)]
        params: Option<String>,
    },

    /// Store templates, components and saved queries in the catalog
    Import {
        /// Path to a bundle JSON file
        file: PathBuf,
    },

    /// Execute a stored report
    Run {
        /// Report template id
        report: String,

        /// Requesting user id
        #[arg(short, long)]
        user: String,

        /// Parameter values as a JSON object
        #[arg(short, long)]
        params: Option<String>,

        /// Saved query id
        #[arg(long)]
        saved_query: Option<String>,

        /// Page number (enables pagination)
        #[arg(long)]
        page: Option<u64>,

        /// Page size
        #[arg(long)]
        page_size: Option<u64>,
    },

    /// Render a stored visualization component
    Render {
        /// Component id
        component: String,

        /// Requesting user id
        #[arg(short, long)]
        user: String,

        /// Parameter values as a JSON object
        #[arg(short, long)]
        params: Option<String>,
    },

    /// List recent executions of a report
    History {
        /// Report template id
        report: String,

        /// Maximum number of records
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

/// Definitions imported together.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ImportBundle {
    templates: Vec<ReportTemplate>,
    components: Vec<VisualizationComponent>,
    saved_queries: Vec<SavedQuery>,
}

#[tokio::main]
async fn main() -> ExitCode {
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

    init_logging(&settings);

    let result = match cli.command {
        Commands::Compile {
            file,
            params,
            page,
            page_size,
        } => cmd_compile(&settings, &file, params, pagination(page, page_size)),
        Commands::Validate { file, params } => cmd_validate(&file, params),
        Commands::Import { file } => match open_store(&settings, cli.db) {
            Ok(store) => cmd_import(&store, &file).await,
            Err(e) => Err(e),
        },
        Commands::Run {
            report,
            user,
            params,
            saved_query,
            page,
            page_size,
        } => match open_store(&settings, cli.db) {
            Ok(store) => {
                let mut request = ExecuteRequest::new(&report, &user);
                request.saved_query_id = saved_query;
                request.pagination = pagination(page, page_size);
                match parse_params(params) {
                    Ok(values) => cmd_run(&settings, store, request.with_parameters(values)).await,
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        },
        Commands::Render {
            component,
            user,
            params,
        } => match (open_store(&settings, cli.db), parse_params(params)) {
            (Ok(store), Ok(values)) => {
                cmd_render(&settings, store, &component, values, &user).await
            }
            (Err(e), _) | (_, Err(e)) => Err(e),
        },
        Commands::History { report, limit } => match open_store(&settings, cli.db) {
            Ok(store) => cmd_history(&store, &report, limit).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn pagination(page: Option<u64>, page_size: Option<u64>) -> Option<Pagination> {
    match (page, page_size) {
        (None, None) => None,
        (page, page_size) => Some(Pagination {
            page: page.unwrap_or(1),
            page_size,
        }),
    }
}

fn open_store(settings: &Settings, db: Option<PathBuf>) -> Result<Arc<SqliteStore>, String> {
    let path = match db {
        Some(path) => path,
        None => settings
            .database
            .resolved_path()
            .map_err(|e| format!("Configuration error: {}", e))?,
    };
    SqliteStore::open(&path)
        .map(Arc::new)
        .map_err(|e| format!("Error opening database '{}': {}", path.display(), e))
}

fn read_json<T: DeserializeOwned>(file: &Path) -> Result<T, String> {
    let source = fs::read_to_string(file)
        .map_err(|e| format!("Error reading file '{}': {}", file.display(), e))?;
    serde_json::from_str(&source)
        .map_err(|e| format!("Error parsing '{}': {}", file.display(), e))
}

fn parse_params(params: Option<String>) -> Result<ParameterValues, String> {
    match params {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| format!("--params must be a JSON object: {}", e)),
        None => Ok(ParameterValues::new()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn cmd_compile(
    settings: &Settings,
    file: &Path,
    params: Option<String>,
    pagination: Option<Pagination>,
) -> Result<(), String> {
    let template: ReportTemplate = read_json(file)?;
    let mut values = parse_params(params)?;
    apply_defaults(&template.parameters, &mut values);

    let request = QueryRequest {
        parameters: values,
        pagination,
        ..Default::default()
    };
    let assembled = assemble(&template, &request, &settings.engine.assemble_options())
        .map_err(|e| format!("Compilation error: {}", e))?;

    println!("{}", assembled.sql);
    println!();
    println!("-- params: {}", serde_json::Value::from(assembled.params));
    Ok(())
}

fn cmd_validate(file: &Path, params: Option<String>) -> Result<(), String> {
    let template: ReportTemplate = read_json(file)?;

    if let Err(errors) = validate_template(&template) {
        let lines: Vec<String> = errors.iter().map(|e| format!("  {}", e)).collect();
        return Err(format!("Validation errors:\n{}", lines.join("\n")));
    }

    if let Some(params) = params {
        let mut values = parse_params(Some(params))?;
        apply_defaults(&template.parameters, &mut values);
        validate_parameters(&template.parameters, &values)
            .map_err(|e| format!("Parameter error: {}", e))?;
    }

    println!("OK: {} is valid", file.display());
    Ok(())
}

async fn cmd_import(store: &SqliteStore, file: &Path) -> Result<(), String> {
    let bundle: ImportBundle = read_json(file)?;

    for template in &bundle.templates {
        if let Err(errors) = validate_template(template) {
            return Err(format!("Template '{}' is invalid: {}", template.id, errors[0]));
        }
    }

    let storage_error = |e: reportkit::store::StorageError| format!("Import failed: {}", e);
    for template in &bundle.templates {
        store.save_template(template).await.map_err(storage_error)?;
    }
    for component in &bundle.components {
        store.save_component(component).await.map_err(storage_error)?;
    }
    for saved in &bundle.saved_queries {
        store.save_saved_query(saved).await.map_err(storage_error)?;
    }

    println!(
        "Imported {} templates, {} components, {} saved queries",
        bundle.templates.len(),
        bundle.components.len(),
        bundle.saved_queries.len()
    );
    Ok(())
}

fn build_executor(settings: &Settings, store: Arc<SqliteStore>) -> Arc<ReportExecutor> {
    let auth = Arc::new(AdminList::new(settings.auth.admins.iter().cloned()));
    Arc::new(
        ReportExecutor::new(store.clone(), store, auth).with_settings(settings.engine.clone()),
    )
}

async fn cmd_run(
    settings: &Settings,
    store: Arc<SqliteStore>,
    request: ExecuteRequest,
) -> Result<(), String> {
    let executor = build_executor(settings, store);
    match executor.execute(request).await {
        Ok(response) => print_json(&response),
        Err(e) => Err(serde_json::to_string(&e.to_body()).unwrap_or_else(|_| e.to_string())),
    }
}

async fn cmd_render(
    settings: &Settings,
    store: Arc<SqliteStore>,
    component: &str,
    values: ParameterValues,
    user: &str,
) -> Result<(), String> {
    let executor = build_executor(settings, store.clone());
    let auth = Arc::new(AdminList::new(settings.auth.admins.iter().cloned()));
    let renderer = VisualizationRenderer::new(store.clone(), store, auth, executor)
        .with_raw_query_settings(settings.raw_query.clone());

    match renderer.render(component, values, user).await {
        Ok(chart) => print_json(&chart),
        Err(e) => Err(serde_json::to_string(&e.to_body()).unwrap_or_else(|_| e.to_string())),
    }
}

async fn cmd_history(store: &SqliteStore, report: &str, limit: usize) -> Result<(), String> {
    let records = store
        .list_execution_records(report, limit)
        .await
        .map_err(|e| format!("Error reading history: {}", e))?;

    if records.is_empty() {
        println!("No executions recorded for '{}'.", report);
        return Ok(());
    }
    for record in &records {
        println!(
            "{}  {:<9}  {:>6} rows  {:>6} ms  {}{}",
            record.executed_at.to_rfc3339(),
            record.status.as_str(),
            record.row_count,
            record.execution_time_ms,
            record.executed_by,
            record
                .error_message
                .as_deref()
                .map(|m| format!("  ({})", m))
                .unwrap_or_default()
        );
    }
    Ok(())
}
