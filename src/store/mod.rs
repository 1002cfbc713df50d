//! Persistence and storage ports.
//!
//! The engine talks to two collaborators:
//!
//! - [`ReportCatalog`] loads definitions (templates, parameters, saved
//!   queries, visualization components) and appends execution history.
//! - [`QueryStorage`] runs a generated statement with `$1..$n`
//!   placeholders and returns rows as JSON objects.
//!
//! [`SqliteStore`] implements both against a single SQLite database.

mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::model::{
    ExecutionRecord, ParameterDefinition, ReportTemplate, Row, SavedQuery, VisualizationComponent,
};

/// Errors that can occur in persistence or storage calls.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Query error: {0}")]
    Query(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Definition lookups and the execution audit trail.
#[async_trait]
pub trait ReportCatalog: Send + Sync {
    async fn get_template(&self, id: &str) -> StorageResult<Option<ReportTemplate>>;

    /// Parameter definitions for a template, in `position` order.
    async fn get_parameter_definitions(
        &self,
        report_id: &str,
    ) -> StorageResult<Vec<ParameterDefinition>>;

    async fn get_saved_query(&self, id: &str) -> StorageResult<Option<SavedQuery>>;

    /// Append a record; returns its id. Records are never updated.
    async fn append_execution_record(&self, record: &ExecutionRecord) -> StorageResult<String>;

    /// Most recent records first.
    async fn list_execution_records(
        &self,
        template_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<ExecutionRecord>>;

    async fn get_visualization_component(
        &self,
        id: &str,
    ) -> StorageResult<Option<VisualizationComponent>>;
}

/// Executes parameterized statements.
#[async_trait]
pub trait QueryStorage: Send + Sync {
    async fn query(&self, sql: &str, params: &[Value]) -> StorageResult<Vec<Row>>;
}
