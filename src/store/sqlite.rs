//! SQLite-backed catalog and query storage.
//!
//! Definitions are stored as JSON documents keyed by id:
//!
//! ```text
//! templates                (id, document)
//! saved_queries            (id, template_id, document)
//! visualization_components (id, document)
//! execution_records        (id, template_id, executed_at_ms, status, document)
//! ```
//!
//! Report data tables live in the same database; generated statements run
//! against it with `$n` placeholders bound by name.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use tokio::sync::Mutex;

use super::{QueryStorage, ReportCatalog, StorageError, StorageResult};
use crate::model::{
    ExecutionRecord, ParameterDefinition, ReportTemplate, Row, SavedQuery, VisualizationComponent,
};

/// Current catalog schema version.
const SCHEMA_VERSION: i32 = 1;

/// SQLite database holding both the catalog and report data.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS templates (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS saved_queries (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL,
                document TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS visualization_components (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS execution_records (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL,
                executed_at_ms INTEGER NOT NULL,
                status TEXT NOT NULL,
                document TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_execution_records_template
                ON execution_records (template_id, executed_at_ms);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;

        let stored_version: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
                row.get(0)
            })
            .optional()?;
        if stored_version.is_none() {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES ('version', ?)",
                params![SCHEMA_VERSION.to_string()],
            )?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a batch of plain SQL (schema setup, fixture data).
    pub async fn execute_batch(&self, sql: &str) -> StorageResult<()> {
        self.conn.lock().await.execute_batch(sql)?;
        Ok(())
    }

    /// Insert or replace a template.
    pub async fn save_template(&self, template: &ReportTemplate) -> StorageResult<()> {
        let json = serde_json::to_string(template)?;
        self.conn.lock().await.execute(
            "INSERT OR REPLACE INTO templates (id, document) VALUES (?, ?)",
            params![template.id, json],
        )?;
        Ok(())
    }

    /// Insert or replace a saved query.
    pub async fn save_saved_query(&self, saved: &SavedQuery) -> StorageResult<()> {
        let json = serde_json::to_string(saved)?;
        self.conn.lock().await.execute(
            "INSERT OR REPLACE INTO saved_queries (id, template_id, document) VALUES (?, ?, ?)",
            params![saved.id, saved.template_id, json],
        )?;
        Ok(())
    }

    /// Insert or replace a visualization component.
    pub async fn save_component(&self, component: &VisualizationComponent) -> StorageResult<()> {
        let json = serde_json::to_string(component)?;
        self.conn.lock().await.execute(
            "INSERT OR REPLACE INTO visualization_components (id, document) VALUES (?, ?)",
            params![component.id, json],
        )?;
        Ok(())
    }

    async fn get_document<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> StorageResult<Option<T>> {
        let sql = format!("SELECT document FROM {} WHERE id = ?", table);
        let json: Option<String> = self
            .conn
            .lock()
            .await
            .query_row(&sql, params![id], |row| row.get(0))
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ReportCatalog for SqliteStore {
    async fn get_template(&self, id: &str) -> StorageResult<Option<ReportTemplate>> {
        self.get_document("templates", id).await
    }

    async fn get_parameter_definitions(
        &self,
        report_id: &str,
    ) -> StorageResult<Vec<ParameterDefinition>> {
        let template: Option<ReportTemplate> = self.get_document("templates", report_id).await?;
        let mut definitions = template.map(|t| t.parameters).unwrap_or_default();
        definitions.sort_by_key(|d| d.position);
        Ok(definitions)
    }

    async fn get_saved_query(&self, id: &str) -> StorageResult<Option<SavedQuery>> {
        self.get_document("saved_queries", id).await
    }

    async fn append_execution_record(&self, record: &ExecutionRecord) -> StorageResult<String> {
        let json = serde_json::to_string(record)?;
        self.conn.lock().await.execute(
            "INSERT INTO execution_records (id, template_id, executed_at_ms, status, document)
             VALUES (?, ?, ?, ?, ?)",
            params![
                record.id,
                record.template_id,
                record.executed_at.timestamp_millis(),
                record.status.as_str(),
                json
            ],
        )?;
        Ok(record.id.clone())
    }

    async fn list_execution_records(
        &self,
        template_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<ExecutionRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT document FROM execution_records
             WHERE template_id = ?
             ORDER BY executed_at_ms DESC, rowid DESC
             LIMIT ?",
        )?;
        let documents = stmt
            .query_map(params![template_id, limit as i64], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        documents
            .iter()
            .map(|d| serde_json::from_str(d).map_err(StorageError::from))
            .collect()
    }

    async fn get_visualization_component(
        &self,
        id: &str,
    ) -> StorageResult<Option<VisualizationComponent>> {
        self.get_document("visualization_components", id).await
    }
}

#[async_trait]
impl QueryStorage for SqliteStore {
    async fn query(&self, sql: &str, params: &[Value]) -> StorageResult<Vec<Row>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(sql)?;

        for (i, value) in params.iter().enumerate() {
            let name = format!("${}", i + 1);
            let index = stmt.parameter_index(&name)?.ok_or_else(|| {
                StorageError::Query(format!("statement has no placeholder {}", name))
            })?;
            stmt.raw_bind_parameter(index, to_sql_value(value))?;
        }
        if stmt.parameter_count() != params.len() {
            return Err(StorageError::Query(format!(
                "statement expects {} parameters, {} supplied",
                stmt.parameter_count(),
                params.len()
            )));
        }

        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.raw_query();
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut object = Map::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                object.insert(name.clone(), from_sql_value(row.get_ref(i)?));
            }
            result.push(object);
        }
        Ok(result)
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(bytes.iter().map(|b| format!("{:02x}", b)).collect()),
    }
}
