//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use reportkit::auth::AuthorizationPort;
use reportkit::model::{
    ColumnDefinition, Condition, ConditionGroup, DataSource, DataType, ExecutionRecord,
    JoinDefinition, JoinKind, Operator, ParameterDefinition, ParameterType, ParameterValues,
    ReportTemplate, Row, SavedQuery, SortSpec, ValidationRules, VisualizationComponent,
};
use reportkit::store::{QueryStorage, ReportCatalog, SqliteStore, StorageError, StorageResult};
use reportkit::ReportExecutor;

pub const OWNER: &str = "owner-1";
pub const ADMIN: &str = "admin-1";
pub const STRANGER: &str = "stranger-1";

pub const SCHEMA: &str = "
    CREATE TABLE accounts (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE transactions (
        id INTEGER PRIMARY KEY,
        account_id INTEGER NOT NULL,
        amount REAL NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    INSERT INTO accounts VALUES (1, 'Alpha'), (2, 'Beta');
    INSERT INTO transactions VALUES
        (1, 1, 100.0, 'active', '2024-01-05'),
        (2, 1, 250.5, 'active', '2024-01-03'),
        (3, 2, 75.0,  'closed', '2024-01-04'),
        (4, 2, 500.0, 'active', '2024-01-01'),
        (5, 1, 20.0,  'active', '2024-01-02');
";

pub fn values(v: Value) -> ParameterValues {
    v.as_object().cloned().expect("parameter values must be an object")
}

pub fn rows(v: Value) -> Vec<Row> {
    v.as_array()
        .expect("rows must be an array")
        .iter()
        .map(|r| r.as_object().cloned().expect("row must be an object"))
        .collect()
}

/// `transactions` joined to `accounts`, filtered by a `status` parameter.
pub fn transactions_template() -> ReportTemplate {
    let mut template = ReportTemplate::new(
        "transactions",
        "Transactions",
        DataSource::table("transactions").with_alias("t"),
    );
    template
        .data_sources
        .push(DataSource::table("accounts").with_alias("a"));
    template.owner_id = OWNER.into();

    template.config.columns = vec![
        ColumnDefinition::new("id")
            .from_source("t")
            .with_type(DataType::Integer),
        ColumnDefinition::new("accountName")
            .from_source("a")
            .with_column("name"),
        ColumnDefinition::new("amount")
            .from_source("t")
            .with_type(DataType::Decimal)
            .sortable()
            .filterable(),
        ColumnDefinition::new("status").from_source("t").filterable(),
        ColumnDefinition::new("createdAt")
            .from_source("t")
            .with_column("created_at")
            .with_type(DataType::Date)
            .sortable(),
        ColumnDefinition::new("accountId")
            .from_source("t")
            .with_column("account_id")
            .hidden(),
    ];
    template.config.joins = vec![JoinDefinition {
        left_source: "a".into(),
        left_column: "id".into(),
        right_source: "t".into(),
        right_column: "account_id".into(),
        kind: JoinKind::Inner,
        condition: None,
    }];
    template.config.filters = Some(ConditionGroup::and(vec![
        Condition::new("t.status", Operator::Eq)
            .with_parameter("status")
            .into(),
        Condition::new("t.amount", Operator::Gte)
            .with_parameter("minAmount")
            .into(),
    ]));
    template.config.order_by = vec![SortSpec::asc("t.id")];
    template.parameters = vec![
        ParameterDefinition::new("status", ParameterType::Select)
            .required()
            .with_options(vec![json!("active"), json!("closed")])
            .at_position(1),
        ParameterDefinition::new("minAmount", ParameterType::Number)
            .with_rules(ValidationRules {
                min: Some(0.0),
                ..Default::default()
            })
            .at_position(2),
    ];
    template
}

/// In-memory store with the transactions schema and template loaded.
pub async fn seeded_store() -> Arc<SqliteStore> {
    let store = SqliteStore::open_in_memory().expect("open in-memory store");
    store.execute_batch(SCHEMA).await.expect("load schema");
    store
        .save_template(&transactions_template())
        .await
        .expect("save template");
    Arc::new(store)
}

pub fn saved_query(id: &str, template_id: &str, parameters: Value) -> SavedQuery {
    SavedQuery {
        id: id.into(),
        template_id: template_id.into(),
        name: id.into(),
        parameters: values(parameters),
        filters: None,
        owner_id: OWNER.into(),
        created_at: chrono::Utc::now(),
    }
}

pub fn component(value: Value) -> VisualizationComponent {
    serde_json::from_value(value).expect("valid component")
}

/// Authorization double with a fixed admin set.
pub struct FakeAuth {
    admins: Vec<String>,
}

impl FakeAuth {
    pub fn with_admins(admins: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            admins: admins.iter().map(|a| a.to_string()).collect(),
        })
    }
}

#[async_trait]
impl AuthorizationPort for FakeAuth {
    async fn is_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|a| a == user_id)
    }
}

/// Storage whose every query fails.
pub struct FailingStorage;

#[async_trait]
impl QueryStorage for FailingStorage {
    async fn query(&self, _sql: &str, _params: &[Value]) -> StorageResult<Vec<Row>> {
        Err(StorageError::Query("connection reset by peer".into()))
    }
}

/// Catalog delegating to a store, with history writes that always fail.
pub struct BrokenHistoryCatalog {
    pub inner: Arc<SqliteStore>,
}

#[async_trait]
impl ReportCatalog for BrokenHistoryCatalog {
    async fn get_template(&self, id: &str) -> StorageResult<Option<ReportTemplate>> {
        self.inner.get_template(id).await
    }

    async fn get_parameter_definitions(
        &self,
        report_id: &str,
    ) -> StorageResult<Vec<ParameterDefinition>> {
        self.inner.get_parameter_definitions(report_id).await
    }

    async fn get_saved_query(&self, id: &str) -> StorageResult<Option<SavedQuery>> {
        self.inner.get_saved_query(id).await
    }

    async fn append_execution_record(&self, _record: &ExecutionRecord) -> StorageResult<String> {
        Err(StorageError::Query("history table is read-only".into()))
    }

    async fn list_execution_records(
        &self,
        template_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<ExecutionRecord>> {
        self.inner.list_execution_records(template_id, limit).await
    }

    async fn get_visualization_component(
        &self,
        id: &str,
    ) -> StorageResult<Option<VisualizationComponent>> {
        self.inner.get_visualization_component(id).await
    }
}

/// Executor over one store with `ADMIN` as the only administrator.
pub fn executor(store: &Arc<SqliteStore>) -> Arc<ReportExecutor> {
    Arc::new(ReportExecutor::new(
        store.clone(),
        store.clone(),
        FakeAuth::with_admins(&[ADMIN]),
    ))
}
