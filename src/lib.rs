//! # reportkit
//!
//! Declarative report templates compiled to parameterized SQL, executed
//! against a storage backend, and rendered as chart-ready payloads.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │     ReportTemplate (sources, columns, joins, filters,    │
//! │     parameters) + runtime request                        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [validation]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Definition checks + typed parameter validation       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql::assemble + sql::condition]
//! ┌─────────────────────────────────────────────────────────┐
//! │     SQL text with $1..$n placeholders + ordered values   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [executor → store]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Rows + column metadata + execution record            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [visualization]
//! ┌─────────────────────────────────────────────────────────┐
//! │     ChartData (pie, axis, table, card, gauge, ...)       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Values never reach the SQL text: they travel in the parameter list.
//! Identifiers are checked before they are spliced in.

pub mod auth;
pub mod config;
pub mod error;
pub mod executor;
pub mod model;
pub mod sql;
pub mod store;
pub mod validation;
pub mod value;
pub mod visualization;

pub use error::{ErrorBody, ErrorKind, ReportError, ReportResult};
pub use executor::{ExecuteRequest, ExecuteResponse, ReportExecutor};
pub use visualization::{ChartData, VisualizationRenderer};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::auth::{AdminList, AuthorizationPort};
    pub use crate::config::Settings;
    pub use crate::error::{ReportError, ReportResult};
    pub use crate::executor::{ColumnMetadata, ExecuteRequest, ExecuteResponse, ReportExecutor};
    pub use crate::model::{
        ChartType, ColumnDefinition, Condition, ConditionGroup, DataSource, JoinDefinition,
        Operator, ParameterDefinition, ParameterType, ParameterValues, ReportTemplate, Row,
        SortSpec, VisualizationComponent,
    };
    pub use crate::sql::{assemble, compile_conditions, Pagination, QueryRequest};
    pub use crate::store::{QueryStorage, ReportCatalog, SqliteStore};
    pub use crate::validation::{validate_parameters, validate_template, ValidationError};
    pub use crate::visualization::{map_rows, ChartData, ChartPayload, VisualizationRenderer};
}
