//! Report and dashboard definition types.
//!
//! These types are the documents the persistence collaborator loads and
//! stores. They deserialize from the JSON shape used by report authors
//! (camelCase keys, lowercase enum tags).

pub mod condition;
pub mod execution;
pub mod parameter;
pub mod template;
pub mod visualization;

pub use condition::{Condition, ConditionGroup, ConditionNode, Logic, Operator};
pub use execution::{ExecutionRecord, ExecutionStatus, SavedQuery};
pub use parameter::{ParameterDefinition, ParameterType, SelectOption, ValidationRules};
pub use template::{
    AggregateFunction, AggregationDefinition, ColumnDefinition, DataSource, DataType,
    JoinDefinition, JoinKind, PaginationDefaults, ReportConfig, ReportTemplate, SortDirection,
    SortSpec, SourceKind, StyleRule,
};
pub use visualization::{
    ChartType, DataMapping, FieldList, SourceSpec, TableColumn, VisualizationComponent,
    VisualizationConfig, VisualizationDataSource,
};

/// Runtime parameter values keyed by parameter name.
pub type ParameterValues = serde_json::Map<String, serde_json::Value>;

/// One result row keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;
