//! Saved queries and the execution audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::condition::ConditionGroup;
use super::template::SortSpec;

/// A reusable set of parameter values and filters for one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuery {
    pub id: String,
    pub template_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<ConditionGroup>,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Outcome of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Running,
    Scheduled,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Scheduled => "scheduled",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

/// Immutable audit entry for one report run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: String,
    pub template_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_query_id: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<ConditionGroup>,
    #[serde(default)]
    pub sorting: Vec<SortSpec>,
    pub executed_at: DateTime<Utc>,
    pub execution_time_ms: u64,
    pub row_count: u64,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub executed_by: String,
}
