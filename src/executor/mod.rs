//! Report execution.
//!
//! [`ReportExecutor::execute`] is the single entry point for running a
//! template:
//!
//! 1. resolve the template (and saved query, if one is named)
//! 2. check access: public, owner, or administrator
//! 3. merge parameters (defaults < saved query < request) and validate
//! 4. assemble the statement
//! 5. run it against storage
//! 6. re-key rows and build column metadata
//! 7. append an execution record
//!
//! Failures before step 5 return immediately and leave no history. A
//! storage failure in step 5 is recorded as a failed execution (best
//! effort) and returned as [`ReportError::Execution`].

mod rows;

pub use rows::{column_metadata, ColumnMetadata};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{can_access, AuthorizationPort};
use crate::config::EngineSettings;
use crate::error::{ReportError, ReportResult};
use crate::model::{
    ConditionGroup, ExecutionRecord, ExecutionStatus, ParameterValues, ReportTemplate, Row,
    SavedQuery, SortSpec,
};
use crate::sql::{assemble, AssembledQuery, Pagination, QueryRequest};
use crate::store::{QueryStorage, ReportCatalog};
use crate::validation::{apply_defaults, validate_parameters, ValidationError};

/// A request to run one report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub report_id: String,
    #[serde(default)]
    pub parameters: ParameterValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<ConditionGroup>,
    #[serde(default)]
    pub sorting: Vec<SortSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_query_id: Option<String>,
    #[serde(default)]
    pub requester_id: String,
}

impl ExecuteRequest {
    pub fn new(report_id: &str, requester_id: &str) -> Self {
        Self {
            report_id: report_id.into(),
            requester_id: requester_id.into(),
            ..Default::default()
        }
    }

    pub fn with_parameters(mut self, parameters: ParameterValues) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_filters(mut self, filters: ConditionGroup) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_sorting(mut self, sorting: Vec<SortSpec>) -> Self {
        self.sorting = sorting;
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_saved_query(mut self, saved_query_id: &str) -> Self {
        self.saved_query_id = Some(saved_query_id.into());
        self
    }
}

/// Rows, column metadata and the audit record of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub execution: ExecutionRecord,
    pub data: Vec<Row>,
    pub columns: Vec<ColumnMetadata>,
    /// Total matching rows; only computed for paginated runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

/// Runs report templates against storage.
pub struct ReportExecutor {
    catalog: Arc<dyn ReportCatalog>,
    storage: Arc<dyn QueryStorage>,
    auth: Arc<dyn AuthorizationPort>,
    settings: EngineSettings,
}

impl ReportExecutor {
    pub fn new(
        catalog: Arc<dyn ReportCatalog>,
        storage: Arc<dyn QueryStorage>,
        auth: Arc<dyn AuthorizationPort>,
    ) -> Self {
        Self {
            catalog,
            storage,
            auth,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn execute(&self, request: ExecuteRequest) -> ReportResult<ExecuteResponse> {
        info!(report_id = %request.report_id, requester = %request.requester_id, "executing report");

        let template = self
            .catalog
            .get_template(&request.report_id)
            .await?
            .ok_or_else(|| ReportError::not_found("Report template", &request.report_id))?;

        if !can_access(
            self.auth.as_ref(),
            &template.owner_id,
            template.is_public,
            &request.requester_id,
        )
        .await
        {
            return Err(ReportError::Authorization(format!(
                "user '{}' may not run report '{}'",
                request.requester_id, template.id
            )));
        }

        let saved = match &request.saved_query_id {
            Some(id) => Some(self.load_saved_query(&template, id).await?),
            None => None,
        };

        let parameters = self.resolve_parameters(&template, saved.as_ref(), &request).await?;
        let filters = merge_filters(request.filters.clone(), saved.as_ref());

        let query_request = QueryRequest {
            parameters: parameters.clone(),
            filters: filters.clone(),
            sorting: request.sorting.clone(),
            pagination: request.pagination,
        };
        let assembled = assemble(&template, &query_request, &self.settings.assemble_options())?;
        debug!(
            report_id = %template.id,
            sql = %assembled.sql,
            param_count = assembled.params.len(),
            "assembled report query"
        );

        let record = ExecutionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            template_id: template.id.clone(),
            saved_query_id: saved.as_ref().map(|s| s.id.clone()),
            parameters,
            filters,
            sorting: request.sorting,
            executed_at: Utc::now(),
            execution_time_ms: 0,
            row_count: 0,
            status: ExecutionStatus::Running,
            error_message: None,
            executed_by: request.requester_id,
        };

        self.run(&template, assembled, record).await
    }

    async fn run(
        &self,
        template: &ReportTemplate,
        assembled: AssembledQuery,
        mut record: ExecutionRecord,
    ) -> ReportResult<ExecuteResponse> {
        let started = Instant::now();
        let result = self.storage.query(&assembled.sql, &assembled.params).await;
        record.execution_time_ms = started.elapsed().as_millis() as u64;

        let raw_rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                let message = e.to_string();
                warn!(report_id = %template.id, error = %message, "report query failed");
                record.status = ExecutionStatus::Failed;
                record.error_message = Some(message.clone());
                self.record_history(&record).await;
                return Err(ReportError::Execution(message));
            }
        };

        let shaped = rows::shape_rows(template, raw_rows);
        let total_count = match assembled.page {
            Some(_) => Some(shaped.total_count.unwrap_or(0)),
            None => None,
        };

        record.status = ExecutionStatus::Success;
        record.row_count = shaped.rows.len() as u64;
        info!(
            report_id = %template.id,
            rows = record.row_count,
            elapsed_ms = record.execution_time_ms,
            "report executed"
        );
        self.record_history(&record).await;

        Ok(ExecuteResponse {
            execution: record,
            data: shaped.rows,
            columns: column_metadata(template),
            total_count,
        })
    }

    async fn load_saved_query(
        &self,
        template: &ReportTemplate,
        id: &str,
    ) -> ReportResult<SavedQuery> {
        let saved = self
            .catalog
            .get_saved_query(id)
            .await?
            .ok_or_else(|| ReportError::not_found("Saved query", id))?;

        if saved.template_id != template.id {
            return Err(ValidationError::SavedQueryMismatch {
                saved_query: saved.id,
                template: template.id.clone(),
            }
            .into());
        }
        Ok(saved)
    }

    /// Defaults < saved query values < request values, then validated.
    async fn resolve_parameters(
        &self,
        template: &ReportTemplate,
        saved: Option<&SavedQuery>,
        request: &ExecuteRequest,
    ) -> ReportResult<ParameterValues> {
        let definitions = self.catalog.get_parameter_definitions(&template.id).await?;

        let mut values = saved.map(|s| s.parameters.clone()).unwrap_or_default();
        for (name, value) in &request.parameters {
            values.insert(name.clone(), value.clone());
        }
        apply_defaults(&definitions, &mut values);
        validate_parameters(&definitions, &values)?;
        Ok(values)
    }

    /// Append a record; a failure here is logged, never returned.
    async fn record_history(&self, record: &ExecutionRecord) {
        if !self.settings.record_history {
            return;
        }
        if let Err(e) = self.catalog.append_execution_record(record).await {
            warn!(
                report_id = %record.template_id,
                execution_id = %record.id,
                error = %e,
                "failed to write execution record"
            );
        }
    }
}

/// Request filters AND saved-query filters.
fn merge_filters(
    request: Option<ConditionGroup>,
    saved: Option<&SavedQuery>,
) -> Option<ConditionGroup> {
    let saved = saved.and_then(|s| s.filters.clone());
    match (request, saved) {
        (Some(request), Some(saved)) => Some(ConditionGroup::and(vec![
            request.into(),
            saved.into(),
        ])),
        (request, saved) => request.or(saved),
    }
}
