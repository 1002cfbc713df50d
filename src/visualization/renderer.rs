//! Component rendering: resolve the data source, fetch rows, map them.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::mapper::{map_rows, ChartData};
use super::raw_query::prepare_raw_query;
use crate::auth::{can_access, AuthorizationPort};
use crate::config::RawQuerySettings;
use crate::error::{ReportError, ReportResult};
use crate::executor::{ExecuteRequest, ReportExecutor};
use crate::model::{ParameterValues, Row, SourceSpec, VisualizationComponent};
use crate::store::{QueryStorage, ReportCatalog};

/// Renders stored visualization components to chart payloads.
pub struct VisualizationRenderer {
    catalog: Arc<dyn ReportCatalog>,
    storage: Arc<dyn QueryStorage>,
    auth: Arc<dyn AuthorizationPort>,
    executor: Arc<ReportExecutor>,
    raw_query: RawQuerySettings,
}

impl VisualizationRenderer {
    pub fn new(
        catalog: Arc<dyn ReportCatalog>,
        storage: Arc<dyn QueryStorage>,
        auth: Arc<dyn AuthorizationPort>,
        executor: Arc<ReportExecutor>,
    ) -> Self {
        Self {
            catalog,
            storage,
            auth,
            executor,
            raw_query: RawQuerySettings::default(),
        }
    }

    pub fn with_raw_query_settings(mut self, settings: RawQuerySettings) -> Self {
        self.raw_query = settings;
        self
    }

    /// Load and render a stored component.
    pub async fn render(
        &self,
        component_id: &str,
        parameters: ParameterValues,
        requester_id: &str,
    ) -> ReportResult<ChartData> {
        let component = self
            .catalog
            .get_visualization_component(component_id)
            .await?
            .ok_or_else(|| ReportError::not_found("Visualization component", component_id))?;

        self.render_component(&component, parameters, requester_id)
            .await
    }

    /// Render an already-loaded component.
    pub async fn render_component(
        &self,
        component: &VisualizationComponent,
        parameters: ParameterValues,
        requester_id: &str,
    ) -> ReportResult<ChartData> {
        if !can_access(
            self.auth.as_ref(),
            &component.owner_id,
            component.is_public,
            requester_id,
        )
        .await
        {
            return Err(ReportError::Authorization(format!(
                "user '{}' may not view component '{}'",
                requester_id, component.id
            )));
        }

        let source = &component.data_source.source;
        info!(
            component_id = %component.id,
            source = source.kind(),
            chart_type = %component.chart_type,
            "rendering visualization"
        );

        let rows = self
            .fetch_rows(component, source, parameters, requester_id)
            .await?;

        Ok(map_rows(
            component.chart_type,
            &rows,
            &component.data_source.mapping,
            &component.config,
        )?)
    }

    async fn fetch_rows(
        &self,
        component: &VisualizationComponent,
        source: &SourceSpec,
        parameters: ParameterValues,
        requester_id: &str,
    ) -> ReportResult<Vec<Row>> {
        match source {
            SourceSpec::Report {
                report_id,
                parameters: defaults,
            }
            | SourceSpec::CustomReport {
                report_id,
                parameters: defaults,
            } => {
                let request = ExecuteRequest::new(report_id, requester_id)
                    .with_parameters(merge_parameters(defaults, parameters));
                Ok(self.executor.execute(request).await?.data)
            }
            SourceSpec::RawQuery {
                query,
                parameters: defaults,
            } => {
                self.check_raw_query_allowed(component).await?;
                warn!(
                    component_id = %component.id,
                    "executing raw query data source (reduced trust)"
                );
                let prepared = prepare_raw_query(query, &merge_parameters(defaults, parameters))?;
                Ok(self.storage.query(&prepared.sql, &prepared.params).await?)
            }
            SourceSpec::StaticData { data } => static_rows(data),
            SourceSpec::Api { endpoint } => Err(ReportError::Visualization(format!(
                "api data sources are not implemented (endpoint '{}')",
                endpoint
            ))),
        }
    }

    async fn check_raw_query_allowed(&self, component: &VisualizationComponent) -> ReportResult<()> {
        if !self.raw_query.enabled {
            return Err(ReportError::Visualization(
                "raw query data sources are disabled".into(),
            ));
        }
        if self.raw_query.admin_only && !self.auth.is_admin(&component.owner_id).await {
            return Err(ReportError::Authorization(format!(
                "raw query on component '{}' requires an administrator owner",
                component.id
            )));
        }
        Ok(())
    }
}

/// Component defaults overlaid with request values.
fn merge_parameters(defaults: &ParameterValues, request: ParameterValues) -> ParameterValues {
    let mut merged = defaults.clone();
    merged.extend(request);
    merged
}

fn static_rows(data: &[Value]) -> ReportResult<Vec<Row>> {
    data.iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_object().cloned().ok_or_else(|| {
                ReportError::Visualization(format!("static data entry {} is not an object", i))
            })
        })
        .collect()
}
