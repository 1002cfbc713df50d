//! Dashboard components: chart type, display config, data binding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Chart type of a visualization component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Donut,
    Area,
    Scatter,
    Bubble,
    Radar,
    Polar,
    Table,
    Card,
    Gauge,
    Heatmap,
    Treemap,
    Funnel,
    Sankey,
    Wordcloud,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
            ChartType::Donut => "donut",
            ChartType::Area => "area",
            ChartType::Scatter => "scatter",
            ChartType::Bubble => "bubble",
            ChartType::Radar => "radar",
            ChartType::Polar => "polar",
            ChartType::Table => "table",
            ChartType::Card => "card",
            ChartType::Gauge => "gauge",
            ChartType::Heatmap => "heatmap",
            ChartType::Treemap => "treemap",
            ChartType::Funnel => "funnel",
            ChartType::Sankey => "sankey",
            ChartType::Wordcloud => "wordcloud",
        }
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field name or a list of field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldList {
    One(String),
    Many(Vec<String>),
}

impl FieldList {
    pub fn fields(&self) -> Vec<&str> {
        match self {
            FieldList::One(f) => vec![f.as_str()],
            FieldList::Many(fs) => fs.iter().map(String::as_str).collect(),
        }
    }
}

/// Column descriptor of a table component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    pub field: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Semantic roles mapped onto result column names.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<FieldList>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<TableColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<String>,
}

/// Display options; chart types read the fields that apply to them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_legend: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Renderer-specific options passed through untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

/// Where a component gets its rows from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SourceSpec {
    Report {
        #[serde(rename = "reportId")]
        report_id: String,
        #[serde(default)]
        parameters: Map<String, Value>,
    },
    CustomReport {
        #[serde(rename = "reportId")]
        report_id: String,
        #[serde(default)]
        parameters: Map<String, Value>,
    },
    /// Stored query text with `$name` tokens. Reduced-trust path.
    RawQuery {
        query: String,
        #[serde(default)]
        parameters: Map<String, Value>,
    },
    #[serde(alias = "static")]
    StaticData {
        #[serde(default)]
        data: Vec<Value>,
    },
    Api { endpoint: String },
}

impl SourceSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceSpec::Report { .. } => "report",
            SourceSpec::CustomReport { .. } => "custom-report",
            SourceSpec::RawQuery { .. } => "raw-query",
            SourceSpec::StaticData { .. } => "static-data",
            SourceSpec::Api { .. } => "api",
        }
    }
}

/// Data binding of a component: the source plus its field mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationDataSource {
    pub source: SourceSpec,
    #[serde(default)]
    pub mapping: DataMapping,
}

/// A chart/table/card/gauge definition bound to a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationComponent {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    #[serde(default)]
    pub config: VisualizationConfig,
    pub data_source: VisualizationDataSource,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub is_public: bool,
}
