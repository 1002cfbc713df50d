//! Report template definitions: sources, columns, joins and query config.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::condition::ConditionGroup;
use super::parameter::ParameterDefinition;

/// Declared data type of a report column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    Datetime,
    Json,
    Array,
}

/// Kind of relation a data source points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Table,
    View,
}

/// A relation the report reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(rename = "type", default)]
    pub kind: SourceKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl DataSource {
    pub fn table(name: &str) -> Self {
        Self {
            kind: SourceKind::Table,
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Whether `reference` names this source, by alias or by name.
    pub fn matches(&self, reference: &str) -> bool {
        self.name == reference || self.alias.as_deref() == Some(reference)
    }

    /// Name used to qualify columns of this source.
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Conditional styling applied by presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    pub operator: super::condition::Operator,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub style: Value,
}

/// A column of the report output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    /// External name, used as the output alias.
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub data_type: DataType,
    /// Source (name or alias) the column is read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Storage column name when it differs from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Raw SQL expression; takes precedence over `source`/`column`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub groupable: bool,
    #[serde(default)]
    pub aggregatable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<StyleRule>,
}

fn default_true() -> bool {
    true
}

impl ColumnDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            display_name: name.into(),
            data_type: DataType::String,
            source: None,
            column: None,
            expression: None,
            visible: true,
            sortable: false,
            filterable: false,
            groupable: false,
            aggregatable: false,
            format: None,
            styles: vec![],
        }
    }

    pub fn from_source(mut self, source: &str) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_column(mut self, column: &str) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_expression(mut self, expression: &str) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    /// Storage-layer column name.
    pub fn storage_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Kind of join between two sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

/// `left.column = right.column` join between two declared sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinDefinition {
    pub left_source: String,
    pub left_column: String,
    pub right_source: String,
    pub right_column: String,
    #[serde(default, rename = "type")]
    pub kind: JoinKind,
    /// Extra boolean condition appended to the ON clause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Sort direction as written in definitions and requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY entry.
///
/// Direction is normalized on input: anything other than `desc`
/// (in any letter case) sorts ascending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl<'de> Deserialize<'de> for SortSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            column: String,
            #[serde(default)]
            direction: Option<String>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let direction = match raw.direction.as_deref().map(str::to_ascii_lowercase) {
            Some(d) if d == "desc" => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        Ok(SortSpec {
            column: raw.column,
            direction,
        })
    }
}

impl SortSpec {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Aggregate function of a template-level aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
}

/// An aggregate appended to the select list: `FUNC(column) AS alias`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationDefinition {
    pub function: AggregateFunction,
    pub column: String,
    pub alias: String,
}

/// Default paging for a template.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
}

/// Query shape of a report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub joins: Vec<JoinDefinition>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub having: Option<ConditionGroup>,
    #[serde(default)]
    pub order_by: Vec<SortSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<ConditionGroup>,
    #[serde(default)]
    pub aggregations: Vec<AggregationDefinition>,
    #[serde(default)]
    pub pagination: PaginationDefaults,
}

/// A declarative tabular report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTemplate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// First entry is the primary (FROM) source.
    pub data_sources: Vec<DataSource>,
    pub config: ReportConfig,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
}

impl ReportTemplate {
    pub fn new(id: &str, name: &str, primary: DataSource) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            data_sources: vec![primary],
            config: ReportConfig::default(),
            owner_id: String::new(),
            is_public: false,
            parameters: vec![],
        }
    }

    pub fn primary_source(&self) -> Option<&DataSource> {
        self.data_sources.first()
    }

    /// Resolve a source reference (alias or name) to its declaration.
    pub fn find_source(&self, reference: &str) -> Option<&DataSource> {
        self.data_sources.iter().find(|s| s.matches(reference))
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.config.columns.iter().find(|c| c.name == name)
    }

    pub fn find_parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.config.columns.iter().filter(|c| c.visible)
    }
}
