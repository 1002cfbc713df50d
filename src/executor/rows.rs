//! Result shaping: external column names, the total-count helper column,
//! and column metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{ColumnDefinition, DataType, ReportTemplate, Row, StyleRule};
use crate::sql::{PAGE_ROW_COLUMN, TOTAL_COUNT_COLUMN};

/// Presentation metadata for one visible column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    pub display_name: String,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub sortable: bool,
    pub filterable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<StyleRule>,
}

impl From<&ColumnDefinition> for ColumnMetadata {
    fn from(column: &ColumnDefinition) -> Self {
        Self {
            name: column.name.clone(),
            display_name: if column.display_name.is_empty() {
                column.name.clone()
            } else {
                column.display_name.clone()
            },
            data_type: column.data_type,
            format: column.format.clone(),
            sortable: column.sortable,
            filterable: column.filterable,
            styles: column.styles.clone(),
        }
    }
}

/// Metadata for the template's visible columns, in declaration order.
pub fn column_metadata(template: &ReportTemplate) -> Vec<ColumnMetadata> {
    template.visible_columns().map(ColumnMetadata::from).collect()
}

/// Rows with storage names replaced by declared names, plus the total
/// count when the statement carried one.
pub(crate) struct ShapedRows {
    pub rows: Vec<Row>,
    pub total_count: Option<u64>,
}

/// Re-key rows onto declared names and strip the paging helper columns.
///
/// Keys are matched exactly, then by storage column name, then
/// case-insensitively. Unmatched keys pass through unchanged. A row whose
/// page marker is NULL only carries the count and is dropped.
pub(crate) fn shape_rows(template: &ReportTemplate, raw: Vec<Row>) -> ShapedRows {
    let mut total_count = None;
    let mut rows = Vec::with_capacity(raw.len());
    for row in raw {
        let mut shaped = Row::with_capacity(row.len());
        let mut count_only = false;
        for (key, value) in row {
            if key == TOTAL_COUNT_COLUMN {
                if total_count.is_none() {
                    total_count = count_value(&value);
                }
                continue;
            }
            if key == PAGE_ROW_COLUMN {
                count_only = value.is_null();
                continue;
            }
            shaped.insert(external_name(template, &key), value);
        }
        if !count_only {
            rows.push(shaped);
        }
    }

    ShapedRows { rows, total_count }
}

fn external_name(template: &ReportTemplate, key: &str) -> String {
    let declared = || {
        template
            .config
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .chain(template.config.aggregations.iter().map(|a| a.alias.as_str()))
    };

    if let Some(name) = declared().find(|name| *name == key) {
        return name.to_string();
    }
    if let Some(column) = template
        .config
        .columns
        .iter()
        .find(|c| c.storage_name() == key)
    {
        return column.name.clone();
    }
    declared()
        .find(|name| name.eq_ignore_ascii_case(key))
        .unwrap_or(key)
        .to_string()
}

fn count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
