//! Rows → chart payloads.
//!
//! One mapping function per chart type, selected by a match on
//! [`ChartType`]. Required mapping roles are checked before any row is
//! read; a missing role is an error, never an empty chart.
//!
//! | chart type              | roles              | payload        |
//! |-------------------------|--------------------|----------------|
//! | pie, donut, polar       | labels, values     | labels+dataset |
//! | funnel                  | labels, values     | sorted desc    |
//! | bar, line, area, radar  | x, y (+ series)    | labels+datasets|
//! | scatter                 | x, y (+ series)    | point datasets |
//! | table                   | columns            | projected rows |
//! | card                    | value (+ trend)    | first row      |
//! | gauge                   | value; config min/max | clamped     |

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::ReportError;
use crate::model::{ChartType, DataMapping, Row, TableColumn, VisualizationConfig};
use crate::value::{as_f64, as_label, is_absent, parse_date_str};

/// Errors raised while mapping rows to a chart payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    #[error("Chart type '{0}' is not supported")]
    Unsupported(ChartType),

    #[error("Chart type '{chart_type}' requires mapping field '{role}'")]
    MissingMapping {
        chart_type: ChartType,
        role: &'static str,
    },

    #[error("Gauge requires configured 'min' and 'max'")]
    MissingGaugeBounds,

    #[error("Gauge bounds are inverted: min {min} > max {max}")]
    InvertedGaugeBounds { min: f64, max: f64 },
}

impl From<MappingError> for ReportError {
    fn from(err: MappingError) -> Self {
        ReportError::Visualization(err.to_string())
    }
}

pub type MappingResult<T> = Result<T, MappingError>;

/// A rendered chart, ready for a presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub data: ChartPayload,
    pub options: Map<String, Value>,
}

/// Chart-type-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChartPayload {
    Series(SeriesData),
    Points(PointData),
    Table(TableData),
    Card(CardData),
    Gauge(GaugeData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub background_color: Vec<String>,
}

/// Category labels with one value per label in every dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointDataset {
    pub label: String,
    pub data: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointData {
    pub datasets: Vec<PointDataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableData {
    pub columns: Vec<TableColumn>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardData {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Value>,
    /// `(value - trend) / value * 100`, when the value is nonzero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeData {
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

/// Map result rows to the payload of `chart_type`.
pub fn map_rows(
    chart_type: ChartType,
    rows: &[Row],
    mapping: &DataMapping,
    config: &VisualizationConfig,
) -> MappingResult<ChartData> {
    let data = match chart_type {
        ChartType::Pie | ChartType::Donut | ChartType::Polar => {
            ChartPayload::Series(map_categorical(chart_type, rows, mapping, config, false)?)
        }
        ChartType::Funnel => {
            ChartPayload::Series(map_categorical(chart_type, rows, mapping, config, true)?)
        }
        ChartType::Bar | ChartType::Line | ChartType::Area => {
            ChartPayload::Series(map_axis(chart_type, rows, mapping, config, true)?)
        }
        ChartType::Radar => {
            ChartPayload::Series(map_axis(chart_type, rows, mapping, config, false)?)
        }
        ChartType::Scatter => ChartPayload::Points(map_scatter(chart_type, rows, mapping)?),
        ChartType::Table => ChartPayload::Table(map_table(chart_type, rows, mapping)?),
        ChartType::Card => ChartPayload::Card(map_card(chart_type, rows, mapping, config)?),
        ChartType::Gauge => ChartPayload::Gauge(map_gauge(chart_type, rows, mapping, config)?),
        ChartType::Bubble
        | ChartType::Heatmap
        | ChartType::Treemap
        | ChartType::Sankey
        | ChartType::Wordcloud => return Err(MappingError::Unsupported(chart_type)),
    };

    Ok(ChartData {
        chart_type,
        data,
        options: build_options(chart_type, config),
    })
}

fn require<'a, T: ?Sized>(
    chart_type: ChartType,
    role: &'static str,
    field: Option<&'a T>,
) -> MappingResult<&'a T> {
    field.ok_or(MappingError::MissingMapping { chart_type, role })
}

fn cell_f64(row: &Row, field: &str) -> f64 {
    row.get(field).and_then(as_f64).unwrap_or(0.0)
}

fn cell_label(row: &Row, field: &str) -> String {
    row.get(field).map(as_label).unwrap_or_default()
}

fn map_categorical(
    chart_type: ChartType,
    rows: &[Row],
    mapping: &DataMapping,
    config: &VisualizationConfig,
    sort_descending: bool,
) -> MappingResult<SeriesData> {
    let labels_field = require(chart_type, "labels", mapping.labels.as_deref())?;
    let values_field = require(chart_type, "values", mapping.values.as_deref())?;

    let mut pairs: Vec<(String, f64)> = rows
        .iter()
        .map(|row| (cell_label(row, labels_field), cell_f64(row, values_field)))
        .collect();
    if sort_descending {
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
    }

    let (labels, data): (Vec<String>, Vec<f64>) = pairs.into_iter().unzip();
    let background_color = if config.colors.is_empty() {
        vec![]
    } else {
        config.colors.iter().cycle().take(data.len()).cloned().collect()
    };

    Ok(SeriesData {
        labels,
        datasets: vec![Dataset {
            label: values_field.to_string(),
            data,
            background_color,
        }],
    })
}

fn y_fields<'a>(chart_type: ChartType, mapping: &'a DataMapping) -> MappingResult<Vec<&'a str>> {
    let fields = require(chart_type, "y", mapping.y.as_ref())?.fields();
    if fields.is_empty() {
        return Err(MappingError::MissingMapping {
            chart_type,
            role: "y",
        });
    }
    Ok(fields)
}

fn series_label(mapping: &DataMapping, index: usize, field: &str) -> String {
    mapping
        .series
        .get(index)
        .cloned()
        .unwrap_or_else(|| field.to_string())
}

fn map_axis(
    chart_type: ChartType,
    rows: &[Row],
    mapping: &DataMapping,
    config: &VisualizationConfig,
    sort_dates: bool,
) -> MappingResult<SeriesData> {
    let x_field = require(chart_type, "x", mapping.x.as_deref())?;
    let fields = y_fields(chart_type, mapping)?;

    // Distinct x values in first-seen order, each with its first row.
    let mut labels = Vec::new();
    let mut first_row: HashMap<String, &Row> = HashMap::new();
    for row in rows {
        if is_absent(row.get(x_field)) {
            continue;
        }
        let label = cell_label(row, x_field);
        if !first_row.contains_key(&label) {
            first_row.insert(label.clone(), row);
            labels.push(label);
        }
    }

    if sort_dates && !labels.is_empty() {
        let parsed: Option<Vec<_>> = labels.iter().map(|l| parse_date_str(l)).collect();
        if let Some(instants) = parsed {
            let mut keyed: Vec<_> = instants.into_iter().zip(labels).collect();
            keyed.sort_by_key(|(instant, _)| *instant);
            labels = keyed.into_iter().map(|(_, label)| label).collect();
        }
    }

    let datasets = fields
        .iter()
        .enumerate()
        .map(|(i, field)| Dataset {
            label: series_label(mapping, i, field),
            data: labels
                .iter()
                .map(|label| {
                    first_row
                        .get(label)
                        .map_or(0.0, |row| cell_f64(row, field))
                })
                .collect(),
            background_color: config
                .colors
                .get(i % config.colors.len().max(1))
                .cloned()
                .into_iter()
                .collect(),
        })
        .collect();

    Ok(SeriesData { labels, datasets })
}

fn map_scatter(
    chart_type: ChartType,
    rows: &[Row],
    mapping: &DataMapping,
) -> MappingResult<PointData> {
    let x_field = require(chart_type, "x", mapping.x.as_deref())?;
    let fields = y_fields(chart_type, mapping)?;

    let datasets = fields
        .iter()
        .enumerate()
        .map(|(i, field)| PointDataset {
            label: series_label(mapping, i, field),
            data: rows
                .iter()
                .filter_map(|row| {
                    let x = row.get(x_field).and_then(as_f64)?;
                    let y = row.get(*field).and_then(as_f64)?;
                    Some(Point { x, y })
                })
                .collect(),
        })
        .collect();

    Ok(PointData { datasets })
}

fn map_table(chart_type: ChartType, rows: &[Row], mapping: &DataMapping) -> MappingResult<TableData> {
    if mapping.columns.is_empty() {
        return Err(MappingError::MissingMapping {
            chart_type,
            role: "columns",
        });
    }

    let columns: Vec<TableColumn> = mapping
        .columns
        .iter()
        .map(|c| TableColumn {
            field: c.field.clone(),
            title: if c.title.is_empty() {
                c.field.clone()
            } else {
                c.title.clone()
            },
            format: c.format.clone(),
        })
        .collect();

    let rows: Vec<Row> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| (c.field.clone(), row.get(&c.field).cloned().unwrap_or(Value::Null)))
                .collect::<Row>()
        })
        .collect();

    Ok(TableData { columns, rows })
}

fn map_card(
    chart_type: ChartType,
    rows: &[Row],
    mapping: &DataMapping,
    config: &VisualizationConfig,
) -> MappingResult<CardData> {
    let value_field = require(chart_type, "value", mapping.value.as_deref())?;
    let first = rows.first();

    let value = first
        .and_then(|row| row.get(value_field))
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| json!(0));
    let trend = mapping
        .trend
        .as_deref()
        .and_then(|field| first.and_then(|row| row.get(field)))
        .filter(|v| !v.is_null())
        .cloned();

    let trend_percentage = match (as_f64(&value), trend.as_ref().and_then(as_f64)) {
        (Some(current), Some(previous)) if current != 0.0 => {
            Some((current - previous) / current * 100.0)
        }
        _ => None,
    };

    Ok(CardData {
        value,
        trend,
        trend_percentage,
        format: config.format.clone(),
    })
}

fn map_gauge(
    chart_type: ChartType,
    rows: &[Row],
    mapping: &DataMapping,
    config: &VisualizationConfig,
) -> MappingResult<GaugeData> {
    let value_field = require(chart_type, "value", mapping.value.as_deref())?;
    let (Some(min), Some(max)) = (config.min, config.max) else {
        return Err(MappingError::MissingGaugeBounds);
    };
    if min > max {
        return Err(MappingError::InvertedGaugeBounds { min, max });
    }

    let raw = rows
        .first()
        .and_then(|row| row.get(value_field))
        .and_then(as_f64)
        .unwrap_or(min);

    Ok(GaugeData {
        value: raw.clamp(min, max),
        min,
        max,
    })
}

fn build_options(chart_type: ChartType, config: &VisualizationConfig) -> Map<String, Value> {
    let mut options = Map::new();
    if let Some(title) = &config.title {
        options.insert("title".into(), json!(title));
    }
    if let Some(show_legend) = config.show_legend {
        options.insert("showLegend".into(), json!(show_legend));
    }
    if let Some(stacked) = config.stacked {
        options.insert("stacked".into(), json!(stacked));
    }
    if let Some(format) = &config.format {
        options.insert("format".into(), json!(format));
    }

    match chart_type {
        ChartType::Donut => {
            options.insert("cutout".into(), json!("50%"));
        }
        ChartType::Pie => {
            options.insert("cutout".into(), json!(0));
        }
        _ => {}
    }

    // Explicit options win over derived ones.
    for (key, value) in &config.options {
        options.insert(key.clone(), value.clone());
    }
    options
}
