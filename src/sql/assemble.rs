//! Query assembly: template + request → one parameterized statement.
//!
//! Clause order and placeholder numbering:
//!
//! ```text
//! SELECT  visible columns, then aggregations
//! FROM    primary data source
//! JOIN    one per JoinDefinition
//! WHERE   template filters ($1..), then request filters (continuing)
//! GROUP BY
//! HAVING  continuing the same numbering
//! ORDER BY request sort, else template sort (unpaginated runs)
//! ```
//!
//! Paginated runs are wrapped so one round trip returns the sorted page
//! and the total number of matching rows:
//!
//! ```text
//! WITH report_rows AS (<statement>),
//!      report_count AS (SELECT COUNT(*) AS __total_count FROM report_rows),
//!      report_page AS (SELECT report_rows.*, 1 AS __page_row FROM report_rows
//!                      ORDER BY <output columns> LIMIT n OFFSET m)
//! SELECT report_page.*, report_count.__total_count
//! FROM report_count LEFT JOIN report_page ON TRUE
//! ORDER BY <output columns>
//! ```
//!
//! The count row survives a page past the end as one row whose
//! `__page_row` is NULL. Sorting a paginated run therefore needs columns
//! present in the select list. Unpaginated runs get the plain statement
//! and no total count.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::condition::{compile_conditions, Fragment};
use super::query::{
    col, qualified_col, raw, ColumnExpr, Cte, JoinType, OrderByExpr, Query, SelectExpr, TableRef,
};
use crate::model::{
    AggregateFunction, AggregationDefinition, ColumnDefinition, ConditionGroup, ConditionNode,
    JoinKind, Logic, ParameterValues, ReportTemplate, SortDirection, SortSpec,
};
use crate::validation::{check_identifier, validate_template, ValidationError, ValidationResult};

/// Hard cap on rows per page.
pub const MAX_PAGE_SIZE: u64 = 5000;

/// Page size used when neither the request nor the template gives one.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Helper column carrying the total row count in paginated results.
pub const TOTAL_COUNT_COLUMN: &str = "__total_count";

/// Marker column set on every real row of a paginated result. NULL on the
/// count-only row returned for an empty page.
pub const PAGE_ROW_COLUMN: &str = "__page_row";

const ROWS_CTE: &str = "report_rows";
const COUNT_CTE: &str = "report_count";
const PAGE_CTE: &str = "report_page";

/// Requested page (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(alias = "pageNumber")]
    pub page: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
}

impl Pagination {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page,
            page_size: Some(page_size),
        }
    }
}

/// Runtime inputs to assembly.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub parameters: ParameterValues,
    /// Request-level filters. Columns name declared, filterable columns.
    pub filters: Option<ConditionGroup>,
    /// Request-level sort. Columns name declared, sortable columns.
    pub sorting: Vec<SortSpec>,
    pub pagination: Option<Pagination>,
}

impl QueryRequest {
    pub fn new(parameters: ParameterValues) -> Self {
        Self {
            parameters,
            ..Default::default()
        }
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
}

/// Assembly limits, normally taken from settings.
#[derive(Debug, Clone, Copy)]
pub struct AssembleOptions {
    /// Upper bound on page size; never above [`MAX_PAGE_SIZE`].
    pub max_page_size: u64,
    pub default_page_size: u64,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            max_page_size: MAX_PAGE_SIZE,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Page actually applied to a paginated statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedPage {
    pub page: u64,
    pub page_size: u64,
    pub offset: u64,
}

/// A ready-to-run statement.
#[derive(Debug, Clone)]
pub struct AssembledQuery {
    pub sql: String,
    /// Values for `$1..$n`, in order.
    pub params: Vec<Value>,
    /// Set when the statement is count-wrapped.
    pub page: Option<AppliedPage>,
    pub query: Query,
}

/// Build the statement for `template` under `request`.
///
/// Every structural check runs before any condition is compiled; on error
/// no SQL is produced.
pub fn assemble(
    template: &ReportTemplate,
    request: &QueryRequest,
    options: &AssembleOptions,
) -> ValidationResult<AssembledQuery> {
    if let Err(mut errors) = validate_template(template) {
        return Err(errors.remove(0));
    }
    let select = build_select_list(template)?;
    let request_filters = request
        .filters
        .as_ref()
        .map(|g| resolve_request_filters(template, g))
        .transpose()?;
    let sorts = resolve_sorts(template, &request.sorting)?;

    let primary = template
        .primary_source()
        .ok_or_else(|| ValidationError::NoDataSource {
            template: template.id.clone(),
        })?;
    let mut from = TableRef::new(&primary.name);
    if let Some(alias) = &primary.alias {
        from = from.with_alias(alias);
    }

    let mut query = Query::new().select(select).from(from);
    query = add_joins(query, template)?;

    // WHERE: template filters first, then request filters.
    let mut params = Vec::new();
    let mut next_index = 1;
    let mut where_parts = Vec::new();
    for group in [template.config.filters.as_ref(), request_filters.as_ref()]
        .into_iter()
        .flatten()
    {
        let fragment = compile_conditions(group, &request.parameters, next_index);
        next_index = fragment.next_index;
        if !fragment.is_empty() {
            where_parts.push((group.logic, fragment));
        }
    }
    let multiple = where_parts.len() > 1;
    for (logic, fragment) in where_parts {
        query = query.filter(&wrap_if_needed(&fragment, logic, multiple));
        params.extend(fragment.params);
    }

    if !template.config.group_by.is_empty() {
        query = query.group_by(template.config.group_by.iter().map(|c| col(c)).collect());
    }

    if let Some(having) = &template.config.having {
        let fragment = compile_conditions(having, &request.parameters, next_index);
        query = query.having(&fragment.sql);
        params.extend(fragment.params);
    }

    let (query, page) = match request.pagination {
        Some(pagination) => {
            let page = resolve_page(template, pagination, options);
            let output_sorts = sorts
                .iter()
                .map(ResolvedSort::output_sort)
                .collect::<ValidationResult<Vec<_>>>()?;
            (wrap_with_count(query, &output_sorts, &page), Some(page))
        }
        None => (
            query.order_by(sorts.iter().map(ResolvedSort::statement_order).collect()),
            None,
        ),
    };

    Ok(AssembledQuery {
        sql: query.to_sql(),
        params,
        page,
        query,
    })
}

fn wrap_if_needed(fragment: &Fragment, logic: Logic, multiple: bool) -> String {
    if multiple && logic == Logic::Or {
        format!("({})", fragment.sql)
    } else {
        fragment.sql.clone()
    }
}

fn build_select_list(template: &ReportTemplate) -> ValidationResult<Vec<SelectExpr>> {
    let mut select: Vec<SelectExpr> = template
        .visible_columns()
        .map(|c| column_select(template, c))
        .collect();
    select.extend(template.config.aggregations.iter().map(aggregation_select));

    if select.is_empty() {
        return Err(ValidationError::EmptyColumns {
            template: template.id.clone(),
        });
    }
    Ok(select)
}

/// SQL reference of a declared column: expression, `qualifier.column`, or
/// bare storage name.
fn column_reference(template: &ReportTemplate, column: &ColumnDefinition) -> ColumnExpr {
    if let Some(expression) = &column.expression {
        return raw(expression);
    }
    match &column.source {
        Some(source) => {
            let qualifier = template
                .find_source(source)
                .map(|s| s.qualifier())
                .unwrap_or(source);
            qualified_col(qualifier, column.storage_name())
        }
        None => col(column.storage_name()),
    }
}

fn column_select(template: &ReportTemplate, column: &ColumnDefinition) -> SelectExpr {
    let expr = column_reference(template, column);
    let needs_alias = !matches!(
        &expr,
        ColumnExpr::Column { qualifier: None, name } if name == &column.name
    );
    let select = SelectExpr::new(expr);
    if needs_alias {
        select.with_alias(&column.name)
    } else {
        select
    }
}

fn aggregation_select(aggregation: &AggregationDefinition) -> SelectExpr {
    let sql = match aggregation.function {
        AggregateFunction::Count => format!("COUNT({})", aggregation.column),
        AggregateFunction::CountDistinct => format!("COUNT(DISTINCT {})", aggregation.column),
        AggregateFunction::Sum => format!("SUM({})", aggregation.column),
        AggregateFunction::Avg => format!("AVG({})", aggregation.column),
        AggregateFunction::Min => format!("MIN({})", aggregation.column),
        AggregateFunction::Max => format!("MAX({})", aggregation.column),
    };
    SelectExpr::new(raw(&sql)).with_alias(&aggregation.alias)
}

fn add_joins(mut query: Query, template: &ReportTemplate) -> ValidationResult<Query> {
    let mut joined: HashSet<&str> = HashSet::new();
    if let Some(primary) = template.primary_source() {
        joined.insert(primary.qualifier());
    }

    for (i, join) in template.config.joins.iter().enumerate() {
        let resolve = |side: &str, reference: &str| {
            template
                .find_source(reference)
                .ok_or_else(|| ValidationError::UnknownSource {
                    context: format!("Join #{} ({} side)", i + 1, side),
                    source_ref: reference.to_string(),
                })
        };
        let left = resolve("left", &join.left_source)?;
        let right = resolve("right", &join.right_source)?;

        // The side not yet in the statement is the one being joined.
        let target = if joined.contains(left.qualifier()) {
            right
        } else {
            left
        };
        joined.insert(target.qualifier());

        let mut table = TableRef::new(&target.name);
        if let Some(alias) = &target.alias {
            table = table.with_alias(alias);
        }

        let mut on = format!(
            "{}.{} = {}.{}",
            left.qualifier(),
            join.left_column,
            right.qualifier(),
            join.right_column
        );
        if let Some(extra) = &join.condition {
            on = format!("{} AND ({})", on, extra);
        }

        let join_type = match join.kind {
            JoinKind::Inner => JoinType::Inner,
            JoinKind::Left => JoinType::Left,
            JoinKind::Right => JoinType::Right,
            JoinKind::Full => JoinType::Full,
        };
        query = query.join(join_type, table, Some(on));
    }

    Ok(query)
}

/// Rewrite request filter columns from external names to SQL references,
/// rejecting columns that are undeclared or not filterable.
fn resolve_request_filters(
    template: &ReportTemplate,
    group: &ConditionGroup,
) -> ValidationResult<ConditionGroup> {
    let mut conditions = Vec::with_capacity(group.conditions.len());
    for node in &group.conditions {
        conditions.push(match node {
            ConditionNode::Condition(condition) => {
                let column = template.find_column(&condition.column).ok_or_else(|| {
                    ValidationError::UnknownColumn {
                        column: condition.column.clone(),
                    }
                })?;
                if !column.filterable {
                    return Err(ValidationError::NotFilterable {
                        column: column.name.clone(),
                    });
                }
                let mut resolved = condition.clone();
                resolved.column = column_reference(template, column).to_tokens().serialize();
                ConditionNode::Condition(resolved)
            }
            ConditionNode::Group(nested) => {
                ConditionNode::Group(resolve_request_filters(template, nested)?)
            }
        });
    }
    Ok(ConditionGroup {
        logic: group.logic,
        conditions,
    })
}

/// One sort key: the reference used inside the statement, and the select
/// list name it maps to, when it maps to one.
struct ResolvedSort {
    column: String,
    output: Option<String>,
    direction: SortDirection,
}

impl ResolvedSort {
    fn statement_order(&self) -> OrderByExpr {
        order_expr(col(&self.column), self.direction)
    }

    /// Sort by select list name, for ordering outside the statement.
    fn output_sort(&self) -> ValidationResult<(String, SortDirection)> {
        match &self.output {
            Some(name) => Ok((name.clone(), self.direction)),
            None => Err(ValidationError::NotSortable {
                column: self.column.clone(),
            }),
        }
    }
}

fn order_expr(expr: ColumnExpr, direction: SortDirection) -> OrderByExpr {
    match direction {
        SortDirection::Asc => OrderByExpr::asc(expr),
        SortDirection::Desc => OrderByExpr::desc(expr),
    }
}

/// Request sort when given, else template sort.
///
/// Request sorts name declared columns that are sortable and visible.
/// Template sorts may use any safe reference; they map to a select list
/// name when they match a visible column's name or SQL reference, or an
/// aggregation alias.
fn resolve_sorts(
    template: &ReportTemplate,
    request_sort: &[SortSpec],
) -> ValidationResult<Vec<ResolvedSort>> {
    if !request_sort.is_empty() {
        return request_sort
            .iter()
            .map(|spec| {
                let column = template.find_column(&spec.column).ok_or_else(|| {
                    ValidationError::UnknownColumn {
                        column: spec.column.clone(),
                    }
                })?;
                if !column.sortable || !column.visible {
                    return Err(ValidationError::NotSortable {
                        column: column.name.clone(),
                    });
                }
                Ok(ResolvedSort {
                    column: column.name.clone(),
                    output: Some(column.name.clone()),
                    direction: spec.direction,
                })
            })
            .collect();
    }

    template
        .config
        .order_by
        .iter()
        .map(|spec| {
            check_identifier(&spec.column, "ORDER BY")?;
            Ok(ResolvedSort {
                column: spec.column.clone(),
                output: output_name(template, &spec.column),
                direction: spec.direction,
            })
        })
        .collect()
}

fn output_name(template: &ReportTemplate, reference: &str) -> Option<String> {
    template
        .visible_columns()
        .find(|c| {
            c.name == reference
                || column_reference(template, c).to_tokens().serialize() == reference
        })
        .map(|c| c.name.clone())
        .or_else(|| {
            template
                .config
                .aggregations
                .iter()
                .find(|a| a.alias == reference)
                .map(|a| a.alias.clone())
        })
}

fn resolve_page(
    template: &ReportTemplate,
    pagination: Pagination,
    options: &AssembleOptions,
) -> AppliedPage {
    let cap = options.max_page_size.clamp(1, MAX_PAGE_SIZE);
    let requested = pagination
        .page_size
        .or(template.config.pagination.page_size)
        .unwrap_or(options.default_page_size);
    let page_size = requested.clamp(1, cap);
    let page = pagination.page.max(1);
    AppliedPage {
        page,
        page_size,
        offset: (page - 1).saturating_mul(page_size),
    }
}

fn wrap_with_count(
    inner: Query,
    sorts: &[(String, SortDirection)],
    page: &AppliedPage,
) -> Query {
    let count = Query::new()
        .select(vec![
            SelectExpr::new(raw("COUNT(*)")).with_alias(TOTAL_COUNT_COLUMN)
        ])
        .from(TableRef::new(ROWS_CTE));

    let page_rows = Query::new()
        .select(vec![
            SelectExpr::new(ColumnExpr::Star {
                qualifier: Some(ROWS_CTE.into()),
            }),
            SelectExpr::new(raw("1")).with_alias(PAGE_ROW_COLUMN),
        ])
        .from(TableRef::new(ROWS_CTE))
        .order_by(
            sorts
                .iter()
                .map(|(name, dir)| order_expr(col(name), *dir))
                .collect(),
        )
        .limit(page.page_size)
        .offset(page.offset);

    Query::new()
        .with_cte(Cte::new(ROWS_CTE, inner))
        .with_cte(Cte::new(COUNT_CTE, count))
        .with_cte(Cte::new(PAGE_CTE, page_rows))
        .select(vec![
            SelectExpr::new(ColumnExpr::Star {
                qualifier: Some(PAGE_CTE.into()),
            }),
            SelectExpr::new(qualified_col(COUNT_CTE, TOTAL_COUNT_COLUMN)),
        ])
        .from(TableRef::new(COUNT_CTE))
        .join(JoinType::Left, TableRef::new(PAGE_CTE), Some("TRUE".into()))
        .order_by(
            sorts
                .iter()
                .map(|(name, dir)| order_expr(qualified_col(PAGE_CTE, name), *dir))
                .collect(),
        )
}
