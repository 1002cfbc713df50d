#[path = "../support/mod.rs"]
mod support;

#[cfg(test)]
mod tests {
    use reportkit::model::{
        AggregateFunction, AggregationDefinition, ColumnDefinition, Condition, ConditionGroup,
        DataSource, JoinDefinition, JoinKind, Operator, ParameterDefinition, ParameterType,
        ReportTemplate, SortSpec,
    };
    use reportkit::sql::{
        assemble, validate_sql, AssembleOptions, Pagination, QueryRequest, MAX_PAGE_SIZE,
    };
    use reportkit::validation::{validate_template, ValidationError};
    use serde_json::json;

    use super::support::{transactions_template, values};

    /// Scenario template: bare `id`/`amount` columns over an accounts join.
    fn scenario_template() -> ReportTemplate {
        let mut template = ReportTemplate::new(
            "tx",
            "Transactions",
            DataSource::table("transactions"),
        );
        template.data_sources.push(DataSource::table("accounts"));
        template.config.columns = vec![ColumnDefinition::new("id"), ColumnDefinition::new("amount")];
        template.config.joins = vec![JoinDefinition {
            left_source: "accounts".into(),
            left_column: "id".into(),
            right_source: "transactions".into(),
            right_column: "account_id".into(),
            kind: JoinKind::Inner,
            condition: None,
        }];
        template.config.filters = Some(ConditionGroup::and(vec![Condition::new(
            "status",
            Operator::Eq,
        )
        .with_parameter("status")
        .into()]));
        template.parameters = vec![ParameterDefinition::new("status", ParameterType::Text)];
        template
    }

    fn options() -> AssembleOptions {
        AssembleOptions::default()
    }

    #[test]
    fn test_scenario_parameter_ref_where() {
        let request = QueryRequest::new(values(json!({"status": "active"})));
        let assembled = assemble(&scenario_template(), &request, &options()).unwrap();

        assert_eq!(
            assembled.sql,
            "SELECT\n  id,\n  amount\nFROM transactions\nINNER JOIN accounts ON accounts.id = transactions.account_id\nWHERE status = $1"
        );
        assert_eq!(assembled.params, vec![json!("active")]);
        assert!(assembled.page.is_none());
        validate_sql(&assembled.sql).unwrap();
    }

    #[test]
    fn test_empty_in_filter_emits_no_where() {
        let mut template = scenario_template();
        template.config.filters = Some(ConditionGroup::and(vec![Condition::new(
            "type",
            Operator::In,
        )
        .with_value(json!([]))
        .into()]));

        let assembled = assemble(&template, &QueryRequest::default(), &options()).unwrap();
        assert!(!assembled.sql.contains("WHERE"));
        assert!(assembled.params.is_empty());
    }

    #[test]
    fn test_aliases_and_storage_names() {
        let assembled = assemble(
            &transactions_template(),
            &QueryRequest::new(values(json!({"status": "active"}))),
            &options(),
        )
        .unwrap();

        assert!(assembled.sql.contains("FROM transactions AS t"));
        assert!(assembled.sql.contains("a.name AS accountName"));
        assert!(assembled.sql.contains("t.created_at AS createdAt"));
        assert!(!assembled.sql.contains("accountId"));
        assert!(assembled
            .sql
            .contains("INNER JOIN accounts AS a ON a.id = t.account_id"));
        validate_sql(&assembled.sql).unwrap();
    }

    #[test]
    fn test_request_filters_continue_numbering() {
        let request = QueryRequest::new(values(json!({"status": "active", "minAmount": 10})))
            .with_filters(ConditionGroup::or(vec![
                Condition::new("amount", Operator::Lt)
                    .with_value(json!(500))
                    .into(),
                Condition::new("status", Operator::In)
                    .with_value(json!(["a", "b"]))
                    .into(),
            ]));
        let assembled = assemble(&transactions_template(), &request, &options()).unwrap();

        assert!(assembled.sql.contains(
            "WHERE t.status = $1 AND t.amount >= $2 AND (t.amount < $3 OR t.status IN ($4, $5))"
        ));
        assert_eq!(
            assembled.params,
            vec![json!("active"), json!(10), json!(500), json!("a"), json!("b")]
        );
        validate_sql(&assembled.sql).unwrap();
    }

    #[test]
    fn test_request_filter_on_non_filterable_column() {
        let request = QueryRequest::default().with_filters(ConditionGroup::and(vec![
            Condition::new("createdAt", Operator::Eq)
                .with_value(json!("2024-01-01"))
                .into(),
        ]));
        let err = assemble(&transactions_template(), &request, &options()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotFilterable {
                column: "createdAt".into()
            }
        );
    }

    #[test]
    fn test_request_sort_overrides_template_sort() {
        let request = QueryRequest::new(values(json!({"status": "active"})))
            .with_sorting(vec![SortSpec::desc("createdAt"), SortSpec::asc("amount")]);
        let assembled = assemble(&transactions_template(), &request, &options()).unwrap();

        assert!(assembled
            .sql
            .ends_with("ORDER BY createdAt DESC, amount ASC"));
        assert!(!assembled.sql.contains("t.id ASC"));
    }

    #[test]
    fn test_request_sort_on_non_sortable_column() {
        let request = QueryRequest::default().with_sorting(vec![SortSpec::asc("status")]);
        let err = assemble(&transactions_template(), &request, &options()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotSortable {
                column: "status".into()
            }
        );
    }

    #[test]
    fn test_sort_direction_normalized_from_json() {
        let sorting: Vec<SortSpec> = serde_json::from_value(json!([
            {"column": "amount", "direction": "Desc"},
            {"column": "createdAt", "direction": "sideways"}
        ]))
        .unwrap();
        let request = QueryRequest::default().with_sorting(sorting);
        let assembled = assemble(&transactions_template(), &request, &options()).unwrap();

        assert!(assembled.sql.ends_with("ORDER BY amount DESC, createdAt ASC"));
    }

    #[test]
    fn test_pagination_wraps_with_count() {
        let request = QueryRequest::new(values(json!({"status": "active"})))
            .with_pagination(Pagination::new(3, 25));
        let assembled = assemble(&transactions_template(), &request, &options()).unwrap();

        assert!(assembled.sql.starts_with("WITH report_rows AS (\nSELECT"));
        assert!(assembled
            .sql
            .contains("report_count AS (\nSELECT\n  COUNT(*) AS __total_count\nFROM report_rows\n)"));
        assert!(assembled.sql.contains(
            "report_page AS (\nSELECT\n  report_rows.*,\n  1 AS __page_row\nFROM report_rows\nORDER BY id ASC\nLIMIT 25 OFFSET 50\n)"
        ));
        assert!(assembled.sql.ends_with(
            "SELECT\n  report_page.*,\n  report_count.__total_count\nFROM report_count\nLEFT JOIN report_page ON TRUE\nORDER BY report_page.id ASC"
        ));
        assert!(!assembled.sql.contains("t.id ASC"));
        let page = assembled.page.unwrap();
        assert_eq!((page.page_size, page.offset), (25, 50));
        validate_sql(&assembled.sql).unwrap();
    }

    #[test]
    fn test_paginated_request_sort_orders_the_page() {
        let request = QueryRequest::new(values(json!({"status": "active"})))
            .with_sorting(vec![SortSpec::desc("amount")])
            .with_pagination(Pagination::new(1, 3));
        let assembled = assemble(&transactions_template(), &request, &options()).unwrap();

        assert!(assembled
            .sql
            .contains("FROM report_rows\nORDER BY amount DESC\nLIMIT 3 OFFSET 0"));
        assert!(assembled.sql.ends_with("ORDER BY report_page.amount DESC"));
        validate_sql(&assembled.sql).unwrap();
    }

    #[test]
    fn test_request_sort_on_hidden_column() {
        let mut template = transactions_template();
        template.config.columns[5].sortable = true;
        let request = QueryRequest::new(values(json!({"status": "active"})))
            .with_sorting(vec![SortSpec::desc("accountId")]);

        let err = assemble(&template, &request, &options()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotSortable {
                column: "accountId".into()
            }
        );
    }

    #[test]
    fn test_paginated_template_sort_outside_select_list() {
        let mut template = transactions_template();
        template.config.order_by = vec![SortSpec::asc("t.account_id")];
        let params = values(json!({"status": "active"}));

        let plain = assemble(&template, &QueryRequest::new(params.clone()), &options()).unwrap();
        assert!(plain.sql.ends_with("ORDER BY t.account_id ASC"));

        let paged = QueryRequest::new(params).with_pagination(Pagination::new(1, 10));
        let err = assemble(&template, &paged, &options()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotSortable {
                column: "t.account_id".into()
            }
        );
    }

    #[test]
    fn test_page_size_clamped_to_hard_cap() {
        let request = QueryRequest::default().with_pagination(Pagination::new(1, 50_000));
        let assembled = assemble(&scenario_template(), &request, &options()).unwrap();

        assert!(assembled
            .sql
            .contains(&format!("LIMIT {} OFFSET 0", MAX_PAGE_SIZE)));
        assert_eq!(assembled.page.unwrap().page_size, MAX_PAGE_SIZE);
        assert!(assembled.sql.ends_with("LEFT JOIN report_page ON TRUE"));
    }

    #[test]
    fn test_configured_cap_lowers_page_size() {
        let options = AssembleOptions {
            max_page_size: 100,
            default_page_size: 20,
        };
        let request = QueryRequest::default().with_pagination(Pagination::new(2, 1000));
        let assembled = assemble(&scenario_template(), &request, &options).unwrap();

        assert!(assembled.sql.contains("LIMIT 100 OFFSET 100"));
    }

    #[test]
    fn test_group_by_having_and_aggregations() {
        let mut template = ReportTemplate::new("by_status", "By status", DataSource::table("orders"));
        template.config.columns = vec![ColumnDefinition::new("status")];
        template.config.aggregations = vec![
            AggregationDefinition {
                function: AggregateFunction::Sum,
                column: "amount".into(),
                alias: "total".into(),
            },
            AggregationDefinition {
                function: AggregateFunction::CountDistinct,
                column: "customer_id".into(),
                alias: "customers".into(),
            },
        ];
        template.config.filters = Some(ConditionGroup::and(vec![Condition::new(
            "region",
            Operator::Eq,
        )
        .with_value(json!("EU"))
        .into()]));
        template.config.group_by = vec!["status".into()];
        template.config.having = Some(ConditionGroup::and(vec![Condition::new(
            "SUM(amount)",
            Operator::Gt,
        )
        .with_value(json!(1000))
        .into()]));

        let assembled = assemble(&template, &QueryRequest::default(), &options()).unwrap();

        assert_eq!(
            assembled.sql,
            "SELECT\n  status,\n  SUM(amount) AS total,\n  COUNT(DISTINCT customer_id) AS customers\nFROM orders\nWHERE region = $1\nGROUP BY status\nHAVING SUM(amount) > $2"
        );
        assert_eq!(assembled.params, vec![json!("EU"), json!(1000)]);
        validate_sql(&assembled.sql).unwrap();
    }

    #[test]
    fn test_expression_column_and_join_condition() {
        let mut template = scenario_template();
        template.config.columns.push(
            ColumnDefinition::new("fee").with_expression("ROUND(transactions.amount * 0.01, 2)"),
        );
        template.config.joins[0].kind = JoinKind::Left;
        template.config.joins[0].condition = Some("accounts.closed_at IS NULL".into());

        let assembled = assemble(&template, &QueryRequest::default(), &options()).unwrap();

        assert!(assembled
            .sql
            .contains("ROUND(transactions.amount * 0.01, 2) AS fee"));
        assert!(assembled.sql.contains(
            "LEFT JOIN accounts ON accounts.id = transactions.account_id AND (accounts.closed_at IS NULL)"
        ));
    }

    #[test]
    fn test_unknown_join_source_fails_before_sql() {
        let mut template = scenario_template();
        template.config.joins[0].right_source = "ledger".into();

        let err = assemble(
            &template,
            &QueryRequest::new(values(json!({"status": "active"}))),
            &options(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ValidationError::UnknownSource { ref source_ref, .. } if source_ref == "ledger"
        ));
    }

    #[test]
    fn test_empty_columns_fails() {
        let mut template = scenario_template();
        template.config.columns.clear();

        let err = assemble(&template, &QueryRequest::default(), &options()).unwrap_err();
        assert!(matches!(err, ValidationError::EmptyColumns { .. }));
    }

    #[test]
    fn test_injection_in_identifier_rejected() {
        let mut template = scenario_template();
        template.config.order_by = vec![SortSpec::asc("id; DROP TABLE accounts")];

        let errors = validate_template(&template).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ValidationError::InvalidIdentifier { ref identifier, .. } if identifier == "id; DROP TABLE accounts"
        ));

        let err = assemble(&template, &QueryRequest::default(), &options()).unwrap_err();
        assert_eq!(err, errors[0]);
    }

    #[test]
    fn test_values_never_in_sql_text() {
        let hostile = "x'); DROP TABLE accounts; --";
        let assembled = assemble(
            &scenario_template(),
            &QueryRequest::new(values(json!({"status": hostile}))),
            &options(),
        )
        .unwrap();

        assert!(!assembled.sql.contains("DROP"));
        assert_eq!(assembled.params, vec![json!(hostile)]);
    }
}
