#[path = "../support/mod.rs"]
mod support;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reportkit::config::EngineSettings;
    use reportkit::model::{
        Condition, ConditionGroup, ExecutionStatus, Operator, SortSpec,
    };
    use reportkit::sql::Pagination;
    use reportkit::store::ReportCatalog;
    use reportkit::validation::ValidationError;
    use reportkit::{ErrorKind, ExecuteRequest, ReportError, ReportExecutor};
    use serde_json::json;

    use super::support::{
        executor, saved_query, seeded_store, values, BrokenHistoryCatalog, FailingStorage,
        FakeAuth, ADMIN, OWNER, STRANGER,
    };

    fn ids(rows: &[reportkit::model::Row]) -> Vec<i64> {
        rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    fn active_request(user: &str) -> ExecuteRequest {
        ExecuteRequest::new("transactions", user)
            .with_parameters(values(json!({"status": "active"})))
    }

    #[tokio::test]
    async fn test_owner_runs_report() {
        let store = seeded_store().await;
        let response = executor(&store).execute(active_request(OWNER)).await.unwrap();

        assert_eq!(ids(&response.data), vec![1, 2, 4, 5]);
        assert_eq!(response.total_count, None);
        assert_eq!(response.execution.status, ExecutionStatus::Success);
        assert_eq!(response.execution.row_count, 4);
        assert_eq!(response.execution.executed_by, OWNER);
    }

    #[tokio::test]
    async fn test_rows_keyed_by_declared_names() {
        let store = seeded_store().await;
        let response = executor(&store).execute(active_request(OWNER)).await.unwrap();

        let first = &response.data[0];
        assert_eq!(first["accountName"], json!("Alpha"));
        assert_eq!(first["createdAt"], json!("2024-01-05"));
        assert_eq!(first["amount"], json!(100.0));
        assert!(!first.contains_key("accountId"));
        assert!(!first.contains_key("__total_count"));
    }

    #[tokio::test]
    async fn test_column_metadata_excludes_hidden() {
        let store = seeded_store().await;
        let response = executor(&store).execute(active_request(OWNER)).await.unwrap();

        let names: Vec<&str> = response.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["id", "accountName", "amount", "status", "createdAt"]
        );
        assert!(response.columns[2].sortable && response.columns[2].filterable);
    }

    #[tokio::test]
    async fn test_paginated_sorted_page() {
        let store = seeded_store().await;
        let request = active_request(OWNER)
            .with_sorting(vec![SortSpec::desc("createdAt")])
            .with_pagination(Pagination::new(1, 2));

        let response = executor(&store).execute(request).await.unwrap();

        assert_eq!(ids(&response.data), vec![1, 2]);
        assert_eq!(response.total_count, Some(4));
    }

    #[tokio::test]
    async fn test_second_page_and_past_the_end() {
        let store = seeded_store().await;
        let exec = executor(&store);
        let page = |n| {
            active_request(OWNER)
                .with_sorting(vec![SortSpec::desc("createdAt")])
                .with_pagination(Pagination::new(n, 2))
        };

        let second = exec.execute(page(2)).await.unwrap();
        assert_eq!(ids(&second.data), vec![5, 4]);
        assert_eq!(second.total_count, Some(4));

        let beyond = exec.execute(page(9)).await.unwrap();
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.total_count, Some(4));
        assert_eq!(beyond.execution.row_count, 0);
    }

    #[tokio::test]
    async fn test_page_sorted_by_non_key_column() {
        let store = seeded_store().await;
        let request = active_request(OWNER)
            .with_sorting(vec![SortSpec::desc("amount")])
            .with_pagination(Pagination::new(1, 3));

        let response = executor(&store).execute(request).await.unwrap();

        assert_eq!(ids(&response.data), vec![4, 2, 1]);
        assert_eq!(response.total_count, Some(4));
        assert!(!response.data[0].contains_key("__page_row"));
    }

    #[tokio::test]
    async fn test_template_sort_applies_to_pages() {
        let store = seeded_store().await;
        let request = active_request(OWNER).with_pagination(Pagination::new(2, 3));

        let response = executor(&store).execute(request).await.unwrap();

        assert_eq!(ids(&response.data), vec![5]);
        assert_eq!(response.total_count, Some(4));
    }

    #[tokio::test]
    async fn test_no_matching_rows_paginated() {
        let store = seeded_store().await;
        let request = ExecuteRequest::new("transactions", OWNER)
            .with_parameters(values(json!({"status": "active", "minAmount": 10000})))
            .with_pagination(Pagination::new(1, 10));

        let response = executor(&store).execute(request).await.unwrap();

        assert!(response.data.is_empty());
        assert_eq!(response.total_count, Some(0));
    }

    #[tokio::test]
    async fn test_optional_parameter_narrows_rows() {
        let store = seeded_store().await;
        let request = ExecuteRequest::new("transactions", OWNER)
            .with_parameters(values(json!({"status": "active", "minAmount": 200})));

        let response = executor(&store).execute(request).await.unwrap();
        assert_eq!(ids(&response.data), vec![2, 4]);
    }

    #[tokio::test]
    async fn test_request_filters() {
        let store = seeded_store().await;
        let request = active_request(OWNER).with_filters(ConditionGroup::and(vec![
            Condition::new("amount", Operator::Between)
                .with_value(json!({"from": 50, "to": 300}))
                .into(),
        ]));

        let response = executor(&store).execute(request).await.unwrap();
        assert_eq!(ids(&response.data), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_unknown_report() {
        let store = seeded_store().await;
        let err = executor(&store)
            .execute(ExecuteRequest::new("missing", OWNER))
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::NotFound { ref id, .. } if id == "missing"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_stranger_denied_without_history() {
        let store = seeded_store().await;
        let err = executor(&store)
            .execute(active_request(STRANGER))
            .await
            .unwrap_err();

        assert!(matches!(err, ReportError::Authorization(_)));
        let history = store.list_execution_records("transactions", 10).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_admin_may_run_private_report() {
        let store = seeded_store().await;
        let response = executor(&store).execute(active_request(ADMIN)).await.unwrap();
        assert_eq!(response.data.len(), 4);
    }

    #[tokio::test]
    async fn test_public_report_open_to_anyone() {
        let store = seeded_store().await;
        let mut template = super::support::transactions_template();
        template.is_public = true;
        store.save_template(&template).await.unwrap();

        let response = executor(&store)
            .execute(active_request(STRANGER))
            .await
            .unwrap();
        assert_eq!(response.data.len(), 4);
    }

    #[tokio::test]
    async fn test_missing_required_parameter_runs_nothing() {
        let store = seeded_store().await;
        let err = executor(&store)
            .execute(ExecuteRequest::new("transactions", OWNER))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ReportError::Validation(ValidationError::RequiredParameterMissing {
                name: "status".into()
            })
        );
        let history = store.list_execution_records("transactions", 10).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_select_option() {
        let store = seeded_store().await;
        let request = ExecuteRequest::new("transactions", OWNER)
            .with_parameters(values(json!({"status": "pending"})));

        let err = executor(&store).execute(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_history_recorded_on_success() {
        let store = seeded_store().await;
        let response = executor(&store).execute(active_request(OWNER)).await.unwrap();

        let history = store.list_execution_records("transactions", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, response.execution.id);
        assert_eq!(history[0].status, ExecutionStatus::Success);
        assert_eq!(history[0].row_count, 4);
        assert_eq!(history[0].parameters["status"], json!("active"));
    }

    #[tokio::test]
    async fn test_history_disabled() {
        let store = seeded_store().await;
        let exec = ReportExecutor::new(store.clone(), store.clone(), FakeAuth::with_admins(&[]))
            .with_settings(EngineSettings {
                record_history: false,
                ..Default::default()
            });

        exec.execute(active_request(OWNER)).await.unwrap();
        let history = store.list_execution_records("transactions", 10).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_recorded() {
        let store = seeded_store().await;
        let exec = ReportExecutor::new(
            store.clone(),
            Arc::new(FailingStorage),
            FakeAuth::with_admins(&[]),
        );

        let err = exec.execute(active_request(OWNER)).await.unwrap_err();
        assert!(matches!(err, ReportError::Execution(ref m) if m.contains("connection reset by peer")));

        let history = store.list_execution_records("transactions", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ExecutionStatus::Failed);
        assert!(history[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("connection reset by peer"));
    }

    #[tokio::test]
    async fn test_history_failure_does_not_mask_query_error() {
        let store = seeded_store().await;
        let exec = ReportExecutor::new(
            Arc::new(BrokenHistoryCatalog {
                inner: store.clone(),
            }),
            Arc::new(FailingStorage),
            FakeAuth::with_admins(&[]),
        );

        let err = exec.execute(active_request(OWNER)).await.unwrap_err();
        let ReportError::Execution(message) = err else {
            panic!("expected an execution error, got {:?}", err);
        };
        assert!(message.contains("connection reset by peer"));
        assert!(!message.contains("read-only"));
    }

    #[tokio::test]
    async fn test_history_failure_does_not_fail_success() {
        let store = seeded_store().await;
        let exec = ReportExecutor::new(
            Arc::new(BrokenHistoryCatalog {
                inner: store.clone(),
            }),
            store.clone(),
            FakeAuth::with_admins(&[]),
        );

        let response = exec.execute(active_request(OWNER)).await.unwrap();
        assert_eq!(response.data.len(), 4);
    }

    #[tokio::test]
    async fn test_saved_query_values() {
        let store = seeded_store().await;
        store
            .save_saved_query(&saved_query("closed-only", "transactions", json!({"status": "closed"})))
            .await
            .unwrap();

        let response = executor(&store)
            .execute(ExecuteRequest::new("transactions", OWNER).with_saved_query("closed-only"))
            .await
            .unwrap();

        assert_eq!(ids(&response.data), vec![3]);
        assert_eq!(
            response.execution.saved_query_id.as_deref(),
            Some("closed-only")
        );
    }

    #[tokio::test]
    async fn test_request_values_override_saved_query() {
        let store = seeded_store().await;
        store
            .save_saved_query(&saved_query("closed-only", "transactions", json!({"status": "closed"})))
            .await
            .unwrap();

        let response = executor(&store)
            .execute(active_request(OWNER).with_saved_query("closed-only"))
            .await
            .unwrap();

        assert_eq!(response.data.len(), 4);
    }

    #[tokio::test]
    async fn test_saved_query_filters_combine_with_request_filters() {
        let store = seeded_store().await;
        let mut saved = saved_query("big", "transactions", json!({"status": "active"}));
        saved.filters = Some(ConditionGroup::and(vec![Condition::new("amount", Operator::Gt)
            .with_value(json!(90))
            .into()]));
        store.save_saved_query(&saved).await.unwrap();

        let request = ExecuteRequest::new("transactions", OWNER)
            .with_saved_query("big")
            .with_filters(ConditionGroup::and(vec![Condition::new("amount", Operator::Lt)
                .with_value(json!(300))
                .into()]));

        let response = executor(&store).execute(request).await.unwrap();
        assert_eq!(ids(&response.data), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_saved_query_for_other_template() {
        let store = seeded_store().await;
        store
            .save_saved_query(&saved_query("elsewhere", "inventory", json!({})))
            .await
            .unwrap();

        let err = executor(&store)
            .execute(active_request(OWNER).with_saved_query("elsewhere"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReportError::Validation(ValidationError::SavedQueryMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_saved_query() {
        let store = seeded_store().await;
        let err = executor(&store)
            .execute(active_request(OWNER).with_saved_query("nope"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_non_sortable_request_sort() {
        let store = seeded_store().await;
        let err = executor(&store)
            .execute(active_request(OWNER).with_sorting(vec![SortSpec::asc("status")]))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ReportError::Validation(ValidationError::NotSortable {
                column: "status".into()
            })
        );
    }

    #[tokio::test]
    async fn test_sort_on_hidden_column_rejected_before_query() {
        let store = seeded_store().await;
        let mut template = super::support::transactions_template();
        template.config.columns[5].sortable = true;
        store.save_template(&template).await.unwrap();

        let err = executor(&store)
            .execute(active_request(OWNER).with_sorting(vec![SortSpec::desc("accountId")]))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ReportError::Validation(ValidationError::NotSortable {
                column: "accountId".into()
            })
        );
        let history = store.list_execution_records("transactions", 10).await.unwrap();
        assert!(history.is_empty());
    }
}
