use super::*;
use crate::{
    error::GatewayError,
    test_support::{notifier, ScriptedGateway},
};
use serde_json::json;

const DASHBOARD: &str = "/analytics/dashboard/demo-course";

#[tokio::test]
async fn second_refresh_fully_replaces_first() {
    let gateway = ScriptedGateway::new();
    gateway
        .reply_ok(
            DASHBOARD,
            json!({
                "course_id": "demo-course",
                "total_materials": 3,
                "chat_history_count": 7,
                "tests_count": 2,
                "total_content_length": 12_345,
            }),
        )
        .await;
    gateway
        .reply_ok(
            DASHBOARD,
            json!({
                "total_materials": 1,
                "chat_history_count": 0,
                "tests_count": 0,
                "total_content_length": 400,
            }),
        )
        .await;
    let dashboard = AnalyticsDashboard::new(gateway.clone(), notifier());
    let scope = CourseId::new("demo-course");

    let first = dashboard.refresh(&scope).await.expect("first");
    assert_eq!(first.content_kb(), 12);

    dashboard.refresh(&scope).await.expect("second");
    assert_eq!(
        dashboard.current().await,
        Some(AnalyticsSnapshot {
            total_materials: 1,
            chat_history_count: 0,
            tests_count: 0,
            total_content_length: 400,
        })
    );
}

#[tokio::test]
async fn partial_payload_replaces_instead_of_merging() {
    let gateway = ScriptedGateway::new();
    gateway
        .reply_ok(
            DASHBOARD,
            json!({
                "total_materials": 3,
                "chat_history_count": 7,
                "tests_count": 2,
                "total_content_length": 900,
            }),
        )
        .await;
    gateway
        .reply_ok(DASHBOARD, json!({"total_materials": 9}))
        .await;
    let dashboard = AnalyticsDashboard::new(gateway.clone(), notifier());
    let scope = CourseId::new("demo-course");

    dashboard.refresh(&scope).await.expect("first");
    let second = dashboard.refresh(&scope).await.expect("partial");
    assert_eq!(
        second,
        AnalyticsSnapshot {
            total_materials: 9,
            chat_history_count: 0,
            tests_count: 0,
            total_content_length: 0,
        }
    );

    let snapshot = dashboard.snapshot().await;
    assert_eq!(snapshot.state, Some(second));
    assert!(snapshot.error.is_none());
}

#[tokio::test]
async fn malformed_payload_keeps_previous_snapshot() {
    let gateway = ScriptedGateway::new();
    gateway
        .reply_ok(
            DASHBOARD,
            json!({
                "total_materials": 3,
                "chat_history_count": 7,
                "tests_count": 2,
                "total_content_length": 900,
            }),
        )
        .await;
    gateway
        .reply_ok(DASHBOARD, json!({"total_materials": "many"}))
        .await;
    let dashboard = AnalyticsDashboard::new(gateway.clone(), notifier());
    let scope = CourseId::new("demo-course");

    let first = dashboard.refresh(&scope).await.expect("first");
    let err = dashboard.refresh(&scope).await.expect_err("malformed");
    assert!(matches!(err, ActionError::Gateway(GatewayError::DecodeFailure(_))));

    let snapshot = dashboard.snapshot().await;
    assert_eq!(snapshot.state, Some(first));
    assert!(snapshot.error.is_some());
}

#[tokio::test]
async fn failure_before_any_success_leaves_no_snapshot() {
    let gateway = ScriptedGateway::new();
    gateway
        .reply_err(DASHBOARD, GatewayError::HttpFailure { status: 503 })
        .await;
    let dashboard = AnalyticsDashboard::new(gateway.clone(), notifier());

    dashboard
        .refresh(&CourseId::new("demo-course"))
        .await
        .expect_err("fails");
    let snapshot = dashboard.snapshot().await;
    assert_eq!(snapshot.state, None);
    assert_eq!(snapshot.error.and_then(|e| e.status), Some(503));
}
