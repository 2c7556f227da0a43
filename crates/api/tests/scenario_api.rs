//! HTTP-level integration tests for the scenario hierarchy, scenario writes
//! and the read-only plan views.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router
//! without an actual TCP listener.

mod common;

use axum::http::StatusCode;
use common::{
    add_assignment, allocation, body_json, build_test_app, create_baseline, delete, fork, get,
    post_empty, post_json, put_assignment, put_json,
};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_baseline_returns_201(pool: PgPool) {
    let response = post_json(
        build_test_app(pool),
        "/api/v1/scenarios",
        serde_json::json!({"name": "Plan of record", "created_by": "ops"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["scenario_type"], "baseline");
    assert_eq!(json["data"]["status"], "active");
    assert!(json["data"]["parent_scenario_id"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_fork_defaults_to_branch(pool: PgPool) {
    let baseline = create_baseline(&pool).await;

    let response = post_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/scenarios/{baseline}/fork"),
        serde_json::json!({"name": "Hire two engineers"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let branch = body_json(response).await["data"].clone();
    assert_eq!(branch["scenario_type"], "branch");
    assert_eq!(branch["parent_scenario_id"], baseline);

    let response = post_json(
        build_test_app(pool),
        &format!("/api/v1/scenarios/{}/fork", branch["id"]),
        serde_json::json!({"name": "What if", "scenario_type": "sandbox"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let sandbox = body_json(response).await["data"].clone();
    assert_eq!(sandbox["scenario_type"], "sandbox");
    assert!(sandbox["branch_point"].as_i64() > branch["branch_point"].as_i64());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_ancestors_listed_from_scenario_to_baseline(pool: PgPool) {
    let baseline = create_baseline(&pool).await;
    let a = fork(&pool, baseline, "A").await;
    let a1 = fork(&pool, a, "A.1").await;

    let response = get(
        build_test_app(pool),
        &format!("/api/v1/scenarios/{a1}/ancestors"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let ids: Vec<i64> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![a1, a, baseline]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_archive_hides_scenario_from_default_list(pool: PgPool) {
    let baseline = create_baseline(&pool).await;
    let a = fork(&pool, baseline, "A").await;

    let response = post_empty(
        build_test_app(pool.clone()),
        &format!("/api/v1/scenarios/{a}/archive"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "archived");

    let json = body_json(get(build_test_app(pool.clone()), "/api/v1/scenarios").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let json = body_json(
        get(
            build_test_app(pool),
            "/api/v1/scenarios?include_archived=true",
        )
        .await,
    )
    .await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Writes and effective state
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_new_branch_resolves_to_baseline(pool: PgPool) {
    let baseline = create_baseline(&pool).await;
    let x = add_assignment(&pool, baseline, 50.0).await;
    let a = fork(&pool, baseline, "A").await;

    assert_eq!(allocation(&pool, a, x).await, Some(50.0));
    // Resolving again without writes gives the same answer.
    assert_eq!(allocation(&pool, a, x).await, Some(50.0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_branch_change_does_not_touch_parent(pool: PgPool) {
    let baseline = create_baseline(&pool).await;
    let x = add_assignment(&pool, baseline, 50.0).await;
    let a = fork(&pool, baseline, "A").await;

    let response = put_assignment(&pool, a, Some(x), 70.0).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["change_type"], "modified");
    assert_eq!(json["data"]["scenario_id"], a);

    assert_eq!(allocation(&pool, a, x).await, Some(70.0));
    assert_eq!(allocation(&pool, baseline, x).await, Some(50.0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_nested_scenario_sees_nearest_change(pool: PgPool) {
    let baseline = create_baseline(&pool).await;
    let x = add_assignment(&pool, baseline, 50.0).await;
    let a = fork(&pool, baseline, "A").await;
    put_assignment(&pool, a, Some(x), 70.0).await;
    let a1 = fork(&pool, a, "A.1").await;

    assert_eq!(allocation(&pool, a1, x).await, Some(70.0));

    put_assignment(&pool, a1, Some(x), 20.0).await;
    assert_eq!(allocation(&pool, a1, x).await, Some(20.0));
    assert_eq!(allocation(&pool, a, x).await, Some(70.0));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_added_entity_can_be_restated_and_removed(pool: PgPool) {
    let baseline = create_baseline(&pool).await;
    let a = fork(&pool, baseline, "A").await;

    let y = add_assignment(&pool, a, 25.0).await;
    assert_eq!(allocation(&pool, baseline, y).await, None);

    let response = put_assignment(&pool, a, Some(y), 35.0).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["change_type"], "added");
    assert_eq!(allocation(&pool, a, y).await, Some(35.0));

    let response = delete(
        build_test_app(pool.clone()),
        &format!("/api/v1/scenarios/{a}/overlays/assignment/{y}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(allocation(&pool, a, y).await, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_overlay_log_lists_every_write(pool: PgPool) {
    let baseline = create_baseline(&pool).await;
    let x = add_assignment(&pool, baseline, 50.0).await;
    let a = fork(&pool, baseline, "A").await;
    put_assignment(&pool, a, Some(x), 60.0).await;
    put_assignment(&pool, a, Some(x), 65.0).await;
    delete(
        build_test_app(pool.clone()),
        &format!("/api/v1/scenarios/{a}/overlays/assignment/{x}"),
    )
    .await;

    let json = body_json(
        get(
            build_test_app(pool.clone()),
            &format!("/api/v1/scenarios/{a}/overlays/assignment"),
        )
        .await,
    )
    .await;
    let changes: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["change_type"].as_str().unwrap())
        .collect();
    assert_eq!(changes, vec!["modified", "modified", "removed"]);

    // Baseline writes are records, not overlays.
    let json = body_json(
        get(
            build_test_app(pool),
            &format!("/api/v1/scenarios/{baseline}/overlays/assignment"),
        )
        .await,
    )
    .await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_baseline_removal_is_visible_to_children(pool: PgPool) {
    let baseline = create_baseline(&pool).await;
    let x = add_assignment(&pool, baseline, 50.0).await;
    let a = fork(&pool, baseline, "A").await;

    let response = delete(
        build_test_app(pool.clone()),
        &format!("/api/v1/scenarios/{baseline}/overlays/assignment/{x}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(allocation(&pool, baseline, x).await, None);
    assert_eq!(allocation(&pool, a, x).await, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_project_details_written_per_scenario(pool: PgPool) {
    let baseline = create_baseline(&pool).await;
    let project = serde_json::json!({
        "entity_type": "project_details",
        "name": "Atlas",
        "priority": 2,
        "include_in_demand": true
    });
    let response = put_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/scenarios/{baseline}/overlays/project_details"),
        serde_json::json!({"data": project}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let project_id = body_json(response).await["data"]["entity_id"].as_i64().unwrap();

    let a = fork(&pool, baseline, "A").await;
    let mut renamed = project.clone();
    renamed["name"] = serde_json::json!("Atlas (delayed)");
    let response = put_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/scenarios/{a}/overlays/project_details"),
        serde_json::json!({"entity_id": project_id, "data": renamed}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(
        get(
            build_test_app(pool),
            &format!("/api/v1/scenarios/{a}/effective/project_details"),
        )
        .await,
    )
    .await;
    assert_eq!(json["data"][0]["record"]["name"], "Atlas (delayed)");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_removal_records_its_author(pool: PgPool) {
    let baseline = create_baseline(&pool).await;
    let x = add_assignment(&pool, baseline, 50.0).await;
    let a = fork(&pool, baseline, "A").await;

    let response = delete(
        build_test_app(pool.clone()),
        &format!("/api/v1/scenarios/{a}/overlays/assignment/{x}?removed_by=planner"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(
        get(
            build_test_app(pool),
            &format!("/api/v1/scenarios/{a}/overlays/assignment"),
        )
        .await,
    )
    .await;
    assert_eq!(json["data"][0]["change_type"], "removed");
    assert_eq!(json["data"][0]["created_by"], "planner");
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_compare_is_antisymmetric(pool: PgPool) {
    let baseline = create_baseline(&pool).await;
    let x = add_assignment(&pool, baseline, 50.0).await;
    let a = fork(&pool, baseline, "A").await;
    let b = fork(&pool, baseline, "B").await;
    put_assignment(&pool, a, Some(x), 70.0).await;
    let y = add_assignment(&pool, a, 20.0).await;
    put_assignment(&pool, b, Some(x), 40.0).await;

    let ab = body_json(
        get(
            build_test_app(pool.clone()),
            &format!("/api/v1/scenarios/{a}/compare/{b}"),
        )
        .await,
    )
    .await["data"]
        .clone();
    let ba = body_json(
        get(
            build_test_app(pool),
            &format!("/api/v1/scenarios/{b}/compare/{a}"),
        )
        .await,
    )
    .await["data"]
        .clone();

    assert_eq!(ab["assignments"]["added"][0]["entity_id"], y);
    assert_eq!(ba["assignments"]["removed"][0]["entity_id"], y);

    let modified = &ab["assignments"]["modified"][0];
    assert_eq!(modified["entity_id"], x);
    assert_eq!(modified["source"]["allocation_percentage"], 70.0);
    assert_eq!(modified["target"]["allocation_percentage"], 40.0);
    assert_eq!(ba["assignments"]["modified"][0]["source"]["allocation_percentage"], 40.0);

    assert_eq!(ab["total_changes"], 2);
    assert_eq!(ab["impact"]["net_allocation_delta"], 50.0);
    assert_eq!(ba["impact"]["net_allocation_delta"], -50.0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_compare_identical_scenarios_reports_nothing(pool: PgPool) {
    let baseline = create_baseline(&pool).await;
    let x = add_assignment(&pool, baseline, 50.0).await;
    let a = fork(&pool, baseline, "A").await;
    // A re-states the baseline value: an overlay, but no effective change.
    put_assignment(&pool, a, Some(x), 50.0).await;

    let json = body_json(
        get(
            build_test_app(pool),
            &format!("/api/v1/scenarios/{a}/compare/{baseline}"),
        )
        .await,
    )
    .await;
    assert_eq!(json["data"]["total_changes"], 0);
    assert!(json["data"]["assignments"]["modified"].as_array().unwrap().is_empty());
}
