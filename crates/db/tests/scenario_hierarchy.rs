//! Integration tests for the scenario table and its structural constraints.

use sqlx::PgPool;

use capplan_core::scenario::{ScenarioStatus, ScenarioType};
use capplan_db::models::scenario::CreateScenario;
use capplan_db::repositories::ScenarioRepo;

fn new_baseline(name: &str) -> CreateScenario {
    CreateScenario {
        name: name.to_string(),
        description: None,
        created_by: Some("planner".to_string()),
    }
}

fn constraint_of(err: sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint().unwrap_or_default().to_string(),
        other => panic!("expected a database error, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_baseline(pool: PgPool) {
    let baseline = ScenarioRepo::create_baseline(&pool, &new_baseline("Plan of record"))
        .await
        .unwrap();

    assert_eq!(baseline.scenario_type, "baseline");
    assert_eq!(baseline.status, "active");
    assert!(baseline.parent_scenario_id.is_none());

    let node = baseline.to_node().unwrap();
    assert!(node.is_baseline());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_second_baseline_rejected(pool: PgPool) {
    ScenarioRepo::create_baseline(&pool, &new_baseline("First"))
        .await
        .unwrap();

    let err = ScenarioRepo::create_baseline(&pool, &new_baseline("Second"))
        .await
        .unwrap_err();
    assert_eq!(constraint_of(err), "uq_scenarios_single_baseline");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_baseline_cannot_have_parent(pool: PgPool) {
    let baseline = ScenarioRepo::create_baseline(&pool, &new_baseline("Plan"))
        .await
        .unwrap();

    let err = sqlx::query(
        "INSERT INTO scenarios (name, parent_scenario_id, scenario_type) VALUES ('x', $1, 'baseline')",
    )
    .bind(baseline.id)
    .execute(&pool)
    .await
    .unwrap_err();
    assert_eq!(constraint_of(err), "ck_scenarios_baseline_is_root");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_fork_stamps_increasing_branch_points(pool: PgPool) {
    let baseline = ScenarioRepo::create_baseline(&pool, &new_baseline("Plan"))
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    let a = ScenarioRepo::fork(&mut *tx, baseline.id, "A", None, ScenarioType::Branch, None)
        .await
        .unwrap();
    let b = ScenarioRepo::fork(&mut *tx, a.id, "B", Some("nested"), ScenarioType::Sandbox, None)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(a.parent_scenario_id, Some(baseline.id));
    assert_eq!(b.parent_scenario_id, Some(a.id));
    assert_eq!(b.scenario_type, "sandbox");
    assert!(b.branch_point > a.branch_point);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_hides_archived_by_default(pool: PgPool) {
    let baseline = ScenarioRepo::create_baseline(&pool, &new_baseline("Plan"))
        .await
        .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let kept = ScenarioRepo::fork(&mut *conn, baseline.id, "Kept", None, ScenarioType::Branch, None)
        .await
        .unwrap();
    let archived =
        ScenarioRepo::fork(&mut *conn, baseline.id, "Old", None, ScenarioType::Branch, None)
            .await
            .unwrap();
    let updated = ScenarioRepo::set_status(&mut *conn, archived.id, ScenarioStatus::Archived)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, "archived");

    let visible = ScenarioRepo::list(&pool, false).await.unwrap();
    let ids: Vec<_> = visible.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![baseline.id, kept.id]);

    let all = ScenarioRepo::list(&pool, true).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id, baseline.id, "baseline is listed first");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_set_status_unknown_scenario(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let result = ScenarioRepo::set_status(&mut *conn, 999_999, ScenarioStatus::Archived)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_retire_only_marks_active_branches(pool: PgPool) {
    let baseline = ScenarioRepo::create_baseline(&pool, &new_baseline("Plan"))
        .await
        .unwrap();
    let mut conn = pool.acquire().await.unwrap();
    let active = ScenarioRepo::fork(&mut *conn, baseline.id, "A", None, ScenarioType::Branch, None)
        .await
        .unwrap();
    let archived = ScenarioRepo::fork(&mut *conn, baseline.id, "B", None, ScenarioType::Branch, None)
        .await
        .unwrap();
    ScenarioRepo::set_status(&mut *conn, archived.id, ScenarioStatus::Archived)
        .await
        .unwrap();

    let retired = ScenarioRepo::retire(&mut *conn, active.id).await.unwrap().unwrap();
    assert_eq!(retired.status, "merged");

    assert!(ScenarioRepo::retire(&mut *conn, archived.id).await.unwrap().is_none());
    assert!(ScenarioRepo::retire(&mut *conn, baseline.id).await.unwrap().is_none());

    let still_archived = ScenarioRepo::find_by_id(&pool, archived.id).await.unwrap().unwrap();
    assert_eq!(still_archived.status, "archived");
}
