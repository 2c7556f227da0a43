use sqlx::PgPool;

/// Full bootstrap test: connect, migrate, verify schema.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_bootstrap(pool: PgPool) {
    capplan_db::health_check(&pool).await.unwrap();

    let tables = [
        "scenarios",
        "projects",
        "phase_timelines",
        "assignments",
        "project_overlays",
        "phase_timeline_overlays",
        "assignment_overlays",
        "scenario_merges",
        "merge_conflicts",
    ];

    for table in tables {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 0, "{table} should start empty");
    }
}

/// The revision sequence hands out strictly increasing values.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_revision_sequence_increases(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let first = capplan_db::repositories::RevisionRepo::next(&mut *conn).await.unwrap();
    let second = capplan_db::repositories::RevisionRepo::next(&mut *conn).await.unwrap();
    assert!(second > first);
}
