//! Integration tests for the embedded migrations.

use adgroup_test::component::db::migrate::run_migrations;

use super::helpers::*;

#[test_log::test(tokio::test)]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn migrations_create_tables_and_are_idempotent() {
    let test_db = TestDb::new().await.expect("Failed to create test database");

    for table in ["ad_group", "user_group", "ad_group_member"] {
        assert_eq!(
            test_db.count_rows(table).await.expect("table should exist"),
            0,
            "{table} should start empty"
        );
    }

    let applied = run_migrations(&test_db.url())
        .await
        .expect("re-running migrations should succeed");
    assert_eq!(applied, 0);

    test_db.teardown().await.expect("Failed to drop test database");
}
