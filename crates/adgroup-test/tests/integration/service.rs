//! Integration tests for the group service on `PostgreSQL`.
//!
//! Tests:
//! - Create, update and delete round trips with membership reconciliation
//! - Reference and orphan checks leave the database untouched on failure
//! - Listings are restricted to the principal's user groups
//! - Concurrent deletes cannot together orphan a user group

use std::collections::BTreeSet;
use std::time::Duration;

use diesel_async::RunQueryDsl;

use super::helpers::*;

#[test_log::test(tokio::test)]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn create_update_delete_round_trip() {
    let test_db = TestDb::new().await.expect("Failed to create test database");
    let [one, two, three, four] = {
        let mut ids = [uuid::Uuid::nil(); 4];
        for (slot, name) in ids.iter_mut().zip(["one", "two", "three", "four"]) {
            *slot = test_db.seed_user_group(name).await.expect("seed");
        }
        ids
    };
    let admin = super_admin();
    let service = GroupService::new(
        GroupPolicy {
            orphan_policy: OrphanPolicy::Allow,
            ..GroupPolicy::default()
        },
        adgroup_test::component::audit::TracingAuditSink,
    );
    let mut conn = test_db.get_conn().await.expect("Failed to get connection");

    let id = service
        .create(&mut *conn, &admin, &new_group("Ops", UserType::Admin, &[one, two, three]))
        .await
        .expect("create");

    service
        .update(
            &mut *conn,
            &admin,
            &UpdateGroup {
                name: Some("Operations".to_string()),
                members: Some(vec![two, three, four]),
                ..UpdateGroup::new(id)
            },
        )
        .await
        .expect("update");

    let view = service.get(&mut *conn, &admin, id).await.expect("get");
    assert_eq!(view.group.name, "Operations");
    let members: BTreeSet<_> = view.member_ids().unwrap_or_default().into_iter().collect();
    assert_eq!(members, BTreeSet::from([two, three, four]));

    assert_eq!(
        service.delete(&mut *conn, &admin, &[id]).await.expect("delete"),
        vec![id]
    );
    drop(conn);

    assert_eq!(test_db.count_rows("ad_group").await.expect("count"), 0);
    assert_eq!(test_db.count_rows("ad_group_member").await.expect("count"), 0);
    assert_eq!(test_db.count_rows("user_group").await.expect("count"), 4);

    test_db.teardown().await.expect("Failed to drop test database");
}

#[test_log::test(tokio::test)]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn missing_member_persists_nothing() {
    let test_db = TestDb::new().await.expect("Failed to create test database");
    let five = test_db.seed_user_group("five").await.expect("seed");
    let six = uuid::Uuid::new_v4();
    let mut conn = test_db.get_conn().await.expect("Failed to get connection");

    let err = service()
        .create(&mut *conn, &super_admin(), &new_group("Ops", UserType::Admin, &[five, six]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Reference);
    drop(conn);

    assert_eq!(test_db.count_rows("ad_group").await.expect("count"), 0);
    assert_eq!(test_db.count_rows("ad_group_member").await.expect("count"), 0);

    test_db.teardown().await.expect("Failed to drop test database");
}

#[test_log::test(tokio::test)]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn forbidden_orphan_blocks_delete() {
    let test_db = TestDb::new().await.expect("Failed to create test database");
    let operators = test_db.seed_user_group("Operators").await.expect("seed");
    let admin = super_admin();
    let service = service();
    let mut conn = test_db.get_conn().await.expect("Failed to get connection");

    let id = service
        .create(&mut *conn, &admin, &new_group("Ops", UserType::User, &[operators]))
        .await
        .expect("create");

    let err = service.delete(&mut *conn, &admin, &[id]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Constraint);
    drop(conn);

    assert_eq!(test_db.count_rows("ad_group").await.expect("count"), 1);
    assert_eq!(test_db.count_rows("ad_group_member").await.expect("count"), 1);

    test_db.teardown().await.expect("Failed to drop test database");
}

#[test_log::test(tokio::test)]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn listing_is_scoped_to_principal() {
    let test_db = TestDb::new().await.expect("Failed to create test database");
    let operators = test_db.seed_user_group("Operators").await.expect("seed");
    let support = test_db.seed_user_group("Support").await.expect("seed");
    let admin = super_admin();
    let service = service();
    let mut conn = test_db.get_conn().await.expect("Failed to get connection");

    service
        .create_many(
            &mut *conn,
            &admin,
            &[
                new_group("Ops", UserType::Admin, &[operators]),
                new_group("Helpdesk", UserType::User, &[support]),
            ],
        )
        .await
        .expect("create");

    let query = GroupQuery {
        with_members: true,
        ..GroupQuery::default()
    };
    let visible = service
        .list(&mut *conn, &user_in(&[support]), &query)
        .await
        .expect("list");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].group.name, "Helpdesk");
    assert_eq!(visible[0].member_ids(), Some(vec![support]));

    assert_eq!(service.count(&mut *conn, &admin, &query).await.expect("count"), 2);
    assert_eq!(
        service
            .count(&mut *conn, &user_in(&[]), &query)
            .await
            .expect("count"),
        0
    );

    drop(conn);
    test_db.teardown().await.expect("Failed to drop test database");
}

#[test_log::test(tokio::test)]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn concurrent_deletes_keep_last_association() {
    let test_db = TestDb::new().await.expect("Failed to create test database");
    let operators = test_db.seed_user_group("Operators").await.expect("seed");
    let admin = super_admin();
    let service = service();

    let ids = {
        let mut conn = test_db.get_conn().await.expect("Failed to get connection");
        service
            .create_many(
                &mut *conn,
                &admin,
                &[
                    new_group("Ops", UserType::Admin, &[operators]),
                    new_group("Oncall", UserType::User, &[operators]),
                ],
            )
            .await
            .expect("create")
    };

    // Hold the membership rows so both deletes pass their reads before either
    // can remove anything.
    let mut holder = test_db.get_conn().await.expect("Failed to get connection");
    diesel::sql_query("BEGIN")
        .execute(&mut *holder)
        .await
        .expect("begin");
    diesel::sql_query("SELECT * FROM ad_group_member FOR UPDATE")
        .execute(&mut *holder)
        .await
        .expect("lock memberships");

    let mut first = test_db.get_conn().await.expect("Failed to get connection");
    let mut second = test_db.get_conn().await.expect("Failed to get connection");
    let (first_result, second_result, ()) = tokio::join!(
        service.delete(&mut *first, &admin, &ids[..1]),
        service.delete(&mut *second, &admin, &ids[1..]),
        async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            diesel::sql_query("COMMIT")
                .execute(&mut *holder)
                .await
                .expect("commit");
        },
    );
    drop((first, second, holder));

    let kinds: Vec<Option<ErrorKind>> = [first_result, second_result]
        .into_iter()
        .map(|result| result.err().map(|err| err.kind()))
        .collect();
    assert_eq!(kinds.iter().filter(|kind| kind.is_none()).count(), 1, "{kinds:?}");
    assert!(kinds.contains(&Some(ErrorKind::Constraint)), "{kinds:?}");

    assert_eq!(test_db.count_rows("ad_group").await.expect("count"), 1);
    assert_eq!(test_db.count_rows("ad_group_member").await.expect("count"), 1);

    test_db.teardown().await.expect("Failed to drop test database");
}
