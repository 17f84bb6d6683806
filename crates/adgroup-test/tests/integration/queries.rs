//! Integration tests for the `PostgreSQL` group store.
//!
//! Tests:
//! - Unique-name violations surface as validation errors
//! - Rolled back transactions leave no rows behind
//! - Filtering, ordering and counting run in SQL
//! - Memberships pointing at missing rows surface as reference errors
//! - User group locks only cover existing rows

use diesel_async::scoped_futures::ScopedFutureExt;

use adgroup_test::component::db::enums::UserType as DbUserType;
use adgroup_test::component::db::query::ad_group::GroupFilter;
use adgroup_test::component::error::ServiceError;
use adgroup_test::component::model::ad_group::{AdGroupChangeset, NewAdGroup};
use adgroup_test::component::model::membership::NewAdGroupMember;
use adgroup_test::component::store::{GroupRepo, GroupStore};
use adgroup_test::component::types::SortOrder;

use super::helpers::*;

#[test_log::test(tokio::test)]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn unique_violation_maps_to_validation_error() {
    let test_db = TestDb::new().await.expect("Failed to create test database");
    let mut conn = test_db.get_conn().await.expect("Failed to get connection");

    let ops = NewAdGroup {
        name: "Ops",
        user_type: DbUserType::Admin,
    };
    conn.insert_group(&ops).await.expect("first insert");
    let err = conn.insert_group(&ops).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation, "{err}");

    let dev = conn
        .insert_group(&NewAdGroup {
            name: "Dev",
            user_type: DbUserType::User,
        })
        .await
        .expect("insert dev");
    let err = conn
        .update_group(
            dev.id,
            &AdGroupChangeset {
                name: Some("Ops".to_string()),
                ..AdGroupChangeset::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation, "{err}");

    let err = conn
        .update_group(
            uuid::Uuid::new_v4(),
            &AdGroupChangeset {
                user_type: Some(DbUserType::User),
                ..AdGroupChangeset::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");

    drop(conn);
    test_db.teardown().await.expect("Failed to drop test database");
}

#[test_log::test(tokio::test)]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn failed_transaction_rolls_back() {
    let test_db = TestDb::new().await.expect("Failed to create test database");
    let operators = test_db
        .seed_user_group("Operators")
        .await
        .expect("Failed to seed user group");
    let mut conn = test_db.get_conn().await.expect("Failed to get connection");

    let result: Result<(), ServiceError> = conn
        .in_transaction(|repo| {
            async move {
                let group = repo
                    .insert_group(&NewAdGroup {
                        name: "Ops",
                        user_type: DbUserType::Admin,
                    })
                    .await?;
                repo.insert_memberships(&[NewAdGroupMember {
                    ad_group_id: group.id,
                    user_group_id: operators,
                }])
                .await?;
                Err(ServiceError::ConstraintError("abort".to_string()))
            }
            .scope_boxed()
        })
        .await;
    assert!(result.is_err());
    drop(conn);

    assert_eq!(test_db.count_rows("ad_group").await.expect("count"), 0);
    assert_eq!(test_db.count_rows("ad_group_member").await.expect("count"), 0);

    test_db.teardown().await.expect("Failed to drop test database");
}

#[test_log::test(tokio::test)]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn search_filters_orders_and_counts() {
    let test_db = TestDb::new().await.expect("Failed to create test database");
    let operators = test_db
        .seed_user_group("Operators")
        .await
        .expect("Failed to seed user group");
    let support = test_db
        .seed_user_group("Support")
        .await
        .expect("Failed to seed user group");
    let mut conn = test_db.get_conn().await.expect("Failed to get connection");

    for (name, member) in [("ops", operators), ("dev", support), ("devops_50%", operators)] {
        let group = conn
            .insert_group(&NewAdGroup {
                name,
                user_type: DbUserType::User,
            })
            .await
            .expect("insert group");
        conn.insert_memberships(&[NewAdGroupMember {
            ad_group_id: group.id,
            user_group_id: member,
        }])
        .await
        .expect("insert membership");
    }

    let filter = GroupFilter {
        member_ids: Some(vec![operators]),
        order: SortOrder::Desc,
        ..GroupFilter::default()
    };
    let names: Vec<_> = conn
        .search_groups(&filter)
        .await
        .expect("search")
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(names, vec!["ops", "devops_50%"]);

    let filter = GroupFilter {
        name_search: Some("50%".to_string()),
        ..GroupFilter::default()
    };
    assert_eq!(conn.count_groups(&filter).await.expect("count"), 1);

    let filter = GroupFilter {
        visible_through: Some(vec![support]),
        ..GroupFilter::default()
    };
    assert_eq!(conn.count_groups(&filter).await.expect("count"), 1);

    let counts = conn
        .association_counts(&[operators, support])
        .await
        .expect("association counts");
    assert_eq!(counts.get(&operators), Some(&2));
    assert_eq!(counts.get(&support), Some(&1));

    drop(conn);
    test_db.teardown().await.expect("Failed to drop test database");
}

#[test_log::test(tokio::test)]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn missing_user_group_maps_to_reference_error() {
    let test_db = TestDb::new().await.expect("Failed to create test database");
    let operators = test_db
        .seed_user_group("Operators")
        .await
        .expect("Failed to seed user group");
    let mut conn = test_db.get_conn().await.expect("Failed to get connection");

    let group = conn
        .insert_group(&NewAdGroup {
            name: "Ops",
            user_type: DbUserType::Admin,
        })
        .await
        .expect("insert group");
    let err = conn
        .insert_memberships(&[NewAdGroupMember {
            ad_group_id: group.id,
            user_group_id: uuid::Uuid::new_v4(),
        }])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Reference, "{err}");

    let locked: Vec<uuid::Uuid> = conn
        .in_transaction(|repo| {
            async move { repo.lock_user_groups(&[operators, uuid::Uuid::new_v4()]).await }
                .scope_boxed()
        })
        .await
        .expect("lock user groups");
    assert_eq!(locked, vec![operators]);

    drop(conn);
    assert_eq!(test_db.count_rows("ad_group_member").await.expect("count"), 0);

    test_db.teardown().await.expect("Failed to drop test database");
}
