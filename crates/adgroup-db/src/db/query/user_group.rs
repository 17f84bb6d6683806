//! Query functions for user groups, the member side of directory groups.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::db::schema::user_group;
use crate::model::user_group::{NewUserGroup, UserGroup};

/// ## Summary
/// Returns which of `ids` exist.
///
/// ## Errors
/// Returns a database error if the query fails.
pub async fn existing_ids(
    conn: &mut AsyncPgConnection,
    ids: &[uuid::Uuid],
) -> QueryResult<Vec<uuid::Uuid>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    user_group::table
        .filter(user_group::id.eq_any(ids.to_vec()))
        .select(user_group::id)
        .load(conn)
        .await
}

/// ## Summary
/// Locks the given user groups for the rest of the transaction and returns
/// the IDs that exist.
///
/// Rows are locked in ID order, so two transactions locking overlapping sets
/// queue behind each other instead of deadlocking. Holding these locks makes
/// an association count taken afterwards stable until commit.
///
/// ## Errors
/// Returns a database error if the query fails.
pub async fn lock_for_update(
    conn: &mut AsyncPgConnection,
    ids: &[uuid::Uuid],
) -> QueryResult<Vec<uuid::Uuid>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    user_group::table
        .filter(user_group::id.eq_any(ids.to_vec()))
        .order(user_group::id.asc())
        .select(user_group::id)
        .for_update()
        .load(conn)
        .await
}

/// ## Summary
/// Inserts a user group and returns the inserted record.
///
/// ## Errors
/// Returns a database error if the insert fails.
pub async fn create(
    conn: &mut AsyncPgConnection,
    new_user_group: &NewUserGroup<'_>,
) -> QueryResult<UserGroup> {
    diesel::insert_into(user_group::table)
        .values(new_user_group)
        .returning(UserGroup::as_returning())
        .get_result(conn)
        .await
}
