//! Query functions for directory group memberships.

use std::collections::HashMap;

use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::db::schema::{ad_group_member, user_group};
use crate::model::membership::{AdGroupMember, NewAdGroupMember};
use crate::model::user_group::UserGroup;

/// ## Summary
/// Loads all memberships of the given directory groups.
///
/// ## Errors
/// Returns a database error if the query fails.
pub async fn for_groups(
    conn: &mut AsyncPgConnection,
    group_ids: &[uuid::Uuid],
) -> QueryResult<Vec<AdGroupMember>> {
    if group_ids.is_empty() {
        return Ok(Vec::new());
    }

    ad_group_member::table
        .filter(ad_group_member::ad_group_id.eq_any(group_ids.to_vec()))
        .select(AdGroupMember::as_select())
        .load(conn)
        .await
}

/// ## Summary
/// Loads the user groups of the given directory groups, keyed by directory group ID.
///
/// ## Errors
/// Returns a database error if the query fails.
pub async fn user_groups_for_groups(
    conn: &mut AsyncPgConnection,
    group_ids: &[uuid::Uuid],
) -> QueryResult<Vec<(uuid::Uuid, UserGroup)>> {
    if group_ids.is_empty() {
        return Ok(Vec::new());
    }

    ad_group_member::table
        .inner_join(user_group::table)
        .filter(ad_group_member::ad_group_id.eq_any(group_ids.to_vec()))
        .order(user_group::name.asc())
        .select((ad_group_member::ad_group_id, UserGroup::as_select()))
        .load(conn)
        .await
}

/// ## Summary
/// Counts, per user group, how many directory groups reference it.
///
/// User groups without any association are absent from the map.
///
/// ## Errors
/// Returns a database error if the query fails.
pub async fn association_counts(
    conn: &mut AsyncPgConnection,
    user_group_ids: &[uuid::Uuid],
) -> QueryResult<HashMap<uuid::Uuid, i64>> {
    if user_group_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(uuid::Uuid, i64)> = ad_group_member::table
        .filter(ad_group_member::user_group_id.eq_any(user_group_ids.to_vec()))
        .group_by(ad_group_member::user_group_id)
        .select((ad_group_member::user_group_id, count_star()))
        .load(conn)
        .await?;

    Ok(rows.into_iter().collect())
}

/// ## Summary
/// Inserts memberships in a batch and returns the number of rows inserted.
///
/// ## Errors
/// Returns a database error if the insert fails.
pub async fn insert_batch(
    conn: &mut AsyncPgConnection,
    members: &[NewAdGroupMember],
) -> QueryResult<usize> {
    if members.is_empty() {
        return Ok(0);
    }

    diesel::insert_into(ad_group_member::table)
        .values(members)
        .execute(conn)
        .await
}

/// ## Summary
/// Removes the given user groups from one directory group.
///
/// ## Errors
/// Returns a database error if the delete fails.
pub async fn delete_for_group(
    conn: &mut AsyncPgConnection,
    group_id: uuid::Uuid,
    user_group_ids: &[uuid::Uuid],
) -> QueryResult<usize> {
    if user_group_ids.is_empty() {
        return Ok(0);
    }

    diesel::delete(
        ad_group_member::table
            .filter(ad_group_member::ad_group_id.eq(group_id))
            .filter(ad_group_member::user_group_id.eq_any(user_group_ids.to_vec())),
    )
    .execute(conn)
    .await
}

/// ## Summary
/// Removes every membership of the given directory groups.
///
/// ## Errors
/// Returns a database error if the delete fails.
pub async fn delete_for_groups(
    conn: &mut AsyncPgConnection,
    group_ids: &[uuid::Uuid],
) -> QueryResult<usize> {
    if group_ids.is_empty() {
        return Ok(0);
    }

    diesel::delete(
        ad_group_member::table.filter(ad_group_member::ad_group_id.eq_any(group_ids.to_vec())),
    )
    .execute(conn)
    .await
}
