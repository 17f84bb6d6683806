//! Query functions for directory groups.

use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use adgroup_core::types::{SortField, SortOrder};

use crate::db::schema::{ad_group, ad_group_member};
use crate::model::ad_group::{AdGroup, AdGroupChangeset, NewAdGroup};

type BoxedQuery<'a> = ad_group::BoxedQuery<'a, Pg>;

/// Listing criteria for directory groups. Unset fields do not restrict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFilter {
    pub ids: Option<Vec<uuid::Uuid>>,
    /// Groups mapped to any of these user groups.
    pub member_ids: Option<Vec<uuid::Uuid>>,
    /// Case-insensitive substring of the name.
    pub name_search: Option<String>,
    /// Groups reachable through any of these user groups; the caller's read scope.
    pub visible_through: Option<Vec<uuid::Uuid>>,
    pub sort: SortField,
    pub order: SortOrder,
    pub limit: Option<i64>,
}

/// ## Summary
/// Returns a query to select all directory groups.
#[must_use]
pub fn all() -> BoxedQuery<'static> {
    ad_group::table.into_boxed()
}

/// ## Summary
/// Returns a query to find directory groups by ID.
#[must_use]
pub fn by_ids(ids: &[uuid::Uuid]) -> BoxedQuery<'static> {
    all().filter(ad_group::id.eq_any(ids.to_vec()))
}

/// ## Summary
/// Returns a query to find directory groups by exact (case-sensitive) name.
#[must_use]
pub fn by_names(names: &[String]) -> BoxedQuery<'static> {
    all().filter(ad_group::name.eq_any(names.to_vec()))
}

/// ## Summary
/// Returns a query applying the `WHERE` part of a filter, without ordering or limit.
#[must_use]
pub fn matching(filter: &GroupFilter) -> BoxedQuery<'static> {
    let mut query = all();

    if let Some(ids) = &filter.ids {
        query = query.filter(ad_group::id.eq_any(ids.clone()));
    }

    if let Some(member_ids) = &filter.member_ids {
        query = query.filter(
            ad_group::id.eq_any(
                ad_group_member::table
                    .filter(ad_group_member::user_group_id.eq_any(member_ids.clone()))
                    .select(ad_group_member::ad_group_id),
            ),
        );
    }

    if let Some(visible) = &filter.visible_through {
        query = query.filter(
            ad_group::id.eq_any(
                ad_group_member::table
                    .filter(ad_group_member::user_group_id.eq_any(visible.clone()))
                    .select(ad_group_member::ad_group_id),
            ),
        );
    }

    if let Some(pattern) = filter.name_search.as_deref().filter(|p| !p.is_empty()) {
        query = query.filter(ad_group::name.ilike(contains_pattern(pattern)));
    }

    query
}

/// ## Summary
/// Returns a query applying the full filter: conditions, ordering and limit.
#[must_use]
pub fn filtered(filter: &GroupFilter) -> BoxedQuery<'static> {
    let query = matching(filter);

    let query = match (filter.sort, filter.order) {
        (SortField::Name, SortOrder::Asc) => query
            .order(ad_group::name.asc())
            .then_order_by(ad_group::id.asc()),
        (SortField::Name, SortOrder::Desc) => query
            .order(ad_group::name.desc())
            .then_order_by(ad_group::id.desc()),
        (SortField::Id, SortOrder::Asc) => query.order(ad_group::id.asc()),
        (SortField::Id, SortOrder::Desc) => query.order(ad_group::id.desc()),
    };

    match filter.limit {
        Some(limit) => query.limit(limit),
        None => query,
    }
}

/// Escapes `LIKE` metacharacters and wraps the needle in `%`.
fn contains_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// ## Summary
/// Loads directory groups by ID. Missing IDs are absent from the result.
///
/// ## Errors
/// Returns a database error if the query fails.
pub async fn get_by_ids(
    conn: &mut AsyncPgConnection,
    ids: &[uuid::Uuid],
) -> QueryResult<Vec<AdGroup>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    by_ids(ids).load(conn).await
}

/// ## Summary
/// Loads directory groups whose name is one of `names`.
///
/// ## Errors
/// Returns a database error if the query fails.
pub async fn find_by_names(
    conn: &mut AsyncPgConnection,
    names: &[String],
) -> QueryResult<Vec<AdGroup>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }

    by_names(names).load(conn).await
}

/// ## Summary
/// Lists directory groups matching a filter.
///
/// ## Errors
/// Returns a database error if the query fails.
pub async fn search(conn: &mut AsyncPgConnection, filter: &GroupFilter) -> QueryResult<Vec<AdGroup>> {
    filtered(filter).load(conn).await
}

/// ## Summary
/// Counts directory groups matching a filter, ignoring its limit.
///
/// ## Errors
/// Returns a database error if the query fails.
pub async fn count(conn: &mut AsyncPgConnection, filter: &GroupFilter) -> QueryResult<i64> {
    matching(filter).count().get_result(conn).await
}

/// ## Summary
/// Inserts a new directory group and returns the inserted record.
///
/// ## Errors
/// Returns a database error if the insert fails, including a unique violation on the name.
pub async fn create(conn: &mut AsyncPgConnection, new_group: &NewAdGroup<'_>) -> QueryResult<AdGroup> {
    diesel::insert_into(ad_group::table)
        .values(new_group)
        .returning(AdGroup::as_returning())
        .get_result(conn)
        .await
}

/// ## Summary
/// Applies a changeset to a directory group and bumps `updated_at`.
///
/// ## Errors
/// Returns a database error if the update fails or the group does not exist.
pub async fn update(
    conn: &mut AsyncPgConnection,
    id: uuid::Uuid,
    changes: &AdGroupChangeset,
) -> QueryResult<AdGroup> {
    diesel::update(ad_group::table.filter(ad_group::id.eq(id)))
        .set((changes, ad_group::updated_at.eq(chrono::Utc::now())))
        .returning(AdGroup::as_returning())
        .get_result(conn)
        .await
}

/// ## Summary
/// Deletes directory groups by ID and returns the number of rows removed.
///
/// ## Errors
/// Returns a database error if the delete fails.
pub async fn delete_by_ids(conn: &mut AsyncPgConnection, ids: &[uuid::Uuid]) -> QueryResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }

    diesel::delete(ad_group::table.filter(ad_group::id.eq_any(ids.to_vec())))
        .execute(conn)
        .await
}
