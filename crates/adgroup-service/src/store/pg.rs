//! `PostgreSQL` store backed by diesel-async.

use std::collections::HashMap;
use std::future::Future;

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::scoped_futures::ScopedBoxFuture;
use diesel_async::{AsyncConnection, AsyncPgConnection};

use adgroup_db::db::query::ad_group::{self, GroupFilter};
use adgroup_db::db::query::{membership, user_group};
use adgroup_db::model::ad_group::{AdGroup, AdGroupChangeset, NewAdGroup};
use adgroup_db::model::membership::{AdGroupMember, NewAdGroupMember};
use adgroup_db::model::user_group::UserGroup;

use super::{GroupRepo, GroupStore, name_taken};
use crate::error::{ServiceError, ServiceResult};

const NAME_CONSTRAINT: &str = "ad_group_name_key";

impl GroupStore for AsyncPgConnection {
    type Repo = Self;

    fn in_transaction<'a, T, F>(
        &'a mut self,
        callback: F,
    ) -> impl Future<Output = ServiceResult<T>> + Send + 'a
    where
        F: for<'r> FnOnce(&'r mut Self::Repo) -> ScopedBoxFuture<'a, 'r, ServiceResult<T>>
            + Send
            + 'a,
        T: Send + 'a,
    {
        AsyncConnection::transaction(self, callback)
    }
}

/// Maps a unique violation on the group name to a validation error.
fn map_name_conflict(err: DieselError, name: &str) -> ServiceError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)
            if info.constraint_name() == Some(NAME_CONSTRAINT) =>
        {
            tracing::debug!(name, "Unique violation on group name");
            ServiceError::ValidationError(name_taken(name))
        }
        other => ServiceError::DieselError(other),
    }
}

/// Maps a foreign key violation, a group or user group removed underneath
/// us, to a reference error.
fn map_missing_reference(err: DieselError) -> ServiceError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            tracing::debug!(
                constraint = ?info.constraint_name(),
                "Foreign key violation on membership"
            );
            ServiceError::ReferenceError(match info.constraint_name() {
                Some(constraint) => format!("membership refers to a missing row ({constraint})"),
                None => info.message().to_string(),
            })
        }
        other => ServiceError::DieselError(other),
    }
}

impl GroupRepo for AsyncPgConnection {
    async fn groups_by_ids(&mut self, ids: &[uuid::Uuid]) -> ServiceResult<Vec<AdGroup>> {
        Ok(ad_group::get_by_ids(self, ids).await?)
    }

    async fn groups_by_names(&mut self, names: &[String]) -> ServiceResult<Vec<AdGroup>> {
        Ok(ad_group::find_by_names(self, names).await?)
    }

    async fn search_groups(&mut self, filter: &GroupFilter) -> ServiceResult<Vec<AdGroup>> {
        Ok(ad_group::search(self, filter).await?)
    }

    async fn count_groups(&mut self, filter: &GroupFilter) -> ServiceResult<i64> {
        Ok(ad_group::count(self, filter).await?)
    }

    async fn existing_user_groups(&mut self, ids: &[uuid::Uuid]) -> ServiceResult<Vec<uuid::Uuid>> {
        Ok(user_group::existing_ids(self, ids).await?)
    }

    async fn lock_user_groups(&mut self, ids: &[uuid::Uuid]) -> ServiceResult<Vec<uuid::Uuid>> {
        Ok(user_group::lock_for_update(self, ids).await?)
    }

    async fn memberships(&mut self, group_ids: &[uuid::Uuid]) -> ServiceResult<Vec<AdGroupMember>> {
        Ok(membership::for_groups(self, group_ids).await?)
    }

    async fn member_user_groups(
        &mut self,
        group_ids: &[uuid::Uuid],
    ) -> ServiceResult<Vec<(uuid::Uuid, UserGroup)>> {
        Ok(membership::user_groups_for_groups(self, group_ids).await?)
    }

    async fn association_counts(
        &mut self,
        user_group_ids: &[uuid::Uuid],
    ) -> ServiceResult<HashMap<uuid::Uuid, i64>> {
        Ok(membership::association_counts(self, user_group_ids).await?)
    }

    #[tracing::instrument(skip(self, group), fields(name = group.name))]
    async fn insert_group(&mut self, group: &NewAdGroup<'_>) -> ServiceResult<AdGroup> {
        ad_group::create(self, group)
            .await
            .map_err(|e| map_name_conflict(e, group.name))
    }

    #[tracing::instrument(skip(self, changes))]
    async fn update_group(
        &mut self,
        id: uuid::Uuid,
        changes: &AdGroupChangeset,
    ) -> ServiceResult<AdGroup> {
        ad_group::update(self, id, changes).await.map_err(|e| match e {
            DieselError::NotFound => ServiceError::NotFound(format!("AD group {id} does not exist")),
            other => map_name_conflict(other, changes.name.as_deref().unwrap_or_default()),
        })
    }

    async fn delete_groups(&mut self, ids: &[uuid::Uuid]) -> ServiceResult<usize> {
        Ok(ad_group::delete_by_ids(self, ids).await?)
    }

    async fn insert_memberships(&mut self, rows: &[NewAdGroupMember]) -> ServiceResult<usize> {
        membership::insert_batch(self, rows)
            .await
            .map_err(map_missing_reference)
    }

    async fn delete_memberships(
        &mut self,
        group_id: uuid::Uuid,
        user_group_ids: &[uuid::Uuid],
    ) -> ServiceResult<usize> {
        Ok(membership::delete_for_group(self, group_id, user_group_ids).await?)
    }

    async fn delete_group_memberships(&mut self, group_ids: &[uuid::Uuid]) -> ServiceResult<usize> {
        Ok(membership::delete_for_groups(self, group_ids).await?)
    }
}
