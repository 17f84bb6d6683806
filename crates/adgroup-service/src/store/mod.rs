//! Storage boundary for the group service.
//!
//! [`GroupStore`] owns the transaction; [`GroupRepo`] is the set of reads and
//! writes available inside it. Service operations run every repository call
//! of one request inside a single `in_transaction` callback:
//!
//! ```rust,ignore
//! use diesel_async::scoped_futures::ScopedFutureExt;
//!
//! store
//!     .in_transaction(|repo| {
//!         async move {
//!             let groups = repo.groups_by_ids(&ids).await?;
//!             Ok(groups)
//!         }
//!         .scope_boxed()
//!     })
//!     .await?;
//! ```

use std::collections::HashMap;
use std::future::Future;

use diesel_async::scoped_futures::ScopedBoxFuture;

use adgroup_db::db::query::ad_group::GroupFilter;
use adgroup_db::model::ad_group::{AdGroup, AdGroupChangeset, NewAdGroup};
use adgroup_db::model::membership::{AdGroupMember, NewAdGroupMember};
use adgroup_db::model::user_group::UserGroup;

use crate::error::ServiceResult;

pub mod memory;
pub mod pg;

/// Transaction boundary.
pub trait GroupStore: Send {
    type Repo: GroupRepo;

    /// ## Summary
    /// Runs `callback` in a transaction, committing if it returns `Ok` and
    /// rolling back otherwise.
    ///
    /// ## Errors
    /// Returns the callback's error, or an error raised while starting or
    /// committing the transaction.
    fn in_transaction<'a, T, F>(
        &'a mut self,
        callback: F,
    ) -> impl Future<Output = ServiceResult<T>> + Send + 'a
    where
        F: for<'r> FnOnce(&'r mut Self::Repo) -> ScopedBoxFuture<'a, 'r, ServiceResult<T>>
            + Send
            + 'a,
        T: Send + 'a;
}

/// Reads and writes on directory groups, memberships and user groups.
pub trait GroupRepo: Send {
    /// Groups with the given IDs; missing IDs are absent.
    fn groups_by_ids(
        &mut self,
        ids: &[uuid::Uuid],
    ) -> impl Future<Output = ServiceResult<Vec<AdGroup>>> + Send;

    /// Groups whose name is exactly one of `names`.
    fn groups_by_names(
        &mut self,
        names: &[String],
    ) -> impl Future<Output = ServiceResult<Vec<AdGroup>>> + Send;

    fn search_groups(
        &mut self,
        filter: &GroupFilter,
    ) -> impl Future<Output = ServiceResult<Vec<AdGroup>>> + Send;

    /// Number of groups matching `filter`, ignoring its limit.
    fn count_groups(
        &mut self,
        filter: &GroupFilter,
    ) -> impl Future<Output = ServiceResult<i64>> + Send;

    /// Which of `ids` name existing user groups.
    fn existing_user_groups(
        &mut self,
        ids: &[uuid::Uuid],
    ) -> impl Future<Output = ServiceResult<Vec<uuid::Uuid>>> + Send;

    /// Locks the given user groups until the transaction ends.
    ///
    /// Callers take this before counting associations they are about to
    /// remove, so concurrent removals see each other's result.
    fn lock_user_groups(
        &mut self,
        ids: &[uuid::Uuid],
    ) -> impl Future<Output = ServiceResult<Vec<uuid::Uuid>>> + Send;

    fn memberships(
        &mut self,
        group_ids: &[uuid::Uuid],
    ) -> impl Future<Output = ServiceResult<Vec<AdGroupMember>>> + Send;

    /// User groups of the given groups, paired with the owning group ID.
    fn member_user_groups(
        &mut self,
        group_ids: &[uuid::Uuid],
    ) -> impl Future<Output = ServiceResult<Vec<(uuid::Uuid, UserGroup)>>> + Send;

    /// Stored association count per user group; unassociated ones are absent.
    fn association_counts(
        &mut self,
        user_group_ids: &[uuid::Uuid],
    ) -> impl Future<Output = ServiceResult<HashMap<uuid::Uuid, i64>>> + Send;

    /// Inserts a group. A taken name is a `ValidationError`.
    fn insert_group(
        &mut self,
        group: &NewAdGroup<'_>,
    ) -> impl Future<Output = ServiceResult<AdGroup>> + Send;

    /// Applies `changes` to a group. A taken name is a `ValidationError`.
    fn update_group(
        &mut self,
        id: uuid::Uuid,
        changes: &AdGroupChangeset,
    ) -> impl Future<Output = ServiceResult<AdGroup>> + Send;

    fn delete_groups(
        &mut self,
        ids: &[uuid::Uuid],
    ) -> impl Future<Output = ServiceResult<usize>> + Send;

    fn insert_memberships(
        &mut self,
        rows: &[NewAdGroupMember],
    ) -> impl Future<Output = ServiceResult<usize>> + Send;

    /// Removes the given user groups from one group.
    fn delete_memberships(
        &mut self,
        group_id: uuid::Uuid,
        user_group_ids: &[uuid::Uuid],
    ) -> impl Future<Output = ServiceResult<usize>> + Send;

    /// Removes every membership of the given groups.
    fn delete_group_memberships(
        &mut self,
        group_ids: &[uuid::Uuid],
    ) -> impl Future<Output = ServiceResult<usize>> + Send;
}

/// Error message for a name held by another group.
pub(crate) fn name_taken(name: &str) -> String {
    format!("AD group \"{name}\" already exists")
}
