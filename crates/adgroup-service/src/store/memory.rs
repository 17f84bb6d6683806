//! In-memory store with the same semantics as the `PostgreSQL` schema.
//!
//! Transactions run against a copy of the state which replaces the original
//! only when the callback succeeds.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;

use diesel_async::scoped_futures::ScopedBoxFuture;

use adgroup_core::types::{SortField, SortOrder};
use adgroup_db::db::query::ad_group::GroupFilter;
use adgroup_db::model::ad_group::{AdGroup, AdGroupChangeset, NewAdGroup};
use adgroup_db::model::membership::{AdGroupMember, NewAdGroupMember};
use adgroup_db::model::user_group::UserGroup;

use super::{GroupRepo, GroupStore, name_taken};
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    groups: BTreeMap<uuid::Uuid, AdGroup>,
    user_groups: BTreeMap<uuid::Uuid, UserGroup>,
    members: BTreeMap<(uuid::Uuid, uuid::Uuid), AdGroupMember>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// ## Summary
    /// Adds a user group directly, as the owning subsystem would.
    pub fn add_user_group(&mut self, name: &str) -> UserGroup {
        let user_group = UserGroup {
            id: uuid::Uuid::now_v7(),
            name: name.to_string(),
            updated_at: chrono::Utc::now(),
        };
        self.user_groups.insert(user_group.id, user_group.clone());
        user_group
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn membership_count(&self) -> usize {
        self.members.len()
    }

    /// User group IDs of one group, sorted.
    #[must_use]
    pub fn members_of(&self, group_id: uuid::Uuid) -> Vec<uuid::Uuid> {
        self.members
            .keys()
            .filter(|(group, _)| *group == group_id)
            .map(|(_, user_group)| *user_group)
            .collect()
    }

    fn group_ids_for_members(&self, user_group_ids: &[uuid::Uuid]) -> BTreeSet<uuid::Uuid> {
        self.members
            .keys()
            .filter(|(_, user_group)| user_group_ids.contains(user_group))
            .map(|(group, _)| *group)
            .collect()
    }

    fn matching(&self, filter: &GroupFilter) -> Vec<AdGroup> {
        let by_member = filter
            .member_ids
            .as_deref()
            .map(|ids| self.group_ids_for_members(ids));
        let visible = filter
            .visible_through
            .as_deref()
            .map(|ids| self.group_ids_for_members(ids));
        let needle = filter
            .name_search
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(str::to_lowercase);

        self.groups
            .values()
            .filter(|g| filter.ids.as_ref().is_none_or(|ids| ids.contains(&g.id)))
            .filter(|g| by_member.as_ref().is_none_or(|ids| ids.contains(&g.id)))
            .filter(|g| visible.as_ref().is_none_or(|ids| ids.contains(&g.id)))
            .filter(|g| {
                needle
                    .as_deref()
                    .is_none_or(|n| g.name.to_lowercase().contains(n))
            })
            .cloned()
            .collect()
    }

    fn ensure_name_free(&self, name: &str, except: Option<uuid::Uuid>) -> ServiceResult<()> {
        let taken = self
            .groups
            .values()
            .any(|g| g.name == name && Some(g.id) != except);
        if taken {
            Err(ServiceError::ValidationError(name_taken(name)))
        } else {
            Ok(())
        }
    }
}

impl GroupStore for MemoryStore {
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
        async move {
            let mut scratch = self.clone();
            let result = callback(&mut scratch).await;
            if result.is_ok() {
                *self = scratch;
            }
            result
        }
    }
}

impl GroupRepo for MemoryStore {
    async fn groups_by_ids(&mut self, ids: &[uuid::Uuid]) -> ServiceResult<Vec<AdGroup>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.groups.get(id))
            .cloned()
            .collect())
    }

    async fn groups_by_names(&mut self, names: &[String]) -> ServiceResult<Vec<AdGroup>> {
        Ok(self
            .groups
            .values()
            .filter(|g| names.contains(&g.name))
            .cloned()
            .collect())
    }

    async fn search_groups(&mut self, filter: &GroupFilter) -> ServiceResult<Vec<AdGroup>> {
        let mut groups = self.matching(filter);

        match filter.sort {
            SortField::Name => groups.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id))),
            SortField::Id => groups.sort_by_key(|g| g.id),
        }
        if filter.order == SortOrder::Desc {
            groups.reverse();
        }
        if let Some(limit) = filter.limit {
            groups.truncate(usize::try_from(limit).unwrap_or(0));
        }

        Ok(groups)
    }

    async fn count_groups(&mut self, filter: &GroupFilter) -> ServiceResult<i64> {
        i64::try_from(self.matching(filter).len())
            .map_err(|_err| ServiceError::ConstraintError("group count overflow".to_string()))
    }

    async fn existing_user_groups(&mut self, ids: &[uuid::Uuid]) -> ServiceResult<Vec<uuid::Uuid>> {
        Ok(ids
            .iter()
            .copied()
            .filter(|id| self.user_groups.contains_key(id))
            .collect())
    }

    /// Transactions here are already exclusive (`&mut self`), so this only
    /// reports which user groups exist.
    async fn lock_user_groups(&mut self, ids: &[uuid::Uuid]) -> ServiceResult<Vec<uuid::Uuid>> {
        let mut locked: Vec<uuid::Uuid> = ids
            .iter()
            .copied()
            .filter(|id| self.user_groups.contains_key(id))
            .collect();
        locked.sort_unstable();
        locked.dedup();
        Ok(locked)
    }

    async fn memberships(&mut self, group_ids: &[uuid::Uuid]) -> ServiceResult<Vec<AdGroupMember>> {
        Ok(self
            .members
            .values()
            .filter(|m| group_ids.contains(&m.ad_group_id))
            .cloned()
            .collect())
    }

    async fn member_user_groups(
        &mut self,
        group_ids: &[uuid::Uuid],
    ) -> ServiceResult<Vec<(uuid::Uuid, UserGroup)>> {
        let mut rows: Vec<(uuid::Uuid, UserGroup)> = self
            .members
            .keys()
            .filter(|(group, _)| group_ids.contains(group))
            .filter_map(|(group, user_group)| {
                self.user_groups
                    .get(user_group)
                    .map(|ug| (*group, ug.clone()))
            })
            .collect();
        rows.sort_by(|a, b| a.1.name.cmp(&b.1.name));
        Ok(rows)
    }

    async fn association_counts(
        &mut self,
        user_group_ids: &[uuid::Uuid],
    ) -> ServiceResult<HashMap<uuid::Uuid, i64>> {
        let mut counts = HashMap::new();
        for (_, user_group) in self.members.keys() {
            if user_group_ids.contains(user_group) {
                *counts.entry(*user_group).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn insert_group(&mut self, group: &NewAdGroup<'_>) -> ServiceResult<AdGroup> {
        self.ensure_name_free(group.name, None)?;

        let created = AdGroup {
            id: uuid::Uuid::now_v7(),
            name: group.name.to_string(),
            user_type: group.user_type,
            updated_at: chrono::Utc::now(),
        };
        self.groups.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_group(
        &mut self,
        id: uuid::Uuid,
        changes: &AdGroupChangeset,
    ) -> ServiceResult<AdGroup> {
        if let Some(name) = &changes.name {
            self.ensure_name_free(name, Some(id))?;
        }

        let group = self
            .groups
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("AD group {id} does not exist")))?;
        let mut updated = changes.applied_to(group);
        updated.updated_at = chrono::Utc::now();
        *group = updated.clone();
        Ok(updated)
    }

    async fn delete_groups(&mut self, ids: &[uuid::Uuid]) -> ServiceResult<usize> {
        let before = self.groups.len();
        self.groups.retain(|id, _| !ids.contains(id));
        // Memberships cascade, as in the schema.
        self.members.retain(|(group, _), _| !ids.contains(group));
        Ok(before - self.groups.len())
    }

    async fn insert_memberships(&mut self, rows: &[NewAdGroupMember]) -> ServiceResult<usize> {
        for row in rows {
            if !self.groups.contains_key(&row.ad_group_id) {
                return Err(ServiceError::ReferenceError(format!(
                    "AD group {} does not exist",
                    row.ad_group_id
                )));
            }
            if !self.user_groups.contains_key(&row.user_group_id) {
                return Err(ServiceError::ReferenceError(format!(
                    "user group {} does not exist",
                    row.user_group_id
                )));
            }
            let key = (row.ad_group_id, row.user_group_id);
            if self.members.contains_key(&key) {
                return Err(ServiceError::ConstraintError(format!(
                    "user group {} is already a member of AD group {}",
                    row.user_group_id, row.ad_group_id
                )));
            }
            self.members.insert(
                key,
                AdGroupMember {
                    ad_group_id: row.ad_group_id,
                    user_group_id: row.user_group_id,
                    updated_at: chrono::Utc::now(),
                },
            );
        }
        Ok(rows.len())
    }

    async fn delete_memberships(
        &mut self,
        group_id: uuid::Uuid,
        user_group_ids: &[uuid::Uuid],
    ) -> ServiceResult<usize> {
        let before = self.members.len();
        self.members.retain(|(group, user_group), _| {
            *group != group_id || !user_group_ids.contains(user_group)
        });
        Ok(before - self.members.len())
    }

    async fn delete_group_memberships(&mut self, group_ids: &[uuid::Uuid]) -> ServiceResult<usize> {
        let before = self.members.len();
        self.members.retain(|(group, _), _| !group_ids.contains(group));
        Ok(before - self.members.len())
    }
}
