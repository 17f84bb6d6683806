//! Directory group CRUD service.
//!
//! Every operation checks permissions, validates its input, then performs all
//! reads, invariant checks and writes inside a single store transaction.
//! Audit records are emitted after the transaction commits.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use diesel_async::scoped_futures::ScopedFutureExt;

use adgroup_core::config::GroupsConfig;
use adgroup_core::principal::RequestContext;
use adgroup_core::types::OrphanPolicy;
use adgroup_db::model::ad_group::{AdGroup, AdGroupChangeset, NewAdGroup};
use adgroup_db::model::membership::NewAdGroupMember;
use adgroup_db::model::user_group::UserGroup;

use crate::audit::{
    AD_GROUP_RESOURCE, AuditAction, AuditRecord, AuditSink, GroupSnapshot, TracingAuditSink,
};
use crate::error::{ServiceError, ServiceResult};
use crate::permission;
use crate::reconcile::{self, MembershipDelta};
use crate::store::{GroupRepo, GroupStore, name_taken};

mod request;


pub use request::{CreateGroup, GroupQuery, GroupView, UpdateGroup};

/// Rules the service enforces, usually taken from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPolicy {
    pub name_max_length: usize,
    pub search_limit: usize,
    pub orphan_policy: OrphanPolicy,
}

impl From<&GroupsConfig> for GroupPolicy {
    fn from(config: &GroupsConfig) -> Self {
        Self {
            name_max_length: config.name_max_length,
            search_limit: config.search_limit,
            orphan_policy: config.orphan_policy,
        }
    }
}

impl Default for GroupPolicy {
    fn default() -> Self {
        Self::from(&GroupsConfig::default())
    }
}

/// Before and after state of one mutated group.
type Change = (Option<GroupSnapshot>, Option<GroupSnapshot>);

#[derive(Debug, Clone, Default)]
pub struct GroupService<A = TracingAuditSink> {
    policy: GroupPolicy,
    audit: A,
}

impl<A: AuditSink> GroupService<A> {
    #[must_use]
    pub const fn new(policy: GroupPolicy, audit: A) -> Self {
        Self { policy, audit }
    }

    #[must_use]
    pub const fn policy(&self) -> &GroupPolicy {
        &self.policy
    }

    /// ## Summary
    /// Creates one directory group with its memberships.
    ///
    /// ## Errors
    /// See [`Self::create_many`].
    pub async fn create<S: GroupStore>(
        &self,
        store: &mut S,
        ctx: &RequestContext,
        request: &CreateGroup,
    ) -> ServiceResult<uuid::Uuid> {
        let ids = self
            .create_many(store, ctx, std::slice::from_ref(request))
            .await?;
        ids.into_iter()
            .next()
            .ok_or(ServiceError::CoreError(
                adgroup_core::error::CoreError::InvariantViolation("create returned no id"),
            ))
    }

    /// ## Summary
    /// Creates directory groups and their memberships in one transaction.
    ///
    /// ## Errors
    /// - `PermissionError` unless the principal is a super admin
    /// - `ValidationError` on a bad name or member list, a name repeated in
    ///   the batch, or a name held by an existing group
    /// - `ReferenceError` if a member user group does not exist
    #[tracing::instrument(
        skip(self, store, ctx, requests),
        fields(request_id = %ctx.request_id, principal = %ctx.principal.id, count = requests.len())
    )]
    pub async fn create_many<S: GroupStore>(
        &self,
        store: &mut S,
        ctx: &RequestContext,
        requests: &[CreateGroup],
    ) -> ServiceResult<Vec<uuid::Uuid>> {
        permission::require_write(&ctx.principal, "create")?;
        let member_sets = request::validate_creates(&self.policy, requests)?;

        let member_sets = &member_sets;
        let changes = store
            .in_transaction(|repo| {
                async move {
                    let names: Vec<String> = requests.iter().map(|r| r.name.clone()).collect();
                    if let Some(existing) = repo.groups_by_names(&names).await?.first() {
                        return Err(ServiceError::ValidationError(name_taken(&existing.name)));
                    }

                    ensure_user_groups_exist(repo, member_sets.iter().flatten().copied()).await?;

                    let mut changes: Vec<Change> = Vec::with_capacity(requests.len());
                    for (request, members) in requests.iter().zip(member_sets) {
                        let group = repo
                            .insert_group(&NewAdGroup {
                                name: &request.name,
                                user_type: request.user_type.into(),
                            })
                            .await?;

                        let rows = membership_rows(group.id, members);
                        repo.insert_memberships(&rows).await?;

                        changes.push((None, Some(GroupSnapshot::new(&group, members.iter().copied()))));
                    }
                    Ok(changes)
                }
                .scope_boxed()
            })
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "AD group creation rejected"))?;

        let ids = self.emit(ctx, AuditAction::Add, changes);
        tracing::info!(?ids, "AD groups created");
        Ok(ids)
    }

    /// ## Summary
    /// Updates one directory group.
    ///
    /// ## Errors
    /// See [`Self::update_many`].
    pub async fn update<S: GroupStore>(
        &self,
        store: &mut S,
        ctx: &RequestContext,
        request: &UpdateGroup,
    ) -> ServiceResult<uuid::Uuid> {
        self.update_many(store, ctx, std::slice::from_ref(request))
            .await?;
        Ok(request.id)
    }

    /// ## Summary
    /// Applies partial updates to directory groups in one transaction.
    ///
    /// Only fields that are present and differ from the stored value are
    /// written. A member list replaces the group's membership through the
    /// reconciler.
    ///
    /// ## Errors
    /// - `PermissionError` unless the principal is a super admin
    /// - `ValidationError` on a bad name or member list, a repeated ID or
    ///   name in the batch, or a name held by another group
    /// - `NotFound` if a group does not exist
    /// - `ReferenceError` if a member user group does not exist
    /// - `ConstraintError` if a user group would lose its last association
    ///   while orphans are forbidden
    #[tracing::instrument(
        skip(self, store, ctx, requests),
        fields(request_id = %ctx.request_id, principal = %ctx.principal.id, count = requests.len())
    )]
    pub async fn update_many<S: GroupStore>(
        &self,
        store: &mut S,
        ctx: &RequestContext,
        requests: &[UpdateGroup],
    ) -> ServiceResult<Vec<uuid::Uuid>> {
        permission::require_write(&ctx.principal, "update")?;
        let member_sets = request::validate_updates(&self.policy, requests)?;

        let orphan_policy = self.policy.orphan_policy;
        let member_sets = &member_sets;
        let changes = store
            .in_transaction(|repo| {
                async move {
                    let ids: Vec<uuid::Uuid> = requests.iter().map(|r| r.id).collect();
                    let groups = load_groups(repo, &ids).await?;

                    let renames: Vec<String> = requests
                        .iter()
                        .filter_map(|r| {
                            r.name
                                .as_ref()
                                .filter(|name| groups.get(&r.id).is_some_and(|g| &g.name != *name))
                                .cloned()
                        })
                        .collect();
                    let holders = repo.groups_by_names(&renames).await?;
                    for holder in &holders {
                        let renamed_onto_other = requests
                            .iter()
                            .any(|r| r.name.as_ref() == Some(&holder.name) && r.id != holder.id);
                        if renamed_onto_other {
                            return Err(ServiceError::ValidationError(name_taken(&holder.name)));
                        }
                    }

                    ensure_user_groups_exist(repo, member_sets.iter().flatten().flatten().copied())
                        .await?;

                    let mut current = current_members(repo, &ids).await?;
                    let deltas: Vec<Option<MembershipDelta<uuid::Uuid>>> = requests
                        .iter()
                        .zip(member_sets)
                        .map(|(r, desired)| {
                            desired.as_ref().map(|desired| {
                                reconcile::reconcile(
                                    current.get(&r.id).unwrap_or(&BTreeSet::new()),
                                    desired,
                                )
                            })
                        })
                        .collect();

                    if orphan_policy.forbids_orphans() {
                        let removed: Vec<(uuid::Uuid, &BTreeSet<uuid::Uuid>)> = requests
                            .iter()
                            .zip(&deltas)
                            .filter_map(|(r, d)| d.as_ref().map(|d| (r.id, &d.to_delete)))
                            .collect();
                        let re_added: BTreeSet<uuid::Uuid> = deltas
                            .iter()
                            .flatten()
                            .flat_map(|d| d.to_insert.iter().copied())
                            .collect();
                        check_orphans(repo, &groups, &removed, &re_added).await?;
                    }

                    let mut changes: Vec<Change> = Vec::with_capacity(requests.len());
                    for (request, delta) in requests.iter().zip(&deltas) {
                        let Some(before) = groups.get(&request.id) else {
                            continue;
                        };
                        let members_before = current.remove(&request.id).unwrap_or_default();

                        let changeset = changeset_for(before, request);
                        let after = if changeset.is_empty() {
                            before.clone()
                        } else {
                            tracing::debug!(id = %request.id, ?changeset, "Updating AD group");
                            repo.update_group(request.id, &changeset).await?
                        };

                        let members_after = match delta {
                            Some(delta) if !delta.is_empty() => {
                                apply_delta(repo, request.id, delta).await?;
                                delta.apply(&members_before)
                            }
                            _ => members_before.clone(),
                        };

                        changes.push((
                            Some(GroupSnapshot::new(before, members_before)),
                            Some(GroupSnapshot::new(&after, members_after)),
                        ));
                    }
                    Ok(changes)
                }
                .scope_boxed()
            })
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "AD group update rejected"))?;

        let ids = self.emit(ctx, AuditAction::Update, changes);
        tracing::info!(?ids, "AD groups updated");
        Ok(ids)
    }

    /// ## Summary
    /// Deletes directory groups and their memberships in one transaction.
    ///
    /// ## Errors
    /// - `PermissionError` unless the principal is a super admin
    /// - `ValidationError` on an empty or repeated ID list
    /// - `NotFound` if a group does not exist
    /// - `ConstraintError` if a user group would lose its last association
    ///   while orphans are forbidden
    #[tracing::instrument(
        skip(self, store, ctx),
        fields(request_id = %ctx.request_id, principal = %ctx.principal.id)
    )]
    pub async fn delete<S: GroupStore>(
        &self,
        store: &mut S,
        ctx: &RequestContext,
        ids: &[uuid::Uuid],
    ) -> ServiceResult<Vec<uuid::Uuid>> {
        permission::require_write(&ctx.principal, "delete")?;
        request::validate_ids(ids)?;

        let orphan_policy = self.policy.orphan_policy;
        let changes = store
            .in_transaction(|repo| {
                async move {
                    let groups = load_groups(repo, ids).await?;
                    let current = current_members(repo, ids).await?;

                    if orphan_policy.forbids_orphans() {
                        let removed: Vec<(uuid::Uuid, &BTreeSet<uuid::Uuid>)> =
                            current.iter().map(|(id, members)| (*id, members)).collect();
                        check_orphans(repo, &groups, &removed, &BTreeSet::new()).await?;
                    }

                    repo.delete_group_memberships(ids).await?;
                    repo.delete_groups(ids).await?;

                    let changes: Vec<Change> = ids
                        .iter()
                        .filter_map(|id| groups.get(id))
                        .map(|group| {
                            let members = current.get(&group.id).cloned().unwrap_or_default();
                            (Some(GroupSnapshot::new(group, members)), None)
                        })
                        .collect();
                    Ok(changes)
                }
                .scope_boxed()
            })
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "AD group deletion rejected"))?;

        let ids = self.emit(ctx, AuditAction::Delete, changes);
        tracing::info!(?ids, "AD groups deleted");
        Ok(ids)
    }

    /// ## Summary
    /// Loads one directory group with its members.
    ///
    /// ## Errors
    /// `NotFound` if the group does not exist or the principal cannot see it.
    #[tracing::instrument(
        skip(self, store, ctx),
        fields(request_id = %ctx.request_id, principal = %ctx.principal.id)
    )]
    pub async fn get<S: GroupStore>(
        &self,
        store: &mut S,
        ctx: &RequestContext,
        id: uuid::Uuid,
    ) -> ServiceResult<GroupView> {
        let principal = &ctx.principal;
        store
            .in_transaction(|repo| {
                async move {
                    let group = repo
                        .groups_by_ids(&[id])
                        .await?
                        .into_iter()
                        .next()
                        .ok_or_else(|| not_found(id))?;

                    let members: Vec<UserGroup> = repo
                        .member_user_groups(&[id])
                        .await?
                        .into_iter()
                        .map(|(_, user_group)| user_group)
                        .collect();

                    if !permission::can_access(principal, members.iter().map(|m| &m.id)) {
                        tracing::debug!(%id, "AD group not visible to principal");
                        return Err(not_found(id));
                    }

                    Ok(GroupView {
                        group,
                        members: Some(members),
                    })
                }
                .scope_boxed()
            })
            .await
    }

    /// ## Summary
    /// Lists the directory groups visible to the principal.
    ///
    /// ## Errors
    /// Returns storage errors only.
    #[tracing::instrument(
        skip(self, store, ctx),
        fields(request_id = %ctx.request_id, principal = %ctx.principal.id)
    )]
    pub async fn list<S: GroupStore>(
        &self,
        store: &mut S,
        ctx: &RequestContext,
        query: &GroupQuery,
    ) -> ServiceResult<Vec<GroupView>> {
        let visibility = permission::visibility(&ctx.principal, query.editable);
        let Some(filter) = query.to_filter(&self.policy, visibility) else {
            tracing::debug!("Principal sees no AD groups");
            return Ok(Vec::new());
        };

        let with_members = query.with_members;
        let filter = &filter;
        store
            .in_transaction(|repo| {
                async move {
                    let groups = repo.search_groups(filter).await?;
                    if !with_members {
                        return Ok(groups
                            .into_iter()
                            .map(|group| GroupView {
                                group,
                                members: None,
                            })
                            .collect());
                    }

                    let ids: Vec<uuid::Uuid> = groups.iter().map(|g| g.id).collect();
                    let mut members: HashMap<uuid::Uuid, Vec<UserGroup>> = HashMap::new();
                    for (group_id, user_group) in repo.member_user_groups(&ids).await? {
                        members.entry(group_id).or_default().push(user_group);
                    }

                    Ok(groups
                        .into_iter()
                        .map(|group| {
                            let group_members = members.remove(&group.id).unwrap_or_default();
                            GroupView {
                                group,
                                members: Some(group_members),
                            }
                        })
                        .collect())
                }
                .scope_boxed()
            })
            .await
    }

    /// ## Summary
    /// Counts the directory groups visible to the principal that match
    /// `query`, ignoring its limit.
    ///
    /// ## Errors
    /// Returns storage errors only.
    #[tracing::instrument(
        skip(self, store, ctx),
        fields(request_id = %ctx.request_id, principal = %ctx.principal.id)
    )]
    pub async fn count<S: GroupStore>(
        &self,
        store: &mut S,
        ctx: &RequestContext,
        query: &GroupQuery,
    ) -> ServiceResult<i64> {
        let visibility = permission::visibility(&ctx.principal, query.editable);
        let Some(mut filter) = query.to_filter(&self.policy, visibility) else {
            return Ok(0);
        };
        filter.limit = None;

        let filter = &filter;
        store
            .in_transaction(|repo| async move { repo.count_groups(filter).await }.scope_boxed())
            .await
    }

    /// Hands committed changes to the audit sink and returns the group IDs.
    fn emit(&self, ctx: &RequestContext, action: AuditAction, changes: Vec<Change>) -> Vec<uuid::Uuid> {
        changes
            .into_iter()
            .filter_map(|(before, after)| {
                let resource_id = after.as_ref().or(before.as_ref())?.id;
                self.audit.record(AuditRecord {
                    action,
                    resource: AD_GROUP_RESOURCE,
                    resource_id,
                    request_id: ctx.request_id,
                    principal_id: ctx.principal.id,
                    before,
                    after,
                });
                Some(resource_id)
            })
            .collect()
    }
}

fn not_found(id: uuid::Uuid) -> ServiceError {
    ServiceError::NotFound(format!("AD group {id} does not exist"))
}

fn membership_rows(group_id: uuid::Uuid, members: &BTreeSet<uuid::Uuid>) -> Vec<NewAdGroupMember> {
    members
        .iter()
        .map(|&user_group_id| NewAdGroupMember {
            ad_group_id: group_id,
            user_group_id,
        })
        .collect()
}

/// Changeset holding only the fields that differ from the stored group.
fn changeset_for(group: &AdGroup, request: &UpdateGroup) -> AdGroupChangeset {
    AdGroupChangeset {
        name: request.name.clone().filter(|name| *name != group.name),
        user_type: request
            .user_type
            .map(Into::into)
            .filter(|user_type| *user_type != group.user_type),
    }
}

/// Loads groups by ID, failing with `NotFound` on the first missing one.
async fn load_groups<R: GroupRepo>(
    repo: &mut R,
    ids: &[uuid::Uuid],
) -> ServiceResult<HashMap<uuid::Uuid, AdGroup>> {
    let groups: HashMap<uuid::Uuid, AdGroup> = repo
        .groups_by_ids(ids)
        .await?
        .into_iter()
        .map(|g| (g.id, g))
        .collect();

    match ids.iter().find(|id| !groups.contains_key(id)) {
        Some(missing) => Err(not_found(*missing)),
        None => Ok(groups),
    }
}

async fn current_members<R: GroupRepo>(
    repo: &mut R,
    ids: &[uuid::Uuid],
) -> ServiceResult<BTreeMap<uuid::Uuid, BTreeSet<uuid::Uuid>>> {
    let mut current: BTreeMap<uuid::Uuid, BTreeSet<uuid::Uuid>> = BTreeMap::new();
    for row in repo.memberships(ids).await? {
        current
            .entry(row.ad_group_id)
            .or_default()
            .insert(row.user_group_id);
    }
    Ok(current)
}

async fn ensure_user_groups_exist<R: GroupRepo>(
    repo: &mut R,
    ids: impl IntoIterator<Item = uuid::Uuid>,
) -> ServiceResult<()> {
    let wanted: BTreeSet<uuid::Uuid> = ids.into_iter().collect();
    if wanted.is_empty() {
        return Ok(());
    }

    let lookup: Vec<uuid::Uuid> = wanted.iter().copied().collect();
    let existing: BTreeSet<uuid::Uuid> = repo.existing_user_groups(&lookup).await?.into_iter().collect();

    match wanted.difference(&existing).next() {
        Some(missing) => Err(ServiceError::ReferenceError(format!(
            "user group {missing} does not exist"
        ))),
        None => Ok(()),
    }
}

/// ## Summary
/// Fails if removing `removed` (group ID, user groups it drops) would leave a
/// user group with no directory group at all.
async fn check_orphans<R: GroupRepo>(
    repo: &mut R,
    groups: &HashMap<uuid::Uuid, AdGroup>,
    removed: &[(uuid::Uuid, &BTreeSet<uuid::Uuid>)],
    re_added: &BTreeSet<uuid::Uuid>,
) -> ServiceResult<()> {
    let removals = reconcile::removal_counts(removed.iter().map(|(_, members)| *members));
    if removals.is_empty() {
        return Ok(());
    }

    let lookup: Vec<uuid::Uuid> = removals.keys().copied().collect();
    repo.lock_user_groups(&lookup).await?;
    let counts = repo.association_counts(&lookup).await?;
    let orphans = reconcile::orphaned_members(&removals, &counts, re_added);

    let Some(orphan) = orphans.first() else {
        return Ok(());
    };

    let group_name = removed
        .iter()
        .find(|(_, members)| members.contains(orphan))
        .and_then(|(id, _)| groups.get(id))
        .map_or_else(String::new, |g| g.name.clone());

    tracing::debug!(%orphan, group = %group_name, "Change would orphan user group");
    Err(ServiceError::ConstraintError(format!(
        "AD group \"{group_name}\" holds the last association of user group {orphan}"
    )))
}

async fn apply_delta<R: GroupRepo>(
    repo: &mut R,
    group_id: uuid::Uuid,
    delta: &MembershipDelta<uuid::Uuid>,
) -> ServiceResult<()> {
    if !delta.to_delete.is_empty() {
        let to_delete: Vec<uuid::Uuid> = delta.to_delete.iter().copied().collect();
        repo.delete_memberships(group_id, &to_delete).await?;
    }

    if !delta.to_insert.is_empty() {
        repo.insert_memberships(&membership_rows(group_id, &delta.to_insert))
            .await?;
    }

    Ok(())
}
