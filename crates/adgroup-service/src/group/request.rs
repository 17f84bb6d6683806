//! Typed requests accepted by the group service and their boundary validation.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use adgroup_core::types::{SortField, SortOrder, UserType};
use adgroup_db::db::query::ad_group::GroupFilter;
use adgroup_db::model::ad_group::AdGroup;
use adgroup_db::model::user_group::UserGroup;

use super::GroupPolicy;
use crate::error::{ServiceError, ServiceResult};
use crate::permission::Visibility;

/// A directory group to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    #[serde(default)]
    pub user_type: UserType,
    /// User groups the directory group maps to. Must not be empty.
    pub members: Vec<uuid::Uuid>,
}

/// Partial update of a directory group.
///
/// `members`, when present, replaces the whole membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateGroup {
    pub id: uuid::Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user_type: Option<UserType>,
    #[serde(default)]
    pub members: Option<Vec<uuid::Uuid>>,
}

impl UpdateGroup {
    #[must_use]
    pub const fn new(id: uuid::Uuid) -> Self {
        Self {
            id,
            name: None,
            user_type: None,
            members: None,
        }
    }
}

/// Listing options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupQuery {
    pub ids: Option<Vec<uuid::Uuid>>,
    /// Only groups mapped onto any of these user groups.
    pub member_ids: Option<Vec<uuid::Uuid>>,
    /// Case-insensitive substring of the group name.
    pub name_search: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
    /// Capped at the configured search limit.
    pub limit: Option<usize>,
    pub with_members: bool,
    /// Only groups the principal may edit.
    pub editable: bool,
}

impl GroupQuery {
    /// ## Summary
    /// Builds the storage filter for this query within `visibility`.
    ///
    /// Returns `None` when nothing is visible.
    pub(crate) fn to_filter(&self, policy: &GroupPolicy, visibility: Visibility) -> Option<GroupFilter> {
        let visible_through = match visibility {
            Visibility::All => None,
            Visibility::MemberOf(ids) => Some(ids),
            Visibility::Nothing => return None,
        };

        let limit = self
            .limit
            .map_or(policy.search_limit, |limit| limit.min(policy.search_limit));

        Some(GroupFilter {
            ids: self.ids.clone(),
            member_ids: self.member_ids.clone(),
            name_search: self.name_search.clone(),
            visible_through,
            sort: self.sort,
            order: self.order,
            limit: Some(i64::try_from(limit).unwrap_or(i64::MAX)),
        })
    }
}

/// A directory group as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    #[serde(flatten)]
    pub group: AdGroup,
    /// Member user groups ordered by name; `None` unless requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<UserGroup>>,
}

impl GroupView {
    #[must_use]
    pub fn member_ids(&self) -> Option<Vec<uuid::Uuid>> {
        self.members
            .as_ref()
            .map(|members| members.iter().map(|m| m.id).collect())
    }
}

pub(crate) fn validate_name(policy: &GroupPolicy, name: &str) -> ServiceResult<()> {
    if name.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "AD group name cannot be empty".to_string(),
        ));
    }

    if name.chars().count() > policy.name_max_length {
        return Err(ServiceError::ValidationError(format!(
            "AD group name \"{name}\" is longer than {} characters",
            policy.name_max_length
        )));
    }

    Ok(())
}

/// Checks a membership list and returns it as a set.
pub(crate) fn validate_members(
    group_name: &str,
    members: &[uuid::Uuid],
) -> ServiceResult<BTreeSet<uuid::Uuid>> {
    if members.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "AD group \"{group_name}\" must have at least one user group"
        )));
    }

    let mut set = BTreeSet::new();
    for member in members {
        if !set.insert(*member) {
            return Err(ServiceError::ValidationError(format!(
                "user group {member} is listed more than once for AD group \"{group_name}\""
            )));
        }
    }

    Ok(set)
}

/// ## Summary
/// Validates a create batch and returns each request's member set.
///
/// ## Errors
/// `ValidationError` on an empty batch, a bad name or member list, or a name
/// repeated within the batch.
pub(crate) fn validate_creates(
    policy: &GroupPolicy,
    requests: &[CreateGroup],
) -> ServiceResult<Vec<BTreeSet<uuid::Uuid>>> {
    if requests.is_empty() {
        return Err(ServiceError::ValidationError(
            "no AD groups to create".to_string(),
        ));
    }

    let mut names = HashSet::new();
    requests
        .iter()
        .map(|request| {
            validate_name(policy, &request.name)?;
            if !names.insert(request.name.as_str()) {
                return Err(ServiceError::ValidationError(format!(
                    "AD group \"{}\" is listed more than once",
                    request.name
                )));
            }
            validate_members(&request.name, &request.members)
        })
        .collect()
}

/// ## Summary
/// Validates an update batch and returns each request's replacement member
/// set, if any.
///
/// ## Errors
/// `ValidationError` on an empty batch, a repeated ID or new name, or a bad
/// name or member list.
pub(crate) fn validate_updates(
    policy: &GroupPolicy,
    requests: &[UpdateGroup],
) -> ServiceResult<Vec<Option<BTreeSet<uuid::Uuid>>>> {
    if requests.is_empty() {
        return Err(ServiceError::ValidationError(
            "no AD groups to update".to_string(),
        ));
    }

    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    requests
        .iter()
        .map(|request| {
            if !ids.insert(request.id) {
                return Err(ServiceError::ValidationError(format!(
                    "AD group {} is listed more than once",
                    request.id
                )));
            }

            if let Some(name) = &request.name {
                validate_name(policy, name)?;
                if !names.insert(name.as_str()) {
                    return Err(ServiceError::ValidationError(format!(
                        "AD group name \"{name}\" is used more than once"
                    )));
                }
            }

            let label = request
                .name
                .clone()
                .unwrap_or_else(|| request.id.to_string());
            request
                .members
                .as_deref()
                .map(|members| validate_members(&label, members))
                .transpose()
        })
        .collect()
}

/// ## Summary
/// Validates the IDs of a delete batch.
///
/// ## Errors
/// `ValidationError` on an empty or repeated ID list.
pub(crate) fn validate_ids(ids: &[uuid::Uuid]) -> ServiceResult<()> {
    if ids.is_empty() {
        return Err(ServiceError::ValidationError(
            "no AD groups to delete".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
        return Err(ServiceError::ValidationError(format!(
            "AD group {dup} is listed more than once"
        )));
    }

    Ok(())
}
