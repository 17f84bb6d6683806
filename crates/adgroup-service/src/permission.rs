//! Permission gate for directory groups.
//!
//! Super admins may do anything. Everyone else may only read groups that map
//! onto one of their own user groups, and may not write at all.

use adgroup_core::principal::Principal;

use crate::error::{ServiceError, ServiceResult};

/// Read scope of a principal, pushed down into listing queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    All,
    /// Groups mapped onto any of these user groups.
    MemberOf(Vec<uuid::Uuid>),
    Nothing,
}

/// ## Summary
/// Whether `principal` may access a group with the given member user groups.
#[must_use]
pub fn can_access<'a>(
    principal: &Principal,
    group_members: impl IntoIterator<Item = &'a uuid::Uuid>,
) -> bool {
    principal.is_super_admin()
        || group_members
            .into_iter()
            .any(|member| principal.user_group_ids.contains(member))
}

#[must_use]
pub const fn can_write(principal: &Principal) -> bool {
    principal.is_super_admin()
}

/// ## Summary
/// Requires write permission for `action`.
///
/// ## Errors
/// Returns `PermissionError` unless the principal is a super admin.
pub fn require_write(principal: &Principal, action: &str) -> ServiceResult<()> {
    if can_write(principal) {
        Ok(())
    } else {
        tracing::debug!(principal = %principal.id, action, "Write denied");
        Err(ServiceError::PermissionError(format!(
            "only super admins can {action} AD groups"
        )))
    }
}

/// ## Summary
/// Computes what `principal` may list. Asking for editable groups leaves
/// non-super-admins with nothing.
#[must_use]
pub fn visibility(principal: &Principal, editable: bool) -> Visibility {
    if principal.is_super_admin() {
        Visibility::All
    } else if editable || principal.user_group_ids.is_empty() {
        Visibility::Nothing
    } else {
        Visibility::MemberOf(principal.user_group_ids.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use adgroup_core::types::UserType;
    use uuid::Uuid;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn super_admin_always_passes() {
        let admin = Principal::super_admin(Uuid::new_v4());
        assert!(can_access(&admin, &[]));
        assert!(can_write(&admin));
        assert!(require_write(&admin, "create").is_ok());
        assert_eq!(visibility(&admin, true), Visibility::All);
    }

    #[test]
    fn member_access_needs_intersection() {
        let shared = Uuid::new_v4();
        let other = Uuid::new_v4();
        let user = Principal::new(Uuid::new_v4(), UserType::Admin, [shared]);

        assert!(can_access(&user, &[other, shared]));
        assert!(!can_access(&user, &[other]));
        assert!(!can_access(&user, &[]));
    }

    #[test]
    fn non_super_admins_cannot_write() {
        let user = Principal::new(Uuid::new_v4(), UserType::Admin, [Uuid::new_v4()]);
        let err = require_write(&user, "delete").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert!(err.to_string().contains("delete"));
    }

    #[test]
    fn visibility_for_regular_users() {
        let group = Uuid::new_v4();
        let user = Principal::new(Uuid::new_v4(), UserType::User, [group]);
        assert_eq!(visibility(&user, false), Visibility::MemberOf(vec![group]));
        assert_eq!(visibility(&user, true), Visibility::Nothing);

        let loner = Principal::new(Uuid::new_v4(), UserType::User, []);
        assert_eq!(visibility(&loner, false), Visibility::Nothing);
    }
}
