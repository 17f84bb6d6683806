//! The acting principal and the per-request context passed to every operation.

use std::collections::BTreeSet;

use crate::types::UserType;

/// Authenticated identity performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: uuid::Uuid,
    pub user_type: UserType,
    /// User groups the principal belongs to.
    pub user_group_ids: BTreeSet<uuid::Uuid>,
}

impl Principal {
    #[must_use]
    pub fn new(
        id: uuid::Uuid,
        user_type: UserType,
        user_group_ids: impl IntoIterator<Item = uuid::Uuid>,
    ) -> Self {
        Self {
            id,
            user_type,
            user_group_ids: user_group_ids.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn super_admin(id: uuid::Uuid) -> Self {
        Self::new(id, UserType::SuperAdmin, [])
    }

    #[must_use]
    pub const fn is_super_admin(&self) -> bool {
        self.user_type.is_super_admin()
    }
}

/// Request-scoped context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub principal: Principal,
    pub request_id: uuid::Uuid,
}

impl RequestContext {
    /// ## Summary
    /// Creates a context with a fresh time-ordered request id.
    #[must_use]
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            request_id: uuid::Uuid::now_v7(),
        }
    }

    #[must_use]
    pub const fn with_request_id(principal: Principal, request_id: uuid::Uuid) -> Self {
        Self {
            principal,
            request_id,
        }
    }
}
