use diesel::{pg::Pg, prelude::*};
use serde::{Deserialize, Serialize};

use crate::db::{enums::UserType, schema};

/// Directory group mapped onto local user groups.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Queryable, Selectable, Identifiable, Serialize, Deserialize,
)]
#[diesel(table_name = schema::ad_group)]
#[diesel(check_for_backend(Pg))]
pub struct AdGroup {
    pub id: uuid::Uuid,
    pub name: String,
    pub user_type: UserType,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::ad_group)]
pub struct NewAdGroup<'a> {
    pub name: &'a str,
    pub user_type: UserType,
}

/// Partial update of a directory group; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, AsChangeset, Serialize)]
#[diesel(table_name = schema::ad_group)]
pub struct AdGroupChangeset {
    pub name: Option<String>,
    pub user_type: Option<UserType>,
}

impl AdGroupChangeset {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.user_type.is_none()
    }

    /// Returns `group` with the changes applied, without touching `updated_at`.
    #[must_use]
    pub fn applied_to(&self, group: &AdGroup) -> AdGroup {
        AdGroup {
            id: group.id,
            name: self.name.clone().unwrap_or_else(|| group.name.clone()),
            user_type: self.user_type.unwrap_or(group.user_type),
            updated_at: group.updated_at,
        }
    }
}
