use crate::{db::schema, model};
use diesel::{pg::Pg, prelude::*};
use serde::Serialize;

/// Association between a directory group and a user group.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Identifiable, Queryable, Selectable, Associations, Serialize,
)]
#[diesel(table_name = schema::ad_group_member)]
#[diesel(check_for_backend(Pg))]
#[diesel(primary_key(ad_group_id, user_group_id))]
#[diesel(belongs_to(model::ad_group::AdGroup, foreign_key = ad_group_id))]
#[diesel(belongs_to(model::user_group::UserGroup, foreign_key = user_group_id))]
pub struct AdGroupMember {
    pub ad_group_id: uuid::Uuid,
    pub user_group_id: uuid::Uuid,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Insertable)]
#[diesel(table_name = schema::ad_group_member)]
pub struct NewAdGroupMember {
    pub ad_group_id: uuid::Uuid,
    pub user_group_id: uuid::Uuid,
}
