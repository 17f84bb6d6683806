use diesel::{pg::Pg, prelude::*};
use serde::{Deserialize, Serialize};

use crate::db::schema;

/// Local user group; the member side of a directory group.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Queryable, Selectable, Identifiable, Serialize, Deserialize,
)]
#[diesel(table_name = schema::user_group)]
#[diesel(check_for_backend(Pg))]
pub struct UserGroup {
    pub id: uuid::Uuid,
    pub name: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::user_group)]
pub struct NewUserGroup<'a> {
    pub name: &'a str,
}
