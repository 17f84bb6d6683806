//! Database enum types with Diesel serialization.
//!
//! Each enum maps a `CHECK`-constrained text column and implements `ToSql` and
//! `FromSql` for conversion between Rust and `PostgreSQL`.

use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use std::fmt;
use std::io::Write;

use adgroup_core::types::UserType as CoreUserType;

/// User type granted by a directory group.
///
/// Maps to the `ad_group.user_type` CHECK constraint.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    AsExpression,
    FromSqlRow,
    serde::Serialize,
    serde::Deserialize,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    User,
    Admin,
    SuperAdmin,
}

impl ToSql<Text, Pg> for UserType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for UserType {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match bytes.as_bytes() {
            b"user" => Ok(Self::User),
            b"admin" => Ok(Self::Admin),
            b"super_admin" => Ok(Self::SuperAdmin),
            _ => Err("Unrecognized enum variant".into()),
        }
    }
}

impl UserType {
    /// Returns the database string representation of this user type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CoreUserType> for UserType {
    fn from(value: CoreUserType) -> Self {
        match value {
            CoreUserType::User => Self::User,
            CoreUserType::Admin => Self::Admin,
            CoreUserType::SuperAdmin => Self::SuperAdmin,
        }
    }
}

impl From<UserType> for CoreUserType {
    fn from(value: UserType) -> Self {
        match value {
            UserType::User => Self::User,
            UserType::Admin => Self::Admin,
            UserType::SuperAdmin => Self::SuperAdmin,
        }
    }
}
