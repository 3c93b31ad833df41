use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// Role
///
/// The closed set of roles a user can hold. Unknown strings never become a
/// `Role`: they fail in `FromStr`/`TryFrom` (database rows) and in serde
/// (request payloads), so every check downstream works on a valid value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Guest,
    User,
    Moderator,
    Admin,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Whether comments still awaiting moderation are visible to this role.
    pub fn sees_unmoderated(&self) -> bool {
        !matches!(self, Role::Guest)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(Role::Guest),
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Owned
///
/// Anything with a single owning user: blogs, comments, photos, and users
/// themselves.
pub trait Owned {
    fn owner_id(&self) -> i64;
}

/// Identity
///
/// The minimal view of an actor the permission predicates need.
pub trait Identity {
    fn id(&self) -> i64;
    fn role(&self) -> Role;
}

pub fn is_admin(user: &impl Identity) -> bool {
    user.role() == Role::Admin
}

pub fn is_moderator(user: &impl Identity) -> bool {
    user.role() == Role::Moderator
}

pub fn is_owner(user: &impl Identity, resource: &(impl Owned + ?Sized)) -> bool {
    user.id() == resource.owner_id()
}
