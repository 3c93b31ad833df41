//! Authorization guard.
//!
//! Every mutation is checked here, once, against a `(role, operation)` policy
//! table. Handlers never compare role strings themselves.

use crate::{
    error::{AppError, AppResult},
    roles::{Identity, Owned, Role, is_owner},
};

pub const INSUFFICIENT_PERMISSIONS: &str = "insufficient permissions";

/// The mutations the guard knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    UpdateBlog,
    DeleteBlog,
    AttachPhoto,
    DeleteComment,
    ModerateComment,
    ListUsers,
    DeleteUser,
    AssignRole,
}

/// What a role is granted for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// Allowed on any target.
    Any,
    /// Allowed only when the actor owns the target.
    OwnerOnly,
    Never,
}

/// The policy table. Order of precedence: admins get everything, moderators
/// may delete and moderate any comment, everyone else falls back to ownership.
pub fn grant(role: Role, op: Operation) -> Grant {
    use Operation::*;

    match (role, op) {
        (Role::Admin, _) => Grant::Any,
        (Role::Moderator, DeleteComment | ModerateComment) => Grant::Any,
        (_, ModerateComment | ListUsers | AssignRole) => Grant::Never,
        (_, UpdateBlog | DeleteBlog | AttachPhoto | DeleteComment | DeleteUser) => {
            Grant::OwnerOnly
        }
    }
}

/// Decides whether `actor` may perform `op` on `resource`.
///
/// Denials are always surfaced as `AppError::Permission`.
pub fn authorize(
    actor: &impl Identity,
    resource: &(impl Owned + ?Sized),
    op: Operation,
) -> AppResult<()> {
    let allowed = match grant(actor.role(), op) {
        Grant::Any => true,
        Grant::OwnerOnly => is_owner(actor, resource),
        Grant::Never => false,
    };

    if allowed {
        Ok(())
    } else {
        tracing::warn!(
            actor_id = actor.id(),
            role = %actor.role(),
            operation = ?op,
            "Mutation denied"
        );
        Err(AppError::Permission(INSUFFICIENT_PERMISSIONS.to_string()))
    }
}

/// Role-only check for operations that have no owned target (e.g. listing users).
pub fn require(actor: &impl Identity, op: Operation) -> AppResult<()> {
    match grant(actor.role(), op) {
        Grant::Any => Ok(()),
        Grant::OwnerOnly | Grant::Never => {
            tracing::warn!(actor_id = actor.id(), role = %actor.role(), operation = ?op, "Operation denied");
            Err(AppError::Permission(INSUFFICIENT_PERMISSIONS.to_string()))
        }
    }
}
