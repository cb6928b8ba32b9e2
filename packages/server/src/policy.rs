//! Role model and the per-request authorization decisions.
//!
//! Every privilege check in the crate goes through this module. Handlers
//! never inspect `role` themselves; they call `require_request` before
//! touching the store and `require_contribution_write` once the target
//! object is loaded.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::auth::AuthUser;

/// Closed set of user roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

/// The role assigned to self-registered users.
pub const DEFAULT_ROLE: Role = Role::User;

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "user" => Some(Role::User),
            "moderator" => Some(Role::Moderator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Resource classes distinguished by the policy matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    /// Titles, genres, categories.
    Catalog,
    /// The user directory under `/users` (list, detail by username).
    UserDirectory,
    /// The authenticated user's own profile (`/users/me`).
    OwnProfile,
    /// Reviews and comments.
    Contribution,
}

fn is_admin(actor: &AuthUser) -> bool {
    actor.is_superuser || actor.role == Role::Admin
}

fn is_moderator(actor: &AuthUser) -> bool {
    actor.role == Role::Moderator
}

/// Phase one: actor/action compatibility, decided without any object lookup.
///
/// For `UserDirectory` this runs before the store is touched at all, so a
/// non-admin cannot learn whether a username exists.
pub fn request_allowed(actor: Option<&AuthUser>, access: Access, resource: Resource) -> bool {
    match resource {
        Resource::Catalog => access == Access::Read || actor.is_some_and(is_admin),
        Resource::UserDirectory => actor.is_some_and(is_admin),
        Resource::OwnProfile => actor.is_some(),
        Resource::Contribution => access == Access::Read || actor.is_some(),
    }
}

/// Phase two for reviews and comments: ownership or an elevated role.
pub fn contribution_object_allowed(actor: &AuthUser, access: Access, author_id: i32) -> bool {
    access == Access::Read
        || is_admin(actor)
        || is_moderator(actor)
        || actor.user_id == author_id
}

/// Full decision for a contribution: both phases must pass.
pub fn allowed(actor: Option<&AuthUser>, access: Access, resource: Resource, author_id: Option<i32>) -> bool {
    if !request_allowed(actor, access, resource) {
        return false;
    }
    match (resource, author_id, actor) {
        (Resource::Contribution, Some(author_id), Some(actor)) => {
            contribution_object_allowed(actor, access, author_id)
        }
        (Resource::Contribution, Some(_), None) => access == Access::Read,
        _ => true,
    }
}

pub fn require_request(
    actor: Option<&AuthUser>,
    access: Access,
    resource: Resource,
) -> Result<(), AppError> {
    if request_allowed(actor, access, resource) {
        Ok(())
    } else if actor.is_none() {
        Err(AppError::TokenMissing)
    } else {
        Err(AppError::PermissionDenied)
    }
}

pub fn require_contribution_write(actor: &AuthUser, author_id: i32) -> Result<(), AppError> {
    if contribution_object_allowed(actor, Access::Write, author_id) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}
