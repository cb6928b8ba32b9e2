use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};

use crate::entity::user;
use crate::error::AppError;
use crate::policy::Role;

use super::shared::{Pagination, double_option};

pub const USERNAME_MAX: usize = 150;
pub const EMAIL_MAX: usize = 254;

/// The self-referential alias used by `/users/me`; no account may claim it.
pub const RESERVED_USERNAME: &str = "me";

/// Validate a username: 1-150 chars from `[A-Za-z0-9_.@+-]`, and not the
/// reserved name in any casing.
pub fn validate_username(username: &str) -> Result<(), AppError> {
    if username.is_empty() || username.chars().count() > USERNAME_MAX {
        return Err(AppError::Validation(format!(
            "Username must be 1-{USERNAME_MAX} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
    {
        return Err(AppError::Validation(
            "Username may contain only letters, digits, and _ . @ + -".into(),
        ));
    }
    if username.eq_ignore_ascii_case(RESERVED_USERNAME) {
        return Err(AppError::Validation(format!(
            "Username '{RESERVED_USERNAME}' is reserved"
        )));
    }
    Ok(())
}

/// Validate an email address: bounded length, one `@`, non-empty local part,
/// and a dotted domain.
pub fn validate_email(email: &str) -> Result<(), AppError> {
    if email.is_empty() || email.chars().count() > EMAIL_MAX {
        return Err(AppError::Validation(format!(
            "Email must be 1-{EMAIL_MAX} characters"
        )));
    }
    let invalid = || AppError::Validation("Email address is not valid".into());
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || !domain.contains('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(())
}

/// A user's profile as returned by `/users/me` and the admin directory.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    /// Username.
    #[schema(example = "alice")]
    pub username: String,
    /// Email address.
    #[schema(example = "alice@example.com")]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    /// Role: `user`, `moderator`, or `admin`.
    #[schema(example = "user")]
    pub role: String,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role,
        }
    }
}

/// Request body for `PATCH /users/me`.
///
/// A `role` key in the body is deliberately not modeled: clients cannot
/// change their own role, and an attempt is ignored rather than rejected.
#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateSelfRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
}

/// Request body for admin user creation.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "bob")]
    pub username: String,
    #[schema(example = "bob@example.com")]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    /// Defaults to `user` when omitted.
    pub role: Option<Role>,
}

/// Request body for admin user updates.
#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
    pub role: Option<Role>,
}

#[derive(Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct UserListItem {
    pub username: String,
    pub email: String,
    pub role: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserListResponse {
    pub data: Vec<UserListItem>,
    pub pagination: Pagination,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Case-insensitive username substring filter.
    pub search: Option<String>,
}
