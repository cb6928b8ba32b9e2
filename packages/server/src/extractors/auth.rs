use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::*;

use crate::entity::user;
use crate::error::AppError;
use crate::policy::Role;
use crate::state::AppState;
use crate::utils::jwt;

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// Add this as a handler parameter to require authentication. Authorization
/// decisions happen in `policy` with the extracted actor.
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
    pub is_superuser: bool,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::TokenMissing)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::TokenInvalid)?;

        let claims = jwt::verify(token, &state.config.auth.token_secret)
            .map_err(|_| AppError::TokenInvalid)?;

        // Signature and expiry are checked statelessly; the identity is
        // still resolved per request so removals and role changes take
        // effect without waiting for the token to expire.
        let user = user::Entity::find()
            .filter(user::Column::Username.eq(&claims.sub))
            .one(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let role = Role::parse(&user.role).ok_or_else(|| {
            AppError::Internal(format!("Unknown role '{}' for user {}", user.role, user.id))
        })?;

        Ok(AuthUser {
            user_id: user.id,
            username: user.username,
            role,
            is_superuser: user.is_superuser,
        })
    }
}
