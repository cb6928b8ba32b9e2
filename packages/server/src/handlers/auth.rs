use axum::{Json, extract::State};
use chrono::{Duration, Utc};
use sea_orm::*;
use tracing::instrument;

use crate::entity::user;
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::auth::{
    SignupRequest, SignupResponse, TokenRequest, TokenResponse, validate_signup_request,
    validate_token_request,
};
use crate::policy;
use crate::state::AppState;
use crate::utils::{confirmation, jwt};

const CONFIRMATION_SUBJECT: &str = "Your Laurel confirmation code";

/// Register a new account, or re-request a code for an existing one.
///
/// The confirmation code goes out by email and is never part of the
/// response. Repeating the call with the same (username, email) pair is the
/// supported way to recover from a lost mail.
#[utoipa::path(
    post,
    path = "/signup",
    tag = "Auth",
    operation_id = "signup",
    summary = "Register and receive a confirmation code by email",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Code issued and dispatched", body = SignupResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Username or email belongs to a different account (CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<Json<SignupResponse>, AppError> {
    validate_signup_request(&payload)?;

    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_string();

    let by_username = user::Entity::find()
        .filter(user::Column::Username.eq(&username))
        .one(&state.db)
        .await?;
    let by_email = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.db)
        .await?;

    let user = match (by_username, by_email) {
        // The pair points at one account: idempotent re-request.
        (Some(by_username), Some(by_email)) if by_username.id == by_email.id => by_username,
        (_, Some(_)) => {
            return Err(AppError::Conflict(
                "Email is already registered under a different username".into(),
            ));
        }
        (Some(_), _) => {
            return Err(AppError::Conflict(
                "Username is already registered with a different email".into(),
            ));
        }
        (None, None) => {
            let new_user = user::ActiveModel {
                username: Set(username),
                email: Set(email),
                role: Set(policy::DEFAULT_ROLE.as_str().to_string()),
                is_superuser: Set(false),
                is_active: Set(false),
                created_at: Set(Utc::now()),
                ..Default::default()
            };

            // The unique columns are the real guard; the lookups above only
            // shape the error message. A lost race lands here.
            new_user.insert(&state.db).await.map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    AppError::Conflict("Username or email was registered concurrently".into())
                }
                _ => AppError::from(e),
            })?
        }
    };

    let code = confirmation::issue(&user, &state.config.auth.token_secret, Utc::now());
    let body = format!(
        "Hello {},\n\nYour confirmation code is: {}\n\nExchange it at /api/v1/auth/token within {} hours.",
        user.username, code, state.config.auth.confirmation_ttl_hours,
    );

    // The user row is already committed; a failed dispatch is reported, not
    // compensated.
    let warning = match state.mailer.send(&user.email, CONFIRMATION_SUBJECT, &body).await {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(error = %e, username = %user.username, "Confirmation mail dispatch failed");
            Some("Confirmation email could not be delivered; repeat signup to request a new code".into())
        }
    };

    Ok(Json(SignupResponse {
        email: user.email,
        username: user.username,
        warning,
    }))
}

/// Exchange a confirmation code for a bearer token.
#[utoipa::path(
    post,
    path = "/token",
    tag = "Auth",
    operation_id = "obtainToken",
    summary = "Exchange a confirmation code for a bearer token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Invalid or stale code (INVALID_CONFIRMATION_CODE)", body = ErrorBody),
        (status = 404, description = "Unknown username (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn token(
    State(state): State<AppState>,
    AppJson(payload): AppJson<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    validate_token_request(&payload)?;

    let username = payload.username.trim();

    let user = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let ttl = Duration::hours(state.config.auth.confirmation_ttl_hours);
    if !confirmation::verify(
        &user,
        &payload.confirmation_code,
        &state.config.auth.token_secret,
        ttl,
        Utc::now(),
    ) {
        return Err(AppError::InvalidConfirmationCode);
    }

    // First exchange activates the account. The write also rotates the state
    // fingerprint, so the code that was just used stops verifying.
    let user = if user.is_active {
        user
    } else {
        let mut active: user::ActiveModel = user.into();
        active.is_active = Set(true);
        active.update(&state.db).await?
    };

    let token = jwt::sign(
        user.id,
        &user.username,
        &state.config.auth.token_secret,
        state.config.auth.token_ttl_hours,
    )
    .map_err(|e| AppError::Internal(format!("Token sign error: {e}")))?;

    Ok(Json(TokenResponse {
        username: user.username,
        token,
    }))
}
