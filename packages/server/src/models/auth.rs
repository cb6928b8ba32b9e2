use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::user::{validate_email, validate_username};

/// Request body for signup.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SignupRequest {
    /// Email address the confirmation code is sent to.
    #[schema(example = "alice@example.com")]
    pub email: String,
    /// Unique username (1-150 chars from `[A-Za-z0-9_.@+-]`; `me` is reserved).
    #[schema(example = "alice")]
    pub username: String,
}

pub fn validate_signup_request(payload: &SignupRequest) -> Result<(), AppError> {
    validate_username(payload.username.trim())?;
    validate_email(payload.email.trim())?;
    Ok(())
}

/// Signup echo. The confirmation code itself travels by email only.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SignupResponse {
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[schema(example = "alice")]
    pub username: String,
    /// Present when the confirmation mail could not be dispatched. The
    /// account is registered regardless; re-running signup re-sends a code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Request body for exchanging a confirmation code for a bearer token.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct TokenRequest {
    #[schema(example = "alice")]
    pub username: String,
    #[schema(example = "t1abcd-9f8a...")]
    pub confirmation_code: String,
}

pub fn validate_token_request(payload: &TokenRequest) -> Result<(), AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::Validation("Username must not be empty".into()));
    }
    if payload.confirmation_code.is_empty() {
        return Err(AppError::Validation(
            "Confirmation code must not be empty".into(),
        ));
    }
    Ok(())
}

/// Successful token exchange.
#[derive(Serialize, utoipa::ToSchema)]
pub struct TokenResponse {
    #[schema(example = "alice")]
    pub username: String,
    /// JWT bearer token.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
}
