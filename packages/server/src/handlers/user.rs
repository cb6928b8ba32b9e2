use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr, Query as SeaQuery};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{comment, review, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::shared::{Pagination, escape_like};
use crate::models::user::{
    CreateUserRequest, UpdateSelfRequest, UpdateUserRequest, UserListItem, UserListQuery,
    UserListResponse, UserResponse, validate_email, validate_username,
};
use crate::policy::{self, Access, Resource};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/me",
    tag = "Users",
    operation_id = "getOwnProfile",
    summary = "Get the authenticated user's profile",
    responses(
        (status = 200, description = "Own profile", body = UserResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(username = %auth_user.username))]
pub async fn get_own_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, AppError> {
    policy::require_request(Some(&auth_user), Access::Read, Resource::OwnProfile)?;

    let user = find_user(&state.db, &auth_user.username).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    patch,
    path = "/me",
    tag = "Users",
    operation_id = "updateOwnProfile",
    summary = "Update the authenticated user's profile",
    description = "Partially updates the caller's own profile. A `role` field in the body is ignored; roles change only through the admin directory.",
    request_body = UpdateSelfRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 409, description = "Username or email already in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(username = %auth_user.username))]
pub async fn update_own_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateSelfRequest>,
) -> Result<Json<UserResponse>, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::OwnProfile)?;

    let user = find_user(&state.db, &auth_user.username).await?;

    if payload == UpdateSelfRequest::default() {
        return Ok(Json(user.into()));
    }

    let mut active: user::ActiveModel = user.into();
    if let Some(ref username) = payload.username {
        let username = username.trim();
        validate_username(username)?;
        active.username = Set(username.to_string());
    }
    if let Some(ref email) = payload.email {
        let email = email.trim();
        validate_email(email)?;
        active.email = Set(email.to_string());
    }
    if let Some(first_name) = payload.first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = payload.last_name {
        active.last_name = Set(last_name);
    }
    if let Some(bio) = payload.bio {
        active.bio = Set(bio);
    }

    let updated = active.update(&state.db).await.map_err(unique_to_conflict)?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Users",
    operation_id = "listUsers",
    summary = "List users (admin)",
    params(UserListQuery),
    responses(
        (status = 200, description = "List of users", body = UserListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_users(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    policy::require_request(Some(&auth_user), Access::Read, Resource::UserDirectory)?;

    let page = Ord::max(query.page.unwrap_or(1), 1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let mut select = user::Entity::find();

    if let Some(ref search) = query.search {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(user::Column::Username)))
                    .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
            );
        }
    }

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;
    let total_pages = total.div_ceil(per_page);

    let data = select
        .order_by(user::Column::Username, Order::Asc)
        .select_only()
        .column(user::Column::Username)
        .column(user::Column::Email)
        .column(user::Column::Role)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .into_model::<UserListItem>()
        .all(&state.db)
        .await?;

    Ok(Json(UserListResponse {
        data,
        pagination: Pagination {
            page,
            per_page,
            total,
            total_pages,
        },
    }))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Users",
    operation_id = "createUser",
    summary = "Create a user (admin)",
    description = "Creates an active account directly, optionally with an elevated role. No confirmation flow is involved.",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Username or email already in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(username = %payload.username))]
pub async fn create_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::UserDirectory)?;

    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_string();
    validate_username(&username)?;
    validate_email(&email)?;

    let role = payload.role.unwrap_or(policy::DEFAULT_ROLE);

    let new_user = user::ActiveModel {
        username: Set(username),
        email: Set(email),
        first_name: Set(payload.first_name),
        last_name: Set(payload.last_name),
        bio: Set(payload.bio),
        role: Set(role.as_str().to_string()),
        is_superuser: Set(false),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let model = new_user.insert(&state.db).await.map_err(unique_to_conflict)?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/{username}",
    tag = "Users",
    operation_id = "getUser",
    summary = "Get a user by username (admin)",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "User details", body = UserResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn get_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    policy::require_request(Some(&auth_user), Access::Read, Resource::UserDirectory)?;

    let user = find_user(&state.db, &username).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    patch,
    path = "/{username}",
    tag = "Users",
    operation_id = "updateUser",
    summary = "Update a user (admin)",
    description = "Partially updates any account, including its role.",
    params(("username" = String, Path, description = "Username")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Username or email already in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn update_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::UserDirectory)?;

    let user = find_user(&state.db, &username).await?;

    if payload == UpdateUserRequest::default() {
        return Ok(Json(user.into()));
    }

    let mut active: user::ActiveModel = user.into();
    if let Some(ref new_username) = payload.username {
        let new_username = new_username.trim();
        validate_username(new_username)?;
        active.username = Set(new_username.to_string());
    }
    if let Some(ref email) = payload.email {
        let email = email.trim();
        validate_email(email)?;
        active.email = Set(email.to_string());
    }
    if let Some(first_name) = payload.first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = payload.last_name {
        active.last_name = Set(last_name);
    }
    if let Some(bio) = payload.bio {
        active.bio = Set(bio);
    }
    if let Some(role) = payload.role {
        active.role = Set(role.as_str().to_string());
    }

    let updated = active.update(&state.db).await.map_err(unique_to_conflict)?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/{username}",
    tag = "Users",
    operation_id = "deleteUser",
    summary = "Delete a user (admin)",
    description = "Removes the account together with its reviews and comments.",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::UserDirectory)?;

    let txn = state.db.begin().await?;

    let user = user::Entity::find()
        .filter(user::Column::Username.eq(&username))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    // Comments under the user's reviews go first, then the user's own
    // contributions, then the account itself.
    comment::Entity::delete_many()
        .filter(
            comment::Column::ReviewId.in_subquery(
                SeaQuery::select()
                    .column(review::Column::Id)
                    .from(review::Entity)
                    .and_where(review::Column::AuthorId.eq(user.id))
                    .to_owned(),
            ),
        )
        .exec(&txn)
        .await?;
    comment::Entity::delete_many()
        .filter(comment::Column::AuthorId.eq(user.id))
        .exec(&txn)
        .await?;
    review::Entity::delete_many()
        .filter(review::Column::AuthorId.eq(user.id))
        .exec(&txn)
        .await?;
    user::Entity::delete_by_id(user.id).exec(&txn).await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn find_user<C: ConnectionTrait>(db: &C, username: &str) -> Result<user::Model, AppError> {
    user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

fn unique_to_conflict(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("Username or email is already in use".into())
        }
        _ => AppError::from(e),
    }
}
