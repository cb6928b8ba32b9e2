//! Comment endpoints, nested under
//! `/titles/{title_id}/reviews/{review_id}/comments`.
//!
//! Same ownership policy as reviews, without a uniqueness rule: a user may
//! comment on the same review any number of times.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;

use crate::entity::comment;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::comment::{
    CommentListQuery, CommentListResponse, CommentResponse, CreateCommentRequest,
    UpdateCommentRequest,
};
use crate::models::review::validate_text;
use crate::models::shared::Pagination;
use crate::policy::{self, Access, Resource};
use crate::state::AppState;

use super::review::{author_name, author_names, find_review_for_title};

#[utoipa::path(
    get,
    path = "/",
    tag = "Comments",
    operation_id = "listComments",
    summary = "List comments on a review",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        CommentListQuery,
    ),
    responses(
        (status = 200, description = "List of comments", body = CommentListResponse),
        (status = 404, description = "Review not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query), fields(title_id, review_id))]
pub async fn list_comments(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i32, i32)>,
    Query(query): Query<CommentListQuery>,
) -> Result<Json<CommentListResponse>, AppError> {
    let review = find_review_for_title(&state.db, title_id, review_id).await?;

    let page = Ord::max(query.page.unwrap_or(1), 1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let select = comment::Entity::find().filter(comment::Column::ReviewId.eq(review.id));

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;
    let total_pages = total.div_ceil(per_page);

    let comments = select
        .order_by(comment::Column::PubDate, Order::Asc)
        .order_by(comment::Column::Id, Order::Asc)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let authors = author_names(&state.db, comments.iter().map(|c| c.author_id)).await?;
    let data = comments
        .into_iter()
        .map(|c| {
            let author = authors.get(&c.author_id).cloned().unwrap_or_default();
            CommentResponse::from_model(c, author)
        })
        .collect();

    Ok(Json(CommentListResponse {
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
    tag = "Comments",
    operation_id = "createComment",
    summary = "Comment on a review",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Review not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(title_id, review_id, username = %auth_user.username))]
pub async fn create_comment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Contribution)?;
    validate_text(&payload.text)?;

    let review = find_review_for_title(&state.db, title_id, review_id).await?;

    let new_comment = comment::ActiveModel {
        text: Set(payload.text),
        review_id: Set(review.id),
        author_id: Set(auth_user.user_id),
        pub_date: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let model = new_comment.insert(&state.db).await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse::from_model(model, auth_user.username)),
    ))
}

#[utoipa::path(
    get,
    path = "/{comment_id}",
    tag = "Comments",
    operation_id = "getComment",
    summary = "Get a comment",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    responses(
        (status = 200, description = "Comment details", body = CommentResponse),
        (status = 404, description = "Comment not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(title_id, review_id, comment_id))]
pub async fn get_comment(
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
) -> Result<Json<CommentResponse>, AppError> {
    let model = find_comment_for_review(&state.db, title_id, review_id, comment_id).await?;
    let author = author_name(&state.db, model.author_id).await?;
    Ok(Json(CommentResponse::from_model(model, author)))
}

#[utoipa::path(
    patch,
    path = "/{comment_id}",
    tag = "Comments",
    operation_id = "updateComment",
    summary = "Edit a comment",
    description = "Updates a comment's text. Allowed for its author, moderators, and admins.",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = CommentResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Comment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(title_id, review_id, comment_id))]
pub async fn update_comment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
    AppJson(payload): AppJson<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Contribution)?;

    let existing = find_comment_for_review(&state.db, title_id, review_id, comment_id).await?;
    policy::require_contribution_write(&auth_user, existing.author_id)?;

    if let Some(ref text) = payload.text {
        validate_text(text)?;
    }

    if payload == UpdateCommentRequest::default() {
        let author = author_name(&state.db, existing.author_id).await?;
        return Ok(Json(CommentResponse::from_model(existing, author)));
    }

    let author_id = existing.author_id;
    let mut active: comment::ActiveModel = existing.into();
    if let Some(text) = payload.text {
        active.text = Set(text);
    }

    let model = active.update(&state.db).await?;
    let author = author_name(&state.db, author_id).await?;
    Ok(Json(CommentResponse::from_model(model, author)))
}

#[utoipa::path(
    delete,
    path = "/{comment_id}",
    tag = "Comments",
    operation_id = "deleteComment",
    summary = "Delete a comment",
    description = "Deletes a comment. Allowed for its author, moderators, and admins.",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Comment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(title_id, review_id, comment_id))]
pub async fn delete_comment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Contribution)?;

    let existing = find_comment_for_review(&state.db, title_id, review_id, comment_id).await?;
    policy::require_contribution_write(&auth_user, existing.author_id)?;

    comment::Entity::delete_by_id(existing.id)
        .exec(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Look up a comment and confirm the full nesting chain: the comment belongs
/// to the review, and the review to the title.
async fn find_comment_for_review<C: ConnectionTrait>(
    db: &C,
    title_id: i32,
    review_id: i32,
    comment_id: i32,
) -> Result<comment::Model, AppError> {
    let review = find_review_for_title(db, title_id, review_id).await?;

    let model = comment::Entity::find_by_id(comment_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".into()))?;

    if model.review_id != review.id {
        return Err(AppError::NotFound("Comment not found".into()));
    }

    Ok(model)
}
