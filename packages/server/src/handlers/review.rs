//! Review endpoints, nested under `/titles/{title_id}/reviews`.
//!
//! Creation enforces the one-review-per-author-per-title rule. The handler
//! pre-checks for an existing row to give a friendly message, but the unique
//! `(author_id, title_id)` index is what actually decides races: of N
//! concurrent identical POSTs, the store admits exactly one and the rest
//! surface here as unique-constraint violations.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{comment, review, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::review::{
    CreateReviewRequest, ReviewListQuery, ReviewListResponse, ReviewResponse, UpdateReviewRequest,
    validate_score, validate_text,
};
use crate::models::shared::Pagination;
use crate::policy::{self, Access, Resource};
use crate::state::AppState;

use super::title::find_title;

#[utoipa::path(
    get,
    path = "/",
    tag = "Reviews",
    operation_id = "listReviews",
    summary = "List reviews of a title",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ReviewListQuery,
    ),
    responses(
        (status = 200, description = "List of reviews", body = ReviewListResponse),
        (status = 404, description = "Title not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query), fields(title_id))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(title_id): Path<i32>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Json<ReviewListResponse>, AppError> {
    find_title(&state.db, title_id).await?;

    let page = Ord::max(query.page.unwrap_or(1), 1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let select = review::Entity::find().filter(review::Column::TitleId.eq(title_id));

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;
    let total_pages = total.div_ceil(per_page);

    let reviews = select
        .order_by(review::Column::PubDate, Order::Asc)
        .order_by(review::Column::Id, Order::Asc)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let authors = author_names(&state.db, reviews.iter().map(|r| r.author_id)).await?;
    let data = reviews
        .into_iter()
        .map(|r| {
            let author = authors.get(&r.author_id).cloned().unwrap_or_default();
            ReviewResponse::from_model(r, author)
        })
        .collect();

    Ok(Json(ReviewListResponse {
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
    tag = "Reviews",
    operation_id = "createReview",
    summary = "Post a review for a title",
    description = "Creates the caller's review of a title. Each user may review a given title at most once; a second attempt is rejected.",
    params(("title_id" = i32, Path, description = "Title ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ReviewResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Title not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already reviewed this title (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(title_id, username = %auth_user.username))]
pub async fn create_review(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(title_id): Path<i32>,
    AppJson(payload): AppJson<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Contribution)?;
    validate_text(&payload.text)?;
    validate_score(payload.score, &state.config.review)?;

    find_title(&state.db, title_id).await?;

    // Pre-check only shapes the error message; the unique index is the
    // guard that concurrent requests can't slip past.
    let already_reviewed = review::Entity::find()
        .filter(review::Column::TitleId.eq(title_id))
        .filter(review::Column::AuthorId.eq(auth_user.user_id))
        .count(&state.db)
        .await?
        > 0;
    if already_reviewed {
        return Err(AppError::Conflict("You have already reviewed this title".into()));
    }

    let new_review = review::ActiveModel {
        text: Set(payload.text),
        score: Set(payload.score),
        title_id: Set(title_id),
        author_id: Set(auth_user.user_id),
        pub_date: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let model = new_review.insert(&state.db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("You have already reviewed this title".into())
        }
        _ => AppError::from(e),
    })?;

    Ok((
        StatusCode::CREATED,
        Json(ReviewResponse::from_model(model, auth_user.username)),
    ))
}

#[utoipa::path(
    get,
    path = "/{review_id}",
    tag = "Reviews",
    operation_id = "getReview",
    summary = "Get a review",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    responses(
        (status = 200, description = "Review details", body = ReviewResponse),
        (status = 404, description = "Review not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(title_id, review_id))]
pub async fn get_review(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i32, i32)>,
) -> Result<Json<ReviewResponse>, AppError> {
    let model = find_review_for_title(&state.db, title_id, review_id).await?;
    let author = author_name(&state.db, model.author_id).await?;
    Ok(Json(ReviewResponse::from_model(model, author)))
}

#[utoipa::path(
    patch,
    path = "/{review_id}",
    tag = "Reviews",
    operation_id = "updateReview",
    summary = "Edit a review",
    description = "Partially updates a review. Allowed for its author, moderators, and admins.",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = ReviewResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Review not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(title_id, review_id))]
pub async fn update_review(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<UpdateReviewRequest>,
) -> Result<Json<ReviewResponse>, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Contribution)?;

    let existing = find_review_for_title(&state.db, title_id, review_id).await?;
    policy::require_contribution_write(&auth_user, existing.author_id)?;

    if let Some(ref text) = payload.text {
        validate_text(text)?;
    }
    if let Some(score) = payload.score {
        validate_score(score, &state.config.review)?;
    }

    if payload == UpdateReviewRequest::default() {
        let author = author_name(&state.db, existing.author_id).await?;
        return Ok(Json(ReviewResponse::from_model(existing, author)));
    }

    let author_id = existing.author_id;
    let mut active: review::ActiveModel = existing.into();
    if let Some(text) = payload.text {
        active.text = Set(text);
    }
    if let Some(score) = payload.score {
        active.score = Set(score);
    }

    let model = active.update(&state.db).await?;
    let author = author_name(&state.db, author_id).await?;
    Ok(Json(ReviewResponse::from_model(model, author)))
}

#[utoipa::path(
    delete,
    path = "/{review_id}",
    tag = "Reviews",
    operation_id = "deleteReview",
    summary = "Delete a review",
    description = "Deletes a review together with its comments. Allowed for its author, moderators, and admins.",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Review not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(title_id, review_id))]
pub async fn delete_review(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Contribution)?;

    let txn = state.db.begin().await?;
    let existing = find_review_for_title(&txn, title_id, review_id).await?;
    policy::require_contribution_write(&auth_user, existing.author_id)?;

    comment::Entity::delete_many()
        .filter(comment::Column::ReviewId.eq(existing.id))
        .exec(&txn)
        .await?;
    review::Entity::delete_by_id(existing.id).exec(&txn).await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Look up a review and confirm it belongs to the title in the path.
pub(crate) async fn find_review_for_title<C: ConnectionTrait>(
    db: &C,
    title_id: i32,
    review_id: i32,
) -> Result<review::Model, AppError> {
    let model = review::Entity::find_by_id(review_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".into()))?;

    if model.title_id != title_id {
        return Err(AppError::NotFound("Review not found".into()));
    }

    Ok(model)
}

pub(crate) async fn author_name<C: ConnectionTrait>(
    db: &C,
    author_id: i32,
) -> Result<String, AppError> {
    user::Entity::find_by_id(author_id)
        .select_only()
        .column(user::Column::Username)
        .into_tuple::<String>()
        .one(db)
        .await?
        // Contributions are deleted with their author, so a dangling
        // author_id means corrupted state.
        .ok_or_else(|| AppError::Internal(format!("Author {author_id} missing")))
}

pub(crate) async fn author_names<C, I>(
    db: &C,
    author_ids: I,
) -> Result<std::collections::HashMap<i32, String>, AppError>
where
    C: ConnectionTrait,
    I: Iterator<Item = i32>,
{
    let ids: Vec<i32> = author_ids.collect();
    Ok(user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .select_only()
        .column(user::Column::Id)
        .column(user::Column::Username)
        .into_tuple::<(i32, String)>()
        .all(db)
        .await?
        .into_iter()
        .collect())
}
