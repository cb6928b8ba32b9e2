//! Title endpoints.
//!
//! A title's `rating` is never stored: every read recomputes the mean of the
//! current review scores, so the value can't drift from the reviews
//! themselves. Titles with no reviews serialize the rating as `null`.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr, Query as SeaQuery};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{category, comment, genre, review, title, title_genre};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::catalog::{CategoryResponse, GenreResponse};
use crate::models::shared::{Pagination, escape_like};
use crate::models::title::{
    CreateTitleRequest, TitleListQuery, TitleListResponse, TitleResponse, UpdateTitleRequest,
    validate_create_title, validate_update_title,
};
use crate::policy::{self, Access, Resource};
use crate::state::AppState;

/// `AVG` over an integer column yields NUMERIC in PostgreSQL; cast so the
/// driver hands back an `f64` and the mean keeps full precision.
const RATING_EXPR: &str = "CAST(AVG(\"score\") AS double precision)";

#[utoipa::path(
    get,
    path = "/",
    tag = "Titles",
    operation_id = "listTitles",
    summary = "List titles with filters",
    description = "Returns a paginated list of titles with embedded genres, category, and the live mean review score. Filterable by category slug, genre slug, name substring, and release year.",
    params(TitleListQuery),
    responses(
        (status = 200, description = "List of titles", body = TitleListResponse),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_titles(
    State(state): State<AppState>,
    Query(query): Query<TitleListQuery>,
) -> Result<Json<TitleListResponse>, AppError> {
    let page = Ord::max(query.page.unwrap_or(1), 1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let mut select = title::Entity::find();

    if let Some(ref slug) = query.category {
        // An unknown slug matches nothing rather than erroring.
        match category_id_by_slug(&state.db, slug).await? {
            Some(id) => select = select.filter(title::Column::CategoryId.eq(id)),
            None => return Ok(Json(empty_page(page, per_page))),
        }
    }

    if let Some(ref slug) = query.genre {
        let genre_id: Option<i32> = genre::Entity::find()
            .filter(genre::Column::Slug.eq(slug))
            .select_only()
            .column(genre::Column::Id)
            .into_tuple::<i32>()
            .one(&state.db)
            .await?;
        match genre_id {
            Some(id) => {
                select = select.filter(
                    title::Column::Id.in_subquery(
                        SeaQuery::select()
                            .column(title_genre::Column::TitleId)
                            .from(title_genre::Entity)
                            .and_where(title_genre::Column::GenreId.eq(id))
                            .to_owned(),
                    ),
                );
            }
            None => return Ok(Json(empty_page(page, per_page))),
        }
    }

    if let Some(ref name) = query.name {
        let term = escape_like(name.trim());
        if !term.is_empty() {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(title::Column::Name)))
                    .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
            );
        }
    }

    if let Some(year) = query.year {
        select = select.filter(title::Column::Year.eq(year));
    }

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;
    let total_pages = total.div_ceil(per_page);

    let titles = select
        .order_by(title::Column::Name, Order::Asc)
        .order_by(title::Column::Id, Order::Asc)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let data = build_title_responses(&state.db, titles).await?;

    Ok(Json(TitleListResponse {
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
    tag = "Titles",
    operation_id = "createTitle",
    summary = "Create a title (admin)",
    request_body = CreateTitleRequest,
    responses(
        (status = 201, description = "Title created", body = TitleResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(name = %payload.name))]
pub async fn create_title(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTitleRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Catalog)?;
    validate_create_title(&payload)?;

    let txn = state.db.begin().await?;

    let category_id = match payload.category {
        Some(ref slug) => Some(resolve_category(&txn, slug).await?),
        None => None,
    };
    let genre_ids = resolve_genres(&txn, &payload.genre).await?;

    let new_title = title::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        year: Set(payload.year),
        description: Set(payload.description),
        category_id: Set(category_id),
        ..Default::default()
    };
    let model = new_title.insert(&txn).await?;

    for genre_id in &genre_ids {
        let join = title_genre::ActiveModel {
            title_id: Set(model.id),
            genre_id: Set(*genre_id),
        };
        join.insert(&txn).await?;
    }

    txn.commit().await?;

    let response = load_title_response(&state.db, model).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/{title_id}",
    tag = "Titles",
    operation_id = "getTitle",
    summary = "Get a title by ID",
    params(("title_id" = i32, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Title details", body = TitleResponse),
        (status = 404, description = "Title not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(title_id))]
pub async fn get_title(
    State(state): State<AppState>,
    Path(title_id): Path<i32>,
) -> Result<Json<TitleResponse>, AppError> {
    let model = find_title(&state.db, title_id).await?;
    let response = load_title_response(&state.db, model).await?;
    Ok(Json(response))
}

#[utoipa::path(
    patch,
    path = "/{title_id}",
    tag = "Titles",
    operation_id = "updateTitle",
    summary = "Update a title (admin)",
    description = "Partially updates a title. `description` and `category` may be set to null explicitly; `genre` replaces the full genre set when present.",
    params(("title_id" = i32, Path, description = "Title ID")),
    request_body = UpdateTitleRequest,
    responses(
        (status = 200, description = "Title updated", body = TitleResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Title not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(title_id))]
pub async fn update_title(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(title_id): Path<i32>,
    AppJson(payload): AppJson<UpdateTitleRequest>,
) -> Result<Json<TitleResponse>, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Catalog)?;
    validate_update_title(&payload)?;

    if payload == UpdateTitleRequest::default() {
        let existing = find_title(&state.db, title_id).await?;
        let response = load_title_response(&state.db, existing).await?;
        return Ok(Json(response));
    }

    let txn = state.db.begin().await?;
    let existing = find_title(&txn, title_id).await?;
    let mut active: title::ActiveModel = existing.into();

    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(year) = payload.year {
        active.year = Set(year);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    match payload.category {
        Some(Some(ref slug)) => {
            active.category_id = Set(Some(resolve_category(&txn, slug).await?));
        }
        Some(None) => active.category_id = Set(None),
        None => {}
    }

    let model = active.update(&txn).await?;

    if let Some(ref slugs) = payload.genre {
        let genre_ids = resolve_genres(&txn, slugs).await?;
        title_genre::Entity::delete_many()
            .filter(title_genre::Column::TitleId.eq(model.id))
            .exec(&txn)
            .await?;
        for genre_id in &genre_ids {
            let join = title_genre::ActiveModel {
                title_id: Set(model.id),
                genre_id: Set(*genre_id),
            };
            join.insert(&txn).await?;
        }
    }

    txn.commit().await?;

    let response = load_title_response(&state.db, model).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/{title_id}",
    tag = "Titles",
    operation_id = "deleteTitle",
    summary = "Delete a title (admin)",
    description = "Permanently deletes a title together with its reviews and their comments.",
    params(("title_id" = i32, Path, description = "Title ID")),
    responses(
        (status = 204, description = "Title deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Title not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(title_id))]
pub async fn delete_title(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(title_id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Catalog)?;

    let txn = state.db.begin().await?;
    find_title(&txn, title_id).await?;

    comment::Entity::delete_many()
        .filter(
            comment::Column::ReviewId.in_subquery(
                SeaQuery::select()
                    .column(review::Column::Id)
                    .from(review::Entity)
                    .and_where(review::Column::TitleId.eq(title_id))
                    .to_owned(),
            ),
        )
        .exec(&txn)
        .await?;
    review::Entity::delete_many()
        .filter(review::Column::TitleId.eq(title_id))
        .exec(&txn)
        .await?;
    title_genre::Entity::delete_many()
        .filter(title_genre::Column::TitleId.eq(title_id))
        .exec(&txn)
        .await?;
    title::Entity::delete_by_id(title_id).exec(&txn).await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn find_title<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<title::Model, AppError> {
    title::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Title not found".into()))
}

async fn category_id_by_slug<C: ConnectionTrait>(
    db: &C,
    slug: &str,
) -> Result<Option<i32>, AppError> {
    Ok(category::Entity::find()
        .filter(category::Column::Slug.eq(slug))
        .select_only()
        .column(category::Column::Id)
        .into_tuple::<i32>()
        .one(db)
        .await?)
}

/// Resolve a category slug for a write; unknown slugs are a client error.
async fn resolve_category<C: ConnectionTrait>(db: &C, slug: &str) -> Result<i32, AppError> {
    category_id_by_slug(db, slug)
        .await?
        .ok_or_else(|| AppError::Validation(format!("Unknown category slug '{slug}'")))
}

/// Resolve genre slugs for a write, deduplicated, preserving payload order.
async fn resolve_genres<C: ConnectionTrait>(db: &C, slugs: &[String]) -> Result<Vec<i32>, AppError> {
    let mut ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let id: i32 = genre::Entity::find()
            .filter(genre::Column::Slug.eq(slug))
            .select_only()
            .column(genre::Column::Id)
            .into_tuple::<i32>()
            .one(db)
            .await?
            .ok_or_else(|| AppError::Validation(format!("Unknown genre slug '{slug}'")))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

async fn load_title_response<C: ConnectionTrait>(
    db: &C,
    model: title::Model,
) -> Result<TitleResponse, AppError> {
    let mut responses = build_title_responses(db, vec![model]).await?;
    responses
        .pop()
        .ok_or_else(|| AppError::Internal("Title response construction failed".into()))
}

/// Assemble full responses for a page of titles: three batched queries for
/// ratings, genre sets, and categories instead of per-row lookups.
async fn build_title_responses<C: ConnectionTrait>(
    db: &C,
    titles: Vec<title::Model>,
) -> Result<Vec<TitleResponse>, AppError> {
    if titles.is_empty() {
        return Ok(Vec::new());
    }

    let title_ids: Vec<i32> = titles.iter().map(|t| t.id).collect();

    let ratings: HashMap<i32, f64> = review::Entity::find()
        .filter(review::Column::TitleId.is_in(title_ids.clone()))
        .select_only()
        .column(review::Column::TitleId)
        .column_as(Expr::cust(RATING_EXPR), "rating")
        .group_by(review::Column::TitleId)
        .into_tuple::<(i32, f64)>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let joins = title_genre::Entity::find()
        .filter(title_genre::Column::TitleId.is_in(title_ids))
        .all(db)
        .await?;
    let genre_ids: Vec<i32> = joins.iter().map(|j| j.genre_id).collect();
    let genres: HashMap<i32, genre::Model> = genre::Entity::find()
        .filter(genre::Column::Id.is_in(genre_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|g| (g.id, g))
        .collect();

    let category_ids: Vec<i32> = titles.iter().filter_map(|t| t.category_id).collect();
    let categories: HashMap<i32, category::Model> = category::Entity::find()
        .filter(category::Column::Id.is_in(category_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut genres_by_title: HashMap<i32, Vec<GenreResponse>> = HashMap::new();
    for join in &joins {
        if let Some(g) = genres.get(&join.genre_id) {
            genres_by_title
                .entry(join.title_id)
                .or_default()
                .push(GenreResponse::from(g.clone()));
        }
    }
    for list in genres_by_title.values_mut() {
        list.sort_by(|a, b| a.name.cmp(&b.name));
    }

    Ok(titles
        .into_iter()
        .map(|t| TitleResponse {
            rating: ratings.get(&t.id).copied(),
            genre: genres_by_title.remove(&t.id).unwrap_or_default(),
            category: t
                .category_id
                .and_then(|id| categories.get(&id).cloned())
                .map(CategoryResponse::from),
            id: t.id,
            name: t.name,
            year: t.year,
            description: t.description,
        })
        .collect())
}

fn empty_page(page: u64, per_page: u64) -> TitleListResponse {
    TitleListResponse {
        data: Vec::new(),
        pagination: Pagination {
            page,
            per_page,
            total: 0,
            total_pages: 0,
        },
    }
}
