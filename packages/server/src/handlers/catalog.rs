//! Category and genre endpoints. Reads are open to everyone; writes go
//! through the admin branch of the policy matrix.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{category, genre, title, title_genre};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::catalog::{
    CategoryListResponse, CategoryResponse, CreateTaxonRequest, GenreListResponse, GenreResponse,
    TaxonListQuery, UpdateTaxonRequest, validate_create_taxon, validate_update_taxon,
};
use crate::models::shared::{Pagination, escape_like};
use crate::policy::{self, Access, Resource};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Categories",
    operation_id = "listCategories",
    summary = "List categories",
    params(TaxonListQuery),
    responses(
        (status = 200, description = "List of categories", body = CategoryListResponse),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<TaxonListQuery>,
) -> Result<Json<CategoryListResponse>, AppError> {
    let page = Ord::max(query.page.unwrap_or(1), 1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let mut select = category::Entity::find();
    if let Some(ref search) = query.search {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(category::Column::Name)))
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
        .order_by(category::Column::Name, Order::Asc)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(CategoryResponse::from)
        .collect();

    Ok(Json(CategoryListResponse {
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
    tag = "Categories",
    operation_id = "createCategory",
    summary = "Create a category (admin)",
    request_body = CreateTaxonRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Slug already in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(slug = %payload.slug))]
pub async fn create_category(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTaxonRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Catalog)?;
    validate_create_taxon(&payload)?;

    let new_category = category::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        slug: Set(payload.slug),
        ..Default::default()
    };

    let model = new_category
        .insert(&state.db)
        .await
        .map_err(slug_to_conflict)?;
    Ok((StatusCode::CREATED, Json(CategoryResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/{slug}",
    tag = "Categories",
    operation_id = "getCategory",
    summary = "Get a category by slug",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 200, description = "Category details", body = CategoryResponse),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CategoryResponse>, AppError> {
    let model = find_category(&state.db, &slug).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    patch,
    path = "/{slug}",
    tag = "Categories",
    operation_id = "updateCategory",
    summary = "Update a category (admin)",
    params(("slug" = String, Path, description = "Category slug")),
    request_body = UpdateTaxonRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Slug already in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn update_category(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    AppJson(payload): AppJson<UpdateTaxonRequest>,
) -> Result<Json<CategoryResponse>, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Catalog)?;
    validate_update_taxon(&payload)?;

    let existing = find_category(&state.db, &slug).await?;

    if payload == UpdateTaxonRequest::default() {
        return Ok(Json(existing.into()));
    }

    let mut active: category::ActiveModel = existing.into();
    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(new_slug) = payload.slug {
        active.slug = Set(new_slug);
    }

    let model = active.update(&state.db).await.map_err(slug_to_conflict)?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{slug}",
    tag = "Categories",
    operation_id = "deleteCategory",
    summary = "Delete a category (admin)",
    description = "Deletes a category. Titles in the category are kept and left uncategorized.",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_category(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Catalog)?;

    let txn = state.db.begin().await?;
    let existing = find_category(&txn, &slug).await?;

    // Detach, don't cascade: dependent titles stay with a NULL category.
    title::Entity::update_many()
        .filter(title::Column::CategoryId.eq(existing.id))
        .col_expr(title::Column::CategoryId, Expr::value(Value::Int(None)))
        .exec(&txn)
        .await?;
    category::Entity::delete_by_id(existing.id).exec(&txn).await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Genres",
    operation_id = "listGenres",
    summary = "List genres",
    params(TaxonListQuery),
    responses(
        (status = 200, description = "List of genres", body = GenreListResponse),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_genres(
    State(state): State<AppState>,
    Query(query): Query<TaxonListQuery>,
) -> Result<Json<GenreListResponse>, AppError> {
    let page = Ord::max(query.page.unwrap_or(1), 1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);

    let mut select = genre::Entity::find();
    if let Some(ref search) = query.search {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(genre::Column::Name)))
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
        .order_by(genre::Column::Name, Order::Asc)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(GenreResponse::from)
        .collect();

    Ok(Json(GenreListResponse {
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
    tag = "Genres",
    operation_id = "createGenre",
    summary = "Create a genre (admin)",
    request_body = CreateTaxonRequest,
    responses(
        (status = 201, description = "Genre created", body = GenreResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Slug already in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(slug = %payload.slug))]
pub async fn create_genre(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTaxonRequest>,
) -> Result<impl IntoResponse, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Catalog)?;
    validate_create_taxon(&payload)?;

    let new_genre = genre::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        slug: Set(payload.slug),
        ..Default::default()
    };

    let model = new_genre.insert(&state.db).await.map_err(slug_to_conflict)?;
    Ok((StatusCode::CREATED, Json(GenreResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/{slug}",
    tag = "Genres",
    operation_id = "getGenre",
    summary = "Get a genre by slug",
    params(("slug" = String, Path, description = "Genre slug")),
    responses(
        (status = 200, description = "Genre details", body = GenreResponse),
        (status = 404, description = "Genre not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_genre(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<GenreResponse>, AppError> {
    let model = find_genre(&state.db, &slug).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    patch,
    path = "/{slug}",
    tag = "Genres",
    operation_id = "updateGenre",
    summary = "Update a genre (admin)",
    params(("slug" = String, Path, description = "Genre slug")),
    request_body = UpdateTaxonRequest,
    responses(
        (status = 200, description = "Genre updated", body = GenreResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Genre not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Slug already in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn update_genre(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    AppJson(payload): AppJson<UpdateTaxonRequest>,
) -> Result<Json<GenreResponse>, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Catalog)?;
    validate_update_taxon(&payload)?;

    let existing = find_genre(&state.db, &slug).await?;

    if payload == UpdateTaxonRequest::default() {
        return Ok(Json(existing.into()));
    }

    let mut active: genre::ActiveModel = existing.into();
    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(new_slug) = payload.slug {
        active.slug = Set(new_slug);
    }

    let model = active.update(&state.db).await.map_err(slug_to_conflict)?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{slug}",
    tag = "Genres",
    operation_id = "deleteGenre",
    summary = "Delete a genre (admin)",
    description = "Deletes a genre and detaches it from all titles.",
    params(("slug" = String, Path, description = "Genre slug")),
    responses(
        (status = 204, description = "Genre deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Genre not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_genre(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    policy::require_request(Some(&auth_user), Access::Write, Resource::Catalog)?;

    let txn = state.db.begin().await?;
    let existing = find_genre(&txn, &slug).await?;

    title_genre::Entity::delete_many()
        .filter(title_genre::Column::GenreId.eq(existing.id))
        .exec(&txn)
        .await?;
    genre::Entity::delete_by_id(existing.id).exec(&txn).await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn find_category<C: ConnectionTrait>(
    db: &C,
    slug: &str,
) -> Result<category::Model, AppError> {
    category::Entity::find()
        .filter(category::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".into()))
}

pub(crate) async fn find_genre<C: ConnectionTrait>(
    db: &C,
    slug: &str,
) -> Result<genre::Model, AppError> {
    genre::Entity::find()
        .filter(genre::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Genre not found".into()))
}

fn slug_to_conflict(e: DbErr) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("Slug is already in use".into())
        }
        _ => AppError::from(e),
    }
}
