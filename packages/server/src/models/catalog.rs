use serde::{Deserialize, Serialize};

use crate::entity::{category, genre};
use crate::error::AppError;

use super::shared::Pagination;

pub const NAME_MAX: usize = 256;
pub const SLUG_MAX: usize = 50;

/// Validate a display name (1-256 Unicode characters after trimming).
pub fn validate_name(name: &str) -> Result<(), AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > NAME_MAX {
        return Err(AppError::Validation(format!(
            "Name must be 1-{NAME_MAX} characters"
        )));
    }
    Ok(())
}

/// Validate a URL slug: 1-50 chars from `[a-z0-9_-]`.
pub fn validate_slug(slug: &str) -> Result<(), AppError> {
    if slug.is_empty() || slug.len() > SLUG_MAX {
        return Err(AppError::Validation(format!(
            "Slug must be 1-{SLUG_MAX} characters"
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(AppError::Validation(
            "Slug may contain only lowercase letters, digits, '-' and '_'".into(),
        ));
    }
    Ok(())
}

/// Request body for creating a category or genre.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateTaxonRequest {
    #[schema(example = "Movies")]
    pub name: String,
    #[schema(example = "movies")]
    pub slug: String,
}

/// Request body for updating a category or genre.
#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateTaxonRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
}

pub fn validate_create_taxon(payload: &CreateTaxonRequest) -> Result<(), AppError> {
    validate_name(&payload.name)?;
    validate_slug(&payload.slug)?;
    Ok(())
}

pub fn validate_update_taxon(payload: &UpdateTaxonRequest) -> Result<(), AppError> {
    if let Some(ref name) = payload.name {
        validate_name(name)?;
    }
    if let Some(ref slug) = payload.slug {
        validate_slug(slug)?;
    }
    Ok(())
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CategoryResponse {
    #[schema(example = "Movies")]
    pub name: String,
    #[schema(example = "movies")]
    pub slug: String,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            name: model.name,
            slug: model.slug,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct GenreResponse {
    #[schema(example = "Drama")]
    pub name: String,
    #[schema(example = "drama")]
    pub slug: String,
}

impl From<genre::Model> for GenreResponse {
    fn from(model: genre::Model) -> Self {
        Self {
            name: model.name,
            slug: model.slug,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CategoryListResponse {
    pub data: Vec<CategoryResponse>,
    pub pagination: Pagination,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct GenreListResponse {
    pub data: Vec<GenreResponse>,
    pub pagination: Pagination,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct TaxonListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Case-insensitive name substring filter.
    pub search: Option<String>,
}
