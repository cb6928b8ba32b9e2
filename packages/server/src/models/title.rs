use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

use super::catalog::{CategoryResponse, GenreResponse, validate_name};
use super::shared::{Pagination, double_option};

/// Validate a release year (positive, not in the future).
pub fn validate_year(year: i32) -> Result<(), AppError> {
    let current = Utc::now().year();
    if year <= 0 || year > current {
        return Err(AppError::Validation(format!(
            "Year must be between 1 and {current}"
        )));
    }
    Ok(())
}

/// Request body for creating a title.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateTitleRequest {
    #[schema(example = "The Master and Margarita")]
    pub name: String,
    #[schema(example = 1967)]
    pub year: i32,
    pub description: Option<String>,
    /// Genre slugs. Each must exist.
    #[serde(default)]
    #[schema(example = json!(["novel", "satire"]))]
    pub genre: Vec<String>,
    /// Category slug. Must exist when present.
    #[schema(example = "books")]
    pub category: Option<String>,
}

pub fn validate_create_title(payload: &CreateTitleRequest) -> Result<(), AppError> {
    validate_name(&payload.name)?;
    validate_year(payload.year)?;
    Ok(())
}

/// Request body for updating a title. Absent fields are left unchanged;
/// `description` and `category` may be set to null explicitly.
#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateTitleRequest {
    pub name: Option<String>,
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub genre: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
}

pub fn validate_update_title(payload: &UpdateTitleRequest) -> Result<(), AppError> {
    if let Some(ref name) = payload.name {
        validate_name(name)?;
    }
    if let Some(year) = payload.year {
        validate_year(year)?;
    }
    Ok(())
}

/// A title with its embedded taxonomies and derived rating.
#[derive(Serialize, utoipa::ToSchema)]
pub struct TitleResponse {
    pub id: i32,
    #[schema(example = "The Master and Margarita")]
    pub name: String,
    #[schema(example = 1967)]
    pub year: i32,
    /// Mean review score, absent until the first review.
    #[schema(example = 8.5)]
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub genre: Vec<GenreResponse>,
    pub category: Option<CategoryResponse>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TitleListResponse {
    pub data: Vec<TitleResponse>,
    pub pagination: Pagination,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct TitleListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Filter by category slug.
    pub category: Option<String>,
    /// Filter by genre slug.
    pub genre: Option<String>,
    /// Case-insensitive name substring filter.
    pub name: Option<String>,
    /// Filter by exact release year.
    pub year: Option<i32>,
}
