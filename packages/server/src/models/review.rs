use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ReviewConfig;
use crate::entity::review;
use crate::error::AppError;

use super::shared::Pagination;

pub fn validate_text(text: &str) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("Text must not be empty".into()));
    }
    Ok(())
}

pub fn validate_score(score: i16, config: &ReviewConfig) -> Result<(), AppError> {
    if score < config.score_min || score > config.score_max {
        return Err(AppError::Validation(format!(
            "Score must be between {} and {}",
            config.score_min, config.score_max
        )));
    }
    Ok(())
}

/// Request body for posting a review.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateReviewRequest {
    #[schema(example = "A dazzling, scathing classic.")]
    pub text: String,
    #[schema(example = 10)]
    pub score: i16,
}

/// Request body for editing a review.
#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateReviewRequest {
    pub text: Option<String>,
    pub score: Option<i16>,
}

/// A review with its author's username.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ReviewResponse {
    pub id: i32,
    pub text: String,
    /// Username of the review's author.
    #[schema(example = "alice")]
    pub author: String,
    #[schema(example = 10)]
    pub score: i16,
    pub pub_date: DateTime<Utc>,
}

impl ReviewResponse {
    pub fn from_model(model: review::Model, author: String) -> Self {
        Self {
            id: model.id,
            text: model.text,
            author,
            score: model.score,
            pub_date: model.pub_date,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ReviewListResponse {
    pub data: Vec<ReviewResponse>,
    pub pagination: Pagination,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct ReviewListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}
