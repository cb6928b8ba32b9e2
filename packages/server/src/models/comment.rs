use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::comment;

use super::shared::Pagination;

/// Request body for posting a comment on a review.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateCommentRequest {
    #[schema(example = "Couldn't agree more.")]
    pub text: String,
}

/// Request body for editing a comment.
#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateCommentRequest {
    pub text: Option<String>,
}

/// A comment with its author's username.
#[derive(Serialize, utoipa::ToSchema)]
pub struct CommentResponse {
    pub id: i32,
    pub text: String,
    /// Username of the comment's author.
    #[schema(example = "bob")]
    pub author: String,
    pub pub_date: DateTime<Utc>,
}

impl CommentResponse {
    pub fn from_model(model: comment::Model, author: String) -> Self {
        Self {
            id: model.id,
            text: model.text,
            author,
            pub_date: model.pub_date,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CommentListResponse {
    pub data: Vec<CommentResponse>,
    pub pagination: Pagination,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct CommentListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}
