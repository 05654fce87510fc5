use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{Pagination, validate_score, validate_text};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateReviewRequest {
    #[schema(example = "A slow, hypnotic masterpiece.")]
    pub text: String,
    /// Integer 1-10.
    #[schema(example = 9)]
    pub score: i32,
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateReviewRequest {
    pub text: Option<String>,
    pub score: Option<i32>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ReviewResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = 1)]
    pub title_id: i32,
    /// Author's username.
    #[schema(example = "alice")]
    pub author: String,
    pub text: String,
    #[schema(example = 9)]
    pub score: i32,
    pub pub_date: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ReviewListResponse {
    pub data: Vec<ReviewResponse>,
    pub pagination: Pagination,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateCommentRequest {
    #[schema(example = "Agreed, the ending stays with you.")]
    pub text: String,
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateCommentRequest {
    pub text: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CommentResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = 1)]
    pub review_id: i32,
    /// Author's username.
    #[schema(example = "bob")]
    pub author: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CommentListResponse {
    pub data: Vec<CommentResponse>,
    pub pagination: Pagination,
}

pub fn validate_create_review(req: &CreateReviewRequest) -> Result<(), AppError> {
    validate_text(&req.text)?;
    validate_score(req.score)
}

pub fn validate_update_review(req: &UpdateReviewRequest) -> Result<(), AppError> {
    if let Some(ref text) = req.text {
        validate_text(text)?;
    }
    if let Some(score) = req.score {
        validate_score(score)?;
    }
    Ok(())
}

pub fn validate_create_comment(req: &CreateCommentRequest) -> Result<(), AppError> {
    validate_text(&req.text)
}

pub fn validate_update_comment(req: &UpdateCommentRequest) -> Result<(), AppError> {
    if let Some(ref text) = req.text {
        validate_text(text)?;
    }
    Ok(())
}
