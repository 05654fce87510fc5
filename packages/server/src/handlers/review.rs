use axum::Json;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::*;
use tracing::{debug, instrument};

use super::title::find_title;
use crate::entity::{comment, review, user};
use crate::error::{AppError, ErrorBody, is_unique_violation};
use crate::extractors::auth::AuthUser;
use crate::extractors::input::{AppJson, AppQuery};
use crate::models::review::*;
use crate::models::shared::{PageQuery, Pagination, page_window};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Reviews",
    operation_id = "listReviews",
    summary = "List reviews of a title",
    description = "Paginated, newest first. Public.",
    params(("title_id" = i32, Path, description = "Title ID"), PageQuery),
    responses(
        (status = 200, description = "List of reviews", body = ReviewListResponse),
        (status = 404, description = "Title not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(title_id): Path<i32>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<ReviewListResponse>, AppError> {
    let _title = find_title(&state.db, title_id).await?;

    let (limit, offset) = page_window(query.limit, query.offset);
    let select = review::Entity::find().filter(review::Column::TitleId.eq(title_id));

    let total = select.clone().count(&state.db).await?;
    let data = select
        .find_also_related(user::Entity)
        .order_by_desc(review::Column::Id)
        .offset(Some(offset))
        .limit(Some(limit))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|(model, author)| review_response(model, author_name(author)))
        .collect();

    Ok(Json(ReviewListResponse {
        data,
        pagination: Pagination {
            limit,
            offset,
            total,
        },
    }))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Reviews",
    operation_id = "createReview",
    summary = "Review a title",
    description = "Any authenticated user may review a title once. A second review of the same title by the same author is rejected with 409.",
    params(("title_id" = i32, Path, description = "Title ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ReviewResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Title not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already reviewed by this user (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn create_review(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(title_id): Path<i32>,
    AppJson(payload): AppJson<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_review(&payload)?;

    let _title = find_title(&state.db, title_id).await?;

    let already_reviewed = review::Entity::find()
        .filter(review::Column::TitleId.eq(title_id))
        .filter(review::Column::AuthorId.eq(auth_user.user_id))
        .count(&state.db)
        .await?
        > 0;
    if already_reviewed {
        return Err(duplicate_review());
    }

    let model = review::ActiveModel {
        text: Set(payload.text),
        score: Set(payload.score),
        title_id: Set(title_id),
        author_id: Set(auth_user.user_id),
        pub_date: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            debug!("Concurrent duplicate review rejected by unique constraint");
            duplicate_review()
        } else {
            AppError::from(e)
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(review_response(model, auth_user.username)),
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
        (status = 200, description = "Review", body = ReviewResponse),
        (status = 404, description = "Title or review not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_review(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i32, i32)>,
) -> Result<Json<ReviewResponse>, AppError> {
    let (model, author) = find_review_with_author(&state.db, title_id, review_id).await?;
    Ok(Json(review_response(model, author)))
}

#[utoipa::path(
    patch,
    path = "/{review_id}",
    tag = "Reviews",
    operation_id = "updateReview",
    summary = "Update a review",
    description = "Allowed to the author, moderators and admins.",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = ReviewResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the author or staff (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Title or review not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn update_review(
    auth_user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<UpdateReviewRequest>,
) -> Result<Json<ReviewResponse>, AppError> {
    let (existing, author) = find_review_with_author(&state.db, title_id, review_id).await?;
    auth_user.require_author_or_staff(&method, existing.author_id)?;
    validate_update_review(&payload)?;

    if payload == UpdateReviewRequest::default() {
        return Ok(Json(review_response(existing, author)));
    }

    let mut active: review::ActiveModel = existing.into();
    if let Some(text) = payload.text {
        active.text = Set(text);
    }
    if let Some(score) = payload.score {
        active.score = Set(score);
    }

    let model = active.update(&state.db).await?;
    Ok(Json(review_response(model, author)))
}

#[utoipa::path(
    delete,
    path = "/{review_id}",
    tag = "Reviews",
    operation_id = "deleteReview",
    summary = "Delete a review",
    description = "Deletes the review and its comments. Allowed to the author, moderators and admins.",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the author or staff (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Title or review not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn delete_review(
    auth_user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let txn = state.db.begin().await?;

    let existing = find_review(&txn, title_id, review_id).await?;
    auth_user.require_author_or_staff(&method, existing.author_id)?;

    comment::Entity::delete_many()
        .filter(comment::Column::ReviewId.eq(review_id))
        .exec(&txn)
        .await?;
    review::Entity::delete_by_id(review_id).exec(&txn).await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A review, addressed through the title it belongs to.
pub(crate) async fn find_review<C: ConnectionTrait>(
    db: &C,
    title_id: i32,
    review_id: i32,
) -> Result<review::Model, AppError> {
    review::Entity::find_by_id(review_id)
        .filter(review::Column::TitleId.eq(title_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".into()))
}

async fn find_review_with_author<C: ConnectionTrait>(
    db: &C,
    title_id: i32,
    review_id: i32,
) -> Result<(review::Model, String), AppError> {
    let (model, author) = review::Entity::find_by_id(review_id)
        .filter(review::Column::TitleId.eq(title_id))
        .find_also_related(user::Entity)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".into()))?;
    Ok((model, author_name(author)))
}

pub(crate) fn author_name(author: Option<user::Model>) -> String {
    author.map(|u| u.username).unwrap_or_default()
}

fn review_response(model: review::Model, author: String) -> ReviewResponse {
    ReviewResponse {
        id: model.id,
        title_id: model.title_id,
        author,
        text: model.text,
        score: model.score,
        pub_date: model.pub_date,
    }
}

fn duplicate_review() -> AppError {
    AppError::Conflict("You have already reviewed this title".into())
}
