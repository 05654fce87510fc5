use axum::Json;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;
use sea_orm::*;
use tracing::instrument;

use super::review::{author_name, find_review};
use crate::entity::{comment, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::input::{AppJson, AppQuery};
use crate::models::review::*;
use crate::models::shared::{PageQuery, Pagination, page_window};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Comments",
    operation_id = "listComments",
    summary = "List comments on a review",
    description = "Paginated, newest first. Public.",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        PageQuery,
    ),
    responses(
        (status = 200, description = "List of comments", body = CommentListResponse),
        (status = 404, description = "Title or review not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_comments(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i32, i32)>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<CommentListResponse>, AppError> {
    let _review = find_review(&state.db, title_id, review_id).await?;

    let (limit, offset) = page_window(query.limit, query.offset);
    let select = comment::Entity::find().filter(comment::Column::ReviewId.eq(review_id));

    let total = select.clone().count(&state.db).await?;
    let data = select
        .find_also_related(user::Entity)
        .order_by_desc(comment::Column::Id)
        .offset(Some(offset))
        .limit(Some(limit))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|(model, author)| comment_response(model, author_name(author)))
        .collect();

    Ok(Json(CommentListResponse {
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
        (status = 404, description = "Title or review not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn create_comment(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_comment(&payload)?;

    let _review = find_review(&state.db, title_id, review_id).await?;

    let model = comment::ActiveModel {
        text: Set(payload.text),
        review_id: Set(review_id),
        author_id: Set(auth_user.user_id),
        pub_date: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(comment_response(model, auth_user.username)),
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
        (status = 200, description = "Comment", body = CommentResponse),
        (status = 404, description = "Title, review or comment not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_comment(
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
) -> Result<Json<CommentResponse>, AppError> {
    let (model, author) = find_comment(&state.db, title_id, review_id, comment_id).await?;
    Ok(Json(comment_response(model, author)))
}

#[utoipa::path(
    patch,
    path = "/{comment_id}",
    tag = "Comments",
    operation_id = "updateComment",
    summary = "Update a comment",
    description = "Allowed to the author, moderators and admins.",
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
        (status = 403, description = "Not the author or staff (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Title, review or comment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn update_comment(
    auth_user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
    AppJson(payload): AppJson<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    let (existing, author) = find_comment(&state.db, title_id, review_id, comment_id).await?;
    auth_user.require_author_or_staff(&method, existing.author_id)?;
    validate_update_comment(&payload)?;

    let Some(text) = payload.text else {
        return Ok(Json(comment_response(existing, author)));
    };

    let mut active: comment::ActiveModel = existing.into();
    active.text = Set(text);
    let model = active.update(&state.db).await?;

    Ok(Json(comment_response(model, author)))
}

#[utoipa::path(
    delete,
    path = "/{comment_id}",
    tag = "Comments",
    operation_id = "deleteComment",
    summary = "Delete a comment",
    description = "Allowed to the author, moderators and admins.",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the author or staff (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Title, review or comment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_comment(
    auth_user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let (existing, _) = find_comment(&state.db, title_id, review_id, comment_id).await?;
    auth_user.require_author_or_staff(&method, existing.author_id)?;

    comment::Entity::delete_by_id(existing.id)
        .exec(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn find_comment<C: ConnectionTrait>(
    db: &C,
    title_id: i32,
    review_id: i32,
    comment_id: i32,
) -> Result<(comment::Model, String), AppError> {
    let _review = find_review(db, title_id, review_id).await?;

    let (model, author) = comment::Entity::find_by_id(comment_id)
        .filter(comment::Column::ReviewId.eq(review_id))
        .find_also_related(user::Entity)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".into()))?;
    Ok((model, author_name(author)))
}

fn comment_response(model: comment::Model, author: String) -> CommentResponse {
    CommentResponse {
        id: model.id,
        review_id: model.review_id,
        author,
        text: model.text,
        pub_date: model.pub_date,
    }
}
