use axum::Json;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{genre, title_genre};
use crate::error::{AppError, ErrorBody, is_unique_violation};
use crate::extractors::auth::AuthUser;
use crate::extractors::input::{AppJson, AppQuery};
use crate::models::catalog::*;
use crate::models::shared::{Pagination, escape_like, page_window};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Genres",
    operation_id = "listGenres",
    summary = "List genres",
    description = "Paginated list, newest first, with an optional case-insensitive name search. Public.",
    params(CatalogListQuery),
    responses(
        (status = 200, description = "List of genres", body = CatalogListResponse),
        (status = 400, description = "Invalid query (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_genres(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CatalogListQuery>,
) -> Result<Json<CatalogListResponse>, AppError> {
    let (limit, offset) = page_window(query.limit, query.offset);
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

    let total = select.clone().count(&state.db).await?;
    let data = select
        .order_by_desc(genre::Column::Id)
        .offset(Some(offset))
        .limit(Some(limit))
        .all(&state.db)
        .await?
        .into_iter()
        .map(CatalogItem::from)
        .collect();

    Ok(Json(CatalogListResponse {
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
    tag = "Genres",
    operation_id = "createGenre",
    summary = "Create a genre",
    description = "Admin only.",
    request_body = CreateCatalogItemRequest,
    responses(
        (status = 201, description = "Genre created", body = CatalogItem),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Name or slug already used (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(slug = %payload.slug))]
pub async fn create_genre(
    auth_user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateCatalogItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_admin_or_read_only(&method)?;
    validate_create_catalog_item(&payload)?;

    let model = genre::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        slug: Set(payload.slug),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(genre_conflict)?;

    Ok((StatusCode::CREATED, Json(CatalogItem::from(model))))
}

#[utoipa::path(
    get,
    path = "/{slug}",
    tag = "Genres",
    operation_id = "getGenre",
    summary = "Get a genre by slug",
    params(("slug" = String, Path, description = "Genre slug")),
    responses(
        (status = 200, description = "Genre", body = CatalogItem),
        (status = 404, description = "Genre not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_genre(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CatalogItem>, AppError> {
    let model = find_genre(&state.db, &slug).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    patch,
    path = "/{slug}",
    tag = "Genres",
    operation_id = "updateGenre",
    summary = "Update a genre",
    description = "Admin only.",
    params(("slug" = String, Path, description = "Genre slug")),
    request_body = UpdateCatalogItemRequest,
    responses(
        (status = 200, description = "Genre updated", body = CatalogItem),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Genre not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Name or slug already used (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn update_genre(
    auth_user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    AppJson(payload): AppJson<UpdateCatalogItemRequest>,
) -> Result<Json<CatalogItem>, AppError> {
    auth_user.require_admin_or_read_only(&method)?;
    validate_update_catalog_item(&payload)?;

    let existing = find_genre(&state.db, &slug).await?;
    if payload == UpdateCatalogItemRequest::default() {
        return Ok(Json(existing.into()));
    }

    let mut active: genre::ActiveModel = existing.into();
    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(slug) = payload.slug {
        active.slug = Set(slug);
    }

    let model = active.update(&state.db).await.map_err(genre_conflict)?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{slug}",
    tag = "Genres",
    operation_id = "deleteGenre",
    summary = "Delete a genre",
    description = "Titles are kept and only lose this genre. Admin only.",
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
    method: Method,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_admin_or_read_only(&method)?;

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

async fn find_genre<C: ConnectionTrait>(
    db: &C,
    slug: &str,
) -> Result<genre::Model, AppError> {
    genre::Entity::find()
        .filter(genre::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Genre not found".into()))
}

fn genre_conflict(err: DbErr) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("Genre with this name or slug already exists".into())
    } else {
        AppError::from(err)
    }
}
