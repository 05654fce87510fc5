use axum::Json;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{category, title};
use crate::error::{AppError, ErrorBody, is_unique_violation};
use crate::extractors::auth::AuthUser;
use crate::extractors::input::{AppJson, AppQuery};
use crate::models::catalog::*;
use crate::models::shared::{Pagination, escape_like, page_window};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Categories",
    operation_id = "listCategories",
    summary = "List categories",
    description = "Paginated list, newest first, with an optional case-insensitive name search. Public.",
    params(CatalogListQuery),
    responses(
        (status = 200, description = "List of categories", body = CatalogListResponse),
        (status = 400, description = "Invalid query (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_categories(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CatalogListQuery>,
) -> Result<Json<CatalogListResponse>, AppError> {
    let (limit, offset) = page_window(query.limit, query.offset);
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

    let total = select.clone().count(&state.db).await?;
    let data = select
        .order_by_desc(category::Column::Id)
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
    tag = "Categories",
    operation_id = "createCategory",
    summary = "Create a category",
    description = "Admin only.",
    request_body = CreateCatalogItemRequest,
    responses(
        (status = 201, description = "Category created", body = CatalogItem),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Name or slug already used (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(slug = %payload.slug))]
pub async fn create_category(
    auth_user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateCatalogItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_admin_or_read_only(&method)?;
    validate_create_catalog_item(&payload)?;

    let model = category::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        slug: Set(payload.slug),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(category_conflict)?;

    Ok((StatusCode::CREATED, Json(CatalogItem::from(model))))
}

#[utoipa::path(
    get,
    path = "/{slug}",
    tag = "Categories",
    operation_id = "getCategory",
    summary = "Get a category by slug",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 200, description = "Category", body = CatalogItem),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CatalogItem>, AppError> {
    let model = find_category(&state.db, &slug).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    patch,
    path = "/{slug}",
    tag = "Categories",
    operation_id = "updateCategory",
    summary = "Update a category",
    description = "Admin only.",
    params(("slug" = String, Path, description = "Category slug")),
    request_body = UpdateCatalogItemRequest,
    responses(
        (status = 200, description = "Category updated", body = CatalogItem),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Category not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Name or slug already used (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn update_category(
    auth_user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    AppJson(payload): AppJson<UpdateCatalogItemRequest>,
) -> Result<Json<CatalogItem>, AppError> {
    auth_user.require_admin_or_read_only(&method)?;
    validate_update_catalog_item(&payload)?;

    let existing = find_category(&state.db, &slug).await?;
    if payload == UpdateCatalogItemRequest::default() {
        return Ok(Json(existing.into()));
    }

    let mut active: category::ActiveModel = existing.into();
    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(slug) = payload.slug {
        active.slug = Set(slug);
    }

    let model = active.update(&state.db).await.map_err(category_conflict)?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{slug}",
    tag = "Categories",
    operation_id = "deleteCategory",
    summary = "Delete a category",
    description = "Titles of the category are kept and lose their category. Admin only.",
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
    method: Method,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_admin_or_read_only(&method)?;

    let txn = state.db.begin().await?;
    let existing = find_category(&txn, &slug).await?;

    title::Entity::update_many()
        .col_expr(title::Column::CategoryId, Expr::value(Option::<i32>::None))
        .filter(title::Column::CategoryId.eq(existing.id))
        .exec(&txn)
        .await?;
    category::Entity::delete_by_id(existing.id).exec(&txn).await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn find_category<C: ConnectionTrait>(
    db: &C,
    slug: &str,
) -> Result<category::Model, AppError> {
    category::Entity::find()
        .filter(category::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".into()))
}

fn category_conflict(err: DbErr) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("Category with this name or slug already exists".into())
    } else {
        AppError::from(err)
    }
}
