use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use chrono::{Datelike, Utc};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr, Query as SeaQuery};
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{category, comment, genre, review, title, title_genre};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::input::{AppJson, AppQuery};
use crate::models::catalog::CatalogItem;
use crate::models::shared::{Pagination, escape_like, page_window};
use crate::models::title::*;
use crate::rating;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Titles",
    operation_id = "listTitles",
    summary = "List titles",
    description = "Paginated list, newest first. Filters combine: `category` and `genre` take slugs, `name` is a case-insensitive substring, `year` is exact. Each title carries its current rating. Public.",
    params(TitleListQuery),
    responses(
        (status = 200, description = "List of titles", body = TitleListResponse),
        (status = 400, description = "Invalid query (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_titles(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<TitleListQuery>,
) -> Result<Json<TitleListResponse>, AppError> {
    let (limit, offset) = page_window(query.limit, query.offset);
    let mut select = title::Entity::find();

    if let Some(ref slug) = query.category {
        select = select.filter(
            title::Column::CategoryId.in_subquery(
                SeaQuery::select()
                    .column(category::Column::Id)
                    .from(category::Entity)
                    .and_where(category::Column::Slug.eq(slug.as_str()))
                    .to_owned(),
            ),
        );
    }

    if let Some(ref slug) = query.genre {
        select = select.filter(
            title::Column::Id.in_subquery(
                SeaQuery::select()
                    .column(title_genre::Column::TitleId)
                    .from(title_genre::Entity)
                    .and_where(
                        title_genre::Column::GenreId.in_subquery(
                            SeaQuery::select()
                                .column(genre::Column::Id)
                                .from(genre::Entity)
                                .and_where(genre::Column::Slug.eq(slug.as_str()))
                                .to_owned(),
                        ),
                    )
                    .to_owned(),
            ),
        );
    }

    if let Some(ref name) = query.name {
        let term = escape_like(name.trim());
        if !term.is_empty() {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(title::Column::Name)))
                    .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
            );
        }
    }

    if let Some(year) = query.year {
        select = select.filter(title::Column::Year.eq(year));
    }

    let total = select.clone().count(&state.db).await?;
    let titles = select
        .order_by_desc(title::Column::Id)
        .offset(Some(offset))
        .limit(Some(limit))
        .all(&state.db)
        .await?;

    Ok(Json(TitleListResponse {
        data: title_responses(&state.db, titles).await?,
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
    tag = "Titles",
    operation_id = "createTitle",
    summary = "Create a title",
    description = "`genre` is a list of genre slugs and `category` a category slug; every slug must name an existing row. Admin only.",
    request_body = CreateTitleRequest,
    responses(
        (status = 201, description = "Title created", body = TitleResponse),
        (status = 400, description = "Validation error or unknown slug (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(name = %payload.name))]
pub async fn create_title(
    auth_user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTitleRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_admin_or_read_only(&method)?;
    validate_create_title(&payload, Utc::now().year())?;

    let txn = state.db.begin().await?;

    let category_id = match payload.category {
        Some(ref slug) => Some(resolve_category(&txn, slug).await?),
        None => None,
    };
    let genre_ids = resolve_genres(&txn, &payload.genre).await?;

    let model = title::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        year: Set(payload.year),
        description: Set(payload.description),
        category_id: Set(category_id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    link_genres(&txn, model.id, &genre_ids).await?;
    txn.commit().await?;

    info!(title_id = model.id, "Title created");
    let response = title_response(&state.db, model).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/{title_id}",
    tag = "Titles",
    operation_id = "getTitle",
    summary = "Get a title by ID",
    params(("title_id" = i32, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Title details", body = TitleResponse),
        (status = 404, description = "Title not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_title(
    State(state): State<AppState>,
    Path(title_id): Path<i32>,
) -> Result<Json<TitleResponse>, AppError> {
    let model = find_title(&state.db, title_id).await?;
    Ok(Json(title_response(&state.db, model).await?))
}

#[utoipa::path(
    patch,
    path = "/{title_id}",
    tag = "Titles",
    operation_id = "updateTitle",
    summary = "Update a title",
    description = "Partially updates a title. A `genre` list replaces all genre links; `category: null` clears the category. Admin only.",
    params(("title_id" = i32, Path, description = "Title ID")),
    request_body = UpdateTitleRequest,
    responses(
        (status = 200, description = "Title updated", body = TitleResponse),
        (status = 400, description = "Validation error or unknown slug (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Title not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn update_title(
    auth_user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path(title_id): Path<i32>,
    AppJson(payload): AppJson<UpdateTitleRequest>,
) -> Result<Json<TitleResponse>, AppError> {
    auth_user.require_admin_or_read_only(&method)?;
    validate_update_title(&payload, Utc::now().year())?;

    if payload == UpdateTitleRequest::default() {
        let existing = find_title(&state.db, title_id).await?;
        return Ok(Json(title_response(&state.db, existing).await?));
    }

    let txn = state.db.begin().await?;

    let existing = find_title(&txn, title_id).await?;
    let mut active: title::ActiveModel = existing.into();

    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(year) = payload.year {
        active.year = Set(year);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    match payload.category {
        Some(Some(ref slug)) => {
            active.category_id = Set(Some(resolve_category(&txn, slug).await?));
        }
        Some(None) => active.category_id = Set(None),
        None => {}
    }

    let model = active.update(&txn).await?;

    if let Some(ref slugs) = payload.genre {
        let genre_ids = resolve_genres(&txn, slugs).await?;
        title_genre::Entity::delete_many()
            .filter(title_genre::Column::TitleId.eq(title_id))
            .exec(&txn)
            .await?;
        link_genres(&txn, title_id, &genre_ids).await?;
    }

    txn.commit().await?;

    Ok(Json(title_response(&state.db, model).await?))
}

#[utoipa::path(
    delete,
    path = "/{title_id}",
    tag = "Titles",
    operation_id = "deleteTitle",
    summary = "Delete a title",
    description = "Deletes the title with its reviews, their comments and its genre links. Admin only.",
    params(("title_id" = i32, Path, description = "Title ID")),
    responses(
        (status = 204, description = "Title deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Title not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_title(
    auth_user: AuthUser,
    method: Method,
    State(state): State<AppState>,
    Path(title_id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_admin_or_read_only(&method)?;

    let txn = state.db.begin().await?;
    let _title = find_title(&txn, title_id).await?;

    comment::Entity::delete_many()
        .filter(
            comment::Column::ReviewId.in_subquery(
                SeaQuery::select()
                    .column(review::Column::Id)
                    .from(review::Entity)
                    .and_where(review::Column::TitleId.eq(title_id))
                    .to_owned(),
            ),
        )
        .exec(&txn)
        .await?;
    review::Entity::delete_many()
        .filter(review::Column::TitleId.eq(title_id))
        .exec(&txn)
        .await?;
    title_genre::Entity::delete_many()
        .filter(title_genre::Column::TitleId.eq(title_id))
        .exec(&txn)
        .await?;
    title::Entity::delete_by_id(title_id).exec(&txn).await?;

    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn find_title<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<title::Model, AppError> {
    title::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Title not found".into()))
}

async fn resolve_category<C: ConnectionTrait>(db: &C, slug: &str) -> Result<i32, AppError> {
    category::Entity::find()
        .filter(category::Column::Slug.eq(slug))
        .one(db)
        .await?
        .map(|c| c.id)
        .ok_or_else(|| AppError::field("category", format!("Category '{slug}' does not exist")))
}

/// Ids of the named genres; duplicates collapse.
async fn resolve_genres<C: ConnectionTrait>(
    db: &C,
    slugs: &[String],
) -> Result<Vec<i32>, AppError> {
    if slugs.is_empty() {
        return Ok(Vec::new());
    }

    let found = genre::Entity::find()
        .filter(genre::Column::Slug.is_in(slugs.iter().map(String::as_str)))
        .all(db)
        .await?;

    if let Some(missing) = slugs.iter().find(|s| !found.iter().any(|g| &g.slug == *s)) {
        return Err(AppError::field("genre", format!("Genre '{missing}' does not exist")));
    }

    Ok(found.into_iter().map(|g| g.id).collect())
}

async fn link_genres<C: ConnectionTrait>(
    db: &C,
    title_id: i32,
    genre_ids: &[i32],
) -> Result<(), AppError> {
    if genre_ids.is_empty() {
        return Ok(());
    }

    let links = genre_ids.iter().map(|&genre_id| title_genre::ActiveModel {
        title_id: Set(title_id),
        genre_id: Set(genre_id),
    });
    title_genre::Entity::insert_many(links).exec(db).await?;
    Ok(())
}

async fn title_response<C: ConnectionTrait>(
    db: &C,
    model: title::Model,
) -> Result<TitleResponse, AppError> {
    let mut responses = title_responses(db, vec![model]).await?;
    responses
        .pop()
        .ok_or_else(|| AppError::Internal("Title response missing".into()))
}

/// Attach genres, category and rating to a page of titles, batched per page.
async fn title_responses<C: ConnectionTrait>(
    db: &C,
    titles: Vec<title::Model>,
) -> Result<Vec<TitleResponse>, AppError> {
    let ids: Vec<i32> = titles.iter().map(|t| t.id).collect();
    let mut ratings = rating::ratings_for(db, &ids).await?;

    let category_ids: Vec<i32> = titles.iter().filter_map(|t| t.category_id).collect();
    let categories: HashMap<i32, CatalogItem> = if category_ids.is_empty() {
        HashMap::new()
    } else {
        category::Entity::find()
            .filter(category::Column::Id.is_in(category_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, CatalogItem::from(c)))
            .collect()
    };

    let mut genres: HashMap<i32, Vec<CatalogItem>> = HashMap::new();
    if !ids.is_empty() {
        let links = title_genre::Entity::find()
            .filter(title_genre::Column::TitleId.is_in(ids.iter().copied()))
            .find_also_related(genre::Entity)
            .order_by_asc(genre::Column::Name)
            .all(db)
            .await?;
        for (link, genre) in links {
            if let Some(genre) = genre {
                genres.entry(link.title_id).or_default().push(genre.into());
            }
        }
    }

    Ok(titles
        .into_iter()
        .map(|t| TitleResponse {
            id: t.id,
            rating: ratings.remove(&t.id),
            category: t.category_id.and_then(|id| categories.get(&id).cloned()),
            genre: genres.remove(&t.id).unwrap_or_default(),
            name: t.name,
            year: t.year,
            description: t.description,
        })
        .collect())
}
