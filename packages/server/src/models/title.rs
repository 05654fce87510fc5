use serde::{Deserialize, Serialize};

use super::catalog::CatalogItem;
use super::shared::{Pagination, double_option, validate_name, validate_slug, validate_year};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateTitleRequest {
    #[schema(example = "Solaris")]
    pub name: String,
    #[schema(example = 1972)]
    pub year: i32,
    pub description: Option<String>,
    /// Genre slugs.
    #[serde(default)]
    #[schema(example = json!(["drama", "sci-fi"]))]
    pub genre: Vec<String>,
    /// Category slug.
    #[schema(example = "movie")]
    pub category: Option<String>,
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateTitleRequest {
    pub name: Option<String>,
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    /// Replaces the whole genre set when present.
    pub genre: Option<Vec<String>>,
    /// `null` detaches the category.
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TitleResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "Solaris")]
    pub name: String,
    #[schema(example = 1972)]
    pub year: i32,
    /// Mean review score rounded to one decimal; `null` without reviews.
    #[schema(example = 8.5)]
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub genre: Vec<CatalogItem>,
    pub category: Option<CatalogItem>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TitleListResponse {
    pub data: Vec<TitleResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct TitleListQuery {
    /// Category slug.
    pub category: Option<String>,
    /// Genre slug.
    pub genre: Option<String>,
    /// Case-insensitive name substring.
    pub name: Option<String>,
    pub year: Option<i32>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

fn validate_genre_slugs(slugs: &[String]) -> Result<(), AppError> {
    for slug in slugs {
        validate_slug(slug)
            .map_err(|_| AppError::field("genre", format!("Invalid genre slug '{slug}'")))?;
    }
    Ok(())
}

pub fn validate_create_title(req: &CreateTitleRequest, current_year: i32) -> Result<(), AppError> {
    validate_name(&req.name)?;
    validate_year(req.year, current_year)?;
    validate_genre_slugs(&req.genre)?;
    if let Some(ref slug) = req.category {
        validate_slug(slug)
            .map_err(|_| AppError::field("category", format!("Invalid category slug '{slug}'")))?;
    }
    Ok(())
}

pub fn validate_update_title(req: &UpdateTitleRequest, current_year: i32) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_name(name)?;
    }
    if let Some(year) = req.year {
        validate_year(year, current_year)?;
    }
    if let Some(ref genres) = req.genre {
        validate_genre_slugs(genres)?;
    }
    if let Some(Some(ref slug)) = req.category {
        validate_slug(slug)
            .map_err(|_| AppError::field("category", format!("Invalid category slug '{slug}'")))?;
    }
    Ok(())
}
