//! Categories and genres share one shape: a unique name and a unique slug.

use serde::{Deserialize, Serialize};

use super::shared::{Pagination, validate_name, validate_slug};
use crate::entity::{category, genre};
use crate::error::AppError;

#[derive(Clone, Debug, PartialEq, Serialize, utoipa::ToSchema)]
pub struct CatalogItem {
    #[schema(example = "Drama")]
    pub name: String,
    #[schema(example = "drama")]
    pub slug: String,
}

impl From<category::Model> for CatalogItem {
    fn from(m: category::Model) -> Self {
        Self {
            name: m.name,
            slug: m.slug,
        }
    }
}

impl From<genre::Model> for CatalogItem {
    fn from(m: genre::Model) -> Self {
        Self {
            name: m.name,
            slug: m.slug,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CatalogListResponse {
    pub data: Vec<CatalogItem>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct CatalogListQuery {
    /// Case-insensitive name substring.
    #[param(example = "dra")]
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateCatalogItemRequest {
    pub name: String,
    pub slug: String,
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateCatalogItemRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
}

pub fn validate_create_catalog_item(req: &CreateCatalogItemRequest) -> Result<(), AppError> {
    validate_name(&req.name)?;
    validate_slug(&req.slug)
}

pub fn validate_update_catalog_item(req: &UpdateCatalogItemRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_name(name)?;
    }
    if let Some(ref slug) = req.slug {
        validate_slug(slug)?;
    }
    Ok(())
}
