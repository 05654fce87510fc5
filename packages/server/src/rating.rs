//! Title ratings, aggregated by the database on every read.

use std::collections::HashMap;

use sea_orm::prelude::Expr;
use sea_orm::*;

use crate::entity::review;

/// Round a mean score to one decimal place.
pub fn round_rating(mean: f64) -> f64 {
    (mean * 10.0).round() / 10.0
}

#[derive(FromQueryResult)]
struct TitleAverage {
    title_id: i32,
    average: Option<f64>,
}

/// Ratings of the given titles. Titles without reviews have no entry.
pub async fn ratings_for<C: ConnectionTrait>(
    db: &C,
    title_ids: &[i32],
) -> Result<HashMap<i32, f64>, DbErr> {
    if title_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = review::Entity::find()
        .select_only()
        .column(review::Column::TitleId)
        .column_as(Expr::cust("AVG(\"score\")::float8"), "average")
        .filter(review::Column::TitleId.is_in(title_ids.iter().copied()))
        .group_by(review::Column::TitleId)
        .into_model::<TitleAverage>()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| row.average.map(|avg| (row.title_id, round_rating(avg))))
        .collect())
}

/// Rating of a single title, `None` when it has no reviews.
pub async fn rating_of<C: ConnectionTrait>(db: &C, title_id: i32) -> Result<Option<f64>, DbErr> {
    Ok(ratings_for(db, &[title_id]).await?.remove(&title_id))
}
