//! Bulk import of CSV fixture files into an empty database.
//!
//! Each file has a header row and one record per line with explicit ids. Files are read
//! in dependency order and any of them may be absent. Everything is written
//! in one transaction, after which the id sequences are moved past the
//! imported ids.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sea_orm::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

use crate::entity::{category, comment, genre, review, role::Role, title, title_genre, user};

/// Rows per INSERT, well below the Postgres bind-parameter limit.
const CHUNK_SIZE: usize = 1000;

/// Tables with a serial `id` column.
const SERIAL_TABLES: &[&str] = &["user", "category", "genre", "title", "review", "comment"];

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// Number of rows imported per table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub users: usize,
    pub categories: usize,
    pub genres: usize,
    pub titles: usize,
    pub title_genres: usize,
    pub reviews: usize,
    pub comments: usize,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: i32,
    username: String,
    email: String,
    /// Blank cells fall back to `user`.
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    id: i32,
    name: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
struct TitleRow {
    id: i32,
    name: String,
    year: i32,
    #[serde(default)]
    description: Option<String>,
    /// Category id.
    #[serde(default)]
    category: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct TitleGenreRow {
    title_id: i32,
    genre_id: i32,
}

#[derive(Debug, Deserialize)]
struct ReviewRow {
    id: i32,
    title_id: i32,
    text: String,
    /// Author id.
    author: i32,
    score: i32,
    pub_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CommentRow {
    id: i32,
    review_id: i32,
    text: String,
    /// Author id.
    author: i32,
    pub_date: DateTime<Utc>,
}

/// Import every fixture file found in `dir`.
pub async fn load_dir(db: &DatabaseConnection, dir: &Path) -> Result<LoadReport, FixtureError> {
    let users: Vec<UserRow> = read_rows(dir, "users.csv").await?;
    let categories: Vec<CatalogRow> = read_rows(dir, "category.csv").await?;
    let genres: Vec<CatalogRow> = read_rows(dir, "genre.csv").await?;
    let titles: Vec<TitleRow> = read_rows(dir, "titles.csv").await?;
    let title_genres: Vec<TitleGenreRow> = read_rows(dir, "genre_title.csv").await?;
    let reviews: Vec<ReviewRow> = read_rows(dir, "review.csv").await?;
    let comments: Vec<CommentRow> = read_rows(dir, "comments.csv").await?;

    let now = Utc::now();
    let report = LoadReport {
        users: users.len(),
        categories: categories.len(),
        genres: genres.len(),
        titles: titles.len(),
        title_genres: title_genres.len(),
        reviews: reviews.len(),
        comments: comments.len(),
    };

    let txn = db.begin().await?;

    for chunk in users.chunks(CHUNK_SIZE) {
        let models = chunk.iter().map(|row| user::ActiveModel {
            id: Set(row.id),
            username: Set(row.username.clone()),
            email: Set(row.email.clone()),
            role: Set(row.role.unwrap_or_default()),
            first_name: Set(row.first_name.clone()),
            last_name: Set(row.last_name.clone()),
            bio: Set(row.bio.clone()),
            is_confirmed: Set(false),
            created_at: Set(now),
        });
        user::Entity::insert_many(models).exec(&txn).await?;
    }

    for chunk in categories.chunks(CHUNK_SIZE) {
        let models = chunk.iter().map(|row| category::ActiveModel {
            id: Set(row.id),
            name: Set(row.name.clone()),
            slug: Set(row.slug.clone()),
        });
        category::Entity::insert_many(models).exec(&txn).await?;
    }

    for chunk in genres.chunks(CHUNK_SIZE) {
        let models = chunk.iter().map(|row| genre::ActiveModel {
            id: Set(row.id),
            name: Set(row.name.clone()),
            slug: Set(row.slug.clone()),
        });
        genre::Entity::insert_many(models).exec(&txn).await?;
    }

    for chunk in titles.chunks(CHUNK_SIZE) {
        let models = chunk.iter().map(|row| title::ActiveModel {
            id: Set(row.id),
            name: Set(row.name.clone()),
            year: Set(row.year),
            description: Set(row.description.clone()),
            category_id: Set(row.category),
        });
        title::Entity::insert_many(models).exec(&txn).await?;
    }

    for chunk in title_genres.chunks(CHUNK_SIZE) {
        let models = chunk.iter().map(|row| title_genre::ActiveModel {
            title_id: Set(row.title_id),
            genre_id: Set(row.genre_id),
        });
        title_genre::Entity::insert_many(models).exec(&txn).await?;
    }

    for chunk in reviews.chunks(CHUNK_SIZE) {
        let models = chunk.iter().map(|row| review::ActiveModel {
            id: Set(row.id),
            text: Set(row.text.clone()),
            score: Set(row.score),
            title_id: Set(row.title_id),
            author_id: Set(row.author),
            pub_date: Set(row.pub_date),
        });
        review::Entity::insert_many(models).exec(&txn).await?;
    }

    for chunk in comments.chunks(CHUNK_SIZE) {
        let models = chunk.iter().map(|row| comment::ActiveModel {
            id: Set(row.id),
            text: Set(row.text.clone()),
            review_id: Set(row.review_id),
            author_id: Set(row.author),
            pub_date: Set(row.pub_date),
        });
        comment::Entity::insert_many(models).exec(&txn).await?;
    }

    reset_sequences(&txn).await?;
    txn.commit().await?;

    info!(?report, "Fixtures loaded");
    Ok(report)
}

async fn read_rows<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Vec<T>, FixtureError> {
    let path = dir.join(file);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(file, "Fixture file absent, skipping");
            return Ok(Vec::new());
        }
        Err(source) => return Err(FixtureError::Read { path, source }),
    };
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| FixtureError::Parse { path, source })
}

/// Move each serial sequence past the largest imported id.
async fn reset_sequences(txn: &DatabaseTransaction) -> Result<(), DbErr> {
    for table in SERIAL_TABLES {
        let stmt = format!(
            r#"SELECT setval(pg_get_serial_sequence('"{table}"', 'id'), COALESCE((SELECT MAX(id) FROM "{table}"), 0) + 1, false)"#
        );
        txn.execute_unprepared(&stmt).await?;
    }
    Ok(())
}
