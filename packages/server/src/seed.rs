use chrono::Utc;
use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::*;
use thiserror::Error;
use tracing::info;

use crate::entity::{role::Role, title, title_genre, user};
use crate::error::AppError;
use crate::models::shared::{validate_email, validate_username};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("email {0} already belongs to another user")]
    EmailTaken(String),
    #[error(transparent)]
    Db(#[from] DbErr),
}

impl From<AppError> for SeedError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::InvalidField(field, message) => SeedError::Invalid { field, message },
            other => SeedError::Invalid {
                field: "input",
                message: format!("{other:?}"),
            },
        }
    }
}

/// Create an admin account, or promote the existing account with this
/// username. The admin signs in through the usual signup/token flow.
pub async fn ensure_admin(
    db: &DatabaseConnection,
    username: &str,
    email: &str,
) -> Result<user::Model, SeedError> {
    let username = username.trim();
    let email = email.trim();
    validate_username(username)?;
    validate_email(email)?;

    if let Some(existing) = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
    {
        if existing.role.is_admin() {
            info!(username, "User is already an admin");
            return Ok(existing);
        }
        let mut active: user::ActiveModel = existing.into();
        active.role = Set(Role::Admin);
        let model = active.update(db).await?;
        info!(username, "Promoted user to admin");
        return Ok(model);
    }

    let email_taken = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .count(db)
        .await?
        > 0;
    if email_taken {
        return Err(SeedError::EmailTaken(email.to_string()));
    }

    let model = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        role: Set(Role::Admin),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        bio: Set(String::new()),
        is_confirmed: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(username, "Created admin user");
    Ok(model)
}

/// Ensure required database indexes exist.
///
/// Schema sync only creates the indexes declared on single columns, so the
/// secondary ones used by list filters are created here on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Genre filter on the title list:
    // SELECT title_id FROM title_genre WHERE genre_id IN (...)
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_title_genre_genre")
        .table(title_genre::Entity)
        .col(title_genre::Column::GenreId)
        .col(title_genre::Column::TitleId)
        .to_string(PostgresQueryBuilder);
    create_index(db, "idx_title_genre_genre", &stmt).await;

    // Year filter on the title list.
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_title_year")
        .table(title::Entity)
        .col(title::Column::Year)
        .to_string(PostgresQueryBuilder);
    create_index(db, "idx_title_year", &stmt).await;

    Ok(())
}

async fn create_index(db: &DatabaseConnection, name: &str, stmt: &str) {
    match db.execute_unprepared(stmt).await {
        Ok(_) => info!("Ensured index {} exists", name),
        Err(e) => tracing::warn!("Failed to create index {}: {}", name, e),
    }
}
