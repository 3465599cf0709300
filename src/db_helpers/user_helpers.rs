use chrono::Utc;
use sqlx::{Sqlite, SqlitePool};

use crate::{
    authentication::hash_password_argon2,
    data_formats::request::NewUser,
    errors::{is_unique_violation, RequestError},
    models::User,
};

use super::get_user_by_username;

const DUPLICATE_USERNAME: &str = "A user with that username already exists.";

/// Hashes the password and stores the user; a taken username is a `username` field error.
pub async fn insert_user(
    pool: &SqlitePool,
    NewUser { username, password }: NewUser,
) -> Result<User, RequestError> {
    if get_user_by_username(pool, &username).await?.is_some() {
        return Err(RequestError::field("username", DUPLICATE_USERNAME));
    }
    let password = hash_password_argon2(password).await?;

    let mut tx = pool.begin().await?;
    let user = sqlx::query_as::<Sqlite, User>(
        r#"
        INSERT INTO users (username, password, created_at)
        VALUES (?, ?, ?)
        RETURNING id, username, password, created_at
        "#,
    )
    .bind(&username)
    .bind(&password)
    .bind(Utc::now())
    .fetch_one(&mut tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            RequestError::field("username", DUPLICATE_USERNAME)
        } else {
            RequestError::DatabaseError(e)
        }
    })?;
    tx.commit().await?;
    tracing::info!(user_id = user.id, username = %user.username, "user created");
    Ok(user)
}
