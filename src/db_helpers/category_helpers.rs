use sqlx::{Sqlite, SqlitePool};

use crate::{errors::RequestError, models::Category};

pub async fn list_categories_in_db(pool: &SqlitePool) -> Result<Vec<Category>, RequestError> {
    let result = sqlx::query_as::<Sqlite, Category>("SELECT id, name FROM categories ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(result)
}

pub async fn get_category_by_id_in_db(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<Category>, RequestError> {
    let result = sqlx::query_as::<Sqlite, Category>("SELECT id, name FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(result)
}

pub async fn insert_category_in_db(pool: &SqlitePool, name: &str) -> Result<Category, RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, Category>(
        "INSERT INTO categories (name) VALUES (?) RETURNING id, name",
    )
    .bind(name)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    Ok(result)
}

pub async fn update_category_in_db(
    pool: &SqlitePool,
    id: i64,
    name: &str,
) -> Result<Category, RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query_as::<Sqlite, Category>(
        "UPDATE categories SET name = ? WHERE id = ? RETURNING id, name",
    )
    .bind(name)
    .bind(id)
    .fetch_optional(&mut tx)
    .await?
    .ok_or(RequestError::NotFound)?;
    tx.commit().await?;
    Ok(result)
}

/// Deleting a category takes its posts (and their comments) with it.
pub async fn delete_category_in_db(pool: &SqlitePool, id: i64) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound);
    }
    tx.commit().await?;
    Ok(())
}

/// Returns the first category with this name, creating it when none exists.
/// The flag is true when a row was inserted. The insert is a single statement,
/// so concurrent callers never both create the same name.
pub async fn get_or_create_category_in_db(
    pool: &SqlitePool,
    name: &str,
) -> Result<(Category, bool), RequestError> {
    let result = sqlx::query(
        r#"
        INSERT INTO categories (name)
        SELECT ?
        WHERE NOT EXISTS (SELECT 1 FROM categories WHERE name = ?)
        "#,
    )
    .bind(name)
    .bind(name)
    .execute(pool)
    .await?;
    let category = sqlx::query_as::<Sqlite, Category>(
        "SELECT id, name FROM categories WHERE name = ? ORDER BY id LIMIT 1",
    )
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok((category, result.rows_affected() > 0))
}
