use chrono::Utc;
use sqlx::{Sqlite, SqlitePool};

use crate::{errors::RequestError, models::Comment, pagination::Pagination};

pub(crate) const COMMENT_QUERY: &str = r#"
            SELECT comments.id          AS "id",
                   comments.content     AS "content",
                   comments.created_at  AS "created_at",
                   comments.updated_at  AS "updated_at",
                   comments.post_id     AS "post_id",
                   comments.author_id   AS "author_id",
                   users.username       AS "author_username",
                   comments.parent_id   AS "parent_id"
            FROM   comments
                JOIN users
                    ON users.id = comments.author_id
"#;

const NEWEST_FIRST: &str = " ORDER BY comments.created_at DESC, comments.id DESC";

pub async fn list_comments_for_post_in_db(
    pool: &SqlitePool,
    post_id: i64,
    pagination: &Pagination,
) -> Result<(i64, Vec<Comment>), RequestError> {
    let (count,) =
        sqlx::query_as::<Sqlite, (i64,)>("SELECT Count(*) FROM comments WHERE post_id = ?")
            .bind(post_id)
            .fetch_one(pool)
            .await?;
    pagination.check(count)?;

    let query = format!("{COMMENT_QUERY} WHERE comments.post_id = ?{NEWEST_FIRST} LIMIT ? OFFSET ?");
    let result = sqlx::query_as::<Sqlite, Comment>(&query)
        .bind(post_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;
    Ok((count, result))
}

pub async fn get_comment_for_post_in_db(
    pool: &SqlitePool,
    post_id: i64,
    id: i64,
) -> Result<Option<Comment>, RequestError> {
    let query = format!("{COMMENT_QUERY} WHERE comments.post_id = ? AND comments.id = ?");
    let result = sqlx::query_as::<Sqlite, Comment>(&query)
        .bind(post_id)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(result)
}

async fn get_parent_id_in_db(pool: &SqlitePool, id: i64) -> Result<Option<i64>, RequestError> {
    let result =
        sqlx::query_as::<Sqlite, (Option<i64>,)>("SELECT parent_id FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(result.and_then(|(parent_id,)| parent_id))
}

/// A reply's parent has to live on the same post and must not be the reply itself or
/// one of its descendants. `comment_id` is `None` for a comment that does not exist yet.
pub async fn validate_parent_in_db(
    pool: &SqlitePool,
    post_id: i64,
    comment_id: Option<i64>,
    parent_id: i64,
) -> Result<(), RequestError> {
    if get_comment_for_post_in_db(pool, post_id, parent_id)
        .await?
        .is_none()
    {
        return Err(RequestError::field(
            "parent",
            format!("Invalid pk \"{parent_id}\" - object does not exist."),
        ));
    }
    let Some(comment_id) = comment_id else {
        return Ok(());
    };
    let mut ancestor = Some(parent_id);
    while let Some(id) = ancestor {
        if id == comment_id {
            return Err(RequestError::field(
                "parent",
                "A comment cannot be a reply to itself or to one of its replies.",
            ));
        }
        ancestor = get_parent_id_in_db(pool, id).await?;
    }
    Ok(())
}

pub async fn insert_comment_in_db(
    pool: &SqlitePool,
    post_id: i64,
    author_id: i64,
    content: &str,
    parent_id: Option<i64>,
) -> Result<Comment, RequestError> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();
    let (id,) = sqlx::query_as::<Sqlite, (i64,)>(
        r#"
        INSERT INTO comments (content, created_at, updated_at, post_id, author_id, parent_id)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(content)
    .bind(now)
    .bind(now)
    .bind(post_id)
    .bind(author_id)
    .bind(parent_id)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    tracing::info!(comment_id = id, post_id, author_id, "comment created");

    get_comment_for_post_in_db(pool, post_id, id)
        .await?
        .ok_or(RequestError::NotFound)
}

/// Rewrites content and parent and refreshes `updated_at`.
pub async fn update_comment_in_db(
    pool: &SqlitePool,
    current: Comment,
    content: Option<String>,
    parent_id: Option<Option<i64>>,
) -> Result<Comment, RequestError> {
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE comments SET content = ?, parent_id = ?, updated_at = ? WHERE id = ?")
        .bind(content.unwrap_or(current.content))
        .bind(parent_id.unwrap_or(current.parent_id))
        .bind(Utc::now())
        .bind(current.id)
        .execute(&mut tx)
        .await?;
    tx.commit().await?;

    get_comment_for_post_in_db(pool, current.post_id, current.id)
        .await?
        .ok_or(RequestError::NotFound)
}

/// Replies go with their parent.
pub async fn delete_comment_in_db(pool: &SqlitePool, id: i64) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound);
    }
    tx.commit().await?;
    Ok(())
}
