use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool};

use crate::data_formats::request::PostChanges;
use crate::errors::RequestError;
use crate::models::{Comment, Post};
use crate::pagination::Pagination;

use super::{bind_params, placeholders, QueryBuilder, SqlParam, COMMENT_QUERY};

const POST_QUERY: &str = r#"
            SELECT posts.id                                     AS "id",
                   posts.title                                  AS "title",
                   posts.content                                AS "content",
                   posts.created_at                             AS "created_at",
                   posts.image                                  AS "image",
                   posts.category_id                            AS "category_id",
                   categories.name                              AS "category_name",
                   posts.author_id                              AS "author_id",
                   users.username                               AS "author_username",
                   (SELECT Count(*)
                    FROM   comments
                    WHERE  comments.post_id = posts.id)         AS "comments_count"
            FROM   posts
                JOIN categories
                    ON categories.id = posts.category_id
                JOIN users
                    ON users.id = posts.author_id
"#;

const POST_COUNT_QUERY: &str = r#"
            SELECT Count(*)
            FROM   posts
                JOIN users
                    ON users.id = posts.author_id
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOrdering {
    CreatedAt,
    CreatedAtDesc,
    Title,
    TitleDesc,
}

impl PostOrdering {
    /// Parses a comma separated `ordering` value, skipping unknown fields.
    /// Falls back to newest first.
    pub fn parse_list(raw: Option<&str>) -> Vec<PostOrdering> {
        let ordering = raw
            .unwrap_or_default()
            .split(',')
            .filter_map(|field| match field.trim() {
                "created_at" => Some(PostOrdering::CreatedAt),
                "-created_at" => Some(PostOrdering::CreatedAtDesc),
                "title" => Some(PostOrdering::Title),
                "-title" => Some(PostOrdering::TitleDesc),
                _ => None,
            })
            .collect::<Vec<_>>();
        if ordering.is_empty() {
            vec![PostOrdering::CreatedAtDesc]
        } else {
            ordering
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            PostOrdering::CreatedAt => "posts.created_at ASC",
            PostOrdering::CreatedAtDesc => "posts.created_at DESC",
            PostOrdering::Title => "posts.title ASC",
            PostOrdering::TitleDesc => "posts.title DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostFilter {
    pub category_id: Option<i64>,
    pub author_username: Option<String>,
    pub search_terms: Vec<String>,
    pub ordering: Vec<PostOrdering>,
}

impl Default for PostFilter {
    fn default() -> Self {
        Self {
            category_id: None,
            author_username: None,
            search_terms: vec![],
            ordering: vec![PostOrdering::CreatedAtDesc],
        }
    }
}

/// Splits a search string on whitespace and commas.
pub fn search_terms(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|term| !term.is_empty())
        .map(str::to_owned)
        .collect()
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl PostFilter {
    fn where_clause(&self) -> (String, Vec<SqlParam>) {
        let mut builder = QueryBuilder::new(" AND ")
            .add_param("posts.category_id = ?", self.category_id)
            .add_param("users.username = ?", self.author_username.clone());
        // Every term has to hit at least one searchable column.
        for term in &self.search_terms {
            let pattern = like_pattern(term);
            builder = builder.add_clause(
                r"(posts.title LIKE ? ESCAPE '\' OR posts.content LIKE ? ESCAPE '\' OR users.username LIKE ? ESCAPE '\')"
                    .to_owned(),
                vec![
                    SqlParam::Text(pattern.clone()),
                    SqlParam::Text(pattern.clone()),
                    SqlParam::Text(pattern),
                ],
            );
        }
        builder.build(" WHERE ")
    }

    fn order_clause(&self) -> String {
        let mut columns = self
            .ordering
            .iter()
            .map(PostOrdering::sql)
            .collect::<Vec<_>>();
        columns.push("posts.id DESC");
        format!(" ORDER BY {}", columns.join(", "))
    }
}

pub async fn count_posts_in_db(pool: &SqlitePool, filter: &PostFilter) -> Result<i64, RequestError> {
    let (where_clause, params) = filter.where_clause();
    let query = format!("{POST_COUNT_QUERY}{where_clause}");
    let (count,) = bind_params(sqlx::query_as::<Sqlite, (i64,)>(&query), params)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// One page of posts matching `filter`, plus the total match count.
pub async fn list_posts_in_db(
    pool: &SqlitePool,
    filter: &PostFilter,
    pagination: &Pagination,
) -> Result<(i64, Vec<Post>), RequestError> {
    let count = count_posts_in_db(pool, filter).await?;
    pagination.check(count)?;

    let (where_clause, mut params) = filter.where_clause();
    params.push(SqlParam::Int(pagination.limit()));
    params.push(SqlParam::Int(pagination.offset()));
    let query = format!(
        "{POST_QUERY}{where_clause}{} LIMIT ? OFFSET ?",
        filter.order_clause()
    );
    let posts = bind_params(sqlx::query_as::<Sqlite, Post>(&query), params)
        .fetch_all(pool)
        .await?;
    Ok((count, posts))
}

pub async fn get_post_by_id_in_db(pool: &SqlitePool, id: i64) -> Result<Option<Post>, RequestError> {
    let query = format!("{POST_QUERY} WHERE posts.id = ?");
    let result = sqlx::query_as::<Sqlite, Post>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(result)
}

pub async fn post_exists_in_db(pool: &SqlitePool, id: i64) -> Result<bool, RequestError> {
    let (exists,) =
        sqlx::query_as::<Sqlite, (i64,)>("SELECT EXISTS (SELECT 1 FROM posts WHERE id = ?)")
            .bind(id)
            .fetch_one(pool)
            .await?;
    Ok(exists != 0)
}

/// Comments for each of `post_ids`, newest first.
pub async fn get_comments_for_posts_in_db(
    pool: &SqlitePool,
    post_ids: &[i64],
) -> Result<HashMap<i64, Vec<Comment>>, RequestError> {
    let mut grouped: HashMap<i64, Vec<Comment>> = HashMap::new();
    if post_ids.is_empty() {
        return Ok(grouped);
    }
    let query = format!(
        "{COMMENT_QUERY} WHERE comments.post_id IN ({}) ORDER BY comments.created_at DESC, comments.id DESC",
        placeholders(post_ids.len())
    );
    let params = post_ids.iter().copied().map(SqlParam::Int).collect();
    let comments = bind_params(sqlx::query_as::<Sqlite, Comment>(&query), params)
        .fetch_all(pool)
        .await?;
    for comment in comments {
        grouped.entry(comment.post_id).or_default().push(comment);
    }
    Ok(grouped)
}

pub async fn insert_post_in_db(
    pool: &SqlitePool,
    author_id: i64,
    PostChanges {
        title,
        content,
        category_id,
        image,
    }: PostChanges,
) -> Result<Post, RequestError> {
    let mut tx = pool.begin().await?;
    let (id,) = sqlx::query_as::<Sqlite, (i64,)>(
        r#"
        INSERT INTO posts (title, content, created_at, image, category_id, author_id)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(title)
    .bind(content)
    .bind(Utc::now())
    .bind(image.flatten())
    .bind(category_id)
    .bind(author_id)
    .fetch_one(&mut tx)
    .await?;
    tx.commit().await?;
    tracing::info!(post_id = id, author_id, "post created");

    get_post_by_id_in_db(pool, id)
        .await?
        .ok_or(RequestError::NotFound)
}

/// Applies the given changes on top of `current`; author and creation time never move.
pub async fn update_post_in_db(
    pool: &SqlitePool,
    current: Post,
    PostChanges {
        title,
        content,
        category_id,
        image,
    }: PostChanges,
) -> Result<Post, RequestError> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, content = ?, image = ?, category_id = ?
        WHERE id = ?
        "#,
    )
    .bind(title.unwrap_or(current.title))
    .bind(content.unwrap_or(current.content))
    .bind(image.unwrap_or(current.image))
    .bind(category_id.unwrap_or(current.category_id))
    .bind(current.id)
    .execute(&mut tx)
    .await?;
    tx.commit().await?;

    get_post_by_id_in_db(pool, current.id)
        .await?
        .ok_or(RequestError::NotFound)
}

pub async fn delete_post_in_db(pool: &SqlitePool, id: i64) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(&mut tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RequestError::NotFound);
    }
    tx.commit().await?;
    tracing::info!(post_id = id, "post deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_defaults_to_newest_first() {
        assert_eq!(PostOrdering::parse_list(None), vec![PostOrdering::CreatedAtDesc]);
        assert_eq!(
            PostOrdering::parse_list(Some("bogus")),
            vec![PostOrdering::CreatedAtDesc]
        );
    }

    #[test]
    fn ordering_keeps_known_fields_in_order() {
        assert_eq!(
            PostOrdering::parse_list(Some("title, -created_at,nope")),
            vec![PostOrdering::Title, PostOrdering::CreatedAtDesc]
        );
    }

    #[test]
    fn search_splits_on_spaces_and_commas() {
        assert_eq!(
            search_terms(Some(" rust  axum,sqlx ")),
            vec!["rust", "axum", "sqlx"]
        );
        assert!(search_terms(Some("   ")).is_empty());
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("50%_off"), r"%50\%\_off%");
    }

    #[test]
    fn where_clause_binds_each_search_term_three_times() {
        let filter = PostFilter {
            category_id: Some(2),
            search_terms: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        let (clause, params) = filter.where_clause();
        assert!(clause.starts_with(" WHERE posts.category_id = ?"));
        assert_eq!(params.len(), 1 + 2 * 3);
        assert_eq!(params[0], SqlParam::Int(2));
    }
}
