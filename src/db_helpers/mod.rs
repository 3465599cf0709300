use sqlx::{query::QueryAs, sqlite::SqliteArguments, Sqlite, SqlitePool};

use crate::{errors::RequestError, models::User};

mod category_helpers;
mod comment_helpers;
mod post_helpers;
mod user_helpers;

pub use category_helpers::*;
pub use comment_helpers::*;
pub use post_helpers::*;
pub use user_helpers::*;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlParam {
    Int(i64),
    Text(String),
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Int(value)
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

/// Collects optional `?`-placeholder clauses and their values in binding order.
pub(crate) struct QueryBuilder {
    clauses: Vec<String>,
    params: Vec<SqlParam>,
    seperator: &'static str,
}

impl QueryBuilder {
    pub(crate) fn new(seperator: &'static str) -> Self {
        Self {
            clauses: vec![],
            params: vec![],
            seperator,
        }
    }

    pub(crate) fn add_param<P: Into<SqlParam>>(mut self, clause: &str, param: Option<P>) -> Self {
        if let Some(value) = param {
            self.clauses.push(clause.to_owned());
            self.params.push(value.into());
        }
        self
    }

    pub(crate) fn add_clause(mut self, clause: String, params: Vec<SqlParam>) -> Self {
        self.clauses.push(clause);
        self.params.extend(params);
        self
    }

    /// `prefix` is emitted only when at least one clause was added.
    pub(crate) fn build(self, prefix: &str) -> (String, Vec<SqlParam>) {
        if self.clauses.is_empty() {
            return (String::new(), self.params);
        }
        let query = format!("{prefix}{}", self.clauses.join(self.seperator));
        (query, self.params)
    }
}

pub(crate) fn bind_params<'q, O>(
    mut query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    params: Vec<SqlParam>,
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Int(value) => query.bind(value),
            SqlParam::Text(value) => query.bind(value),
        };
    }
    query
}

/// `?, ?, ?` for an `IN (...)` list of `count` values.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

// ----------------- Helper Functions -----------------

const USER_QUERY: &str = "SELECT id, username, password, created_at FROM users";

pub async fn get_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, RequestError> {
    let result = sqlx::query_as::<Sqlite, User>(&format!("{USER_QUERY} WHERE username = ?"))
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(result)
}

pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, RequestError> {
    let result = sqlx::query_as::<Sqlite, User>(&format!("{USER_QUERY} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(result)
}
