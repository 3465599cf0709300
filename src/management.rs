use serde_json::Value;
use sqlx::SqlitePool;

use crate::{
    data_formats::RegisterRequest,
    db_helpers::{get_or_create_category_in_db, insert_user},
    errors::RequestError,
    models::User,
};

pub const DEFAULT_CATEGORIES: [&str; 20] = [
    "Technology",
    "Travel",
    "Food",
    "Lifestyle",
    "Health",
    "Education",
    "Business",
    "Entertainment",
    "Sports",
    "Science",
    "Art",
    "Music",
    "Books",
    "Movies",
    "Gaming",
    "Fashion",
    "Beauty",
    "Parenting",
    "Finance",
    "Politics",
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub existing: usize,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.created + self.existing
    }
}

/// Makes sure every default category exists. Safe to run repeatedly.
pub async fn seed_categories(pool: &SqlitePool) -> Result<SeedReport, RequestError> {
    let mut report = SeedReport::default();
    for name in DEFAULT_CATEGORIES {
        let (category, created) = get_or_create_category_in_db(pool, name).await?;
        if created {
            report.created += 1;
            tracing::info!(category_id = category.id, "created category \"{name}\"");
        } else {
            report.existing += 1;
            tracing::warn!(category_id = category.id, "category \"{name}\" already exists");
        }
    }
    tracing::info!(
        "created {} new categories out of {} total",
        report.created,
        report.total()
    );
    Ok(report)
}

/// Creates a user with the same validation and hashing as `/api/register/`.
pub async fn create_user(
    pool: &SqlitePool,
    username: String,
    password: String,
) -> Result<User, RequestError> {
    let new_user = RegisterRequest {
        username: Some(Value::String(username)),
        password: Some(Value::String(password)),
    }
    .validate()
    .map_err(RequestError::Validation)?;
    insert_user(pool, new_user).await
}
