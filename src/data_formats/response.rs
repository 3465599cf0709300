use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Category, Comment, Post, User};

#[derive(Deserialize, Serialize, Debug)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CommentResponse {
    pub id: i64,
    pub post: i64,
    pub author: i64,
    pub author_username: String,
    pub parent: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub category: CategoryResponse,
    pub author: i64,
    pub author_username: String,
    pub image: Option<String>,
    pub comments_count: i64,
    pub comments: Vec<CommentResponse>,
}

impl From<User> for UserResponse {
    fn from(User { id, username, .. }: User) -> Self {
        UserResponse { id, username }
    }
}

impl From<Category> for CategoryResponse {
    fn from(Category { id, name }: Category) -> Self {
        CategoryResponse { id, name }
    }
}

impl From<Comment> for CommentResponse {
    fn from(
        Comment {
            id,
            content,
            created_at,
            updated_at,
            post_id,
            author_id,
            author_username,
            parent_id,
        }: Comment,
    ) -> Self {
        CommentResponse {
            id,
            post: post_id,
            author: author_id,
            author_username,
            parent: parent_id,
            content,
            created_at,
            updated_at,
        }
    }
}

impl PostResponse {
    pub fn new(
        Post {
            id,
            title,
            content,
            created_at,
            image,
            category_id,
            category_name,
            author_id,
            author_username,
            comments_count,
        }: Post,
        comments: Vec<Comment>,
    ) -> Self {
        PostResponse {
            id,
            title,
            content,
            created_at,
            category: CategoryResponse {
                id: category_id,
                name: category_name,
            },
            author: author_id,
            author_username,
            image,
            comments_count,
            comments: comments.into_iter().map(CommentResponse::from).collect(),
        }
    }
}
