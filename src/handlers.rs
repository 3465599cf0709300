use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Path, Query},
    http::{StatusCode, Uri},
    Extension, Json,
};
use sqlx::SqlitePool;

use crate::{
    authentication::{
        get_jwt_token, get_token_pair, verify_jwt_token, verify_password_argon2, AuthUser,
        MaybeUser, TokenType,
    },
    config::AppConfig,
    data_formats::{
        CategoryRequest, CategoryResponse, CommentRequest, CommentResponse, PageQueryParams,
        Paginated, PostQueryParams, PostRequest, PostResponse, RefreshRequest, RegisterRequest,
        TokenRequest, UserResponse,
    },
    db_helpers::{
        delete_category_in_db, delete_comment_in_db, delete_post_in_db,
        get_category_by_id_in_db, get_comment_for_post_in_db, get_comments_for_posts_in_db,
        get_post_by_id_in_db, get_user_by_id, get_user_by_username, insert_category_in_db,
        insert_comment_in_db, insert_post_in_db, insert_user, list_categories_in_db,
        list_comments_for_post_in_db, list_posts_in_db, post_exists_in_db, search_terms,
        update_category_in_db, update_comment_in_db, update_post_in_db, validate_parent_in_db,
        PostFilter, PostOrdering,
    },
    errors::RequestError,
    extractors::{parse_pk, JsonBody},
    models::{Category, Comment, Post},
    pagination::Pagination,
    permissions::ensure_author,
    AccessTokenResponse, TokenPairResponse,
};

type Db = Extension<Arc<SqlitePool>>;
type Config = Extension<Arc<AppConfig>>;
type JsonResult<T> = Result<Json<T>, RequestError>;
type CreatedResult<T> = Result<(StatusCode, Json<T>), RequestError>;

const INVALID_CREDENTIALS: &str = "No active account found with the given credentials";

// ----------------- Helper Handlers -----------------
pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> RequestError {
    tracing::debug!(%uri, "no route");
    RequestError::NotFound
}

async fn post_responses(pool: &SqlitePool, posts: Vec<Post>) -> Result<Vec<PostResponse>, RequestError> {
    let ids = posts.iter().map(|post| post.id).collect::<Vec<_>>();
    let mut comments = get_comments_for_posts_in_db(pool, &ids).await?;
    Ok(posts
        .into_iter()
        .map(|post| {
            let post_comments = comments.remove(&post.id).unwrap_or_default();
            PostResponse::new(post, post_comments)
        })
        .collect())
}

async fn find_post(pool: &SqlitePool, raw_id: &str) -> Result<Post, RequestError> {
    let id = parse_pk(raw_id).ok_or(RequestError::NotFound)?;
    get_post_by_id_in_db(pool, id)
        .await?
        .ok_or(RequestError::NotFound)
}

async fn find_category(pool: &SqlitePool, raw_id: &str) -> Result<Category, RequestError> {
    let id = parse_pk(raw_id).ok_or(RequestError::NotFound)?;
    get_category_by_id_in_db(pool, id)
        .await?
        .ok_or(RequestError::NotFound)
}

async fn find_comment(
    pool: &SqlitePool,
    raw_post_id: &str,
    raw_id: &str,
) -> Result<Comment, RequestError> {
    let (post_id, id) = parse_pk(raw_post_id)
        .zip(parse_pk(raw_id))
        .ok_or(RequestError::NotFound)?;
    get_comment_for_post_in_db(pool, post_id, id)
        .await?
        .ok_or(RequestError::NotFound)
}

async fn ensure_category_exists(pool: &SqlitePool, id: Option<i64>) -> Result<(), RequestError> {
    if let Some(id) = id {
        if get_category_by_id_in_db(pool, id).await?.is_none() {
            return Err(RequestError::field(
                "category_id",
                format!("Invalid pk \"{id}\" - object does not exist."),
            ));
        }
    }
    Ok(())
}

// ----------------- User Handlers -----------------
pub async fn register_user(
    Extension(pool): Db,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> CreatedResult<UserResponse> {
    let new_user = request.validate().map_err(RequestError::Validation)?;
    let user = insert_user(&pool, new_user).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn obtain_token_pair(
    Extension(pool): Db,
    Extension(config): Config,
    JsonBody(request): JsonBody<TokenRequest>,
) -> JsonResult<TokenPairResponse> {
    let (username, password) = request.validate().map_err(RequestError::Validation)?;
    let user = get_user_by_username(&pool, &username)
        .await?
        .ok_or(RequestError::NotAuthorized(INVALID_CREDENTIALS))?;
    if !verify_password_argon2(password, &user.password).await? {
        tracing::info!(%username, "rejected login");
        return Err(RequestError::NotAuthorized(INVALID_CREDENTIALS));
    }
    let tokens = get_token_pair(&config.jwt, user.id, &user.username)?;
    tracing::info!(user_id = user.id, "token pair issued");
    Ok(Json(tokens))
}

pub async fn refresh_access_token(
    Extension(pool): Db,
    Extension(config): Config,
    JsonBody(request): JsonBody<RefreshRequest>,
) -> JsonResult<AccessTokenResponse> {
    let refresh = request.validate().map_err(RequestError::Validation)?;
    let claims = verify_jwt_token(&config.jwt, &refresh, TokenType::Refresh)?;
    let user = get_user_by_id(&pool, claims.user_id)
        .await?
        .ok_or(RequestError::InvalidToken)?;
    let access = get_jwt_token(&config.jwt, user.id, &user.username, TokenType::Access)?;
    Ok(Json(AccessTokenResponse { access }))
}
// ----------------- End User Handlers -----------------

// ----------------- Category Handlers -----------------
pub async fn list_categories(
    Extension(pool): Db,
    _: MaybeUser,
) -> JsonResult<Vec<CategoryResponse>> {
    let categories = list_categories_in_db(&pool).await?;
    Ok(Json(categories.into_iter().map(CategoryResponse::from).collect()))
}

pub async fn get_category(
    Extension(pool): Db,
    _: MaybeUser,
    Path(id): Path<String>,
) -> JsonResult<CategoryResponse> {
    let category = find_category(&pool, &id).await?;
    Ok(Json(category.into()))
}

pub async fn create_category(
    Extension(pool): Db,
    _: AuthUser,
    JsonBody(request): JsonBody<CategoryRequest>,
) -> CreatedResult<CategoryResponse> {
    let name = request
        .validate(false)
        .map_err(RequestError::Validation)?
        .ok_or(RequestError::field("name", "This field is required."))?;
    let category = insert_category_in_db(&pool, &name).await?;
    tracing::info!(category_id = category.id, "category created");
    Ok((StatusCode::CREATED, Json(category.into())))
}

async fn update_category(
    pool: &SqlitePool,
    id: &str,
    request: CategoryRequest,
    partial: bool,
) -> JsonResult<CategoryResponse> {
    let category = find_category(pool, id).await?;
    let name = request.validate(partial).map_err(RequestError::Validation)?;
    let category = match name {
        Some(name) => update_category_in_db(pool, category.id, &name).await?,
        None => category,
    };
    Ok(Json(category.into()))
}

pub async fn replace_category(
    Extension(pool): Db,
    _: AuthUser,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<CategoryRequest>,
) -> JsonResult<CategoryResponse> {
    update_category(&pool, &id, request, false).await
}

pub async fn patch_category(
    Extension(pool): Db,
    _: AuthUser,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<CategoryRequest>,
) -> JsonResult<CategoryResponse> {
    update_category(&pool, &id, request, true).await
}

pub async fn delete_category(
    Extension(pool): Db,
    _: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, RequestError> {
    let category = find_category(&pool, &id).await?;
    delete_category_in_db(&pool, category.id).await?;
    tracing::info!(category_id = category.id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}
// ----------------- End Category Handlers -----------------

// ----------------- Post Handlers -----------------
pub async fn list_posts(
    Extension(pool): Db,
    Extension(config): Config,
    _: MaybeUser,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<PostQueryParams>,
) -> JsonResult<Paginated<PostResponse>> {
    let pagination = Pagination::new(params.page.as_deref(), config.page_size)?;

    let category_id = match params.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let invalid_choice = || {
                RequestError::field(
                    "category",
                    "Select a valid choice. That choice is not one of the available choices.",
                )
            };
            let id = parse_pk(raw).ok_or_else(invalid_choice)?;
            get_category_by_id_in_db(&pool, id)
                .await?
                .ok_or_else(invalid_choice)?;
            Some(id)
        }
    };
    let filter = PostFilter {
        category_id,
        author_username: params.author_username.filter(|name| !name.is_empty()),
        search_terms: search_terms(params.search.as_deref()),
        ordering: PostOrdering::parse_list(params.ordering.as_deref()),
    };

    let (count, posts) = list_posts_in_db(&pool, &filter, &pagination).await?;
    let results = post_responses(&pool, posts).await?;
    Ok(Json(pagination.wrap(&uri, count, results)))
}

pub async fn get_post(
    Extension(pool): Db,
    _: MaybeUser,
    Path(id): Path<String>,
) -> JsonResult<PostResponse> {
    let post = find_post(&pool, &id).await?;
    let mut responses = post_responses(&pool, vec![post]).await?;
    responses.pop().map(Json).ok_or(RequestError::NotFound)
}

pub async fn create_post(
    Extension(pool): Db,
    user: AuthUser,
    JsonBody(request): JsonBody<PostRequest>,
) -> CreatedResult<PostResponse> {
    let changes = request.validate(false).map_err(RequestError::Validation)?;
    ensure_category_exists(&pool, changes.category_id).await?;
    let post = insert_post_in_db(&pool, user.id, changes).await?;
    Ok((StatusCode::CREATED, Json(PostResponse::new(post, vec![]))))
}

async fn update_post(
    pool: &SqlitePool,
    user: &AuthUser,
    id: &str,
    request: PostRequest,
    partial: bool,
) -> JsonResult<PostResponse> {
    let post = find_post(pool, id).await?;
    ensure_author(user, &post)?;
    let changes = request.validate(partial).map_err(RequestError::Validation)?;
    ensure_category_exists(pool, changes.category_id).await?;
    let post = update_post_in_db(pool, post, changes).await?;
    let mut responses = post_responses(pool, vec![post]).await?;
    responses.pop().map(Json).ok_or(RequestError::NotFound)
}

pub async fn replace_post(
    Extension(pool): Db,
    user: AuthUser,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<PostRequest>,
) -> JsonResult<PostResponse> {
    update_post(&pool, &user, &id, request, false).await
}

pub async fn patch_post(
    Extension(pool): Db,
    user: AuthUser,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<PostRequest>,
) -> JsonResult<PostResponse> {
    update_post(&pool, &user, &id, request, true).await
}

pub async fn delete_post(
    Extension(pool): Db,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, RequestError> {
    let post = find_post(&pool, &id).await?;
    ensure_author(&user, &post)?;
    delete_post_in_db(&pool, post.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
// ----------------- End Post Handlers -----------------

// ----------------- Comment Handlers -----------------

/// An unknown or malformed post id lists as an empty page rather than an error.
pub async fn list_comments(
    Extension(pool): Db,
    Extension(config): Config,
    _: MaybeUser,
    OriginalUri(uri): OriginalUri,
    Path(post_id): Path<String>,
    Query(params): Query<PageQueryParams>,
) -> JsonResult<Paginated<CommentResponse>> {
    let pagination = Pagination::new(params.page.as_deref(), config.page_size)?;
    let post_id = match parse_pk(&post_id) {
        Some(id) if post_exists_in_db(&pool, id).await? => id,
        _ => {
            pagination.check(0)?;
            return Ok(Json(pagination.wrap(&uri, 0, vec![])));
        }
    };
    let (count, comments) = list_comments_for_post_in_db(&pool, post_id, &pagination).await?;
    let results = comments.into_iter().map(CommentResponse::from).collect();
    Ok(Json(pagination.wrap(&uri, count, results)))
}

pub async fn get_comment(
    Extension(pool): Db,
    _: MaybeUser,
    Path((post_id, id)): Path<(String, String)>,
) -> JsonResult<CommentResponse> {
    let comment = find_comment(&pool, &post_id, &id).await?;
    Ok(Json(comment.into()))
}

/// Author and post come from the caller and the path, never from the body.
pub async fn create_comment(
    Extension(pool): Db,
    user: AuthUser,
    Path(post_id): Path<String>,
    JsonBody(request): JsonBody<CommentRequest>,
) -> CreatedResult<CommentResponse> {
    let changes = request.validate(false).map_err(RequestError::Validation)?;
    let post_id = match parse_pk(&post_id) {
        Some(id) if post_exists_in_db(&pool, id).await? => id,
        _ => return Err(RequestError::field("post", "Post not found")),
    };
    let parent_id = changes.parent.flatten();
    if let Some(parent_id) = parent_id {
        validate_parent_in_db(&pool, post_id, None, parent_id).await?;
    }
    let content = changes.content.unwrap_or_default();
    let comment = insert_comment_in_db(&pool, post_id, user.id, &content, parent_id).await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

async fn update_comment(
    pool: &SqlitePool,
    user: &AuthUser,
    (post_id, id): (String, String),
    request: CommentRequest,
    partial: bool,
) -> JsonResult<CommentResponse> {
    let comment = find_comment(pool, &post_id, &id).await?;
    ensure_author(user, &comment)?;
    let changes = request.validate(partial).map_err(RequestError::Validation)?;
    if let Some(Some(parent_id)) = changes.parent {
        validate_parent_in_db(pool, comment.post_id, Some(comment.id), parent_id).await?;
    }
    let comment = update_comment_in_db(pool, comment, changes.content, changes.parent).await?;
    Ok(Json(comment.into()))
}

pub async fn replace_comment(
    Extension(pool): Db,
    user: AuthUser,
    Path(ids): Path<(String, String)>,
    JsonBody(request): JsonBody<CommentRequest>,
) -> JsonResult<CommentResponse> {
    update_comment(&pool, &user, ids, request, false).await
}

pub async fn patch_comment(
    Extension(pool): Db,
    user: AuthUser,
    Path(ids): Path<(String, String)>,
    JsonBody(request): JsonBody<CommentRequest>,
) -> JsonResult<CommentResponse> {
    update_comment(&pool, &user, ids, request, true).await
}

pub async fn delete_comment(
    Extension(pool): Db,
    user: AuthUser,
    Path((post_id, id)): Path<(String, String)>,
) -> Result<StatusCode, RequestError> {
    let comment = find_comment(&pool, &post_id, &id).await?;
    ensure_author(&user, &comment)?;
    delete_comment_in_db(&pool, comment.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
// ----------------- End Comment Handlers -----------------
