pub mod authentication;
pub mod config;
mod data_formats;
pub mod db_helpers;
pub mod errors;
mod extractors;
mod handlers;
pub mod management;
pub mod models;
mod pagination;
mod permissions;

use std::str::FromStr;
use std::{
    net::{SocketAddr, TcpListener},
    sync::Arc,
};

use anyhow::Context;
pub use anyhow::Result;
use axum::http::StatusCode;
use axum::{routing::*, Extension, Json, Router};
use config::AppConfig;
pub use data_formats::*;
use handlers::*;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub type JsonResponse<T> = (StatusCode, Json<T>);

const DEFAULT_LOG_FILTER: &str = "blog_backend=debug,tower_http=info";

/// Installs the global subscriber. `RUST_LOG` picks the filter, `LOG_FORMAT=json` the format.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {e}");
    }
}

/// Opens (creating if needed) the SQLite database and brings its schema up to date.
pub async fn init_db(config: &AppConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("Invalid DATABASE_URL {}", config.database_url))?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(options)
        .await
        .context("Failed to connect to the database")?;
    tracing::info!(database_url = %config.database_url, "database connected");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("migrations completed");
    Ok(pool)
}

/// Registers `path` (which ends in `/`) along with its slashless spelling.
fn route_with_alias(router: Router, path: &str, method_router: MethodRouter) -> Router {
    router
        .route(path, method_router.clone())
        .route(path.trim_end_matches('/'), method_router)
}

pub fn make_router() -> Router {
    let routes: Vec<(&str, MethodRouter)> = vec![
        ("/api/health/", get(alive)),
        ("/api/register/", post(register_user)),
        ("/api/token/", post(obtain_token_pair)),
        ("/api/token/refresh/", post(refresh_access_token)),
        (
            "/api/categories/",
            get(list_categories).post(create_category),
        ),
        (
            "/api/categories/:category_id/",
            get(get_category)
                .put(replace_category)
                .patch(patch_category)
                .delete(delete_category),
        ),
        ("/api/posts/", get(list_posts).post(create_post)),
        (
            "/api/posts/:post_id/",
            get(get_post)
                .put(replace_post)
                .patch(patch_post)
                .delete(delete_post),
        ),
        (
            "/api/posts/:post_id/comments/",
            get(list_comments).post(create_comment),
        ),
        (
            "/api/posts/:post_id/comments/:comment_id/",
            get(get_comment)
                .put(replace_comment)
                .patch(patch_comment)
                .delete(delete_comment),
        ),
    ];
    routes
        .into_iter()
        .fold(Router::new(), |router, (path, method_router)| {
            route_with_alias(router, path, method_router)
        })
        .fallback(not_found)
}

/// Full application: routes plus database, config, tracing and CORS layers.
pub async fn build_app(config: AppConfig) -> Result<Router> {
    let pool = init_db(&config).await?;
    Ok(make_router()
        .layer(Extension(Arc::new(pool)))
        .layer(Extension(Arc::new(config)))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http()))
}

pub async fn run_app(app: Router, address: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(address).with_context(|| format!("Failed to bind {address}"))?;
    serve(app, listener).await
}

pub async fn serve(app: Router, listener: TcpListener) -> Result<()> {
    tracing::info!(address = %listener.local_addr()?, "listening");
    axum::Server::from_tcp(listener)?
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

pub fn get_random_free_port() -> Result<(u16, TcpListener)> {
    let listener = TcpListener::bind("127.0.0.1:0").context("Could not get a free port")?;
    let port = listener.local_addr()?.port();
    Ok((port, listener))
}
