#![allow(dead_code)]

use blog_backend::{build_app, config::AppConfig, get_random_free_port, init_db, serve};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const PASSWORD: &str = "correct-horse-42";
const JWT_SECRET: &str = "integration-test-secret";

/// A running server on a random port backed by a throwaway SQLite file.
pub struct TestApp {
    pub address: String,
    pub config: AppConfig,
    pub client: Client,
    _dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let database_url = format!("sqlite://{}", dir.path().join("blog.db").display());
    let config = AppConfig::with_database(database_url, JWT_SECRET);

    let app = build_app(config.clone()).await.expect("failed to build app");
    let (port, listener) = get_random_free_port().expect("no free port");
    tokio::spawn(serve(app, listener));

    TestApp {
        address: format!("http://127.0.0.1:{port}"),
        config,
        client: Client::new(),
        _dir: dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn pool(&self) -> SqlitePool {
        init_db(&self.config).await.expect("failed to open database")
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("request failed")
    }

    pub async fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> Response {
        let mut request = self.client.request(method, self.url(path)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("request failed")
    }

    pub async fn post_json(&self, path: &str, token: Option<&str>, body: Value) -> Response {
        self.send_json(reqwest::Method::POST, path, token, body).await
    }

    pub async fn patch_json(&self, path: &str, token: Option<&str>, body: Value) -> Response {
        self.send_json(reqwest::Method::PATCH, path, token, body).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Response {
        let mut request = self.client.delete(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("request failed")
    }

    pub async fn register(&self, username: &str) -> Response {
        self.post_json(
            "/api/register/",
            None,
            json!({ "username": username, "password": PASSWORD }),
        )
        .await
    }

    pub async fn login(&self, username: &str) -> Value {
        let response = self
            .post_json(
                "/api/token/",
                None,
                json!({ "username": username, "password": PASSWORD }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.expect("token body")
    }

    /// Registers `username` and returns an access token for it.
    pub async fn user(&self, username: &str) -> String {
        assert_eq!(self.register(username).await.status(), StatusCode::CREATED);
        self.login(username).await["access"]
            .as_str()
            .expect("access token")
            .to_owned()
    }

    pub async fn create_category(&self, token: &str, name: &str) -> i64 {
        let response = self
            .post_json("/api/categories/", Some(token), json!({ "name": name }))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("category body");
        body["id"].as_i64().expect("category id")
    }

    pub async fn create_post(&self, token: &str, category_id: i64, title: &str) -> Value {
        let response = self
            .post_json(
                "/api/posts/",
                Some(token),
                json!({
                    "title": title,
                    "content": format!("Body of {title}"),
                    "category_id": category_id,
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("post body")
    }

    pub async fn create_comment(&self, token: &str, post_id: i64, body: Value) -> Response {
        self.post_json(&format!("/api/posts/{post_id}/comments/"), Some(token), body)
            .await
    }
}
