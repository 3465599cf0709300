mod common;

use chrono::{DateTime, Datelike, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};

fn timestamp(value: &Value) -> DateTime<Utc> {
    value.as_str().unwrap().parse().unwrap()
}

async fn post_with_author(app: &common::TestApp, username: &str) -> (String, i64) {
    let token = app.user(username).await;
    let category = app.create_category(&token, "Lifestyle").await;
    let post = app.create_post(&token, category, "Morning routine").await;
    (token, post["id"].as_i64().unwrap())
}

#[tokio::test]
async fn comments_of_unknown_posts_list_empty() {
    let app = common::spawn_app().await;
    for path in ["/api/posts/42/comments/", "/api/posts/abc/comments/"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let page: Value = response.json().await.unwrap();
        assert_eq!(page["count"], 0);
        assert_eq!(page["results"], json!([]));
    }
}

#[tokio::test]
async fn commenting_on_an_unknown_post_is_a_bad_request() {
    let app = common::spawn_app().await;
    let token = app.user("alice").await;
    let response = app
        .create_comment(&token, 42, json!({ "content": "hello?" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "post": ["Post not found"] }));
}

#[tokio::test]
async fn comment_author_and_post_come_from_the_request_context() {
    let app = common::spawn_app().await;
    let (_, post_id) = post_with_author(&app, "alice").await;
    let bob = app.user("bob").await;

    let response = app
        .create_comment(
            &bob,
            post_id,
            json!({ "content": "Nice", "author": 1, "post": 999 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let comment: Value = response.json().await.unwrap();
    assert_eq!(comment["author_username"], "bob");
    assert_eq!(comment["post"], post_id);
    assert_eq!(comment["parent"], Value::Null);
    assert!(comment["updated_at"].is_string());

    let page: Value = app
        .get(&format!("/api/posts/{post_id}/comments/"), None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["id"], comment["id"]);
}

#[tokio::test]
async fn anonymous_cannot_comment() {
    let app = common::spawn_app().await;
    let (_, post_id) = post_with_author(&app, "alice").await;
    let response = app
        .post_json(
            &format!("/api/posts/{post_id}/comments/"),
            None,
            json!({ "content": "hi" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn replies_must_stay_on_the_same_post() {
    let app = common::spawn_app().await;
    let (token, first_post) = post_with_author(&app, "alice").await;
    let category = app.create_category(&token, "Books").await;
    let second_post = app.create_post(&token, category, "Reading list").await["id"]
        .as_i64()
        .unwrap();

    let response = app
        .create_comment(&token, first_post, json!({ "content": "root" }))
        .await;
    let root: Value = response.json().await.unwrap();

    let response = app
        .create_comment(
            &token,
            first_post,
            json!({ "content": "reply", "parent": root["id"] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let reply: Value = response.json().await.unwrap();
    assert_eq!(reply["parent"], root["id"]);

    let response = app
        .create_comment(
            &token,
            second_post,
            json!({ "content": "cross-post", "parent": root["id"] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["parent"].is_array());
}

#[tokio::test]
async fn reply_chains_cannot_loop() {
    let app = common::spawn_app().await;
    let (token, post_id) = post_with_author(&app, "alice").await;
    let root: Value = app
        .create_comment(&token, post_id, json!({ "content": "root" }))
        .await
        .json()
        .await
        .unwrap();
    let child: Value = app
        .create_comment(
            &token,
            post_id,
            json!({ "content": "child", "parent": root["id"] }),
        )
        .await
        .json()
        .await
        .unwrap();

    let root_path = format!("/api/posts/{post_id}/comments/{}/", root["id"]);
    for parent in [&child["id"], &root["id"]] {
        let response = app
            .patch_json(&root_path, Some(&token), json!({ "parent": parent }))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body["parent"][0],
            "A comment cannot be a reply to itself or to one of its replies."
        );
    }

    let child_path = format!("/api/posts/{post_id}/comments/{}/", child["id"]);
    let response = app
        .patch_json(&child_path, Some(&token), json!({ "parent": null }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["parent"], Value::Null);
}

#[tokio::test]
async fn only_the_author_may_change_a_comment() {
    let app = common::spawn_app().await;
    let (alice, post_id) = post_with_author(&app, "alice").await;
    let bob = app.user("bob").await;
    let comment: Value = app
        .create_comment(&alice, post_id, json!({ "content": "mine" }))
        .await
        .json()
        .await
        .unwrap();
    let path = format!("/api/posts/{post_id}/comments/{}/", comment["id"]);

    let response = app
        .patch_json(&path, Some(&bob), json!({ "content": "yours" }))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        app.delete(&path, Some(&bob)).await.status(),
        StatusCode::FORBIDDEN
    );

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let response = app
        .patch_json(&path, Some(&alice), json!({ "content": "edited" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let edited: Value = response.json().await.unwrap();
    assert_eq!(edited["content"], "edited");
    assert_eq!(edited["created_at"], comment["created_at"]);
    assert!(timestamp(&edited["updated_at"]) > timestamp(&comment["updated_at"]));

    assert_eq!(
        app.delete(&path, Some(&alice)).await.status(),
        StatusCode::NO_CONTENT
    );
    assert_eq!(app.get(&path, None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_comment_removes_its_replies() {
    let app = common::spawn_app().await;
    let (token, post_id) = post_with_author(&app, "alice").await;
    let root: Value = app
        .create_comment(&token, post_id, json!({ "content": "root" }))
        .await
        .json()
        .await
        .unwrap();
    app.create_comment(
        &token,
        post_id,
        json!({ "content": "reply", "parent": root["id"] }),
    )
    .await;

    let response = app
        .delete(
            &format!("/api/posts/{post_id}/comments/{}/", root["id"]),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let page: Value = app
        .get(&format!("/api/posts/{post_id}/comments/"), None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page["count"], 0);
}

#[tokio::test]
async fn comment_timestamps_are_set_by_the_server() {
    let app = common::spawn_app().await;
    let (token, post_id) = post_with_author(&app, "alice").await;

    let response = app
        .create_comment(
            &token,
            post_id,
            json!({
                "content": "backdated",
                "created_at": "2000-01-01T00:00:00Z",
                "updated_at": "2000-01-01T00:00:00Z",
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let comment: Value = response.json().await.unwrap();
    assert!(timestamp(&comment["created_at"]).year() > 2000);
    assert!(timestamp(&comment["updated_at"]).year() > 2000);
}
