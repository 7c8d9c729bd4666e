//! End-to-end tests against a real listener.
//!
//! Each test binds the router on an ephemeral port and talks to it over
//! HTTP with reqwest, the same way a client would.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use grades_api::api::{create_router, AppState};
use grades_api::auth::TokenIssuer;
use grades_api::store::{GradeStore, MemoryGradeStore, SqliteGradeStore};
use pretty_assertions::assert_eq;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Running server plus a client holding a bearer token.
struct Harness {
    base: String,
    client: Client,
    token: String,
}

impl Harness {
    async fn start(store: Arc<dyn GradeStore>) -> Self {
        let tokens = Arc::new(TokenIssuer::new(
            [("testuser".to_string(), "testpass".to_string())],
            Duration::from_secs(300),
            Duration::from_secs(86_400),
        ));
        let router = create_router(AppState::new(store, tokens));

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let base = format!("http://{}", addr);
        let client = Client::new();
        let pair: Value = client
            .post(format!("{base}/api/token/"))
            .json(&json!({"username": "testuser", "password": "testpass"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let token = pair["access"].as_str().unwrap().to_string();

        Self {
            base,
            client,
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn create(&self, name: &str, score: i32) -> Value {
        let response = self
            .client
            .post(self.url("/grades/"))
            .bearer_auth(&self.token)
            .json(&json!({"student_name": name, "score": score}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }
}

#[tokio::test]
async fn full_grade_lifecycle() {
    let app = Harness::start(Arc::new(MemoryGradeStore::new())).await;

    // Create, then read back: identical apart from server-assigned fields.
    let created = app.create("Charlie", 88).await;
    let id = created["id"].as_i64().unwrap();
    let fetched: Value = app
        .client
        .get(app.url(&format!("/grades/{id}/")))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, created);

    // Replace.
    let response = app
        .client
        .put(app.url(&format!("/grades/{id}/")))
        .bearer_auth(&app.token)
        .json(&json!({"student_name": "Charlie Updated", "score": 92}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["student_name"], "Charlie Updated");
    assert_eq!(updated["created_at"], created["created_at"]);

    // Delete, then it is gone.
    let response = app
        .client
        .delete(app.url(&format!("/grades/{id}/")))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .client
        .get(app.url(&format!("/grades/{id}/")))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // A new record does not inherit the deleted id.
    let next = app.create("Dana", 70).await;
    assert!(next["id"].as_i64().unwrap() > id);
}

#[tokio::test]
async fn stats_follow_stored_scores() {
    let app = Harness::start(Arc::new(MemoryGradeStore::new())).await;

    let empty: Value = app
        .client
        .get(app.url("/grades/stats/"))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(empty, json!({"error": "No grades available"}));

    app.create("Charlie", 88).await;
    app.create("Bob", 90).await;
    app.create("Alice", 88).await;

    let response = app
        .client
        .get(app.url("/grades/stats/"))
        .bearer_auth(&app.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats: Value = response.json().await.unwrap();
    assert_eq!(stats["median"], json!(88.0));
    assert_eq!(stats["mode"], json!(88));
    let mean = stats["mean"].as_f64().unwrap();
    assert!((mean - 88.666_666_666_666_67).abs() < 1e-9);
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = Harness::start(Arc::new(MemoryGradeStore::new())).await;

    let response = app.client.get(app.url("/grades/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .get(app.url("/grades/stats/"))
        .bearer_auth("expired-or-made-up")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sqlite_records_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grades.db");

    let created = {
        let store = Arc::new(SqliteGradeStore::open(&path).unwrap());
        let app = Harness::start(store).await;
        app.create("Alice", 85).await
    };

    let reopened = SqliteGradeStore::open(&path).unwrap();
    let grades = reopened.list().unwrap();
    assert_eq!(grades.len(), 1);
    assert_eq!(serde_json::to_value(&grades[0]).unwrap(), created);
}
