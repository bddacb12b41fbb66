#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use recipe_backend::config::AppConfig;
use recipe_backend::entities::{ingredients, tags};
use recipe_backend::infrastructure::database;
use recipe_backend::services::storage::LocalStorageService;
use recipe_backend::{AppState, create_app};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// 1x1 transparent PNG.
pub const PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub struct TestApp {
    pub app: Router,
    pub db: DatabaseConnection,
    pub media: TempDir,
}

pub async fn setup() -> TestApp {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    database::run_migrations(&db).await.unwrap();

    let media = TempDir::new().unwrap();
    let config = AppConfig {
        jwt_secret: "test_secret".to_string(),
        media_root: media.path().to_string_lossy().to_string(),
        ..AppConfig::development()
    };
    let storage = Arc::new(LocalStorageService::new(media.path()));

    let state = AppState::new(db.clone(), storage, config);
    TestApp {
        app: create_app(state),
        db,
        media,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// JSON request; returns the status and the parsed body (`Null` when empty).
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.send(request).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Registers a user and logs them in; returns (user id, token).
    pub async fn user(&self, username: &str) -> (i64, String) {
        let email = format!("{}@example.com", username);
        let (status, body) = self
            .call(
                "POST",
                "/api/users/",
                None,
                Some(json!({
                    "email": email,
                    "username": username,
                    "first_name": "Test",
                    "last_name": "User",
                    "password": "Sup3r-secret",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let id = body["id"].as_i64().unwrap();

        let (status, body) = self
            .call(
                "POST",
                "/api/auth/token/login/",
                None,
                Some(json!({ "email": email, "password": "Sup3r-secret" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        (id, body["auth_token"].as_str().unwrap().to_string())
    }

    pub async fn ingredient(&self, name: &str, unit: &str) -> i32 {
        ingredients::ActiveModel {
            name: Set(name.to_string()),
            measurement_unit: Set(unit.to_string()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
        .id
    }

    pub async fn tag(&self, slug: &str) -> i32 {
        tags::ActiveModel {
            name: Set(slug.to_string()),
            color: Set("#E26C2D".to_string()),
            slug: Set(slug.to_string()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
        .id
    }

    /// Creates a recipe through the API and returns its JSON.
    pub async fn recipe(&self, token: &str, name: &str, ingredients: Value, tags: Value) -> Value {
        let (status, body) = self
            .call(
                "POST",
                "/api/recipes/",
                Some(token),
                Some(json!({
                    "ingredients": ingredients,
                    "tags": tags,
                    "image": PNG_DATA_URI,
                    "name": name,
                    "text": "Mix and bake.",
                    "cooking_time": 30,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    /// Filesystem path of a served media URL.
    pub fn media_path(&self, url: &str) -> std::path::PathBuf {
        self.media.path().join(url.trim_start_matches("/media/"))
    }
}
