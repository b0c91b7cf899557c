#![allow(dead_code)]

use std::sync::{Arc, Once};

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use socketioxide::SocketIo;
use tower::ServiceExt;
use uuid::Uuid;

use happy_api::config::AppConfig;
use happy_api::repositories::user_repo;
use happy_api::{build_router, register_socket_handlers, run_migrations, AppState};
use happy_shared::clients::db::{create_pool, get_conn, PoolSettings};
use happy_shared::middleware::detached_metrics_handle;
use happy_shared::types::auth::UserRole;

pub const DATABASE_URL_VAR: &str = "HAPPY_LUNCH_TEST_DATABASE_URL";

static SCHEMA: Once = Once::new();

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

/// `None` when no test database is configured; callers skip.
pub fn spawn() -> Option<TestApp> {
    let url = std::env::var(DATABASE_URL_VAR).ok()?;

    let source = config::Config::builder()
        .set_override("database_url", url.clone())
        .and_then(|b| b.set_override("jwt_secret", "scenario-secret"))
        .and_then(|b| b.build())
        .expect("test config");
    let config = AppConfig::from_source(source).expect("valid test config");

    let settings = PoolSettings {
        max_connections: 4,
        ..PoolSettings::default()
    };
    let db = create_pool(&url, settings).expect("test database reachable");
    // Concurrent `CREATE TABLE IF NOT EXISTS` can still collide, so tests in one binary apply it once
    SCHEMA.call_once(|| {
        run_migrations(&mut get_conn(&db).expect("connection")).expect("schema applied");
    });

    let (sio_layer, io) = SocketIo::builder().build_layer();
    let state = Arc::new(AppState::new(db, config, io, detached_metrics_handle()));
    register_socket_handlers(&state);

    Some(TestApp {
        router: build_router(state.clone(), sio_layer),
        state,
    })
}

/// Unique per call so scenarios can share one database.
pub fn unique_email(name: &str) -> String {
    format!("{name}+{}@example.com", Uuid::now_v7().simple())
}

impl TestApp {
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Registers an account and returns `(user id, token)`.
    pub async fn register(&self, email: &str, name: &str) -> (Uuid, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/register",
                None,
                Some(serde_json::json!({ "email": email, "password": "password123", "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");

        let id = body["data"]["user"]["id"].as_str().unwrap().parse().unwrap();
        let token = body["data"]["token"].as_str().unwrap().to_string();
        (id, token)
    }

    /// Registers an account, promotes it and signs in again so the token
    /// carries the admin role.
    pub async fn admin(&self) -> (Uuid, String) {
        let email = unique_email("admin");
        let (id, _) = self.register(&email, "Admin").await;

        let mut conn = get_conn(&self.state.db).unwrap();
        user_repo::set_role(&mut conn, id, UserRole::Admin).unwrap();

        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        (id, body["data"]["token"].as_str().unwrap().to_string())
    }

    pub async fn create_restaurant(&self, admin_token: &str, name: &str) -> Uuid {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/restaurants",
                Some(admin_token),
                Some(serde_json::json!({ "name": name, "address": "123 Main St" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create restaurant failed: {body}");
        body["data"]["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn create_review(&self, token: &str, restaurant_id: Uuid, rating: i32) -> Uuid {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/reviews",
                Some(token),
                Some(serde_json::json!({
                    "restaurant_id": restaurant_id,
                    "rating": rating,
                    "comment": "Great"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create review failed: {body}");
        body["data"]["id"].as_str().unwrap().parse().unwrap()
    }
}
