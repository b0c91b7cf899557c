use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::PgConnection;
use metrics_exporter_prometheus::PrometheusHandle;
use socketioxide::extract::{SocketRef, TryData};
use socketioxide::layer::SocketIoLayer;
use socketioxide::SocketIo;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use happy_shared::clients::db::DbPool;
use happy_shared::errors::AppResult;
use happy_shared::middleware::{metrics_middleware, JwtSecret, JwtSecretSource};

pub mod config;
pub mod geo;
pub mod hours;
pub mod models;
pub mod policy;
pub mod repositories;
pub mod routes;
pub mod schema;
pub mod services;
pub mod socket;

use crate::config::AppConfig;
use crate::socket::ConnectionRegistry;

const SCHEMA_SQL: &str = include_str!("../migrations/2024-06-01-000000_create_tables/up.sql");

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub jwt_secret: JwtSecret,
    pub io: SocketIo,
    pub connections: ConnectionRegistry,
    pub metrics: PrometheusHandle,
}

impl AppState {
    pub fn new(db: DbPool, config: AppConfig, io: SocketIo, metrics: PrometheusHandle) -> Self {
        let jwt_secret = JwtSecret::new(&config.jwt_secret);
        Self {
            db,
            config,
            jwt_secret,
            io,
            connections: ConnectionRegistry::new(),
            metrics,
        }
    }
}

impl JwtSecretSource for AppState {
    fn jwt_secret(&self) -> &JwtSecret {
        &self.jwt_secret
    }
}

/// Applies the bundled schema. Every statement is `IF NOT EXISTS`, so running
/// it against an initialized database is a no-op.
pub fn run_migrations(conn: &mut PgConnection) -> AppResult<()> {
    conn.batch_execute(SCHEMA_SQL)?;
    tracing::info!("database schema applied");
    Ok(())
}

/// Registers the live-push namespace on the socket.io instance held in state.
pub fn register_socket_handlers(state: &Arc<AppState>) {
    state.io.ns("/", {
        let state = state.clone();
        move |socket: SocketRef, TryData(auth): TryData<serde_json::Value>| {
            let state = state.clone();
            async move {
                crate::socket::handlers::on_connect(socket, auth.ok(), state).await;
            }
        }
    });
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Auth
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/profile", put(routes::auth::update_profile))
        .route("/auth/change-password", put(routes::auth::change_password))
        // Restaurants
        .route(
            "/restaurants",
            get(routes::restaurants::list_restaurants).post(routes::restaurants::create_restaurant),
        )
        .route(
            "/restaurants/:id",
            get(routes::restaurants::get_restaurant)
                .put(routes::restaurants::update_restaurant)
                .delete(routes::restaurants::delete_restaurant),
        )
        .route("/restaurants/:id/menu", get(routes::restaurants::restaurant_menu))
        // Reviews
        .route(
            "/reviews",
            get(routes::reviews::list_reviews).post(routes::reviews::create_review),
        )
        .route(
            "/reviews/:id",
            get(routes::reviews::get_review)
                .put(routes::reviews::update_review)
                .delete(routes::reviews::delete_review),
        )
        .route("/reviews/:id/like", post(routes::reviews::like_review))
        .route("/reviews/:id/unlike", delete(routes::reviews::unlike_review))
        // Favorites
        .route(
            "/favorites",
            get(routes::favorites::list_favorites).post(routes::favorites::add_favorite),
        )
        .route("/favorites/:restaurant_id", delete(routes::favorites::remove_favorite))
        .route("/favorites/check/:restaurant_id", get(routes::favorites::check_favorite))
        // Notifications
        .route("/notifications", get(routes::notifications::list_notifications))
        .route("/notifications/unread-count", get(routes::notifications::unread_count))
        .route("/notifications/read-all", put(routes::notifications::mark_all_read))
        .route("/notifications/:id/read", put(routes::notifications::mark_read))
        // Admin
        .route("/admin/users", get(routes::admin::list_users))
        .route(
            "/admin/users/:id",
            get(routes::admin::get_user).delete(routes::admin::delete_user),
        )
        .route("/admin/users/:id/block", put(routes::admin::block_user))
        .route("/admin/users/:id/unblock", put(routes::admin::unblock_user))
        .route("/admin/users/:id/role", put(routes::admin::change_role))
        .route("/admin/stats", get(routes::admin::dashboard_stats))
        .route("/admin/stats/users", get(routes::admin::user_stats))
        .route("/admin/reviews", get(routes::admin::list_reviews))
        .route("/admin/reviews/:id", delete(routes::admin::delete_review))
        .route("/admin/reviews/:id/status", put(routes::admin::change_review_status))
        .route(
            "/admin/menu-items",
            get(routes::menu::list_menu_items).post(routes::menu::create_menu_item),
        )
        .route(
            "/admin/menu-items/:id",
            get(routes::menu::get_menu_item)
                .put(routes::menu::update_menu_item)
                .delete(routes::menu::delete_menu_item),
        )
}

pub fn build_router(state: Arc<AppState>, sio_layer: SocketIoLayer) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .nest("/api", api_routes())
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(sio_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    use happy_shared::clients::db::{create_lazy_pool, PoolSettings};
    use happy_shared::middleware::detached_metrics_handle;
    use happy_shared::types::auth::{Claims, UserRole};

    use super::*;

    fn test_config() -> AppConfig {
        let source = ::config::Config::builder()
            .set_override("jwt_secret", "router-test-secret")
            .and_then(|b| b.build())
            .unwrap();
        AppConfig::from_source(source).unwrap()
    }

    fn app() -> (Router, Arc<AppState>) {
        let settings = PoolSettings {
            max_connections: 1,
            acquire_timeout: Duration::from_millis(200),
            idle_timeout: Duration::from_secs(1),
        };
        // Nothing listens on port 1, so any query fails after the acquire timeout.
        let db = create_lazy_pool("postgres://nobody@127.0.0.1:1/none", settings);
        let (sio_layer, io) = SocketIo::builder().build_layer();
        let state = Arc::new(AppState::new(db, test_config(), io, detached_metrics_handle()));
        register_socket_handlers(&state);
        (build_router(state.clone(), sio_layer), state)
    }

    fn bearer(state: &AppState, role: UserRole) -> String {
        let claims = Claims::new(Uuid::now_v7(), "admin@example.com", role, 3600);
        format!("Bearer {}", state.jwt_secret.sign(&claims).unwrap())
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    fn json_request(method: Method, uri: &str, auth: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn me_requires_token() {
        let (app, _) = app();
        let request = Request::get("/api/auth/me").body(Body::empty()).unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "E0004");
    }

    #[tokio::test]
    async fn admin_routes_reject_plain_users() {
        let (app, state) = app();
        let request = Request::get("/api/admin/stats")
            .header(header::AUTHORIZATION, bearer(&state, UserRole::User))
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "E0005");
    }

    #[tokio::test]
    async fn admin_cannot_block_self() {
        let (app, state) = app();
        let admin_id = Uuid::now_v7();
        let claims = Claims::new(admin_id, "admin@example.com", UserRole::Admin, 3600);
        let token = state.jwt_secret.sign(&claims).unwrap();

        let request = Request::put(format!("/api/admin/users/{admin_id}/block"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "E2003");
    }

    #[tokio::test]
    async fn register_validates_before_touching_the_database() {
        let (app, _) = app();
        let request = json_request(
            Method::POST,
            "/api/auth/register",
            None,
            serde_json::json!({ "email": "not-an-email", "password": "password123", "name": "Alice" }),
        );
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "E0002");

        let (app, _) = self::app();
        let request = json_request(
            Method::POST,
            "/api/auth/register",
            None,
            serde_json::json!({ "email": "alice@example.com", "password": "short", "name": "Alice" }),
        );
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "E1008");
    }

    #[tokio::test]
    async fn review_rating_out_of_range() {
        let (app, state) = app();
        let auth = bearer(&state, UserRole::User);
        let request = json_request(
            Method::POST,
            "/api/reviews",
            Some(&auth),
            serde_json::json!({ "restaurant_id": Uuid::now_v7(), "rating": 7 }),
        );

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "E0002");
    }

    #[tokio::test]
    async fn restaurant_filters_are_validated() {
        let (app, _) = app();
        let request = Request::get("/api/restaurants?open_during=midnight")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["field"], "open_during");
    }

    #[tokio::test]
    async fn missing_body_field_uses_error_envelope() {
        let (app, _) = app();
        let request = json_request(
            Method::POST,
            "/api/auth/register",
            None,
            serde_json::json!({ "email": "alice@example.com", "name": "Alice" }),
        );

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "E0002");
        assert!(body["error"]["details"]["reason"]
            .as_str()
            .is_some_and(|reason| reason.contains("password")));
    }

    #[tokio::test]
    async fn malformed_path_id_uses_error_envelope() {
        let (app, _) = app();
        let request = Request::get("/api/reviews/not-a-uuid").body(Body::empty()).unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "E0002");
    }

    #[tokio::test]
    async fn malformed_query_uses_error_envelope() {
        let (app, _) = app();
        let request = Request::get("/api/restaurants?page=abc").body(Body::empty()).unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "E0002");
        assert!(body["error"]["details"]["reason"].is_string());
    }

    #[tokio::test]
    async fn health_reports_unreachable_database() {
        let (app, _) = app();
        let request = Request::get("/health").body(Body::empty()).unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["service"], "happy-api");
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_text() {
        let (app, _) = app();
        let request = Request::get("/metrics").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let (app, _) = app();
        let request = Request::get("/api/nowhere").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
