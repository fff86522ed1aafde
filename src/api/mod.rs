//! Roomcast REST API
//!
//! HTTP API layer for Roomcast, built with Axum.
//!
//! # Endpoints
//!
//! ## Auth
//! - `POST /api/v1/auth/signup` - Create an account
//! - `POST /api/v1/auth/login` - Get a token (also set as the `jwt_token` cookie)
//! - `POST /api/v1/auth/logout` - Clear the cookie
//! - `GET /api/v1/auth/check` - Identity behind the credential
//!
//! ## Rooms
//! - `GET /api/v1/rooms` - List rooms
//! - `POST /api/v1/rooms` - Create a room
//! - `GET /api/v1/rooms/:room/messages` - Room history
//! - `POST /api/v1/rooms/:room/messages` - Post a message
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /api/v1/rooms/:room/ws` - Join a room's live stream
//!
//! # Example
//!
//! ```rust,ignore
//! use roomcast::api::{serve, AppState};
//! use roomcast::auth::JwtAuthority;
//! use roomcast::config::Config;
//! use roomcast::store::SqliteStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let store = Arc::new(SqliteStore::open(&config.store.db_path())?);
//!     let auth = Arc::new(JwtAuthority::new(b"secret", chrono::Duration::hours(24)));
//!
//!     let state = AppState::new(store, auth, config.api.clone(), &config.relay);
//!     serve(state, &config.api).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use crate::config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use extract::AuthUser;
pub use state::AppState;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::relay::{websocket_handler, RoomRegistry};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Auth routes
        .route("/auth/signup", post(routes::auth::signup))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/check", get(routes::auth::check))
        // Room routes
        .route(
            "/rooms",
            get(routes::rooms::list_rooms).post(routes::rooms::create_room),
        )
        .route(
            "/rooms/:room/messages",
            get(routes::messages::get_messages).post(routes::messages::post_message),
        )
        // WebSocket route
        .route("/rooms/:room/ws", get(websocket_handler));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config);

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Start the API server
///
/// On shutdown every live streaming connection is closed.
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let registry = Arc::clone(&state.registry);
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Roomcast API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Roomcast API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal, then close live connections
async fn shutdown_signal(registry: Arc<RoomRegistry>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
    registry.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtAuthority;
    use crate::config::RelayConfig;
    use crate::relay::{ConnectionHandle, Dispatcher, ServerFrame};
    use crate::store::{MessageStore, RoomId, SqliteStore};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tower::util::ServiceExt;

    async fn create_test_app() -> (Router, AppState) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .create_room(RoomId::parse("general").unwrap())
            .await
            .unwrap();
        let auth = Arc::new(JwtAuthority::new(
            b"test-secret",
            chrono::Duration::hours(1),
        ));

        let state = AppState::new(store, auth, ApiConfig::default(), &RelayConfig::default());
        let router = build_router(state.clone());

        (router, state)
    }

    fn bearer(state: &AppState, username: &str) -> String {
        format!("Bearer {}", state.auth.issue(username).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, auth: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(auth) = auth {
            builder = builder.header("Authorization", auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (app, _state) = create_test_app().await;

        let response = app.clone().oneshot(get("/health/live")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(get("/health/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"], "ok");
        assert_eq!(body["connections"], 0);
    }

    #[tokio::test]
    async fn test_signup_login_check() {
        let (app, _state) = create_test_app().await;
        let creds = r#"{"username": "alice", "password": "correct horse"}"#;

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/auth/signup", None, creds))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/auth/signup", None, creds))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/auth/login", None, creds))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("jwt_token="));
        let body = json_body(response).await;
        assert!(body["token"].as_str().is_some());

        let session_cookie = cookie.split(';').next().unwrap().to_string();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/auth/check")
                    .header(header::COOKIE, session_cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["username"], "alice");
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let (app, _state) = create_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/auth/signup",
                None,
                r#"{"username": "bob", "password": "hunter22!"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/auth/login",
                None,
                r#"{"username": "bob", "password": "wrong-password"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(post_json(
                "/api/v1/auth/login",
                None,
                r#"{"username": "nobody", "password": "hunter22!"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let (app, _state) = create_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/auth/signup",
                None,
                r#"{"username": "carol", "password": "short"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json(
                "/api/v1/auth/signup",
                None,
                r#"{"username": "a b", "password": "long enough"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_check_requires_credential() {
        let (app, _state) = create_test_app().await;

        let response = app.clone().oneshot(get("/api/v1/auth/check")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/auth/check")
                    .header("Authorization", "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_and_list_rooms() {
        let (app, state) = create_test_app().await;
        let auth = bearer(&state, "alice");

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/rooms", None, r#"{"name": "random"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/rooms", Some(&auth), r#"{"name": "random"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json_body(response).await["name"], "random");

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/rooms", Some(&auth), r#"{"name": "random"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/rooms", Some(&auth), r#"{"name": "Not Valid!"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(get("/api/v1/rooms")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let rooms = json_body(response).await;
        let names: Vec<&str> = rooms
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"general"));
        assert!(names.contains(&"random"));
    }

    #[tokio::test]
    async fn test_post_message_persists_and_fans_out() {
        let (app, state) = create_test_app().await;
        let auth = bearer(&state, "alice");

        let general = RoomId::parse("general").unwrap();
        let (listener, mut inbox) = ConnectionHandle::new(general.clone(), "bob", 8);
        state.registry.register(&general, listener).await.unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/rooms/general/messages",
                Some(&auth),
                r#"{"body": "hello room"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Message sent successfully");
        assert_eq!(body["data"]["author"], "alice");

        let frame = tokio::time::timeout(std::time::Duration::from_secs(2), inbox.recv())
            .await
            .unwrap()
            .unwrap();
        match frame.as_ref() {
            ServerFrame::Message(message) => {
                assert_eq!(message.body, "hello room");
                assert_eq!(message.author, "alice");
            }
            other => panic!("unexpected frame: {:?}", other),
        }

        let response = app
            .oneshot(get("/api/v1/rooms/general/messages"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["room_name"], "general");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["body"], "hello room");
    }

    #[tokio::test]
    async fn test_post_message_rejections() {
        let (app, state) = create_test_app().await;
        let auth = bearer(&state, "alice");

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/rooms/general/messages",
                None,
                r#"{"body": "hi"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/rooms/general/messages",
                Some(&auth),
                r#"{"body": "   "}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/rooms/missing/messages",
                Some(&auth),
                r#"{"body": "hi"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/rooms/general/messages",
                Some(&auth),
                "not json",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(get("/api/v1/rooms/missing/messages"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_to_empty_room_succeeds() {
        let (app, state) = create_test_app().await;
        let auth = bearer(&state, "alice");

        let response = app
            .oneshot(post_json(
                "/api/v1/rooms/general/messages",
                Some(&auth),
                r#"{"content": "anyone here?"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.registry.connection_count().await, 0);

        let stored = state
            .store
            .list_by_room(&RoomId::parse("general").unwrap())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].body, "anyone here?");
        assert_eq!(stored[0].author, "alice");
    }

    #[tokio::test]
    async fn test_post_with_stopped_dispatcher_is_unavailable() {
        let (_app, mut state) = create_test_app().await;
        let auth = bearer(&state, "alice");

        let (stopped, task) = Dispatcher::spawn(Arc::clone(&state.registry), 1);
        task.abort();
        let _ = task.await;
        assert!(stopped.is_closed());
        state.dispatcher = stopped;
        let app = build_router(state.clone());

        let response = app
            .oneshot(post_json(
                "/api/v1/rooms/general/messages",
                Some(&auth),
                r#"{"body": "lost?"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let stored = state
            .store
            .list_by_room(&RoomId::parse("general").unwrap())
            .await
            .unwrap();
        assert!(stored.is_empty());
    }
}
