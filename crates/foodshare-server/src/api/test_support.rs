//! Shared fixtures for router tests.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
    Router,
};
use foodshare_core::{AppConfig, Environment, UserType};
use foodshare_db::NewUser;
use sqlx::{postgres::PgPoolOptions, PgPool};

use super::{build_app, AppState};
use crate::middleware::{AuthState, RateLimitState};

pub(crate) const TEST_SALT: &str = "router-test-salt";

pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://foodshare@127.0.0.1:1/foodshare".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        log_level: "info".to_string(),
        categories_path: PathBuf::from("./config/food_categories.yaml"),
        token_hash_salt: TEST_SALT.to_string(),
        db_max_connections: 2,
        db_min_connections: 0,
        db_acquire_timeout_secs: 1,
        rate_limit_max_requests: 1_000,
        rate_limit_window_secs: 60,
        nearby_default_radius_km: 10.0,
    }
}

/// State over a pool that never connects; only usable for routes that fail
/// before touching the database.
pub(crate) fn lazy_state() -> AppState {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy(&config.database_url)
        .expect("lazy pool");
    AppState {
        pool,
        config: Arc::new(config),
    }
}

pub(crate) fn app_with_pool(pool: PgPool) -> Router {
    let config = Arc::new(test_config());
    let auth = AuthState::new(pool.clone(), TEST_SALT);
    let rate_limit = RateLimitState::from_app_config(&config);
    build_app(AppState { pool, config }, auth, rate_limit)
}

pub(crate) async fn read_json(response: Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&body).expect("json parse")
}

/// Insert a user and issue a bearer token for them.
pub(crate) async fn seed_user(
    pool: &PgPool,
    name: &str,
    user_type: UserType,
    is_staff: bool,
) -> (i64, String) {
    let email = format!("{name}@example.com");
    let user = foodshare_db::create_user(
        pool,
        &NewUser {
            email: &email,
            username: name,
            first_name: "",
            last_name: "",
            user_type: user_type.as_str(),
            is_staff,
        },
    )
    .await
    .unwrap_or_else(|e| panic!("create_user failed for '{name}': {e}"));

    let token = foodshare_db::issue_token(pool, TEST_SALT, user.id, None)
        .await
        .expect("issue_token");
    (user.id, token.token)
}

pub(crate) fn request(
    method: &str,
    uri: &str,
    token: &str,
    body: Option<&serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"));
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}
