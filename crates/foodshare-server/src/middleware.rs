use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use foodshare_core::{AppConfig, UserType};
use foodshare_db::{AuthenticatedUser, Viewer};
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The user behind the request's bearer token, stored as a request extension
/// by [`require_bearer_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub token_id: i64,
    pub id: i64,
    pub email: String,
    pub user_type: UserType,
    pub is_staff: bool,
}

impl CurrentUser {
    #[must_use]
    pub fn viewer(&self) -> Viewer {
        Viewer {
            user_id: self.id,
            user_type: self.user_type,
            is_staff: self.is_staff,
        }
    }
}

impl From<AuthenticatedUser> for CurrentUser {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            token_id: user.token_id,
            id: user.user_id,
            email: user.email,
            user_type: user.user_type,
            is_staff: user.is_staff,
        }
    }
}

/// Bearer token auth settings used by middleware.
#[derive(Debug, Clone)]
pub struct AuthState {
    pool: PgPool,
    salt: Arc<str>,
}

impl AuthState {
    #[must_use]
    pub fn new(pool: PgPool, salt: &str) -> Self {
        Self {
            pool,
            salt: Arc::from(salt),
        }
    }
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter shared by every protected route.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(
            config.rate_limit_max_requests,
            Duration::from_secs(config.rate_limit_window_secs),
        )
    }
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware resolving the bearer token to a [`CurrentUser`].
///
/// Missing, malformed, revoked, or unknown tokens get a 401.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let rid = request_id_of(&req);
    let Some(token) = extract_bearer_token(req.headers().get(AUTHORIZATION)) else {
        return ApiError::new(rid, "unauthorized", "missing or invalid bearer token").into_response();
    };

    match foodshare_db::verify_token(&auth.pool, &auth.salt, token).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(CurrentUser::from(user));
            next.run(req).await
        }
        Ok(None) => {
            tracing::warn!(request_id = %rid, "rejected bearer token");
            ApiError::new(rid, "unauthorized", "missing or invalid bearer token").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "bearer token lookup failed");
            ApiError::new(rid, "internal_error", "authentication failed").into_response()
        }
    }
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        drop(window);
        return ApiError::new(request_id_of(&req), "rate_limited", "rate limit exceeded")
            .into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer fs_1_secret");
        assert_eq!(extract_bearer_token(Some(&header)), Some("fs_1_secret"));
    }

    #[test]
    fn extract_bearer_token_rejects_non_bearer_header() {
        let header = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer_token(Some(&header)), None);
        let blank = HeaderValue::from_static("Bearer   ");
        assert_eq!(extract_bearer_token(Some(&blank)), None);
        assert_eq!(extract_bearer_token(None), None);
    }

    #[test]
    fn current_user_maps_to_viewer() {
        let user = CurrentUser::from(AuthenticatedUser {
            token_id: 3,
            user_id: 9,
            email: "org@example.com".to_string(),
            user_type: UserType::Organization,
            is_staff: false,
        });
        assert_eq!(
            user.viewer(),
            Viewer {
                user_id: 9,
                user_type: UserType::Organization,
                is_staff: false,
            }
        );
        assert_eq!(user.token_id, 3);
    }
}
