mod analytics;
mod categories;
mod donations;
mod food_items;
mod nearby;
mod needs;
mod organizations;
mod users;
mod validation;
mod waste_logs;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use foodshare_core::AppConfig;
use foodshare_db::{DbError, Page};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn ok(data: T, request_id: String) -> Json<Self> {
        Json(Self {
            data,
            meta: ResponseMeta::new(request_id),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    pub(super) fn not_found(request_id: &str, what: &str) -> Self {
        Self::new(request_id, "not_found", format!("{what} not found"))
    }

    pub(super) fn forbidden(request_id: &str, message: impl Into<String>) -> Self {
        Self::new(request_id, "forbidden", message)
    }

    pub(super) fn validation(request_id: &str, message: impl Into<String>) -> Self {
        Self::new(request_id, "validation_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn page(limit: Option<i64>, offset: Option<i64>) -> Page {
    Page {
        limit: normalize_limit(limit),
        offset: offset.unwrap_or(0).max(0),
    }
}

pub(super) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    if matches!(error, DbError::NotFound) {
        return ApiError::new(request_id, "not_found", "record not found");
    }
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

/// Map errors from inserts and updates, turning constraint violations into
/// client errors.
pub(super) fn map_write_error(request_id: &str, error: &DbError, conflict_message: &str) -> ApiError {
    if error.is_unique_violation() {
        return ApiError::new(request_id, "conflict", conflict_message);
    }
    if error.is_foreign_key_violation() {
        return ApiError::validation(request_id, "referenced record does not exist");
    }
    if error.sqlstate().as_deref() == Some("23514") {
        return ApiError::validation(request_id, "value violates a check constraint");
    }
    map_db_error(request_id.to_owned(), error)
}

/// Deserialize a PATCH field so that an explicit `null` becomes
/// `Some(None)` while an absent field stays `None` (with `#[serde(default)]`).
#[allow(clippy::option_option)]
pub(super) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/users", get(users::list_users))
        .route(
            "/api/v1/users/profile",
            get(users::get_profile).patch(users::update_profile),
        )
        .route("/api/v1/users/logout", post(users::logout))
        .route("/api/v1/food/categories", get(categories::list_categories))
        .route("/api/v1/food/categories/{id}", get(categories::get_category))
        .route(
            "/api/v1/food/items",
            get(food_items::list_food_items).post(food_items::create_food_item),
        )
        .route(
            "/api/v1/food/items/{id}",
            get(food_items::get_food_item)
                .patch(food_items::update_food_item)
                .delete(food_items::delete_food_item),
        )
        .route(
            "/api/v1/food/waste",
            get(waste_logs::list_waste_logs).post(waste_logs::create_waste_log),
        )
        .route(
            "/api/v1/food/waste/{id}",
            get(waste_logs::get_waste_log)
                .patch(waste_logs::update_waste_log)
                .delete(waste_logs::delete_waste_log),
        )
        .route(
            "/api/v1/donations/organizations",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route(
            "/api/v1/donations/organizations/{id}",
            get(organizations::get_organization)
                .patch(organizations::update_organization)
                .delete(organizations::delete_organization),
        )
        .route(
            "/api/v1/donations/organization-needs",
            get(needs::list_needs).post(needs::create_need),
        )
        .route(
            "/api/v1/donations/organization-needs/{id}",
            get(needs::get_need)
                .patch(needs::update_need)
                .delete(needs::delete_need),
        )
        .route(
            "/api/v1/donations",
            get(donations::list_donations).post(donations::create_donation),
        )
        .route(
            "/api/v1/donations/{id}",
            get(donations::get_donation)
                .patch(donations::update_donation)
                .delete(donations::delete_donation),
        )
        .route(
            "/api/v1/donations/{id}/feedback",
            post(donations::add_feedback),
        )
        .route(
            "/api/v1/organizations/nearby",
            get(nearby::nearby_organizations),
        )
        .route(
            "/api/v1/organizations/analytics/{organization_id}",
            get(analytics::organization_analytics),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match foodshare_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support;
