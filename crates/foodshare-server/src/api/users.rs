use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use foodshare_db::{ProfileUpdate, UserRow};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::{CurrentUser, RequestId};

use super::{
    double_option, map_db_error, map_write_error, page, validation, ApiError, ApiResponse,
    AppState,
};

#[derive(Debug, Serialize)]
pub(super) struct UserItem {
    id: i64,
    public_id: Uuid,
    email: String,
    username: String,
    first_name: String,
    last_name: String,
    user_type: String,
    is_staff: bool,
    phone_number: Option<String>,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
    latitude: Option<Decimal>,
    longitude: Option<Decimal>,
    profile_image: Option<String>,
    bio: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserItem {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            public_id: row.public_id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            user_type: row.user_type,
            is_staff: row.is_staff,
            phone_number: row.phone_number,
            address: row.address,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
            latitude: row.latitude,
            longitude: row.longitude,
            profile_image: row.profile_image,
            bio: row.bio,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct UserListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateProfileRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub state: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub zip_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub latitude: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub longitude: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub profile_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub(super) struct LogoutResponse {
    logged_out: bool,
}

/// GET /api/v1/users (staff only)
pub(super) async fn list_users(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<ApiResponse<Vec<UserItem>>>, ApiError> {
    if !user.is_staff {
        return Err(ApiError::forbidden(&req_id.0, "only staff may list users"));
    }

    let rows = foodshare_db::list_users(&state.pool, page(query.limit, query.offset))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(
        rows.into_iter().map(UserItem::from).collect(),
        req_id.0,
    ))
}

/// GET /api/v1/users/profile
pub(super) async fn get_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserItem>>, ApiError> {
    let row = foodshare_db::get_user_by_id(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(&req_id.0, "user"))?;

    Ok(ApiResponse::ok(UserItem::from(row), req_id.0))
}

/// PATCH /api/v1/users/profile
pub(super) async fn update_profile(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserItem>>, ApiError> {
    let rid = &req_id.0;

    if let Some(ref email) = body.email {
        validation::validate_email(rid, "email", email)?;
    }
    if let Some(Some(ref url)) = body.profile_image {
        validation::parse_url_or_validation_error(rid, url, |v| {
            format!("'profile_image' must be a valid URL, got '{v}'")
        })?;
    }
    if body.latitude.flatten().is_some_and(|v| v.abs() > Decimal::from(90))
        || body.longitude.flatten().is_some_and(|v| v.abs() > Decimal::from(180))
    {
        return Err(ApiError::validation(
            rid,
            "latitude must be within [-90, 90] and longitude within [-180, 180]",
        ));
    }

    let update = ProfileUpdate {
        email: body.email.as_deref().map(str::trim),
        first_name: body.first_name.as_deref(),
        last_name: body.last_name.as_deref(),
        phone_number: body.phone_number.as_ref().map(Option::as_deref),
        address: body.address.as_ref().map(Option::as_deref),
        city: body.city.as_ref().map(Option::as_deref),
        state: body.state.as_ref().map(Option::as_deref),
        zip_code: body.zip_code.as_ref().map(Option::as_deref),
        latitude: body.latitude,
        longitude: body.longitude,
        profile_image: body.profile_image.as_ref().map(Option::as_deref),
        bio: body.bio.as_ref().map(Option::as_deref),
    };

    let row = foodshare_db::update_profile(&state.pool, user.id, &update)
        .await
        .map_err(|e| map_write_error(rid, &e, "a user with that email already exists"))?;

    tracing::info!(user_id = user.id, "profile updated");
    Ok(ApiResponse::ok(UserItem::from(row), req_id.0))
}

/// POST /api/v1/users/logout
///
/// Revokes the presented token.
pub(super) async fn logout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<LogoutResponse>>, ApiError> {
    let revoked = foodshare_db::revoke_token(&state.pool, user.token_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(user_id = user.id, token_id = user.token_id, "token revoked on logout");
    Ok(ApiResponse::ok(LogoutResponse { logged_out: revoked }, req_id.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_profile_request_distinguishes_cleared_fields() {
        let body: UpdateProfileRequest =
            serde_json::from_str(r#"{"bio": null, "city": "Boston", "latitude": "40.7128"}"#)
                .unwrap();
        assert_eq!(body.bio, Some(None));
        assert_eq!(body.city, Some(Some("Boston".to_string())));
        assert_eq!(body.latitude, Some(Some(Decimal::new(407_128, 4))));
        assert!(body.phone_number.is_none());
        assert!(body.email.is_none());
    }
}
