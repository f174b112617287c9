use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use foodshare_db::{NeedUpdate, NewNeed, OrganizationNeedRow};
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::{double_option, map_db_error, map_write_error, page, ApiError, ApiResponse, AppState};

const DUPLICATE_NEED: &str = "this organization already lists a need for that category";

#[derive(Debug, Serialize)]
pub(super) struct NeedItem {
    id: i64,
    organization: i64,
    organization_name: String,
    food_category: i64,
    food_category_name: String,
    priority: i32,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrganizationNeedRow> for NeedItem {
    fn from(row: OrganizationNeedRow) -> Self {
        Self {
            id: row.id,
            organization: row.organization_id,
            organization_name: row.organization_name,
            food_category: row.food_category_id,
            food_category_name: row.food_category_name,
            priority: row.priority,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct NeedQuery {
    pub organization: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateNeedRequest {
    pub organization: i64,
    pub food_category: i64,
    #[serde(default)]
    pub priority: i32,
    pub notes: Option<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateNeedRequest {
    pub food_category: Option<i64>,
    pub priority: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

fn validate_priority(req_id: &str, priority: i32) -> Result<i32, ApiError> {
    if priority < 0 {
        return Err(ApiError::validation(
            req_id,
            format!("'priority' must not be negative, got {priority}"),
        ));
    }
    Ok(priority)
}

fn ensure_owner(req_id: &str, user: &CurrentUser, owner_id: i64) -> Result<(), ApiError> {
    if user.is_staff || user.id == owner_id {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            req_id,
            "only the organization owner or staff may manage its needs",
        ))
    }
}

async fn fetch_visible(
    state: &AppState,
    req_id: &str,
    user: &CurrentUser,
    id: i64,
) -> Result<OrganizationNeedRow, ApiError> {
    foodshare_db::get_need(&state.pool, &user.viewer(), id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::not_found(req_id, "organization need"))
}

/// GET /api/v1/donations/organization-needs
pub(super) async fn list_needs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<NeedQuery>,
) -> Result<Json<ApiResponse<Vec<NeedItem>>>, ApiError> {
    let rows = foodshare_db::list_needs(
        &state.pool,
        &user.viewer(),
        query.organization,
        page(query.limit, query.offset),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(
        rows.into_iter().map(NeedItem::from).collect(),
        req_id.0,
    ))
}

/// POST /api/v1/donations/organization-needs
pub(super) async fn create_need(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateNeedRequest>,
) -> Result<(StatusCode, Json<ApiResponse<NeedItem>>), ApiError> {
    let rid = &req_id.0;
    let priority = validate_priority(rid, body.priority)?;

    let organization = foodshare_db::get_organization_unscoped(&state.pool, body.organization)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "organization"))?;
    ensure_owner(rid, &user, organization.user_id)?;

    let id = foodshare_db::create_need(
        &state.pool,
        &NewNeed {
            organization_id: organization.id,
            food_category_id: body.food_category,
            priority,
            notes: body.notes.as_deref(),
        },
    )
    .await
    .map_err(|e| map_write_error(rid, &e, DUPLICATE_NEED))?;

    let row = fetch_visible(&state, rid, &user, id).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(NeedItem::from(row), req_id.0)))
}

/// GET /api/v1/donations/organization-needs/{id}
pub(super) async fn get_need(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<NeedItem>>, ApiError> {
    let row = fetch_visible(&state, &req_id.0, &user, id).await?;
    Ok(ApiResponse::ok(NeedItem::from(row), req_id.0))
}

/// PATCH /api/v1/donations/organization-needs/{id}
pub(super) async fn update_need(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateNeedRequest>,
) -> Result<Json<ApiResponse<NeedItem>>, ApiError> {
    let rid = &req_id.0;
    let current = fetch_visible(&state, rid, &user, id).await?;
    ensure_owner(rid, &user, current.owner_id)?;
    let priority = body
        .priority
        .map(|p| validate_priority(rid, p))
        .transpose()?;

    foodshare_db::update_need(
        &state.pool,
        id,
        &NeedUpdate {
            food_category_id: body.food_category,
            priority,
            notes: body.notes.as_ref().map(Option::as_deref),
        },
    )
    .await
    .map_err(|e| map_write_error(rid, &e, DUPLICATE_NEED))?;

    let row = fetch_visible(&state, rid, &user, id).await?;
    Ok(ApiResponse::ok(NeedItem::from(row), req_id.0))
}

/// DELETE /api/v1/donations/organization-needs/{id}
pub(super) async fn delete_need(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let current = fetch_visible(&state, &req_id.0, &user, id).await?;
    ensure_owner(&req_id.0, &user, current.owner_id)?;

    foodshare_db::delete_need(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodshare_core::UserType;

    #[test]
    fn negative_priority_is_rejected() {
        assert_eq!(validate_priority("r", 3).ok(), Some(3));
        assert!(validate_priority("r", -1).is_err());
    }

    #[test]
    fn owner_or_staff_may_manage_needs() {
        let owner = CurrentUser {
            token_id: 1,
            id: 7,
            email: "pantry@example.org".to_string(),
            user_type: UserType::Organization,
            is_staff: false,
        };
        assert!(ensure_owner("r", &owner, 7).is_ok());
        assert_eq!(ensure_owner("r", &owner, 8).unwrap_err().error.code, "forbidden");

        let staff = CurrentUser {
            is_staff: true,
            ..owner
        };
        assert!(ensure_owner("r", &staff, 8).is_ok());
    }

    #[test]
    fn create_request_defaults_priority() {
        let body: CreateNeedRequest =
            serde_json::from_str(r#"{"organization": 1, "food_category": 2}"#).unwrap();
        assert_eq!(body.priority, 0);
        assert!(body.notes.is_none());
    }
}
