use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use foodshare_db::{NewOrganization, OrganizationFilters, OrganizationRow, OrganizationUpdate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    double_option, map_db_error, map_write_error, needs::NeedItem, page, validation, ApiError,
    ApiResponse, AppState,
};

const ONE_PER_USER: &str = "you already have an organization";

#[derive(Debug, Serialize)]
pub(super) struct OrganizationItem {
    id: i64,
    name: String,
    description: Option<String>,
    user: i64,
    user_email: String,
    address: String,
    city: String,
    state: String,
    zip_code: String,
    latitude: Option<Decimal>,
    longitude: Option<Decimal>,
    phone_number: String,
    email: String,
    website: Option<String>,
    hours_of_operation: Option<String>,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    needs: Vec<NeedItem>,
}

impl OrganizationItem {
    fn new(row: OrganizationRow, needs: Vec<NeedItem>) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            user: row.user_id,
            user_email: row.user_email,
            address: row.address,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
            latitude: row.latitude,
            longitude: row.longitude,
            phone_number: row.phone_number,
            email: row.email,
            website: row.website,
            hours_of_operation: row.hours_of_operation,
            is_verified: row.is_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
            needs,
        }
    }
}

/// Attach each organization's needs, preserving the input order.
pub(super) async fn with_needs(
    state: &AppState,
    req_id: &str,
    rows: Vec<OrganizationRow>,
) -> Result<Vec<OrganizationItem>, ApiError> {
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let needs = foodshare_db::list_needs_for_organizations(&state.pool, &ids)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;

    let mut by_org: HashMap<i64, Vec<NeedItem>> = HashMap::new();
    for need in needs {
        by_org
            .entry(need.organization_id)
            .or_default()
            .push(NeedItem::from(need));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let needs = by_org.remove(&row.id).unwrap_or_default();
            OrganizationItem::new(row, needs)
        })
        .collect())
}

#[derive(Debug, Deserialize)]
pub(super) struct OrganizationQuery {
    pub city: Option<String>,
    pub state: Option<String>,
    pub is_verified: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateOrganizationRequest {
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub phone_number: String,
    pub email: String,
    pub website: Option<String>,
    pub hours_of_operation: Option<String>,
    pub is_verified: Option<bool>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateOrganizationRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub latitude: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "double_option")]
    pub longitude: Option<Option<Decimal>>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub website: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub hours_of_operation: Option<Option<String>>,
    pub is_verified: Option<bool>,
}

fn ensure_may_verify(
    req_id: &str,
    user: &CurrentUser,
    is_verified: Option<bool>,
) -> Result<(), ApiError> {
    if is_verified.is_some() && !user.is_staff {
        return Err(ApiError::forbidden(
            req_id,
            "only staff may change verification status",
        ));
    }
    Ok(())
}

fn optional_text<'a>(
    req_id: &str,
    field: &str,
    value: Option<&'a str>,
    max_len: usize,
) -> Result<Option<&'a str>, ApiError> {
    value
        .map(|v| validation::required_text(req_id, field, v, max_len))
        .transpose()
}

/// Load an organization the caller can see and may modify.
async fn fetch_writable(
    state: &AppState,
    req_id: &str,
    user: &CurrentUser,
    id: i64,
) -> Result<OrganizationRow, ApiError> {
    let row = foodshare_db::get_organization(&state.pool, &user.viewer(), id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::not_found(req_id, "organization"))?;

    if !user.is_staff && row.user_id != user.id {
        return Err(ApiError::forbidden(
            req_id,
            "only the organization owner or staff may modify it",
        ));
    }
    Ok(row)
}

async fn fetch_item(
    state: &AppState,
    req_id: &str,
    user: &CurrentUser,
    id: i64,
) -> Result<OrganizationItem, ApiError> {
    let row = foodshare_db::get_organization(&state.pool, &user.viewer(), id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::not_found(req_id, "organization"))?;

    with_needs(state, req_id, vec![row])
        .await?
        .pop()
        .ok_or_else(|| ApiError::not_found(req_id, "organization"))
}

/// GET /api/v1/donations/organizations
pub(super) async fn list_organizations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<OrganizationQuery>,
) -> Result<Json<ApiResponse<Vec<OrganizationItem>>>, ApiError> {
    let rows = foodshare_db::list_organizations(
        &state.pool,
        &user.viewer(),
        &OrganizationFilters {
            city: query.city.as_deref(),
            state: query.state.as_deref(),
            is_verified: query.is_verified,
            search: query.search.as_deref(),
            ordering: query.ordering.as_deref(),
            page: page(query.limit, query.offset),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = with_needs(&state, &req_id.0, rows).await?;
    Ok(ApiResponse::ok(data, req_id.0))
}

/// POST /api/v1/donations/organizations
///
/// The caller becomes the owner.
pub(super) async fn create_organization(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrganizationItem>>), ApiError> {
    let rid = &req_id.0;
    ensure_may_verify(rid, &user, body.is_verified)?;

    let name = validation::required_text(rid, "name", &body.name, 200)?;
    let address = validation::required_text(rid, "address", &body.address, 255)?;
    let city = validation::required_text(rid, "city", &body.city, 100)?;
    let region = validation::required_text(rid, "state", &body.state, 100)?;
    let zip_code = validation::required_text(rid, "zip_code", &body.zip_code, 20)?;
    let phone_number = validation::required_text(rid, "phone_number", &body.phone_number, 20)?;
    validation::validate_email(rid, "email", &body.email)?;
    if let Some(ref website) = body.website {
        validation::validate_website(rid, website)?;
    }
    validation::validate_coordinates(rid, body.latitude, body.longitude)?;

    let id = foodshare_db::create_organization(
        &state.pool,
        user.id,
        &NewOrganization {
            name,
            description: body.description.as_deref(),
            address,
            city,
            state: region,
            zip_code,
            latitude: body.latitude,
            longitude: body.longitude,
            phone_number,
            email: body.email.trim(),
            website: body.website.as_deref(),
            hours_of_operation: body.hours_of_operation.as_deref(),
            is_verified: body.is_verified.unwrap_or(false),
        },
    )
    .await
    .map_err(|e| map_write_error(rid, &e, ONE_PER_USER))?;

    let item = fetch_item(&state, rid, &user, id).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(item, req_id.0)))
}

/// GET /api/v1/donations/organizations/{id}
pub(super) async fn get_organization(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<OrganizationItem>>, ApiError> {
    let item = fetch_item(&state, &req_id.0, &user, id).await?;
    Ok(ApiResponse::ok(item, req_id.0))
}

/// PATCH /api/v1/donations/organizations/{id}
pub(super) async fn update_organization(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateOrganizationRequest>,
) -> Result<Json<ApiResponse<OrganizationItem>>, ApiError> {
    let rid = &req_id.0;
    let current = fetch_writable(&state, rid, &user, id).await?;
    ensure_may_verify(rid, &user, body.is_verified)?;

    if let Some(ref email) = body.email {
        validation::validate_email(rid, "email", email)?;
    }
    if let Some(Some(ref website)) = body.website {
        validation::validate_website(rid, website)?;
    }
    let latitude = body.latitude.unwrap_or(current.latitude);
    let longitude = body.longitude.unwrap_or(current.longitude);
    validation::validate_coordinates(rid, latitude, longitude)?;

    let name = optional_text(rid, "name", body.name.as_deref(), 200)?;
    let address = optional_text(rid, "address", body.address.as_deref(), 255)?;
    let city = optional_text(rid, "city", body.city.as_deref(), 100)?;
    let region = optional_text(rid, "state", body.state.as_deref(), 100)?;
    let zip_code = optional_text(rid, "zip_code", body.zip_code.as_deref(), 20)?;
    let phone_number = optional_text(rid, "phone_number", body.phone_number.as_deref(), 20)?;

    foodshare_db::update_organization(
        &state.pool,
        id,
        &OrganizationUpdate {
            name,
            description: body.description.as_ref().map(Option::as_deref),
            address,
            city,
            state: region,
            zip_code,
            latitude: body.latitude,
            longitude: body.longitude,
            phone_number,
            email: body.email.as_deref().map(str::trim),
            website: body.website.as_ref().map(Option::as_deref),
            hours_of_operation: body.hours_of_operation.as_ref().map(Option::as_deref),
            is_verified: body.is_verified,
        },
    )
    .await
    .map_err(|e| map_write_error(rid, &e, ONE_PER_USER))?;

    let item = fetch_item(&state, rid, &user, id).await?;
    Ok(ApiResponse::ok(item, req_id.0))
}

/// DELETE /api/v1/donations/organizations/{id}
pub(super) async fn delete_organization(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    fetch_writable(&state, &req_id.0, &user, id).await?;
    foodshare_db::delete_organization(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(organization_id = id, user_id = user.id, "organization deleted");
    Ok(StatusCode::NO_CONTENT)
}
