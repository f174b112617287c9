use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use foodshare_db::{FoodItemFilters, FoodItemRow, FoodItemUpdate, NewFoodItem};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    double_option, map_db_error, map_write_error, page, validation, ApiError, ApiResponse,
    AppState,
};

const MAX_NAME_LEN: usize = 100;
const MAX_UNIT_LEN: usize = 50;

#[derive(Debug, Serialize)]
pub(super) struct FoodItemItem {
    id: i64,
    user_email: String,
    name: String,
    category: Option<i64>,
    category_name: Option<String>,
    quantity: Decimal,
    unit: String,
    expiry_date: NaiveDate,
    description: Option<String>,
    is_available: bool,
    is_donated: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FoodItemRow> for FoodItemItem {
    fn from(row: FoodItemRow) -> Self {
        Self {
            id: row.id,
            user_email: row.user_email,
            name: row.name,
            category: row.category_id,
            category_name: row.category_name,
            quantity: row.quantity,
            unit: row.unit,
            expiry_date: row.expiry_date,
            description: row.description,
            is_available: row.is_available,
            is_donated: row.is_donated,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct FoodItemQuery {
    pub category: Option<i64>,
    pub is_available: Option<bool>,
    pub is_donated: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateFoodItemRequest {
    pub name: String,
    pub category: Option<i64>,
    pub quantity: Decimal,
    pub unit: String,
    pub expiry_date: NaiveDate,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub is_donated: bool,
}

fn default_true() -> bool {
    true
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateFoodItemRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<i64>>,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub is_available: Option<bool>,
    pub is_donated: Option<bool>,
}

async fn fetch_visible(
    state: &AppState,
    req_id: &str,
    user: &CurrentUser,
    id: i64,
) -> Result<FoodItemRow, ApiError> {
    foodshare_db::get_food_item(&state.pool, &user.viewer(), id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::not_found(req_id, "food item"))
}

/// GET /api/v1/food/items
pub(super) async fn list_food_items(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<FoodItemQuery>,
) -> Result<Json<ApiResponse<Vec<FoodItemItem>>>, ApiError> {
    let rows = foodshare_db::list_food_items(
        &state.pool,
        &user.viewer(),
        &FoodItemFilters {
            category_id: query.category,
            is_available: query.is_available,
            is_donated: query.is_donated,
            search: query.search.as_deref(),
            ordering: query.ordering.as_deref(),
            page: page(query.limit, query.offset),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(
        rows.into_iter().map(FoodItemItem::from).collect(),
        req_id.0,
    ))
}

/// POST /api/v1/food/items
///
/// The caller becomes the owner.
pub(super) async fn create_food_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateFoodItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FoodItemItem>>), ApiError> {
    let rid = &req_id.0;
    let name = validation::required_text(rid, "name", &body.name, MAX_NAME_LEN)?;
    let unit = validation::required_text(rid, "unit", &body.unit, MAX_UNIT_LEN)?;
    let quantity = validation::positive_quantity(rid, body.quantity)?;

    let id = foodshare_db::create_food_item(
        &state.pool,
        user.id,
        &NewFoodItem {
            name,
            category_id: body.category,
            quantity,
            unit,
            expiry_date: body.expiry_date,
            description: body.description.as_deref(),
            is_available: body.is_available,
            is_donated: body.is_donated,
        },
    )
    .await
    .map_err(|e| map_write_error(rid, &e, "food item already exists"))?;

    let row = fetch_visible(&state, rid, &user, id).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(FoodItemItem::from(row), req_id.0),
    ))
}

/// GET /api/v1/food/items/{id}
pub(super) async fn get_food_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FoodItemItem>>, ApiError> {
    let row = fetch_visible(&state, &req_id.0, &user, id).await?;
    Ok(ApiResponse::ok(FoodItemItem::from(row), req_id.0))
}

/// PATCH /api/v1/food/items/{id}
pub(super) async fn update_food_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateFoodItemRequest>,
) -> Result<Json<ApiResponse<FoodItemItem>>, ApiError> {
    let rid = &req_id.0;
    let name = body
        .name
        .as_deref()
        .map(|v| validation::required_text(rid, "name", v, MAX_NAME_LEN))
        .transpose()?;
    let unit = body
        .unit
        .as_deref()
        .map(|v| validation::required_text(rid, "unit", v, MAX_UNIT_LEN))
        .transpose()?;
    let quantity = body
        .quantity
        .map(|v| validation::positive_quantity(rid, v))
        .transpose()?;

    foodshare_db::update_food_item(
        &state.pool,
        &user.viewer(),
        id,
        &FoodItemUpdate {
            name,
            category_id: body.category,
            quantity,
            unit,
            expiry_date: body.expiry_date,
            description: body.description.as_ref().map(Option::as_deref),
            is_available: body.is_available,
            is_donated: body.is_donated,
        },
    )
    .await
    .map_err(|e| map_write_error(rid, &e, "food item already exists"))?;

    let row = fetch_visible(&state, rid, &user, id).await?;
    Ok(ApiResponse::ok(FoodItemItem::from(row), req_id.0))
}

/// DELETE /api/v1/food/items/{id}
pub(super) async fn delete_food_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    foodshare_db::delete_food_item(&state.pool, &user.viewer(), id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(StatusCode::NO_CONTENT)
}
