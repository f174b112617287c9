use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use foodshare_core::WasteReason;
use foodshare_db::{NewWasteLog, WasteLogFilters, WasteLogRow, WasteLogUpdate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    double_option, map_db_error, map_write_error, page, validation, ApiError, ApiResponse,
    AppState,
};

#[derive(Debug, Serialize)]
pub(super) struct WasteLogItem {
    id: i64,
    user_email: String,
    food_item: Option<i64>,
    food_name: String,
    category: Option<i64>,
    category_name: Option<String>,
    quantity: Decimal,
    unit: String,
    waste_date: NaiveDate,
    reason: String,
    reason_display: &'static str,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<WasteLogRow> for WasteLogItem {
    fn from(row: WasteLogRow) -> Self {
        let reason_display = row
            .reason
            .parse::<WasteReason>()
            .map_or("Unknown", WasteReason::display_name);
        Self {
            id: row.id,
            user_email: row.user_email,
            food_item: row.food_item_id,
            food_name: row.food_name,
            category: row.category_id,
            category_name: row.category_name,
            quantity: row.quantity,
            unit: row.unit,
            waste_date: row.waste_date,
            reason: row.reason,
            reason_display,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WasteLogQuery {
    pub category: Option<i64>,
    pub reason: Option<String>,
    pub waste_date: Option<NaiveDate>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateWasteLogRequest {
    pub food_item: Option<i64>,
    pub food_name: String,
    pub category: Option<i64>,
    pub quantity: Decimal,
    pub unit: String,
    pub waste_date: NaiveDate,
    pub reason: String,
    pub notes: Option<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateWasteLogRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub food_item: Option<Option<i64>>,
    pub food_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category: Option<Option<i64>>,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub waste_date: Option<NaiveDate>,
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

async fn fetch_visible(
    state: &AppState,
    req_id: &str,
    user: &CurrentUser,
    id: i64,
) -> Result<WasteLogRow, ApiError> {
    foodshare_db::get_waste_log(&state.pool, &user.viewer(), id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::not_found(req_id, "waste log"))
}

/// GET /api/v1/food/waste
pub(super) async fn list_waste_logs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<WasteLogQuery>,
) -> Result<Json<ApiResponse<Vec<WasteLogItem>>>, ApiError> {
    let reason = query
        .reason
        .as_deref()
        .map(|v| validation::parse_choice::<WasteReason>(&req_id.0, "reason", v))
        .transpose()?;

    let rows = foodshare_db::list_waste_logs(
        &state.pool,
        &user.viewer(),
        &WasteLogFilters {
            category_id: query.category,
            reason: reason.map(WasteReason::as_str),
            waste_date: query.waste_date,
            search: query.search.as_deref(),
            ordering: query.ordering.as_deref(),
            page: page(query.limit, query.offset),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(
        rows.into_iter().map(WasteLogItem::from).collect(),
        req_id.0,
    ))
}

/// POST /api/v1/food/waste
pub(super) async fn create_waste_log(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateWasteLogRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WasteLogItem>>), ApiError> {
    let rid = &req_id.0;
    let food_name = validation::required_text(rid, "food_name", &body.food_name, 100)?;
    let unit = validation::required_text(rid, "unit", &body.unit, 50)?;
    let quantity = validation::positive_quantity(rid, body.quantity)?;
    let reason: WasteReason = validation::parse_choice(rid, "reason", &body.reason)?;

    let id = foodshare_db::create_waste_log(
        &state.pool,
        user.id,
        &NewWasteLog {
            food_item_id: body.food_item,
            food_name,
            category_id: body.category,
            quantity,
            unit,
            waste_date: body.waste_date,
            reason: reason.as_str(),
            notes: body.notes.as_deref(),
        },
    )
    .await
    .map_err(|e| map_write_error(rid, &e, "waste log already exists"))?;

    let row = fetch_visible(&state, rid, &user, id).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(WasteLogItem::from(row), req_id.0),
    ))
}

/// GET /api/v1/food/waste/{id}
pub(super) async fn get_waste_log(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<WasteLogItem>>, ApiError> {
    let row = fetch_visible(&state, &req_id.0, &user, id).await?;
    Ok(ApiResponse::ok(WasteLogItem::from(row), req_id.0))
}

/// PATCH /api/v1/food/waste/{id}
pub(super) async fn update_waste_log(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateWasteLogRequest>,
) -> Result<Json<ApiResponse<WasteLogItem>>, ApiError> {
    let rid = &req_id.0;
    let food_name = body
        .food_name
        .as_deref()
        .map(|v| validation::required_text(rid, "food_name", v, 100))
        .transpose()?;
    let unit = body
        .unit
        .as_deref()
        .map(|v| validation::required_text(rid, "unit", v, 50))
        .transpose()?;
    let quantity = body
        .quantity
        .map(|v| validation::positive_quantity(rid, v))
        .transpose()?;
    let reason = body
        .reason
        .as_deref()
        .map(|v| validation::parse_choice::<WasteReason>(rid, "reason", v))
        .transpose()?;

    foodshare_db::update_waste_log(
        &state.pool,
        &user.viewer(),
        id,
        &WasteLogUpdate {
            food_item_id: body.food_item,
            food_name,
            category_id: body.category,
            quantity,
            unit,
            waste_date: body.waste_date,
            reason: reason.map(WasteReason::as_str),
            notes: body.notes.as_ref().map(Option::as_deref),
        },
    )
    .await
    .map_err(|e| map_write_error(rid, &e, "waste log already exists"))?;

    let row = fetch_visible(&state, rid, &user, id).await?;
    Ok(ApiResponse::ok(WasteLogItem::from(row), req_id.0))
}

/// DELETE /api/v1/food/waste/{id}
pub(super) async fn delete_waste_log(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    foodshare_db::delete_waste_log(&state.pool, &user.viewer(), id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(reason: &str) -> WasteLogRow {
        WasteLogRow {
            id: 1,
            user_id: 2,
            user_email: "cook@example.com".to_string(),
            food_item_id: None,
            food_name: "Lettuce".to_string(),
            category_id: None,
            category_name: None,
            quantity: Decimal::ONE,
            unit: "head".to_string(),
            waste_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            reason: reason.to_string(),
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn waste_log_item_includes_reason_display() {
        let json = serde_json::to_value(WasteLogItem::from(row("spoiled"))).unwrap();
        assert_eq!(json["reason"], "spoiled");
        assert_eq!(json["reason_display"], "Spoiled");
    }

    #[test]
    fn unknown_stored_reason_displays_as_unknown() {
        let item = WasteLogItem::from(row("composted"));
        assert_eq!(item.reason_display, "Unknown");
    }
}
