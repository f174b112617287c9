use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use foodshare_db::{CategoryFilters, FoodCategoryRow};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, page, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct CategoryItem {
    id: i64,
    name: String,
    description: Option<String>,
    shelf_life_days: i32,
}

impl From<FoodCategoryRow> for CategoryItem {
    fn from(row: FoodCategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            shelf_life_days: row.shelf_life_days,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CategoryQuery {
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub(super) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<ApiResponse<Vec<CategoryItem>>>, ApiError> {
    let rows = foodshare_db::list_categories(
        &state.pool,
        &CategoryFilters {
            search: query.search.as_deref(),
            ordering: query.ordering.as_deref(),
            page: page(query.limit, query.offset),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(
        rows.into_iter().map(CategoryItem::from).collect(),
        req_id.0,
    ))
}

pub(super) async fn get_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<CategoryItem>>, ApiError> {
    let row = foodshare_db::get_category(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(&req_id.0, "food category"))?;

    Ok(ApiResponse::ok(CategoryItem::from(row), req_id.0))
}
