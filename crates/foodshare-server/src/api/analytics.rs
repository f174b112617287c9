use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use foodshare_core::{Access, AnalyticsView, AnalyticsWindow};
use foodshare_db::DbError;
use serde::Deserialize;

use crate::middleware::{CurrentUser, RequestId};

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct AnalyticsQuery {
    pub period: Option<String>,
}

/// GET /api/v1/organizations/analytics/{organization_id}?period
///
/// Owners and staff get the full report; everyone else gets the name and
/// all-time completed count.
pub(super) async fn organization_analytics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(organization_id): Path<i64>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ApiResponse<AnalyticsView>>, ApiError> {
    let window = AnalyticsWindow::parse(query.period.as_deref());
    let today = Utc::now().date_naive();

    let (organization, report) =
        foodshare_db::organization_analytics(&state.pool, organization_id, window, today)
            .await
            .map_err(|e| match e {
                DbError::NotFound => ApiError::not_found(&req_id.0, "organization"),
                other => map_db_error(req_id.0.clone(), &other),
            })?;

    let access = Access::decide(user.id, user.is_staff, organization.owner_id);
    tracing::debug!(
        organization_id,
        period = ?window,
        full = access == Access::Full,
        "organization analytics computed"
    );

    Ok(ApiResponse::ok(
        AnalyticsView::for_access(report, access),
        req_id.0,
    ))
}
