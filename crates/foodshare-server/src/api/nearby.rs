use axum::{
    extract::{Query, State},
    Extension, Json,
};
use foodshare_core::{find_within, NearbyQuery};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{
    map_db_error,
    organizations::{with_needs, OrganizationItem},
    ApiError, ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct NearbyParams {
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub distance: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct NearbyItem {
    #[serde(flatten)]
    organization: OrganizationItem,
    /// Kilometres from the query point, rounded to two decimals.
    distance: f64,
}

fn round_km(distance_km: f64) -> f64 {
    (distance_km * 100.0).round() / 100.0
}

/// GET /api/v1/organizations/nearby?lat&lng&distance
///
/// Verified organizations with coordinates within `distance` km, nearest
/// first.
pub(super) async fn nearby_organizations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<ApiResponse<Vec<NearbyItem>>>, ApiError> {
    let query = NearbyQuery::parse(
        params.lat.as_deref(),
        params.lng.as_deref(),
        params.distance.as_deref(),
        state.config.nearby_default_radius_km,
    )
    .map_err(|e| ApiError::validation(&req_id.0, e.to_string()))?;

    let candidates = foodshare_db::list_verified_organizations(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let hits = find_within(query.origin, query.radius_km, candidates);

    let distances: Vec<f64> = hits.iter().map(|hit| hit.distance_km).collect();
    let rows = hits.into_iter().map(|hit| hit.item).collect();
    let organizations = with_needs(&state, &req_id.0, rows).await?;

    tracing::debug!(
        radius_km = query.radius_km,
        matches = organizations.len(),
        "nearby organization search"
    );

    let data = organizations
        .into_iter()
        .zip(distances)
        .map(|(organization, distance_km)| NearbyItem {
            organization,
            distance: round_km(distance_km),
        })
        .collect();
    Ok(ApiResponse::ok(data, req_id.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances_are_rounded_to_two_places() {
        assert!((round_km(1.234_567) - 1.23).abs() < 1e-9);
        assert!((round_km(1.235_1) - 1.24).abs() < 1e-9);
        assert!(round_km(0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn params_accept_missing_distance() {
        let params: NearbyParams =
            serde_json::from_value(serde_json::json!({"lat": "40.7", "lng": "-74.0"})).unwrap();
        assert!(params.distance.is_none());
        let query =
            NearbyQuery::parse(params.lat.as_deref(), params.lng.as_deref(), None, 10.0).unwrap();
        assert!((query.radius_km - 10.0).abs() < f64::EPSILON);
    }
}
