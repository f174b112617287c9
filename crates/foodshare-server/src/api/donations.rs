use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use foodshare_core::{DonationStatus, Rating, UserType};
use foodshare_db::{
    DonationFilters, DonationItemInput, DonationItemRow, DonationRow, DonationUpdate, FeedbackRow,
    NewDonation, NewFeedback,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    double_option, map_db_error, map_write_error, page, validation, ApiError, ApiResponse,
    AppState,
};

const FEEDBACK_EXISTS: &str = "Feedback already exists for this donation";

#[derive(Debug, Serialize)]
pub(super) struct DonationLineItem {
    id: i64,
    food_item: i64,
    food_item_name: String,
    quantity: Decimal,
    unit: String,
    notes: Option<String>,
}

impl From<DonationItemRow> for DonationLineItem {
    fn from(row: DonationItemRow) -> Self {
        Self {
            id: row.id,
            food_item: row.food_item_id,
            food_item_name: row.food_item_name,
            quantity: row.quantity,
            unit: row.unit,
            notes: row.notes,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct FeedbackItem {
    id: i64,
    donation: i64,
    rating: i16,
    comments: Option<String>,
    created_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FeedbackRow> for FeedbackItem {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: row.id,
            donation: row.donation_id,
            rating: row.rating,
            comments: row.comments,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct DonationItem {
    id: i64,
    donor: i64,
    donor_email: String,
    organization: i64,
    organization_name: String,
    status: String,
    pickup_time: Option<DateTime<Utc>>,
    donation_date: NaiveDate,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    donation_items: Option<Vec<DonationLineItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    feedback: Option<Option<FeedbackItem>>,
}

impl From<DonationRow> for DonationItem {
    fn from(row: DonationRow) -> Self {
        Self {
            id: row.id,
            donor: row.donor_id,
            donor_email: row.donor_email,
            organization: row.organization_id,
            organization_name: row.organization_name,
            status: row.status,
            pickup_time: row.pickup_time,
            donation_date: row.donation_date,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            donation_items: None,
            feedback: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct DonationQuery {
    pub status: Option<String>,
    pub organization: Option<i64>,
    pub donation_date: Option<NaiveDate>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FoodItemLine {
    pub food_item: i64,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateDonationRequest {
    pub organization: i64,
    pub status: Option<String>,
    pub pickup_time: Option<DateTime<Utc>>,
    pub donation_date: NaiveDate,
    pub notes: Option<String>,
    #[serde(default)]
    pub food_items_data: Vec<FoodItemLine>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(super) struct UpdateDonationRequest {
    pub organization: Option<i64>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub pickup_time: Option<Option<DateTime<Utc>>>,
    pub donation_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct FeedbackRequest {
    pub rating: i16,
    pub comments: Option<String>,
}

/// Whether `user` may leave feedback on `donation`.
fn may_give_feedback(user: &CurrentUser, donation: &DonationRow) -> bool {
    let is_donor = donation.donor_id == user.id;
    let is_receiving_org =
        user.user_type == UserType::Organization && donation.organization_owner_id == user.id;
    is_donor || is_receiving_org || user.is_staff
}

fn item_inputs(req_id: &str, lines: Vec<FoodItemLine>) -> Result<Vec<DonationItemInput>, ApiError> {
    lines
        .into_iter()
        .map(|line| {
            let quantity = line
                .quantity
                .map(|q| validation::positive_quantity(req_id, q))
                .transpose()?;
            Ok(DonationItemInput {
                food_item_id: line.food_item,
                quantity,
                unit: line.unit,
                notes: line.notes,
            })
        })
        .collect()
}

async fn fetch_visible(
    state: &AppState,
    req_id: &str,
    user: &CurrentUser,
    id: i64,
) -> Result<DonationRow, ApiError> {
    foodshare_db::get_donation(&state.pool, &user.viewer(), id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::not_found(req_id, "donation"))
}

/// Donation with its line items and feedback attached.
async fn fetch_detail(
    state: &AppState,
    req_id: &str,
    user: &CurrentUser,
    id: i64,
) -> Result<DonationItem, ApiError> {
    let row = fetch_visible(state, req_id, user, id).await?;
    let items = foodshare_db::list_donation_items(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;
    let feedback = foodshare_db::get_feedback(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.to_owned(), &e))?;

    let mut item = DonationItem::from(row);
    item.donation_items = Some(items.into_iter().map(DonationLineItem::from).collect());
    item.feedback = Some(feedback.map(FeedbackItem::from));
    Ok(item)
}

/// GET /api/v1/donations
pub(super) async fn list_donations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<DonationQuery>,
) -> Result<Json<ApiResponse<Vec<DonationItem>>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| validation::parse_choice::<DonationStatus>(&req_id.0, "status", s))
        .transpose()?;

    let rows = foodshare_db::list_donations(
        &state.pool,
        &user.viewer(),
        &DonationFilters {
            status: status.map(DonationStatus::as_str),
            organization_id: query.organization,
            donation_date: query.donation_date,
            search: query.search.as_deref(),
            ordering: query.ordering.as_deref(),
            page: page(query.limit, query.offset),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::ok(
        rows.into_iter().map(DonationItem::from).collect(),
        req_id.0,
    ))
}

/// POST /api/v1/donations
///
/// The caller is recorded as the donor.
pub(super) async fn create_donation(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateDonationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DonationItem>>), ApiError> {
    let rid = &req_id.0;
    if user.user_type != UserType::Donor && !user.is_staff {
        return Err(ApiError::forbidden(rid, "only donors may create donations"));
    }

    let status = body
        .status
        .as_deref()
        .map(|s| validation::parse_choice::<DonationStatus>(rid, "status", s))
        .transpose()?
        .unwrap_or(DonationStatus::Pending);
    let items = item_inputs(rid, body.food_items_data)?;

    foodshare_db::get_organization(&state.pool, &user.viewer(), body.organization)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| {
            ApiError::validation(
                rid,
                format!("'organization': no organization with id {}", body.organization),
            )
        })?;

    let id = foodshare_db::create_donation(
        &state.pool,
        user.id,
        &NewDonation {
            organization_id: body.organization,
            status: status.as_str(),
            pickup_time: body.pickup_time,
            donation_date: body.donation_date,
            notes: body.notes.as_deref(),
            items: &items,
        },
    )
    .await
    .map_err(|e| map_write_error(rid, &e, "donation already exists"))?;

    let item = fetch_detail(&state, rid, &user, id).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(item, req_id.0)))
}

/// GET /api/v1/donations/{id}
pub(super) async fn get_donation(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DonationItem>>, ApiError> {
    let item = fetch_detail(&state, &req_id.0, &user, id).await?;
    Ok(ApiResponse::ok(item, req_id.0))
}

/// PATCH /api/v1/donations/{id}
pub(super) async fn update_donation(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateDonationRequest>,
) -> Result<Json<ApiResponse<DonationItem>>, ApiError> {
    let rid = &req_id.0;
    let status = body
        .status
        .as_deref()
        .map(|s| validation::parse_choice::<DonationStatus>(rid, "status", s))
        .transpose()?;

    foodshare_db::update_donation(
        &state.pool,
        &user.viewer(),
        id,
        &DonationUpdate {
            organization_id: body.organization,
            status: status.map(DonationStatus::as_str),
            pickup_time: body.pickup_time,
            donation_date: body.donation_date,
            notes: body.notes.as_ref().map(Option::as_deref),
        },
    )
    .await
    .map_err(|e| map_write_error(rid, &e, "donation already exists"))?;

    if let Some(status) = status {
        tracing::info!(donation_id = id, status = %status, "donation status updated");
    }

    let item = fetch_detail(&state, rid, &user, id).await?;
    Ok(ApiResponse::ok(item, req_id.0))
}

/// DELETE /api/v1/donations/{id}
pub(super) async fn delete_donation(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    foodshare_db::delete_donation(&state.pool, &user.viewer(), id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/donations/{id}/feedback
pub(super) async fn add_feedback(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(body): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FeedbackItem>>), ApiError> {
    let rid = &req_id.0;
    let donation = fetch_visible(&state, rid, &user, id).await?;
    let rating =
        Rating::new(body.rating).map_err(|e| ApiError::validation(rid, format!("'rating': {e}")))?;

    let existing = foodshare_db::get_feedback(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if existing.is_some() {
        return Err(ApiError::new(rid.as_str(), "bad_request", FEEDBACK_EXISTS));
    }

    if !may_give_feedback(&user, &donation) {
        return Err(ApiError::forbidden(
            rid,
            "you do not have permission to add feedback to this donation",
        ));
    }

    let row = foodshare_db::create_feedback(
        &state.pool,
        &NewFeedback {
            donation_id: id,
            rating,
            comments: body.comments.as_deref(),
            created_by: user.id,
        },
    )
    .await
    .map_err(|e| {
        if e.is_unique_violation() {
            ApiError::new(rid.as_str(), "bad_request", FEEDBACK_EXISTS)
        } else {
            map_db_error(rid.clone(), &e)
        }
    })?;

    tracing::info!(donation_id = id, rating = rating.get(), "donation feedback recorded");
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(FeedbackItem::from(row), req_id.0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn donation(donor_id: i64, owner_id: i64) -> DonationRow {
        let now = Utc::now();
        DonationRow {
            id: 1,
            donor_id,
            donor_email: "donor@example.com".to_string(),
            organization_id: 2,
            organization_name: "Pantry".to_string(),
            organization_owner_id: owner_id,
            status: "pending".to_string(),
            pickup_time: None,
            donation_date: now.date_naive(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn user(id: i64, user_type: UserType, is_staff: bool) -> CurrentUser {
        CurrentUser {
            token_id: 1,
            id,
            email: format!("user{id}@example.com"),
            user_type,
            is_staff,
        }
    }

    #[test]
    fn feedback_allowed_for_donor_receiving_org_and_staff() {
        let d = donation(10, 20);
        assert!(may_give_feedback(&user(10, UserType::Donor, false), &d));
        assert!(may_give_feedback(&user(20, UserType::Organization, false), &d));
        assert!(!may_give_feedback(&user(99, UserType::Donor, false), &d));
        assert!(may_give_feedback(&user(99, UserType::Donor, true), &d));
    }

    #[test]
    fn org_owner_must_be_organization_type() {
        let d = donation(10, 20);
        assert!(!may_give_feedback(&user(20, UserType::Donor, false), &d));
    }

    #[test]
    fn item_quantities_must_be_positive() {
        let lines = vec![FoodItemLine {
            food_item: 1,
            quantity: Some(Decimal::ZERO),
            unit: None,
            notes: None,
        }];
        assert!(item_inputs("r", lines).is_err());

        let lines = vec![FoodItemLine {
            food_item: 1,
            quantity: None,
            unit: Some("kg".to_string()),
            notes: None,
        }];
        let inputs = item_inputs("r", lines).unwrap();
        assert_eq!(inputs[0].food_item_id, 1);
        assert!(inputs[0].quantity.is_none());
    }

    #[test]
    fn create_request_defaults_items() {
        let body: CreateDonationRequest = serde_json::from_str(
            r#"{"organization": 3, "donation_date": "2026-10-01"}"#,
        )
        .unwrap();
        assert!(body.food_items_data.is_empty());
        assert!(body.status.is_none());
    }
}
