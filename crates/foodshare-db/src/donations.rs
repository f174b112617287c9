//! Database operations for donations, their line items, and feedback.
//!
//! Visibility: staff see every donation, donors see the ones they made,
//! organization users see the ones addressed to their organization, and
//! anyone else sees nothing.

use chrono::{DateTime, NaiveDate, Utc};
use foodshare_core::Rating;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::{
    listing::{search_pattern, OrderBy, Page},
    DbError, Viewer,
};

const SELECT_DONATIONS: &str = "SELECT d.id, d.donor_id, u.email AS donor_email, \
            d.organization_id, o.name AS organization_name, o.user_id AS organization_owner_id, \
            d.status, d.pickup_time, d.donation_date, d.notes, d.created_at, d.updated_at \
     FROM donations d \
     JOIN users u ON u.id = d.donor_id \
     JOIN organizations o ON o.id = d.organization_id";

// $1 is_staff, $2 user_type, $3 user_id
const VISIBLE: &str = "($1::BOOL \
      OR ($2::TEXT = 'donor' AND d.donor_id = $3) \
      OR ($2::TEXT = 'organization' AND o.user_id = $3))";

const ORDERING: &[(&str, &str)] = &[
    ("donation_date", "d.donation_date"),
    ("created_at", "d.created_at"),
    ("status", "d.status"),
];

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DonationRow {
    pub id: i64,
    pub donor_id: i64,
    pub donor_email: String,
    pub organization_id: i64,
    pub organization_name: String,
    pub organization_owner_id: i64,
    pub status: String,
    pub pickup_time: Option<DateTime<Utc>>,
    pub donation_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DonationItemRow {
    pub id: i64,
    pub donation_id: i64,
    pub food_item_id: i64,
    pub food_item_name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedbackRow {
    pub id: i64,
    pub donation_id: i64,
    pub rating: i16,
    pub comments: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A requested line item. Missing quantity or unit fall back to the food
/// item's own values.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationItemInput {
    pub food_item_id: i64,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDonation<'a> {
    pub organization_id: i64,
    pub status: &'a str,
    pub pickup_time: Option<DateTime<Utc>>,
    pub donation_date: NaiveDate,
    pub notes: Option<&'a str>,
    pub items: &'a [DonationItemInput],
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct DonationUpdate<'a> {
    pub organization_id: Option<i64>,
    pub status: Option<&'a str>,
    pub pickup_time: Option<Option<DateTime<Utc>>>,
    pub donation_date: Option<NaiveDate>,
    pub notes: Option<Option<&'a str>>,
}

#[derive(Debug, Clone, Default)]
pub struct DonationFilters<'a> {
    pub status: Option<&'a str>,
    pub organization_id: Option<i64>,
    pub donation_date: Option<NaiveDate>,
    pub search: Option<&'a str>,
    pub ordering: Option<&'a str>,
    pub page: Page,
}

#[derive(Debug, Clone)]
pub struct NewFeedback<'a> {
    pub donation_id: i64,
    pub rating: Rating,
    pub comments: Option<&'a str>,
    pub created_by: i64,
}

/// Lists donations visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_donations(
    pool: &PgPool,
    viewer: &Viewer,
    filters: &DonationFilters<'_>,
) -> Result<Vec<DonationRow>, DbError> {
    let order = OrderBy::resolve(filters.ordering, ORDERING, OrderBy::desc("d.created_at"))
        .to_sql("d.id DESC");
    let rows = sqlx::query_as::<_, DonationRow>(&format!(
        "{SELECT_DONATIONS} \
         WHERE {VISIBLE} \
           AND ($4::TEXT IS NULL OR d.status = $4) \
           AND ($5::BIGINT IS NULL OR d.organization_id = $5) \
           AND ($6::DATE IS NULL OR d.donation_date = $6) \
           AND ($7::TEXT IS NULL OR d.notes ILIKE $7 OR o.name ILIKE $7) \
         ORDER BY {order} \
         LIMIT $8 OFFSET $9"
    ))
    .bind(viewer.is_staff)
    .bind(viewer.user_type.as_str())
    .bind(viewer.user_id)
    .bind(filters.status)
    .bind(filters.organization_id)
    .bind(filters.donation_date)
    .bind(search_pattern(filters.search))
    .bind(filters.page.limit)
    .bind(filters.page.offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns a donation if it is visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_donation(
    pool: &PgPool,
    viewer: &Viewer,
    id: i64,
) -> Result<Option<DonationRow>, DbError> {
    let row = sqlx::query_as::<_, DonationRow>(&format!(
        "{SELECT_DONATIONS} WHERE {VISIBLE} AND d.id = $4"
    ))
    .bind(viewer.is_staff)
    .bind(viewer.user_type.as_str())
    .bind(viewer.user_id)
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Line items of a donation, in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_donation_items(
    pool: &PgPool,
    donation_id: i64,
) -> Result<Vec<DonationItemRow>, DbError> {
    let rows = sqlx::query_as::<_, DonationItemRow>(
        "SELECT di.id, di.donation_id, di.food_item_id, fi.name AS food_item_name, \
                di.quantity, di.unit, di.notes \
         FROM donation_items di \
         JOIN food_items fi ON fi.id = di.food_item_id \
         WHERE di.donation_id = $1 \
         ORDER BY di.id",
    )
    .bind(donation_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Creates a donation from `donor_id` with its line items.
///
/// Requested items that do not exist or are not owned by the donor are
/// skipped. Every included food item is marked donated. Everything runs in
/// one transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is persisted in
/// that case.
pub async fn create_donation(
    pool: &PgPool,
    donor_id: i64,
    donation: &NewDonation<'_>,
) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;

    let donation_id: i64 = sqlx::query_scalar(
        "INSERT INTO donations (donor_id, organization_id, status, pickup_time, donation_date, notes) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id",
    )
    .bind(donor_id)
    .bind(donation.organization_id)
    .bind(donation.status)
    .bind(donation.pickup_time)
    .bind(donation.donation_date)
    .bind(donation.notes)
    .fetch_one(&mut *tx)
    .await?;

    let mut included = 0usize;
    for item in donation.items {
        let inserted: Option<i64> = sqlx::query_scalar(
            "INSERT INTO donation_items (donation_id, food_item_id, quantity, unit, notes) \
             SELECT $1, fi.id, COALESCE($3, fi.quantity), COALESCE($4, fi.unit), $5 \
             FROM food_items fi \
             WHERE fi.id = $2 AND fi.user_id = $6 \
             RETURNING id",
        )
        .bind(donation_id)
        .bind(item.food_item_id)
        .bind(item.quantity)
        .bind(item.unit.as_deref())
        .bind(item.notes.as_deref())
        .bind(donor_id)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            tracing::debug!(
                donation_id,
                food_item_id = item.food_item_id,
                "skipping food item not owned by donor"
            );
            continue;
        }

        sqlx::query("UPDATE food_items SET is_donated = true, updated_at = NOW() WHERE id = $1")
            .bind(item.food_item_id)
            .execute(&mut *tx)
            .await?;
        included += 1;
    }

    tx.commit().await?;
    tracing::info!(donation_id, donor_id, items = included, "donation created");
    Ok(donation_id)
}

/// Applies a sparse update to a donation visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no visible donation has that id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_donation(
    pool: &PgPool,
    viewer: &Viewer,
    id: i64,
    update: &DonationUpdate<'_>,
) -> Result<(), DbError> {
    let result = sqlx::query(&format!(
        "UPDATE donations AS d \
         SET organization_id = COALESCE($5, d.organization_id), \
             status          = COALESCE($6, d.status), \
             pickup_time     = CASE WHEN $7::BOOL THEN $8 ELSE d.pickup_time END, \
             donation_date   = COALESCE($9, d.donation_date), \
             notes           = CASE WHEN $10::BOOL THEN $11 ELSE d.notes END, \
             updated_at      = NOW() \
         FROM organizations o \
         WHERE o.id = d.organization_id AND d.id = $4 AND {VISIBLE}"
    ))
    .bind(viewer.is_staff)
    .bind(viewer.user_type.as_str())
    .bind(viewer.user_id)
    .bind(id)
    .bind(update.organization_id)
    .bind(update.status)
    .bind(update.pickup_time.is_some())
    .bind(update.pickup_time.flatten())
    .bind(update.donation_date)
    .bind(update.notes.is_some())
    .bind(update.notes.flatten())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Deletes a donation visible to `viewer`, cascading to items and feedback.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no visible donation has that id, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn delete_donation(pool: &PgPool, viewer: &Viewer, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(&format!(
        "DELETE FROM donations AS d \
         USING organizations o \
         WHERE o.id = d.organization_id AND d.id = $4 AND {VISIBLE}"
    ))
    .bind(viewer.is_staff)
    .bind(viewer.user_type.as_str())
    .bind(viewer.user_id)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_feedback(pool: &PgPool, donation_id: i64) -> Result<Option<FeedbackRow>, DbError> {
    let row = sqlx::query_as::<_, FeedbackRow>(
        "SELECT id, donation_id, rating, comments, created_by, created_at, updated_at \
         FROM donation_feedback WHERE donation_id = $1",
    )
    .bind(donation_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Records feedback for a donation.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails. A second feedback for the
/// same donation is a unique violation.
pub async fn create_feedback(
    pool: &PgPool,
    feedback: &NewFeedback<'_>,
) -> Result<FeedbackRow, DbError> {
    let row = sqlx::query_as::<_, FeedbackRow>(
        "INSERT INTO donation_feedback (donation_id, rating, comments, created_by) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, donation_id, rating, comments, created_by, created_at, updated_at",
    )
    .bind(feedback.donation_id)
    .bind(feedback.rating.get())
    .bind(feedback.comments)
    .bind(feedback.created_by)
    .fetch_one(pool)
    .await?;
    Ok(row)
}
