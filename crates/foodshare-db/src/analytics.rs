//! Loads the donation snapshot behind an organization's analytics report.

use chrono::NaiveDate;
use foodshare_core::{
    analytics::{self, AnalyticsReport, AnalyticsWindow, DonationRecord, OrganizationRef},
    Rating,
};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, sqlx::FromRow)]
struct DonationRecordRow {
    status: String,
    donation_date: NaiveDate,
    donor_email: String,
    rating: Option<i16>,
}

impl TryFrom<DonationRecordRow> for DonationRecord {
    type Error = DbError;

    fn try_from(row: DonationRecordRow) -> Result<Self, Self::Error> {
        Ok(DonationRecord {
            status: row.status.parse()?,
            donation_date: row.donation_date,
            donor: row.donor_email,
            rating: row.rating.map(Rating::new).transpose()?,
        })
    }
}

/// Every donation addressed to `organization_id`, ordered by id, with the
/// donor's email and any feedback rating.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or
/// [`DbError::InvalidStoredValue`] for an unrecognized status or an
/// out-of-range rating.
pub async fn load_donation_records(
    pool: &PgPool,
    organization_id: i64,
) -> Result<Vec<DonationRecord>, DbError> {
    let rows = sqlx::query_as::<_, DonationRecordRow>(
        "SELECT d.status, d.donation_date, u.email AS donor_email, f.rating \
         FROM donations d \
         JOIN users u ON u.id = d.donor_id \
         LEFT JOIN donation_feedback f ON f.donation_id = d.id \
         WHERE d.organization_id = $1 \
         ORDER BY d.id",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DonationRecord::try_from).collect()
}

/// Compute the analytics report for an organization as of `today`.
///
/// Returns the organization's owner id alongside the report so the caller can
/// decide how much of it the viewer may see.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the organization does not exist, or any
/// error from [`load_donation_records`].
pub async fn organization_analytics(
    pool: &PgPool,
    organization_id: i64,
    window: AnalyticsWindow,
    today: NaiveDate,
) -> Result<(OrganizationRef, AnalyticsReport), DbError> {
    let organization = sqlx::query_as::<_, (i64, String, i64)>(
        "SELECT id, name, user_id FROM organizations WHERE id = $1",
    )
    .bind(organization_id)
    .fetch_optional(pool)
    .await?
    .map(|(id, name, owner_id)| OrganizationRef { id, name, owner_id })
    .ok_or(DbError::NotFound)?;

    let records = load_donation_records(pool, organization.id).await?;
    let report = analytics::compute(&organization, &records, window, today);
    tracing::debug!(
        organization_id,
        donations = records.len(),
        period = ?window,
        "computed organization analytics"
    );
    Ok((organization, report))
}
