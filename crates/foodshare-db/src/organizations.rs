//! Database operations for the `organizations` table.
//!
//! Staff see every organization. Everyone else sees verified organizations
//! plus the one they own. Write authorization (owner or staff) is decided by
//! the caller; the write functions here act on the id alone.

use chrono::{DateTime, Utc};
use foodshare_core::{Coordinates, Located};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use sqlx::PgPool;

use crate::{
    listing::{search_pattern, OrderBy, Page},
    DbError, Viewer,
};

const SELECT_ORGANIZATIONS: &str = "SELECT o.id, o.name, o.description, o.user_id, \
            u.email AS user_email, o.address, o.city, o.state, o.zip_code, o.latitude, \
            o.longitude, o.phone_number, o.email, o.website, o.hours_of_operation, \
            o.is_verified, o.created_at, o.updated_at \
     FROM organizations o \
     JOIN users u ON u.id = o.user_id";

const ORDERING: &[(&str, &str)] = &[("name", "o.name"), ("created_at", "o.created_at")];

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrganizationRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub user_id: i64,
    pub user_email: String,
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
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Located for OrganizationRow {
    fn coordinates(&self) -> Option<Coordinates> {
        let latitude = self.latitude?.to_f64()?;
        let longitude = self.longitude?.to_f64()?;
        Coordinates::new(latitude, longitude).ok()
    }
}

#[derive(Debug, Clone)]
pub struct NewOrganization<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub address: &'a str,
    pub city: &'a str,
    pub state: &'a str,
    pub zip_code: &'a str,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub phone_number: &'a str,
    pub email: &'a str,
    pub website: Option<&'a str>,
    pub hours_of_operation: Option<&'a str>,
    pub is_verified: bool,
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct OrganizationUpdate<'a> {
    pub name: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub address: Option<&'a str>,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub zip_code: Option<&'a str>,
    pub latitude: Option<Option<Decimal>>,
    pub longitude: Option<Option<Decimal>>,
    pub phone_number: Option<&'a str>,
    pub email: Option<&'a str>,
    pub website: Option<Option<&'a str>>,
    pub hours_of_operation: Option<Option<&'a str>>,
    pub is_verified: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct OrganizationFilters<'a> {
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub is_verified: Option<bool>,
    pub search: Option<&'a str>,
    pub ordering: Option<&'a str>,
    pub page: Page,
}

/// Lists organizations visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_organizations(
    pool: &PgPool,
    viewer: &Viewer,
    filters: &OrganizationFilters<'_>,
) -> Result<Vec<OrganizationRow>, DbError> {
    let order = OrderBy::resolve(filters.ordering, ORDERING, OrderBy::asc("o.name")).to_sql("o.id");
    let rows = sqlx::query_as::<_, OrganizationRow>(&format!(
        "{SELECT_ORGANIZATIONS} \
         WHERE ($1::BOOL OR o.is_verified OR o.user_id = $2) \
           AND ($3::TEXT IS NULL OR o.city = $3) \
           AND ($4::TEXT IS NULL OR o.state = $4) \
           AND ($5::BOOL IS NULL OR o.is_verified = $5) \
           AND ($6::TEXT IS NULL OR o.name ILIKE $6 OR o.description ILIKE $6 \
                OR o.city ILIKE $6 OR o.state ILIKE $6) \
         ORDER BY {order} \
         LIMIT $7 OFFSET $8"
    ))
    .bind(viewer.is_staff)
    .bind(viewer.user_id)
    .bind(filters.city)
    .bind(filters.state)
    .bind(filters.is_verified)
    .bind(search_pattern(filters.search))
    .bind(filters.page.limit)
    .bind(filters.page.offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Every verified organization, the candidate set for proximity search.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_verified_organizations(pool: &PgPool) -> Result<Vec<OrganizationRow>, DbError> {
    let rows = sqlx::query_as::<_, OrganizationRow>(&format!(
        "{SELECT_ORGANIZATIONS} WHERE o.is_verified ORDER BY o.id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns an organization if it is visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_organization(
    pool: &PgPool,
    viewer: &Viewer,
    id: i64,
) -> Result<Option<OrganizationRow>, DbError> {
    let row = sqlx::query_as::<_, OrganizationRow>(&format!(
        "{SELECT_ORGANIZATIONS} \
         WHERE o.id = $1 AND ($2::BOOL OR o.is_verified OR o.user_id = $3)"
    ))
    .bind(id)
    .bind(viewer.is_staff)
    .bind(viewer.user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns an organization regardless of verification or ownership.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_organization_unscoped(
    pool: &PgPool,
    id: i64,
) -> Result<Option<OrganizationRow>, DbError> {
    let row = sqlx::query_as::<_, OrganizationRow>(&format!("{SELECT_ORGANIZATIONS} WHERE o.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Inserts an organization owned by `owner_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails. A second organization for
/// the same owner is a unique violation.
pub async fn create_organization(
    pool: &PgPool,
    owner_id: i64,
    org: &NewOrganization<'_>,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO organizations \
           (name, description, user_id, address, city, state, zip_code, latitude, longitude, \
            phone_number, email, website, hours_of_operation, is_verified) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         RETURNING id",
    )
    .bind(org.name)
    .bind(org.description)
    .bind(owner_id)
    .bind(org.address)
    .bind(org.city)
    .bind(org.state)
    .bind(org.zip_code)
    .bind(org.latitude)
    .bind(org.longitude)
    .bind(org.phone_number)
    .bind(org.email)
    .bind(org.website)
    .bind(org.hours_of_operation)
    .bind(org.is_verified)
    .fetch_one(pool)
    .await?;

    tracing::info!(organization_id = id, owner_id, "organization created");
    Ok(id)
}

/// Applies a sparse update to an organization.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no organization has that id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_organization(
    pool: &PgPool,
    id: i64,
    update: &OrganizationUpdate<'_>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE organizations \
         SET name               = COALESCE($2, name), \
             description        = CASE WHEN $3::BOOL THEN $4 ELSE description END, \
             address            = COALESCE($5, address), \
             city               = COALESCE($6, city), \
             state              = COALESCE($7, state), \
             zip_code           = COALESCE($8, zip_code), \
             latitude           = CASE WHEN $9::BOOL THEN $10 ELSE latitude END, \
             longitude          = CASE WHEN $11::BOOL THEN $12 ELSE longitude END, \
             phone_number       = COALESCE($13, phone_number), \
             email              = COALESCE($14, email), \
             website            = CASE WHEN $15::BOOL THEN $16 ELSE website END, \
             hours_of_operation = CASE WHEN $17::BOOL THEN $18 ELSE hours_of_operation END, \
             is_verified        = COALESCE($19, is_verified), \
             updated_at         = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(update.name)
    .bind(update.description.is_some())
    .bind(update.description.flatten())
    .bind(update.address)
    .bind(update.city)
    .bind(update.state)
    .bind(update.zip_code)
    .bind(update.latitude.is_some())
    .bind(update.latitude.flatten())
    .bind(update.longitude.is_some())
    .bind(update.longitude.flatten())
    .bind(update.phone_number)
    .bind(update.email)
    .bind(update.website.is_some())
    .bind(update.website.flatten())
    .bind(update.hours_of_operation.is_some())
    .bind(update.hours_of_operation.flatten())
    .bind(update.is_verified)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Deletes an organization together with its needs and donations.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no organization has that id, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn delete_organization(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
