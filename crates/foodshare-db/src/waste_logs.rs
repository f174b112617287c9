//! Database operations for the `waste_logs` table.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::{
    listing::{search_pattern, OrderBy, Page},
    DbError, Viewer,
};

const SELECT_LOGS: &str = "SELECT w.id, w.user_id, u.email AS user_email, w.food_item_id, \
            w.food_name, w.category_id, c.name AS category_name, w.quantity, w.unit, \
            w.waste_date, w.reason, w.notes, w.created_at \
     FROM waste_logs w \
     JOIN users u ON u.id = w.user_id \
     LEFT JOIN food_categories c ON c.id = w.category_id";

const ORDERING: &[(&str, &str)] = &[("waste_date", "w.waste_date"), ("created_at", "w.created_at")];

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WasteLogRow {
    pub id: i64,
    pub user_id: i64,
    pub user_email: String,
    pub food_item_id: Option<i64>,
    pub food_name: String,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub waste_date: NaiveDate,
    pub reason: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWasteLog<'a> {
    pub food_item_id: Option<i64>,
    pub food_name: &'a str,
    pub category_id: Option<i64>,
    pub quantity: Decimal,
    pub unit: &'a str,
    pub waste_date: NaiveDate,
    pub reason: &'a str,
    pub notes: Option<&'a str>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct WasteLogUpdate<'a> {
    pub food_item_id: Option<Option<i64>>,
    pub food_name: Option<&'a str>,
    pub category_id: Option<Option<i64>>,
    pub quantity: Option<Decimal>,
    pub unit: Option<&'a str>,
    pub waste_date: Option<NaiveDate>,
    pub reason: Option<&'a str>,
    pub notes: Option<Option<&'a str>>,
}

#[derive(Debug, Clone, Default)]
pub struct WasteLogFilters<'a> {
    pub category_id: Option<i64>,
    pub reason: Option<&'a str>,
    pub waste_date: Option<NaiveDate>,
    pub search: Option<&'a str>,
    pub ordering: Option<&'a str>,
    pub page: Page,
}

/// Lists waste logs visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_waste_logs(
    pool: &PgPool,
    viewer: &Viewer,
    filters: &WasteLogFilters<'_>,
) -> Result<Vec<WasteLogRow>, DbError> {
    let order = OrderBy::resolve(filters.ordering, ORDERING, OrderBy::desc("w.waste_date"))
        .to_sql("w.id DESC");
    let rows = sqlx::query_as::<_, WasteLogRow>(&format!(
        "{SELECT_LOGS} \
         WHERE ($1::BOOL OR w.user_id = $2) \
           AND ($3::BIGINT IS NULL OR w.category_id = $3) \
           AND ($4::TEXT IS NULL OR w.reason = $4) \
           AND ($5::DATE IS NULL OR w.waste_date = $5) \
           AND ($6::TEXT IS NULL OR w.food_name ILIKE $6 OR w.notes ILIKE $6) \
         ORDER BY {order} \
         LIMIT $7 OFFSET $8"
    ))
    .bind(viewer.is_staff)
    .bind(viewer.user_id)
    .bind(filters.category_id)
    .bind(filters.reason)
    .bind(filters.waste_date)
    .bind(search_pattern(filters.search))
    .bind(filters.page.limit)
    .bind(filters.page.offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns a waste log if it is visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_waste_log(
    pool: &PgPool,
    viewer: &Viewer,
    id: i64,
) -> Result<Option<WasteLogRow>, DbError> {
    let row = sqlx::query_as::<_, WasteLogRow>(&format!(
        "{SELECT_LOGS} WHERE w.id = $1 AND ($2::BOOL OR w.user_id = $3)"
    ))
    .bind(id)
    .bind(viewer.is_staff)
    .bind(viewer.user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Inserts a waste log owned by `owner_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_waste_log(
    pool: &PgPool,
    owner_id: i64,
    log: &NewWasteLog<'_>,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO waste_logs \
           (user_id, food_item_id, food_name, category_id, quantity, unit, waste_date, \
            reason, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id",
    )
    .bind(owner_id)
    .bind(log.food_item_id)
    .bind(log.food_name)
    .bind(log.category_id)
    .bind(log.quantity)
    .bind(log.unit)
    .bind(log.waste_date)
    .bind(log.reason)
    .bind(log.notes)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Applies a sparse update to a waste log visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no visible log has that id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_waste_log(
    pool: &PgPool,
    viewer: &Viewer,
    id: i64,
    update: &WasteLogUpdate<'_>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE waste_logs \
         SET food_item_id = CASE WHEN $4::BOOL THEN $5 ELSE food_item_id END, \
             food_name    = COALESCE($6, food_name), \
             category_id  = CASE WHEN $7::BOOL THEN $8 ELSE category_id END, \
             quantity     = COALESCE($9, quantity), \
             unit         = COALESCE($10, unit), \
             waste_date   = COALESCE($11, waste_date), \
             reason       = COALESCE($12, reason), \
             notes        = CASE WHEN $13::BOOL THEN $14 ELSE notes END \
         WHERE id = $1 AND ($2::BOOL OR user_id = $3)",
    )
    .bind(id)
    .bind(viewer.is_staff)
    .bind(viewer.user_id)
    .bind(update.food_item_id.is_some())
    .bind(update.food_item_id.flatten())
    .bind(update.food_name)
    .bind(update.category_id.is_some())
    .bind(update.category_id.flatten())
    .bind(update.quantity)
    .bind(update.unit)
    .bind(update.waste_date)
    .bind(update.reason)
    .bind(update.notes.is_some())
    .bind(update.notes.flatten())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Deletes a waste log visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no visible log has that id, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn delete_waste_log(pool: &PgPool, viewer: &Viewer, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM waste_logs WHERE id = $1 AND ($2::BOOL OR user_id = $3)")
        .bind(id)
        .bind(viewer.is_staff)
        .bind(viewer.user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
