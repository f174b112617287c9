//! Database operations for the `food_items` table.
//!
//! Non-staff viewers only ever see their own items.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::{
    listing::{search_pattern, OrderBy, Page},
    DbError, Viewer,
};

const SELECT_ITEMS: &str = "SELECT fi.id, fi.user_id, u.email AS user_email, fi.name, \
            fi.category_id, c.name AS category_name, fi.quantity, fi.unit, fi.expiry_date, \
            fi.description, fi.is_available, fi.is_donated, fi.created_at, fi.updated_at \
     FROM food_items fi \
     JOIN users u ON u.id = fi.user_id \
     LEFT JOIN food_categories c ON c.id = fi.category_id";

const ORDERING: &[(&str, &str)] = &[
    ("name", "fi.name"),
    ("expiry_date", "fi.expiry_date"),
    ("created_at", "fi.created_at"),
];

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FoodItemRow {
    pub id: i64,
    pub user_id: i64,
    pub user_email: String,
    pub name: String,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub expiry_date: NaiveDate,
    pub description: Option<String>,
    pub is_available: bool,
    pub is_donated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFoodItem<'a> {
    pub name: &'a str,
    pub category_id: Option<i64>,
    pub quantity: Decimal,
    pub unit: &'a str,
    pub expiry_date: NaiveDate,
    pub description: Option<&'a str>,
    pub is_available: bool,
    pub is_donated: bool,
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct FoodItemUpdate<'a> {
    pub name: Option<&'a str>,
    pub category_id: Option<Option<i64>>,
    pub quantity: Option<Decimal>,
    pub unit: Option<&'a str>,
    pub expiry_date: Option<NaiveDate>,
    pub description: Option<Option<&'a str>>,
    pub is_available: Option<bool>,
    pub is_donated: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct FoodItemFilters<'a> {
    pub category_id: Option<i64>,
    pub is_available: Option<bool>,
    pub is_donated: Option<bool>,
    pub search: Option<&'a str>,
    pub ordering: Option<&'a str>,
    pub page: Page,
}

/// Lists food items visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_food_items(
    pool: &PgPool,
    viewer: &Viewer,
    filters: &FoodItemFilters<'_>,
) -> Result<Vec<FoodItemRow>, DbError> {
    let order = OrderBy::resolve(filters.ordering, ORDERING, OrderBy::desc("fi.created_at"))
        .to_sql("fi.id DESC");
    let rows = sqlx::query_as::<_, FoodItemRow>(&format!(
        "{SELECT_ITEMS} \
         WHERE ($1::BOOL OR fi.user_id = $2) \
           AND ($3::BIGINT IS NULL OR fi.category_id = $3) \
           AND ($4::BOOL IS NULL OR fi.is_available = $4) \
           AND ($5::BOOL IS NULL OR fi.is_donated = $5) \
           AND ($6::TEXT IS NULL OR fi.name ILIKE $6 OR fi.description ILIKE $6) \
         ORDER BY {order} \
         LIMIT $7 OFFSET $8"
    ))
    .bind(viewer.is_staff)
    .bind(viewer.user_id)
    .bind(filters.category_id)
    .bind(filters.is_available)
    .bind(filters.is_donated)
    .bind(search_pattern(filters.search))
    .bind(filters.page.limit)
    .bind(filters.page.offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns a food item if it is visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_food_item(
    pool: &PgPool,
    viewer: &Viewer,
    id: i64,
) -> Result<Option<FoodItemRow>, DbError> {
    let row = sqlx::query_as::<_, FoodItemRow>(&format!(
        "{SELECT_ITEMS} WHERE fi.id = $1 AND ($2::BOOL OR fi.user_id = $3)"
    ))
    .bind(id)
    .bind(viewer.is_staff)
    .bind(viewer.user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Inserts a food item owned by `owner_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (an unknown category
/// surfaces as a foreign key violation).
pub async fn create_food_item(
    pool: &PgPool,
    owner_id: i64,
    item: &NewFoodItem<'_>,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO food_items \
           (user_id, name, category_id, quantity, unit, expiry_date, description, \
            is_available, is_donated) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id",
    )
    .bind(owner_id)
    .bind(item.name)
    .bind(item.category_id)
    .bind(item.quantity)
    .bind(item.unit)
    .bind(item.expiry_date)
    .bind(item.description)
    .bind(item.is_available)
    .bind(item.is_donated)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Applies a sparse update to a food item visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no visible item has that id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_food_item(
    pool: &PgPool,
    viewer: &Viewer,
    id: i64,
    update: &FoodItemUpdate<'_>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE food_items \
         SET name         = COALESCE($4, name), \
             category_id  = CASE WHEN $5::BOOL THEN $6 ELSE category_id END, \
             quantity     = COALESCE($7, quantity), \
             unit         = COALESCE($8, unit), \
             expiry_date  = COALESCE($9, expiry_date), \
             description  = CASE WHEN $10::BOOL THEN $11 ELSE description END, \
             is_available = COALESCE($12, is_available), \
             is_donated   = COALESCE($13, is_donated), \
             updated_at   = NOW() \
         WHERE id = $1 AND ($2::BOOL OR user_id = $3)",
    )
    .bind(id)
    .bind(viewer.is_staff)
    .bind(viewer.user_id)
    .bind(update.name)
    .bind(update.category_id.is_some())
    .bind(update.category_id.flatten())
    .bind(update.quantity)
    .bind(update.unit)
    .bind(update.expiry_date)
    .bind(update.description.is_some())
    .bind(update.description.flatten())
    .bind(update.is_available)
    .bind(update.is_donated)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Deletes a food item visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no visible item has that id, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn delete_food_item(pool: &PgPool, viewer: &Viewer, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM food_items WHERE id = $1 AND ($2::BOOL OR user_id = $3)")
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
