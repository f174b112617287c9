//! Database operations for the `food_categories` table.

use chrono::{DateTime, Utc};
use foodshare_core::CategoryConfig;
use sqlx::PgPool;

use crate::{
    listing::{search_pattern, OrderBy, Page},
    DbError,
};

const ORDERING: &[(&str, &str)] = &[("name", "name"), ("shelf_life_days", "shelf_life_days")];

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FoodCategoryRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub shelf_life_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryFilters<'a> {
    pub search: Option<&'a str>,
    pub ordering: Option<&'a str>,
    pub page: Page,
}

/// Lists categories, searching name and description.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_categories(
    pool: &PgPool,
    filters: &CategoryFilters<'_>,
) -> Result<Vec<FoodCategoryRow>, DbError> {
    let order = OrderBy::resolve(filters.ordering, ORDERING, OrderBy::asc("name")).to_sql("id");
    let rows = sqlx::query_as::<_, FoodCategoryRow>(&format!(
        "SELECT id, name, description, shelf_life_days, created_at, updated_at \
         FROM food_categories \
         WHERE ($1::TEXT IS NULL OR name ILIKE $1 OR description ILIKE $1) \
         ORDER BY {order} \
         LIMIT $2 OFFSET $3"
    ))
    .bind(search_pattern(filters.search))
    .bind(filters.page.limit)
    .bind(filters.page.offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns a category by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_category(pool: &PgPool, id: i64) -> Result<Option<FoodCategoryRow>, DbError> {
    let row = sqlx::query_as::<_, FoodCategoryRow>(
        "SELECT id, name, description, shelf_life_days, created_at, updated_at \
         FROM food_categories WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Upsert categories from the seed file, keyed by name.
///
/// Returns the number of categories processed. All upserts run inside a
/// single transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_categories(pool: &PgPool, categories: &[CategoryConfig]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for category in categories {
        let shelf_life_days = i32::try_from(category.shelf_life_days).unwrap_or(i32::MAX);

        sqlx::query(
            "INSERT INTO food_categories (name, description, shelf_life_days) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (name) DO UPDATE SET \
                 description = EXCLUDED.description, \
                 shelf_life_days = EXCLUDED.shelf_life_days, \
                 updated_at = NOW()",
        )
        .bind(category.name.trim())
        .bind(&category.description)
        .bind(shelf_life_days)
        .execute(&mut *tx)
        .await?;

        count += 1;
    }

    tx.commit().await?;
    tracing::info!(count, "seeded food categories");
    Ok(count)
}
