//! Database operations for the `organization_needs` table.
//!
//! A need is visible whenever its organization is.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{listing::Page, DbError, Viewer};

const SELECT_NEEDS: &str = "SELECT n.id, n.organization_id, o.name AS organization_name, \
            o.user_id AS owner_id, n.food_category_id, c.name AS food_category_name, \
            n.priority, n.notes, n.created_at, n.updated_at \
     FROM organization_needs n \
     JOIN organizations o ON o.id = n.organization_id \
     JOIN food_categories c ON c.id = n.food_category_id";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrganizationNeedRow {
    pub id: i64,
    pub organization_id: i64,
    pub organization_name: String,
    pub owner_id: i64,
    pub food_category_id: i64,
    pub food_category_name: String,
    pub priority: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNeed<'a> {
    pub organization_id: i64,
    pub food_category_id: i64,
    pub priority: i32,
    pub notes: Option<&'a str>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct NeedUpdate<'a> {
    pub food_category_id: Option<i64>,
    pub priority: Option<i32>,
    pub notes: Option<Option<&'a str>>,
}

/// Lists needs visible to `viewer`, highest priority first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_needs(
    pool: &PgPool,
    viewer: &Viewer,
    organization_id: Option<i64>,
    page: Page,
) -> Result<Vec<OrganizationNeedRow>, DbError> {
    let rows = sqlx::query_as::<_, OrganizationNeedRow>(&format!(
        "{SELECT_NEEDS} \
         WHERE ($1::BOOL OR o.is_verified OR o.user_id = $2) \
           AND ($3::BIGINT IS NULL OR n.organization_id = $3) \
         ORDER BY n.priority DESC, n.id \
         LIMIT $4 OFFSET $5"
    ))
    .bind(viewer.is_staff)
    .bind(viewer.user_id)
    .bind(organization_id)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Needs for a batch of organizations, for embedding in organization
/// responses. Ordered by organization, then priority descending.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_needs_for_organizations(
    pool: &PgPool,
    organization_ids: &[i64],
) -> Result<Vec<OrganizationNeedRow>, DbError> {
    if organization_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, OrganizationNeedRow>(&format!(
        "{SELECT_NEEDS} \
         WHERE n.organization_id = ANY($1) \
         ORDER BY n.organization_id, n.priority DESC, n.id"
    ))
    .bind(organization_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns a need if its organization is visible to `viewer`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_need(
    pool: &PgPool,
    viewer: &Viewer,
    id: i64,
) -> Result<Option<OrganizationNeedRow>, DbError> {
    let row = sqlx::query_as::<_, OrganizationNeedRow>(&format!(
        "{SELECT_NEEDS} WHERE n.id = $1 AND ($2::BOOL OR o.is_verified OR o.user_id = $3)"
    ))
    .bind(id)
    .bind(viewer.is_staff)
    .bind(viewer.user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Inserts a need.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails. A duplicate
/// (organization, category) pair is a unique violation.
pub async fn create_need(pool: &PgPool, need: &NewNeed<'_>) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO organization_needs (organization_id, food_category_id, priority, notes) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id",
    )
    .bind(need.organization_id)
    .bind(need.food_category_id)
    .bind(need.priority)
    .bind(need.notes)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Applies a sparse update to a need.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no need has that id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_need(pool: &PgPool, id: i64, update: &NeedUpdate<'_>) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE organization_needs \
         SET food_category_id = COALESCE($2, food_category_id), \
             priority         = COALESCE($3, priority), \
             notes            = CASE WHEN $4::BOOL THEN $5 ELSE notes END, \
             updated_at       = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(update.food_category_id)
    .bind(update.priority)
    .bind(update.notes.is_some())
    .bind(update.notes.flatten())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no need has that id, or
/// [`DbError::Sqlx`] if the delete fails.
pub async fn delete_need(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM organization_needs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
