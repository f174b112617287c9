//! Database operations for the `users` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{listing::Page, DbError};

const USER_COLUMNS: &str = "id, public_id, email, username, first_name, last_name, user_type, \
     is_staff, is_active, phone_number, address, city, state, zip_code, latitude, longitude, \
     profile_image, bio, created_at, updated_at";

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub public_id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub profile_image: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub user_type: &'a str,
    pub is_staff: bool,
}

/// Sparse profile update. `None` keeps the stored value; for nullable
/// columns `Some(None)` clears it.
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate<'a> {
    pub email: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub phone_number: Option<Option<&'a str>>,
    pub address: Option<Option<&'a str>>,
    pub city: Option<Option<&'a str>>,
    pub state: Option<Option<&'a str>>,
    pub zip_code: Option<Option<&'a str>>,
    pub latitude: Option<Option<Decimal>>,
    pub longitude: Option<Option<Decimal>>,
    pub profile_image: Option<Option<&'a str>>,
    pub bio: Option<Option<&'a str>>,
}

/// Returns an active user by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_id(pool: &PgPool, id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_active = true"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns an active user by email (case-insensitive).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1) AND is_active = true"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Lists active users ordered by email.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_users(pool: &PgPool, page: Page) -> Result<Vec<UserRow>, DbError> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE is_active = true \
         ORDER BY email, id LIMIT $1 OFFSET $2"
    ))
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Inserts a user and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including unique
/// violations on email or username.
pub async fn create_user(pool: &PgPool, user: &NewUser<'_>) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (email, username, first_name, last_name, user_type, is_staff) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user.email)
    .bind(user.username)
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.user_type)
    .bind(user.is_staff)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Applies a sparse profile update and returns the updated row.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the user does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_profile(
    pool: &PgPool,
    user_id: i64,
    update: &ProfileUpdate<'_>,
) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users \
         SET email         = COALESCE($2, email), \
             first_name    = COALESCE($3, first_name), \
             last_name     = COALESCE($4, last_name), \
             phone_number  = CASE WHEN $5::BOOL  THEN $6  ELSE phone_number END, \
             address       = CASE WHEN $7::BOOL  THEN $8  ELSE address END, \
             city          = CASE WHEN $9::BOOL  THEN $10 ELSE city END, \
             state         = CASE WHEN $11::BOOL THEN $12 ELSE state END, \
             zip_code      = CASE WHEN $13::BOOL THEN $14 ELSE zip_code END, \
             latitude      = CASE WHEN $15::BOOL THEN $16 ELSE latitude END, \
             longitude     = CASE WHEN $17::BOOL THEN $18 ELSE longitude END, \
             profile_image = CASE WHEN $19::BOOL THEN $20 ELSE profile_image END, \
             bio           = CASE WHEN $21::BOOL THEN $22 ELSE bio END, \
             updated_at    = NOW() \
         WHERE id = $1 AND is_active = true \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(update.email)
    .bind(update.first_name)
    .bind(update.last_name)
    .bind(update.phone_number.is_some())
    .bind(update.phone_number.flatten())
    .bind(update.address.is_some())
    .bind(update.address.flatten())
    .bind(update.city.is_some())
    .bind(update.city.flatten())
    .bind(update.state.is_some())
    .bind(update.state.flatten())
    .bind(update.zip_code.is_some())
    .bind(update.zip_code.flatten())
    .bind(update.latitude.is_some())
    .bind(update.latitude.flatten())
    .bind(update.longitude.is_some())
    .bind(update.longitude.flatten())
    .bind(update.profile_image.is_some())
    .bind(update.profile_image.flatten())
    .bind(update.bio.is_some())
    .bind(update.bio.flatten())
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}
