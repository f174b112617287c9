use foodshare_core::{AppConfig, UserType};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/foodshare-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("stored value is invalid: {0}")]
    InvalidStoredValue(#[from] foodshare_core::CoreError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    /// Postgres SQLSTATE of the underlying database error, if any.
    #[must_use]
    pub fn sqlstate(&self) -> Option<String> {
        match self {
            DbError::Sqlx(sqlx::Error::Database(db_err)) => db_err.code().map(|c| c.into_owned()),
            _ => None,
        }
    }

    /// `true` for unique constraint violations (SQLSTATE 23505).
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate().as_deref() == Some("23505")
    }

    /// `true` for foreign key violations (SQLSTATE 23503).
    #[must_use]
    pub fn is_foreign_key_violation(&self) -> bool {
        self.sqlstate().as_deref() == Some("23503")
    }
}

/// The authenticated user a query runs on behalf of.
///
/// Row-level visibility rules (own records vs. everything for staff) are
/// expressed in SQL against these fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: i64,
    pub user_type: UserType,
    pub is_staff: bool,
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table does not exist on a fresh database; treat
    // absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Run a full health check: ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}

pub mod analytics;
pub mod categories;
pub mod donations;
pub mod food_items;
pub mod listing;
pub mod needs;
pub mod organizations;
pub mod tokens;
pub mod users;
pub mod waste_logs;

pub use analytics::{load_donation_records, organization_analytics};
pub use categories::{
    get_category, list_categories, seed_categories, CategoryFilters, FoodCategoryRow,
};
pub use donations::{
    create_donation, create_feedback, delete_donation, get_donation, get_feedback,
    list_donation_items, list_donations, update_donation, DonationFilters, DonationItemInput,
    DonationItemRow, DonationRow, DonationUpdate, FeedbackRow, NewDonation, NewFeedback,
};
pub use food_items::{
    create_food_item, delete_food_item, get_food_item, list_food_items, update_food_item,
    FoodItemFilters, FoodItemRow, FoodItemUpdate, NewFoodItem,
};
pub use listing::{like_pattern, OrderBy, Page};
pub use needs::{
    create_need, delete_need, get_need, list_needs, list_needs_for_organizations, update_need,
    NeedUpdate, NewNeed, OrganizationNeedRow,
};
pub use organizations::{
    create_organization, delete_organization, get_organization, get_organization_unscoped,
    list_organizations, list_verified_organizations, update_organization, NewOrganization,
    OrganizationFilters, OrganizationRow, OrganizationUpdate,
};
pub use tokens::{issue_token, revoke_token, verify_token, AuthenticatedUser, IssuedToken};
pub use users::{
    create_user, get_user_by_email, get_user_by_id, list_users, update_profile, NewUser,
    ProfileUpdate, UserRow,
};
pub use waste_logs::{
    create_waste_log, delete_waste_log, get_waste_log, list_waste_logs, update_waste_log,
    NewWasteLog, WasteLogFilters, WasteLogRow, WasteLogUpdate,
};
