//! Command handlers for the CLI.
//!
//! Each handler is called from `main` once the pool is connected and prints
//! a short human-readable result.

use std::path::Path;

use foodshare_core::UserType;
use foodshare_db::NewUser;

/// Apply pending migrations.
///
/// # Errors
///
/// Returns an error if any migration fails.
pub(crate) async fn run_migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let applied = foodshare_db::run_migrations(pool).await?;
    tracing::info!(applied, "database migrations complete");
    println!("applied {applied} migration(s)");
    Ok(())
}

/// Upsert categories from `path` in a single transaction.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the upsert fails.
pub(crate) async fn run_seed_categories(pool: &sqlx::PgPool, path: &Path) -> anyhow::Result<()> {
    let file = foodshare_core::load_categories(path)?;
    let count = foodshare_db::seed_categories(pool, &file.categories).await?;
    tracing::info!(count, path = %path.display(), "food categories seeded");
    println!("seeded {count} categories from {}", path.display());
    Ok(())
}

/// # Errors
///
/// Returns an error if the email or username is taken or the insert fails.
pub(crate) async fn run_create_user(
    pool: &sqlx::PgPool,
    email: &str,
    username: &str,
    user_type: UserType,
    is_staff: bool,
) -> anyhow::Result<()> {
    let user = foodshare_db::create_user(
        pool,
        &NewUser {
            email,
            username,
            first_name: "",
            last_name: "",
            user_type: user_type.as_str(),
            is_staff,
        },
    )
    .await
    .map_err(|e| {
        if e.is_unique_violation() {
            anyhow::anyhow!("a user with email '{email}' or username '{username}' already exists")
        } else {
            anyhow::Error::from(e)
        }
    })?;

    tracing::info!(user_id = user.id, user_type = %user_type, is_staff, "user created");
    println!("created user {} ({}) with id {}", user.email, user.user_type, user.id);
    Ok(())
}

/// Issue a bearer token for the user with `email`.
///
/// The raw token is printed once and cannot be recovered afterwards; only
/// its hash is stored.
///
/// # Errors
///
/// Returns an error if no active user has that email or the insert fails.
pub(crate) async fn run_issue_token(
    pool: &sqlx::PgPool,
    salt: &str,
    email: &str,
    label: Option<&str>,
) -> anyhow::Result<()> {
    let user = foodshare_db::get_user_by_email(pool, email)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no active user with email '{email}'"))?;

    let issued = foodshare_db::issue_token(pool, salt, user.id, label).await?;
    tracing::info!(user_id = user.id, token_id = issued.id, "token issued");
    println!("token id: {}", issued.id);
    println!("token:    {}", issued.token);
    Ok(())
}

/// # Errors
///
/// Returns an error if the update fails.
pub(crate) async fn run_revoke_token(pool: &sqlx::PgPool, token_id: i64) -> anyhow::Result<()> {
    if foodshare_db::revoke_token(pool, token_id).await? {
        tracing::info!(token_id, "token revoked");
        println!("revoked token {token_id}");
    } else {
        println!("token {token_id} not found or already revoked");
    }
    Ok(())
}
