//! Bearer tokens stored in `api_tokens`.
//!
//! A token reads `fs_<id>_<secret>`. Only a salted SHA-256 of the secret is
//! persisted; the plaintext is returned once by [`issue_token`].

use foodshare_core::UserType;
use rand::{distr::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use subtle::ConstantTimeEq;

use crate::DbError;

const TOKEN_PREFIX: &str = "fs_";
const SECRET_LEN: usize = 40;

/// A freshly minted token. `token` is the only copy of the plaintext.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub id: i64,
    pub token: String,
}

/// The user behind a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub token_id: i64,
    pub user_id: i64,
    pub email: String,
    pub user_type: UserType,
    pub is_staff: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct TokenLookupRow {
    token_id: i64,
    token_hash: String,
    user_id: i64,
    email: String,
    user_type: String,
    is_staff: bool,
}

fn hash_secret(salt: &str, secret: &str) -> String {
    format!("{:x}", Sha256::digest(format!("{salt}:{secret}").as_bytes()))
}

/// Split `fs_<id>_<secret>` into its parts.
fn parse_token(raw: &str) -> Option<(i64, &str)> {
    let rest = raw.strip_prefix(TOKEN_PREFIX)?;
    let (id, secret) = rest.split_once('_')?;
    let id = id.parse::<i64>().ok()?;
    (!secret.is_empty()).then_some((id, secret))
}

/// Mint a new token for `user_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (e.g. unknown user).
pub async fn issue_token(
    pool: &PgPool,
    salt: &str,
    user_id: i64,
    label: Option<&str>,
) -> Result<IssuedToken, DbError> {
    let secret: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect();

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO api_tokens (user_id, token_hash, label) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(user_id)
    .bind(hash_secret(salt, &secret))
    .bind(label)
    .fetch_one(pool)
    .await?;

    Ok(IssuedToken {
        id,
        token: format!("{TOKEN_PREFIX}{id}_{secret}"),
    })
}

/// Resolve a presented bearer token to its user.
///
/// Returns `Ok(None)` for malformed, unknown, revoked, or mismatched tokens
/// and for inactive users. Successful lookups stamp `last_used_at`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails, or
/// [`DbError::InvalidStoredValue`] if the stored user type is unrecognized.
pub async fn verify_token(
    pool: &PgPool,
    salt: &str,
    raw: &str,
) -> Result<Option<AuthenticatedUser>, DbError> {
    let Some((token_id, secret)) = parse_token(raw) else {
        return Ok(None);
    };

    let row = sqlx::query_as::<_, TokenLookupRow>(
        "SELECT t.id AS token_id, t.token_hash, u.id AS user_id, u.email, u.user_type, u.is_staff \
         FROM api_tokens t \
         JOIN users u ON u.id = t.user_id \
         WHERE t.id = $1 AND t.revoked_at IS NULL AND u.is_active = true",
    )
    .bind(token_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let presented = hash_secret(salt, secret);
    if !bool::from(presented.as_bytes().ct_eq(row.token_hash.as_bytes())) {
        return Ok(None);
    }

    sqlx::query("UPDATE api_tokens SET last_used_at = NOW() WHERE id = $1")
        .bind(row.token_id)
        .execute(pool)
        .await?;

    Ok(Some(AuthenticatedUser {
        token_id: row.token_id,
        user_id: row.user_id,
        email: row.email,
        user_type: row.user_type.parse()?,
        is_staff: row.is_staff,
    }))
}

/// Revoke a token. Returns `false` if it was unknown or already revoked.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn revoke_token(pool: &PgPool, token_id: i64) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE api_tokens SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
    )
    .bind(token_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_token_accepts_well_formed_tokens() {
        assert_eq!(parse_token("fs_42_abcDEF123"), Some((42, "abcDEF123")));
    }

    #[test]
    fn parse_token_rejects_malformed_tokens() {
        assert_eq!(parse_token("42_abc"), None);
        assert_eq!(parse_token("fs_x_abc"), None);
        assert_eq!(parse_token("fs_42_"), None);
        assert_eq!(parse_token("fs_42"), None);
    }

    #[test]
    fn hash_depends_on_salt_and_secret() {
        let a = hash_secret("salt-a", "secret");
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_secret("salt-a", "secret"));
        assert_ne!(a, hash_secret("salt-b", "secret"));
        assert_ne!(a, hash_secret("salt-a", "secret2"));
    }
}
