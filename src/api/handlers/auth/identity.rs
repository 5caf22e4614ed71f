//! Credential verification against the admin account table.

use anyhow::Context;
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::Instrument;

#[derive(Clone, Debug)]
pub struct AdminUser {
    pub email: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    /// Unknown account or password mismatch; callers show one generic message.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The credential store could not be consulted at all.
    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

/// Password check delegated to whatever backs the admin accounts.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_password(&self, email: &str, secret: &str) -> Result<AdminUser, IdentityError>;
}

/// Admin accounts live in Postgres with argon2 password hashes.
pub struct PgIdentityProvider {
    pool: PgPool,
}

impl PgIdentityProvider {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn verify_password(&self, email: &str, secret: &str) -> Result<AdminUser, IdentityError> {
        let query = "SELECT email, password_hash FROM admin_users WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up admin account")?;

        let Some(row) = row else {
            return Err(IdentityError::InvalidCredentials);
        };

        let hash: String = row.get("password_hash");
        let parsed = PasswordHash::new(&hash)
            .map_err(|err| anyhow::anyhow!("stored password hash is malformed: {err}"))?;
        if Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_err()
        {
            return Err(IdentityError::InvalidCredentials);
        }

        Ok(AdminUser {
            email: row.get("email"),
        })
    }
}
