//! Row-store access for `waitlist_signups`.
//!
//! Access is split into two capabilities. `SignupStore` is what the public
//! signup endpoint may do: look a row up by email, insert, and rotate the token
//! on a pending row. `VerificationStore` is the privileged side used by
//! `/verify`: look a row up by token and flip it to verified. Each is backed by
//! its own pool so the two can be opened with different credentials.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::models::signup::{NewSignup, WaitlistSignup};

const SELECT_SIGNUP: &str = "SELECT id, email, preferred_lang, email_verified, verification_token, \
     token_expires_at, verified_at, created_at FROM waitlist_signups";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("a signup with this email already exists")]
    Duplicate,
}

#[async_trait]
pub trait SignupStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<WaitlistSignup>, StoreError>;

    async fn insert(&self, signup: &NewSignup) -> Result<WaitlistSignup, StoreError>;

    /// Issues a new token and records the latest language choice for a row
    /// that has not been verified yet. Returns `false` when the row was
    /// verified by the time the update ran; it is then left untouched.
    async fn refresh_pending(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
        preferred_lang: &str,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait VerificationStore: Send + Sync {
    async fn find_by_token(&self, token: &str) -> Result<Option<WaitlistSignup>, StoreError>;

    /// Marks the row verified and clears its token. Returns `false` when the
    /// row was already verified by the time the update ran.
    async fn mark_verified(&self, id: i64, at: DateTime<Utc>) -> Result<bool, StoreError>;
}

pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Clone)]
pub struct PublicStore {
    pool: SqlitePool,
}

impl PublicStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignupStore for PublicStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<WaitlistSignup>, StoreError> {
        let signup = sqlx::query_as::<_, WaitlistSignup>(&format!("{SELECT_SIGNUP} WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(signup)
    }

    async fn insert(&self, signup: &NewSignup) -> Result<WaitlistSignup, StoreError> {
        let result = sqlx::query_as::<_, WaitlistSignup>(
            "INSERT INTO waitlist_signups (email, preferred_lang, email_verified, verification_token, token_expires_at) \
             VALUES (?, ?, 0, ?, ?) \
             RETURNING id, email, preferred_lang, email_verified, verification_token, token_expires_at, verified_at, created_at",
        )
        .bind(&signup.email)
        .bind(&signup.preferred_lang)
        .bind(&signup.verification_token)
        .bind(signup.token_expires_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row),
            Err(e) => {
                if let Some(db_err) = e.as_database_error() {
                    if db_err.is_unique_violation() {
                        return Err(StoreError::Duplicate);
                    }
                }
                Err(e.into())
            }
        }
    }

    async fn refresh_pending(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
        preferred_lang: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE waitlist_signups \
             SET verification_token = ?, token_expires_at = ?, preferred_lang = ? \
             WHERE id = ? AND email_verified = 0",
        )
        .bind(token)
        .bind(expires_at)
        .bind(preferred_lang)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Clone)]
pub struct AdminStore {
    pool: SqlitePool,
}

impl AdminStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerificationStore for AdminStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<WaitlistSignup>, StoreError> {
        let signup =
            sqlx::query_as::<_, WaitlistSignup>(&format!("{SELECT_SIGNUP} WHERE verification_token = ?"))
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(signup)
    }

    async fn mark_verified(&self, id: i64, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE waitlist_signups \
             SET email_verified = 1, verification_token = NULL, token_expires_at = NULL, verified_at = ? \
             WHERE id = ? AND email_verified = 0",
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
