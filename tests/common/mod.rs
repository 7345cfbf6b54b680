#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tower::ServiceExt;
use waitlist::{
    config::Config,
    mailer::{MailError, Mailer, OutboundEmail},
    models::signup::{NewSignup, WaitlistSignup},
    rate_limit::RateLimiter,
    rest,
    store::{self, AdminStore, PublicStore, SignupStore, StoreError, VerificationStore},
    AppState,
};

pub const APP_URL: &str = "https://instapi.test";

/// Captures outgoing emails; can be switched to fail every send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().clone()
    }

    pub fn fail_sends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        self.sent.lock().push(email.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Rejected {
                status: 503,
                body: "provider unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// A public store whose database is gone.
pub struct UnavailableStore;

#[async_trait]
impl SignupStore for UnavailableStore {
    async fn find_by_email(&self, _email: &str) -> Result<Option<WaitlistSignup>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }

    async fn insert(&self, _signup: &NewSignup) -> Result<WaitlistSignup, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }

    async fn refresh_pending(
        &self,
        _id: i64,
        _token: &str,
        _expires_at: DateTime<Utc>,
        _preferred_lang: &str,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub mailer: Arc<RecordingMailer>,
}

pub async fn memory_pool() -> SqlitePool {
    // A single long-lived connection keeps the in-memory database alive.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    store::migrate(&pool).await.expect("run migrations");
    pool
}

fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("sqlite::memory:".to_string()),
        "APP_URL" => Some(APP_URL.to_string()),
        _ => None,
    })
    .expect("test config")
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(RateLimiter::default(), None).await
}

pub async fn spawn_app_with(
    limiter: RateLimiter,
    signups: Option<Arc<dyn SignupStore>>,
) -> TestApp {
    let pool = memory_pool().await;
    let signups: Arc<dyn SignupStore> = match signups {
        Some(store) => store,
        None => Arc::new(PublicStore::new(pool.clone())),
    };
    spawn_app_on(pool, limiter, signups)
}

/// Builds the app over an existing pool with a caller-supplied signup store.
pub fn spawn_app_on(
    pool: SqlitePool,
    limiter: RateLimiter,
    signups: Arc<dyn SignupStore>,
) -> TestApp {
    let verifications: Arc<dyn VerificationStore> = Arc::new(AdminStore::new(pool.clone()));
    build_app(pool, limiter, signups, verifications)
}

/// Builds the app with a caller-supplied verification store.
pub async fn spawn_app_verifying_with(verifications: Arc<dyn VerificationStore>) -> TestApp {
    let pool = memory_pool().await;
    let signups: Arc<dyn SignupStore> = Arc::new(PublicStore::new(pool.clone()));
    build_app(pool, RateLimiter::default(), signups, verifications)
}

fn build_app(
    pool: SqlitePool,
    limiter: RateLimiter,
    signups: Arc<dyn SignupStore>,
    verifications: Arc<dyn VerificationStore>,
) -> TestApp {
    let mailer = Arc::new(RecordingMailer::default());

    let state = AppState {
        config: Arc::new(test_config()),
        signups,
        verifications,
        mailer: mailer.clone(),
        limiter: Arc::new(limiter),
    };

    TestApp {
        router: rest::router(state),
        pool,
        mailer,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Query pairs of the redirect target.
    pub fn location_query(&self) -> Vec<(String, String)> {
        let location = self
            .headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .expect("location header");
        url::Url::parse(location)
            .expect("absolute location")
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    pub fn location_status(&self) -> String {
        self.location_query()
            .into_iter()
            .find(|(k, _)| k == "status")
            .map(|(_, v)| v)
            .expect("status param")
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn signup(&self, body: Value) -> TestResponse {
        self.signup_from("192.0.2.1", body).await
    }

    pub async fn signup_from(&self, ip: &str, body: Value) -> TestResponse {
        let request = Request::post("/signup")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(body.to_string()))
            .expect("request");
        self.send(request).await
    }

    pub async fn verify(&self, token: &str) -> TestResponse {
        let request = Request::get(format!("/verify?token={token}"))
            .body(Body::empty())
            .expect("request");
        self.send(request).await
    }

    pub async fn find(&self, email: &str) -> Option<WaitlistSignup> {
        sqlx::query_as::<_, WaitlistSignup>("SELECT * FROM waitlist_signups WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .expect("query signup")
    }

    pub async fn count(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM waitlist_signups")
            .fetch_one(&self.pool)
            .await
            .expect("count signups")
    }

    /// Inserts a pending row directly, bypassing the HTTP surface.
    pub async fn seed_pending(&self, email: &str, token: &str, expires_at: DateTime<Utc>) {
        PublicStore::new(self.pool.clone())
            .insert(&NewSignup {
                email: email.to_string(),
                preferred_lang: "python".to_string(),
                verification_token: token.to_string(),
                token_expires_at: expires_at,
            })
            .await
            .expect("seed signup");
    }
}
