use std::sync::Arc;

pub mod config;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod rate_limit;
pub mod rest;
pub mod store;
pub mod templates;
pub mod token;
pub mod validation;
pub mod waitlist;

use config::Config;
use mailer::Mailer;
use rate_limit::RateLimiter;
use store::{SignupStore, VerificationStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Public capability: signup lookups, inserts and token refreshes.
    pub signups: Arc<dyn SignupStore>,
    /// Privileged capability: token lookups and the verified transition.
    pub verifications: Arc<dyn VerificationStore>,
    pub mailer: Arc<dyn Mailer>,
    pub limiter: Arc<RateLimiter>,
}
