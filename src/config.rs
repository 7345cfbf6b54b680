use url::Url;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_MAIL_FROM: &str = "InstAPI <noreply@instapi.app>";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is not a valid absolute URL: {source}")]
    InvalidUrl {
        name: &'static str,
        source: url::ParseError,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    /// Credentials for the public, signup-only store handle.
    pub database_url: String,
    /// Credentials for the privileged handle used by verification.
    pub admin_database_url: String,
    /// Public base URL; verification links and the status page hang off it.
    pub app_url: Url,
    pub resend_api_key: Option<String>,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let admin_database_url = var("ADMIN_DATABASE_URL").unwrap_or_else(|| database_url.clone());

        let raw_app_url = var("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string());
        let app_url = Url::parse(&raw_app_url).map_err(|source| ConfigError::InvalidUrl {
            name: "APP_URL",
            source,
        })?;

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            database_url,
            admin_database_url,
            app_url,
            resend_api_key: var("RESEND_API_KEY"),
            mail_from: var("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
        })
    }

    /// Link placed in verification emails.
    pub fn verify_url(&self, token: &str) -> Url {
        let mut url = self.app_url.join("/verify").unwrap_or_else(|_| self.app_url.clone());
        url.query_pairs_mut().append_pair("token", token);
        url
    }

    /// Status page that `/verify` redirects to.
    pub fn status_url(&self, status: &str, message: &str) -> Url {
        let mut url = self.app_url.join("/verified").unwrap_or_else(|_| self.app_url.clone());
        url.query_pairs_mut()
            .append_pair("status", status)
            .append_pair("message", message);
        url
    }
}
