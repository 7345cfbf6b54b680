use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// Prefix used when the visitor typed in a language we don't list.
pub const OTHER_PREFIX: &str = "other:";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WaitlistSignup {
    pub id: i64,
    pub email: String,
    pub preferred_lang: String,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewSignup {
    pub email: String,
    pub preferred_lang: String,
    pub verification_token: String,
    pub token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Nodejs,
    Python,
    Go,
    Java,
    Ruby,
    Other,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Nodejs,
        Language::Python,
        Language::Go,
        Language::Java,
        Language::Ruby,
        Language::Other,
    ];

    /// Unknown or missing values fall back to `Other` instead of failing.
    pub fn parse_or_other(raw: Option<&str>) -> Self {
        raw.and_then(|value| Self::ALL.into_iter().find(|lang| lang.as_str() == value))
            .unwrap_or(Language::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Nodejs => "nodejs",
            Language::Python => "python",
            Language::Go => "go",
            Language::Java => "java",
            Language::Ruby => "ruby",
            Language::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Language::Nodejs => "Node.js/Express",
            Language::Python => "Python/FastAPI",
            Language::Go => "Go",
            Language::Java => "Java/Spring Boot",
            Language::Ruby => "Ruby on Rails",
            Language::Other => "Other",
        }
    }
}

/// The language choice as persisted in `preferred_lang`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferredLanguage {
    pub language: Language,
    /// Sanitized free text, only ever set alongside `Language::Other`.
    pub other: Option<String>,
}

impl PreferredLanguage {
    pub fn known(language: Language) -> Self {
        Self {
            language,
            other: None,
        }
    }

    pub fn from_stored(stored: &str) -> Self {
        if let Some(name) = stored.strip_prefix(OTHER_PREFIX) {
            return Self {
                language: Language::Other,
                other: Some(name.to_string()),
            };
        }
        Self::known(Language::parse_or_other(Some(stored)))
    }

    pub fn to_stored(&self) -> String {
        match (&self.language, &self.other) {
            (Language::Other, Some(name)) => format!("{OTHER_PREFIX}{name}"),
            (language, _) => language.as_str().to_string(),
        }
    }

    pub fn label(&self) -> &str {
        match (&self.language, &self.other) {
            (Language::Other, Some(name)) => name,
            (language, _) => language.label(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
