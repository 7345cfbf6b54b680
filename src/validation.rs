//! Validation and sanitization of waitlist submissions.
//!
//! The signup body is inspected as raw JSON rather than deserialized into a
//! struct so that a bad `preferredLang` can be coerced and a filled honeypot
//! can be detected even when the rest of the payload is malformed.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::models::signup::{Language, PreferredLanguage};

pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_OTHER_LANGUAGE_LEN: usize = 100;
pub const MIN_OTHER_LANGUAGE_LEN: usize = 2;

const DANGEROUS_CHARS: &[char] = &[
    '<', '>', '\'', '"', '`', ';', '(', ')', '{', '}', '[', ']', '\\', '|',
];
const DANGEROUS_PROTOCOLS: &[&str] = &["javascript:", "vbscript:", "data:"];
const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "UNION", "ALTER", "CREATE", "TRUNCATE",
];

/// A normalized submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub email: String,
    pub preferred_lang: PreferredLanguage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validated {
    Accepted(Submission),
    /// The hidden `website` field was filled in. Callers must answer as if
    /// the signup succeeded and touch nothing.
    Honeypot,
}

/// Field-level failures, serialized as the `details` of a 400 response.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationErrors {
    pub form_errors: Vec<String>,
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    fn field(&mut self, field: &str, message: &str) {
        self.field_errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.form_errors.is_empty() && self.field_errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.field_errors.contains_key(field)
    }
}

pub fn validate_submission(body: &Value) -> Result<Validated, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let Some(fields) = body.as_object() else {
        errors
            .form_errors
            .push(format!("Expected object, received {}", type_name(body)));
        return Err(errors);
    };

    match fields.get("website") {
        None => {}
        Some(Value::String(s)) if s.is_empty() => {}
        Some(_) => return Ok(Validated::Honeypot),
    }

    let email = match fields.get("email") {
        Some(Value::String(raw)) => {
            let email = normalize_email(raw);
            if email.chars().count() > MAX_EMAIL_LEN {
                errors.field("email", "Email too long");
                None
            } else if !is_valid_email(&email) {
                errors.field("email", "Invalid email address");
                None
            } else {
                Some(email)
            }
        }
        None => {
            errors.field("email", "Required");
            None
        }
        Some(other) => {
            errors.field("email", &format!("Expected string, received {}", type_name(other)));
            None
        }
    };

    let language = Language::parse_or_other(fields.get("preferredLang").and_then(Value::as_str));

    let other = match fields.get("otherLanguage") {
        None => None,
        Some(Value::String(raw)) if raw.chars().count() > MAX_OTHER_LANGUAGE_LEN => {
            errors.field("otherLanguage", "Language name too long");
            None
        }
        Some(Value::String(raw)) if raw.is_empty() => None,
        Some(Value::String(raw)) => Some(sanitize_input(raw, MAX_OTHER_LANGUAGE_LEN)),
        Some(other) => {
            errors.field(
                "otherLanguage",
                &format!("Expected string, received {}", type_name(other)),
            );
            None
        }
    };

    let other = match (language, other) {
        (Language::Other, Some(name)) if !is_valid_language_name(&name) => {
            errors.field(
                "otherLanguage",
                "Invalid language name. Use only letters, numbers, and common punctuation.",
            );
            None
        }
        (Language::Other, name) => name,
        _ => None,
    };

    match email {
        Some(email) if errors.is_empty() => Ok(Validated::Accepted(Submission {
            email,
            preferred_lang: PreferredLanguage { language, other },
        })),
        _ => Err(errors),
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Structural email check: a dot-atom style local part and a domain with at
/// least two labels ending in an alphabetic TLD.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };

    if local.is_empty() || local.starts_with('.') || email.contains("..") {
        return false;
    }
    if !local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '\'' | '+' | '-' | '.'))
    {
        return false;
    }
    if local.ends_with('.') || local.ends_with('\'') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    let Some((tld, rest)) = labels.split_last() else {
        return false;
    };
    if rest.is_empty() || tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    rest.iter().all(|label| {
        label
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_alphanumeric())
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Letters, digits, whitespace and `.-+#/`, between 2 and 100 characters.
/// Covers names like "C++", "C#", ".NET", "Node.js" and "Ruby on Rails".
pub fn is_valid_language_name(input: &str) -> bool {
    let len = input.chars().count();
    if !(MIN_OTHER_LANGUAGE_LEN..=MAX_OTHER_LANGUAGE_LEN).contains(&len) {
        return false;
    }
    input.chars().all(|c| {
        c.is_ascii_alphanumeric() || c.is_whitespace() || matches!(c, '.' | '-' | '+' | '#' | '/')
    })
}

/// Strips markup, injection-prone characters, script protocols, inline event
/// handlers and SQL keywords, then collapses whitespace and truncates.
pub fn sanitize_input(input: &str, max_len: usize) -> String {
    let mut out = strip_tags(input);
    out = strip_entities(&out);
    out.retain(|c| !DANGEROUS_CHARS.contains(&c));
    for protocol in DANGEROUS_PROTOCOLS {
        out = remove_ignore_ascii_case(&out, protocol);
    }
    out = strip_event_handlers(&out);
    out = strip_sql_keywords(&out);
    out = out.replace("--", "").replace("/*", "");

    out.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_len)
        .collect()
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Removes every `<...>` span. A `<` with no closing `>` is left alone.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find('<') {
        match rest[open..].find('>') {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Removes `&name;` and `&#123;` style entities.
fn strip_entities(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '&' {
            let mut j = i + 1;
            while j < chars.len() && (chars[j] == '#' || is_word(chars[j])) {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && chars[j] == ';' {
                i = j + 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn remove_ignore_ascii_case(input: &str, needle: &str) -> String {
    let needle: Vec<char> = needle.chars().collect();
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        if matches_ignore_ascii_case(&chars[i..], &needle) {
            i += needle.len();
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn matches_ignore_ascii_case(haystack: &[char], needle: &[char]) -> bool {
    haystack.len() >= needle.len()
        && haystack
            .iter()
            .zip(needle)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
}

/// Removes `on<word>=` patterns such as `onclick =`.
fn strip_event_handlers(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        if let Some(end) = event_handler_end(&chars, i) {
            i = end;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn event_handler_end(chars: &[char], start: usize) -> Option<usize> {
    if !matches_ignore_ascii_case(&chars[start..], &['o', 'n']) {
        return None;
    }
    let mut j = start + 2;
    let name_start = j;
    while j < chars.len() && is_word(chars[j]) {
        j += 1;
    }
    if j == name_start {
        return None;
    }
    while j < chars.len() && chars[j].is_whitespace() {
        j += 1;
    }
    (j < chars.len() && chars[j] == '=').then_some(j + 1)
}

/// Removes whole-word SQL keywords regardless of case.
fn strip_sql_keywords(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    'scan: while i < chars.len() {
        let at_boundary = i == 0 || !is_word(chars[i - 1]);
        if at_boundary {
            for keyword in SQL_KEYWORDS {
                let keyword: Vec<char> = keyword.chars().collect();
                let end = i + keyword.len();
                if matches_ignore_ascii_case(&chars[i..], &keyword)
                    && (end == chars.len() || !is_word(chars[end]))
                {
                    i = end;
                    continue 'scan;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn accepted(body: Value) -> Submission {
        match validate_submission(&body) {
            Ok(Validated::Accepted(submission)) => submission,
            other => panic!("expected accepted submission, got {other:?}"),
        }
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        let submission = accepted(json!({"email": "A@Example.com ", "preferredLang": "python"}));
        assert_eq!(submission.email, "a@example.com");
        assert_eq!(submission.preferred_lang.to_stored(), "python");
    }

    #[test]
    fn rejects_malformed_emails() {
        for email in [
            "",
            "plainaddress",
            "@example.com",
            "user@",
            "user@localhost",
            ".user@example.com",
            "user.@example.com",
            "us..er@example.com",
            "user@example.c",
            "user@-example.com",
            "user name@example.com",
            "user@exa_mple.com",
        ] {
            assert!(!is_valid_email(email), "{email} should be rejected");
        }
    }

    #[test]
    fn accepts_common_emails() {
        for email in [
            "a@example.com",
            "first.last@sub.example.co.uk",
            "user+tag@example.io",
            "o'neil@example.com",
            "x_y-z@my-domain.dev",
        ] {
            assert!(is_valid_email(email), "{email} should be accepted");
        }
    }

    #[test]
    fn overlong_email_is_reported() {
        let email = format!("{}@example.com", "a".repeat(250));
        let errors = validate_submission(&json!({"email": email, "preferredLang": "go"}))
            .expect_err("too long");
        assert_eq!(errors.field_errors["email"], vec!["Email too long".to_string()]);
    }

    #[test]
    fn unknown_language_is_coerced_without_suffix() {
        let submission = accepted(json!({"email": "a@example.com", "preferredLang": "haskell"}));
        assert_eq!(submission.preferred_lang.to_stored(), "other");

        let submission = accepted(json!({"email": "a@example.com", "preferredLang": 42}));
        assert_eq!(submission.preferred_lang.to_stored(), "other");
    }

    #[test]
    fn coerced_language_keeps_valid_free_text() {
        let submission = accepted(json!({
            "email": "a@example.com",
            "preferredLang": "<b>rust</b>",
            "otherLanguage": "Rust"
        }));
        assert_eq!(submission.preferred_lang.to_stored(), "other:Rust");
    }

    #[test]
    fn free_text_ignored_for_known_language() {
        let submission = accepted(json!({
            "email": "a@example.com",
            "preferredLang": "java",
            "otherLanguage": "Kotlin"
        }));
        assert_eq!(submission.preferred_lang.to_stored(), "java");
    }

    #[test]
    fn other_without_free_text_is_bare_other() {
        let submission = accepted(json!({"email": "a@example.com", "preferredLang": "other"}));
        assert_eq!(submission.preferred_lang.to_stored(), "other");

        let submission = accepted(json!({
            "email": "a@example.com",
            "preferredLang": "other",
            "otherLanguage": ""
        }));
        assert_eq!(submission.preferred_lang.to_stored(), "other");
    }

    #[test]
    fn punctuated_language_names_survive() {
        for name in ["C++", "C#", ".NET", "Node.js", "Ruby on Rails", "PL/SQL"] {
            let submission = accepted(json!({
                "email": "a@example.com",
                "preferredLang": "other",
                "otherLanguage": name
            }));
            assert_eq!(submission.preferred_lang.to_stored(), format!("other:{name}"));
        }
    }

    #[test]
    fn script_tags_are_stripped() {
        assert_eq!(sanitize_input("<script>alert(1)</script>Elixir", 100), "alert1Elixir");
        assert_eq!(sanitize_input("Zig<img src=x onerror=alert(1)>", 100), "Zig");
    }

    #[test]
    fn quotes_and_sql_are_stripped() {
        let cleaned = sanitize_input("Rust'; DROP TABLE users; --", 100);
        assert_eq!(cleaned, "Rust TABLE users");
        assert!(!cleaned.contains('\''));

        let cleaned = sanitize_input("\"Scala\" union select", 100);
        assert_eq!(cleaned, "Scala");
    }

    #[test]
    fn keywords_inside_words_are_kept() {
        assert_eq!(sanitize_input("Selectors", 100), "Selectors");
        assert_eq!(sanitize_input("dropwizard", 100), "dropwizard");
    }

    #[test]
    fn protocols_entities_and_handlers_are_stripped() {
        assert_eq!(sanitize_input("javascript:Lua", 100), "Lua");
        assert_eq!(sanitize_input("DATA:Perl&amp;", 100), "Perl");
        assert_eq!(sanitize_input("Dart onclick = x", 100), "Dart x");
        assert_eq!(sanitize_input("OCaml /* c */", 100), "OCaml c */");
    }

    #[test]
    fn whitespace_is_collapsed_and_length_capped() {
        assert_eq!(sanitize_input("  Ruby \t on\n Rails ", 100), "Ruby on Rails");
        assert_eq!(sanitize_input(&"a".repeat(150), 100).len(), 100);
    }

    #[test]
    fn free_text_reduced_to_nothing_is_rejected() {
        let errors = validate_submission(&json!({
            "email": "a@example.com",
            "preferredLang": "other",
            "otherLanguage": "<script>x</script>"
        }))
        .expect_err("single char left after sanitizing");
        assert!(errors.has_field("otherLanguage"));

        let errors = validate_submission(&json!({
            "email": "a@example.com",
            "preferredLang": "other",
            "otherLanguage": "SELECT"
        }))
        .expect_err("empty after sanitizing");
        assert!(errors.has_field("otherLanguage"));
    }

    #[test]
    fn free_text_with_unsupported_characters_is_rejected() {
        let errors = validate_submission(&json!({
            "email": "a@example.com",
            "preferredLang": "other",
            "otherLanguage": "Rust 🦀"
        }))
        .expect_err("emoji");
        assert!(errors.has_field("otherLanguage"));
    }

    #[test]
    fn overlong_free_text_is_rejected() {
        let errors = validate_submission(&json!({
            "email": "a@example.com",
            "preferredLang": "other",
            "otherLanguage": "x".repeat(101)
        }))
        .expect_err("too long");
        assert_eq!(
            errors.field_errors["otherLanguage"],
            vec!["Language name too long".to_string()]
        );
    }

    #[test]
    fn filled_honeypot_wins_over_other_errors() {
        assert_eq!(
            validate_submission(&json!({"email": "nope", "website": "http://spam.example"})),
            Ok(Validated::Honeypot)
        );
        assert_eq!(
            validate_submission(&json!({"email": "a@example.com", "website": 1})),
            Ok(Validated::Honeypot)
        );
    }

    #[test]
    fn empty_honeypot_is_fine() {
        let submission = accepted(json!({"email": "a@example.com", "website": ""}));
        assert_eq!(submission.email, "a@example.com");
    }

    #[test]
    fn non_object_body_is_a_form_error() {
        let errors = validate_submission(&json!(["a@example.com"])).expect_err("array");
        assert_eq!(errors.form_errors, vec!["Expected object, received array".to_string()]);
    }

    #[test]
    fn missing_email_is_required() {
        let errors = validate_submission(&json!({"preferredLang": "go"})).expect_err("missing");
        assert_eq!(errors.field_errors["email"], vec!["Required".to_string()]);
    }
}
